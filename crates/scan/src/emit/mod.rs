//! Registration source generation.
//!
//! One builder function and one `inventory::submit!` per (type, table).
//! Generated code names types by absolute `crate::` paths and reaches the
//! runtime through its `__private` module, so it can be included verbatim at
//! the crate root. Field types are never spelled out: accessors are closures
//! whose types the compiler infers from the owner.
//!
//! The output contains no turbofish query calls, so scanning it again yields
//! no new usages.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};
use rustc_hash::FxHashMap;

use crate::config::ScanConfig;
use crate::discover::{ClosedTypeUsage, QueryKind};
use crate::error::{Diagnostic, Diagnostics, Location, ScanError};
use crate::extract::{AttrLiteral, AttributeMeta, EnumMeta, Extracted, Extractor, StructMeta};
use crate::model::{ClosedType, CrateModel};

/// Name of the module wrapping generated registrations.
pub const MODULE: &str = "__prism_registrations";

const HEADER: &str = "// @generated by prism-scan. Do not edit.\n";

/// Runtime table a registration fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
	Members,
	EnumValues,
}

/// Generated source and what it registers.
#[derive(Debug, Clone, Default)]
pub struct Emitted {
	pub source: String,
	/// In output order.
	pub registrations: Vec<(ClosedType, Table)>,
}

/// Turns closed-type usages into registration code.
pub struct Emitter<'m> {
	extractor: Extractor<'m>,
	runtime: syn::Path,
	/// Extraction results per type; failures are reported once.
	cache: FxHashMap<ClosedType, Option<Extracted>>,
}

impl<'m> Emitter<'m> {
	pub fn new(model: &'m CrateModel, config: &ScanConfig) -> Result<Self, ScanError> {
		Ok(Self {
			extractor: Extractor::new(model),
			runtime: config.runtime_path()?,
			cache: FxHashMap::default(),
		})
	}

	/// Generates registrations for `usages`.
	///
	/// Fails with every diagnostic found when any requested type cannot be
	/// described; no partial output is produced.
	pub fn emit(&mut self, usages: &[ClosedTypeUsage]) -> Result<Emitted, Diagnostics> {
		let mut tables: BTreeMap<ClosedType, BTreeSet<Table>> = BTreeMap::new();
		let mut diagnostics = Vec::new();

		for usage in usages {
			let Some(extracted) = self.extracted(&usage.ty, &usage.location, &mut diagnostics) else {
				continue;
			};
			match table_for(usage.kind, extracted) {
				Ok(table) => {
					tables.entry(usage.ty.clone()).or_default().insert(table);
				}
				Err(error) => diagnostics.push(Diagnostic::new(error).at(usage.location.clone())),
			}
		}
		if !diagnostics.is_empty() {
			return Err(Diagnostics(diagnostics));
		}

		let mut items = Vec::new();
		let mut registrations = Vec::new();
		for (index, (ty, kinds)) in tables.iter().enumerate() {
			let Some(Some(extracted)) = self.cache.get(ty) else {
				continue;
			};
			for table in kinds {
				let tokens = match (table, extracted) {
					(Table::Members, Extracted::Struct(meta)) => self.members(index, meta),
					(Table::EnumValues, Extracted::Enum(meta)) => self.enum_values(index, meta),
					_ => continue,
				};
				match tokens {
					Ok(tokens) => {
						items.push(tokens);
						registrations.push((ty.clone(), *table));
					}
					Err(error) => diagnostics.push(Diagnostic::new(ScanError::UndescribableType {
						ty: ty.to_string(),
						reason: error.to_string(),
					})),
				}
			}
		}
		if !diagnostics.is_empty() {
			return Err(Diagnostics(diagnostics));
		}

		tracing::debug!(registrations = registrations.len(), "emitted registrations");
		Ok(Emitted {
			source: render(&items),
			registrations,
		})
	}

	/// Memoized extraction. Diagnostics are pushed on the first failure only.
	fn extracted(&mut self, ty: &ClosedType, requested: &Location, out: &mut Vec<Diagnostic>) -> Option<&Extracted> {
		if !self.cache.contains_key(ty) {
			let result = match self.extractor.extract(ty) {
				Ok(extracted) => Some(extracted),
				Err(diagnostics) => {
					out.extend(diagnostics.into_iter().map(|d| d.requested_at(requested.clone())));
					None
				}
			};
			self.cache.insert(ty.clone(), result);
		}
		self.cache.get(ty).and_then(Option::as_ref)
	}

	fn members(&self, index: usize, meta: &StructMeta) -> syn::Result<TokenStream> {
		let rt = &self.runtime;
		let ty = meta.ty.to_syn()?;
		let type_name = meta.ty.as_str();
		let build = format_ident!("members_{}_{}", index, slug(type_name));

		let members = meta.members.iter().map(|m| {
			let name = &m.name;
			let declared = &m.declared_type;
			let member = &m.member;
			let writable = m.writable.then(|| quote!(.writable(|v| &mut v.#member)));
			let attributes = m.attributes.iter().map(|a| self.attribute(a));
			quote! {
				#rt::__private::MemberBuilder::<#ty, _>::new(#name, #declared, |v| &v.#member)
					#writable
					#(.attribute(#attributes))*
					.build()
			}
		});
		let table = if meta.members.is_empty() {
			quote!(::core::iter::empty::<#rt::__private::MemberDescriptor>())
		} else {
			quote!([#(#members),*])
		};

		Ok(quote! {
			fn #build() -> #rt::__private::TypeTable {
				#rt::__private::TypeTable::new::<#ty>(#table)
			}
			#rt::__private::inventory::submit! {
				#rt::__private::Registration::members(#type_name, ::core::any::TypeId::of::<#ty>, #build)
			}
		})
	}

	fn enum_values(&self, index: usize, meta: &EnumMeta) -> syn::Result<TokenStream> {
		let rt = &self.runtime;
		let ty = meta.ty.to_syn()?;
		let type_name = meta.ty.as_str();
		let slug = slug(type_name);
		let key_of = format_ident!("enum_key_{}_{}", index, slug);
		let build = format_ident!("enum_values_{}_{}", index, slug);
		let path: syn::Path = syn::parse_str(&meta.path.join("::"))?;

		let body = if meta.values.is_empty() {
			quote!(match *v {})
		} else {
			let arms = meta.values.iter().map(|v| {
				let variant = &v.ident;
				let key = int_literal(i128::from(v.key));
				quote!(#path::#variant => #key)
			});
			quote!(match v { #(#arms,)* })
		};

		let values = meta.values.iter().map(|v| {
			let name = &v.name;
			let value = int_literal(v.value);
			let key = int_literal(i128::from(v.key));
			let attributes = v.attributes.iter().map(|a| self.attribute(a));
			quote! {
				#rt::__private::EnumValueDescriptor::new(#name, #value, #key)
					#(.attribute(#attributes))*
			}
		});
		let table = if meta.values.is_empty() {
			quote!(::core::iter::empty::<#rt::__private::EnumValueDescriptor>())
		} else {
			quote!([#(#values),*])
		};

		Ok(quote! {
			fn #key_of(value: &dyn ::core::any::Any) -> ::core::option::Option<i64> {
				value.downcast_ref::<#ty>().map(|v| #body)
			}
			fn #build() -> #rt::__private::EnumTable {
				#rt::__private::EnumTable::new::<#ty>(#key_of, #table)
			}
			#rt::__private::inventory::submit! {
				#rt::__private::Registration::enum_values(#type_name, ::core::any::TypeId::of::<#ty>, #build)
			}
		})
	}

	fn attribute(&self, attr: &AttributeMeta) -> TokenStream {
		let rt = &self.runtime;
		let kind = &attr.kind;
		let args = attr.args.iter().map(|a| self.value(a));
		let named = attr.named.iter().map(|(name, a)| {
			let value = self.value(a);
			quote!(.named(#name, #value))
		});
		quote!(#rt::__private::AttributeDescriptor::new(#kind) #(.arg(#args))* #(#named)*)
	}

	fn value(&self, value: &AttrLiteral) -> TokenStream {
		let rt = &self.runtime;
		let ctor = quote!(#rt::__private::AttrValue);
		match value {
			AttrLiteral::Str(s) => quote!(#ctor::Str(#s)),
			AttrLiteral::Int(v) => {
				let v = int_literal(*v);
				quote!(#ctor::Int(#v))
			}
			AttrLiteral::Float(v) => {
				let lit = Literal::f64_unsuffixed(v.abs());
				if v.is_sign_negative() {
					quote!(#ctor::Float(-#lit))
				} else {
					quote!(#ctor::Float(#lit))
				}
			}
			AttrLiteral::Bool(b) => quote!(#ctor::Bool(#b)),
			AttrLiteral::Char(c) => quote!(#ctor::Char(#c)),
			AttrLiteral::Path(p) => quote!(#ctor::Path(#p)),
			AttrLiteral::List(items) => {
				let items = items.iter().map(|item| self.value(item));
				quote!(#ctor::List(::std::vec![#(#items),*]))
			}
			AttrLiteral::Nested(attr) => {
				let attr = self.attribute(attr);
				quote!(#ctor::Nested(#attr))
			}
		}
	}
}

/// Which table a query asks for, given what the type turned out to be.
fn table_for(kind: QueryKind, extracted: &Extracted) -> Result<Table, ScanError> {
	match (kind, extracted) {
		(QueryKind::Members | QueryKind::Bootstrap, Extracted::Struct(_)) => Ok(Table::Members),
		(QueryKind::EnumValues | QueryKind::Bootstrap, Extracted::Enum(_)) => Ok(Table::EnumValues),
		(QueryKind::Members, Extracted::Enum(meta)) => Err(ScanError::UnsupportedMemberKind {
			owner: meta.ty.to_string(),
			member: "*".to_string(),
			reason: "enums have no data members; query enum_values instead".to_string(),
		}),
		(QueryKind::EnumValues, Extracted::Struct(meta)) => Err(ScanError::UnsupportedMemberKind {
			owner: meta.ty.to_string(),
			member: "*".to_string(),
			reason: "structs have no enum values; query members instead".to_string(),
		}),
	}
}

/// Signed integer literal as `-` and an unsuffixed magnitude, so the type
/// comes from context.
fn int_literal(value: i128) -> TokenStream {
	let magnitude = Literal::u128_unsuffixed(value.unsigned_abs());
	if value < 0 {
		quote!(-#magnitude)
	} else {
		quote!(#magnitude)
	}
}

/// Identifier-safe, readable form of a type name.
fn slug(type_name: &str) -> String {
	let mut slug = String::new();
	for c in type_name.trim_start_matches("crate::").chars() {
		if c.is_ascii_alphanumeric() {
			slug.push(c.to_ascii_lowercase());
		} else if !slug.ends_with('_') {
			slug.push('_');
		}
	}
	slug.trim_end_matches('_').chars().take(48).collect()
}

fn render(items: &[TokenStream]) -> String {
	let mut source = String::from(HEADER);
	source.push_str("#[doc(hidden)]\n");
	source.push_str("#[allow(clippy::all, unused_qualifications, non_snake_case)]\n");
	let _ = writeln!(source, "mod {MODULE} {{");
	for item in items {
		let _ = writeln!(source, "{item}");
	}
	source.push_str("}\n");
	source
}
