//! Member and attribute extraction for one closed type.
//!
//! Structs yield their eligible fields in declaration order, enums their unit
//! variants with folded discriminants. Every problem found is reported; an
//! extraction either succeeds completely or returns all of its diagnostics.

pub mod attrs;

pub use attrs::{AttrLiteral, AttributeMeta};
use rustc_hash::FxHashMap;
use syn::ext::IdentExt;
use syn::visit::Visit;
use syn::visit_mut::VisitMut;

use crate::consteval::{self, CrateConsts};
use crate::error::{Diagnostic, ScanError};
use crate::model::{ClosedType, CrateModel, ModPath, TypeDecl, TypeKind, locate, ty, visible_from_root};

/// Metadata of one closed type.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
	Struct(StructMeta),
	Enum(EnumMeta),
}

impl Extracted {
	pub fn ty(&self) -> &ClosedType {
		match self {
			Self::Struct(meta) => &meta.ty,
			Self::Enum(meta) => &meta.ty,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructMeta {
	pub ty: ClosedType,
	pub members: Vec<MemberMeta>,
}

/// One eligible field.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberMeta {
	/// Field name, or its index for tuple fields.
	pub name: String,
	/// Accessor expression suffix: `v.<member>`.
	pub member: syn::Member,
	/// Field type as written, with generic parameters substituted.
	pub declared_type: String,
	pub writable: bool,
	pub attributes: Vec<AttributeMeta>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMeta {
	pub ty: ClosedType,
	/// Declaration path without type arguments, used in variant patterns.
	pub path: ModPath,
	pub values: Vec<EnumValueMeta>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueMeta {
	pub name: String,
	/// Variant identifier as written, used in the key match.
	pub ident: syn::Ident,
	pub value: i128,
	pub key: i64,
	pub attributes: Vec<AttributeMeta>,
}

/// Field controls from `#[prism(...)]`.
#[derive(Debug, Default, Clone, Copy)]
struct Controls {
	skip: bool,
	readonly: bool,
}

/// Reads closed types out of a [`CrateModel`].
pub struct Extractor<'m> {
	model: &'m CrateModel,
}

impl<'m> Extractor<'m> {
	pub fn new(model: &'m CrateModel) -> Self {
		Self { model }
	}

	/// Extracts the metadata of `ty`.
	pub fn extract(&self, ty: &ClosedType) -> Result<Extracted, Vec<Diagnostic>> {
		let decl = self.describable(ty).map_err(|d| vec![d])?;
		let extracted = match &decl.kind {
			TypeKind::Struct(item) => self.extract_struct(ty, decl, item).map(Extracted::Struct)?,
			TypeKind::Enum(item) => self.extract_enum(ty, decl, item).map(Extracted::Enum)?,
			TypeKind::Union(_) => return Err(vec![union_diagnostic(ty, decl)]),
		};
		tracing::debug!(
			ty = %ty,
			entries = match &extracted {
				Extracted::Struct(meta) => meta.members.len(),
				Extracted::Enum(meta) => meta.values.len(),
			},
			"extracted"
		);
		Ok(extracted)
	}

	/// The declaration behind `ty`, if metadata can be generated for it.
	pub fn describable(&self, ty: &ClosedType) -> Result<&'m TypeDecl, Diagnostic> {
		let undescribable = |reason: String| {
			Diagnostic::new(ScanError::UndescribableType {
				ty: ty.to_string(),
				reason,
			})
		};
		let decl = ty
			.segments()
			.and_then(|segments| self.model.type_decl(segments))
			.ok_or_else(|| undescribable("no struct or enum with this path is declared in the crate".into()))?;

		let generics = decl.generics();
		if matches!(decl.kind, TypeKind::Union(_)) {
			return Err(union_diagnostic(ty, decl));
		}
		let reason = if generics.lifetimes().next().is_some() {
			Some("types with lifetime parameters are not 'static".to_string())
		} else if generics.const_params().next().is_some() {
			Some("const generic parameters are not supported".to_string())
		} else if generics.type_params().count() != ty.args().len() {
			Some(format!(
				"expected {} type argument(s), found {}",
				generics.type_params().count(),
				ty.args().len()
			))
		} else if !self.model.is_nameable(decl) {
			Some("the type is not visible from the crate root".to_string())
		} else {
			None
		};
		match reason {
			Some(reason) => Err(undescribable(reason).at(decl.location())),
			None => Ok(decl),
		}
	}

	fn extract_struct(
		&self,
		ty: &ClosedType,
		decl: &TypeDecl,
		item: &syn::ItemStruct,
	) -> Result<StructMeta, Vec<Diagnostic>> {
		let bindings = self.bindings(ty, decl)?;
		let owner = ty.to_string();
		let mut members = Vec::new();
		let mut diagnostics = Vec::new();

		for (index, field) in item.fields.iter().enumerate() {
			let (name, member) = match &field.ident {
				Some(ident) => (ident.unraw().to_string(), syn::Member::Named(ident.clone())),
				None => (index.to_string(), syn::Member::Unnamed(syn::Index::from(index))),
			};
			let controls = controls(&field.attrs);
			if controls.skip || !visible_from_root(&field.vis, decl.depth()) {
				continue;
			}

			let mut field_ty = field.ty.clone();
			Substitute(&bindings).visit_type_mut(&mut field_ty);
			if let Some(reason) = unsupported_member_type(&field_ty) {
				diagnostics.push(
					Diagnostic::new(ScanError::UnsupportedMemberKind {
						owner: owner.clone(),
						member: name,
						reason,
					})
					.at(locate(&decl.file, &field.ty)),
				);
				continue;
			}

			let attributes = self.attributes(&field.attrs, &owner, &name, decl, &mut diagnostics);
			members.push(MemberMeta {
				name,
				member,
				declared_type: ty::render(&field_ty),
				writable: !controls.readonly,
				attributes,
			});
		}

		if diagnostics.is_empty() {
			Ok(StructMeta { ty: ty.clone(), members })
		} else {
			Err(diagnostics)
		}
	}

	fn extract_enum(&self, ty: &ClosedType, decl: &TypeDecl, item: &syn::ItemEnum) -> Result<EnumMeta, Vec<Diagnostic>> {
		let owner = ty.to_string();
		let mut values = Vec::new();
		let mut diagnostics = Vec::new();
		let mut keys: FxHashMap<i64, String> = FxHashMap::default();
		let mut next: i128 = 0;
		let consts = CrateConsts::new(self.model, &decl.module);

		for variant in &item.variants {
			let name = variant.ident.unraw().to_string();
			let at = locate(&decl.file, &variant.ident);
			if !matches!(variant.fields, syn::Fields::Unit) {
				diagnostics.push(
					Diagnostic::new(ScanError::UnsupportedMemberKind {
						owner: owner.clone(),
						member: name,
						reason: "variant carries data; only fieldless variants have values".into(),
					})
					.at(at),
				);
				continue;
			}

			let value = match &variant.discriminant {
				Some((_, expr)) => match consteval::eval_int_with(expr, &consts) {
					Some(value) => value,
					None => {
						diagnostics.push(
							Diagnostic::new(ScanError::NonConstantDiscriminant {
								owner: owner.clone(),
								variant: name,
							})
							.at(locate(&decl.file, expr)),
						);
						continue;
					}
				},
				None => next,
			};
			next = value.wrapping_add(1);

			let key = consteval::enum_key(value);
			if let Some(first) = keys.get(&key) {
				diagnostics.push(
					Diagnostic::new(ScanError::DuplicateEnumKey {
						owner: owner.clone(),
						first: first.clone(),
						second: name,
						key,
					})
					.at(at),
				);
				continue;
			}
			keys.insert(key, name.clone());

			let attributes = self.attributes(&variant.attrs, &owner, &name, decl, &mut diagnostics);
			values.push(EnumValueMeta {
				name,
				ident: variant.ident.clone(),
				value,
				key,
				attributes,
			});
		}

		if diagnostics.is_empty() {
			Ok(EnumMeta {
				ty: ty.clone(),
				path: decl.path.clone(),
				values,
			})
		} else {
			Err(diagnostics)
		}
	}

	fn attributes(
		&self,
		attrs: &[syn::Attribute],
		owner: &str,
		member: &str,
		decl: &TypeDecl,
		diagnostics: &mut Vec<Diagnostic>,
	) -> Vec<AttributeMeta> {
		attrs
			.iter()
			.filter(|attr| attrs::is_described(attr))
			.filter_map(|attr| match attrs::parse_attribute(attr) {
				Ok(meta) => Some(meta),
				Err(detail) => {
					diagnostics.push(
						Diagnostic::new(ScanError::NonConstantAttributeArgument {
							owner: owner.to_string(),
							member: member.to_string(),
							attribute: ty::render(attr.path()),
							detail,
						})
						.at(locate(&decl.file, attr)),
					);
					None
				}
			})
			.collect()
	}

	/// Maps the declaration's type parameters to the closed arguments.
	fn bindings(&self, ty: &ClosedType, decl: &TypeDecl) -> Result<FxHashMap<String, syn::Type>, Vec<Diagnostic>> {
		decl.type_params()
			.into_iter()
			.zip(ty.args())
			.map(|(param, arg)| {
				syn::parse_str::<syn::Type>(&arg.to_string())
					.map(|parsed| (param, parsed))
					.map_err(|e| {
						vec![
							Diagnostic::new(ScanError::UndescribableType {
								ty: ty.to_string(),
								reason: format!("type argument `{arg}` does not parse: {e}"),
							})
							.at(decl.location()),
						]
					})
			})
			.collect()
	}
}

fn union_diagnostic(ty: &ClosedType, decl: &TypeDecl) -> Diagnostic {
	Diagnostic::new(ScanError::UndescribableType {
		ty: ty.to_string(),
		reason: "unions have no safe member accessors".into(),
	})
	.at(decl.location())
}

fn controls(attrs: &[syn::Attribute]) -> Controls {
	let mut controls = Controls::default();
	for attr in attrs.iter().filter(|a| a.path().is_ident("prism")) {
		// Malformed controls are reported by the derive.
		let _ = attr.parse_nested_meta(|meta| {
			if meta.path.is_ident("skip") {
				controls.skip = true;
			} else if meta.path.is_ident("readonly") {
				controls.readonly = true;
			}
			Ok(())
		});
	}
	controls
}

struct Substitute<'a>(&'a FxHashMap<String, syn::Type>);

impl VisitMut for Substitute<'_> {
	fn visit_type_mut(&mut self, ty: &mut syn::Type) {
		if let syn::Type::Path(path) = ty
			&& path.qself.is_none()
			&& let Some(ident) = path.path.get_ident()
			&& let Some(replacement) = self.0.get(&ident.to_string())
		{
			*ty = replacement.clone();
			return;
		}
		syn::visit_mut::visit_type_mut(self, ty);
	}
}

/// Why a field type cannot be read through a `'static` accessor.
fn unsupported_member_type(ty: &syn::Type) -> Option<String> {
	#[derive(Default)]
	struct Check(Option<String>);

	impl<'ast> Visit<'ast> for Check {
		fn visit_lifetime(&mut self, lifetime: &'ast syn::Lifetime) {
			if lifetime.ident != "static" && self.0.is_none() {
				self.0 = Some(format!("the field borrows lifetime `{lifetime}`"));
			}
		}

		fn visit_type_reference(&mut self, reference: &'ast syn::TypeReference) {
			if reference.lifetime.is_none() && self.0.is_none() {
				self.0 = Some("the field holds a reference with an elided lifetime".into());
			}
			syn::visit::visit_type_reference(self, reference);
		}

		// Elided lifetimes in `fn(&T)` and `Fn(&T)` are higher-ranked, not borrows.
		fn visit_type_bare_fn(&mut self, _: &'ast syn::TypeBareFn) {}

		fn visit_parenthesized_generic_arguments(&mut self, _: &'ast syn::ParenthesizedGenericArguments) {}

		fn visit_type_impl_trait(&mut self, _: &'ast syn::TypeImplTrait) {
			self.0.get_or_insert_with(|| "`impl Trait` fields have no nameable type".into());
		}

		fn visit_type_infer(&mut self, _: &'ast syn::TypeInfer) {
			self.0.get_or_insert_with(|| "the field type is inferred".into());
		}

		fn visit_type_macro(&mut self, _: &'ast syn::TypeMacro) {
			self.0.get_or_insert_with(|| "macro-generated field types are not expanded".into());
		}
	}

	if let syn::Type::TraitObject(_) = ty {
		return Some("bare trait objects are unsized".into());
	}
	let mut check = Check::default();
	check.visit_type(ty);
	check.0
}

#[cfg(test)]
mod tests;
