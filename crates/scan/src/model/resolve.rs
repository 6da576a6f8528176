//! Path resolution and type templates.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;

use super::{AliasDecl, ConstDecl, CrateModel, ModPath, TypeDecl, TypeExpr, ty};

/// Depth bound for following `use` chains; guards against import cycles.
const MAX_USE_HOPS: usize = 16;

/// Depth bound for aliases naming aliases; guards against alias cycles.
const MAX_ALIAS_DEPTH: usize = 16;

/// Where a written type is interpreted.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
	pub module: &'a [String],
	/// Parameters that become [`TypeExpr::Param`].
	pub generics: &'a [String],
	/// Parameters of an enclosing impl or trait; these cannot be followed.
	pub outer_generics: &'a [String],
	pub self_ty: Option<&'a TypeExpr>,
}

impl<'a> Scope<'a> {
	/// Scope of module-level code with no generics in play.
	pub fn module(module: &'a [String]) -> Self {
		Self {
			module,
			generics: &[],
			outer_generics: &[],
			self_ty: None,
		}
	}
}

/// Why a written type has no template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
	/// `_` or an elided type.
	Inferred,
	/// A parameter of an enclosing impl or trait, or `Self` in a trait.
	OuterGeneric(String),
	/// A type form that has no closed identity (`impl Trait`, `dyn Trait`,
	/// projections, or a generic parameter nested inside a non-path type).
	Unsupported(String),
}

impl fmt::Display for Unresolved {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Inferred => f.write_str("type argument is inferred"),
			Self::OuterGeneric(name) => write!(f, "`{name}` is a parameter of a generic impl or trait"),
			Self::Unsupported(text) => write!(f, "`{text}` has no closed identity"),
		}
	}
}

/// Whether an item with `vis`, declared `depth` modules below the crate root,
/// can be named from the crate root and therefore from any module inside it.
pub fn visible_from_root(vis: &syn::Visibility, depth: usize) -> bool {
	match vis {
		syn::Visibility::Public(_) => true,
		syn::Visibility::Inherited => depth == 0,
		syn::Visibility::Restricted(r) => {
			if r.path.is_ident("crate") {
				true
			} else if r.path.is_ident("super") {
				depth <= 1
			} else {
				r.path.is_ident("self") && depth == 0
			}
		}
	}
}

impl CrateModel {
	/// Resolves a written path to a local type declaration.
	///
	/// Tries, in order: `crate`/`self`/`super` prefixes, items of `module`,
	/// `use` aliases, child modules, glob imports, a crate-relative reading
	/// and finally a crate-unique type name.
	pub fn resolve_type(&self, module: &[String], segments: &[String]) -> Option<&TypeDecl> {
		self.resolve_item(&self.types, module, segments).or_else(|| match segments {
			[name] => self.unique_type(name),
			_ => None,
		})
	}

	/// Resolves a written path to a `type` alias of the crate.
	pub fn resolve_alias(&self, module: &[String], segments: &[String]) -> Option<&AliasDecl> {
		self.resolve_item(&self.aliases, module, segments)
	}

	/// Resolves a written path to a `const` item of the crate.
	pub fn resolve_const(&self, module: &[String], segments: &[String]) -> Option<&ConstDecl> {
		self.resolve_item(&self.consts, module, segments)
	}

	/// Resolves `segments` as an enum variant path (`Status::Active`),
	/// returning the enum.
	pub fn resolve_variant(&self, module: &[String], segments: &[String]) -> Option<&TypeDecl> {
		let (variant, enum_path) = segments.split_last()?;
		if enum_path.is_empty() {
			return None;
		}
		self.resolve_type(module, enum_path).filter(|d| d.has_variant(variant))
	}

	fn resolve_item<'m, T>(
		&'m self,
		table: &'m BTreeMap<ModPath, T>,
		module: &[String],
		segments: &[String],
	) -> Option<&'m T> {
		if let Some(item) = self.resolve_in(table, module, segments, 0) {
			return Some(item);
		}
		let mut crate_relative = vec!["crate".to_string()];
		crate_relative.extend_from_slice(segments);
		self.resolve_absolute(table, &crate_relative, 0)
	}

	fn resolve_in<'m, T>(
		&'m self,
		table: &'m BTreeMap<ModPath, T>,
		module: &[String],
		segments: &[String],
		hops: usize,
	) -> Option<&'m T> {
		if hops > MAX_USE_HOPS {
			return None;
		}
		let (first, rest) = segments.split_first()?;
		match first.as_str() {
			"crate" => return self.resolve_absolute(table, segments, hops + 1),
			"self" => return self.resolve_in(table, module, rest, hops + 1),
			"super" => {
				let parent = module.split_last().map(|(_, p)| p).filter(|p| !p.is_empty())?;
				return self.resolve_in(table, parent, rest, hops + 1);
			}
			"" | "Self" => return None,
			_ => {}
		}

		let mut direct = module.to_vec();
		direct.extend_from_slice(segments);
		if let Some(item) = table.get(&direct) {
			return Some(item);
		}

		let uses = self.modules.get(module).map(|m| m.uses.as_slice()).unwrap_or(&[]);
		for entry in uses.iter().filter(|u| u.alias.as_deref() == Some(first.as_str())) {
			let mut target = entry.target.clone();
			target.extend_from_slice(rest);
			if let Some(item) = self.resolve_in(table, module, &target, hops + 1) {
				return Some(item);
			}
		}

		if !rest.is_empty() {
			let mut child = module.to_vec();
			child.push(first.clone());
			if self.modules.contains_key(&child)
				&& let Some(item) = self.resolve_in(table, &child, rest, hops + 1)
			{
				return Some(item);
			}
		}

		for entry in uses.iter().filter(|u| u.alias.is_none()) {
			let mut target = entry.target.clone();
			target.extend_from_slice(segments);
			if let Some(item) = self.resolve_in(table, module, &target, hops + 1) {
				return Some(item);
			}
		}
		None
	}

	/// Resolves a `crate::`-prefixed path, following re-exports of the
	/// innermost existing module.
	fn resolve_absolute<'m, T>(
		&'m self,
		table: &'m BTreeMap<ModPath, T>,
		path: &[String],
		hops: usize,
	) -> Option<&'m T> {
		if let Some(item) = table.get(path) {
			return Some(item);
		}
		(1..path.len()).rev().find_map(|split| {
			let (module, rest) = path.split_at(split);
			if !self.modules.contains_key(module) || rest.is_empty() {
				return None;
			}
			self.resolve_in(table, module, rest, hops + 1)
		})
	}

	fn unique_type(&self, name: &str) -> Option<&TypeDecl> {
		let mut matches = self.types.values().filter(|d| d.ident == name && !d.generated);
		let first = matches.next()?;
		matches.next().is_none().then_some(first)
	}

	/// Template of a written type inside `scope`.
	///
	/// Aliases of the crate are expanded, so `Users` after
	/// `type Users = Pair<User>` has the template of `Pair<User>`.
	pub fn type_expr(&self, scope: &Scope<'_>, ty: &syn::Type) -> Result<TypeExpr, Unresolved> {
		self.lower(scope, ty, 0)
	}

	fn lower(&self, scope: &Scope<'_>, ty: &syn::Type, depth: usize) -> Result<TypeExpr, Unresolved> {
		match ty {
			syn::Type::Paren(p) => self.lower(scope, &p.elem, depth),
			syn::Type::Group(g) => self.lower(scope, &g.elem, depth),
			syn::Type::Infer(_) => Err(Unresolved::Inferred),
			syn::Type::ImplTrait(_) | syn::Type::TraitObject(_) => Err(Unresolved::Unsupported(ty::render(ty))),
			syn::Type::Path(p) if p.qself.is_none() => self.path_type_expr(scope, &p.path, depth),
			_ => {
				let text = ty::render(ty);
				let mentions = mentioned_idents(ty);
				if let Some(outer) = scope.outer_generics.iter().find(|g| mentions.contains(g)) {
					return Err(Unresolved::OuterGeneric(outer.clone()));
				}
				if scope.generics.iter().any(|g| mentions.contains(g)) || mentions.iter().any(|m| m == "Self") {
					return Err(Unresolved::Unsupported(text));
				}
				Ok(TypeExpr::Opaque(text))
			}
		}
	}

	fn path_type_expr(&self, scope: &Scope<'_>, path: &syn::Path, depth: usize) -> Result<TypeExpr, Unresolved> {
		let mut segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
		let last = path.segments.last().ok_or(Unresolved::Inferred)?;

		if segments.len() == 1 && path.leading_colon.is_none() {
			let name = &segments[0];
			if name == "Self" {
				return scope
					.self_ty
					.cloned()
					.ok_or_else(|| Unresolved::OuterGeneric("Self".to_string()));
			}
			if last.arguments.is_none() {
				if scope.generics.contains(name) {
					return Ok(TypeExpr::Param(name.clone()));
				}
				if scope.outer_generics.contains(name) {
					return Err(Unresolved::OuterGeneric(name.clone()));
				}
			}
		}
		if segments.first().is_some_and(|s| s == "Self") {
			return Err(Unresolved::Unsupported(ty::render(path)));
		}

		let mut args = Vec::new();
		if let syn::PathArguments::AngleBracketed(angle) = &last.arguments {
			for arg in &angle.args {
				match arg {
					syn::GenericArgument::Type(ty) => args.push(self.lower(scope, ty, depth)?),
					syn::GenericArgument::Lifetime(_) => {}
					other => args.push(TypeExpr::Opaque(ty::render(other))),
				}
			}
		}

		if path.leading_colon.is_some() {
			segments.insert(0, String::new());
			return Ok(TypeExpr::Path { segments, args });
		}
		// Declared types, then aliases, then a crate-unique type name.
		if let Some(decl) = self.resolve_item(&self.types, scope.module, &segments) {
			return Ok(TypeExpr::path(decl.path.iter(), args));
		}
		if let Some(alias) = self.resolve_alias(scope.module, &segments) {
			return self.expand_alias(alias, args, depth);
		}
		if let [name] = segments.as_slice()
			&& let Some(decl) = self.unique_type(name)
		{
			return Ok(TypeExpr::path(decl.path.iter(), args));
		}
		if let Some(expanded) = self.expand_import(scope.module, &segments) {
			segments = expanded;
		}
		Ok(TypeExpr::Path { segments, args })
	}

	/// Body of `alias` with its parameters bound to `args`.
	fn expand_alias(&self, alias: &AliasDecl, args: Vec<TypeExpr>, depth: usize) -> Result<TypeExpr, Unresolved> {
		if depth >= MAX_ALIAS_DEPTH || args.len() != alias.params.len() {
			return Err(Unresolved::Unsupported(alias.path.join("::")));
		}
		let scope = Scope {
			module: &alias.module,
			generics: &alias.params,
			outer_generics: &[],
			self_ty: None,
		};
		let body = self.lower(&scope, &alias.ty, depth + 1)?;
		let bindings: FxHashMap<String, TypeExpr> = alias.params.iter().cloned().zip(args).collect();
		Ok(body.substitute(&bindings))
	}

	/// Foreign path imported into `module` by name, spelled from its crate
	/// (`DateTime` after `use chrono::DateTime` becomes `chrono::DateTime`).
	fn expand_import(&self, module: &[String], segments: &[String]) -> Option<Vec<String>> {
		let (first, rest) = segments.split_first()?;
		let uses = &self.modules.get(module)?.uses;
		let entry = uses.iter().find(|u| u.alias.as_deref() == Some(first.as_str()))?;
		let head = entry.target.first()?;
		if matches!(head.as_str(), "crate" | "self" | "super") {
			return None;
		}
		let mut expanded = entry.target.clone();
		expanded.extend_from_slice(rest);
		Some(expanded)
	}
}

fn mentioned_idents(ty: &syn::Type) -> Vec<String> {
	use syn::visit::Visit;

	struct Idents(Vec<String>);
	impl<'ast> Visit<'ast> for Idents {
		fn visit_ident(&mut self, ident: &'ast proc_macro2::Ident) {
			self.0.push(ident.to_string());
		}
	}

	let mut idents = Idents(Vec::new());
	idents.visit_type(ty);
	idents.0
}

#[cfg(test)]
mod tests {
	use super::*;

	fn vis(src: &str) -> syn::Visibility {
		syn::parse_str(src).unwrap()
	}

	#[test]
	fn test_visible_from_root() {
		assert!(visible_from_root(&vis("pub"), 3));
		assert!(visible_from_root(&vis("pub(crate)"), 3));
		assert!(visible_from_root(&vis("pub(super)"), 1));
		assert!(!visible_from_root(&vis("pub(super)"), 2));
		assert!(visible_from_root(&syn::Visibility::Inherited, 0));
		assert!(!visible_from_root(&syn::Visibility::Inherited, 1));
		assert!(visible_from_root(&vis("pub(in crate)"), 2));
	}
}
