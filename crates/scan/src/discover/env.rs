//! Local typing of expressions inside one function body.
//!
//! It is shallow: it knows what a binding was annotated or
//! initialized with, what a constructor returns and little else. Anything it
//! cannot see is `None` and the caller decides whether that drops a usage.

use rustc_hash::FxHashMap;
use syn::visit::Visit;

use crate::model::{CrateModel, FnDecl, Scope, TypeDecl, TypeExpr, Unresolved, peel};

/// Scoped bindings of a body. `None` marks a binding of unknown type, which
/// still shadows outer bindings of the same name.
#[derive(Debug, Default)]
pub struct Env {
	scopes: Vec<FxHashMap<String, Option<TypeExpr>>>,
}

impl Env {
	pub fn new() -> Self {
		Self {
			scopes: vec![FxHashMap::default()],
		}
	}

	pub fn push(&mut self) {
		self.scopes.push(FxHashMap::default());
	}

	pub fn pop(&mut self) {
		if self.scopes.len() > 1 {
			self.scopes.pop();
		}
	}

	pub fn bind(&mut self, name: String, ty: Option<TypeExpr>) {
		if let Some(scope) = self.scopes.last_mut() {
			scope.insert(name, ty);
		}
	}

	/// Binds every identifier in `pat` as unknown.
	pub fn bind_unknown(&mut self, pat: &syn::Pat) {
		for name in pat_idents(pat) {
			self.bind(name, None);
		}
	}

	pub fn lookup(&self, name: &str) -> Option<&TypeExpr> {
		self.scopes
			.iter()
			.rev()
			.find_map(|scope| scope.get(name))
			.and_then(Option::as_ref)
	}

	pub fn is_bound(&self, name: &str) -> bool {
		self.scopes.iter().any(|scope| scope.contains_key(name))
	}
}

/// Identifiers bound by a pattern.
pub fn pat_idents(pat: &syn::Pat) -> Vec<String> {
	struct Idents(Vec<String>);
	impl<'ast> Visit<'ast> for Idents {
		fn visit_pat_ident(&mut self, pat: &'ast syn::PatIdent) {
			self.0.push(pat.ident.to_string());
			syn::visit::visit_pat_ident(self, pat);
		}
	}

	let mut idents = Idents(Vec::new());
	idents.visit_pat(pat);
	idents.0
}

/// Expression typing for the body of one function.
pub struct Typer<'a> {
	pub model: &'a CrateModel,
	pub decl: &'a FnDecl,
	pub self_ty: Option<TypeExpr>,
}

impl<'a> Typer<'a> {
	pub fn new(model: &'a CrateModel, decl: &'a FnDecl) -> Self {
		Self {
			model,
			decl,
			self_ty: self_type(model, decl),
		}
	}

	pub fn scope(&self) -> Scope<'_> {
		self.decl.scope(self.self_ty.as_ref())
	}

	/// Template of a written type in this body.
	pub fn ty(&self, ty: &syn::Type) -> Result<TypeExpr, Unresolved> {
		self.model.type_expr(&self.scope(), ty)
	}

	/// Template of a binding or parameter type, looking through references.
	pub fn binding_ty(&self, ty: &syn::Type) -> Option<TypeExpr> {
		self.ty(peel(ty)).ok()
	}

	/// Initial environment: typed parameters of the function.
	pub fn env(&self) -> Env {
		let mut env = Env::new();
		for param in &self.decl.params {
			if let Some(name) = &param.name {
				env.bind(name.clone(), self.binding_ty(&param.ty));
			}
		}
		env
	}

	/// Type of `expr`, if it is locally evident.
	pub fn infer(&self, env: &Env, expr: &syn::Expr) -> Option<TypeExpr> {
		match expr {
			syn::Expr::Paren(e) => self.infer(env, &e.expr),
			syn::Expr::Group(e) => self.infer(env, &e.expr),
			syn::Expr::Reference(e) => self.infer(env, &e.expr),
			syn::Expr::Unary(syn::ExprUnary {
				op: syn::UnOp::Deref(_),
				expr,
				..
			}) => self.infer(env, expr),
			syn::Expr::Cast(e) => self.ty(&e.ty).ok(),
			syn::Expr::Path(e) if e.qself.is_none() => self.infer_path(env, &e.path),
			syn::Expr::Struct(e) if e.qself.is_none() => self.constructed(&e.path),
			syn::Expr::Call(call) => match &*call.func {
				syn::Expr::Path(func) if func.qself.is_none() => self.infer_call(&func.path),
				_ => None,
			},
			syn::Expr::MethodCall(call) => self.infer_method(env, call),
			_ => None,
		}
	}

	fn infer_path(&self, env: &Env, path: &syn::Path) -> Option<TypeExpr> {
		if let Some(ident) = path.get_ident() {
			let name = ident.to_string();
			if name == "self" {
				return self.self_ty.clone();
			}
			if env.is_bound(&name) {
				return env.lookup(&name).cloned();
			}
		}
		// Unit struct or unit variant.
		self.constructed(path)
	}

	/// Type produced by naming `path` as a value: a struct literal, tuple or
	/// unit struct, or an enum variant.
	fn constructed(&self, path: &syn::Path) -> Option<TypeExpr> {
		let segments = segments(path);
		if segments.first().is_some_and(|s| s == "Self") {
			return match segments.len() {
				1 => self.self_ty.clone(),
				2 => self
					.self_ty
					.clone()
					.filter(|ty| self.local(ty).is_some_and(|d| d.has_variant(&segments[1]))),
				_ => None,
			};
		}
		let module = &self.decl.module;
		if let Some(decl) = self.model.resolve_type(module, &segments)
			&& !decl.is_enum()
		{
			return self.instance(decl, path.segments.last()?);
		}
		let decl = self.model.resolve_variant(module, &segments)?;
		let enum_segment = path.segments.iter().nth_back(1)?;
		self.instance(decl, enum_segment)
	}

	/// `decl` instantiated with the turbofish on `segment`, if it needs one.
	fn instance(&self, decl: &TypeDecl, segment: &syn::PathSegment) -> Option<TypeExpr> {
		let params = decl.type_params();
		let args: Vec<TypeExpr> = match &segment.arguments {
			syn::PathArguments::AngleBracketed(angle) => angle
				.args
				.iter()
				.filter_map(|arg| match arg {
					syn::GenericArgument::Type(ty) => Some(self.ty(ty).ok()),
					_ => None,
				})
				.collect::<Option<_>>()?,
			_ => Vec::new(),
		};
		(args.len() == params.len()).then(|| TypeExpr::Path {
			segments: decl.path.clone(),
			args,
		})
	}

	fn infer_call(&self, path: &syn::Path) -> Option<TypeExpr> {
		if let Some(ty) = self.constructed(path) {
			return Some(ty);
		}
		let segments: Vec<&syn::PathSegment> = path.segments.iter().collect();
		let (last, qualifier) = segments.split_last()?;
		let name = last.ident.to_string();
		if qualifier.is_empty() {
			return self.returned(self.unique(&name, |f| f.owner.is_none())?);
		}

		let qualifier: Vec<String> = qualifier.iter().map(|s| s.ident.to_string()).collect();
		let owner = if qualifier == ["Self"] {
			self.self_ty.clone()?
		} else if let Some(decl) = self.model.resolve_type(&self.decl.module, &qualifier) {
			TypeExpr::path(decl.path.iter(), Vec::new())
		} else {
			return self.returned(self.unique(&name, |f| f.owner.is_none())?);
		};
		let ident = owner.ident()?.to_string();
		let callee = self.unique(&name, |f| f.owner.as_deref() == Some(&ident) && !f.receiver)?;
		self.returned_for(callee, &owner)
	}

	fn infer_method(&self, env: &Env, call: &syn::ExprMethodCall) -> Option<TypeExpr> {
		let receiver = self.infer(env, &call.receiver)?;
		let name = call.method.to_string();
		if matches!(name.as_str(), "clone" | "to_owned") && call.args.is_empty() {
			return Some(receiver);
		}
		let ident = receiver.ident()?.to_string();
		let callee = self.unique(&name, |f| f.owner.as_deref() == Some(&ident) && f.receiver)?;
		self.returned_for(callee, &receiver)
	}

	/// The only non-generic callable named `name` accepted by `filter`.
	fn unique(&self, name: &str, filter: impl Fn(&FnDecl) -> bool) -> Option<&'a FnDecl> {
		let mut found = self
			.model
			.fns_named(name)
			.iter()
			.map(|id| self.model.fn_decl(*id))
			.filter(|f| !f.is_generic() && filter(f));
		let first = found.next()?;
		found.next().is_none().then_some(first)
	}

	/// Closed return type of a free function.
	fn returned(&self, callee: &FnDecl) -> Option<TypeExpr> {
		let output = callee.output.as_ref()?;
		let ty = self.model.type_expr(&Scope::module(&callee.module), peel(output)).ok()?;
		ty.is_closed().then_some(ty)
	}

	/// Closed return type of an associated function of `owner`.
	fn returned_for(&self, callee: &FnDecl, owner: &TypeExpr) -> Option<TypeExpr> {
		let output = callee.output.as_ref()?;
		let scope = Scope {
			module: &callee.module,
			generics: &[],
			outer_generics: &callee.outer_generics,
			self_ty: Some(owner),
		};
		let ty = self.model.type_expr(&scope, peel(output)).ok()?;
		ty.is_closed().then_some(ty)
	}

	fn local(&self, ty: &TypeExpr) -> Option<&'a TypeDecl> {
		match ty {
			TypeExpr::Path { segments, .. } => self.model.type_decl(segments),
			_ => None,
		}
	}
}

/// Self type of an impl method, when it is closed.
fn self_type(model: &CrateModel, decl: &FnDecl) -> Option<TypeExpr> {
	let self_ty = decl.self_ty.as_ref()?;
	let scope = Scope {
		module: &decl.module,
		generics: &[],
		outer_generics: &decl.outer_generics,
		self_ty: None,
	};
	model.type_expr(&scope, self_ty).ok().filter(TypeExpr::is_closed)
}

pub fn segments(path: &syn::Path) -> Vec<String> {
	path.segments.iter().map(|s| s.ident.to_string()).collect()
}
