//! Closed-type discovery.
//!
//! # Mental Model
//!
//! 1. **Scan:** every body in the [`CrateModel`] is walked once with a scoped
//!    local environment. Query sites (`members::<T>()`, `bootstrap::<T>()`,
//!    `value.members()`, ...) yield type templates; calls to generic functions
//!    of the crate are recorded as call sites.
//! 2. **Close:** templates without parameters are usages. Templates mentioning
//!    a parameter of the enclosing function are pushed to every call site of
//!    that function, substituted with what the call site binds, and followed
//!    into the caller until they close.
//! 3. **Report:** usages are deduplicated per (type, kind) and sorted; sites
//!    that cannot be closed are reported as [`DroppedUsage`]s.
//!
//! # Termination
//!
//! Following callers is bounded by `max-generic-depth` hops and a table of
//! (function, template, kind) triples already followed at a lower or equal depth, so
//! mutually recursive forwarding ends.

mod env;

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;
use syn::punctuated::Punctuated;
use syn::visit::Visit;

use self::env::{Env, Typer, segments};
use crate::config::ScanConfig;
use crate::error::Location;
use crate::model::{ClosedType, CrateModel, FnDecl, FnId, TypeExpr, Unresolved, locate, peel};

/// Operation that requested metadata for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKind {
	/// `members::<T>()` and `value.members()`.
	Members,
	/// `enum_values::<T>()` and `enum_value_info(&value)`.
	EnumValues,
	/// `bootstrap::<T>()`.
	Bootstrap,
}

impl QueryKind {
	fn from_name(name: &str) -> Option<Self> {
		match name {
			"members" => Some(Self::Members),
			"enum_values" | "enum_value_info" => Some(Self::EnumValues),
			"bootstrap" => Some(Self::Bootstrap),
			_ => None,
		}
	}
}

impl fmt::Display for QueryKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Members => "member query",
			Self::EnumValues => "enum query",
			Self::Bootstrap => "bootstrap",
		})
	}
}

/// A closed type some code asks metadata for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedTypeUsage {
	pub ty: ClosedType,
	pub kind: QueryKind,
	/// First site, in source order, that produced this usage.
	pub location: Location,
}

/// Why a query site produced no usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
	Unresolved(Unresolved),
	/// `value.members()` on an expression whose type is not locally evident.
	UnknownReceiver,
	/// `enum_value_info(expr)` on an expression whose type is not locally evident.
	UnknownArgument,
	/// A generic function forwards its parameter but nothing calls it.
	NoCallers { function: String },
	/// A call site does not determine a forwarded parameter.
	Uninferred { param: String, function: String, call: Location },
	DepthExceeded { limit: usize },
	/// The closed type names nothing the crate declares.
	NotDeclared { ty: String },
}

impl fmt::Display for DropReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Unresolved(reason) => write!(f, "{reason}"),
			Self::UnknownReceiver => f.write_str("receiver type is not evident from the surrounding code"),
			Self::UnknownArgument => f.write_str("argument type is not evident from the surrounding code"),
			Self::NoCallers { function } => write!(f, "generic function `{function}` has no callers in this crate"),
			Self::Uninferred { param, function, call } => {
				write!(f, "call to `{function}` at {call} does not determine `{param}`")
			}
			Self::DepthExceeded { limit } => write!(f, "generic forwarding deeper than {limit} calls"),
			Self::NotDeclared { ty } => write!(f, "`{ty}` names no struct or enum declared in this crate"),
		}
	}
}

/// A query site whose type could not be closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedUsage {
	pub kind: QueryKind,
	/// The type argument or expression as written at the site.
	pub written: String,
	pub location: Location,
	pub reason: DropReason,
}

impl fmt::Display for DroppedUsage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}: {} of `{}` not registered: {}; call prism_meta::bootstrap::<T>() with the concrete type",
			self.location, self.kind, self.written, self.reason
		)
	}
}

/// Result of one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
	/// Sorted by type, then kind.
	pub usages: Vec<ClosedTypeUsage>,
	/// Sorted by location.
	pub dropped: Vec<DroppedUsage>,
}

impl Discovery {
	/// The usage set without locations, for fixed-point comparison.
	pub fn keys(&self) -> Vec<(ClosedType, QueryKind)> {
		self.usages.iter().map(|u| (u.ty.clone(), u.kind)).collect()
	}
}

/// A query site before generic forwarding.
struct Site {
	func: FnId,
	kind: QueryKind,
	written: String,
	location: Location,
	template: Result<TypeExpr, DropReason>,
}

/// A call of a generic function of the crate.
struct CallSite {
	caller: FnId,
	callee: FnId,
	/// Turbofish arguments, `None` where a written argument has no template.
	turbofish: Option<Vec<Option<TypeExpr>>>,
	/// Value argument types aligned with the callee's parameters.
	args: Vec<Option<TypeExpr>>,
	location: Location,
}

/// Finds every closed type the crate requests metadata for.
pub struct Discoverer<'m> {
	model: &'m CrateModel,
	runtime: String,
	max_depth: usize,
}

impl<'m> Discoverer<'m> {
	pub fn new(model: &'m CrateModel, config: &ScanConfig) -> Self {
		Self {
			model,
			runtime: config.runtime_crate_name().to_string(),
			max_depth: config.max_generic_depth,
		}
	}

	pub fn discover(&self) -> Discovery {
		let mut sites = Vec::new();
		let mut calls = Vec::new();
		for (id, decl) in self.model.fns() {
			let typer = Typer::new(self.model, decl);
			let mut scanner = BodyScanner {
				func: id,
				runtime: &self.runtime,
				env: typer.env(),
				typer,
				sites: &mut sites,
				calls: &mut calls,
			};
			scanner.visit_block(&decl.body);
		}

		let mut callers: FxHashMap<FnId, Vec<&CallSite>> = FxHashMap::default();
		for call in &calls {
			callers.entry(call.callee).or_default().push(call);
		}

		let mut out = Collector::default();
		let mut followed = FxHashMap::default();
		for site in &sites {
			match &site.template {
				Err(reason) => out.dropped(site, &site.location, reason.clone()),
				Ok(template) => match ClosedType::new(template.clone()) {
					Some(ty) => self.accept(ty, site, &site.location, &mut out),
					None => self.follow(&callers, site, site.func, template, 1, &mut followed, &mut out),
				},
			}
		}

		let discovery = out.finish();
		tracing::debug!(
			sites = sites.len(),
			calls = calls.len(),
			usages = discovery.usages.len(),
			dropped = discovery.dropped.len(),
			"discovery pass complete"
		);
		discovery
	}

	/// Pushes `template`, open in `func`, out to every caller of `func`.
	#[allow(clippy::too_many_arguments)]
	/// Records `ty` as used at `location` if the crate declares it.
	fn accept(&self, ty: ClosedType, site: &Site, location: &Location, out: &mut Collector) {
		if ty.segments().is_some_and(|path| self.model.type_decl(path).is_some()) {
			out.usage(ty, site.kind, location);
		} else {
			out.dropped(site, location, DropReason::NotDeclared { ty: ty.to_string() });
		}
	}

	fn follow(
		&self,
		callers: &FxHashMap<FnId, Vec<&CallSite>>,
		site: &Site,
		func: FnId,
		template: &TypeExpr,
		depth: usize,
		followed: &mut FxHashMap<(FnId, TypeExpr, QueryKind), usize>,
		out: &mut Collector,
	) {
		if depth > self.max_depth {
			out.dropped(site, &site.location, DropReason::DepthExceeded { limit: self.max_depth });
			return;
		}
		let key = (func, template.clone(), site.kind);
		match followed.get(&key) {
			Some(seen) if *seen <= depth => return,
			_ => {
				followed.insert(key, depth);
			}
		}

		let callee = self.model.fn_decl(func);
		let Some(calls) = callers.get(&func) else {
			out.dropped(
				site,
				&site.location,
				DropReason::NoCallers {
					function: callee.name.clone(),
				},
			);
			return;
		};

		for call in calls {
			let bindings = self.bind(callee, call);
			if let Some(param) = template.params().into_iter().find(|p| !bindings.contains_key(*p)) {
				out.dropped(
					site,
					&site.location,
					DropReason::Uninferred {
						param: param.to_string(),
						function: callee.name.clone(),
						call: call.location.clone(),
					},
				);
				continue;
			}
			let next = template.substitute(&bindings);
			match ClosedType::new(next.clone()) {
				Some(ty) => self.accept(ty, site, &call.location, out),
				None => self.follow(callers, site, call.caller, &next, depth + 1, followed, out),
			}
		}
	}

	/// What a call site binds the callee's type parameters to: turbofish
	/// arguments first, then parameters typed `T`, `&T`, `&mut T` or a path
	/// type mentioning `T`, matched against the argument types.
	fn bind(&self, callee: &FnDecl, call: &CallSite) -> FxHashMap<String, TypeExpr> {
		let mut bindings = FxHashMap::default();
		if let Some(turbofish) = &call.turbofish
			&& turbofish.len() == callee.generics.len()
		{
			for (param, arg) in callee.generics.iter().zip(turbofish) {
				if let Some(arg) = arg {
					bindings.insert(param.clone(), arg.clone());
				}
			}
		}
		if bindings.len() == callee.generics.len() {
			return bindings;
		}

		let scope = callee.scope(None);
		for (param, arg) in callee.params.iter().zip(&call.args) {
			let Some(arg) = arg else {
				continue;
			};
			if let Ok(pattern) = self.model.type_expr(&scope, peel(&param.ty)) {
				unify(&pattern, arg, &mut bindings);
			}
		}
		bindings
	}
}

/// Binds parameters of `pattern` to the matching parts of `actual`.
fn unify(pattern: &TypeExpr, actual: &TypeExpr, bindings: &mut FxHashMap<String, TypeExpr>) {
	match (pattern, actual) {
		(TypeExpr::Param(name), _) => {
			bindings.entry(name.clone()).or_insert_with(|| actual.clone());
		}
		(
			TypeExpr::Path {
				segments: ps,
				args: pa,
			},
			TypeExpr::Path {
				segments: as_,
				args: aa,
			},
		) if ps.last() == as_.last() && pa.len() == aa.len() => {
			for (p, a) in pa.iter().zip(aa) {
				unify(p, a, bindings);
			}
		}
		_ => {}
	}
}

#[derive(Default)]
struct Collector {
	usages: BTreeMap<(ClosedType, QueryKind), Location>,
	dropped: Vec<DroppedUsage>,
}

impl Collector {
	fn usage(&mut self, ty: ClosedType, kind: QueryKind, location: &Location) {
		tracing::debug!(ty = %ty, %kind, %location, "usage");
		self.usages
			.entry((ty, kind))
			.and_modify(|seen| {
				if *location < *seen {
					*seen = location.clone();
				}
			})
			.or_insert_with(|| location.clone());
	}

	fn dropped(&mut self, site: &Site, location: &Location, reason: DropReason) {
		tracing::debug!(written = %site.written, %location, %reason, "dropped usage");
		self.dropped.push(DroppedUsage {
			kind: site.kind,
			written: site.written.clone(),
			location: location.clone(),
			reason,
		});
	}

	fn finish(self) -> Discovery {
		let usages = self
			.usages
			.into_iter()
			.map(|((ty, kind), location)| ClosedTypeUsage { ty, kind, location })
			.collect();
		let mut dropped = self.dropped;
		dropped.sort_by(|a, b| {
			(&a.location, &a.written, a.reason.to_string()).cmp(&(&b.location, &b.written, b.reason.to_string()))
		});
		dropped.dedup();
		Discovery { usages, dropped }
	}
}

struct BodyScanner<'a, 'm> {
	func: FnId,
	runtime: &'a str,
	typer: Typer<'m>,
	env: Env,
	sites: &'a mut Vec<Site>,
	calls: &'a mut Vec<CallSite>,
}

impl BodyScanner<'_, '_> {
	fn location(&self, node: &impl syn::spanned::Spanned) -> Location {
		locate(&self.typer.decl.file, node)
	}

	/// Whether `path` names a function of the runtime crate.
	fn is_runtime_path(&self, path: &syn::Path) -> bool {
		let model = self.typer.model;
		let module = model.module(&self.typer.decl.module);
		let uses = module.map(|m| m.uses.as_slice()).unwrap_or(&[]);
		let is_runtime = |target: &[String]| {
			target
				.iter()
				.find(|s| !s.is_empty())
				.is_some_and(|s| s == self.runtime)
		};

		let segments = segments(path);
		match segments.as_slice() {
			[name] => {
				let imported = uses.iter().any(|u| match &u.alias {
					Some(alias) => alias == name && is_runtime(&u.target),
					None => is_runtime(&u.target),
				});
				let shadowed = model.fns_named(name).iter().any(|id| model.fn_decl(*id).owner.is_none());
				imported || !shadowed
			}
			[first, ..] => {
				first == self.runtime
					|| uses
						.iter()
						.any(|u| u.alias.as_deref() == Some(first.as_str()) && is_runtime(&u.target))
			}
			[] => false,
		}
	}

	fn site(&mut self, kind: QueryKind, written: String, location: Location, template: Result<TypeExpr, DropReason>) {
		self.sites.push(Site {
			func: self.func,
			kind,
			written,
			location,
			template,
		});
	}

	fn type_site(&mut self, kind: QueryKind, ty: &syn::Type, location: Location) {
		let template = self.typer.ty(ty).map_err(DropReason::Unresolved);
		self.site(kind, crate::model::ty::render(ty), location, template);
	}

	fn value_site(&mut self, kind: QueryKind, expr: &syn::Expr, location: Location, unknown: DropReason) {
		let template = self.typer.infer(&self.env, expr).ok_or(unknown);
		self.site(kind, crate::model::ty::render(expr), location, template);
	}

	/// Records calls of generic functions named `name`.
	fn record_call(
		&mut self,
		name: &str,
		candidates: impl Fn(&FnDecl) -> bool,
		turbofish: &[&syn::Type],
		receiver: Option<&syn::Expr>,
		args: &[&syn::Expr],
		location: Location,
	) {
		let model = self.typer.model;
		for &callee in model.fns_named(name) {
			let decl = model.fn_decl(callee);
			if !decl.is_generic() || !candidates(decl) {
				continue;
			}
			let turbofish =
				(!turbofish.is_empty()).then(|| turbofish.iter().map(|ty| self.typer.ty(ty).ok()).collect());
			// `Type::method(&value, ..)` passes the receiver positionally.
			let values = match (receiver, decl.receiver) {
				(None, true) => args.get(1..).unwrap_or(&[]),
				_ => args,
			};
			let args = values.iter().map(|arg| self.typer.infer(&self.env, arg)).collect();
			self.calls.push(CallSite {
				caller: self.func,
				callee,
				turbofish,
				args,
				location: location.clone(),
			});
		}
	}

	fn scan_call(&mut self, call: &syn::ExprCall) {
		let syn::Expr::Path(func) = &*call.func else {
			return;
		};
		if func.qself.is_some() {
			return;
		}
		let Some(last) = func.path.segments.last() else {
			return;
		};
		let name = last.ident.to_string();
		let turbofish = type_args(&last.arguments);
		let args: Vec<&syn::Expr> = call.args.iter().collect();
		let location = self.location(call);

		if let Some(kind) = QueryKind::from_name(&name)
			&& self.is_runtime_path(&func.path)
		{
			match (turbofish.as_slice(), args.as_slice()) {
				([ty], _) => self.type_site(kind, ty, location),
				([], [value]) if name == "enum_value_info" => {
					self.value_site(kind, value, location, DropReason::UnknownArgument)
				}
				_ => {}
			}
			return;
		}

		let qualifier = segments(&func.path);
		let qualifier = &qualifier[..qualifier.len() - 1];
		let owner = match qualifier {
			[] => None,
			[only] if only == "Self" => self.typer.self_ty.as_ref().and_then(|t| t.ident()).map(str::to_string),
			_ => self
				.typer
				.model
				.resolve_type(&self.typer.decl.module, qualifier)
				.map(|d| d.ident.clone()),
		};
		self.record_call(
			&name,
			|decl| decl.owner == owner,
			&turbofish,
			None,
			&args,
			location,
		);
	}

	fn scan_method_call(&mut self, call: &syn::ExprMethodCall) {
		let name = call.method.to_string();
		let turbofish: Vec<&syn::Type> = call
			.turbofish
			.as_ref()
			.map(|t| {
				t.args
					.iter()
					.filter_map(|a| match a {
						syn::GenericArgument::Type(ty) => Some(ty),
						_ => None,
					})
					.collect()
			})
			.unwrap_or_default();
		let args: Vec<&syn::Expr> = call.args.iter().collect();
		let location = self.location(call);

		if let Some(kind) = QueryKind::from_name(&name) {
			match (name.as_str(), turbofish.as_slice(), args.as_slice()) {
				(_, [ty], _) => return self.type_site(kind, ty, location),
				("enum_value_info", [], [value]) => {
					return self.value_site(kind, value, location, DropReason::UnknownArgument);
				}
				("members" | "enum_value_info", [], []) => return self.extension_site(kind, call, location),
				_ => {}
			}
		}

		let receiver_owner = self
			.typer
			.infer(&self.env, &call.receiver)
			.and_then(|t| t.ident().map(str::to_string));
		let has_owned_candidate = receiver_owner.as_ref().is_some_and(|owner| {
			let model = self.typer.model;
			model
				.fns_named(&name)
				.iter()
				.any(|id| model.fn_decl(*id).owner.as_ref() == Some(owner))
		});
		self.record_call(
			&name,
			|decl| decl.receiver && (!has_owned_candidate || decl.owner == receiver_owner),
			&turbofish,
			Some(&call.receiver),
			&args,
			location,
		);
	}

	/// `value.members()` / `value.enum_value_info()` through the extension trait.
	fn extension_site(&mut self, kind: QueryKind, call: &syn::ExprMethodCall, location: Location) {
		let written = crate::model::ty::render(&call.receiver);
		match self.typer.infer(&self.env, &call.receiver) {
			None => self.site(kind, written, location, Err(DropReason::UnknownReceiver)),
			Some(ty @ TypeExpr::Param(_)) => self.site(kind, written, location, Ok(ty)),
			Some(ty) if ty.is_local() => {
				// An inherent method of the same name shadows the extension trait.
				let model = self.typer.model;
				let method = call.method.to_string();
				let shadowed = model.fns_named(&method).iter().any(|id| {
					let f = model.fn_decl(*id);
					f.receiver && f.owner.as_deref() == ty.ident()
				});
				if !shadowed {
					self.site(kind, written, location, Ok(ty));
				}
			}
			Some(_) => {}
		}
	}

	fn bind_local(&mut self, local: &syn::Local) {
		let init = local.init.as_ref().map(|init| &*init.expr);
		match &local.pat {
			syn::Pat::Type(typed) => match crate::model::pat_ident(&typed.pat) {
				Some(name) => {
					let ty = self.typer.binding_ty(&typed.ty);
					self.env.bind(name, ty);
				}
				None => self.env.bind_unknown(&typed.pat),
			},
			syn::Pat::Ident(ident) if ident.subpat.is_none() => {
				let ty = init.and_then(|e| self.typer.infer(&self.env, e));
				self.env.bind(ident.ident.to_string(), ty);
			}
			pat => self.env.bind_unknown(pat),
		}
	}
}

impl<'ast> Visit<'ast> for BodyScanner<'_, '_> {
	fn visit_block(&mut self, block: &'ast syn::Block) {
		self.env.push();
		for stmt in &block.stmts {
			self.visit_stmt(stmt);
		}
		self.env.pop();
	}

	fn visit_local(&mut self, local: &'ast syn::Local) {
		if let Some(init) = &local.init {
			self.visit_expr(&init.expr);
			if let Some((_, diverge)) = &init.diverge {
				self.visit_expr(diverge);
			}
		}
		self.bind_local(local);
	}

	fn visit_expr_closure(&mut self, closure: &'ast syn::ExprClosure) {
		self.env.push();
		for input in &closure.inputs {
			match input {
				syn::Pat::Type(typed) => {
					let ty = self.typer.binding_ty(&typed.ty);
					match crate::model::pat_ident(&typed.pat) {
						Some(name) => self.env.bind(name, ty),
						None => self.env.bind_unknown(&typed.pat),
					}
				}
				pat => self.env.bind_unknown(pat),
			}
		}
		self.visit_expr(&closure.body);
		self.env.pop();
	}

	fn visit_arm(&mut self, arm: &'ast syn::Arm) {
		self.env.push();
		self.env.bind_unknown(&arm.pat);
		if let Some((_, guard)) = &arm.guard {
			self.visit_expr(guard);
		}
		self.visit_expr(&arm.body);
		self.env.pop();
	}

	fn visit_expr_for_loop(&mut self, for_loop: &'ast syn::ExprForLoop) {
		self.visit_expr(&for_loop.expr);
		self.env.push();
		self.env.bind_unknown(&for_loop.pat);
		self.visit_block(&for_loop.body);
		self.env.pop();
	}

	fn visit_expr_let(&mut self, expr: &'ast syn::ExprLet) {
		self.visit_expr(&expr.expr);
		self.env.bind_unknown(&expr.pat);
	}

	fn visit_expr_call(&mut self, call: &'ast syn::ExprCall) {
		self.scan_call(call);
		syn::visit::visit_expr_call(self, call);
	}

	fn visit_expr_method_call(&mut self, call: &'ast syn::ExprMethodCall) {
		self.scan_method_call(call);
		syn::visit::visit_expr_method_call(self, call);
	}

	/// Macro bodies shaped like argument lists (`assert_eq!`, `println!`,
	/// `vec!`) are scanned as expressions.
	fn visit_macro(&mut self, mac: &'ast syn::Macro) {
		if let Ok(exprs) = mac.parse_body_with(Punctuated::<syn::Expr, syn::Token![,]>::parse_terminated) {
			for expr in &exprs {
				Visit::visit_expr(self, expr);
			}
		}
	}

	// Nested items are indexed as bodies of their own.
	fn visit_item(&mut self, _: &'ast syn::Item) {}
}

fn type_args(arguments: &syn::PathArguments) -> Vec<&syn::Type> {
	match arguments {
		syn::PathArguments::AngleBracketed(angle) => angle
			.args
			.iter()
			.filter_map(|a| match a {
				syn::GenericArgument::Type(ty) => Some(ty),
				_ => None,
			})
			.collect(),
		_ => Vec::new(),
	}
}

#[cfg(test)]
mod tests;
