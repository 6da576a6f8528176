//! Source model of the crate being described.
//!
//! The model is the scanner's view of the crate: every module reachable from
//! the crate root, the type declarations and function bodies inside them and
//! the `use` declarations needed to resolve written paths. It is built from
//! `syn` ASTs only; nothing is expanded or type checked.

mod resolve;
pub mod ty;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use proc_macro2::Span;
use rustc_hash::FxHashMap;
pub use resolve::{Scope, Unresolved, visible_from_root};
use syn::spanned::Spanned;
pub use ty::{ClosedType, TypeExpr};

use crate::error::{Location, Result, ScanError};

/// Absolute module or item path, starting with `crate`.
pub type ModPath = Vec<String>;

/// File name reported for units added with [`CrateModel::set_generated`].
pub const GENERATED_FILE: &str = "<generated>";

/// A module of the crate.
#[derive(Debug, Clone)]
pub struct Module {
	pub path: ModPath,
	/// Visibility of the `mod` declaration.
	pub vis: syn::Visibility,
	pub file: PathBuf,
	pub uses: Vec<UseEntry>,
	generated: bool,
}

/// One name brought into scope by a `use` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseEntry {
	/// Name introduced into the module; `None` for glob imports.
	pub alias: Option<String>,
	/// Target path as written, relative to the importing module.
	pub target: Vec<String>,
}

/// Declaration behind a [`TypeDecl`].
#[derive(Debug, Clone)]
pub enum TypeKind {
	Struct(syn::ItemStruct),
	Enum(syn::ItemEnum),
	Union(syn::ItemUnion),
}

/// A struct, enum or union declared in the crate.
#[derive(Debug, Clone)]
pub struct TypeDecl {
	/// Absolute path, e.g. `crate::model::User`.
	pub path: ModPath,
	pub module: ModPath,
	pub ident: String,
	pub kind: TypeKind,
	pub file: PathBuf,
	generated: bool,
}

impl TypeDecl {
	pub fn vis(&self) -> &syn::Visibility {
		match &self.kind {
			TypeKind::Struct(item) => &item.vis,
			TypeKind::Enum(item) => &item.vis,
			TypeKind::Union(item) => &item.vis,
		}
	}

	pub fn generics(&self) -> &syn::Generics {
		match &self.kind {
			TypeKind::Struct(item) => &item.generics,
			TypeKind::Enum(item) => &item.generics,
			TypeKind::Union(item) => &item.generics,
		}
	}

	/// Names of the type parameters, in declaration order.
	pub fn type_params(&self) -> Vec<String> {
		self.generics().type_params().map(|p| p.ident.to_string()).collect()
	}

	/// Number of modules between the declaration and the crate root.
	pub fn depth(&self) -> usize {
		self.module.len() - 1
	}

	pub fn location(&self) -> Location {
		let span = match &self.kind {
			TypeKind::Struct(item) => item.ident.span(),
			TypeKind::Enum(item) => item.ident.span(),
			TypeKind::Union(item) => item.ident.span(),
		};
		Location::from_span(&self.file, span)
	}

	pub fn is_enum(&self) -> bool {
		matches!(self.kind, TypeKind::Enum(_))
	}

	/// Whether `name` is a variant of this enum.
	pub fn has_variant(&self, name: &str) -> bool {
		match &self.kind {
			TypeKind::Enum(item) => item.variants.iter().any(|v| v.ident == name),
			_ => false,
		}
	}
}

/// A `type` alias declared in the crate.
#[derive(Debug, Clone)]
pub struct AliasDecl {
	pub path: ModPath,
	pub module: ModPath,
	/// Type parameters, replaced by the arguments written at each use.
	pub params: Vec<String>,
	pub ty: syn::Type,
	generated: bool,
}

/// A `const` item declared in the crate.
#[derive(Debug, Clone)]
pub struct ConstDecl {
	pub path: ModPath,
	pub module: ModPath,
	pub ty: syn::Type,
	pub expr: syn::Expr,
	generated: bool,
}

/// Index of a function body in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FnId(pub usize);

/// A value parameter of a function.
#[derive(Debug, Clone)]
pub struct FnParam {
	/// Binding name when the pattern is a plain identifier.
	pub name: Option<String>,
	pub ty: syn::Type,
}

/// A function body: free function, impl or trait method, or the initializer
/// of a `const`/`static` item.
#[derive(Debug, Clone)]
pub struct FnDecl {
	pub name: String,
	pub module: ModPath,
	/// Last segment of the impl self type, or the trait name.
	pub owner: Option<String>,
	/// Self type of the enclosing impl.
	pub self_ty: Option<syn::Type>,
	/// Type parameters of the function itself.
	pub generics: Vec<String>,
	/// Type parameters of the enclosing impl or trait.
	pub outer_generics: Vec<String>,
	pub receiver: bool,
	pub params: Vec<FnParam>,
	pub output: Option<syn::Type>,
	pub body: syn::Block,
	pub file: PathBuf,
	pub span: Span,
	/// Whether callers can name this body.
	pub callable: bool,
	generated: bool,
}

impl FnDecl {
	pub fn location(&self) -> Location {
		Location::from_span(&self.file, self.span)
	}

	pub fn is_generic(&self) -> bool {
		!self.generics.is_empty()
	}

	/// Whether the body comes from the generated registration unit.
	pub fn is_generated(&self) -> bool {
		self.generated
	}

	/// Resolution scope of the body.
	pub fn scope<'a>(&'a self, self_ty: Option<&'a TypeExpr>) -> Scope<'a> {
		Scope {
			module: &self.module,
			generics: &self.generics,
			outer_generics: &self.outer_generics,
			self_ty,
		}
	}
}

/// Everything the scanner knows about the crate.
#[derive(Debug, Clone, Default)]
pub struct CrateModel {
	modules: BTreeMap<ModPath, Module>,
	types: BTreeMap<ModPath, TypeDecl>,
	aliases: BTreeMap<ModPath, AliasDecl>,
	consts: BTreeMap<ModPath, ConstDecl>,
	fns: Vec<FnDecl>,
	fns_by_name: FxHashMap<String, Vec<FnId>>,
	files: Vec<PathBuf>,
}

struct UnitCtx<'a> {
	file: &'a Path,
	/// Directory holding the files of child modules; `None` when `mod x;`
	/// declarations are not followed.
	child_dir: Option<PathBuf>,
	generated: bool,
}

impl CrateModel {
	/// Loads the module tree rooted at `root` (usually `src/lib.rs`).
	pub fn load(root: &Path) -> Result<Self> {
		let mut model = Self::default();
		let child_dir = root.parent().map(Path::to_path_buf).unwrap_or_default();
		model.load_file(root, crate_path(), Some(child_dir))?;
		model.reindex();
		tracing::debug!(
			files = model.files.len(),
			modules = model.modules.len(),
			types = model.types.len(),
			bodies = model.fns.len(),
			"crate model loaded"
		);
		Ok(model)
	}

	/// Builds a model from in-memory `(module path, source)` pairs such as
	/// `("crate", "...")` and `("crate::model", "...")`. `mod x;` declarations
	/// are recorded but not followed; their sources are expected in the list.
	pub fn from_sources<'a>(sources: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
		let mut model = Self::default();
		for (module, source) in sources {
			let path: ModPath = module.split("::").map(str::to_string).collect();
			let file = synthetic_file(&path);
			let ast = syn::parse_file(source).map_err(|e| ScanError::parse(&file, &e))?;
			for len in 1..path.len() {
				model.declare_module(&path[..len], None, false);
			}
			model.open_module(&path, &file, false);
			model.files.push(file.clone());
			let ctx = UnitCtx {
				file: &file,
				child_dir: None,
				generated: false,
			};
			model.index_items(&ast.items, &path, &ctx)?;
		}
		model.reindex();
		Ok(model)
	}

	/// Replaces the generated unit with `source`, indexed as if included at
	/// the crate root.
	pub fn set_generated(&mut self, source: &str) -> Result<()> {
		self.modules.retain(|_, m| !m.generated);
		self.types.retain(|_, t| !t.generated);
		self.aliases.retain(|_, a| !a.generated);
		self.consts.retain(|_, c| !c.generated);
		self.fns.retain(|f| !f.generated);

		let file = PathBuf::from(GENERATED_FILE);
		let ast = syn::parse_file(source).map_err(|e| ScanError::parse(&file, &e))?;
		let ctx = UnitCtx {
			file: &file,
			child_dir: None,
			generated: true,
		};
		self.index_items(&ast.items, &crate_path(), &ctx)?;
		self.reindex();
		Ok(())
	}

	pub fn module(&self, path: &[String]) -> Option<&Module> {
		self.modules.get(path)
	}

	/// Declaration at an absolute path.
	pub fn type_decl(&self, path: &[String]) -> Option<&TypeDecl> {
		self.types.get(path)
	}

	pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
		self.types.values()
	}

	pub fn fns(&self) -> impl Iterator<Item = (FnId, &FnDecl)> {
		self.fns.iter().enumerate().map(|(i, f)| (FnId(i), f))
	}

	pub fn fn_decl(&self, id: FnId) -> &FnDecl {
		&self.fns[id.0]
	}

	/// Callable bodies named `name`.
	pub fn fns_named(&self, name: &str) -> &[FnId] {
		self.fns_by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Source files the model was loaded from, in load order.
	pub fn files(&self) -> &[PathBuf] {
		&self.files
	}

	/// Whether the crate root can name `decl`.
	pub fn is_nameable(&self, decl: &TypeDecl) -> bool {
		if !visible_from_root(decl.vis(), decl.depth()) {
			return false;
		}
		(3..=decl.module.len()).all(|len| {
			self.modules
				.get(&decl.module[..len])
				.is_none_or(|m| visible_from_root(&m.vis, len - 2))
		})
	}

	fn load_file(&mut self, path: &Path, module: ModPath, child_dir: Option<PathBuf>) -> Result<()> {
		let source = std::fs::read_to_string(path).map_err(|e| ScanError::io(path, e))?;
		let ast = syn::parse_file(&source).map_err(|e| ScanError::parse(path, &e))?;
		self.open_module(&module, path, false);
		self.files.push(path.to_path_buf());
		let ctx = UnitCtx {
			file: path,
			child_dir,
			generated: false,
		};
		self.index_items(&ast.items, &module, &ctx)
	}

	fn declare_module(&mut self, path: &[String], vis: Option<&syn::Visibility>, generated: bool) {
		let module = self.modules.entry(path.to_vec()).or_insert_with(|| Module {
			path: path.to_vec(),
			vis: syn::Visibility::Inherited,
			file: PathBuf::new(),
			uses: Vec::new(),
			generated,
		});
		if let Some(vis) = vis {
			module.vis = vis.clone();
		}
	}

	fn open_module(&mut self, path: &[String], file: &Path, generated: bool) {
		self.declare_module(path, None, generated);
		if let Some(module) = self.modules.get_mut(path) {
			module.file = file.to_path_buf();
		}
	}

	fn index_items(&mut self, items: &[syn::Item], module: &ModPath, ctx: &UnitCtx<'_>) -> Result<()> {
		for item in items {
			match item {
				syn::Item::Struct(item) => self.add_type(module, &item.ident, TypeKind::Struct(item.clone()), ctx),
				syn::Item::Enum(item) => self.add_type(module, &item.ident, TypeKind::Enum(item.clone()), ctx),
				syn::Item::Union(item) => self.add_type(module, &item.ident, TypeKind::Union(item.clone()), ctx),
				syn::Item::Fn(item) => {
					let decl = self.fn_from_sig(&item.sig, &item.block, module, None, &[], ctx);
					self.add_fn(decl, &item.block, module, ctx);
				}
				syn::Item::Impl(item) => self.index_impl(item, module, ctx),
				syn::Item::Trait(item) => self.index_trait(item, module, ctx),
				syn::Item::Const(item) => {
					self.add_const(item, module, ctx);
					self.add_initializer(format!("const {}", item.ident), &item.expr, item.ident.span(), module, ctx)
				}
				syn::Item::Type(item) => self.add_alias(item, module, ctx),
				syn::Item::Static(item) => {
					self.add_initializer(format!("static {}", item.ident), &item.expr, item.ident.span(), module, ctx)
				}
				syn::Item::Use(item) => {
					let mut entries = Vec::new();
					let prefix = if item.leading_colon.is_some() {
						vec![String::new()]
					} else {
						Vec::new()
					};
					flatten_use(&item.tree, prefix, &mut entries);
					if let Some(m) = self.modules.get_mut(module) {
						m.uses.extend(entries);
					}
				}
				syn::Item::Mod(item) => self.index_mod(item, module, ctx)?,
				_ => {}
			}
		}
		Ok(())
	}

	fn index_mod(&mut self, item: &syn::ItemMod, parent: &ModPath, ctx: &UnitCtx<'_>) -> Result<()> {
		let mut path = parent.clone();
		path.push(item.ident.to_string());
		self.declare_module(&path, Some(&item.vis), ctx.generated);

		if let Some((_, items)) = &item.content {
			self.open_module(&path, ctx.file, ctx.generated);
			let inner = UnitCtx {
				file: ctx.file,
				child_dir: ctx.child_dir.as_ref().map(|d| d.join(item.ident.to_string())),
				generated: ctx.generated,
			};
			return self.index_items(items, &path, &inner);
		}

		let Some(dir) = &ctx.child_dir else {
			return Ok(());
		};
		let name = item.ident.to_string();
		let candidates = match path_attr(&item.attrs) {
			Some(explicit) => {
				let base = ctx.file.parent().unwrap_or(Path::new(""));
				vec![(base.join(explicit), None)]
			}
			None => vec![
				(dir.join(format!("{name}.rs")), Some(dir.join(&name))),
				(dir.join(&name).join("mod.rs"), None),
			],
		};

		for (file, child_dir) in &candidates {
			if file.is_file() {
				let child_dir = child_dir
					.clone()
					.unwrap_or_else(|| file.parent().map(Path::to_path_buf).unwrap_or_default());
				return self.load_file(file, path, Some(child_dir));
			}
		}

		let tried = candidates
			.iter()
			.map(|(f, _)| f.display().to_string())
			.collect::<Vec<_>>()
			.join(", ");
		if item.attrs.iter().any(|a| a.path().is_ident("cfg")) {
			tracing::debug!(module = %path.join("::"), %tried, "skipping cfg-gated module without a file");
			return Ok(());
		}
		Err(ScanError::ModuleNotFound {
			module: path.join("::"),
			tried,
		})
	}

	fn index_impl(&mut self, item: &syn::ItemImpl, module: &ModPath, ctx: &UnitCtx<'_>) {
		let owner = type_ident(&item.self_ty);
		let outer: Vec<String> = item.generics.type_params().map(|p| p.ident.to_string()).collect();
		for impl_item in &item.items {
			let syn::ImplItem::Fn(method) = impl_item else {
				continue;
			};
			let mut decl = self.fn_from_sig(&method.sig, &method.block, module, owner.clone(), &outer, ctx);
			decl.self_ty = Some((*item.self_ty).clone());
			self.add_fn(decl, &method.block, module, ctx);
		}
	}

	fn index_trait(&mut self, item: &syn::ItemTrait, module: &ModPath, ctx: &UnitCtx<'_>) {
		let mut outer: Vec<String> = item.generics.type_params().map(|p| p.ident.to_string()).collect();
		outer.push("Self".to_string());
		for trait_item in &item.items {
			let syn::TraitItem::Fn(method) = trait_item else {
				continue;
			};
			let Some(block) = &method.default else {
				continue;
			};
			let decl = self.fn_from_sig(&method.sig, block, module, Some(item.ident.to_string()), &outer, ctx);
			self.add_fn(decl, block, module, ctx);
		}
	}

	fn fn_from_sig(
		&self,
		sig: &syn::Signature,
		block: &syn::Block,
		module: &ModPath,
		owner: Option<String>,
		outer: &[String],
		ctx: &UnitCtx<'_>,
	) -> FnDecl {
		let mut receiver = false;
		let mut params = Vec::new();
		for input in &sig.inputs {
			match input {
				syn::FnArg::Receiver(_) => receiver = true,
				syn::FnArg::Typed(pat) => params.push(FnParam {
					name: pat_ident(&pat.pat),
					ty: (*pat.ty).clone(),
				}),
			}
		}
		FnDecl {
			name: sig.ident.to_string(),
			module: module.clone(),
			owner,
			self_ty: None,
			generics: sig.generics.type_params().map(|p| p.ident.to_string()).collect(),
			outer_generics: outer.to_vec(),
			receiver,
			params,
			output: match &sig.output {
				syn::ReturnType::Default => None,
				syn::ReturnType::Type(_, ty) => Some((**ty).clone()),
			},
			body: block.clone(),
			file: ctx.file.to_path_buf(),
			span: sig.ident.span(),
			callable: true,
			generated: ctx.generated,
		}
	}

	/// Adds `decl` and the `fn` items nested in its body.
	fn add_fn(&mut self, decl: FnDecl, block: &syn::Block, module: &ModPath, ctx: &UnitCtx<'_>) {
		self.fns.push(decl);
		for stmt in &block.stmts {
			if let syn::Stmt::Item(syn::Item::Fn(nested)) = stmt {
				let decl = self.fn_from_sig(&nested.sig, &nested.block, module, None, &[], ctx);
				self.add_fn(decl, &nested.block, module, ctx);
			}
		}
	}

	fn add_initializer(&mut self, name: String, expr: &syn::Expr, span: Span, module: &ModPath, ctx: &UnitCtx<'_>) {
		let body = syn::Block {
			brace_token: Default::default(),
			stmts: vec![syn::Stmt::Expr(expr.clone(), None)],
		};
		self.fns.push(FnDecl {
			name,
			module: module.clone(),
			owner: None,
			self_ty: None,
			generics: Vec::new(),
			outer_generics: Vec::new(),
			receiver: false,
			params: Vec::new(),
			output: None,
			body,
			file: ctx.file.to_path_buf(),
			span,
			callable: false,
			generated: ctx.generated,
		});
	}

	fn add_type(&mut self, module: &ModPath, ident: &syn::Ident, kind: TypeKind, ctx: &UnitCtx<'_>) {
		let mut path = module.clone();
		path.push(ident.to_string());
		self.types.insert(
			path.clone(),
			TypeDecl {
				path,
				module: module.clone(),
				ident: ident.to_string(),
				kind,
				file: ctx.file.to_path_buf(),
				generated: ctx.generated,
			},
		);
	}

	fn add_alias(&mut self, item: &syn::ItemType, module: &ModPath, ctx: &UnitCtx<'_>) {
		let mut path = module.clone();
		path.push(item.ident.to_string());
		self.aliases.insert(
			path.clone(),
			AliasDecl {
				path,
				module: module.clone(),
				params: item.generics.type_params().map(|p| p.ident.to_string()).collect(),
				ty: (*item.ty).clone(),
				generated: ctx.generated,
			},
		);
	}

	fn add_const(&mut self, item: &syn::ItemConst, module: &ModPath, ctx: &UnitCtx<'_>) {
		let mut path = module.clone();
		path.push(item.ident.to_string());
		self.consts.insert(
			path.clone(),
			ConstDecl {
				path,
				module: module.clone(),
				ty: (*item.ty).clone(),
				expr: (*item.expr).clone(),
				generated: ctx.generated,
			},
		);
	}

	fn reindex(&mut self) {
		self.fns_by_name.clear();
		for (i, decl) in self.fns.iter().enumerate() {
			if decl.callable {
				self.fns_by_name.entry(decl.name.clone()).or_default().push(FnId(i));
			}
		}
	}
}

fn crate_path() -> ModPath {
	vec!["crate".to_string()]
}

/// File name shown for an in-memory module: `lib.rs` for the root,
/// `model/user.rs` for `crate::model::user`.
fn synthetic_file(path: &[String]) -> PathBuf {
	if path.len() <= 1 {
		return PathBuf::from("lib.rs");
	}
	let mut file: PathBuf = path[1..].iter().collect();
	file.set_extension("rs");
	file
}

fn path_attr(attrs: &[syn::Attribute]) -> Option<String> {
	attrs.iter().find_map(|attr| {
		let syn::Meta::NameValue(nv) = &attr.meta else {
			return None;
		};
		if !nv.path.is_ident("path") {
			return None;
		}
		match &nv.value {
			syn::Expr::Lit(syn::ExprLit {
				lit: syn::Lit::Str(s), ..
			}) => Some(s.value()),
			_ => None,
		}
	})
}

fn flatten_use(tree: &syn::UseTree, prefix: Vec<String>, out: &mut Vec<UseEntry>) {
	match tree {
		syn::UseTree::Path(p) => {
			let mut next = prefix;
			next.push(p.ident.to_string());
			flatten_use(&p.tree, next, out);
		}
		syn::UseTree::Name(n) => {
			if n.ident == "self" {
				if let Some(last) = prefix.last() {
					out.push(UseEntry {
						alias: Some(last.clone()),
						target: prefix.clone(),
					});
				}
				return;
			}
			let mut target = prefix;
			target.push(n.ident.to_string());
			out.push(UseEntry {
				alias: Some(n.ident.to_string()),
				target,
			});
		}
		syn::UseTree::Rename(r) => {
			if r.rename == "_" {
				return;
			}
			let mut target = prefix;
			if r.ident != "self" {
				target.push(r.ident.to_string());
			}
			out.push(UseEntry {
				alias: Some(r.rename.to_string()),
				target,
			});
		}
		syn::UseTree::Glob(_) => out.push(UseEntry {
			alias: None,
			target: prefix,
		}),
		syn::UseTree::Group(g) => {
			for item in &g.items {
				flatten_use(item, prefix.clone(), out);
			}
		}
	}
}

/// Binding name of a plain identifier pattern, looking through `mut` and `&`.
pub fn pat_ident(pat: &syn::Pat) -> Option<String> {
	match pat {
		syn::Pat::Ident(p) if p.subpat.is_none() => Some(p.ident.to_string()),
		syn::Pat::Type(p) => pat_ident(&p.pat),
		syn::Pat::Reference(p) => pat_ident(&p.pat),
		syn::Pat::Paren(p) => pat_ident(&p.pat),
		_ => None,
	}
}

/// Last segment of a path type, looking through references and groups.
pub fn type_ident(ty: &syn::Type) -> Option<String> {
	match peel(ty) {
		syn::Type::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
		_ => None,
	}
}

/// `ty` without surrounding references, parentheses and invisible groups.
pub fn peel(ty: &syn::Type) -> &syn::Type {
	match ty {
		syn::Type::Reference(r) => peel(&r.elem),
		syn::Type::Paren(p) => peel(&p.elem),
		syn::Type::Group(g) => peel(&g.elem),
		_ => ty,
	}
}

/// Location of any spanned syntax node inside `file`.
pub fn locate(file: &Path, node: &impl Spanned) -> Location {
	Location::from_span(file, node.span())
}
