//! Constant attribute arguments.

use std::fmt;

use syn::punctuated::Punctuated;

use crate::consteval;
use crate::model::ty;

/// Attribute paths that never reach metadata.
const CONTROL_ATTRIBUTES: [&str; 3] = ["cfg", "cfg_attr", "prism"];

/// Literal argument value, mirrored at runtime by `prism_meta::AttrValue`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrLiteral {
	Str(String),
	Int(i128),
	Float(f64),
	Bool(bool),
	Char(char),
	Path(String),
	List(Vec<AttrLiteral>),
	Nested(AttributeMeta),
}

/// An extracted attribute: kind, positional and named arguments in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMeta {
	pub kind: String,
	pub args: Vec<AttrLiteral>,
	pub named: Vec<(String, AttrLiteral)>,
}

impl AttributeMeta {
	pub fn new(kind: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			args: Vec::new(),
			named: Vec::new(),
		}
	}

	pub fn get(&self, name: &str) -> Option<&AttrLiteral> {
		self.named.iter().find(|(n, _)| n == name).map(|(_, v)| v)
	}
}

impl fmt::Display for AttrLiteral {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Str(s) => write!(f, "{s:?}"),
			Self::Int(v) => write!(f, "{v}"),
			Self::Float(v) => write!(f, "{v:?}"),
			Self::Bool(v) => write!(f, "{v}"),
			Self::Char(c) => write!(f, "{c:?}"),
			Self::Path(p) => f.write_str(p),
			Self::List(items) => {
				f.write_str("[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{item}")?;
				}
				f.write_str("]")
			}
			Self::Nested(attr) => write!(f, "{attr}"),
		}
	}
}

impl fmt::Display for AttributeMeta {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.kind)?;
		if self.args.is_empty() && self.named.is_empty() {
			return Ok(());
		}
		f.write_str("(")?;
		let args = self.args.iter().map(|a| a.to_string());
		let named = self.named.iter().map(|(n, v)| format!("{n} = {v}"));
		f.write_str(&args.chain(named).collect::<Vec<_>>().join(", "))?;
		f.write_str(")")
	}
}

/// Whether `attr` is carried into metadata.
pub fn is_described(attr: &syn::Attribute) -> bool {
	!CONTROL_ATTRIBUTES.iter().any(|name| attr.path().is_ident(name))
}

/// Parses one attribute. The error is a human-readable reason.
pub fn parse_attribute(attr: &syn::Attribute) -> Result<AttributeMeta, String> {
	let kind = ty::render(attr.path());
	match &attr.meta {
		syn::Meta::Path(_) => Ok(AttributeMeta::new(kind)),
		syn::Meta::NameValue(nv) => {
			let mut meta = AttributeMeta::new(kind);
			meta.args.push(literal(&nv.value)?);
			Ok(meta)
		}
		syn::Meta::List(list) => {
			let exprs = list
				.parse_args_with(Punctuated::<syn::Expr, syn::Token![,]>::parse_terminated)
				.map_err(|e| format!("`{}` is not a constant argument list ({e})", ty::compact(&list.tokens.to_string())))?;
			arguments(kind, exprs.iter())
		}
	}
}

fn arguments<'a>(kind: String, exprs: impl Iterator<Item = &'a syn::Expr>) -> Result<AttributeMeta, String> {
	let mut meta = AttributeMeta::new(kind);
	for expr in exprs {
		if let syn::Expr::Assign(assign) = expr {
			let syn::Expr::Path(name) = &*assign.left else {
				return Err(format!("`{}` is not a named argument", ty::render(&assign.left)));
			};
			let name = ty::render(&name.path);
			if meta.get(&name).is_some() {
				return Err(format!("named argument `{name}` given twice"));
			}
			let value = literal(&assign.right)?;
			meta.named.push((name, value));
		} else {
			meta.args.push(literal(expr)?);
		}
	}
	Ok(meta)
}

/// Evaluates a constant argument expression.
fn literal(expr: &syn::Expr) -> Result<AttrLiteral, String> {
	let unsupported = || format!("`{}` is not a compile-time constant", ty::render(expr));
	match expr {
		syn::Expr::Lit(lit) => match &lit.lit {
			syn::Lit::Str(s) => Ok(AttrLiteral::Str(s.value())),
			syn::Lit::Int(i) => i.base10_parse::<i128>().map(AttrLiteral::Int).map_err(|e| e.to_string()),
			syn::Lit::Float(v) => match v.base10_parse::<f64>() {
				Ok(value) if value.is_finite() => Ok(AttrLiteral::Float(value)),
				Ok(_) => Err(format!("`{v}` is out of range for f64")),
				Err(e) => Err(e.to_string()),
			},
			syn::Lit::Bool(b) => Ok(AttrLiteral::Bool(b.value)),
			syn::Lit::Char(c) => Ok(AttrLiteral::Char(c.value())),
			syn::Lit::Byte(b) => Ok(AttrLiteral::Int(i128::from(b.value()))),
			_ => Err(unsupported()),
		},
		syn::Expr::Paren(p) => literal(&p.expr),
		syn::Expr::Group(g) => literal(&g.expr),
		syn::Expr::Unary(syn::ExprUnary {
			op: syn::UnOp::Neg(_),
			expr: inner,
			..
		}) => match literal(inner)? {
			AttrLiteral::Int(v) => v.checked_neg().map(AttrLiteral::Int).ok_or_else(unsupported),
			AttrLiteral::Float(v) => Ok(AttrLiteral::Float(-v)),
			_ => Err(unsupported()),
		},
		syn::Expr::Unary(_) | syn::Expr::Binary(_) | syn::Expr::Cast(_) => {
			consteval::eval_int(expr).map(AttrLiteral::Int).ok_or_else(unsupported)
		}
		syn::Expr::Path(p) if p.qself.is_none() => Ok(AttrLiteral::Path(ty::render(&p.path))),
		syn::Expr::Array(array) => array.elems.iter().map(literal).collect::<Result<_, _>>().map(AttrLiteral::List),
		syn::Expr::Call(call) => {
			let syn::Expr::Path(func) = &*call.func else {
				return Err(unsupported());
			};
			arguments(ty::render(&func.path), call.args.iter()).map(AttrLiteral::Nested)
		}
		_ => Err(unsupported()),
	}
}
