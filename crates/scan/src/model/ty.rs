//! Type templates and closed types.

use std::cmp::Ordering;
use std::fmt;

use quote::ToTokens;
use rustc_hash::FxHashMap;

/// A type expression that may still mention generic parameters of an
/// enclosing function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeExpr {
	/// Path type. Crate-local declarations carry their absolute `crate::` path,
	/// foreign types the path as written.
	Path { segments: Vec<String>, args: Vec<TypeExpr> },
	/// Generic parameter of the enclosing function.
	Param(String),
	/// Any other closed type, kept as normalized source text.
	Opaque(String),
}

impl TypeExpr {
	pub fn path(segments: impl IntoIterator<Item = impl Into<String>>, args: Vec<TypeExpr>) -> Self {
		Self::Path {
			segments: segments.into_iter().map(Into::into).collect(),
			args,
		}
	}

	/// Whether the expression mentions no generic parameter.
	pub fn is_closed(&self) -> bool {
		match self {
			Self::Path { args, .. } => args.iter().all(Self::is_closed),
			Self::Param(_) => false,
			Self::Opaque(_) => true,
		}
	}

	/// Generic parameters mentioned, in first-occurrence order.
	pub fn params(&self) -> Vec<&str> {
		let mut out = Vec::new();
		self.collect_params(&mut out);
		out
	}

	fn collect_params<'a>(&'a self, out: &mut Vec<&'a str>) {
		match self {
			Self::Path { args, .. } => args.iter().for_each(|a| a.collect_params(out)),
			Self::Param(name) => {
				if !out.contains(&name.as_str()) {
					out.push(name);
				}
			}
			Self::Opaque(_) => {}
		}
	}

	/// Replaces bound parameters; unbound ones are kept.
	pub fn substitute(&self, bindings: &FxHashMap<String, TypeExpr>) -> TypeExpr {
		match self {
			Self::Path { segments, args } => Self::Path {
				segments: segments.clone(),
				args: args.iter().map(|a| a.substitute(bindings)).collect(),
			},
			Self::Param(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
			Self::Opaque(_) => self.clone(),
		}
	}

	/// Last path segment, the name a type is usually written with.
	pub fn ident(&self) -> Option<&str> {
		match self {
			Self::Path { segments, .. } => segments.last().map(String::as_str),
			_ => None,
		}
	}

	/// Whether this names a declaration of the scanned crate.
	pub fn is_local(&self) -> bool {
		matches!(self, Self::Path { segments, .. } if segments.first().is_some_and(|s| s == "crate"))
	}
}

impl fmt::Display for TypeExpr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Path { segments, args } => {
				f.write_str(&segments.join("::"))?;
				if !args.is_empty() {
					f.write_str("<")?;
					for (i, arg) in args.iter().enumerate() {
						if i > 0 {
							f.write_str(", ")?;
						}
						write!(f, "{arg}")?;
					}
					f.write_str(">")?;
				}
				Ok(())
			}
			Self::Param(name) => f.write_str(name),
			Self::Opaque(text) => f.write_str(text),
		}
	}
}

/// A fully concrete type, identified by its canonical rendering.
#[derive(Debug, Clone)]
pub struct ClosedType {
	expr: TypeExpr,
	canonical: String,
}

impl ClosedType {
	/// `None` if `expr` still mentions a generic parameter.
	pub fn new(expr: TypeExpr) -> Option<Self> {
		expr.is_closed().then(|| Self {
			canonical: expr.to_string(),
			expr,
		})
	}

	pub fn expr(&self) -> &TypeExpr {
		&self.expr
	}

	pub fn as_str(&self) -> &str {
		&self.canonical
	}

	/// Path segments of a path type.
	pub fn segments(&self) -> Option<&[String]> {
		match &self.expr {
			TypeExpr::Path { segments, .. } => Some(segments),
			_ => None,
		}
	}

	/// Type arguments of a path type.
	pub fn args(&self) -> &[TypeExpr] {
		match &self.expr {
			TypeExpr::Path { args, .. } => args,
			_ => &[],
		}
	}

	/// The type as a `syn` AST, for emission.
	pub fn to_syn(&self) -> syn::Result<syn::Type> {
		syn::parse_str(&self.canonical)
	}
}

impl PartialEq for ClosedType {
	fn eq(&self, other: &Self) -> bool {
		self.canonical == other.canonical
	}
}

impl Eq for ClosedType {}

impl std::hash::Hash for ClosedType {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.canonical.hash(state);
	}
}

impl PartialOrd for ClosedType {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for ClosedType {
	fn cmp(&self, other: &Self) -> Ordering {
		self.canonical.cmp(&other.canonical)
	}
}

impl fmt::Display for ClosedType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.canonical)
	}
}

/// Source text of `tokens` with the spacing people write.
pub fn render(tokens: &impl ToTokens) -> String {
	compact(&tokens.to_token_stream().to_string())
}

/// Collapses token-stream spacing: `Vec < u8 >` becomes `Vec<u8>`,
/// `HashMap < K , V >` becomes `HashMap<K, V>`.
pub fn compact(text: &str) -> String {
	let chars: Vec<char> = text.chars().collect();
	let mut out = String::with_capacity(text.len());
	for (i, &c) in chars.iter().enumerate() {
		if c != ' ' {
			out.push(c);
			continue;
		}
		let prev = out.chars().last();
		let before_prev = out.chars().rev().nth(1);
		let next = chars.get(i + 1).copied();
		let after_next = chars.get(i + 2).copied();
		let keep = match (prev, next) {
			(Some(p), Some(n)) if is_word(p) && is_word(n) => true,
			(Some(',' | ';' | '='), _) => true,
			(_, Some('=')) => true,
			(Some('>'), _) if before_prev == Some('-') => true,
			(_, Some('-')) if after_next == Some('>') => true,
			_ => false,
		};
		if keep {
			out.push(' ');
		}
	}
	out
}

fn is_word(c: char) -> bool {
	c.is_alphanumeric() || c == '_' || c == '"'
}
