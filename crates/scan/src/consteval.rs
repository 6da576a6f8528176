//! Integer constant folding for discriminants and attribute arguments.

use crate::model::CrateModel;

/// Integer constants that a path inside a folded expression may name.
pub trait Consts {
	fn value_of(&self, path: &syn::Path) -> Option<i128>;
}

/// Names no constants; only literal expressions fold.
pub struct Literals;

impl Consts for Literals {
	fn value_of(&self, _: &syn::Path) -> Option<i128> {
		None
	}
}

/// Folds `expr` to an integer if it is built from integer literals, unary
/// `-`/`!`, binary arithmetic and bit operators, parentheses and casts to
/// integer types. Overflow and division by zero yield `None`.
pub fn eval_int(expr: &syn::Expr) -> Option<i128> {
	eval_int_with(expr, &Literals)
}

/// [`eval_int`], with paths folded to the values `consts` gives them.
pub fn eval_int_with(expr: &syn::Expr, consts: &dyn Consts) -> Option<i128> {
	match expr {
		syn::Expr::Lit(lit) => match &lit.lit {
			syn::Lit::Int(int) => int.base10_parse::<i128>().ok(),
			syn::Lit::Byte(byte) => Some(i128::from(byte.value())),
			_ => None,
		},
		syn::Expr::Path(p) if p.qself.is_none() => consts.value_of(&p.path),
		syn::Expr::Paren(p) => eval_int_with(&p.expr, consts),
		syn::Expr::Group(g) => eval_int_with(&g.expr, consts),
		syn::Expr::Unary(u) => {
			let value = eval_int_with(&u.expr, consts)?;
			match u.op {
				syn::UnOp::Neg(_) => value.checked_neg(),
				syn::UnOp::Not(_) => Some(!value),
				_ => None,
			}
		}
		syn::Expr::Binary(b) => {
			let lhs = eval_int_with(&b.left, consts)?;
			let rhs = eval_int_with(&b.right, consts)?;
			binary(&b.op, lhs, rhs)
		}
		syn::Expr::Cast(c) => {
			let value = eval_int_with(&c.expr, consts)?;
			cast(int_type(&c.ty)?, value)
		}
		_ => None,
	}
}

/// `const` items of a crate, seen from one module.
///
/// A constant is folded in its own module, so its initializer may name
/// further constants. One that is reached again while its own initializer
/// is being folded has no value.
pub struct CrateConsts<'a> {
	model: &'a CrateModel,
	module: &'a [String],
	/// Constant being folded here and the scope that asked for it.
	within: Option<(&'a [String], &'a CrateConsts<'a>)>,
}

impl<'a> CrateConsts<'a> {
	pub fn new(model: &'a CrateModel, module: &'a [String]) -> Self {
		Self {
			model,
			module,
			within: None,
		}
	}

	fn is_folding(&self, path: &[String]) -> bool {
		let mut scope = self;
		while let Some((current, outer)) = scope.within {
			if current == path {
				return true;
			}
			scope = outer;
		}
		false
	}
}

impl Consts for CrateConsts<'_> {
	fn value_of(&self, path: &syn::Path) -> Option<i128> {
		let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
		let decl = self.model.resolve_const(self.module, &segments)?;
		if self.is_folding(&decl.path) {
			tracing::debug!(constant = %decl.path.join("::"), "constant refers to itself");
			return None;
		}
		let inner = CrateConsts {
			model: self.model,
			module: &decl.module,
			within: Some((decl.path.as_slice(), self)),
		};
		let value = eval_int_with(&decl.expr, &inner)?;
		// The value must be representable in the declared type.
		let ty = int_type(&decl.ty)?;
		cast(ty, value).filter(|v| *v == value)
	}
}

/// Name of a primitive integer type.
fn int_type(ty: &syn::Type) -> Option<&'static str> {
	let syn::Type::Path(path) = ty else {
		return None;
	};
	let ident = path.path.get_ident()?.to_string();
	INT_TYPES.iter().copied().find(|t| *t == ident)
}

const INT_TYPES: [&str; 12] = [
	"i8", "u8", "i16", "u16", "i32", "u32", "i64", "u64", "i128", "u128", "isize", "usize",
];

fn binary(op: &syn::BinOp, lhs: i128, rhs: i128) -> Option<i128> {
	use syn::BinOp::*;
	match op {
		Add(_) => lhs.checked_add(rhs),
		Sub(_) => lhs.checked_sub(rhs),
		Mul(_) => lhs.checked_mul(rhs),
		Div(_) => lhs.checked_div(rhs),
		Rem(_) => lhs.checked_rem(rhs),
		Shl(_) => lhs.checked_shl(u32::try_from(rhs).ok()?),
		Shr(_) => lhs.checked_shr(u32::try_from(rhs).ok()?),
		BitAnd(_) => Some(lhs & rhs),
		BitOr(_) => Some(lhs | rhs),
		BitXor(_) => Some(lhs ^ rhs),
		_ => None,
	}
}

/// `value as ty` for the integer types, assuming 64-bit `isize`/`usize`.
fn cast(ty: &str, value: i128) -> Option<i128> {
	Some(match ty {
		"i8" => i128::from(value as i8),
		"u8" => i128::from(value as u8),
		"i16" => i128::from(value as i16),
		"u16" => i128::from(value as u16),
		"i32" => i128::from(value as i32),
		"u32" => i128::from(value as u32),
		"i64" | "isize" => i128::from(value as i64),
		"u64" | "usize" => i128::from(value as u64),
		"i128" => value,
		"u128" => i128::try_from(value as u128).ok()?,
		_ => return None,
	})
}

/// Lookup key of a discriminant: the value wrapped to `i64`.
pub fn enum_key(value: i128) -> i64 {
	value as i64
}
