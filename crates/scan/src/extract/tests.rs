use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};

use super::*;
use crate::model::TypeExpr;

const MODEL: &str = r#"
pub mod model {
	use std::collections::BTreeMap;

	pub struct User {
		/// Login name.
		#[serde(rename = "login")]
		pub name: String,
		#[prism(readonly)]
		pub id: u64,
		#[prism(skip)]
		pub cache: Vec<u8>,
		secret: String,
		pub(crate) tags: BTreeMap<String, u32>,
		#[cfg(test)]
		#[validate(range(min = 1, max = 10))]
		pub score: u8,
	}

	pub struct Pair<T> {
		pub left: T,
		pub right: Option<T>,
	}

	pub struct Point(pub i32, pub(crate) i32, u8);

	pub struct Unit;

	#[repr(i64)]
	pub enum Status {
		#[serde(rename = "on")]
		Active = 1,
		Idle,
		Gone = -1,
		Max = 1 << 40,
	}

	pub enum Clash {
		A = 0,
		B = 18446744073709551616,
	}

	pub enum Shape {
		Circle(f64),
		Empty,
	}

	const BASE: u8 = 3;
	const STEP: i32 = BASE as i32 * 10;

	pub enum Computed {
		First = BASE as isize,
		Second = STEP as isize,
		Third,
	}

	const LOOP: i32 = LOOP_BACK;
	const LOOP_BACK: i32 = LOOP;

	pub enum Opaque {
		Len = "abc".len() as isize,
		Cycle = LOOP as isize,
	}

	pub struct Borrowing<'a> {
		pub name: &'a str,
	}

	pub struct Holder {
		pub handler: Box<dyn Fn(&str) -> usize>,
		pub label: &'static str,
	}

	pub struct Bad {
		#[check(limit = LIMIT.len())]
		pub value: u8,
	}

	mod private {
		pub struct Hidden {
			pub x: u8,
		}
	}

	pub union Bits {
		pub int: u32,
		pub float: f32,
	}
}
"#;

#[fixture]
fn model() -> CrateModel {
	CrateModel::from_sources([("crate", MODEL)]).unwrap()
}

fn closed(path: &str, args: Vec<TypeExpr>) -> ClosedType {
	ClosedType::new(TypeExpr::path(path.split("::"), args)).unwrap()
}

fn expect_struct(model: &CrateModel, ty: &ClosedType) -> StructMeta {
	match Extractor::new(model).extract(ty) {
		Ok(Extracted::Struct(meta)) => meta,
		other => panic!("expected struct metadata for {ty}, got {other:?}"),
	}
}

fn expect_enum(model: &CrateModel, ty: &ClosedType) -> EnumMeta {
	match Extractor::new(model).extract(ty) {
		Ok(Extracted::Enum(meta)) => meta,
		other => panic!("expected enum metadata for {ty}, got {other:?}"),
	}
}

fn expect_errors(model: &CrateModel, ty: &ClosedType) -> Vec<String> {
	match Extractor::new(model).extract(ty) {
		Err(diagnostics) => diagnostics.into_iter().map(|d| d.error.to_string()).collect(),
		Ok(meta) => panic!("expected diagnostics for {ty}, got {meta:?}"),
	}
}

/// Eligible fields keep declaration order; skipped and private fields are absent.
#[rstest]
fn test_struct_members_in_declaration_order(model: CrateModel) {
	let meta = expect_struct(&model, &closed("crate::model::User", vec![]));

	let names: Vec<_> = meta.members.iter().map(|m| m.name.as_str()).collect();
	assert_eq!(names, vec!["name", "id", "tags", "score"]);

	let types: Vec<_> = meta.members.iter().map(|m| m.declared_type.as_str()).collect();
	assert_eq!(types, vec!["String", "u64", "BTreeMap<String, u32>", "u8"]);

	let writable: Vec<_> = meta.members.iter().map(|m| m.writable).collect();
	assert_eq!(writable, vec![true, false, true, true]);
}

/// Attributes come in source order; `cfg` and `prism` are dropped, docs kept.
#[rstest]
fn test_member_attributes(model: CrateModel) {
	let meta = expect_struct(&model, &closed("crate::model::User", vec![]));

	let rendered: Vec<Vec<String>> = meta
		.members
		.iter()
		.map(|m| m.attributes.iter().map(ToString::to_string).collect())
		.collect();
	assert_eq!(
		rendered,
		vec![
			vec![r#"doc(" Login name.")"#.to_string(), r#"serde(rename = "login")"#.to_string()],
			vec![],
			vec![],
			vec!["validate(range(min = 1, max = 10))".to_string()],
		]
	);
}

/// Extraction is deterministic, so rendered attributes are stable.
#[rstest]
fn test_repeated_extraction_is_stable(model: CrateModel) {
	let ty = closed("crate::model::User", vec![]);
	let first = expect_struct(&model, &ty);
	let second = expect_struct(&model, &ty);
	assert_eq!(first, second);
}

/// Generic parameters are substituted in recorded member types.
#[rstest]
fn test_generic_struct_substitution(model: CrateModel) {
	let user = TypeExpr::path(["crate", "model", "User"], vec![]);
	let meta = expect_struct(&model, &closed("crate::model::Pair", vec![user]));

	let types: Vec<_> = meta.members.iter().map(|m| m.declared_type.as_str()).collect();
	assert_eq!(types, vec!["crate::model::User", "Option<crate::model::User>"]);
}

#[rstest]
fn test_tuple_and_unit_structs(model: CrateModel) {
	let point = expect_struct(&model, &closed("crate::model::Point", vec![]));
	let names: Vec<_> = point.members.iter().map(|m| m.name.as_str()).collect();
	assert_eq!(names, vec!["0", "1"]);
	assert!(matches!(point.members[1].member, syn::Member::Unnamed(ref i) if i.index == 1));

	let unit = expect_struct(&model, &closed("crate::model::Unit", vec![]));
	assert!(unit.members.is_empty());
}

/// Higher-ranked elision in closures and `'static` borrows are fine.
#[rstest]
fn test_static_and_higher_ranked_fields(model: CrateModel) {
	let meta = expect_struct(&model, &closed("crate::model::Holder", vec![]));
	assert_eq!(meta.members.len(), 2);
	assert_eq!(meta.members[1].declared_type, "&'static str");
}

#[rstest]
fn test_enum_values_and_keys(model: CrateModel) {
	let meta = expect_enum(&model, &closed("crate::model::Status", vec![]));

	let values: Vec<_> = meta
		.values
		.iter()
		.map(|v| (v.name.as_str(), v.value, v.key))
		.collect();
	assert_eq!(
		values,
		vec![("Active", 1, 1), ("Idle", 2, 2), ("Gone", -1, -1), ("Max", 1 << 40, 1 << 40)]
	);
	assert_eq!(meta.values[0].attributes[0].to_string(), r#"serde(rename = "on")"#);
	assert_eq!(meta.path, vec!["crate", "model", "Status"]);
}

/// Discriminants that wrap to the same `i64` key are rejected.
#[rstest]
fn test_duplicate_enum_key(model: CrateModel) {
	let errors = expect_errors(&model, &closed("crate::model::Clash", vec![]));
	assert_eq!(errors.len(), 1);
	assert!(errors[0].contains("share lookup key 0"), "{errors:?}");
}

#[rstest]
fn test_data_carrying_variant(model: CrateModel) {
	let errors = expect_errors(&model, &closed("crate::model::Shape", vec![]));
	assert_eq!(errors.len(), 1);
	assert!(errors[0].contains("Circle"), "{errors:?}");
}

/// Discriminants may name integer constants of the crate, which may name others.
#[rstest]
fn test_const_discriminants(model: CrateModel) {
	let meta = expect_enum(&model, &closed("crate::model::Computed", vec![]));
	let values: Vec<_> = meta.values.iter().map(|v| (v.name.as_str(), v.value)).collect();
	assert_eq!(values, vec![("First", 3), ("Second", 30), ("Third", 31)]);
}

#[test]
fn test_discriminant_names_crate_const() {
	let model = CrateModel::from_sources([("crate", "const BASE: i32 = 10;\npub enum E { A = BASE, B }\n")]).unwrap();
	let meta = expect_enum(&model, &closed("crate::E", vec![]));
	let values: Vec<_> = meta.values.iter().map(|v| (v.name.as_str(), v.value, v.key)).collect();
	assert_eq!(values, vec![("A", 10, 10), ("B", 11, 11)]);
}

/// Method calls and constants defined in terms of themselves do not fold.
#[rstest]
fn test_non_constant_discriminant(model: CrateModel) {
	let errors = expect_errors(&model, &closed("crate::model::Opaque", vec![]));
	assert_eq!(errors.len(), 2);
	assert!(errors[0].contains("Len"), "{errors:?}");
	assert!(errors[1].contains("Cycle"), "{errors:?}");
}

#[rstest]
fn test_non_constant_attribute_argument(model: CrateModel) {
	let errors = expect_errors(&model, &closed("crate::model::Bad", vec![]));
	assert_eq!(errors.len(), 1);
	assert!(errors[0].contains("non-constant argument"), "{errors:?}");
}

#[rstest]
#[case::lifetime_param("crate::model::Borrowing", 0, "lifetime")]
#[case::private_module("crate::model::private::Hidden", 0, "not visible")]
#[case::union("crate::model::Bits", 0, "unions")]
#[case::foreign("String", 0, "declared in the crate")]
#[case::missing_args("crate::model::Pair", 0, "expected 1 type argument")]
#[case::extra_args("crate::model::User", 1, "expected 0 type argument")]
fn test_undescribable(model: CrateModel, #[case] path: &str, #[case] args: usize, #[case] reason: &str) {
	let args = (0..args).map(|_| TypeExpr::path(["u8"], vec![])).collect();
	let errors = expect_errors(&model, &closed(path, args));
	assert_eq!(errors.len(), 1);
	assert!(errors[0].contains(reason), "{errors:?}");
}

/// Every failing member is reported, not just the first.
#[test]
fn test_all_member_failures_reported() {
	let model = CrateModel::from_sources([(
		"crate",
		r#"
pub struct Many {
	pub a: impl Sized,
	#[tag(x = 1, x = 2)]
	pub b: u8,
	pub c: dyn Send,
}
"#,
	)])
	.unwrap();

	let diagnostics = Extractor::new(&model)
		.extract(&closed("crate::Many", vec![]))
		.unwrap_err();
	assert_eq!(diagnostics.len(), 3);
	assert!(diagnostics.iter().all(|d| d.location.is_some()));
}
