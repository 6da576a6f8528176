use std::any::Any;

use pretty_assertions::assert_eq;
use prism_meta::{Access, AttrValue, DescribeExt, members};
use prism_playground::model::{Pair, Settings, User};
use rstest::rstest;

fn alice() -> User {
	let mut user = User::new("alice", 7);
	user.email = Some("alice@example.com".to_string());
	user
}

#[test]
fn test_members_in_declaration_order() {
	let table = members::<User>().unwrap();
	assert_eq!(table.type_name(), std::any::type_name::<User>());
	// `session` is skipped, `password_hash` is private.
	assert_eq!(table.names().collect::<Vec<_>>(), ["name", "id", "email", "score"]);
	assert!(!table.contains("session"));
	assert!(!table.contains("password_hash"));
}

#[rstest]
#[case("name", "String", Access::READ | Access::WRITE)]
#[case("id", "u64", Access::READ)]
#[case("email", "Option<String>", Access::READ | Access::WRITE)]
#[case("score", "i32", Access::READ | Access::WRITE)]
fn test_member_shape(#[case] name: &str, #[case] declared: &str, #[case] access: Access) {
	let member = members::<User>().unwrap().get(name).unwrap();
	assert_eq!(member.declared_type(), declared);
	assert_eq!(member.access(), access);
	assert!(member.is_readable());
}

#[test]
fn test_get_and_set() {
	let table = members::<User>().unwrap();
	let mut user = alice();

	let name = table.get("name").unwrap();
	assert_eq!(name.try_get_as::<String>(&user).map(String::as_str), Some("alice"));
	assert!(name.try_set_value(&mut user, "bob".to_string()));
	assert_eq!(user.name, "bob");

	let score = table.get("score").unwrap();
	assert!(score.try_set(&mut user, Box::new(42_i32)));
	assert_eq!(user.score(), 42);

	let email = table.get("email").unwrap();
	assert_eq!(
		email.try_get_as::<Option<String>>(&user),
		Some(&Some("alice@example.com".to_string()))
	);
}

#[test]
fn test_mismatches_are_reported_not_raised() {
	let name = members::<User>().unwrap().get("name").unwrap();
	let mut user = alice();
	let mut settings = Settings::default();

	assert!(name.try_get(&settings as &dyn Any).is_none());
	assert!(!name.try_set_value(&mut settings, "x".to_string()));
	assert!(!name.try_set_value(&mut user, 5_u32));
	assert_eq!(name.try_get_as::<u32>(&user), None);
	assert_eq!(user.name, "alice");
}

#[test]
fn test_readonly_member_rejects_writes() {
	let id = members::<User>().unwrap().get("id").unwrap();
	let mut user = alice();
	assert!(!id.is_writable());
	assert!(!id.try_set_value(&mut user, 99_u64));
	assert_eq!(id.try_get_as::<u64>(&user), Some(&7));
}

#[test]
fn test_attributes_carried_with_arguments() {
	let name = members::<User>().unwrap().get("name").unwrap();

	let serde = name.attribute("serde").unwrap();
	assert_eq!(serde.get("rename").and_then(AttrValue::as_str), Some("login"));

	let doc = name.attribute("doc").unwrap();
	assert_eq!(doc.args().first().and_then(AttrValue::as_str), Some(" Login name."));

	let id = members::<User>().unwrap().get("id").unwrap();
	// `prism` controls shape the table and are not carried as attributes.
	assert!(id.attribute("prism").is_none());
	assert!(id.attributes().is_empty());
	assert!(id.attribute("serde").is_none());
}

#[test]
fn test_generic_instantiations_are_distinct() {
	let users = members::<Pair<User>>().unwrap();
	assert_eq!(users.get("left").unwrap().declared_type(), "crate::model::User");

	let numbers = members::<Pair<u32>>().unwrap();
	assert_eq!(numbers.get("right").unwrap().declared_type(), "u32");
	assert_ne!(users.type_id(), numbers.type_id());

	let mut pair = Pair { left: 1_u32, right: 2 };
	let right = numbers.get("right").unwrap();
	assert!(right.try_set_value(&mut pair, 20_u32));
	assert_eq!(pair.right, 20);
	assert!(users.get("left").unwrap().try_get(&pair).is_none());
}

#[test]
fn test_extension_method_matches_free_function() {
	let user = alice();
	let via_method = user.members().unwrap();
	let via_fn = members::<User>().unwrap();
	assert!(std::ptr::eq(via_method, via_fn));
}
