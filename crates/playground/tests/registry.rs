use std::thread;

use pretty_assertions::assert_eq;
use prism_meta::{AttrValue, DescribeExt, Registry, RegistryError, TableKind, enum_value_info, enum_values, members};
use prism_playground::model::{self, Pair, Secret, Settings, Status, User};
use prism_playground::report;
use rstest::rstest;

#[test]
fn test_enum_values_follow_discriminants() {
	let table = enum_values::<Status>().unwrap();
	let rows: Vec<_> = table.iter().map(|v| (v.name(), v.value())).collect();
	assert_eq!(rows, [("Active", 1), ("Suspended", 5), ("Closed", 6), ("Legacy", -1)]);
	assert_eq!(table.by_name("Closed").map(|v| v.key()), Some(6));
	assert_eq!(table.get(-1).map(|v| v.name()), Some("Legacy"));
	assert!(table.get(2).is_none());
}

#[rstest]
#[case(Status::Active, "Active", 1)]
#[case(Status::Suspended, "Suspended", 5)]
#[case(Status::Closed, "Closed", 6)]
#[case(Status::Legacy, "Legacy", -1)]
fn test_enum_value_info(#[case] value: Status, #[case] name: &str, #[case] key: i64) {
	let info = enum_value_info(&value).unwrap();
	assert_eq!(info.name(), name);
	assert_eq!(info.key(), key);
	assert!(std::ptr::eq(info, value.enum_value_info().unwrap()));
}

#[test]
fn test_enum_value_attributes() {
	let active = enum_value_info(&Status::Active).unwrap();
	let serde = active.attribute_of("serde").unwrap();
	assert_eq!(serde.get("rename").and_then(AttrValue::as_str), Some("active"));
	assert!(enum_value_info(&Status::Closed).unwrap().attributes().is_empty());
}

#[test]
fn test_bootstrapped_type_is_registered() {
	let _ = model::settings_for_plugin();
	let table = members::<Settings>().unwrap();
	assert_eq!(table.names().collect::<Vec<_>>(), ["theme", "font_size"]);
	assert_eq!(table.get("font_size").unwrap().declared_type(), "u16");
}

#[test]
fn test_type_erased_access() {
	let mut boxed = model::settings_for_plugin();
	let theme = members::<Settings>().unwrap().get("theme").unwrap();
	assert_eq!(theme.try_get_as::<String>(&*boxed).map(String::as_str), Some("dark"));
	assert!(theme.try_set_value(&mut *boxed, "light".to_string()));
	assert_eq!(boxed.downcast_ref::<Settings>().unwrap().theme, "light");
}

#[test]
fn test_unqueried_type_is_not_registered() {
	let err = members::<Secret>().unwrap_err();
	assert!(matches!(err, RegistryError::NotRegistered { kind: TableKind::Members, .. }), "{err:?}");
	let message = err.to_string();
	assert!(message.contains("Secret"), "{message}");
	assert!(message.contains("bootstrap"), "{message}");
}

#[test]
fn test_kind_mismatch_is_not_registered() {
	assert!(matches!(
		enum_values::<User>(),
		Err(RegistryError::NotRegistered {
			kind: TableKind::EnumValues,
			..
		})
	));
	assert!(members::<Status>().is_err());
}

#[test]
fn test_registry_contents() {
	let registry = Registry::global();
	assert!(registry.is_registered::<User>(TableKind::Members));
	assert!(registry.is_registered::<Pair<u32>>(TableKind::Members));
	assert!(registry.is_registered::<Status>(TableKind::EnumValues));
	assert!(!registry.is_registered::<Secret>(TableKind::Members));
	assert!(!registry.is_registered::<Pair<String>>(TableKind::Members));

	assert_eq!(
		registry.registered_types(TableKind::Members),
		[
			"crate::model::Pair<crate::model::User>",
			"crate::model::Pair<u32>",
			"crate::model::Settings",
			"crate::model::User",
		]
	);
	assert_eq!(registry.registered_types(TableKind::EnumValues), ["crate::model::Status"]);
	assert_eq!(registry.len(), 5);
}

#[test]
fn test_generic_helpers() {
	assert_eq!(
		report::admin_columns().unwrap(),
		[vec!["name", "id", "email", "score"], vec!["left", "right"], vec!["left", "right"]]
	);
	assert_eq!(report::status_label(Status::Active).unwrap(), "active");
	assert_eq!(report::status_label(Status::Legacy).unwrap(), "Legacy");

	let rows = report::profile(&User::new("carol", 3)).unwrap();
	assert_eq!(rows[0], ("name", "String"));
	assert_eq!(rows.len(), 4);
}

#[test]
fn test_concurrent_first_queries_share_tables() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();

	let handles: Vec<_> = (0..8)
		.map(|_| thread::spawn(|| members::<User>().unwrap() as *const _ as usize))
		.collect();
	let addresses: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
	assert!(addresses.windows(2).all(|w| w[0] == w[1]));
	assert_eq!(addresses[0], members::<User>().unwrap() as *const _ as usize);
}
