use std::any::{Any, TypeId};
use std::sync::Barrier;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use rstest::rstest;

use super::{Registration, Registry, TableKind};
use crate::descriptor::{AttrValue, AttributeDescriptor, EnumValueDescriptor, MemberBuilder};
use crate::error::RegistryError;
use crate::table::{EnumTable, TypeTable};

#[derive(Debug, Default)]
struct Account {
	owner: String,
	balance: i64,
	frozen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
	Basic = 0,
	Gold = 10,
}

struct Unregistered;

fn account_table() -> TypeTable {
	TypeTable::new::<Account>([
		MemberBuilder::<Account, _>::new("owner", "String", |v| &v.owner)
			.writable(|v| &mut v.owner)
			.attribute(AttributeDescriptor::new("doc").arg(AttrValue::Str(" Account holder.")))
			.build(),
		MemberBuilder::<Account, _>::new("balance", "i64", |v| &v.balance)
			.writable(|v| &mut v.balance)
			.build(),
		MemberBuilder::<Account, _>::new("frozen", "bool", |v| &v.frozen).build(),
	])
}

fn tier_key(value: &dyn Any) -> Option<i64> {
	value.downcast_ref::<Tier>().map(|v| match v {
		Tier::Basic => 0,
		Tier::Gold => 10,
	})
}

fn tier_table() -> EnumTable {
	EnumTable::new::<Tier>(
		tier_key,
		[
			EnumValueDescriptor::new("Basic", 0, 0),
			EnumValueDescriptor::new("Gold", 10, 10)
				.attribute(AttributeDescriptor::new("serde").named("rename", AttrValue::Str("gold"))),
		],
	)
}

static ACCOUNT: Registration = Registration::members("Account", TypeId::of::<Account>, account_table);
static TIER: Registration = Registration::enum_values("Tier", TypeId::of::<Tier>, tier_table);

fn registry() -> Registry {
	Registry::new([&ACCOUNT, &TIER])
}

/// Member tables list members in declaration order.
#[test]
fn test_members_in_declaration_order() {
	let registry = registry();
	let table = registry.members::<Account>().expect("Account is registered");

	assert_eq!(table.names().collect::<Vec<_>>(), vec!["owner", "balance", "frozen"]);
	assert_eq!(table.type_id(), TypeId::of::<Account>());
	assert!(table.get("frozen").is_some_and(|m| !m.is_writable()));
	assert_eq!(
		table.get("owner").map(|m| m.to_string()),
		Some(r#"owner: String [doc(" Account holder.")]"#.to_string())
	);
}

/// Querying a type with no registration fails with an actionable message.
#[test]
fn test_not_registered_is_hard_failure() {
	let registry = registry();

	let err = registry.members::<Unregistered>().unwrap_err();
	assert!(matches!(
		err,
		RegistryError::NotRegistered {
			kind: TableKind::Members,
			..
		}
	));
	let message = err.to_string();
	assert!(message.contains("Unregistered"), "{message}");
	assert!(message.contains("bootstrap"), "{message}");

	// An enum registration does not satisfy a member query and vice versa.
	assert!(registry.members::<Tier>().is_err());
	assert!(registry.enum_values::<Account>().is_err());
}

/// Enum values resolve through the generated key function.
#[test]
fn test_enum_value_info() {
	let registry = registry();

	let gold = registry.enum_value_info(&Tier::Gold).expect("Tier is registered");
	assert_eq!(gold.name(), "Gold");
	assert_eq!(gold.value(), 10);
	assert_eq!(
		gold.attribute_of("serde").and_then(|a| a.get("rename")),
		Some(&AttrValue::Str("gold"))
	);

	let table = registry.enum_values::<Tier>().unwrap();
	assert_eq!(table.by_name("Basic").map(|v| v.key()), Some(0));
	assert!(table.lookup(&42u8).is_none());
}

#[rstest]
#[case(Tier::Basic, "Basic", 0)]
#[case(Tier::Gold, "Gold", 10)]
fn test_enum_lookup_by_value_and_key(#[case] value: Tier, #[case] name: &str, #[case] key: i64) {
	let registry = registry();
	let table = registry.enum_values::<Tier>().unwrap();

	assert_eq!(table.key_of(&value), Some(key));
	assert_eq!(table.lookup(&value).map(|v| v.name()), Some(name));
	assert_eq!(table.get(key).map(|v| v.name()), Some(name));
	assert!(std::ptr::eq(
		registry.enum_value_info(&value).unwrap(),
		table.get(key).unwrap()
	));
}

/// Accessors reached through the registry read and write live instances.
#[test]
fn test_accessors_through_registry() {
	let registry = registry();
	let table = registry.members::<Account>().unwrap();
	let mut account = Account {
		owner: "ada".into(),
		..Default::default()
	};

	let balance = table.get("balance").unwrap();
	assert!(balance.try_set_value(&mut account, 250i64));
	assert_eq!(balance.try_get_as::<i64>(&account), Some(&250));

	let frozen = table.get("frozen").unwrap();
	assert!(!frozen.try_set_value(&mut account, true));
	assert!(!account.frozen);

	assert!(balance.try_get(&"not an account").is_none());
}

static LAZY_BUILDS: AtomicUsize = AtomicUsize::new(0);

struct Lazy {
	value: u32,
}

fn lazy_table() -> TypeTable {
	LAZY_BUILDS.fetch_add(1, Ordering::SeqCst);
	TypeTable::new::<Lazy>([MemberBuilder::<Lazy, _>::new("value", "u32", |v| &v.value).build()])
}

static LAZY: Registration = Registration::members("Lazy", TypeId::of::<Lazy>, lazy_table);

/// Indexing builds nothing; the first query builds once and later queries reuse it.
#[test]
fn test_tables_build_lazily_once() {
	let registry = Registry::new([&LAZY]);
	assert!(registry.is_registered::<Lazy>(TableKind::Members));
	assert_eq!(LAZY_BUILDS.load(Ordering::SeqCst), 0);

	let first = registry.members::<Lazy>().unwrap() as *const TypeTable;
	let second = registry.members::<Lazy>().unwrap() as *const TypeTable;
	assert_eq!(LAZY_BUILDS.load(Ordering::SeqCst), 1);
	assert!(std::ptr::eq(first, second));
}

static SHARED_BUILDS: AtomicUsize = AtomicUsize::new(0);

struct Shared {
	a: u64,
	b: u64,
}

fn shared_table() -> TypeTable {
	SHARED_BUILDS.fetch_add(1, Ordering::SeqCst);
	TypeTable::new::<Shared>([
		MemberBuilder::<Shared, _>::new("a", "u64", |v| &v.a).build(),
		MemberBuilder::<Shared, _>::new("b", "u64", |v| &v.b).build(),
	])
}

static SHARED: Registration = Registration::members("Shared", TypeId::of::<Shared>, shared_table);

/// Concurrent first queries run one initializer and observe the same table.
#[test]
fn test_concurrent_first_access() {
	const THREADS: usize = 16;

	let registry = Registry::new([&SHARED]);
	let barrier = Barrier::new(THREADS);

	let tables: Vec<usize> = std::thread::scope(|scope| {
		let handles: Vec<_> = (0..THREADS)
			.map(|_| {
				scope.spawn(|| {
					barrier.wait();
					let table = registry.members::<Shared>().unwrap();
					assert_eq!(table.names().collect::<Vec<_>>(), vec!["a", "b"]);
					table as *const TypeTable as usize
				})
			})
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});

	assert!(tables.windows(2).all(|w| w[0] == w[1]));
	assert_eq!(SHARED_BUILDS.load(Ordering::SeqCst), 1);
}

fn other_account_table() -> TypeTable {
	TypeTable::new::<Account>([])
}

static ACCOUNT_AGAIN: Registration = Registration::members("Account", TypeId::of::<Account>, other_account_table);

/// A second registration of the same slot is ignored.
#[test]
fn test_duplicate_registration_keeps_first() {
	let registry = Registry::new([&ACCOUNT, &ACCOUNT_AGAIN, &TIER]);
	assert_eq!(registry.len(), 2);
	assert_eq!(registry.members::<Account>().unwrap().len(), 3);
	assert_eq!(registry.registered_types(TableKind::Members), vec!["Account"]);
}

struct Submitted {
	id: u8,
}

fn submitted_table() -> TypeTable {
	TypeTable::new::<Submitted>([MemberBuilder::<Submitted, _>::new("id", "u8", |v| &v.id).build()])
}

inventory::submit! {
	Registration::members("Submitted", TypeId::of::<Submitted>, submitted_table)
}

/// Registrations submitted through `inventory` reach the global registry.
#[test]
fn test_global_registry_collects_submissions() {
	let table = crate::members::<Submitted>().expect("submitted through inventory");
	assert_eq!(table.names().collect::<Vec<_>>(), vec!["id"]);
	assert!(crate::members::<Unregistered>().is_err());
}
