use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;
use crate::model::Unresolved;

const TYPES: &str = r#"
use prism_meta::{DescribeExt, bootstrap, enum_value_info, enum_values, members};

pub struct User {
	pub name: String,
}

pub struct Pair<T> {
	pub left: T,
}

#[derive(Clone, Copy)]
pub enum Status {
	On,
	Off,
}
"#;

fn discover_with(body: &str, config: &ScanConfig) -> Discovery {
	let source = format!("{TYPES}\n{body}");
	let model = CrateModel::from_sources([("crate", source.as_str())]).unwrap();
	Discoverer::new(&model, config).discover()
}

fn discover(body: &str) -> Discovery {
	discover_with(body, &ScanConfig::default())
}

fn keys(discovery: &Discovery) -> Vec<(String, QueryKind)> {
	discovery
		.usages
		.iter()
		.map(|u| (u.ty.to_string(), u.kind))
		.collect()
}

fn usage(ty: &str, kind: QueryKind) -> (String, QueryKind) {
	(ty.to_string(), kind)
}

#[test]
fn test_direct_queries() {
	let discovery = discover(
		r#"
fn direct() {
	let _ = members::<User>();
	let _ = prism_meta::enum_values::<Status>();
	prism_meta::bootstrap::<Pair<User>>();
	let _ = ::prism_meta::members::<Pair<u8>>();
}
"#,
	);
	assert_eq!(
		keys(&discovery),
		vec![
			usage("crate::Pair<crate::User>", QueryKind::Bootstrap),
			usage("crate::Pair<u8>", QueryKind::Members),
			usage("crate::Status", QueryKind::EnumValues),
			usage("crate::User", QueryKind::Members),
		]
	);
	assert!(discovery.dropped.is_empty());
}

#[test]
fn test_aliased_runtime_crate() {
	let discovery = discover(
		r#"
use prism_meta as meta;

fn aliased() {
	let _ = meta::members::<User>();
}
"#,
	);
	assert_eq!(keys(&discovery), vec![usage("crate::User", QueryKind::Members)]);
}

/// A local free function named like a query is not the runtime query.
#[test]
fn test_local_function_shadows_query() {
	let local = r#"
fn members<T>() -> usize {
	0
}

fn shadowed() {
	let _ = members::<crate::User>();
}
"#;
	let model = CrateModel::from_sources([("crate", TYPES), ("crate::local", local)]).unwrap();
	let discovery = Discoverer::new(&model, &ScanConfig::default()).discover();
	assert!(discovery.usages.is_empty());
}

#[test]
fn test_value_queries() {
	let discovery = discover(
		r#"
fn values() {
	let user = User { name: String::new() };
	let _ = user.members();
	let status = Status::On;
	let _ = enum_value_info(&status);
	let _ = Status::Off.enum_value_info();
}
"#,
	);
	assert_eq!(
		keys(&discovery),
		vec![
			usage("crate::Status", QueryKind::EnumValues),
			usage("crate::User", QueryKind::Members),
		]
	);
}

#[test]
fn test_unknown_receiver_is_dropped() {
	let discovery = discover(
		r#"
fn unknown() {
	let value = load();
	let _ = value.members();
}
"#,
	);
	assert!(discovery.usages.is_empty());
	assert_eq!(discovery.dropped.len(), 1);
	assert_eq!(discovery.dropped[0].reason, DropReason::UnknownReceiver);
	assert_eq!(discovery.dropped[0].written, "value");
}

/// An inherent method named `members` wins over the extension trait.
#[test]
fn test_inherent_method_shadows_extension() {
	let discovery = discover(
		r#"
impl User {
	fn members(&self) -> usize {
		1
	}
}

fn inherent(user: User) -> usize {
	user.members()
}
"#,
	);
	assert!(discovery.usages.is_empty());
	assert!(discovery.dropped.is_empty());
}

#[test]
fn test_generic_chain_through_turbofish() {
	let discovery = discover(
		r#"
fn describe<T: 'static>() -> usize {
	members::<T>().map(|t| t.len()).unwrap_or(0)
}

fn outer<U: 'static>() -> usize {
	describe::<U>()
}

fn entry() {
	outer::<User>();
	outer::<Pair<Status>>();
}
"#,
	);
	assert_eq!(
		keys(&discovery),
		vec![
			usage("crate::Pair<crate::Status>", QueryKind::Members),
			usage("crate::User", QueryKind::Members),
		]
	);
}

#[test]
fn test_generic_chain_through_values() {
	let discovery = discover(
		r#"
fn show<T: DescribeExt>(value: &T) {
	let _ = value.members();
}

fn wrap<T>(pair: Pair<T>) {
	let _ = members::<Pair<T>>();
}

fn run() {
	let user = User { name: String::new() };
	show(&user);
	wrap(Pair { left: Status::On });
}
"#,
	);
	assert_eq!(keys(&discovery), vec![usage("crate::User", QueryKind::Members)]);
	// `Pair { .. }` without a turbofish does not determine `T`.
	assert_eq!(discovery.dropped.len(), 1);
	assert!(matches!(
		&discovery.dropped[0].reason,
		DropReason::Uninferred { param, function, .. } if param == "T" && function == "wrap"
	));
}

#[test]
fn test_associated_function_return_types() {
	let discovery = discover(
		r#"
impl User {
	fn guest() -> Self {
		User { name: String::new() }
	}
}

fn make() -> Status {
	Status::Off
}

fn query<T: 'static>(_value: &T) {
	let _ = bootstrap::<T>();
}

fn run() {
	query(&User::guest());
	let status = make();
	query(&status);
}
"#,
	);
	assert_eq!(
		keys(&discovery),
		vec![
			usage("crate::Status", QueryKind::Bootstrap),
			usage("crate::User", QueryKind::Bootstrap),
		]
	);
}

#[test]
fn test_mutual_recursion_terminates() {
	let discovery = discover(
		r#"
fn ping<T: 'static>(n: u32) {
	if n > 0 {
		pong::<T>(n - 1)
	} else {
		let _ = members::<T>();
	}
}

fn pong<T: 'static>(n: u32) {
	ping::<T>(n)
}

fn start() {
	ping::<User>(3);
}
"#,
	);
	assert_eq!(keys(&discovery), vec![usage("crate::User", QueryKind::Members)]);
	assert!(discovery.dropped.is_empty());
}

const CHAIN: &str = r#"
fn a<T: 'static>() {
	let _ = members::<T>();
}

fn b<T: 'static>() {
	a::<T>()
}

fn c<T: 'static>() {
	b::<T>()
}

fn go() {
	c::<User>();
}
"#;

#[rstest]
#[case(2, false)]
#[case(3, true)]
#[case(8, true)]
fn test_generic_depth_bound(#[case] limit: usize, #[case] found: bool) {
	let config = ScanConfig {
		max_generic_depth: limit,
		..ScanConfig::default()
	};
	let discovery = discover_with(CHAIN, &config);
	assert_eq!(!discovery.usages.is_empty(), found);
	if !found {
		assert_eq!(discovery.dropped[0].reason, DropReason::DepthExceeded { limit });
	}
}

#[test]
fn test_generic_without_callers_is_dropped() {
	let discovery = discover(
		r#"
pub fn unused<T: 'static>() {
	let _ = members::<T>();
}
"#,
	);
	assert!(discovery.usages.is_empty());
	assert_eq!(
		discovery.dropped[0].reason,
		DropReason::NoCallers {
			function: "unused".into()
		}
	);
	assert_eq!(discovery.dropped[0].written, "T");
}

#[test]
fn test_impl_generic_is_dropped() {
	let discovery = discover(
		r#"
pub struct Wrapper<T>(T);

impl<T: 'static> Wrapper<T> {
	pub fn describe(&self) {
		let _ = members::<T>();
	}
}
"#,
	);
	assert!(discovery.usages.is_empty());
	assert_eq!(
		discovery.dropped[0].reason,
		DropReason::Unresolved(Unresolved::OuterGeneric("T".into()))
	);
	let message = discovery.dropped[0].to_string();
	assert!(message.contains("bootstrap"), "{message}");
}

#[test]
fn test_queries_inside_macros() {
	let discovery = discover(
		r#"
fn checks() {
	assert!(members::<User>().is_ok());
	println!("{:?}", enum_values::<Status>().map(|t| t.len()));
}
"#,
	);
	assert_eq!(
		keys(&discovery),
		vec![
			usage("crate::Status", QueryKind::EnumValues),
			usage("crate::User", QueryKind::Members),
		]
	);
}

#[test]
fn test_queries_in_initializers_and_closures() {
	let discovery = discover(
		r#"
static FIELDS: fn() -> usize = || members::<User>().map(|t| t.len()).unwrap_or(0);

fn closure() {
	let f = |s: Status| enum_value_info(&s).is_ok();
	f(Status::On);
}
"#,
	);
	assert_eq!(
		keys(&discovery),
		vec![
			usage("crate::Status", QueryKind::EnumValues),
			usage("crate::User", QueryKind::Members),
		]
	);
}

/// Repeated sites collapse into one usage located at the earliest site.
#[test]
fn test_usages_are_deduplicated() {
	let discovery = discover(
		r#"
fn first() {
	let _ = members::<User>();
}

fn second() {
	let _ = members::<crate::User>();
	let _ = members::<User>();
}
"#,
	);
	assert_eq!(discovery.usages.len(), 1);
	// TYPES, the separator line, the body's leading newline, then `fn first`.
	let first_line = TYPES.lines().count() + 4;
	assert_eq!(discovery.usages[0].location.line, first_line);
}

#[test]
fn test_order_is_independent_of_source_order() {
	let a = "pub fn a() { let _ = prism_meta::members::<crate::User>(); }";
	let b = "pub fn b() { let _ = prism_meta::enum_values::<crate::Status>(); }";
	let build = |sources: [(&str, &str); 3]| {
		let model = CrateModel::from_sources(sources).unwrap();
		keys(&Discoverer::new(&model, &ScanConfig::default()).discover())
	};

	let forward = build([("crate", TYPES), ("crate::a", a), ("crate::b", b)]);
	let backward = build([("crate::b", b), ("crate::a", a), ("crate", TYPES)]);
	assert_eq!(forward, backward);
	assert_eq!(forward.len(), 2);
}

/// Aliases are expanded before a usage is recorded, generic ones with their
/// arguments substituted.
#[test]
fn test_type_aliases_are_expanded() {
	let discovery = discover(
		r#"
pub type Users = Pair<User>;
type Twin<T> = Pair<T>;

mod nested {
	pub type Tag = crate::Status;
}

use nested::Tag;

fn describe<T: 'static>() {
	let _ = members::<T>();
}

fn aliased() {
	let _ = members::<Users>();
	let _ = members::<Twin<Status>>();
	let _ = enum_values::<Tag>();
	describe::<Users>();
}
"#,
	);
	assert_eq!(
		keys(&discovery),
		vec![
			usage("crate::Pair<crate::Status>", QueryKind::Members),
			usage("crate::Pair<crate::User>", QueryKind::Members),
			usage("crate::Status", QueryKind::EnumValues),
		]
	);
	assert!(discovery.dropped.is_empty());
}

/// Types the crate does not declare are dropped, not passed on to extraction.
#[test]
fn test_undeclared_types_are_dropped() {
	let discovery = discover(
		r#"
type Loop = Back;
type Back = Loop;

fn describe<T: 'static>() {
	let _ = members::<T>();
}

fn foreign() {
	let _ = members::<String>();
	let _ = members::<Vec<User>>();
	describe::<std::time::Duration>();
	let _ = members::<Loop>();
}
"#,
	);
	assert!(discovery.usages.is_empty());
	assert_eq!(discovery.dropped.len(), 4);

	let mut undeclared: Vec<_> = discovery
		.dropped
		.iter()
		.filter_map(|d| match &d.reason {
			DropReason::NotDeclared { ty } => Some(ty.as_str()),
			_ => None,
		})
		.collect();
	undeclared.sort_unstable();
	assert_eq!(undeclared, vec!["String", "Vec<crate::User>", "std::time::Duration"]);

	// An alias cycle has no closed identity.
	assert!(discovery.dropped.iter().any(|d| d.written == "Loop"
		&& matches!(&d.reason, DropReason::Unresolved(Unresolved::Unsupported(_)))));
}
