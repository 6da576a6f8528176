//! Runtime lookup errors.

use crate::registry::TableKind;

/// Errors raised by registry queries.
///
/// Instance type mismatches in [`MemberDescriptor::try_get`] and
/// [`MemberDescriptor::try_set`] are not errors; they are reported through the
/// return value.
///
/// [`MemberDescriptor::try_get`]: crate::MemberDescriptor::try_get
/// [`MemberDescriptor::try_set`]: crate::MemberDescriptor::try_set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
	/// No registration exists for the queried type and table kind.
	#[error(
		"type `{type_name}` is not registered for {kind} metadata; add `prism_meta::bootstrap::<{type_name}>()` \
		 to the crate that declares it so the build step generates its table"
	)]
	NotRegistered {
		type_name: &'static str,
		kind: TableKind,
	},

	/// The enum table has no entry for the value's key.
	#[error("value of `{type_name}` (key {key:?}) has no entry in its enum table")]
	UnknownEnumValue {
		type_name: &'static str,
		key: Option<i64>,
	},
}

/// Result type for registry queries.
pub type Result<T> = std::result::Result<T, RegistryError>;
