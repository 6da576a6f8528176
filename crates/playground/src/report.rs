//! Generic reporting helpers.
//!
//! These only ever see type parameters; the concrete types they are used with
//! come from the callers at the bottom of this module.

use prism_meta::{AttrValue, DescribeExt, RegistryError, enum_value_info, members};

use crate::model::{Handover, Pair, Status, User};

/// Member names of `T` in declaration order.
pub fn member_names<T: 'static>() -> Result<Vec<&'static str>, RegistryError> {
	Ok(members::<T>()?.names().collect())
}

pub fn pair_member_names<T: 'static>() -> Result<Vec<&'static str>, RegistryError> {
	member_names::<Pair<T>>()
}

/// `(member, declared type)` rows for the type of `value`.
pub fn describe<T: DescribeExt>(value: &T) -> Result<Vec<(&'static str, &'static str)>, RegistryError> {
	Ok(value
		.members()?
		.iter()
		.map(|m| (m.name(), m.declared_type()))
		.collect())
}

/// Serialized label of an enum value: its `serde(rename)`, else its name.
pub fn label<E: 'static>(value: &E) -> Result<&'static str, RegistryError> {
	let info = enum_value_info(value)?;
	Ok(info
		.attribute_of("serde")
		.and_then(|serde| serde.get("rename"))
		.and_then(AttrValue::as_str)
		.unwrap_or(info.name()))
}

/// Column headers of the admin tables.
pub fn admin_columns() -> Result<Vec<Vec<&'static str>>, RegistryError> {
	Ok(vec![
		member_names::<User>()?,
		member_names::<Handover>()?,
		pair_member_names::<u32>()?,
	])
}

pub fn profile(user: &User) -> Result<Vec<(&'static str, &'static str)>, RegistryError> {
	describe(user)
}

pub fn status_label(status: Status) -> Result<&'static str, RegistryError> {
	label(&status)
}
