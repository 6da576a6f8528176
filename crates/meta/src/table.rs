//! Per-type metadata tables.

use std::any::{Any, TypeId};
use std::fmt;

use indexmap::IndexMap;

use crate::descriptor::{EnumValueDescriptor, MemberDescriptor};

/// Member metadata of one closed type, in declaration order.
pub struct TypeTable {
	type_name: &'static str,
	type_id: TypeId,
	members: IndexMap<&'static str, MemberDescriptor>,
}

impl TypeTable {
	pub fn new<T: Any>(members: impl IntoIterator<Item = MemberDescriptor>) -> Self {
		let mut map = IndexMap::new();
		for member in members {
			let previous = map.insert(member.name(), member);
			debug_assert!(previous.is_none(), "duplicate member in generated table");
		}
		Self {
			type_name: std::any::type_name::<T>(),
			type_id: TypeId::of::<T>(),
			members: map,
		}
	}

	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn type_id(&self) -> TypeId {
		self.type_id
	}

	pub fn get(&self, name: &str) -> Option<&MemberDescriptor> {
		self.members.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.members.contains_key(name)
	}

	/// Member names in declaration order.
	pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.members.keys().copied()
	}

	pub fn iter(&self) -> impl Iterator<Item = &MemberDescriptor> {
		self.members.values()
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}
}

impl<'a> IntoIterator for &'a TypeTable {
	type Item = &'a MemberDescriptor;
	type IntoIter = indexmap::map::Values<'a, &'static str, MemberDescriptor>;

	fn into_iter(self) -> Self::IntoIter {
		self.members.values()
	}
}

impl fmt::Debug for TypeTable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TypeTable")
			.field("type_name", &self.type_name)
			.field("members", &self.members.values().collect::<Vec<_>>())
			.finish()
	}
}

/// Maps an enum value to its lookup key.
pub type KeyFn = fn(&dyn Any) -> Option<i64>;

/// Value metadata of one closed enum type, keyed by lookup key.
pub struct EnumTable {
	type_name: &'static str,
	type_id: TypeId,
	key_of: KeyFn,
	values: IndexMap<i64, EnumValueDescriptor>,
}

impl EnumTable {
	pub fn new<E: Any>(key_of: KeyFn, values: impl IntoIterator<Item = EnumValueDescriptor>) -> Self {
		let mut map = IndexMap::new();
		for value in values {
			let previous = map.insert(value.key(), value);
			debug_assert!(previous.is_none(), "duplicate enum key in generated table");
		}
		Self {
			type_name: std::any::type_name::<E>(),
			type_id: TypeId::of::<E>(),
			key_of,
			values: map,
		}
	}

	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn type_id(&self) -> TypeId {
		self.type_id
	}

	/// Looks up a descriptor by key.
	pub fn get(&self, key: i64) -> Option<&EnumValueDescriptor> {
		self.values.get(&key)
	}

	/// Lookup key of `value`, or `None` if it is not of this enum type.
	pub fn key_of(&self, value: &dyn Any) -> Option<i64> {
		(self.key_of)(value)
	}

	/// Looks up the descriptor of a live enum value.
	pub fn lookup(&self, value: &dyn Any) -> Option<&EnumValueDescriptor> {
		self.get(self.key_of(value)?)
	}

	pub fn by_name(&self, name: &str) -> Option<&EnumValueDescriptor> {
		self.values.values().find(|v| v.name() == name)
	}

	/// Descriptors in declaration order.
	pub fn iter(&self) -> impl Iterator<Item = &EnumValueDescriptor> {
		self.values.values()
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

impl<'a> IntoIterator for &'a EnumTable {
	type Item = &'a EnumValueDescriptor;
	type IntoIter = indexmap::map::Values<'a, i64, EnumValueDescriptor>;

	fn into_iter(self) -> Self::IntoIter {
		self.values.values()
	}
}

impl fmt::Debug for EnumTable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EnumTable")
			.field("type_name", &self.type_name)
			.field("values", &self.values.values().collect::<Vec<_>>())
			.finish()
	}
}
