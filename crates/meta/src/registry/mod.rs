//! Process-wide metadata registry.
//!
//! # Mental Model
//!
//! 1. **Build time:** the scanner emits one [`Registration`] per closed type and
//!    table kind, submitted through `inventory`.
//! 2. **Indexing:** the first query against [`Registry::global`] collects every
//!    submitted registration into slots keyed by `TypeId`. No table is built yet.
//! 3. **Lazy tables:** each slot owns a `OnceLock`; the first query for a type
//!    runs its generated builder exactly once, every later query reads the
//!    published table.
//!
//! # Concurrency
//!
//! - First access: racing threads block on the slot's `OnceLock` until the single
//!   initializer finishes, so no partially built table is observable.
//! - Steady state: lock-free reads of immutable data.
//!
//! # Invariants
//!
//! - A table is never rebuilt or mutated after publication.
//! - A type that was never registered fails with [`RegistryError::NotRegistered`];
//!   there is no fallback.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::descriptor::EnumValueDescriptor;
use crate::error::{RegistryError, Result};
use crate::table::{EnumTable, TypeTable};

/// Which metadata table a registration or query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
	/// Data members of a struct.
	Members,
	/// Values of a fieldless enum.
	EnumValues,
}

impl fmt::Display for TableKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Members => "member",
			Self::EnumValues => "enum value",
		})
	}
}

#[derive(Clone, Copy)]
enum TableBuilder {
	Members(fn() -> TypeTable),
	EnumValues(fn() -> EnumTable),
}

/// Static registration record emitted by the build step.
pub struct Registration {
	type_name: &'static str,
	type_id: fn() -> TypeId,
	builder: TableBuilder,
}

impl Registration {
	/// Registers the member table builder of a struct.
	pub const fn members(type_name: &'static str, type_id: fn() -> TypeId, build: fn() -> TypeTable) -> Self {
		Self {
			type_name,
			type_id,
			builder: TableBuilder::Members(build),
		}
	}

	/// Registers the value table builder of an enum.
	pub const fn enum_values(type_name: &'static str, type_id: fn() -> TypeId, build: fn() -> EnumTable) -> Self {
		Self {
			type_name,
			type_id,
			builder: TableBuilder::EnumValues(build),
		}
	}

	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn type_id(&self) -> TypeId {
		(self.type_id)()
	}

	pub fn kind(&self) -> TableKind {
		match self.builder {
			TableBuilder::Members(_) => TableKind::Members,
			TableBuilder::EnumValues(_) => TableKind::EnumValues,
		}
	}
}

impl fmt::Debug for Registration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registration")
			.field("type_name", &self.type_name)
			.field("kind", &self.kind())
			.finish()
	}
}

inventory::collect!(Registration);

struct Slot<T> {
	type_name: &'static str,
	build: fn() -> T,
	table: OnceLock<T>,
}

impl<T> Slot<T> {
	fn new(type_name: &'static str, build: fn() -> T) -> Self {
		Self {
			type_name,
			build,
			table: OnceLock::new(),
		}
	}

	fn get(&self) -> &T {
		self.table.get_or_init(|| {
			tracing::debug!(type_name = self.type_name, "building metadata table");
			(self.build)()
		})
	}
}

/// Owned index of metadata tables keyed by type.
///
/// [`Registry::global`] is the instance populated from generated
/// registrations; [`Registry::new`] builds an isolated instance from an
/// explicit set.
pub struct Registry {
	members: FxHashMap<TypeId, Slot<TypeTable>>,
	enums: FxHashMap<TypeId, Slot<EnumTable>>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
	/// Indexes `registrations` without building any table.
	///
	/// When a type is registered twice for the same table kind the first
	/// registration wins.
	pub fn new<'a>(registrations: impl IntoIterator<Item = &'a Registration>) -> Self {
		let mut members = FxHashMap::default();
		let mut enums = FxHashMap::default();

		for reg in registrations {
			let id = reg.type_id();
			let inserted = match reg.builder {
				TableBuilder::Members(build) => insert_slot(&mut members, id, reg.type_name, build),
				TableBuilder::EnumValues(build) => insert_slot(&mut enums, id, reg.type_name, build),
			};
			if !inserted {
				tracing::warn!(
					type_name = reg.type_name,
					kind = %reg.kind(),
					"duplicate metadata registration ignored",
				);
			}
		}

		tracing::debug!(
			members = members.len(),
			enums = enums.len(),
			"metadata registry indexed"
		);
		Self { members, enums }
	}

	/// The process-wide registry, indexed from generated registrations on first use.
	pub fn global() -> &'static Registry {
		GLOBAL.get_or_init(|| Registry::new(inventory::iter::<Registration>))
	}

	/// Member table of `T`.
	pub fn members<T: Any>(&self) -> Result<&TypeTable> {
		self.members
			.get(&TypeId::of::<T>())
			.map(Slot::get)
			.ok_or(not_registered::<T>(TableKind::Members))
	}

	/// Value table of the enum `E`.
	pub fn enum_values<E: Any>(&self) -> Result<&EnumTable> {
		self.enums
			.get(&TypeId::of::<E>())
			.map(Slot::get)
			.ok_or(not_registered::<E>(TableKind::EnumValues))
	}

	/// Descriptor of a live enum value.
	pub fn enum_value_info<E: Any>(&self, value: &E) -> Result<&EnumValueDescriptor> {
		let table = self.enum_values::<E>()?;
		let key = table.key_of(value);
		key.and_then(|key| table.get(key))
			.ok_or(RegistryError::UnknownEnumValue {
				type_name: table.type_name(),
				key,
			})
	}

	/// Whether a registration exists for `T` and `kind`, without building the table.
	pub fn is_registered<T: Any>(&self, kind: TableKind) -> bool {
		let id = TypeId::of::<T>();
		match kind {
			TableKind::Members => self.members.contains_key(&id),
			TableKind::EnumValues => self.enums.contains_key(&id),
		}
	}

	/// Names of all registered types of `kind`, sorted.
	pub fn registered_types(&self, kind: TableKind) -> Vec<&'static str> {
		let mut names: Vec<_> = match kind {
			TableKind::Members => self.members.values().map(|s| s.type_name).collect(),
			TableKind::EnumValues => self.enums.values().map(|s| s.type_name).collect(),
		};
		names.sort_unstable();
		names
	}

	/// Total number of registrations.
	pub fn len(&self) -> usize {
		self.members.len() + self.enums.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl fmt::Debug for Registry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registry")
			.field("members", &self.registered_types(TableKind::Members))
			.field("enums", &self.registered_types(TableKind::EnumValues))
			.finish()
	}
}

fn insert_slot<T>(
	slots: &mut FxHashMap<TypeId, Slot<T>>,
	id: TypeId,
	type_name: &'static str,
	build: fn() -> T,
) -> bool {
	if slots.contains_key(&id) {
		return false;
	}
	slots.insert(id, Slot::new(type_name, build));
	true
}

fn not_registered<T: Any>(kind: TableKind) -> RegistryError {
	RegistryError::NotRegistered {
		type_name: std::any::type_name::<T>(),
		kind,
	}
}

#[cfg(test)]
mod tests;
