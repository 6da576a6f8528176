//! Runtime half of Prism: compile-time generated type metadata.
//!
//! The `prism-scan` build step discovers every closed type queried through
//! this crate, extracts its members and attributes, and emits registrations
//! that land in the process-wide [`Registry`]. Nothing here inspects types at
//! run time; a type the build step never saw is reported as
//! [`RegistryError::NotRegistered`].
//!
//! # Query API
//!
//! - [`members`] / [`DescribeExt::members`] - member table of a struct
//! - [`enum_values`] - value table of a fieldless enum
//! - [`enum_value_info`] / [`DescribeExt::enum_value_info`] - descriptor of one enum value
//! - [`bootstrap`] - forces generation for a type no query site names
//!
//! # Wiring
//!
//! ```ignore
//! // build.rs
//! fn main() {
//!     prism_scan::build();
//! }
//!
//! // src/lib.rs
//! prism_meta::include_registrations!();
//! ```

mod descriptor;
mod error;
mod ext;
mod registry;
mod table;

use std::any::Any;

pub use descriptor::{Access, AttrValue, AttributeDescriptor, EnumValueDescriptor, MemberDescriptor};
pub use error::{RegistryError, Result};
pub use ext::DescribeExt;
#[cfg(feature = "derive")]
pub use prism_macros::Describe;
pub use registry::{Registration, Registry, TableKind};
pub use table::{EnumTable, KeyFn, TypeTable};

/// Marker implemented by `#[derive(Describe)]`.
///
/// The derive only validates `#[prism(...)]` helper attributes; metadata is
/// generated for any queried type whether or not it carries the marker.
pub trait Described: Any {}

/// Member table of `T` from the global registry.
pub fn members<T: Any>() -> Result<&'static TypeTable> {
	Registry::global().members::<T>()
}

/// Value table of the enum `E` from the global registry.
pub fn enum_values<E: Any>() -> Result<&'static EnumTable> {
	Registry::global().enum_values::<E>()
}

/// Descriptor of a live enum value from the global registry.
pub fn enum_value_info<E: Any>(value: &E) -> Result<&'static EnumValueDescriptor> {
	Registry::global().enum_value_info(value)
}

/// Forces the build step to generate metadata for `T`.
///
/// Does nothing at run time. The call only has to appear somewhere in the
/// crate's source for the scanner to pick it up, which covers types reached
/// only through trait objects or generic impls the scanner cannot follow.
#[inline(always)]
pub fn bootstrap<T: Any>() {}

/// Includes the registrations generated by `prism-scan` into the current crate.
///
/// Must be invoked at the crate root so generated code can reach every
/// described type.
#[macro_export]
macro_rules! include_registrations {
	() => {
		include!(concat!(env!("OUT_DIR"), "/prism_registrations.rs"));
	};
	($file:literal) => {
		include!(concat!(env!("OUT_DIR"), "/", $file));
	};
}

/// Support surface for generated code. Not public API.
#[doc(hidden)]
pub mod __private {
	pub use inventory;

	pub use crate::descriptor::MemberBuilder;
	pub use crate::{
		AttrValue, AttributeDescriptor, EnumTable, EnumValueDescriptor, MemberDescriptor, Registration, TypeTable,
	};
}
