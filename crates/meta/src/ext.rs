//! Method-call form of the query API.

use std::any::Any;

use crate::descriptor::EnumValueDescriptor;
use crate::error::Result;
use crate::table::TypeTable;

/// Extension methods available on every `'static` value.
///
/// Calls such as `user.members()` are query sites like
/// [`members::<User>()`](crate::members); the build step resolves the
/// receiver type and generates the table.
pub trait DescribeExt: Any {
	/// Member table of `Self`.
	fn members(&self) -> Result<&'static TypeTable>
	where
		Self: Sized,
	{
		crate::members::<Self>()
	}

	/// Descriptor of this enum value.
	fn enum_value_info(&self) -> Result<&'static EnumValueDescriptor>
	where
		Self: Sized,
	{
		crate::enum_value_info(self)
	}
}

impl<T: Any> DescribeExt for T {}
