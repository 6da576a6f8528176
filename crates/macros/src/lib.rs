//! Procedural macros for Prism.
//!
//! * `#[derive(Describe)]` - declares and validates the `#[prism(...)]` helper attribute

use proc_macro::TokenStream;

/// Describe derive implementation.
mod describe;

/// Marks a type as described by Prism and validates its helper attributes.
///
/// Metadata itself is generated by the `prism-scan` build step for every
/// queried type; the derive exists so fields can carry `#[prism(...)]`
/// controls and so misuse is reported at the attachment site.
///
/// ```ignore
/// #[derive(Describe)]
/// pub struct User {
///     pub name: String,
///     #[prism(readonly)]
///     pub id: u64,
///     #[prism(skip)]
///     pub cache: Vec<u8>,
/// }
/// ```
///
/// # Field Controls
///
/// * `skip` - leave the field out of the member table
/// * `readonly` - describe the field without a setter
#[proc_macro_derive(Describe, attributes(prism))]
pub fn derive_describe(input: TokenStream) -> TokenStream {
	describe::derive_describe(input)
}
