//! A small account domain described by Prism.
//!
//! Nothing here registers metadata by hand. `build.rs` scans this crate, finds
//! every type the code below queries (directly, through the generic helpers
//! in [`report`], or through `bootstrap`) and the generated registrations are
//! included at the root.

pub mod model;
pub mod report;

prism_meta::include_registrations!();
