//! Build-time half of Prism.
//!
//! Runs from a build script over the crate's own sources and generates the
//! registrations `prism_meta` serves at run time.
//!
//! # Pipeline
//!
//! 1. [`model`] parses the module tree into a [`CrateModel`]: declarations,
//!    `use` tables and every function body.
//! 2. [`discover`] finds the closed types that query sites ask about,
//!    following generic functions out to their callers.
//! 3. [`extract`] reads members, enum values and attributes of each type.
//! 4. [`emit`] writes one registration per (type, table).
//! 5. [`pipeline`] repeats 2-4 with the generated unit included until the
//!    usage set is stable.
//!
//! Problems with requested types are collected into [`Diagnostics`] and fail
//! the build; query sites whose type cannot be determined statically are
//! reported as warnings and stay unregistered.

pub mod config;
pub mod consteval;
pub mod discover;
mod driver;
pub mod emit;
pub mod error;
pub mod extract;
pub mod model;
pub mod pipeline;

pub use config::ScanConfig;
pub use driver::{BuildCtx, build, try_build};
pub use error::{Diagnostic, Diagnostics, Location, ScanError};
pub use model::CrateModel;
pub use pipeline::{Output, Pipeline};
