//! Build-time errors and located diagnostics.

use std::fmt;
use std::path::{Path, PathBuf};

use proc_macro2::Span;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors produced while scanning a crate.
#[derive(Debug, Error)]
pub enum ScanError {
	/// A variable Cargo sets for build scripts is missing.
	#[error("{0} is not set; prism-scan must run from a build script")]
	MissingEnv(&'static str),

	/// Error reading or writing a file.
	#[error("I/O error on {path}: {error}")]
	Io {
		/// Path to the file that failed.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// A source file is not valid Rust.
	#[error("{path}:{line}:{column}: parse error: {message}")]
	Parse {
		path: PathBuf,
		line: usize,
		column: usize,
		message: String,
	},

	/// A `mod name;` declaration has no backing file.
	#[error("file for module `{module}` not found (tried {tried})")]
	ModuleNotFound { module: String, tried: String },

	/// Invalid `[package.metadata.prism]` table or environment override.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// A member cannot be described.
	#[error("cannot describe `{owner}::{member}`: {reason}")]
	UnsupportedMemberKind { owner: String, member: String, reason: String },

	/// An attribute argument is not a compile-time constant.
	#[error("attribute `{attribute}` on `{owner}::{member}` has a non-constant argument: {detail}")]
	NonConstantAttributeArgument {
		owner: String,
		member: String,
		attribute: String,
		detail: String,
	},

	/// An enum discriminant cannot be folded to an integer.
	#[error("discriminant of `{owner}::{variant}` is not an integer constant")]
	NonConstantDiscriminant { owner: String, variant: String },

	/// Two variants map to the same lookup key.
	#[error("`{owner}::{first}` and `{owner}::{second}` share lookup key {key}")]
	DuplicateEnumKey {
		owner: String,
		first: String,
		second: String,
		key: i64,
	},

	/// The requested type has no describable declaration.
	#[error("`{ty}` cannot be described: {reason}")]
	UndescribableType { ty: String, reason: String },
}

impl ScanError {
	pub(crate) fn io(path: &Path, error: std::io::Error) -> Self {
		Self::Io {
			path: path.to_path_buf(),
			error,
		}
	}

	pub(crate) fn parse(path: &Path, error: &syn::Error) -> Self {
		let start = error.span().start();
		Self::Parse {
			path: path.to_path_buf(),
			line: start.line,
			column: start.column + 1,
			message: error.to_string(),
		}
	}
}

/// Source position of a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
	pub file: PathBuf,
	pub line: usize,
	pub column: usize,
}

impl Location {
	pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
		Self {
			file: file.into(),
			line,
			column,
		}
	}

	/// Start of `span` inside `file`. Columns are reported 1-based.
	pub fn from_span(file: &Path, span: Span) -> Self {
		let start = span.start();
		Self::new(file, start.line, start.column + 1)
	}
}

impl fmt::Display for Location {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
	}
}

/// A [`ScanError`] with the place it points at.
#[derive(Debug)]
pub struct Diagnostic {
	pub error: ScanError,
	pub location: Option<Location>,
	/// Where the failing type was requested, when that differs from `location`.
	pub requested_at: Option<Location>,
}

impl Diagnostic {
	pub fn new(error: ScanError) -> Self {
		Self {
			error,
			location: None,
			requested_at: None,
		}
	}

	pub fn at(mut self, location: Location) -> Self {
		self.location = Some(location);
		self
	}

	pub fn requested_at(mut self, location: Location) -> Self {
		self.requested_at = Some(location);
		self
	}
}

impl fmt::Display for Diagnostic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.location {
			Some(location) => write!(f, "{location}: error: {}", self.error)?,
			None => write!(f, "error: {}", self.error)?,
		}
		if let Some(requested) = &self.requested_at {
			write!(f, "\n  note: requested at {requested}")?;
		}
		Ok(())
	}
}

impl From<ScanError> for Diagnostic {
	fn from(error: ScanError) -> Self {
		Self::new(error)
	}
}

/// Every diagnostic of a failed run, in report order.
#[derive(Debug, Error)]
#[error("{}", render(.0))]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
	pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
		self.0.iter()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<ScanError> for Diagnostics {
	fn from(error: ScanError) -> Self {
		Self(vec![Diagnostic::new(error)])
	}
}

impl From<Diagnostic> for Diagnostics {
	fn from(diagnostic: Diagnostic) -> Self {
		Self(vec![diagnostic])
	}
}

fn render(diagnostics: &[Diagnostic]) -> String {
	let mut out = String::new();
	for (i, diagnostic) in diagnostics.iter().enumerate() {
		if i > 0 {
			out.push('\n');
		}
		out.push_str(&diagnostic.to_string());
	}
	out
}

/// Result type for scanning operations.
pub type Result<T> = std::result::Result<T, ScanError>;
