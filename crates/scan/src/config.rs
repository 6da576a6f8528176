//! Scanner configuration from `[package.metadata.prism]`.
//!
//! ```toml
//! [package.metadata.prism]
//! root = "src/lib.rs"
//! max-generic-depth = 8
//! max-passes = 4
//! runtime-crate = "::prism_meta"
//! output-file = "prism_registrations.rs"
//! warn-unresolved = true
//! ```
//!
//! Every key is optional. `PRISM_MAX_GENERIC_DEPTH` and `PRISM_MAX_PASSES`
//! override the manifest.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Environment variables that override manifest settings.
pub const ENV_OVERRIDES: [&str; 2] = ["PRISM_MAX_GENERIC_DEPTH", "PRISM_MAX_PASSES"];

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading the manifest.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the manifest that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// The manifest or the `prism` table is malformed.
	#[error("invalid [package.metadata.prism] table: {0}")]
	Toml(#[from] toml::de::Error),

	/// An environment override is not a positive integer.
	#[error("{var} must be a positive integer, got {value:?}")]
	InvalidOverride { var: &'static str, value: String },

	/// `runtime-crate` is not a path.
	#[error("runtime-crate {0:?} is not a valid path")]
	InvalidRuntimeCrate(String),

	/// A bound is zero.
	#[error("{0} must be at least 1")]
	ZeroBound(&'static str),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings of one scanner run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ScanConfig {
	/// Crate root relative to the manifest directory.
	pub root: Option<PathBuf>,
	/// Bound on following generic functions to their callers.
	pub max_generic_depth: usize,
	/// Bound on discover/emit passes over the crate plus its generated unit.
	pub max_passes: usize,
	/// Path of the runtime crate as seen from the described crate.
	pub runtime_crate: String,
	/// Output file name inside `OUT_DIR`.
	pub output_file: String,
	/// Print dropped usages as cargo warnings.
	pub warn_unresolved: bool,
}

impl Default for ScanConfig {
	fn default() -> Self {
		Self {
			root: None,
			max_generic_depth: 8,
			max_passes: 4,
			runtime_crate: "::prism_meta".to_string(),
			output_file: "prism_registrations.rs".to_string(),
			warn_unresolved: true,
		}
	}
}

#[derive(Deserialize)]
struct Manifest {
	#[serde(default)]
	package: Option<Package>,
}

#[derive(Deserialize)]
struct Package {
	#[serde(default)]
	metadata: Option<Metadata>,
}

#[derive(Deserialize)]
struct Metadata {
	#[serde(default)]
	prism: Option<ScanConfig>,
}

impl ScanConfig {
	/// Reads the `prism` table of a `Cargo.toml`. A missing table yields defaults.
	pub fn parse_manifest(text: &str) -> Result<Self> {
		let manifest: Manifest = toml::from_str(text)?;
		let config = manifest
			.package
			.and_then(|p| p.metadata)
			.and_then(|m| m.prism)
			.unwrap_or_default();
		config.validate()?;
		Ok(config)
	}

	/// Loads the `prism` table from the manifest at `path`.
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::parse_manifest(&text)
	}

	/// Applies environment overrides read through `lookup`.
	pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
		for var in ENV_OVERRIDES {
			let Some(value) = lookup(var) else {
				continue;
			};
			let parsed = value
				.trim()
				.parse::<usize>()
				.ok()
				.filter(|n| *n > 0)
				.ok_or_else(|| ConfigError::InvalidOverride {
					var,
					value: value.clone(),
				})?;
			match var {
				"PRISM_MAX_GENERIC_DEPTH" => self.max_generic_depth = parsed,
				_ => self.max_passes = parsed,
			}
			tracing::debug!(var, value = parsed, "configuration override");
		}
		Ok(())
	}

	/// Crate root file relative to the manifest directory.
	pub fn root_file(&self, manifest_dir: &Path) -> PathBuf {
		if let Some(root) = &self.root {
			return manifest_dir.join(root);
		}
		let lib = manifest_dir.join("src/lib.rs");
		if lib.is_file() {
			lib
		} else {
			manifest_dir.join("src/main.rs")
		}
	}

	/// `runtime-crate` parsed as a path for generated code.
	pub fn runtime_path(&self) -> Result<syn::Path> {
		syn::parse_str(&self.runtime_crate).map_err(|_| ConfigError::InvalidRuntimeCrate(self.runtime_crate.clone()))
	}

	/// Leading segment of `runtime-crate`, the name query paths are qualified with.
	pub fn runtime_crate_name(&self) -> &str {
		let trimmed = self.runtime_crate.trim_start_matches("::");
		trimmed.split("::").next().unwrap_or(trimmed)
	}

	fn validate(&self) -> Result<()> {
		if self.max_generic_depth == 0 {
			return Err(ConfigError::ZeroBound("max-generic-depth"));
		}
		if self.max_passes == 0 {
			return Err(ConfigError::ZeroBound("max-passes"));
		}
		self.runtime_path()?;
		Ok(())
	}
}
