//! Build-script entry point.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::{ENV_OVERRIDES, ScanConfig};
use crate::error::{Diagnostics, ScanError};
use crate::model::CrateModel;
use crate::pipeline::{Output, Pipeline};

/// Paths Cargo hands a build script.
pub struct BuildCtx {
	pub manifest_dir: PathBuf,
	pub out_dir: PathBuf,
}

impl BuildCtx {
	pub fn new(manifest_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
		Self {
			manifest_dir: manifest_dir.into(),
			out_dir: out_dir.into(),
		}
	}

	/// Reads `CARGO_MANIFEST_DIR` and `OUT_DIR`.
	pub fn from_env() -> Result<Self, ScanError> {
		let var = |name: &'static str| std::env::var_os(name).map(PathBuf::from).ok_or(ScanError::MissingEnv(name));
		Ok(Self::new(var("CARGO_MANIFEST_DIR")?, var("OUT_DIR")?))
	}

	pub fn rerun_if_changed(&self, path: &Path) {
		println!("cargo:rerun-if-changed={}", path.display());
	}

	/// Reruns on any change below `root`, including files added later.
	pub fn rerun_tree(&self, root: &Path) {
		self.rerun_if_changed(root);
		for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
			if entry.file_type().is_file() {
				self.rerun_if_changed(entry.path());
			}
		}
	}

	/// Manifest settings with environment overrides applied.
	pub fn config(&self) -> Result<ScanConfig, ScanError> {
		let manifest = self.manifest_dir.join("Cargo.toml");
		self.rerun_if_changed(&manifest);
		for var in ENV_OVERRIDES {
			println!("cargo:rerun-if-env-changed={var}");
		}
		let mut config = ScanConfig::load(&manifest)?;
		config.apply_env(|var| std::env::var(var).ok())?;
		Ok(config)
	}

	/// Scans the crate and writes the registration file into `OUT_DIR`.
	pub fn run(&self) -> Result<Output, Diagnostics> {
		let config = self.config()?;
		let root = config.root_file(&self.manifest_dir);
		if let Some(dir) = root.parent() {
			self.rerun_tree(dir);
		}

		let mut model = CrateModel::load(&root)?;
		let output = Pipeline::new(&config).run(&mut model)?;
		self.write(&config.output_file, &output.source)?;

		if config.warn_unresolved {
			for dropped in &output.dropped {
				println!("cargo:warning={dropped}");
			}
		}
		tracing::info!(
			root = %root.display(),
			registrations = output.registrations.len(),
			dropped = output.dropped.len(),
			passes = output.passes,
			"registrations generated"
		);
		Ok(output)
	}

	/// Writes `source` unless the file already holds it, keeping its mtime stable.
	fn write(&self, file: &str, source: &str) -> Result<(), ScanError> {
		let path = self.out_dir.join(file);
		if fs::read_to_string(&path).is_ok_and(|existing| existing == source) {
			return Ok(());
		}
		fs::write(&path, source).map_err(|e| ScanError::io(&path, e))
	}
}

/// Runs the scanner for the crate whose build script calls it.
pub fn try_build() -> Result<Output, Diagnostics> {
	BuildCtx::from_env()?.run()
}

/// [`try_build`], failing the build with every diagnostic on error.
///
/// ```ignore
/// // build.rs
/// fn main() {
///     prism_scan::build();
/// }
/// ```
pub fn build() {
	if let Err(diagnostics) = try_build() {
		panic!("prism-scan failed:\n{diagnostics}");
	}
}
