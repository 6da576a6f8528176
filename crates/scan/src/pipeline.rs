//! Discovery and emission run to a fixed point.
//!
//! Generated code is itself Rust in the crate, so after each emission the
//! generated unit is put back into the [`CrateModel`] and discovery runs
//! again. The loop stops when a pass finds exactly the usages of the pass
//! before it, or after `max-passes` passes.

use crate::config::ScanConfig;
use crate::discover::{ClosedTypeUsage, Discoverer, DroppedUsage};
use crate::emit::{Emitter, Table};
use crate::error::Diagnostics;
use crate::model::{ClosedType, CrateModel};

/// Final result of a scanner run.
#[derive(Debug, Clone, Default)]
pub struct Output {
	/// Generated registration source.
	pub source: String,
	pub usages: Vec<ClosedTypeUsage>,
	pub dropped: Vec<DroppedUsage>,
	pub registrations: Vec<(ClosedType, Table)>,
	/// Passes run, including the confirming one.
	pub passes: usize,
}

pub struct Pipeline<'c> {
	config: &'c ScanConfig,
}

impl<'c> Pipeline<'c> {
	pub fn new(config: &'c ScanConfig) -> Self {
		Self { config }
	}

	/// Runs discover/emit over `model` until the usage set is stable.
	///
	/// On return `model` holds the generated unit of the last pass.
	pub fn run(&self, model: &mut CrateModel) -> Result<Output, Diagnostics> {
		let mut output = Output::default();
		let mut previous = None;

		for pass in 1..=self.config.max_passes {
			let discovery = Discoverer::new(model, self.config).discover();
			let keys = discovery.keys();
			if previous.as_ref() == Some(&keys) {
				tracing::debug!(pass, usages = keys.len(), "usage set stable");
				output.passes = pass;
				return Ok(output);
			}

			let emitted = Emitter::new(model, self.config)?.emit(&discovery.usages)?;
			model.set_generated(&emitted.source)?;
			tracing::debug!(
				pass,
				usages = discovery.usages.len(),
				dropped = discovery.dropped.len(),
				registrations = emitted.registrations.len(),
				"pass complete"
			);

			output = Output {
				source: emitted.source,
				usages: discovery.usages,
				dropped: discovery.dropped,
				registrations: emitted.registrations,
				passes: pass,
			};
			previous = Some(keys);
		}

		tracing::warn!(
			max_passes = self.config.max_passes,
			"usage set not confirmed stable within max-passes; keeping the last pass"
		);
		Ok(output)
	}
}
