pub mod cut;
pub mod surface_atoms;
pub mod terminations;

use crate::config::{JobConfig, PartialJobConfig, SlabOverrides};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use slabgen::engine::progress::ProgressReporter;
use slabgen::workflows::generator::SlabGenerator;
use std::path::Path;
use tracing::info;

/// Loads a job file, applies the overrides and builds a generator that reports
/// progress on the terminal.
fn prepare_generator(
    input: &Path,
    overrides: &SlabOverrides,
) -> Result<(SlabGenerator<'static>, JobConfig)> {
    let job = PartialJobConfig::from_file(input)?.merge_with_cli(overrides)?;
    info!(
        miller = %job.slab.miller_index,
        layers = job.slab.layers,
        fixed = job.slab.fixed_layers,
        vacuum = job.slab.vacuum,
        "Resolved slab configuration."
    );

    let handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(handler.get_callback());
    let generator = SlabGenerator::with_reporter(job.bulk.clone(), job.slab.clone(), reporter)?;
    Ok((generator, job))
}
