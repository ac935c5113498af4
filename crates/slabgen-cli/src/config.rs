use crate::cli::{CutArgs, TerminationsArgs};
use crate::error::{CliError, Result};
use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;
use slabgen::core::lattice::miller::MillerIndex;
use slabgen::core::models::structure::Structure;
use slabgen::engine::config::{
    DEFAULT_FIXED_LAYERS, DEFAULT_LAYERS, DEFAULT_TOLERANCE, DEFAULT_VACUUM, SlabConfig,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The bulk crystal, given as cell rows and fractional positions.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct BulkSection {
    cell: [[f64; 3]; 3],
    species: Vec<String>,
    positions: Vec<[f64; 3]>,
    pbc: Option<[bool; 3]>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialSlabConfig {
    #[serde(rename = "miller-index")]
    miller_index: Option<[i64; 3]>,
    layers: Option<usize>,
    #[serde(rename = "fixed-layers")]
    fixed_layers: Option<usize>,
    vacuum: Option<f64>,
    tolerance: Option<f64>,
    termination: Option<usize>,
    primitive: Option<bool>,
}

/// A job file as read from disk, before command-line overrides are applied.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialJobConfig {
    bulk: Option<BulkSection>,
    slab: Option<PartialSlabConfig>,
    #[serde(skip)]
    source: PathBuf,
}

/// A fully resolved job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub bulk: Structure,
    pub slab: SlabConfig,
    pub termination: Option<usize>,
    pub primitive: bool,
}

/// Values that can override the `[slab]` table; flags win over `-S` values, which win
/// over the file.
#[derive(Debug, Default, Clone)]
pub struct SlabOverrides {
    pub miller_index: Option<MillerIndex>,
    pub layers: Option<usize>,
    pub fixed_layers: Option<usize>,
    pub vacuum: Option<f64>,
    pub tolerance: Option<f64>,
    pub termination: Option<usize>,
    pub primitive: bool,
    pub set_values: Vec<String>,
}

impl From<&CutArgs> for SlabOverrides {
    fn from(args: &CutArgs) -> Self {
        Self {
            miller_index: args.miller,
            layers: args.layers,
            fixed_layers: args.fixed,
            vacuum: args.vacuum,
            tolerance: args.tolerance,
            termination: args.termination,
            primitive: args.primitive,
            set_values: args.set_values.clone(),
        }
    }
}

impl From<&TerminationsArgs> for SlabOverrides {
    fn from(args: &TerminationsArgs) -> Self {
        Self {
            miller_index: args.miller,
            tolerance: args.tolerance,
            ..Self::default()
        }
    }
}

impl PartialJobConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading job configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut partial: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        partial.source = path.to_path_buf();
        Ok(partial)
    }

    /// Builds the bulk structure alone; used when no slab settings are needed.
    pub fn bulk(&self) -> Result<Structure> {
        let bulk = self
            .bulk
            .as_ref()
            .ok_or_else(|| CliError::Config("`[bulk]` section is required.".to_string()))?;
        let cell = Matrix3::from_row_slice(&bulk.cell.concat());
        let scaled: Vec<Vector3<f64>> = bulk.positions.iter().map(|p| Vector3::from(*p)).collect();
        Structure::from_scaled(cell, &bulk.species, &scaled, bulk.pbc.unwrap_or([true; 3])).map_err(
            |e| CliError::FileParsing {
                path: self.source.clone(),
                source: e.into(),
            },
        )
    }

    pub fn merge_with_cli(mut self, overrides: &SlabOverrides) -> Result<JobConfig> {
        self.apply_set_values(&overrides.set_values)?;
        let bulk = self.bulk()?;
        let file = self.slab.take().unwrap_or_default();

        let miller_index = match overrides.miller_index {
            Some(index) => index.as_array(),
            None => file.miller_index.ok_or_else(|| {
                CliError::Config(
                    "`slab.miller-index` is required either in the job file or via --miller."
                        .to_string(),
                )
            })?,
        };

        let slab = SlabConfig::builder()
            .miller_index(miller_index)
            .layers(overrides.layers.or(file.layers).unwrap_or(DEFAULT_LAYERS))
            .fixed_layers(
                overrides
                    .fixed_layers
                    .or(file.fixed_layers)
                    .unwrap_or(DEFAULT_FIXED_LAYERS),
            )
            .vacuum(overrides.vacuum.or(file.vacuum).unwrap_or(DEFAULT_VACUUM))
            .tolerance(overrides.tolerance.or(file.tolerance).unwrap_or(DEFAULT_TOLERANCE))
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        Ok(JobConfig {
            bulk,
            slab,
            termination: overrides.termination.or(file.termination),
            primitive: overrides.primitive || file.primitive.unwrap_or(false),
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let slab = self.slab.get_or_insert_with(Default::default);
            let invalid = |kind: &str| {
                CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value_str))
            };

            match key {
                "slab.miller-index" => {
                    let index: MillerIndex =
                        value_str.parse().map_err(|e| {
                            CliError::Config(format!("Invalid value for {}: {}", key, e))
                        })?;
                    slab.miller_index = Some(index.as_array());
                }
                "slab.layers" => {
                    slab.layers = Some(value_str.parse().map_err(|_| invalid("integer"))?);
                }
                "slab.fixed-layers" => {
                    slab.fixed_layers = Some(value_str.parse().map_err(|_| invalid("integer"))?);
                }
                "slab.vacuum" => {
                    slab.vacuum = Some(value_str.parse().map_err(|_| invalid("float"))?);
                }
                "slab.tolerance" => {
                    slab.tolerance = Some(value_str.parse().map_err(|_| invalid("float"))?);
                }
                "slab.termination" => {
                    slab.termination = Some(value_str.parse().map_err(|_| invalid("integer"))?);
                }
                "slab.primitive" => {
                    slab.primitive = Some(value_str.parse().map_err(|_| invalid("boolean"))?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}
