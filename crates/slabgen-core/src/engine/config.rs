use crate::core::lattice::miller::MillerIndex;
use thiserror::Error;

pub const DEFAULT_LAYERS: usize = 4;
pub const DEFAULT_FIXED_LAYERS: usize = 2;
pub const DEFAULT_VACUUM: f64 = 0.0;
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Immutable parameters of a slab generator.
#[derive(Debug, Clone, PartialEq)]
pub struct SlabConfig {
    pub miller_index: MillerIndex,
    /// Number of atomic layers in the slab.
    pub layers: usize,
    /// Number of bottom layers held fixed.
    pub fixed_layers: usize,
    /// Vacuum, in Angstroms, added on each side of the slab along z. Zero disables
    /// centering and primitive reduction.
    pub vacuum: f64,
    /// Tolerance for coordinate comparisons and degeneracy checks.
    pub tolerance: f64,
}

impl Default for SlabConfig {
    fn default() -> Self {
        Self {
            miller_index: MillerIndex::default(),
            layers: DEFAULT_LAYERS,
            fixed_layers: DEFAULT_FIXED_LAYERS,
            vacuum: DEFAULT_VACUUM,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl SlabConfig {
    pub fn builder() -> SlabConfigBuilder {
        SlabConfigBuilder::new()
    }

    /// Checks the cross-field constraints the builder enforces; useful for configs
    /// assembled by hand.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layers < 1 {
            return Err(ConfigError::InvalidParameter {
                name: "layers",
                reason: format!("must be at least 1, got {}", self.layers),
            });
        }
        if self.fixed_layers > self.layers {
            return Err(ConfigError::InvalidParameter {
                name: "fixed_layers",
                reason: format!(
                    "{} fixed layers exceed the {} requested layers",
                    self.fixed_layers, self.layers
                ),
            });
        }
        if !(self.vacuum >= 0.0 && self.vacuum.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name: "vacuum",
                reason: format!("must be a non-negative finite length, got {}", self.vacuum),
            });
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name: "tolerance",
                reason: format!("must be positive and finite, got {}", self.tolerance),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct SlabConfigBuilder {
    miller_index: Option<[i64; 3]>,
    layers: Option<usize>,
    fixed_layers: Option<usize>,
    vacuum: Option<f64>,
    tolerance: Option<f64>,
}

impl SlabConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn miller_index(mut self, index: [i64; 3]) -> Self {
        self.miller_index = Some(index);
        self
    }
    pub fn layers(mut self, layers: usize) -> Self {
        self.layers = Some(layers);
        self
    }
    pub fn fixed_layers(mut self, fixed: usize) -> Self {
        self.fixed_layers = Some(fixed);
        self
    }
    pub fn vacuum(mut self, vacuum: f64) -> Self {
        self.vacuum = Some(vacuum);
        self
    }
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Builds the configuration. The Miller index is required; every other parameter
    /// falls back to its default.
    pub fn build(self) -> Result<SlabConfig, ConfigError> {
        let raw = self
            .miller_index
            .ok_or(ConfigError::MissingParameter("miller_index"))?;
        let miller_index =
            MillerIndex::try_from(raw).map_err(|e| ConfigError::InvalidParameter {
                name: "miller_index",
                reason: e.to_string(),
            })?;
        let config = SlabConfig {
            miller_index,
            layers: self.layers.unwrap_or(DEFAULT_LAYERS),
            fixed_layers: self.fixed_layers.unwrap_or(DEFAULT_FIXED_LAYERS),
            vacuum: self.vacuum.unwrap_or(DEFAULT_VACUUM),
            tolerance: self.tolerance.unwrap_or(DEFAULT_TOLERANCE),
        };
        config.validate()?;
        Ok(config)
    }
}
