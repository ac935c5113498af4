use thiserror::Error;

use super::config::ConfigError;
use crate::core::models::structure::StructureError;
use crate::core::neighbors::NeighborError;
use crate::core::primitive::PrimitiveError;
use crate::core::symmetry::SymmetryError;

#[derive(Debug, Error)]
pub enum SlabError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Bulk structure must contain at least one atom")]
    EmptyBulk,

    #[error("Termination index {index} is out of range ({count} unique terminations)")]
    TerminationOutOfRange { index: usize, count: usize },

    #[error("Numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    #[error(transparent)]
    Symmetry(#[from] SymmetryError),

    #[error(transparent)]
    Neighbor(#[from] NeighborError),

    #[error(transparent)]
    Primitive(#[from] PrimitiveError),

    #[error(transparent)]
    Structure(#[from] StructureError),
}

impl SlabError {
    /// Whether the error was caused by the caller's input rather than by the computation.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            SlabError::Config(_) | SlabError::EmptyBulk | SlabError::TerminationOutOfRange { .. }
        )
    }
}
