//! Periodic neighbor searches.
//!
//! Two services are provided: a fixed-cutoff neighbor list backed by a k-d tree over
//! periodic images, and a Voronoi tessellation that derives bonded pairs from shared
//! cell faces.

pub mod cutoff;
pub mod voronoi;

use thiserror::Error;

pub use cutoff::CutoffNeighborList;
pub use voronoi::VoronoiNeighbors;

#[derive(Debug, Error, PartialEq)]
pub enum NeighborError {
    #[error("Neighbor cutoff must be positive and finite, got {0}")]
    InvalidCutoff(f64),

    #[error("Cannot invert the cell matrix of the structure")]
    SingularCell,

    #[error("Voronoi cell of atom {index} is not bounded by its periodic images")]
    UnboundedCell { index: usize },
}

/// One entry of a neighbor list: atom `index` shifted by `image` lattice vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub image: [i32; 3],
    pub distance: f64,
}
