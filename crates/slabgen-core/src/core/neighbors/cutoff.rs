use super::{Neighbor, NeighborError};
use crate::core::models::structure::Structure;
use itertools::iproduct;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Rotation3, Vector3};
use std::cmp::Ordering;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Relative slack on the tree query radius; exact distances are filtered afterwards.
const QUERY_SLACK: f64 = 1e-9;

/// Neighbors of every atom within a fixed cutoff, including periodic images.
///
/// Lists are symmetric (if `j` is listed for `i`, then `i` is listed for `j` with the
/// opposite image) and never contain an atom paired with itself in the home cell.
#[derive(Debug, Clone)]
pub struct CutoffNeighborList {
    cutoff: f64,
    neighbors: Vec<Vec<Neighbor>>,
}

impl CutoffNeighborList {
    #[instrument(skip_all, name = "cutoff_neighbor_list", fields(atoms = structure.len(), cutoff = cutoff))]
    pub fn build(structure: &Structure, cutoff: f64) -> Result<Self, NeighborError> {
        if !(cutoff > 0.0 && cutoff.is_finite()) {
            return Err(NeighborError::InvalidCutoff(cutoff));
        }
        if structure.is_empty() {
            return Ok(Self {
                cutoff,
                neighbors: Vec::new(),
            });
        }

        let ranges = image_ranges(structure, cutoff)?;
        let lattice = structure.cell().transpose();
        let positions: Vec<Vector3<f64>> =
            structure.positions().iter().map(|p| p.coords).collect();
        let frame = tree_frame();

        let mut sources: Vec<(usize, [i32; 3], Vector3<f64>)> = Vec::new();
        let mut points: Vec<[f64; 3]> = Vec::new();
        for (nx, ny, nz) in iproduct!(
            -ranges[0]..=ranges[0],
            -ranges[1]..=ranges[1],
            -ranges[2]..=ranges[2]
        ) {
            let shift = lattice * Vector3::new(f64::from(nx), f64::from(ny), f64::from(nz));
            for (index, position) in positions.iter().enumerate() {
                let p = frame * (position + shift);
                points.push([p.x, p.y, p.z]);
                sources.push((index, [nx, ny, nz], shift));
            }
        }
        debug!(
            images = points.len(),
            ?ranges,
            "Indexed periodic images."
        );

        // Periodic images share coordinates along the cell axes; a fixed oblique frame
        // keeps ties off the tree's split axes.
        let tree: KdTree<f64, 3> = (&points).into();
        let radius = cutoff * (1.0 + QUERY_SLACK);
        let radius_sq = radius * radius;

        let query = |center: usize| -> Vec<Neighbor> {
            let q = frame * positions[center];
            let mut found: Vec<Neighbor> = tree
                .within_unsorted::<SquaredEuclidean>(&[q.x, q.y, q.z], radius_sq)
                .into_iter()
                .filter_map(|hit| {
                    let (index, image, shift) = sources[hit.item as usize];
                    if index == center && image == [0, 0, 0] {
                        return None;
                    }
                    let distance = (positions[index] + shift - positions[center]).norm();
                    (distance < cutoff).then_some(Neighbor {
                        index,
                        image,
                        distance,
                    })
                })
                .collect();
            found.sort_by(compare_neighbors);
            found
        };

        #[cfg(not(feature = "parallel"))]
        let neighbors: Vec<Vec<Neighbor>> = (0..positions.len()).map(query).collect();

        #[cfg(feature = "parallel")]
        let neighbors: Vec<Vec<Neighbor>> =
            (0..positions.len()).into_par_iter().map(query).collect();

        Ok(Self { cutoff, neighbors })
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Neighbors of atom `index`, sorted by distance; empty for an unknown index.
    pub fn neighbors(&self, index: usize) -> &[Neighbor] {
        self.neighbors.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[Neighbor])> {
        self.neighbors
            .iter()
            .enumerate()
            .map(|(i, list)| (i, list.as_slice()))
    }

    pub fn coordination_numbers(&self) -> Vec<usize> {
        self.neighbors.iter().map(Vec::len).collect()
    }
}

/// Number of lattice translations to scan along each axis so that every image within
/// `cutoff` of any atom is visited. Non-periodic axes are not replicated.
fn image_ranges(structure: &Structure, cutoff: f64) -> Result<[i32; 3], NeighborError> {
    let to_fractional = structure
        .cell()
        .transpose()
        .try_inverse()
        .ok_or(NeighborError::SingularCell)?;
    let scaled = structure.scaled_positions();
    let pbc = structure.pbc();

    let mut ranges = [0; 3];
    for axis in 0..3 {
        if !pbc[axis] {
            continue;
        }
        let (lo, hi) = scaled
            .iter()
            .map(|f| f[axis])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let spread = (hi - lo).max(0.0);
        let reach = cutoff * to_fractional.row(axis).norm();
        ranges[axis] = (reach.ceil() + spread.ceil()) as i32;
    }
    Ok(ranges)
}

fn tree_frame() -> Rotation3<f64> {
    Rotation3::from_euler_angles(0.4236, 0.7318, 1.1513)
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .partial_cmp(&b.distance)
        .unwrap_or(Ordering::Equal)
        .then(a.index.cmp(&b.index))
        .then(a.image.cmp(&b.image))
}
