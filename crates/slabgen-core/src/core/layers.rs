use super::models::structure::Structure;
use super::utils::numeric::{isclose, sort_floats};

/// Coordinate system in which layer heights are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateKind {
    /// Fractional coordinates along the lattice vector.
    Fractional,
    /// Cartesian coordinates along the global axis.
    Cartesian,
}

fn coordinates(structure: &Structure, axis: usize, kind: CoordinateKind) -> Vec<f64> {
    match kind {
        CoordinateKind::Fractional => structure
            .scaled_positions()
            .iter()
            .map(|frac| frac[axis])
            .collect(),
        CoordinateKind::Cartesian => structure
            .atoms()
            .iter()
            .map(|atom| atom.position[axis])
            .collect(),
    }
}

fn distinct_values(values: &[f64], tol: f64) -> Vec<f64> {
    let mut unique: Vec<f64> = Vec::new();
    for &value in values {
        if !unique.iter().any(|&u| isclose(value, u, 0.0, tol)) {
            unique.push(value);
        }
    }
    sort_floats(&mut unique);
    unique
}

/// Returns the distinct coordinate values along `axis`, ascending.
///
/// Values are deduplicated in atom order: a coordinate within `tol` (absolute) of an
/// already collected value is absorbed by it, so the first atom seen in each layer
/// defines that layer's height.
pub fn unique_coordinates(
    structure: &Structure,
    axis: usize,
    kind: CoordinateKind,
    tol: f64,
) -> Vec<f64> {
    distinct_values(&coordinates(structure, axis, kind), tol)
}

/// Like [`unique_coordinates`], and additionally tags every atom with its layer rank.
///
/// Tags count from the top: the atoms of the highest layer get tag `1`, the next layer
/// down gets `2`, and so on, so tags grow with depth.
pub fn tag_layers(structure: &mut Structure, axis: usize, kind: CoordinateKind, tol: f64) -> Vec<f64> {
    let values = coordinates(structure, axis, kind);
    let unique = distinct_values(&values, tol);

    for (atom, value) in structure.atoms_mut().iter_mut().zip(&values) {
        let rank = unique
            .iter()
            .rev()
            .position(|&u| isclose(*value, u, 0.0, tol))
            .unwrap_or(unique.len() - 1);
        atom.tag = rank + 1;
    }
    unique
}
