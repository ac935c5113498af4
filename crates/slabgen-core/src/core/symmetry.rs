use super::models::structure::Structure;
use itertools::iproduct;
use nalgebra::{Matrix3, Vector3};
use thiserror::Error;
use tracing::{debug, instrument};

/// Largest absolute entry considered for a column of a rotation in the reduced basis.
const MAX_ROTATION_ENTRY: i32 = 2;
const MAX_REDUCTION_SWEEPS: usize = 100;
/// Floor for the relative tolerance on the metric tensor, guarding tiny user tolerances
/// against rounding noise in rotated cells.
const METRIC_TOLERANCE_FLOOR: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum SymmetryError {
    #[error("Cannot determine the symmetry of a structure without atoms")]
    EmptyStructure,

    #[error("Symmetry tolerance must be positive and finite, got {0}")]
    InvalidTolerance(f64),
}

/// A space-group operation in fractional coordinates: `x' = R x + t`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryOperation {
    /// Integer rotation matrix with determinant ±1, acting on fractional coordinates.
    pub rotation: Matrix3<i32>,
    /// Fractional translation, wrapped into `[0, 1)`.
    pub translation: Vector3<f64>,
}

impl SymmetryOperation {
    pub fn new(rotation: Matrix3<i32>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Applies the operation to a point given in fractional coordinates.
    pub fn apply(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.map(f64::from) * point + self.translation
    }
}

/// A source of space-group operations for a periodic structure.
pub trait SymmetryFinder {
    /// Returns every operation mapping `structure` onto itself within `tol` (Angstroms).
    fn operations(
        &self,
        structure: &Structure,
        tol: f64,
    ) -> Result<Vec<SymmetryOperation>, SymmetryError>;
}

/// Finds symmetry operations directly from the lattice metric and atom positions.
///
/// The lattice is first reduced so that every point-group rotation has small integer
/// entries; rotations that preserve the reduced metric tensor are enumerated and mapped
/// back to the input basis, and for each rotation the translations are taken from pairs of
/// same-species atoms and kept if they map every atom onto an equivalent one. All three
/// axes are treated as periodic.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatticeSymmetryFinder;

impl SymmetryFinder for LatticeSymmetryFinder {
    #[instrument(skip_all, name = "symmetry_search", fields(atoms = structure.len()))]
    fn operations(
        &self,
        structure: &Structure,
        tol: f64,
    ) -> Result<Vec<SymmetryOperation>, SymmetryError> {
        if !(tol > 0.0 && tol.is_finite()) {
            return Err(SymmetryError::InvalidTolerance(tol));
        }
        if structure.is_empty() {
            return Err(SymmetryError::EmptyStructure);
        }

        let rotations = lattice_rotations(structure.cell(), tol);
        debug!(
            lattice_rotations = rotations.len(),
            "Enumerated metric-preserving rotations."
        );

        let scaled = structure.scaled_positions();
        let species = structure.species();
        let reference = rarest_species_atom(&species);

        let mut operations: Vec<SymmetryOperation> = Vec::new();
        for rotation in &rotations {
            let rotation_f = rotation.map(f64::from);
            let image = rotation_f * scaled[reference];
            for (candidate, frac) in scaled.iter().enumerate() {
                if species[candidate] != species[reference] {
                    continue;
                }
                let mut translation = frac - image;
                for axis in 0..3 {
                    translation[axis] -= (translation[axis] + tol).floor();
                    translation[axis] = translation[axis].max(0.0);
                }
                let operation = SymmetryOperation::new(*rotation, translation);
                if maps_onto_itself(structure, &scaled, &species, &operation, tol)
                    && !operations
                        .iter()
                        .any(|known| same_operation(structure, known, &operation, tol))
                {
                    operations.push(operation);
                }
            }
        }

        debug!(operations = operations.len(), "Symmetry search complete.");
        Ok(operations)
    }
}

fn rarest_species_atom(species: &[&str]) -> usize {
    (0..species.len())
        .min_by_key(|&i| species.iter().filter(|&&s| s == species[i]).count())
        .unwrap_or(0)
}

fn maps_onto_itself(
    structure: &Structure,
    scaled: &[Vector3<f64>],
    species: &[&str],
    operation: &SymmetryOperation,
    tol: f64,
) -> bool {
    scaled.iter().zip(species).all(|(frac, symbol)| {
        let image = operation.apply(frac);
        scaled
            .iter()
            .zip(species)
            .any(|(target, target_symbol)| {
                target_symbol == symbol && periodic_distance(structure, &(image - target)) < tol
            })
    })
}

fn same_operation(
    structure: &Structure,
    a: &SymmetryOperation,
    b: &SymmetryOperation,
    tol: f64,
) -> bool {
    a.rotation == b.rotation
        && periodic_distance(structure, &(a.translation - b.translation)) < tol
}

fn periodic_distance(structure: &Structure, fractional_delta: &Vector3<f64>) -> f64 {
    let reduced = fractional_delta.map(|d| d - d.round());
    structure.cartesian(&reduced).norm()
}

/// Returns the integer rotations, in the fractional basis of `cell`, that preserve the
/// lattice metric.
pub fn lattice_rotations(cell: &Matrix3<f64>, tol: f64) -> Vec<Matrix3<i32>> {
    let (reduced, transform) = reduce_lattice(cell);
    let metric = reduced * reduced.transpose();
    let scale = metric.diagonal().max();
    let metric_tol = tol.max(METRIC_TOLERANCE_FLOOR) * scale;

    let range = -MAX_ROTATION_ENTRY..=MAX_ROTATION_ENTRY;
    let vectors: Vec<Vector3<f64>> = iproduct!(range.clone(), range.clone(), range)
        .map(|(a, b, c)| Vector3::new(f64::from(a), f64::from(b), f64::from(c)))
        .filter(|v| v.norm_squared() > 0.0)
        .collect();
    let columns: Vec<Vec<Vector3<f64>>> = (0..3)
        .map(|j| {
            vectors
                .iter()
                .filter(|v| (v.dot(&(metric * *v)) - metric[(j, j)]).abs() < metric_tol)
                .copied()
                .collect()
        })
        .collect();

    // x = Mᵀ y for reduced fractional coordinates y, so W = Mᵀ W_r M⁻ᵀ.
    let m_t = transform.transpose();
    let m_t_inv = m_t.try_inverse().unwrap_or_else(Matrix3::identity);

    let mut rotations = Vec::new();
    for (c0, c1, c2) in iproduct!(&columns[0], &columns[1], &columns[2]) {
        let w = Matrix3::from_columns(&[*c0, *c1, *c2]);
        if (w.determinant().abs() - 1.0).abs() > 1e-6 {
            continue;
        }
        let preserved = w.transpose() * metric * w;
        if (preserved - metric).abs().max() > metric_tol {
            continue;
        }
        let back = m_t * w * m_t_inv;
        rotations.push(back.map(|v| v.round() as i32));
    }
    rotations
}

/// Pairwise (Gauss-style) reduction of the rows of `cell`.
///
/// Returns the reduced cell `B` and the integer matrix `M` (stored as floats) with
/// `B = M · cell`.
pub fn reduce_lattice(cell: &Matrix3<f64>) -> (Matrix3<f64>, Matrix3<f64>) {
    let mut basis = *cell;
    let mut transform = Matrix3::<f64>::identity();

    for _ in 0..MAX_REDUCTION_SWEEPS {
        let mut changed = false;
        for (i, j) in iproduct!(0..3, 0..3) {
            if i == j {
                continue;
            }
            let bi = basis.row(i).transpose();
            let bj = basis.row(j).transpose();
            let mu = (bi.dot(&bj) / bj.norm_squared()).round();
            if mu == 0.0 {
                continue;
            }
            let candidate = bi - bj * mu;
            if candidate.norm_squared() < bi.norm_squared() * (1.0 - 1e-12) {
                basis.set_row(i, &candidate.transpose());
                let updated = transform.row(i) - transform.row(j) * mu;
                transform.set_row(i, &updated);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    (basis, transform)
}
