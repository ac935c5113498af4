use super::error::SlabError;
use crate::core::lattice::integer::{ext_gcd, gcd};
use crate::core::lattice::miller::MillerIndex;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::rotation_to_surface_frame;
use nalgebra::{Matrix3, Vector3};
use tracing::{debug, info, instrument};

/// Integer change of basis from the bulk cell to a surface-aligned cell.
///
/// Row `i` holds the coefficients of new lattice vector `i` in terms of the bulk lattice
/// vectors. The first two rows span the plane of the Miller index; the matrix is
/// unimodular with a positive determinant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatticeBasis {
    matrix: Matrix3<i64>,
}

impl LatticeBasis {
    pub fn from_rows(rows: [[i64; 3]; 3]) -> Self {
        Self {
            matrix: Matrix3::from_row_slice(&rows.concat()),
        }
    }

    pub fn matrix(&self) -> &Matrix3<i64> {
        &self.matrix
    }

    pub fn rows(&self) -> [[i64; 3]; 3] {
        [0, 1, 2].map(|i| [self.matrix[(i, 0)], self.matrix[(i, 1)], self.matrix[(i, 2)]])
    }

    /// Exact integer determinant.
    pub fn determinant(&self) -> i64 {
        let m = &self.matrix;
        m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
            - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
            + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
    }

    fn as_f64(&self) -> Matrix3<f64> {
        self.matrix.map(|v| v as f64)
    }
}

/// The bulk structure re-expressed in a [`LatticeBasis`] and rotated so that the surface
/// normal is `+z` and the first lattice vector is `+x`.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatedBasis {
    pub lattice: LatticeBasis,
    pub structure: Structure,
}

/// Builds surface-aligned bases for one tolerance.
#[derive(Debug, Clone, Copy)]
pub struct BasisBuilder {
    tolerance: f64,
}

impl BasisBuilder {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Derives the integer basis for `miller` from the bulk cell.
    ///
    /// With a single non-zero index the basis is a cyclic permutation of the bulk axes.
    /// Otherwise two in-plane vectors are built from the extended gcd of `(k, l)`, their
    /// mutual projection is minimized by shifting the Bézout pair along `(l, -k)`, and the
    /// out-of-plane vector comes from the extended gcd of `(pk + ql, h)`.
    pub fn lattice_basis(&self, bulk_cell: &Matrix3<f64>, miller: &MillerIndex) -> LatticeBasis {
        let [h, k, l] = miller.as_array();
        let rows = match miller.single_nonzero_axis() {
            Some(0) => [[0, 1, 0], [0, 0, 1], [1, 0, 0]],
            Some(1) => [[0, 0, 1], [1, 0, 0], [0, 1, 0]],
            Some(_) => [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            None => {
                let (mut p, mut q) = ext_gcd(k, l);
                let a1 = bulk_cell.row(0).transpose();
                let a2 = bulk_cell.row(1).transpose();
                let a3 = bulk_cell.row(2).transpose();
                let (hf, kf, lf) = (h as f64, k as f64, l as f64);

                // c1 · c2 = k1 + i k2 for the shifted pair (p + i l, q - i k).
                let u = a1 * kf - a2 * hf;
                let v = a1 * lf - a3 * hf;
                let w = a2 * lf - a3 * kf;
                let k1 = (u * p as f64 + v * q as f64).dot(&w);
                let k2 = (u * lf - v * kf).dot(&w);

                if k2.abs() > self.tolerance {
                    let i = -(k1 / k2).round_ties_even() as i64;
                    p += i * l;
                    q -= i * k;
                }

                let (a, b) = ext_gcd(p * k + q * l, h);
                let g = gcd(l, k);
                [
                    [p * k + q * l, -p * h, -q * h],
                    [0, l / g, -k / g],
                    [b, a * p, a * q],
                ]
            }
        };

        let mut basis = LatticeBasis::from_rows(rows);
        if basis.determinant() < 0 {
            let [c1, c2, c3] = rows;
            basis = LatticeBasis::from_rows([c1, c2, c3.map(|x| -x)]);
        }
        basis
    }

    /// Re-expresses `bulk` in the surface-aligned basis and rotates it into the surface
    /// frame.
    #[instrument(skip_all, name = "basis_builder", fields(miller = %miller))]
    pub fn build(&self, bulk: &Structure, miller: &MillerIndex) -> Result<RotatedBasis, SlabError> {
        let lattice = self.lattice_basis(bulk.cell(), miller);
        debug!(rows = ?lattice.rows(), det = lattice.determinant(), "Derived lattice basis.");
        if lattice.determinant() == 0 {
            return Err(SlabError::NumericalDegeneracy(format!(
                "lattice basis for {miller} is singular"
            )));
        }

        let transform = lattice.as_f64();
        let solve = transform.transpose().try_inverse().ok_or_else(|| {
            SlabError::NumericalDegeneracy(format!("cannot invert the lattice basis for {miller}"))
        })?;
        let tol = self.tolerance;
        let scaled: Vec<Vector3<f64>> = bulk
            .scaled_positions()
            .iter()
            .map(|frac| (solve * frac).map(|f| f - (f + tol).floor()))
            .collect();

        let mut structure = bulk.clone();
        structure.set_cell(transform * bulk.cell(), false)?;
        structure.set_scaled_positions(&scaled)?;

        let a1 = structure.cell_vector(0);
        let normal = a1.cross(&structure.cell_vector(1));
        let rotation = rotation_to_surface_frame(&normal, &a1).ok_or_else(|| {
            SlabError::NumericalDegeneracy(format!("in-plane vectors for {miller} are parallel"))
        })?;
        structure.rotate(&rotation)?;

        info!(
            atoms = structure.len(),
            det = lattice.determinant(),
            "Built surface-aligned basis."
        );
        Ok(RotatedBasis { lattice, structure })
    }
}
