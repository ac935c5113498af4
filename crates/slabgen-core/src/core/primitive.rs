use super::models::atom::Atom;
use super::models::structure::{Structure, StructureError};
use itertools::iproduct;
use nalgebra::{Matrix3, Vector3};
use std::cmp::Ordering;
use thiserror::Error;
use tracing::{debug, instrument};

/// Lattice coefficients scanned around each candidate translation.
const SEARCH_SPAN: i32 = 2;
const AREA_RTOL: f64 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum PrimitiveError {
    #[error("Reduction tolerance must be positive and finite, got {0}")]
    InvalidTolerance(f64),

    #[error("Reduced cell should hold {expected} atoms but {found} remain after deduplication")]
    InconsistentReduction { expected: usize, found: usize },

    #[error(transparent)]
    Structure(#[from] StructureError),
}

/// Reduces a structure to a smaller periodic cell.
pub trait PrimitiveReducer {
    fn reduce(&self, structure: &Structure, tol: f64) -> Result<Structure, PrimitiveError>;
}

/// Reduces only the in-plane periodicity of a slab, leaving the third cell vector alone.
///
/// Pure translations parallel to the first two cell vectors that map every atom onto an
/// atom of the same species are collected; the shortest pair of vectors spanning the
/// resulting lattice becomes the new in-plane basis. When no such translation exists
/// the structure is returned unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct InPlaneReducer;

impl PrimitiveReducer for InPlaneReducer {
    #[instrument(skip_all, name = "primitive_reduction", fields(atoms = structure.len()))]
    fn reduce(&self, structure: &Structure, tol: f64) -> Result<Structure, PrimitiveError> {
        if !(tol > 0.0 && tol.is_finite()) {
            return Err(PrimitiveError::InvalidTolerance(tol));
        }
        if structure.is_empty() {
            return Ok(structure.clone());
        }

        let translations = in_plane_translations(structure, tol);
        if translations.is_empty() {
            debug!("Cell is already primitive in-plane.");
            return Ok(structure.clone());
        }
        let multiplicity = translations.len() + 1;
        if structure.len() % multiplicity != 0 {
            return Err(PrimitiveError::InconsistentReduction {
                expected: structure.len() / multiplicity,
                found: structure.len(),
            });
        }

        let a1 = structure.cell_vector(0);
        let a2 = structure.cell_vector(1);
        let a3 = structure.cell_vector(2);
        let target_area = a1.cross(&a2).norm() / multiplicity as f64;

        let mut candidates: Vec<Vector3<f64>> = Vec::new();
        for t in std::iter::once(Vector3::zeros()).chain(translations.iter().copied()) {
            for (m, n) in iproduct!(-SEARCH_SPAN..=SEARCH_SPAN, -SEARCH_SPAN..=SEARCH_SPAN) {
                let v = structure.cartesian(&(t + Vector3::new(f64::from(m), f64::from(n), 0.0)));
                if v.norm() > tol {
                    candidates.push(v);
                }
            }
        }
        candidates.sort_by(|a, b| a.norm().partial_cmp(&b.norm()).unwrap_or(Ordering::Equal));

        let v1 = candidates[0];
        let v2 = candidates
            .iter()
            .find(|v| {
                let area = v1.cross(v).norm();
                (area - target_area).abs() <= AREA_RTOL * target_area
            })
            .copied()
            .ok_or(PrimitiveError::InconsistentReduction {
                expected: structure.len() / multiplicity,
                found: structure.len(),
            })?;
        let (v1, mut v2) = gauss_reduce(v1, v2);
        if v1.cross(&v2).dot(&a1.cross(&a2)) < 0.0 {
            v2 = -v2;
        }

        let cell = Matrix3::from_rows(&[v1.transpose(), v2.transpose(), a3.transpose()]);
        let reduced = rebuild(structure, cell, tol)?;
        let expected = structure.len() / multiplicity;
        if reduced.len() != expected {
            return Err(PrimitiveError::InconsistentReduction {
                expected,
                found: reduced.len(),
            });
        }
        debug!(
            multiplicity,
            atoms = reduced.len(),
            "Reduced in-plane cell."
        );
        Ok(reduced)
    }
}

/// Fractional translations `(t1, t2, 0)` with `t1, t2` in `[0, 1)`, excluding zero,
/// that are symmetries of the structure.
fn in_plane_translations(structure: &Structure, tol: f64) -> Vec<Vector3<f64>> {
    let scaled = structure.scaled_positions();
    let species = structure.species();
    let reference = (0..species.len())
        .min_by_key(|&i| species.iter().filter(|&&s| s == species[i]).count())
        .unwrap_or(0);

    let mut found: Vec<Vector3<f64>> = Vec::new();
    for (j, frac) in scaled.iter().enumerate() {
        if j == reference || species[j] != species[reference] {
            continue;
        }
        let mut t = frac - scaled[reference];
        if structure.cartesian(&Vector3::new(0.0, 0.0, t.z)).norm() > tol {
            continue;
        }
        t.z = 0.0;
        for axis in 0..2 {
            t[axis] -= (t[axis] + tol).floor();
            t[axis] = t[axis].max(0.0);
        }
        if in_plane_norm(structure, &t) < tol {
            continue;
        }
        if found.iter().any(|known| in_plane_norm(structure, &(known - t)) < tol) {
            continue;
        }
        let maps = scaled.iter().zip(&species).all(|(p, s)| {
            scaled
                .iter()
                .zip(&species)
                .any(|(q, r)| r == s && in_plane_norm(structure, &(p + t - q)) < tol)
        });
        if maps {
            found.push(t);
        }
    }
    found
}

/// Cartesian length of a fractional difference after reducing its in-plane part.
fn in_plane_norm(structure: &Structure, fractional_delta: &Vector3<f64>) -> f64 {
    let reduced = Vector3::new(
        fractional_delta.x - fractional_delta.x.round(),
        fractional_delta.y - fractional_delta.y.round(),
        fractional_delta.z,
    );
    structure.cartesian(&reduced).norm()
}

fn gauss_reduce(mut u: Vector3<f64>, mut v: Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    loop {
        if v.norm_squared() < u.norm_squared() {
            std::mem::swap(&mut u, &mut v);
        }
        let mu = (u.dot(&v) / u.norm_squared()).round();
        if mu == 0.0 {
            return (u, v);
        }
        v -= u * mu;
    }
}

fn rebuild(structure: &Structure, cell: Matrix3<f64>, tol: f64) -> Result<Structure, PrimitiveError> {
    let frame = Structure::new(cell, Vec::new(), structure.pbc())?;
    let mut kept: Vec<Atom> = Vec::new();
    let mut kept_scaled: Vec<Vector3<f64>> = Vec::new();
    for atom in structure.atoms() {
        let mut frac = frame.fractional(&atom.position.coords);
        for axis in 0..2 {
            frac[axis] -= (frac[axis] + tol).floor();
        }
        let duplicate = kept.iter().zip(&kept_scaled).any(|(other, other_frac)| {
            other.species == atom.species && in_plane_norm(&frame, &(frac - other_frac)) < tol
        });
        if duplicate {
            continue;
        }
        let mut atom = atom.clone();
        atom.position = frame.cartesian(&frac).into();
        kept.push(atom);
        kept_scaled.push(frac);
    }
    Ok(Structure::new(cell, kept, structure.pbc())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_slab(a: f64, nx: usize, ny: usize, pattern: &[(f64, f64, &str)]) -> Structure {
        let cell = Matrix3::new(
            a * nx as f64, 0.0, 0.0,
            0.0, a * ny as f64, 0.0,
            0.0, 0.0, 10.0,
        );
        let mut species = Vec::new();
        let mut scaled = Vec::new();
        for (i, j) in iproduct!(0..nx, 0..ny) {
            for &(x, y, s) in pattern {
                species.push(s);
                scaled.push(Vector3::new(
                    (i as f64 + x) / nx as f64,
                    (j as f64 + y) / ny as f64,
                    0.5,
                ));
            }
        }
        Structure::from_scaled(cell, &species, &scaled, [true, true, false]).unwrap()
    }

    #[test]
    fn supercell_reduces_to_single_atom() {
        let s = square_slab(2.5, 2, 3, &[(0.0, 0.0, "Pt")]);
        let reduced = InPlaneReducer.reduce(&s, 1e-8).unwrap();
        assert_eq!(reduced.len(), 1);
        assert!((reduced.cell_vector(0).norm() - 2.5).abs() < 1e-10);
        assert!((reduced.cell_vector(1).norm() - 2.5).abs() < 1e-10);
        assert!((reduced.cell_vector(2) - Vector3::new(0.0, 0.0, 10.0)).norm() < 1e-12);
    }

    #[test]
    fn primitive_cell_is_left_unchanged() {
        let s = square_slab(2.5, 1, 1, &[(0.0, 0.0, "Pt"), (0.5, 0.5, "O")]);
        let reduced = InPlaneReducer.reduce(&s, 1e-8).unwrap();
        assert_eq!(reduced.len(), 2);
        assert_eq!(reduced.cell(), s.cell());
    }

    #[test]
    fn centered_square_reduces_to_rotated_cell() {
        let s = square_slab(4.0, 1, 1, &[(0.0, 0.0, "Ni"), (0.5, 0.5, "Ni")]);
        let reduced = InPlaneReducer.reduce(&s, 1e-8).unwrap();
        assert_eq!(reduced.len(), 1);
        let area = reduced.cell_vector(0).cross(&reduced.cell_vector(1)).norm();
        assert!((area - 8.0).abs() < 1e-9);
        assert!((reduced.cell_vector(0).norm() - 8f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn reduced_cell_keeps_handedness_and_layers() {
        let s = square_slab(2.0, 2, 2, &[(0.0, 0.0, "Cu"), (0.5, 0.5, "O")]);
        let reduced = InPlaneReducer.reduce(&s, 1e-8).unwrap();
        assert_eq!(reduced.len(), 2);
        assert!(reduced.cell().determinant() > 0.0);
        let species = reduced.species();
        assert!(species.contains(&"Cu") && species.contains(&"O"));
    }

    #[test]
    fn tags_and_constraints_are_carried_over() {
        let mut s = square_slab(2.5, 2, 1, &[(0.0, 0.0, "Pt")]);
        s.set_tags(&[3, 3]).unwrap();
        s.set_fixed(&[0, 1]).unwrap();
        let reduced = InPlaneReducer.reduce(&s, 1e-8).unwrap();
        assert_eq!(reduced.tags(), vec![3]);
        assert_eq!(reduced.fixed_indices(), vec![0]);
    }

    #[test]
    fn rejects_invalid_tolerance() {
        let s = square_slab(2.5, 1, 1, &[(0.0, 0.0, "Pt")]);
        assert!(matches!(
            InPlaneReducer.reduce(&s, f64::NAN),
            Err(PrimitiveError::InvalidTolerance(_))
        ));
        assert_eq!(
            InPlaneReducer.reduce(&s, 0.0).unwrap_err(),
            PrimitiveError::InvalidTolerance(0.0)
        );
    }
}
