use super::atom::Atom;
use super::element::{atomic_mass, is_known_element};
use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use thiserror::Error;

/// Fractional slack applied when wrapping atoms into the unit cell, so coordinates that sit
/// on an upper cell boundary up to rounding noise land at zero instead of flickering.
pub const WRAP_EPSILON: f64 = 1e-7;

const SINGULAR_CELL_VOLUME: f64 = 1e-12;

#[derive(Debug, Error, PartialEq)]
pub enum StructureError {
    #[error("Unknown element symbol: '{0}'")]
    UnknownElement(String),

    #[error("Length mismatch: {expected} entries expected, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Cell is singular (volume {volume:.3e})")]
    SingularCell { volume: f64 },

    #[error("Atom index {index} is out of range for a structure with {len} atoms")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Repetition counts must be at least 1, got {0:?}")]
    InvalidRepetition([usize; 3]),
}

/// A periodic atomic structure: cell, atoms and periodic boundary flags.
///
/// The cell is stored row-major: row `i` is the `i`-th lattice vector in Cartesian
/// coordinates. Every mutator keeps the cell non-singular, so fractional coordinates are
/// always well defined.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    cell: Matrix3<f64>,
    /// Cached `(cellᵀ)⁻¹`, mapping Cartesian positions to fractional coordinates.
    to_fractional: Matrix3<f64>,
    atoms: Vec<Atom>,
    pbc: [bool; 3],
}

impl Structure {
    /// Creates a structure from a cell, a list of atoms and periodic boundary flags.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::UnknownElement`] if any atom carries an unrecognized
    /// symbol, or [`StructureError::SingularCell`] if the cell has (near) zero volume.
    pub fn new(cell: Matrix3<f64>, atoms: Vec<Atom>, pbc: [bool; 3]) -> Result<Self, StructureError> {
        if let Some(atom) = atoms.iter().find(|a| !is_known_element(&a.species)) {
            return Err(StructureError::UnknownElement(atom.species.clone()));
        }
        let to_fractional = fractional_transform(&cell)?;
        Ok(Self {
            cell,
            to_fractional,
            atoms,
            pbc,
        })
    }

    /// Creates a structure from species and fractional (scaled) coordinates.
    pub fn from_scaled<S: AsRef<str>>(
        cell: Matrix3<f64>,
        species: &[S],
        scaled: &[Vector3<f64>],
        pbc: [bool; 3],
    ) -> Result<Self, StructureError> {
        if species.len() != scaled.len() {
            return Err(StructureError::LengthMismatch {
                expected: species.len(),
                actual: scaled.len(),
            });
        }
        let atoms = species
            .iter()
            .zip(scaled)
            .map(|(symbol, frac)| Atom::new(symbol.as_ref(), Point3::from(cell.transpose() * frac)))
            .collect();
        Self::new(cell, atoms, pbc)
    }

    pub fn cell(&self) -> &Matrix3<f64> {
        &self.cell
    }

    /// Returns lattice vector `axis` (0, 1 or 2) as a column vector.
    pub fn cell_vector(&self, axis: usize) -> Vector3<f64> {
        self.cell.row(axis).transpose()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn pbc(&self) -> [bool; 3] {
        self.pbc
    }

    pub fn set_pbc(&mut self, pbc: [bool; 3]) {
        self.pbc = pbc;
    }

    pub fn species(&self) -> Vec<&str> {
        self.atoms.iter().map(|a| a.species.as_str()).collect()
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    /// Returns the fractional coordinates of every atom.
    pub fn scaled_positions(&self) -> Vec<Vector3<f64>> {
        self.atoms
            .iter()
            .map(|a| self.to_fractional * a.position.coords)
            .collect()
    }

    /// Converts a Cartesian vector into fractional coordinates of this cell.
    pub fn fractional(&self, cartesian: &Vector3<f64>) -> Vector3<f64> {
        self.to_fractional * cartesian
    }

    /// Converts fractional coordinates of this cell into a Cartesian vector.
    pub fn cartesian(&self, fractional: &Vector3<f64>) -> Vector3<f64> {
        self.cell.transpose() * fractional
    }

    pub fn set_scaled_positions(&mut self, scaled: &[Vector3<f64>]) -> Result<(), StructureError> {
        if scaled.len() != self.atoms.len() {
            return Err(StructureError::LengthMismatch {
                expected: self.atoms.len(),
                actual: scaled.len(),
            });
        }
        let to_cartesian = self.cell.transpose();
        for (atom, frac) in self.atoms.iter_mut().zip(scaled) {
            atom.position = Point3::from(to_cartesian * frac);
        }
        Ok(())
    }

    /// Replaces the cell.
    ///
    /// With `scale_atoms` the fractional coordinates are preserved and the atoms move with
    /// the cell; otherwise Cartesian positions are left untouched.
    pub fn set_cell(&mut self, cell: Matrix3<f64>, scale_atoms: bool) -> Result<(), StructureError> {
        let to_fractional = fractional_transform(&cell)?;
        if scale_atoms {
            let scaled = self.scaled_positions();
            self.cell = cell;
            self.to_fractional = to_fractional;
            self.set_scaled_positions(&scaled)?;
        } else {
            self.cell = cell;
            self.to_fractional = to_fractional;
        }
        Ok(())
    }

    /// Rigidly translates every atom by a Cartesian displacement.
    pub fn translate(&mut self, displacement: &Vector3<f64>) {
        for atom in &mut self.atoms {
            atom.position += displacement;
        }
    }

    /// Wraps atoms back into the cell along periodic axes.
    pub fn wrap(&mut self) {
        self.wrap_with_tolerance(WRAP_EPSILON);
    }

    /// Wraps atoms along periodic axes so that each fractional coordinate `f` becomes
    /// `f - floor(f + tol)`, i.e. lands in `[-tol, 1 - tol)`.
    pub fn wrap_with_tolerance(&mut self, tol: f64) {
        let pbc = self.pbc;
        let scaled: Vec<Vector3<f64>> = self
            .scaled_positions()
            .into_iter()
            .map(|mut frac| {
                for axis in 0..3 {
                    if pbc[axis] {
                        frac[axis] -= (frac[axis] + tol).floor();
                    }
                }
                frac
            })
            .collect();
        let to_cartesian = self.cell.transpose();
        for (atom, frac) in self.atoms.iter_mut().zip(&scaled) {
            atom.position = Point3::from(to_cartesian * frac);
        }
    }

    /// Removes the atoms at the given indices. Duplicate indices are ignored.
    pub fn delete(&mut self, indices: &[usize]) -> Result<(), StructureError> {
        let len = self.atoms.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(StructureError::IndexOutOfRange { index, len });
        }
        let mut remove = vec![false; len];
        for &i in indices {
            remove[i] = true;
        }
        let mut flags = remove.into_iter();
        self.atoms.retain(|_| !flags.next().unwrap_or(false));
        Ok(())
    }

    /// Keeps only the atoms for which `keep` returns `true`.
    pub fn retain<F: FnMut(&Atom) -> bool>(&mut self, keep: F) {
        self.atoms.retain(keep);
    }

    /// Replicates the structure `counts[i]` times along lattice vector `i`.
    ///
    /// Atoms are laid out copy by copy, with the third axis varying fastest; within each
    /// copy the original atom order is preserved.
    pub fn repeat(&mut self, counts: [usize; 3]) -> Result<(), StructureError> {
        if counts.iter().any(|&n| n == 0) {
            return Err(StructureError::InvalidRepetition(counts));
        }
        let original = std::mem::take(&mut self.atoms);
        let mut atoms = Vec::with_capacity(original.len() * counts.iter().product::<usize>());
        for m0 in 0..counts[0] {
            for m1 in 0..counts[1] {
                for m2 in 0..counts[2] {
                    let offset = self.cell_vector(0) * m0 as f64
                        + self.cell_vector(1) * m1 as f64
                        + self.cell_vector(2) * m2 as f64;
                    atoms.extend(original.iter().map(|atom| {
                        let mut copy = atom.clone();
                        copy.position += offset;
                        copy
                    }));
                }
            }
        }
        self.atoms = atoms;

        let mut cell = self.cell;
        for (axis, &n) in counts.iter().enumerate() {
            let scaled_row = cell.row(axis) * n as f64;
            cell.set_row(axis, &scaled_row);
        }
        self.set_cell(cell, false)
    }

    /// Applies a rigid rotation to the cell vectors and every atom position.
    pub fn rotate(&mut self, rotation: &Rotation3<f64>) -> Result<(), StructureError> {
        for atom in &mut self.atoms {
            atom.position = rotation * atom.position;
        }
        let mut cell = self.cell;
        for axis in 0..3 {
            let rotated = rotation * self.cell_vector(axis);
            cell.set_row(axis, &rotated.transpose());
        }
        self.set_cell(cell, false)
    }

    /// Resizes lattice vector `axis` so the atoms are padded by `vacuum` on both sides along
    /// the normal of the plane spanned by the two other lattice vectors, and moves the atoms
    /// so the padding is symmetric.
    pub fn center_with_vacuum(&mut self, axis: usize, vacuum: f64) -> Result<(), StructureError> {
        if self.atoms.is_empty() {
            return Ok(());
        }
        let (u, v) = match axis {
            0 => (1, 2),
            1 => (2, 0),
            _ => (0, 1),
        };
        let mut normal = self.cell_vector(u).cross(&self.cell_vector(v)).normalize();
        let along = self.cell_vector(axis);
        if along.dot(&normal) < 0.0 {
            normal = -normal;
        }

        let heights = self.atoms.iter().map(|a| a.position.coords.dot(&normal));
        let (low, high) = heights.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), h| {
            (lo.min(h), hi.max(h))
        });

        let new_height = high - low + 2.0 * vacuum;
        let new_vector = along * (new_height / along.dot(&normal));
        let mut cell = self.cell;
        cell.set_row(axis, &new_vector.transpose());
        self.set_cell(cell, false)?;

        let shift = new_vector * ((vacuum - low) / new_height);
        self.translate(&shift);
        Ok(())
    }

    /// Returns the mass-weighted center of the atoms, or their geometric center if every
    /// atom is massless.
    pub fn center_of_mass(&self) -> Point3<f64> {
        if self.atoms.is_empty() {
            return Point3::origin();
        }
        let (weighted, total) = self.atoms.iter().fold(
            (Vector3::zeros(), 0.0),
            |(sum, mass_sum): (Vector3<f64>, f64), atom| {
                let mass = atomic_mass(&atom.species).unwrap_or(0.0);
                (sum + atom.position.coords * mass, mass_sum + mass)
            },
        );
        if total > 0.0 {
            Point3::from(weighted / total)
        } else {
            let sum: Vector3<f64> = self.atoms.iter().map(|a| a.position.coords).sum();
            Point3::from(sum / self.atoms.len() as f64)
        }
    }

    /// Returns the distance between atoms `i` and `j`, optionally under the minimum-image
    /// convention along periodic axes.
    pub fn distance(&self, i: usize, j: usize, mic: bool) -> Result<f64, StructureError> {
        let len = self.atoms.len();
        for index in [i, j] {
            if index >= len {
                return Err(StructureError::IndexOutOfRange { index, len });
            }
        }
        let delta = self.atoms[j].position - self.atoms[i].position;
        if !mic {
            return Ok(delta.norm());
        }
        Ok(self.minimum_image(&delta).norm())
    }

    /// Reduces a Cartesian displacement to its shortest periodic image.
    pub fn minimum_image(&self, delta: &Vector3<f64>) -> Vector3<f64> {
        let mut frac = self.fractional(delta);
        for axis in 0..3 {
            if self.pbc[axis] {
                frac[axis] -= frac[axis].round();
            }
        }
        let range = |axis: usize| if self.pbc[axis] { -1..=1 } else { 0..=0 };
        let mut best = self.cartesian(&frac);
        for i in range(0) {
            for j in range(1) {
                for k in range(2) {
                    let shifted = frac + Vector3::new(i as f64, j as f64, k as f64);
                    let candidate = self.cartesian(&shifted);
                    if candidate.norm_squared() < best.norm_squared() {
                        best = candidate;
                    }
                }
            }
        }
        best
    }

    pub fn tags(&self) -> Vec<usize> {
        self.atoms.iter().map(|a| a.tag).collect()
    }

    pub fn set_tags(&mut self, tags: &[usize]) -> Result<(), StructureError> {
        if tags.len() != self.atoms.len() {
            return Err(StructureError::LengthMismatch {
                expected: self.atoms.len(),
                actual: tags.len(),
            });
        }
        for (atom, &tag) in self.atoms.iter_mut().zip(tags) {
            atom.tag = tag;
        }
        Ok(())
    }

    /// Removes every position constraint.
    pub fn clear_constraints(&mut self) {
        for atom in &mut self.atoms {
            atom.fixed = false;
        }
    }

    pub fn set_fixed(&mut self, indices: &[usize]) -> Result<(), StructureError> {
        let len = self.atoms.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(StructureError::IndexOutOfRange { index, len });
        }
        for &i in indices {
            self.atoms[i].fixed = true;
        }
        Ok(())
    }

    pub fn fixed_indices(&self) -> Vec<usize> {
        self.atoms
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.fixed.then_some(i))
            .collect()
    }
}

fn fractional_transform(cell: &Matrix3<f64>) -> Result<Matrix3<f64>, StructureError> {
    let volume = cell.determinant();
    if volume.abs() < SINGULAR_CELL_VOLUME {
        return Err(StructureError::SingularCell { volume });
    }
    cell.transpose()
        .try_inverse()
        .ok_or(StructureError::SingularCell { volume })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(a: f64) -> Structure {
        Structure::from_scaled(
            Matrix3::identity() * a,
            &["Cu"],
            &[Vector3::zeros()],
            [true; 3],
        )
        .unwrap()
    }

    #[test]
    fn from_scaled_places_atoms_in_cartesian_space() {
        let s = Structure::from_scaled(
            Matrix3::from_diagonal(&Vector3::new(2.0, 3.0, 4.0)),
            &["Na", "Cl"],
            &[Vector3::zeros(), Vector3::new(0.5, 0.5, 0.5)],
            [true; 3],
        )
        .unwrap();
        assert_eq!(s.atoms()[1].position, Point3::new(1.0, 1.5, 2.0));
        let scaled = s.scaled_positions();
        assert!((scaled[1] - Vector3::new(0.5, 0.5, 0.5)).norm() < 1e-12);
    }

    #[test]
    fn unknown_element_is_rejected() {
        let err = Structure::from_scaled(
            Matrix3::identity(),
            &["Qq"],
            &[Vector3::zeros()],
            [true; 3],
        )
        .unwrap_err();
        assert_eq!(err, StructureError::UnknownElement("Qq".to_string()));
    }

    #[test]
    fn singular_cell_is_rejected() {
        let mut cell = Matrix3::identity();
        let first_row = cell.row(0).clone_owned();
        cell.set_row(2, &first_row);
        let err = Structure::new(cell, vec![], [true; 3]).unwrap_err();
        assert!(matches!(err, StructureError::SingularCell { .. }));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = Structure::from_scaled(
            Matrix3::identity(),
            &["Cu", "Cu"],
            &[Vector3::zeros()],
            [true; 3],
        )
        .unwrap_err();
        assert_eq!(
            err,
            StructureError::LengthMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn set_cell_with_scaling_preserves_fractional_coordinates() {
        let mut s = Structure::from_scaled(
            Matrix3::identity(),
            &["Cu"],
            &[Vector3::new(0.25, 0.5, 0.75)],
            [true; 3],
        )
        .unwrap();
        s.set_cell(Matrix3::identity() * 2.0, true).unwrap();
        assert!((s.atoms()[0].position - Point3::new(0.5, 1.0, 1.5)).norm() < 1e-12);

        s.set_cell(Matrix3::identity() * 4.0, false).unwrap();
        assert!((s.atoms()[0].position - Point3::new(0.5, 1.0, 1.5)).norm() < 1e-12);
    }

    #[test]
    fn wrap_moves_atoms_into_the_cell_only_along_periodic_axes() {
        let mut s = cubic(2.0);
        s.atoms_mut()[0].position = Point3::new(-0.5, 2.5, 5.0);
        s.set_pbc([true, true, false]);
        s.wrap();
        assert!((s.atoms()[0].position - Point3::new(1.5, 0.5, 5.0)).norm() < 1e-12);
    }

    #[test]
    fn wrap_sends_boundary_noise_to_zero() {
        let mut s = cubic(1.0);
        s.atoms_mut()[0].position = Point3::new(1.0 - 1e-12, 0.0, 0.0);
        s.wrap();
        assert!(s.atoms()[0].position.x.abs() < 1e-9);
    }

    #[test]
    fn repeat_scales_cell_and_orders_copies_with_last_axis_fastest() {
        let mut s = cubic(1.0);
        s.repeat([2, 1, 3]).unwrap();
        assert_eq!(s.len(), 6);
        assert!((s.cell()[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((s.cell()[(2, 2)] - 3.0).abs() < 1e-12);
        let zs: Vec<f64> = s.atoms().iter().map(|a| a.position.z).collect();
        assert_eq!(zs, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
        assert_eq!(s.atoms()[3].position.x, 1.0);
    }

    #[test]
    fn repeat_rejects_zero_counts() {
        let mut s = cubic(1.0);
        assert_eq!(
            s.repeat([1, 0, 1]),
            Err(StructureError::InvalidRepetition([1, 0, 1]))
        );
    }

    #[test]
    fn delete_removes_selected_atoms_and_validates_indices() {
        let mut s = cubic(1.0);
        s.repeat([1, 1, 4]).unwrap();
        s.delete(&[0, 2, 2]).unwrap();
        let zs: Vec<f64> = s.atoms().iter().map(|a| a.position.z).collect();
        assert_eq!(zs, vec![1.0, 3.0]);
        assert_eq!(
            s.delete(&[5]),
            Err(StructureError::IndexOutOfRange { index: 5, len: 2 })
        );
    }

    #[test]
    fn rotate_moves_cell_and_atoms_together() {
        let mut s = Structure::from_scaled(
            Matrix3::identity(),
            &["Cu"],
            &[Vector3::new(0.5, 0.0, 0.0)],
            [true; 3],
        )
        .unwrap();
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
        s.rotate(&rotation).unwrap();
        assert!((s.cell_vector(0) - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
        assert!((s.atoms()[0].position - Point3::new(0.0, 0.5, 0.0)).norm() < 1e-12);
        assert!((s.scaled_positions()[0] - Vector3::new(0.5, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn center_with_vacuum_pads_both_sides() {
        let mut s = cubic(2.0);
        s.repeat([1, 1, 3]).unwrap();
        s.center_with_vacuum(2, 5.0).unwrap();
        let zs: Vec<f64> = s.atoms().iter().map(|a| a.position.z).collect();
        let low = zs.iter().cloned().fold(f64::INFINITY, f64::min);
        let high = zs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!((low - 5.0).abs() < 1e-9);
        assert!((s.cell()[(2, 2)] - high - 5.0).abs() < 1e-9);
    }

    #[test]
    fn minimum_image_distance_crosses_the_boundary() {
        let mut s = cubic(10.0);
        s.repeat([2, 1, 1]).unwrap();
        s.atoms_mut()[1].position = Point3::new(19.0, 0.0, 0.0);
        assert!((s.distance(0, 1, false).unwrap() - 19.0).abs() < 1e-12);
        assert!((s.distance(0, 1, true).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn center_of_mass_is_mass_weighted() {
        let s = Structure::new(
            Matrix3::identity() * 10.0,
            vec![
                Atom::new("H", Point3::new(0.0, 0.0, 0.0)),
                Atom::new("H", Point3::new(2.0, 0.0, 0.0)),
                Atom::new("X", Point3::new(8.0, 0.0, 0.0)),
            ],
            [true; 3],
        )
        .unwrap();
        assert!((s.center_of_mass() - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn constraints_can_be_set_and_cleared() {
        let mut s = cubic(1.0);
        s.repeat([1, 1, 3]).unwrap();
        s.set_fixed(&[0, 2]).unwrap();
        assert_eq!(s.fixed_indices(), vec![0, 2]);
        s.clear_constraints();
        assert!(s.fixed_indices().is_empty());
    }
}
