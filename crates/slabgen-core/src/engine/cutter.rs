use super::config::SlabConfig;
use super::error::SlabError;
use crate::core::layers::{CoordinateKind, tag_layers, unique_coordinates};
use crate::core::models::structure::Structure;
use crate::core::primitive::PrimitiveReducer;
use crate::core::utils::geometry::{project_onto_plane_normal, rotation_from_axis_angle};
use nalgebra::Vector3;
use tracing::{debug, info, instrument};

/// Tolerance, in Angstroms, for counting the layers of one basis cell before replication.
const LAYER_COUNT_TOLERANCE: f64 = 1e-5;

/// Cuts slabs out of a rotated basis.
pub struct SlabCutter<'a> {
    config: &'a SlabConfig,
    reducer: &'a dyn PrimitiveReducer,
}

impl<'a> SlabCutter<'a> {
    pub fn new(config: &'a SlabConfig, reducer: &'a dyn PrimitiveReducer) -> Self {
        Self { config, reducer }
    }

    /// Builds a slab of exactly `config.layers` layers from `basis`.
    ///
    /// `offset` is the fractional height of the termination plane; the basis is shifted
    /// down by that fraction of its third lattice vector before cutting. Primitive
    /// reduction only happens when vacuum is added.
    #[instrument(skip_all, name = "slab_cutter", fields(offset = ?offset, primitive = primitive))]
    pub fn cut(
        &self,
        basis: &Structure,
        offset: Option<f64>,
        primitive: bool,
    ) -> Result<Structure, SlabError> {
        let tol = self.config.tolerance;
        let layers = self.config.layers;
        let mut slab = basis.clone();

        if let Some(shift) = offset {
            slab.translate(&(slab.cell_vector(2) * -shift));
            slab.wrap();
        }

        let per_cell =
            unique_coordinates(&slab, 2, CoordinateKind::Cartesian, LAYER_COUNT_TOLERANCE).len();
        let repetitions = layers.div_ceil(per_cell.max(1));
        slab.repeat([1, 1, repetitions])?;

        let mut cell = *slab.cell();
        let normal_part = project_onto_plane_normal(
            &slab.cell_vector(2),
            &slab.cell_vector(0),
            &slab.cell_vector(1),
        );
        cell.set_row(2, &normal_part.transpose());
        slab.set_cell(cell, false)?;

        let heights = tag_layers(&mut slab, 2, CoordinateKind::Cartesian, tol);
        let cut = heights[heights.len().saturating_sub(layers)];
        let before = slab.len();
        slab.retain(|atom| atom.position.z - cut >= -tol);
        debug!(
            repetitions,
            per_cell,
            removed = before - slab.len(),
            "Trimmed replicated basis to the requested layer count."
        );

        let mut cell = *slab.cell();
        cell[(2, 2)] -= cut;
        slab.set_cell(cell, false)?;
        slab.translate(&Vector3::new(0.0, 0.0, -cut));

        if self.config.vacuum > 0.0 {
            slab.center_with_vacuum(2, self.config.vacuum)?;
            if primitive {
                slab = self.reducer.reduce(&slab, tol)?;
                tag_layers(&mut slab, 2, CoordinateKind::Cartesian, tol);
                let a1 = slab.cell_vector(0);
                let spin = rotation_from_axis_angle(&Vector3::z(), -a1.y.atan2(a1.x));
                slab.rotate(&spin)?;
            }
        }

        slab.clear_constraints();
        let max_tag = slab.tags().into_iter().max().unwrap_or(0);
        let threshold = max_tag.saturating_sub(self.config.fixed_layers);
        let fixed: Vec<usize> = slab
            .atoms()
            .iter()
            .enumerate()
            .filter_map(|(i, atom)| (atom.tag > threshold).then_some(i))
            .collect();
        slab.set_fixed(&fixed)?;

        slab.wrap();
        slab.set_pbc([true, true, false]);

        info!(
            atoms = slab.len(),
            fixed = fixed.len(),
            "Cut slab."
        );
        Ok(slab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::primitive::InPlaneReducer;
    use nalgebra::Matrix3;

    fn config(layers: usize, fixed: usize, vacuum: f64) -> SlabConfig {
        SlabConfig::builder()
            .miller_index([0, 0, 1])
            .layers(layers)
            .fixed_layers(fixed)
            .vacuum(vacuum)
            .build()
            .unwrap()
    }

    /// Three single-atom layers per cell, with a tilted third vector.
    fn three_layer_basis() -> Structure {
        let cell = Matrix3::new(2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.5, 0.3, 6.0);
        Structure::from_scaled(
            cell,
            &["Pt", "Pt", "Pt"],
            &[
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.5, 0.5, 1.0 / 3.0),
                Vector3::new(0.0, 0.5, 2.0 / 3.0),
            ],
            [true; 3],
        )
        .unwrap()
    }

    fn distinct_heights(slab: &Structure) -> usize {
        unique_coordinates(slab, 2, CoordinateKind::Cartesian, 1e-6).len()
    }

    fn cut(config: &SlabConfig, offset: Option<f64>, primitive: bool) -> Structure {
        SlabCutter::new(config, &InPlaneReducer)
            .cut(&three_layer_basis(), offset, primitive)
            .unwrap()
    }

    #[test]
    fn layer_count_is_exact_when_not_a_multiple_of_the_basis() {
        for layers in 1..=7 {
            let slab = cut(&config(layers, 0, 0.0), None, false);
            assert_eq!(distinct_heights(&slab), layers, "requested {layers} layers");
            assert_eq!(slab.len(), layers);
        }
    }

    #[test]
    fn third_cell_vector_is_orthogonalized() {
        let slab = cut(&config(5, 2, 0.0), None, false);
        let a3 = slab.cell_vector(2);
        assert!(a3.x.abs() < 1e-12 && a3.y.abs() < 1e-12);
        assert!(a3.z > 0.0);
    }

    #[test]
    fn retained_region_starts_at_zero_without_vacuum() {
        let slab = cut(&config(5, 2, 0.0), None, false);
        let lowest = slab
            .atoms()
            .iter()
            .map(|a| a.position.z)
            .fold(f64::INFINITY, f64::min);
        assert!(lowest.abs() < 1e-9);
    }

    #[test]
    fn bottom_layers_are_fixed() {
        let slab = cut(&config(5, 2, 0.0), None, false);
        assert_eq!(slab.fixed_indices().len(), 2);
        let mut heights: Vec<f64> = slab.atoms().iter().map(|a| a.position.z).collect();
        heights.sort_by(|a, b| a.total_cmp(b));
        for atom in slab.atoms() {
            assert_eq!(atom.fixed, atom.position.z < heights[2] - 1e-9);
        }
        assert_eq!(slab.tags().into_iter().max(), Some(5));
    }

    #[test]
    fn top_layer_carries_tag_one() {
        let slab = cut(&config(4, 1, 0.0), None, false);
        let top = slab
            .atoms()
            .iter()
            .max_by(|a, b| a.position.z.total_cmp(&b.position.z))
            .unwrap();
        assert_eq!(top.tag, 1);
        assert!(!top.fixed);
    }

    #[test]
    fn vacuum_pads_both_sides() {
        let slab = cut(&config(4, 2, 7.5), None, false);
        let zs: Vec<f64> = slab.atoms().iter().map(|a| a.position.z).collect();
        let low = zs.iter().copied().fold(f64::INFINITY, f64::min);
        let high = zs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let height = slab.cell_vector(2).z;
        assert!((low - 7.5).abs() < 1e-9);
        assert!((height - high - 7.5).abs() < 1e-9);
        assert!((height - (high - low) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn zero_vacuum_skips_primitive_reduction() {
        let cfg = config(3, 1, 0.0);
        let basis = {
            let mut b = three_layer_basis();
            b.repeat([2, 1, 1]).unwrap();
            b
        };
        let slab = SlabCutter::new(&cfg, &InPlaneReducer)
            .cut(&basis, None, true)
            .unwrap();
        assert_eq!(slab.len(), 6);
    }

    #[test]
    fn primitive_reduction_applies_with_vacuum() {
        let cfg = config(3, 1, 5.0);
        let mut basis = three_layer_basis();
        basis.repeat([2, 1, 1]).unwrap();
        let slab = SlabCutter::new(&cfg, &InPlaneReducer)
            .cut(&basis, None, true)
            .unwrap();
        assert_eq!(slab.len(), 3);
        let a1 = slab.cell_vector(0);
        assert!(a1.y.abs() < 1e-9 && a1.x > 0.0);
        assert_eq!(slab.fixed_indices().len(), 1);
    }

    #[test]
    fn output_is_periodic_in_plane_only() {
        for vacuum in [0.0, 4.0] {
            let slab = cut(&config(3, 1, vacuum), Some(1.0 / 3.0), false);
            assert_eq!(slab.pbc(), [true, true, false]);
        }
    }

    #[test]
    fn termination_offset_changes_the_exposed_layer() {
        let plain = cut(&config(3, 0, 0.0), None, false);
        let shifted = cut(&config(3, 0, 0.0), Some(1.0 / 3.0), false);
        let top_xy = |s: &Structure| {
            let top = s
                .atoms()
                .iter()
                .max_by(|a, b| a.position.z.total_cmp(&b.position.z))
                .unwrap();
            s.fractional(&top.position.coords).xy()
        };
        assert!((top_xy(&plain) - top_xy(&shifted)).norm() > 1e-3);
    }
}
