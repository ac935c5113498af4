use super::error::SlabError;
use crate::core::models::structure::Structure;
use crate::core::neighbors::{CutoffNeighborList, VoronoiNeighbors};
use tracing::{info, instrument};

/// Added to the longest bulk bond so that bonds of exactly that length survive the
/// strict cutoff comparison.
const CUTOFF_SLACK: f64 = 1e-5;

/// Indices of the slab atoms whose coordination differs from their bulk reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceAtoms {
    /// Surface atoms above the slab's center of mass.
    pub top: Vec<usize>,
    /// Surface atoms below the slab's center of mass.
    pub bottom: Vec<usize>,
}

/// Flags surface atoms of `slab` by their coordination deficit relative to `bulk`.
///
/// Bulk coordination comes from the Voronoi tessellation of `bulk`; slab coordination
/// counts neighbors within the longest Voronoi bond. Slab atom `i` is compared with
/// bulk atom `i % bulk.len()`, which matches the copy-major order of replicated cells.
/// Atoms level with the center of mass belong to neither side.
#[instrument(skip_all, name = "surface_classification", fields(bulk = bulk.len(), slab = slab.len()))]
pub fn classify_surface_atoms(bulk: &Structure, slab: &Structure) -> Result<SurfaceAtoms, SlabError> {
    if bulk.is_empty() {
        return Err(SlabError::EmptyBulk);
    }
    let voronoi = VoronoiNeighbors::compute(bulk)?;
    let reference = voronoi.coordination_numbers();
    let cutoff = voronoi.max_bond_length().ok_or(SlabError::EmptyBulk)? + CUTOFF_SLACK;

    let slab_cn = CutoffNeighborList::build(slab, cutoff)?.coordination_numbers();
    let center = slab.center_of_mass();

    let mut surface = SurfaceAtoms::default();
    for (i, (&cn, atom)) in slab_cn.iter().zip(slab.atoms()).enumerate() {
        if cn == reference[i % reference.len()] {
            continue;
        }
        let height = atom.position.z - center.z;
        if height > 0.0 {
            surface.top.push(i);
        } else if height < 0.0 {
            surface.bottom.push(i);
        }
    }

    info!(
        cutoff,
        top = surface.top.len(),
        bottom = surface.bottom.len(),
        "Classified surface atoms."
    );
    Ok(surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    fn simple_cubic(a: f64) -> Structure {
        Structure::from_scaled(
            Matrix3::from_diagonal_element(a),
            &["Cu"],
            &[Vector3::zeros()],
            [true; 3],
        )
        .unwrap()
    }

    fn stacked_slab(a: f64, layers: usize, vacuum: f64) -> Structure {
        let height = a * (layers - 1) as f64 + 2.0 * vacuum;
        let cell = Matrix3::new(a, 0.0, 0.0, 0.0, a, 0.0, 0.0, 0.0, height);
        let species = vec!["Cu"; layers];
        let scaled: Vec<_> = (0..layers)
            .map(|k| Vector3::new(0.0, 0.0, (vacuum + a * k as f64) / height))
            .collect();
        Structure::from_scaled(cell, &species, &scaled, [true, true, false]).unwrap()
    }

    #[test]
    fn outer_layers_of_a_cubic_slab_are_surface_atoms() {
        let surface = classify_surface_atoms(&simple_cubic(2.5), &stacked_slab(2.5, 4, 5.0)).unwrap();
        assert_eq!(surface.top, vec![3]);
        assert_eq!(surface.bottom, vec![0]);
    }

    #[test]
    fn bulk_like_slab_has_no_surface_atoms() {
        let mut bulk_copy = simple_cubic(2.5);
        bulk_copy.repeat([1, 1, 3]).unwrap();
        let surface = classify_surface_atoms(&simple_cubic(2.5), &bulk_copy).unwrap();
        assert_eq!(surface, SurfaceAtoms::default());
    }

    #[test]
    fn central_layer_of_an_odd_slab_is_bulk_like() {
        // The central layer keeps all six bonds and sits exactly at the center of mass.
        let slab = stacked_slab(2.5, 3, 4.0);
        let surface = classify_surface_atoms(&simple_cubic(2.5), &slab).unwrap();
        assert_eq!(surface.top, vec![2]);
        assert_eq!(surface.bottom, vec![0]);
    }

    #[test]
    fn empty_bulk_is_rejected() {
        let empty = Structure::new(Matrix3::identity(), Vec::new(), [true; 3]).unwrap();
        let slab = stacked_slab(2.5, 2, 3.0);
        assert!(matches!(
            classify_surface_atoms(&empty, &slab),
            Err(SlabError::EmptyBulk)
        ));
    }
}
