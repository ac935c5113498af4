use super::error::SlabError;
use super::progress::{Progress, ProgressReporter};
use crate::core::graph::SurfaceBondGraph;
use crate::core::layers::{CoordinateKind, unique_coordinates};
use crate::core::models::structure::Structure;
use crate::core::symmetry::{SymmetryFinder, SymmetryOperation};
use crate::core::utils::numeric::{DEFAULT_ATOL, isclose};
use tracing::{debug, info, instrument};

/// Bond cutoff, in Angstroms, for the graphs that tell candidate terminations apart.
/// Every atom is given a 2 Å radius, so pairs closer than 4 Å are bonded.
pub const GRAPH_BOND_CUTOFF: f64 = 4.0;

/// Finds the distinct surface terminations of a rotated basis.
pub struct TerminationEnumerator<'a> {
    symmetry: &'a dyn SymmetryFinder,
    tolerance: f64,
    reporter: &'a ProgressReporter<'a>,
}

impl<'a> TerminationEnumerator<'a> {
    pub fn new(
        symmetry: &'a dyn SymmetryFinder,
        tolerance: f64,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            symmetry,
            tolerance,
            reporter,
        }
    }

    /// Returns the fractional heights of the distinct cut planes, in ascending scan order.
    ///
    /// Planes related by a symmetry operation that maps the surface plane onto itself are
    /// merged first; the survivors are compared through the bond graphs of the half-slabs
    /// they expose, and a plane is kept only if its graph matches none kept before it.
    #[instrument(skip_all, name = "termination_enumeration", fields(atoms = basis.len()))]
    pub fn enumerate(&self, basis: &Structure) -> Result<Vec<f64>, SlabError> {
        let tol = self.tolerance;
        let z_planes = unique_coordinates(basis, 2, CoordinateKind::Fractional, tol);

        let operations = self.symmetry.operations(basis, tol)?;
        let z_shifts = z_symmetry_shifts(&operations, tol);
        let shifts = symmetry_distinct_planes(&z_planes, &z_shifts, tol);
        info!(
            planes = z_planes.len(),
            symmetry_shifts = z_shifts.len(),
            candidates = shifts.len(),
            "Reduced cut planes by symmetry."
        );

        if shifts.len() == 1 {
            return Ok(shifts);
        }

        self.reporter.report(Progress::TaskStart {
            total_steps: shifts.len() as u64,
        });
        let mut accepted: Vec<f64> = Vec::new();
        let mut graphs: Vec<SurfaceBondGraph> = Vec::new();
        for &shift in &shifts {
            let graph = SurfaceBondGraph::build(&half_slab(basis, shift), GRAPH_BOND_CUTOFF)?;
            let duplicate = graphs.iter().any(|known| known.is_isomorphic_to(&graph));
            debug!(shift, duplicate, nodes = graph.node_count(), "Compared candidate termination.");
            if !duplicate {
                graphs.push(graph);
                accepted.push(shift);
            }
            self.reporter.report(Progress::TaskIncrement);
        }
        self.reporter.report(Progress::TaskFinish);

        info!(terminations = accepted.len(), "Found unique terminations.");
        Ok(accepted)
    }
}

/// Distinct z translations of the operations that leave the surface plane invariant:
/// no coupling between z and the in-plane axes, and z mapped onto itself.
pub fn z_symmetry_shifts(operations: &[SymmetryOperation], tol: f64) -> Vec<f64> {
    let mut shifts: Vec<f64> = Vec::new();
    for op in operations {
        let r = &op.rotation;
        let preserves_plane =
            r[(2, 0)] == 0 && r[(2, 1)] == 0 && r[(0, 2)] == 0 && r[(1, 2)] == 0 && r[(2, 2)] == 1;
        if !preserves_plane {
            continue;
        }
        let tz = op.translation.z;
        if !shifts.iter().any(|&s| isclose(tz, s, tol, DEFAULT_ATOL)) {
            shifts.push(tz);
        }
    }
    shifts
}

/// Drops every plane whose height difference to some earlier plane equals a symmetry
/// shift; the first plane is always kept.
pub fn symmetry_distinct_planes(z_planes: &[f64], z_shifts: &[f64], tol: f64) -> Vec<f64> {
    let mut unique = Vec::new();
    for (i, &plane) in z_planes.iter().enumerate() {
        let related = z_planes[..i].iter().any(|&earlier| {
            let diff = plane - earlier;
            z_shifts
                .iter()
                .any(|&shift| isclose(shift, diff, tol, DEFAULT_ATOL))
        });
        if !related {
            unique.push(plane);
        }
    }
    unique
}

/// The basis shifted so the plane at fractional height `shift` sits at z = 0, wrapped
/// periodically, with the atoms of the upper half cell removed.
fn half_slab(basis: &Structure, shift: f64) -> Structure {
    let mut slab = basis.clone();
    slab.set_pbc([true; 3]);
    slab.translate(&(slab.cell_vector(2) * -shift));
    slab.wrap();
    let scaled = slab.scaled_positions();
    let mut heights = scaled.iter().map(|f| f.z);
    slab.retain(|_| heights.next().is_some_and(|z| z < 0.5));
    slab
}
