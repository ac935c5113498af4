use super::models::structure::Structure;
use super::neighbors::{CutoffNeighborList, NeighborError};
use super::utils::numeric::{DEFAULT_ATOL, DEFAULT_RTOL, allclose, sort_floats};
use petgraph::algo::is_isomorphic_matching;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::BTreeMap;

/// Bonding topology of a structure: nodes carry chemical species, edges carry bond lengths.
///
/// Parallel bonds between the same pair of atoms (different periodic images, and each
/// bond seen from both ends) are merged into one edge holding the sorted list of their
/// lengths, so that two graphs match exactly when the underlying multigraphs do.
#[derive(Debug, Clone)]
pub struct SurfaceBondGraph {
    graph: UnGraph<String, Vec<f64>>,
}

impl SurfaceBondGraph {
    /// Builds the graph from every pair closer than `cutoff`.
    pub fn build(structure: &Structure, cutoff: f64) -> Result<Self, NeighborError> {
        let list = CutoffNeighborList::build(structure, cutoff)?;
        Ok(Self::from_neighbor_list(structure, &list))
    }

    pub fn from_neighbor_list(structure: &Structure, list: &CutoffNeighborList) -> Self {
        let mut graph = UnGraph::with_capacity(structure.len(), 0);
        let nodes: Vec<NodeIndex> = structure
            .atoms()
            .iter()
            .map(|atom| graph.add_node(atom.species.clone()))
            .collect();

        let mut bonds: BTreeMap<(usize, usize), Vec<f64>> = BTreeMap::new();
        for (i, neighbors) in list.iter() {
            for neighbor in neighbors {
                let key = (i.min(neighbor.index), i.max(neighbor.index));
                bonds.entry(key).or_default().push(neighbor.distance);
            }
        }
        for ((a, b), mut lengths) in bonds {
            sort_floats(&mut lengths);
            graph.add_edge(nodes[a], nodes[b], lengths);
        }
        Self { graph }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct bonded pairs.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of bonds counted with multiplicity.
    pub fn bond_count(&self) -> usize {
        self.graph.edge_weights().map(Vec::len).sum()
    }

    /// Tests for an isomorphism preserving species and bond lengths.
    ///
    /// Bond lengths match when every pair of sorted lengths satisfies
    /// `|a - b| <= 1e-8 + 1e-5 * |b|`.
    pub fn is_isomorphic_to(&self, other: &SurfaceBondGraph) -> bool {
        if self.node_count() != other.node_count()
            || self.edge_count() != other.edge_count()
            || self.bond_count() != other.bond_count()
        {
            return false;
        }
        is_isomorphic_matching(
            &self.graph,
            &other.graph,
            |a: &String, b: &String| a == b,
            |a: &Vec<f64>, b: &Vec<f64>| allclose(a, b, DEFAULT_RTOL, DEFAULT_ATOL),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    fn pair(a: f64, first: &str, second: &str, offset: f64) -> Structure {
        Structure::from_scaled(
            Matrix3::identity() * a,
            &[first, second],
            &[Vector3::zeros(), Vector3::new(offset, 0.5, 0.5)],
            [true; 3],
        )
        .unwrap()
    }

    #[test]
    fn periodic_images_collapse_into_one_edge() {
        let s = Structure::from_scaled(
            Matrix3::identity() * 2.0,
            &["Cu"],
            &[Vector3::zeros()],
            [true; 3],
        )
        .unwrap();
        let g = SurfaceBondGraph::build(&s, 2.1).unwrap();
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.bond_count(), 6);
    }

    #[test]
    fn relabeled_structures_are_isomorphic() {
        let a = pair(3.0, "Na", "Cl", 0.5);
        let b = Structure::from_scaled(
            Matrix3::identity() * 3.0,
            &["Cl", "Na"],
            &[Vector3::new(0.5, 0.5, 0.5), Vector3::zeros()],
            [true; 3],
        )
        .unwrap();
        let ga = SurfaceBondGraph::build(&a, 4.0).unwrap();
        let gb = SurfaceBondGraph::build(&b, 4.0).unwrap();
        assert!(ga.is_isomorphic_to(&gb));
    }

    #[test]
    fn species_must_match() {
        let ga = SurfaceBondGraph::build(&pair(3.0, "Na", "Cl", 0.5), 4.0).unwrap();
        let gb = SurfaceBondGraph::build(&pair(3.0, "Na", "Br", 0.5), 4.0).unwrap();
        assert!(!ga.is_isomorphic_to(&gb));
    }

    #[test]
    fn bond_lengths_must_match() {
        let ga = SurfaceBondGraph::build(&pair(3.0, "Na", "Cl", 0.5), 4.0).unwrap();
        let gb = SurfaceBondGraph::build(&pair(3.0, "Na", "Cl", 0.4), 4.0).unwrap();
        assert!(!ga.is_isomorphic_to(&gb));
    }

    #[test]
    fn tiny_length_noise_is_tolerated() {
        let ga = SurfaceBondGraph::build(&pair(3.0, "Na", "Cl", 0.5), 4.0).unwrap();
        let gb = SurfaceBondGraph::build(&pair(3.0 + 1e-9, "Na", "Cl", 0.5), 4.0).unwrap();
        assert!(ga.is_isomorphic_to(&gb));
    }
}
