use super::{CutoffNeighborList, Neighbor, NeighborError};
use crate::core::models::structure::Structure;
use nalgebra::Vector3;
use tracing::{debug, instrument};

/// Number of times the search radius may grow before a cell is declared unbounded.
const MAX_EXPANSIONS: usize = 6;
/// Faces smaller than this fraction of the largest face of the same cell are contacts
/// through an edge or a vertex, not bonds.
const FACE_AREA_FRACTION: f64 = 1e-6;
const PLANE_EPS: f64 = 1e-9;

/// A bond between two atoms whose Voronoi cells share a face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoronoiBond {
    pub source: usize,
    pub target: usize,
    pub image: [i32; 3],
    pub distance: f64,
    pub face_area: f64,
}

/// Voronoi tessellation of a periodic structure, reduced to its bonding topology.
#[derive(Debug, Clone)]
pub struct VoronoiNeighbors {
    coordination: Vec<usize>,
    bonds: Vec<VoronoiBond>,
}

impl VoronoiNeighbors {
    /// Builds the Voronoi cell of every atom by clipping a bounding box with the
    /// perpendicular bisectors of its periodic neighbors.
    ///
    /// The search radius starts at twice the mean atomic spacing and grows until no
    /// unvisited image could still cut a cell, i.e. until every cell fits in a ball of
    /// half the radius.
    #[instrument(skip_all, name = "voronoi_neighbors", fields(atoms = structure.len()))]
    pub fn compute(structure: &Structure) -> Result<Self, NeighborError> {
        let n = structure.len();
        if n == 0 {
            return Ok(Self {
                coordination: Vec::new(),
                bonds: Vec::new(),
            });
        }

        let volume = structure.cell().determinant().abs();
        let mut radius = 2.0 * (volume / n as f64).cbrt();
        let positions: Vec<Vector3<f64>> =
            structure.positions().iter().map(|p| p.coords).collect();

        let mut cells: Vec<Option<Vec<VoronoiBond>>> = vec![None; n];
        for _ in 0..MAX_EXPANSIONS {
            let list = CutoffNeighborList::build(structure, radius)?;
            let mut widest: f64 = 0.0;
            for (index, slot) in cells.iter_mut().enumerate() {
                if slot.is_some() {
                    continue;
                }
                let (cell, reach) =
                    voronoi_cell(structure, &positions, index, list.neighbors(index), radius);
                if 2.0 * reach < radius {
                    *slot = Some(cell);
                } else {
                    widest = widest.max(reach);
                }
            }
            if cells.iter().all(Option::is_some) {
                break;
            }
            radius = (2.0 * widest).max(radius) * 1.05;
            debug!(radius, "Expanding Voronoi search radius.");
        }

        let mut coordination = Vec::with_capacity(n);
        let mut bonds = Vec::new();
        for (index, cell) in cells.into_iter().enumerate() {
            let cell = cell.ok_or(NeighborError::UnboundedCell { index })?;
            coordination.push(cell.len());
            bonds.extend(cell);
        }
        Ok(Self {
            coordination,
            bonds,
        })
    }

    pub fn coordination_numbers(&self) -> &[usize] {
        &self.coordination
    }

    /// Bonds in both directions, grouped by source atom.
    pub fn bonds(&self) -> &[VoronoiBond] {
        &self.bonds
    }

    pub fn max_bond_length(&self) -> Option<f64> {
        self.bonds.iter().map(|b| b.distance).reduce(f64::max)
    }
}

/// Returns the face-sharing bonds of atom `index` and the largest distance from the atom
/// to a vertex of its cell.
fn voronoi_cell(
    structure: &Structure,
    positions: &[Vector3<f64>],
    index: usize,
    neighbors: &[Neighbor],
    half_width: f64,
) -> (Vec<VoronoiBond>, f64) {
    let lattice = structure.cell().transpose();
    let eps = PLANE_EPS * half_width;
    let mut cell = ConvexCell::cube(half_width);

    for (slot, neighbor) in neighbors.iter().enumerate() {
        let image = Vector3::new(
            f64::from(neighbor.image[0]),
            f64::from(neighbor.image[1]),
            f64::from(neighbor.image[2]),
        );
        let offset = positions[neighbor.index] + lattice * image - positions[index];
        let normal = offset / neighbor.distance;
        cell.clip(&normal, 0.5 * neighbor.distance, slot, eps);
    }

    let areas: Vec<(usize, f64)> = cell
        .faces
        .iter()
        .filter_map(|face| face.source.map(|slot| (slot, polygon_area(&face.vertices))))
        .collect();
    let largest = areas.iter().map(|&(_, a)| a).fold(0.0, f64::max);
    let bonds = areas
        .into_iter()
        .filter(|&(_, area)| area > FACE_AREA_FRACTION * largest)
        .map(|(slot, face_area)| {
            let neighbor = neighbors[slot];
            VoronoiBond {
                source: index,
                target: neighbor.index,
                image: neighbor.image,
                distance: neighbor.distance,
                face_area,
            }
        })
        .collect();
    (bonds, cell.reach())
}

#[derive(Debug, Clone)]
struct Face {
    vertices: Vec<Vector3<f64>>,
    source: Option<usize>,
}

/// Convex polyhedron stored face by face, centered on the atom whose cell it is.
#[derive(Debug, Clone)]
struct ConvexCell {
    faces: Vec<Face>,
}

impl ConvexCell {
    fn cube(half_width: f64) -> Self {
        let h = half_width;
        let corner = |x: f64, y: f64, z: f64| Vector3::new(x * h, y * h, z * h);
        let quads = [
            [(-1., -1., -1.), (-1., 1., -1.), (1., 1., -1.), (1., -1., -1.)],
            [(-1., -1., 1.), (1., -1., 1.), (1., 1., 1.), (-1., 1., 1.)],
            [(-1., -1., -1.), (1., -1., -1.), (1., -1., 1.), (-1., -1., 1.)],
            [(-1., 1., -1.), (-1., 1., 1.), (1., 1., 1.), (1., 1., -1.)],
            [(-1., -1., -1.), (-1., -1., 1.), (-1., 1., 1.), (-1., 1., -1.)],
            [(1., -1., -1.), (1., 1., -1.), (1., 1., 1.), (1., -1., 1.)],
        ];
        let faces = quads
            .iter()
            .map(|quad| Face {
                vertices: quad.iter().map(|&(x, y, z)| corner(x, y, z)).collect(),
                source: None,
            })
            .collect();
        Self { faces }
    }

    /// Keeps the part of the cell with `normal · x <= offset`; the cut surface becomes a
    /// new face labeled `source`.
    fn clip(&mut self, normal: &Vector3<f64>, offset: f64, source: usize, eps: f64) {
        let cuts = self
            .faces
            .iter()
            .flat_map(|f| &f.vertices)
            .any(|v| normal.dot(v) - offset > eps);
        if !cuts {
            return;
        }

        let mut section: Vec<Vector3<f64>> = Vec::new();
        let mut faces = Vec::with_capacity(self.faces.len() + 1);
        for face in &self.faces {
            let clipped = clip_polygon(&face.vertices, normal, offset, eps, &mut section);
            if clipped.len() >= 3 {
                faces.push(Face {
                    vertices: clipped,
                    source: face.source,
                });
            }
        }

        let mut unique: Vec<Vector3<f64>> = Vec::new();
        for p in section {
            if !unique.iter().any(|q| (q - p).norm() <= eps) {
                unique.push(p);
            }
        }
        if unique.len() >= 3 {
            faces.push(Face {
                vertices: order_around(unique, normal),
                source: Some(source),
            });
        }
        self.faces = faces;
    }

    fn reach(&self) -> f64 {
        self.faces
            .iter()
            .flat_map(|f| &f.vertices)
            .map(|v| v.norm())
            .fold(0.0, f64::max)
    }
}

/// Sutherland-Hodgman clip of one polygon; points lying on the plane are appended to
/// `section`.
fn clip_polygon(
    polygon: &[Vector3<f64>],
    normal: &Vector3<f64>,
    offset: f64,
    eps: f64,
    section: &mut Vec<Vector3<f64>>,
) -> Vec<Vector3<f64>> {
    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (k, a) in polygon.iter().enumerate() {
        let b = &polygon[(k + 1) % polygon.len()];
        let da = normal.dot(a) - offset;
        let db = normal.dot(b) - offset;
        if da <= eps {
            out.push(*a);
            if da.abs() <= eps {
                section.push(*a);
            }
        }
        if (da < -eps && db > eps) || (da > eps && db < -eps) {
            let t = da / (da - db);
            let p = a + (b - a) * t;
            out.push(p);
            section.push(p);
        }
    }
    out
}

fn order_around(points: Vec<Vector3<f64>>, normal: &Vector3<f64>) -> Vec<Vector3<f64>> {
    let centroid = points.iter().sum::<Vector3<f64>>() / points.len() as f64;
    let u = (points[0] - centroid).normalize();
    let w = normal.cross(&u);
    let mut keyed: Vec<(f64, Vector3<f64>)> = points
        .into_iter()
        .map(|p| {
            let d = p - centroid;
            (d.dot(&w).atan2(d.dot(&u)), p)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    keyed.into_iter().map(|(_, p)| p).collect()
}

fn polygon_area(vertices: &[Vector3<f64>]) -> f64 {
    let origin = vertices[0];
    let twice: Vector3<f64> = vertices
        .windows(2)
        .skip(1)
        .map(|w| (w[0] - origin).cross(&(w[1] - origin)))
        .sum();
    0.5 * twice.norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    fn cubic(a: f64, scaled: &[[f64; 3]]) -> Structure {
        let species = vec!["Fe"; scaled.len()];
        let scaled: Vec<_> = scaled.iter().map(|p| Vector3::from(*p)).collect();
        Structure::from_scaled(Matrix3::identity() * a, &species, &scaled, [true; 3]).unwrap()
    }

    #[test]
    fn simple_cubic_cells_have_six_faces() {
        let v = VoronoiNeighbors::compute(&cubic(2.0, &[[0.0, 0.0, 0.0]])).unwrap();
        assert_eq!(v.coordination_numbers(), &[6]);
        assert!((v.max_bond_length().unwrap() - 2.0).abs() < 1e-12);
        let total_area: f64 = v.bonds().iter().map(|b| b.face_area).sum();
        assert!((total_area - 24.0).abs() < 1e-9);
    }

    #[test]
    fn fcc_cells_are_rhombic_dodecahedra() {
        let s = cubic(
            4.0,
            &[
                [0.0, 0.0, 0.0],
                [0.5, 0.5, 0.0],
                [0.5, 0.0, 0.5],
                [0.0, 0.5, 0.5],
            ],
        );
        let v = VoronoiNeighbors::compute(&s).unwrap();
        assert_eq!(v.coordination_numbers(), &[12, 12, 12, 12]);
        assert!((v.max_bond_length().unwrap() - 4.0 / 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn bcc_cells_include_second_shell_faces() {
        let s = cubic(3.0, &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]]);
        let v = VoronoiNeighbors::compute(&s).unwrap();
        assert_eq!(v.coordination_numbers(), &[14, 14]);
        assert!((v.max_bond_length().unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn bonds_are_listed_from_each_side() {
        let s = cubic(3.0, &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]]);
        let v = VoronoiNeighbors::compute(&s).unwrap();
        let from_first = v.bonds().iter().filter(|b| b.source == 0).count();
        let from_second = v.bonds().iter().filter(|b| b.source == 1).count();
        assert_eq!(from_first, from_second);
    }

    #[test]
    fn isolated_atoms_have_unbounded_cells() {
        let s = Structure::from_scaled(
            Matrix3::identity() * 2.0,
            &["Fe"],
            &[Vector3::zeros()],
            [false; 3],
        )
        .unwrap();
        assert_eq!(
            VoronoiNeighbors::compute(&s).unwrap_err(),
            NeighborError::UnboundedCell { index: 0 }
        );
    }

    #[test]
    fn polygon_area_of_unit_square() {
        let square = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        assert!((polygon_area(&square) - 1.0).abs() < 1e-12);
    }
}
