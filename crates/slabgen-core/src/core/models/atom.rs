use nalgebra::Point3;

/// Represents an atom in a periodic structure.
///
/// Positions are stored in Cartesian coordinates (Angstroms); fractional coordinates are
/// always derived from the owning structure's cell. The `tag` and `fixed` fields carry the
/// layer index and position constraint assigned during slab construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The chemical element symbol (e.g., "Cu", "O").
    pub species: String,
    /// The 3D Cartesian coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    /// Layer tag; `0` means untagged, `1` is the topmost layer and tags grow with depth.
    pub tag: usize,
    /// Whether the atom is held fixed during downstream relaxations.
    pub fixed: bool,
}

impl Atom {
    /// Creates a new, untagged and unconstrained `Atom`.
    ///
    /// # Arguments
    ///
    /// * `species` - The element symbol of the atom.
    /// * `position` - The Cartesian coordinates of the atom.
    pub fn new(species: &str, position: Point3<f64>) -> Self {
        Self {
            species: species.to_string(),
            position,
            tag: 0,
            fixed: false,
        }
    }
}
