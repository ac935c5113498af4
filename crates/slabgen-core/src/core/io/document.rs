use super::StructureFileError;
use crate::core::models::atom::Atom;
use crate::core::models::structure::{Structure, StructureError};
use nalgebra::{Matrix3, Point3};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_pbc() -> [bool; 3] {
    [true; 3]
}

/// One atom of a [`StructureDocument`], positioned in Cartesian coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomRecord {
    pub species: String,
    pub position: [f64; 3],
    #[serde(default)]
    pub tag: usize,
    #[serde(default)]
    pub fixed: bool,
}

/// Serializable form of a [`Structure`].
///
/// ```toml
/// cell = [[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]
/// pbc = [true, true, false]
///
/// [[atoms]]
/// species = "Cu"
/// position = [0.0, 0.0, 0.0]
/// tag = 1
/// fixed = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructureDocument {
    pub cell: [[f64; 3]; 3],
    #[serde(default = "default_pbc")]
    pub pbc: [bool; 3],
    #[serde(default)]
    pub atoms: Vec<AtomRecord>,
}

impl StructureDocument {
    pub fn from_structure(structure: &Structure) -> Self {
        let cell = structure.cell();
        Self {
            cell: [0, 1, 2].map(|i| [cell[(i, 0)], cell[(i, 1)], cell[(i, 2)]]),
            pbc: structure.pbc(),
            atoms: structure
                .atoms()
                .iter()
                .map(|atom| AtomRecord {
                    species: atom.species.clone(),
                    position: [atom.position.x, atom.position.y, atom.position.z],
                    tag: atom.tag,
                    fixed: atom.fixed,
                })
                .collect(),
        }
    }

    pub fn into_structure(self) -> Result<Structure, StructureError> {
        let cell = Matrix3::from_row_slice(&self.cell.concat());
        let atoms = self
            .atoms
            .into_iter()
            .map(|record| {
                let mut atom = Atom::new(&record.species, Point3::from(record.position));
                atom.tag = record.tag;
                atom.fixed = record.fixed;
                atom
            })
            .collect();
        Structure::new(cell, atoms, self.pbc)
    }

    pub fn to_toml_string(&self) -> Result<String, StructureFileError> {
        Ok(toml::to_string(self)?)
    }
}

/// Reads a structure from a TOML document on disk.
pub fn read_structure(path: &Path) -> Result<Structure, StructureFileError> {
    let content = std::fs::read_to_string(path).map_err(|e| StructureFileError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    let document: StructureDocument =
        toml::from_str(&content).map_err(|e| StructureFileError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
    Ok(document.into_structure()?)
}

/// Writes a structure as a TOML document, replacing any existing file.
pub fn write_structure(structure: &Structure, path: &Path) -> Result<(), StructureFileError> {
    let content = StructureDocument::from_structure(structure).to_toml_string()?;
    std::fs::write(path, content).map_err(|e| StructureFileError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use std::fs;
    use tempfile::tempdir;

    fn sample() -> Structure {
        let mut s = Structure::from_scaled(
            Matrix3::new(2.0, 0.0, 0.0, 1.0, 3.0, 0.0, 0.0, 0.0, 12.0),
            &["Cu", "O"],
            &[Vector3::new(0.0, 0.0, 0.1), Vector3::new(0.5, 0.5, 0.2)],
            [true, true, false],
        )
        .unwrap();
        s.set_tags(&[2, 1]).unwrap();
        s.set_fixed(&[0]).unwrap();
        s
    }

    #[test]
    fn written_structure_reads_back_identically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("slab.toml");
        let s = sample();
        write_structure(&s, &path).unwrap();
        let back = read_structure(&path).unwrap();
        assert_eq!(back.cell(), s.cell());
        assert_eq!(back.pbc(), [true, true, false]);
        assert_eq!(back.atoms(), s.atoms());
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let doc: StructureDocument = toml::from_str(
            r#"
cell = [[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]]

[[atoms]]
species = "Fe"
position = [0.0, 0.0, 0.0]
"#,
        )
        .unwrap();
        let s = doc.into_structure().unwrap();
        assert_eq!(s.pbc(), [true; 3]);
        assert_eq!(s.tags(), vec![0]);
        assert!(s.fixed_indices().is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<StructureDocument, _> = toml::from_str(
            r#"
cell = [[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]]
lattice = "fcc"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_species_fail_structure_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(
            &path,
            r#"
cell = [[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]]

[[atoms]]
species = "Qq"
position = [0.0, 0.0, 0.0]
"#,
        )
        .unwrap();
        assert!(matches!(
            read_structure(&path),
            Err(StructureFileError::Structure(StructureError::UnknownElement(_)))
        ));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let dir = tempdir().unwrap();
        let result = read_structure(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(StructureFileError::Io { .. })));
    }

    #[test]
    fn malformed_file_reports_toml_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("malformed.toml");
        fs::write(&path, "this is not toml").unwrap();
        assert!(matches!(
            read_structure(&path),
            Err(StructureFileError::Toml { .. })
        ));
    }
}
