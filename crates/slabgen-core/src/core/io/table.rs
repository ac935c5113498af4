use super::StructureFileError;
use crate::core::models::structure::Structure;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// One row of the CSV atom table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomRow {
    pub index: usize,
    pub species: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub tag: usize,
    pub fixed: bool,
}

/// Writes one CSV row per atom, preceded by a header row.
pub fn write_atom_table<W: Write>(structure: &Structure, writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    for (index, atom) in structure.atoms().iter().enumerate() {
        writer.serialize(AtomRow {
            index,
            species: atom.species.clone(),
            x: atom.position.x,
            y: atom.position.y,
            z: atom.position.z,
            tag: atom.tag,
            fixed: atom.fixed,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_atom_table_to_path(structure: &Structure, path: &Path) -> Result<(), StructureFileError> {
    let file = std::fs::File::create(path).map_err(|e| StructureFileError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    write_atom_table(structure, file).map_err(|e| StructureFileError::Csv {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};
    use tempfile::tempdir;

    fn sample() -> Structure {
        let mut s = Structure::from_scaled(
            Matrix3::identity() * 2.0,
            &["Pt", "Pt"],
            &[Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.5)],
            [true, true, false],
        )
        .unwrap();
        s.set_tags(&[2, 1]).unwrap();
        s.set_fixed(&[0]).unwrap();
        s
    }

    #[test]
    fn table_has_header_and_one_row_per_atom() {
        let mut buffer = Vec::new();
        write_atom_table(&sample(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "index,species,x,y,z,tag,fixed");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("0,Pt,"));
        assert!(lines[1].ends_with(",2,true"));
    }

    #[test]
    fn table_rows_deserialize_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atoms.csv");
        write_atom_table_to_path(&sample(), &path).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<AtomRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].tag, 1);
        assert!(!rows[1].fixed);
        assert!((rows[1].z - 1.0).abs() < 1e-12);
    }
}
