//! Reading and writing structures.
//!
//! Structures are exchanged as TOML documents holding the cell, the periodic flags and
//! one table per atom. Slabs can additionally be exported as a flat CSV atom table.

pub mod document;
pub mod table;

use super::models::structure::StructureError;
use thiserror::Error;

pub use document::{AtomRecord, StructureDocument, read_structure, write_structure};
pub use table::{AtomRow, write_atom_table, write_atom_table_to_path};

#[derive(Debug, Error)]
pub enum StructureFileError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid structure: {0}")]
    Structure(#[from] StructureError),
}
