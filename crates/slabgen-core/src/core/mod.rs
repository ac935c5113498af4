//! # Core Module
//!
//! This module provides the fundamental building blocks for slab construction: the
//! structure container, the integer lattice arithmetic behind surface-aligned bases, and
//! the structural analysis services consumed by the engine.
//!
//! ## Architecture
//!
//! - **Structure Representation** ([`models`]) - Atoms, element data and the periodic structure container
//! - **Lattice Arithmetic** ([`lattice`]) - Miller indices and exact integer gcd routines
//! - **Layer Detection** ([`layers`]) - Tolerant unique-coordinate extraction and layer tagging
//! - **Symmetry** ([`symmetry`]) - Space-group operation discovery
//! - **Neighbor Search** ([`neighbors`]) - Cutoff and Voronoi based neighbor lists
//! - **Cell Reduction** ([`primitive`]) - In-plane primitive cell reduction of slabs
//! - **Structural Comparison** ([`graph`]) - Bond graphs compared by isomorphism
//! - **File I/O** ([`io`]) - TOML structure documents and CSV atom tables

pub mod graph;
pub mod io;
pub mod lattice;
pub mod layers;
pub mod models;
pub mod neighbors;
pub mod primitive;
pub mod symmetry;
pub mod utils;
