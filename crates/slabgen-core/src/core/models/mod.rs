//! # Core Models Module
//!
//! Data structures used to represent periodic atomic structures.
//!
//! ## Key Components
//!
//! - [`atom`] - A single atom with species, Cartesian position, layer tag and fixed flag
//! - [`element`] - Element symbols and standard atomic masses
//! - [`structure`] - The periodic structure container with cell and boundary conditions
//!
//! ## Usage
//!
//! ```ignore
//! use slabgen::core::models::structure::Structure;
//! use nalgebra::{Matrix3, Vector3};
//!
//! let cell = Matrix3::identity() * 2.5;
//! let bulk = Structure::from_scaled(cell, &["Cu"], &[Vector3::zeros()], [true; 3])?;
//! ```

pub mod atom;
pub mod element;
pub mod structure;
