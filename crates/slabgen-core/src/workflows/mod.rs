//! # Workflows Module
//!
//! High-level entry points that turn one bulk structure and one Miller index into slab
//! models.
//!
//! ## Overview
//!
//! [`generator::SlabGenerator`] owns the bulk structure, the validated configuration and
//! the surface-aligned basis built from them. Terminations are enumerated lazily and
//! cached on the generator, so every slab cut afterwards reuses the same offsets.
//!
//! ## Architecture
//!
//! - **Generator** ([`generator`]) - Basis construction at creation time, cached
//!   termination enumeration, single slab cuts and surface-atom classification.
//! - **Batch** ([`batch`]) - One slab per unique termination, optionally in parallel.

pub mod batch;
pub mod generator;
