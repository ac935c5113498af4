//! # slabgen Core Library
//!
//! A library for building periodic surface slab models from bulk crystal structures,
//! given a Miller index.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture to keep concerns separated:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `Atom`, `MillerIndex`),
//!   exact integer lattice arithmetic, and the structural services the slab algorithms consume:
//!   layer extraction, symmetry detection, neighbor lists, primitive reduction and bond graphs.
//!
//! - **[`engine`]: The Logic Core.** The three slab-construction stages (basis building,
//!   termination enumeration, slab cutting), the surface-atom classifier, the immutable
//!   generator configuration and the once-populated termination cache.
//!
//! - **[`workflows`]: The Public API.** `SlabGenerator` ties `engine` and `core` together and
//!   turns one bulk structure plus one Miller index into one or more slab models.

pub mod core;
pub mod engine;
pub mod workflows;
