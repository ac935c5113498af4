//! # Engine Module
//!
//! The slab construction pipeline: a surface-aligned basis is derived from the bulk cell
//! and a Miller index ([`basis`]), the distinct surface terminations of that basis are
//! enumerated ([`terminations`]), and slabs are cut from it ([`cutter`]). Surface atoms
//! of a finished slab can be classified by coordination deficit ([`surface`]).
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Immutable slab parameters and their validating builder
//! - **Caching** ([`cache`]) - The once-computed termination list
//! - **Progress Monitoring** ([`progress`]) - Optional callback-based progress events
//! - **Error Handling** ([`error`]) - The [`error::SlabError`] type shared by all stages

pub mod basis;
pub(crate) mod cache;
pub mod config;
pub mod cutter;
pub mod error;
pub mod progress;
pub mod surface;
pub mod terminations;
