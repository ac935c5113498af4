//! Exact integer arithmetic on crystallographic indices.
//!
//! - [`integer`] - Floor-division gcd and extended Euclid routines
//! - [`miller`] - The validated, reduced Miller index value type

pub mod integer;
pub mod miller;
