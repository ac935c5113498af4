pub mod geometry;
pub mod numeric;
