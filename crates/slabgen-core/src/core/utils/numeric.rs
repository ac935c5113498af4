/// Absolute tolerance paired with relative comparisons, matching the customary
/// `isclose(a, b, rtol, atol = 1e-8)` convention for floating-point arrays.
pub const DEFAULT_ATOL: f64 = 1e-8;

/// Relative tolerance used when comparing bond lengths between graphs.
pub const DEFAULT_RTOL: f64 = 1e-5;

/// Returns `true` if `|a - b| <= atol + rtol * |b|`.
#[inline]
pub fn isclose(a: f64, b: f64, rtol: f64, atol: f64) -> bool {
    (a - b).abs() <= atol + rtol * b.abs()
}

/// Compares two sequences elementwise with [`isclose`]; sequences of different lengths
/// never match.
pub fn allclose(a: &[f64], b: &[f64], rtol: f64, atol: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| isclose(x, y, rtol, atol))
}

/// Sorts a slice of finite floats in ascending order.
pub fn sort_floats(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}
