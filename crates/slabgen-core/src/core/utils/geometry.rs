use nalgebra::{Rotation3, Unit, Vector3};

pub fn rotation_to_align(from: &Vector3<f64>, to: &Vector3<f64>) -> Option<Rotation3<f64>> {
    Rotation3::rotation_between(from, to)
}

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_radians: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_radians)
}

/// Builds the rigid rotation that sends `normal` onto `+z` and then turns about `z` so
/// that `in_plane` (assumed perpendicular to `normal`) points along `+x`.
///
/// Returns `None` if either vector has zero length.
pub fn rotation_to_surface_frame(
    normal: &Vector3<f64>,
    in_plane: &Vector3<f64>,
) -> Option<Rotation3<f64>> {
    if normal.norm() == 0.0 || in_plane.norm() == 0.0 {
        return None;
    }
    let z = Vector3::z();
    let tilt = rotation_to_align(normal, &z)
        // Antiparallel vectors have no unique minimal rotation; any half turn about x works.
        .unwrap_or_else(|| rotation_from_axis_angle(&Vector3::x(), std::f64::consts::PI));

    let projected = tilt * in_plane;
    let angle = projected.y.atan2(projected.x);
    let spin = rotation_from_axis_angle(&z, -angle);
    Some(spin * tilt)
}

/// Returns the component of `v` along the unit normal of the plane spanned by `a` and `b`,
/// i.e. `n (v · n) / |n|²` with `n = a × b`.
pub fn project_onto_plane_normal(
    v: &Vector3<f64>,
    a: &Vector3<f64>,
    b: &Vector3<f64>,
) -> Vector3<f64> {
    let normal = a.cross(b);
    normal * (v.dot(&normal) / normal.norm_squared())
}
