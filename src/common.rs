use glam::Vec3;

/// Computes the dot product of `a` and `b` in the XZ plane.
pub fn dot_xz(a: Vec3, b: Vec3) -> f32 {
  a.x * b.x + a.z * b.z
}

/// Computes the 2D cross product of `a` and `b` in the XZ plane.
pub fn perp_dot_xz(a: Vec3, b: Vec3) -> f32 {
  a.z * b.x - a.x * b.z
}

/// Computes the (doubled) signed area of the triangle (`a`, `b`, `c`) in the
/// XZ plane.
pub fn triangle_area_xz(a: Vec3, b: Vec3, c: Vec3) -> f32 {
  let ab = b - a;
  let ac = c - a;
  ac.x * ab.z - ab.x * ac.z
}

/// Computes the distance between `a` and `b` in the XZ plane.
pub fn distance_xz(a: Vec3, b: Vec3) -> f32 {
  let dx = b.x - a.x;
  let dz = b.z - a.z;
  (dx * dx + dz * dz).sqrt()
}

/// Normalizes `v` in the XZ plane, leaving the Y component untouched. A
/// vector with no XZ length is returned unchanged.
pub fn normalize_xz(v: Vec3) -> Vec3 {
  let length = (v.x * v.x + v.z * v.z).sqrt();
  if length == 0.0 {
    return v;
  }
  let inverse_length = 1.0 / length;
  Vec3::new(v.x * inverse_length, v.y, v.z * inverse_length)
}

/// Rotates `v` by `angle` radians in the XZ plane, leaving the Y component
/// untouched.
pub fn rotate_xz(v: Vec3, angle: f32) -> Vec3 {
  let (sin, cos) = angle.sin_cos();
  Vec3::new(v.x * cos - v.z * sin, v.y, v.x * sin + v.z * cos)
}

/// Computes the squared distance from `point` to the segment (`start`,
/// `end`) in the XZ plane.
pub fn distance_squared_point_segment_xz(
  point: Vec3,
  start: Vec3,
  end: Vec3,
) -> f32 {
  let segment_x = end.x - start.x;
  let segment_z = end.z - start.z;
  let delta_x = point.x - start.x;
  let delta_z = point.z - start.z;

  let segment_length_squared = segment_x * segment_x + segment_z * segment_z;
  let mut t = segment_x * delta_x + segment_z * delta_z;
  if segment_length_squared > 0.0 {
    t /= segment_length_squared;
  }
  let t = t.clamp(0.0, 1.0);

  let nearest_x = start.x + t * segment_x - point.x;
  let nearest_z = start.z + t * segment_z - point.z;
  nearest_x * nearest_x + nearest_z * nearest_z
}

#[cfg(test)]
#[path = "common_test.rs"]
mod test;
