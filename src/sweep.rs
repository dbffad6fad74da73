use glam::Vec3;

use crate::common::{dot_xz, perp_dot_xz};

/// Sweeps a disc at `center_0` with `radius_0`, moving at `velocity`, against
/// a stationary disc at `center_1` with `radius_1`, in the XZ plane. Returns
/// the times of first and last contact, or `None` when the moving disc is
/// (nearly) stationary or its path never touches the other disc. The contact
/// times may be negative when the discs already overlap or the contact lies
/// behind the moving disc.
pub fn sweep_circle_circle(
  center_0: Vec3,
  radius_0: f32,
  velocity: Vec3,
  center_1: Vec3,
  radius_1: f32,
) -> Option<(f32, f32)> {
  const EPSILON: f32 = 0.0001;

  // Sweeping a disc against a disc is the same as sweeping a point against a
  // disc of the combined radius.
  let separation = center_1 - center_0;
  let combined_radius = radius_0 + radius_1;

  let c = dot_xz(separation, separation) - combined_radius * combined_radius;
  let a = dot_xz(velocity, velocity);
  if a < EPSILON {
    // Not moving relative to the other disc.
    return None;
  }

  // Solve the quadratic |separation - t * velocity|^2 = combined_radius^2 for
  // the two contact times.
  let b = dot_xz(velocity, separation);
  let discriminant = b * b - a * c;
  if discriminant < 0.0 {
    return None;
  }

  let inverse_a = 1.0 / a;
  let root = discriminant.sqrt();
  Some(((b - root) * inverse_a, (b + root) * inverse_a))
}

/// Intersects the ray starting at `ray_origin` toward `ray_direction` with
/// the segment (`segment_start`, `segment_end`) in the XZ plane. Returns the
/// ray time of the intersection, or `None` when the two are (nearly) parallel
/// or the intersection falls outside the [0, 1] parameter range on either the
/// ray or the segment. Note the ray is bounded: intersections further than
/// one `ray_direction` length away are misses.
pub fn intersect_ray_segment(
  ray_origin: Vec3,
  ray_direction: Vec3,
  segment_start: Vec3,
  segment_end: Vec3,
) -> Option<f32> {
  const EPSILON: f32 = 1e-6;

  let segment_delta = segment_end - segment_start;
  let relative_origin = ray_origin - segment_start;

  let denominator = perp_dot_xz(ray_direction, segment_delta);
  if denominator.abs() < EPSILON {
    return None;
  }
  let inverse_denominator = 1.0 / denominator;

  let ray_time =
    perp_dot_xz(segment_delta, relative_origin) * inverse_denominator;
  if ray_time < 0.0 || ray_time > 1.0 {
    return None;
  }

  let segment_time =
    perp_dot_xz(ray_direction, relative_origin) * inverse_denominator;
  if segment_time < 0.0 || segment_time > 1.0 {
    return None;
  }

  Some(ray_time)
}

#[cfg(test)]
#[path = "sweep_test.rs"]
mod test;
