#![doc = include_str!("../README.md")]

mod common;
mod debug;
mod sweep;

use common::{
  distance_squared_point_segment_xz, distance_xz, dot_xz, normalize_xz,
  rotate_xz, triangle_area_xz,
};
use sweep::{intersect_ray_segment, sweep_circle_circle};

pub use debug::SampleDebugData;
pub use glam::Vec3;

// The largest adaptive pattern the scratch buffer supports.
// `AvoidanceParams::adaptive_divisions` and `AvoidanceParams::adaptive_rings`
// are clamped to these.
const MAX_ADAPTIVE_DIVISIONS: usize = 32;
const MAX_ADAPTIVE_RINGS: usize = 4;

/// The agent doing the avoiding. Positions and velocities are 3D, but only
/// their XZ (ground plane) components participate in avoidance.
#[derive(Clone, PartialEq, Debug)]
pub struct Agent {
  /// The position of the agent.
  pub position: Vec3,
  /// The current velocity of the agent.
  pub velocity: Vec3,
  /// The radius of the agent.
  pub radius: f32,
  /// The maximum speed the agent is allowed to move at. Candidate velocities
  /// are drawn from (slightly more than) the disc of this radius.
  pub max_speed: f32,
}

/// Tuning parameters for one avoidance query. These are copied by value into
/// the query on every sampling call, so changing them between calls is always
/// safe.
#[derive(Clone, PartialEq, Debug)]
pub struct AvoidanceParams {
  /// How much the sampling patterns are biased toward the desired velocity,
  /// in [0, 1]. At 0.0 samples are centered on the zero velocity and cover
  /// the full speed range; at 1.0 the patterns collapse onto the desired
  /// velocity.
  pub velocity_bias: f32,
  /// The penalty weight for deviating from the desired velocity.
  pub desired_velocity_weight: f32,
  /// The penalty weight for deviating from the current velocity.
  pub current_velocity_weight: f32,
  /// The penalty weight for passing an obstacle on its unpreferred side.
  pub side_weight: f32,
  /// The penalty weight for short predicted times of impact.
  pub time_of_impact_weight: f32,
  /// How far into the future collisions are predicted. Times of impact at or
  /// beyond the horizon do not penalize a candidate.
  pub time_horizon: f32,
  /// The width, in samples, of the lattice evaluated by
  /// [`AvoidanceQuery::sample_velocity_grid`]. Must be at least 2.
  pub grid_size: usize,
  /// The number of spokes in each ring of the adaptive sampling pattern.
  /// Clamped to [1, 32].
  pub adaptive_divisions: usize,
  /// The number of concentric rings in the adaptive sampling pattern.
  /// Clamped to [1, 4].
  pub adaptive_rings: usize,
  /// How many times the adaptive sampler re-centers on the best candidate
  /// and shrinks its search radius.
  pub adaptive_depth: usize,
}

impl Default for AvoidanceParams {
  fn default() -> AvoidanceParams {
    AvoidanceParams {
      velocity_bias: 0.4,
      desired_velocity_weight: 2.0,
      current_velocity_weight: 0.75,
      side_weight: 0.75,
      time_of_impact_weight: 2.5,
      time_horizon: 2.5,
      grid_size: 33,
      adaptive_divisions: 7,
      adaptive_rings: 2,
      adaptive_depth: 5,
    }
  }
}

/// A moving disc obstacle, usually another agent.
#[derive(Clone, PartialEq, Debug)]
pub struct CircleObstacle {
  /// The position of the obstacle.
  pub position: Vec3,
  /// The current velocity of the obstacle.
  pub velocity: Vec3,
  /// The velocity the obstacle would take if it had nothing to avoid. Used
  /// only to pick which side the agent should pass the obstacle on.
  pub desired_velocity: Vec3,
  /// The radius of the obstacle.
  pub radius: f32,
}

/// A static obstacle: one solid edge, e.g. the boundary of a wall.
#[derive(Clone, PartialEq, Debug)]
pub struct SegmentObstacle {
  /// The first endpoint of the segment.
  pub start: Vec3,
  /// The second endpoint of the segment.
  pub end: Vec3,
}

struct CircleEntry {
  obstacle: CircleObstacle,
  // Unit direction from the agent to the obstacle. Derived by `prepare`.
  direction: Vec3,
  // Perpendicular of `direction` whose half-plane the agent is discouraged
  // from entering, picking the passing side. Derived by `prepare`.
  side_normal: Vec3,
}

struct SegmentEntry {
  obstacle: SegmentObstacle,
  // Whether the agent is already brushing against the segment. Derived by
  // `prepare`.
  touching: bool,
}

/// A reusable avoidance query: fixed-capacity obstacle storage plus the
/// scratch state of one sampling call.
///
/// A query is allocated once at capacity and reused across ticks: clear it
/// with [`AvoidanceQuery::reset`], repopulate it with the obstacles near the
/// agent, then call one of the sampling functions. Queries share no state, so
/// concurrent agents only need one query (and optionally one
/// [`SampleDebugData`]) each.
pub struct AvoidanceQuery {
  params: AvoidanceParams,
  inverse_time_horizon: f32,
  max_speed: f32,
  inverse_max_speed: f32,

  max_circles: usize,
  circles: Vec<CircleEntry>,
  max_segments: usize,
  segments: Vec<SegmentEntry>,
}

impl AvoidanceQuery {
  /// Creates a query holding at most `max_circles` circle obstacles and
  /// `max_segments` segment obstacles.
  pub fn new(max_circles: usize, max_segments: usize) -> AvoidanceQuery {
    AvoidanceQuery {
      params: AvoidanceParams::default(),
      inverse_time_horizon: 0.0,
      max_speed: 0.0,
      inverse_max_speed: 0.0,
      max_circles,
      circles: Vec::with_capacity(max_circles),
      max_segments,
      segments: Vec::with_capacity(max_segments),
    }
  }

  /// Forgets all obstacles, keeping the storage.
  pub fn reset(&mut self) {
    self.circles.clear();
    self.segments.clear();
  }

  /// Adds a circle obstacle. Once `max_circles` obstacles are held, further
  /// circles are silently dropped.
  pub fn add_circle(&mut self, obstacle: CircleObstacle) {
    if self.circles.len() >= self.max_circles {
      return;
    }
    self.circles.push(CircleEntry {
      obstacle,
      direction: Vec3::ZERO,
      side_normal: Vec3::ZERO,
    });
  }

  /// Adds a segment obstacle. Once `max_segments` obstacles are held, further
  /// segments are silently dropped.
  pub fn add_segment(&mut self, obstacle: SegmentObstacle) {
    if self.segments.len() >= self.max_segments {
      return;
    }
    self.segments.push(SegmentEntry { obstacle, touching: false });
  }

  /// The number of circle obstacles currently held.
  pub fn get_circle_count(&self) -> usize {
    self.circles.len()
  }

  /// The number of segment obstacles currently held.
  pub fn get_segment_count(&self) -> usize {
    self.segments.len()
  }

  /// The circle obstacle at `index`.
  pub fn get_circle(&self, index: usize) -> &CircleObstacle {
    &self.circles[index].obstacle
  }

  /// The segment obstacle at `index`.
  pub fn get_segment(&self, index: usize) -> &SegmentObstacle {
    &self.segments[index].obstacle
  }

  /// Derives the per-obstacle data the penalty terms use: for each circle,
  /// the direction toward it and the preferred passing side; for each
  /// segment, whether the agent already touches it. The sampling functions
  /// call this themselves before evaluating candidates.
  pub fn prepare(&mut self, agent_position: Vec3, desired_velocity: Vec3) {
    for entry in self.circles.iter_mut() {
      entry.direction =
        (entry.obstacle.position - agent_position).normalize_or_zero();

      // Pick the side to pass on by the winding of the obstacle direction
      // against the difference in intents: when the obstacle's desired
      // velocity crosses ours to one side, penalize candidates passing on
      // that side so both parties agree on the other one.
      let relative_desired_velocity =
        entry.obstacle.desired_velocity - desired_velocity;
      let area = triangle_area_xz(
        Vec3::ZERO,
        entry.direction,
        relative_desired_velocity,
      );
      entry.side_normal = if area < 0.01 {
        Vec3::new(-entry.direction.z, 0.0, entry.direction.x)
      } else {
        Vec3::new(entry.direction.z, 0.0, -entry.direction.x)
      };
    }

    for entry in self.segments.iter_mut() {
      // A segment this close counts as already touched, and is handled by
      // steering off it rather than by ray intersection.
      const TOUCH_RADIUS: f32 = 0.01;
      entry.touching = distance_squared_point_segment_xz(
        agent_position,
        entry.obstacle.start,
        entry.obstacle.end,
      ) < TOUCH_RADIUS * TOUCH_RADIUS;
    }
  }

  // Scores one candidate velocity. Returns the candidate's penalty, or
  // `best_penalty` when the candidate provably cannot beat it (the caller
  // keeps its current best either way, since the best is only replaced on a
  // strictly lower penalty).
  fn process_sample(
    &self,
    candidate: Vec3,
    sample_size: f32,
    agent: &Agent,
    desired_velocity: Vec3,
    best_penalty: f32,
    debug: Option<&mut SampleDebugData>,
  ) -> f32 {
    // Penalties for straying from the desired and current velocities.
    let desired_velocity_penalty = self.params.desired_velocity_weight
      * (distance_xz(candidate, desired_velocity) * self.inverse_max_speed);
    let current_velocity_penalty = self.params.current_velocity_weight
      * (distance_xz(candidate, agent.velocity) * self.inverse_max_speed);

    // The time of impact this candidate would have to stay above for its
    // total penalty to come in under `best_penalty`. A threshold at or past
    // the horizon means the candidate already loses on the velocity
    // penalties alone. The curve (and its behavior for tiny or negative
    // `remaining_penalty`) is tuned; keep it exactly as is.
    let remaining_penalty =
      best_penalty - desired_velocity_penalty - current_velocity_penalty;
    let time_threshold =
      (self.params.time_of_impact_weight / remaining_penalty - 0.1)
        * self.params.time_horizon;
    if time_threshold - self.params.time_horizon > -f32::EPSILON {
      return best_penalty;
    }

    // Find the earliest predicted impact among all obstacles.
    let mut min_time_of_impact = self.params.time_horizon;
    let mut side = 0.0;
    let mut side_count = 0;

    for entry in self.circles.iter() {
      // Assume the obstacle reciprocates: the relative velocity moves by
      // twice the candidate delta, as if both parties take on half of the
      // avoidance.
      let relative_velocity =
        candidate * 2.0 - agent.velocity - entry.obstacle.velocity;

      side += f32::clamp(
        f32::min(
          dot_xz(entry.direction, relative_velocity) * 0.5 + 0.5,
          dot_xz(entry.side_normal, relative_velocity) * 2.0,
        ),
        0.0,
        1.0,
      );
      side_count += 1;

      let (first_contact, last_contact) = match sweep_circle_circle(
        agent.position,
        agent.radius,
        relative_velocity,
        entry.obstacle.position,
        entry.obstacle.radius,
      ) {
        Some(contact_interval) => contact_interval,
        None => continue,
      };

      let mut time_of_impact = first_contact;
      if time_of_impact < 0.0 && last_contact > 0.0 {
        // Already overlapping. Avoid harder the deeper the overlap.
        time_of_impact = -time_of_impact * 0.5;
      }

      if time_of_impact >= 0.0 && time_of_impact < min_time_of_impact {
        min_time_of_impact = time_of_impact;
        if min_time_of_impact < time_threshold {
          return best_penalty;
        }
      }
    }

    for entry in self.segments.iter() {
      let mut time_of_impact;
      if entry.touching {
        // The agent is on the segment. Candidates moving off its front side
        // collide immediately; candidates moving behind it are free.
        let segment_delta = entry.obstacle.end - entry.obstacle.start;
        let segment_normal = Vec3::new(-segment_delta.z, 0.0, segment_delta.x);
        if dot_xz(segment_normal, candidate) < 0.0 {
          continue;
        }
        time_of_impact = 0.0;
      } else {
        time_of_impact = match intersect_ray_segment(
          agent.position,
          candidate,
          entry.obstacle.start,
          entry.obstacle.end,
        ) {
          Some(ray_time) => ray_time,
          None => continue,
        };
      }

      // Avoid less when facing walls.
      time_of_impact *= 2.0;

      if time_of_impact < min_time_of_impact {
        min_time_of_impact = time_of_impact;
        if min_time_of_impact < time_threshold {
          return best_penalty;
        }
      }
    }

    // Average the side bias so it does not dominate crowded queries.
    if side_count > 0 {
      side /= side_count as f32;
    }

    let side_penalty = self.params.side_weight * side;
    let time_of_impact_penalty = self.params.time_of_impact_weight
      * (1.0 / (0.1 + min_time_of_impact * self.inverse_time_horizon));

    let penalty = desired_velocity_penalty
      + current_velocity_penalty
      + side_penalty
      + time_of_impact_penalty;

    if let Some(debug) = debug {
      debug.add_sample(
        candidate,
        sample_size,
        penalty,
        desired_velocity_penalty,
        current_velocity_penalty,
        side_penalty,
        time_of_impact_penalty,
      );
    }

    penalty
  }

  fn begin_sampling(&mut self, agent: &Agent, params: &AvoidanceParams) {
    self.params = params.clone();
    self.inverse_time_horizon = 1.0 / self.params.time_horizon;
    self.max_speed = agent.max_speed;
    // A zero max speed gets a large finite sentinel so the velocity
    // penalties stay finite.
    self.inverse_max_speed =
      if agent.max_speed > 0.0 { 1.0 / agent.max_speed } else { f32::MAX };
  }

  /// Picks a velocity for `agent` by evaluating a uniform
  /// `grid_size`-by-`grid_size` lattice of candidates centered on the
  /// desired velocity scaled by the velocity bias. Returns the
  /// lowest-penalty candidate (the zero velocity if every lattice point was
  /// filtered out) and the number of candidates evaluated.
  pub fn sample_velocity_grid(
    &mut self,
    agent: &Agent,
    desired_velocity: Vec3,
    params: &AvoidanceParams,
    mut debug: Option<&mut SampleDebugData>,
  ) -> (Vec3, usize) {
    assert!(
      params.grid_size >= 2,
      "grid_size must be at least 2, was {}",
      params.grid_size
    );

    self.prepare(agent.position, desired_velocity);
    self.begin_sampling(agent, params);
    if let Some(debug) = debug.as_deref_mut() {
      debug.reset();
    }

    let center_x = desired_velocity.x * self.params.velocity_bias;
    let center_z = desired_velocity.z * self.params.velocity_bias;
    let cell_size = self.max_speed * 2.0 * (1.0 - self.params.velocity_bias)
      / (self.params.grid_size - 1) as f32;
    let half_extent = (self.params.grid_size - 1) as f32 * cell_size * 0.5;

    let mut best_velocity = Vec3::ZERO;
    let mut best_penalty = f32::MAX;
    let mut sample_count = 0;

    for z in 0..self.params.grid_size {
      for x in 0..self.params.grid_size {
        let candidate = Vec3::new(
          center_x + x as f32 * cell_size - half_extent,
          0.0,
          center_z + z as f32 * cell_size - half_extent,
        );

        let speed_limit = self.max_speed + cell_size / 2.0;
        if candidate.x * candidate.x + candidate.z * candidate.z
          > speed_limit * speed_limit
        {
          continue;
        }

        let penalty = self.process_sample(
          candidate,
          cell_size,
          agent,
          desired_velocity,
          best_penalty,
          debug.as_deref_mut(),
        );
        sample_count += 1;
        // Strictly lower, so the first of equally-penalized candidates
        // wins and the output is reproducible.
        if penalty < best_penalty {
          best_penalty = penalty;
          best_velocity = candidate;
        }
      }
    }

    (best_velocity, sample_count)
  }

  /// Picks a velocity for `agent` by evaluating a radial pattern of
  /// candidates (a center point plus `adaptive_rings` rings of
  /// `adaptive_divisions` spokes), then re-centering the pattern on the best
  /// candidate found and halving the search radius, `adaptive_depth` times.
  /// Returns the final best candidate and the number of candidates evaluated
  /// across all iterations.
  pub fn sample_velocity_adaptive(
    &mut self,
    agent: &Agent,
    desired_velocity: Vec3,
    params: &AvoidanceParams,
    mut debug: Option<&mut SampleDebugData>,
  ) -> (Vec3, usize) {
    self.prepare(agent.position, desired_velocity);
    self.begin_sampling(agent, params);
    if let Some(debug) = debug.as_deref_mut() {
      debug.reset();
    }

    // Build the sampling pattern, aligned to the desired velocity. Each ring
    // starts from the desired direction (odd rings offset by half a sector,
    // interleaving neighbouring rings), then walks outward in both turn
    // directions one precomputed rotation step at a time.
    let divisions =
      self.params.adaptive_divisions.clamp(1, MAX_ADAPTIVE_DIVISIONS);
    let rings = self.params.adaptive_rings.clamp(1, MAX_ADAPTIVE_RINGS);

    let sector_angle = (1.0 / divisions as f32) * std::f32::consts::PI * 2.0;
    let (sector_sin, sector_cos) = sector_angle.sin_cos();

    let desired_direction = normalize_xz(desired_velocity);
    let offset_direction = rotate_xz(desired_direction, sector_angle * 0.5);

    let mut pattern =
      [glam::Vec2::ZERO; MAX_ADAPTIVE_DIVISIONS * MAX_ADAPTIVE_RINGS + 1];
    // The first pattern point is the center of the pattern itself.
    let mut pattern_count = 1;

    for ring in 0..rings {
      let ring_radius = (rings - ring) as f32 / rings as f32;
      let ring_start =
        if ring % 2 == 1 { offset_direction } else { desired_direction };
      pattern[pattern_count] =
        glam::Vec2::new(ring_start.x, ring_start.z) * ring_radius;
      let mut last_clockwise = pattern[pattern_count];
      let mut last_counter_clockwise = last_clockwise;
      pattern_count += 1;

      let mut spoke = 1;
      while spoke + 1 < divisions {
        pattern[pattern_count] = glam::Vec2::new(
          last_clockwise.x * sector_cos + last_clockwise.y * sector_sin,
          -last_clockwise.x * sector_sin + last_clockwise.y * sector_cos,
        );
        pattern[pattern_count + 1] = glam::Vec2::new(
          last_counter_clockwise.x * sector_cos
            - last_counter_clockwise.y * sector_sin,
          last_counter_clockwise.x * sector_sin
            + last_counter_clockwise.y * sector_cos,
        );
        last_clockwise = pattern[pattern_count];
        last_counter_clockwise = pattern[pattern_count + 1];
        pattern_count += 2;
        spoke += 2;
      }

      if divisions % 2 == 0 {
        pattern[pattern_count] = glam::Vec2::new(
          last_counter_clockwise.x * sector_cos
            - last_counter_clockwise.y * sector_sin,
          last_counter_clockwise.x * sector_sin
            + last_counter_clockwise.y * sector_cos,
        );
        pattern_count += 1;
      }
    }

    // Hill-climb: evaluate the pattern, re-center it on the best candidate,
    // shrink it, repeat.
    let mut search_radius = self.max_speed * (1.0 - self.params.velocity_bias);
    let mut result = Vec3::new(desired_velocity.x, 0.0, desired_velocity.z)
      * self.params.velocity_bias;
    let mut sample_count = 0;

    for _ in 0..self.params.adaptive_depth {
      let mut best_velocity = Vec3::ZERO;
      let mut best_penalty = f32::MAX;

      for offset in pattern[..pattern_count].iter() {
        let candidate = Vec3::new(
          result.x + offset.x * search_radius,
          0.0,
          result.z + offset.y * search_radius,
        );

        let speed_limit = self.max_speed + 0.001;
        if candidate.x * candidate.x + candidate.z * candidate.z
          > speed_limit * speed_limit
        {
          continue;
        }

        let penalty = self.process_sample(
          candidate,
          search_radius / 10.0,
          agent,
          desired_velocity,
          best_penalty,
          debug.as_deref_mut(),
        );
        sample_count += 1;
        if penalty < best_penalty {
          best_penalty = penalty;
          best_velocity = candidate;
        }
      }

      result = best_velocity;
      search_radius *= 0.5;
    }

    (result, sample_count)
  }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod test;
