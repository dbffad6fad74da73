use glam::Vec3;

/// Records every candidate velocity evaluated during a sampling call,
/// together with its penalty breakdown, for offline inspection and tuning
/// tools. The recorder is caller-owned and entirely optional: sampling takes
/// an `Option<&mut SampleDebugData>` and records nothing when it is absent.
///
/// The storage is allocated once at a fixed capacity. Each sampling call
/// resets the recorder, and samples evaluated after the capacity is reached
/// are dropped rather than overwriting older ones.
pub struct SampleDebugData {
  max_samples: usize,

  velocities: Vec<Vec3>,
  sample_sizes: Vec<f32>,
  penalties: Vec<f32>,
  desired_velocity_penalties: Vec<f32>,
  current_velocity_penalties: Vec<f32>,
  side_penalties: Vec<f32>,
  time_of_impact_penalties: Vec<f32>,
}

impl SampleDebugData {
  /// Creates a recorder holding at most `max_samples` samples.
  pub fn new(max_samples: usize) -> SampleDebugData {
    SampleDebugData {
      max_samples,
      velocities: Vec::with_capacity(max_samples),
      sample_sizes: Vec::with_capacity(max_samples),
      penalties: Vec::with_capacity(max_samples),
      desired_velocity_penalties: Vec::with_capacity(max_samples),
      current_velocity_penalties: Vec::with_capacity(max_samples),
      side_penalties: Vec::with_capacity(max_samples),
      time_of_impact_penalties: Vec::with_capacity(max_samples),
    }
  }

  /// Forgets all recorded samples, keeping the storage.
  pub fn reset(&mut self) {
    self.velocities.clear();
    self.sample_sizes.clear();
    self.penalties.clear();
    self.desired_velocity_penalties.clear();
    self.current_velocity_penalties.clear();
    self.side_penalties.clear();
    self.time_of_impact_penalties.clear();
  }

  pub(crate) fn add_sample(
    &mut self,
    velocity: Vec3,
    sample_size: f32,
    penalty: f32,
    desired_velocity_penalty: f32,
    current_velocity_penalty: f32,
    side_penalty: f32,
    time_of_impact_penalty: f32,
  ) {
    if self.velocities.len() >= self.max_samples {
      // At capacity. Drop the sample.
      return;
    }

    self.velocities.push(velocity);
    self.sample_sizes.push(sample_size);
    self.penalties.push(penalty);
    self.desired_velocity_penalties.push(desired_velocity_penalty);
    self.current_velocity_penalties.push(current_velocity_penalty);
    self.side_penalties.push(side_penalty);
    self.time_of_impact_penalties.push(time_of_impact_penalty);
  }

  /// The number of recorded samples.
  pub fn get_sample_count(&self) -> usize {
    self.velocities.len()
  }

  /// The recorded candidate velocities.
  pub fn get_velocities(&self) -> &[Vec3] {
    &self.velocities
  }

  /// The cell size (grid) or pattern scale (adaptive) each sample was
  /// evaluated at.
  pub fn get_sample_sizes(&self) -> &[f32] {
    &self.sample_sizes
  }

  /// The total penalty of each sample.
  pub fn get_penalties(&self) -> &[f32] {
    &self.penalties
  }

  /// The desired-velocity deviation term of each sample.
  pub fn get_desired_velocity_penalties(&self) -> &[f32] {
    &self.desired_velocity_penalties
  }

  /// The current-velocity deviation term of each sample.
  pub fn get_current_velocity_penalties(&self) -> &[f32] {
    &self.current_velocity_penalties
  }

  /// The side-bias term of each sample.
  pub fn get_side_penalties(&self) -> &[f32] {
    &self.side_penalties
  }

  /// The time-of-impact term of each sample.
  pub fn get_time_of_impact_penalties(&self) -> &[f32] {
    &self.time_of_impact_penalties
  }

  /// Remaps every penalty channel to the [0, 1] range, for visualization.
  /// Channels whose values span a (near) zero range are only shifted, not
  /// scaled.
  pub fn normalize_samples(&mut self) {
    normalize_channel(&mut self.penalties);
    normalize_channel(&mut self.desired_velocity_penalties);
    normalize_channel(&mut self.current_velocity_penalties);
    normalize_channel(&mut self.side_penalties);
    normalize_channel(&mut self.time_of_impact_penalties);
  }
}

fn normalize_channel(values: &mut [f32]) {
  let mut min = f32::MAX;
  let mut max = -f32::MAX;
  for value in values.iter() {
    min = min.min(*value);
    max = max.max(*value);
  }

  let range = max - min;
  let scale = if range > 0.001 { 1.0 / range } else { 1.0 };
  for value in values.iter_mut() {
    *value = ((*value - min) * scale).clamp(0.0, 1.0);
  }
}

#[cfg(test)]
#[path = "debug_test.rs"]
mod test;
