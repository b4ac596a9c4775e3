use std::time::Duration;

use serde::Serialize;

/// Counters for one decode call, reported once at completion
#[derive(Serialize, Debug, Clone, Default)]
pub struct DecodeStats {
	/// Number of generation steps taken
	pub steps: usize,

	/// Number of logits vectors requested from the model (one per live hypothesis per step)
	pub predicted_tokens: usize,

	/// Number of hypothesis forks created by beam expansion
	pub hypotheses_forked: usize,

	/// Number of expansions dropped by pruning to the beam width
	pub hypotheses_pruned: usize,

	/// Wall time spent asking the model for logits
	pub predict_duration: Duration,
}

impl DecodeStats {
	pub fn tokens_per_second(&self) -> f64 {
		if self.predict_duration.is_zero() {
			return 0.0;
		}
		self.predicted_tokens as f64 / self.predict_duration.as_secs_f64()
	}
}
