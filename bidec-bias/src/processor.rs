use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::beam::BeamState;
use crate::corpus::{BiasCorpus, NodeIndex};
use crate::{LogitsProcessor, TokenId};

/// Log-probability assigned to tokens the corpus does not support at the current position. They
/// stay reachable through the raw channel for any strength below 1.
pub const NO_SUPPORT: f32 = f32::NEG_INFINITY;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BiasError {
	#[error("bias strength {0} is outside [0, 1]")]
	InvalidStrength(f32),

	#[error("bias token {token} does not fit in a vocabulary of size {vocabulary_size}")]
	VocabularyMismatch { token: TokenId, vocabulary_size: usize },
}

/// Interpolation weight between the raw model distribution (0.0) and the corpus-derived
/// distribution (1.0). Validated on construction; constant for the duration of one decode call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiasStrength(f32);

impl BiasStrength {
	pub fn new(value: f32) -> Result<BiasStrength, BiasError> {
		if !(0.0..=1.0).contains(&value) {
			return Err(BiasError::InvalidStrength(value));
		}
		Ok(BiasStrength(value))
	}

	pub fn value(&self) -> f32 {
		self.0
	}
}

/// How probability mass is spread over the candidate tokens at a trie position
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CandidateWeighting {
	/// Every candidate token gets the same mass
	#[default]
	Uniform,

	/// Mass proportional to the number of bias sentences passing through each child node
	Frequency,
}

/// Interpolates the model's next-token distribution with the distribution implied by the bias
/// corpus at the hypothesis's current trie position. Pure: all mutable matching state lives in
/// the [BeamState] the caller passes in, so one processor serves every hypothesis in a beam.
pub struct BiasLogitsProcessor<'corpus> {
	corpus: &'corpus BiasCorpus,
	strength: BiasStrength,
	weighting: CandidateWeighting,
}

impl<'corpus> BiasLogitsProcessor<'corpus> {
	pub fn new(corpus: &'corpus BiasCorpus, strength: BiasStrength) -> BiasLogitsProcessor<'corpus> {
		BiasLogitsProcessor {
			corpus,
			strength,
			weighting: CandidateWeighting::default(),
		}
	}

	pub fn with_weighting(mut self, weighting: CandidateWeighting) -> BiasLogitsProcessor<'corpus> {
		self.weighting = weighting;
		self
	}

	pub fn corpus(&self) -> &'corpus BiasCorpus {
		self.corpus
	}

	pub fn strength(&self) -> BiasStrength {
		self.strength
	}

	/// The bias log-distribution over the full vocabulary: candidate tokens share the mass
	/// according to the configured weighting, everything else gets the floor.
	fn bias_distribution(&self, candidates: &[(TokenId, NodeIndex)], vocabulary_size: usize) -> Vec<f32> {
		let mut bias = vec![NO_SUPPORT; vocabulary_size];
		match self.weighting {
			CandidateWeighting::Uniform => {
				let log_mass = -(candidates.len() as f32).ln();
				for (token, _) in candidates {
					bias[*token as usize] = log_mass;
				}
			}
			CandidateWeighting::Frequency => {
				let total: u32 = candidates.iter().map(|(_, child)| self.corpus.weight(*child)).sum();
				for (token, child) in candidates {
					bias[*token as usize] = (self.corpus.weight(*child) as f32 / total as f32).ln();
				}
			}
		}
		bias
	}
}

impl<'corpus> LogitsProcessor for BiasLogitsProcessor<'corpus> {
	fn apply(&self, state: &BeamState, raw_logits: &[f32]) -> Result<Vec<f32>, BiasError> {
		let candidates: Vec<(TokenId, NodeIndex)> = self.corpus.candidates(state.node()).collect();

		// No outgoing edges (leaf, or just reset into an exhausted branch): no bias signal here
		if candidates.is_empty() {
			tracing::trace!(node = state.node(), "no bias candidates at this position, passing raw logits through");
			return Ok(raw_logits.to_vec());
		}

		// A candidate outside the raw vocabulary means the tokenizer used at build time is not the
		// one in use now; never clamp, this is a configuration bug
		for (token, _) in &candidates {
			if *token as usize >= raw_logits.len() {
				return Err(BiasError::VocabularyMismatch {
					token: *token,
					vocabulary_size: raw_logits.len(),
				});
			}
		}

		tracing::trace!(
			node = state.node(),
			hypothesis = state.hypothesis(),
			candidates = candidates.len(),
			"applying bias"
		);

		let raw = log_softmax(raw_logits);
		let bias = self.bias_distribution(&candidates, raw_logits.len());
		let strength = self.strength.value();

		// Convex combination of the two probability distributions, re-logged. Mixing
		// probabilities (not logits) is what makes strength 0 reproduce the raw model exactly
		// and strength 1 reproduce the bias distribution exactly.
		let adjusted = raw
			.iter()
			.zip(bias.iter())
			.map(|(r, b)| ((1.0 - strength) * r.exp() + strength * b.exp()).ln())
			.collect();
		Ok(adjusted)
	}
}

/// Log-softmax over a logits vector, shifted by the maximum for stability. An all-`-inf` input
/// stays all-`-inf`.
pub fn log_softmax(logits: &[f32]) -> Vec<f32> {
	let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
	if !max.is_finite() {
		return vec![f32::NEG_INFINITY; logits.len()];
	}
	let lse = logits.iter().map(|l| (l - max).exp()).sum::<f32>().ln() + max;
	logits.iter().map(|l| l - lse).collect()
}
