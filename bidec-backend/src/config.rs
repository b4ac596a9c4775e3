use bidec_bias::{BiasCorpus, BiasError, BiasLogitsProcessor, BiasStrength, CandidateWeighting};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct DecodeConfig {
	/// Number of hypotheses kept alive at each step; 1 selects greedy (or sampled) decoding
	#[serde(default = "default_beam_width")]
	pub beam_width: usize,

	/// Maximum number of tokens generated per hypothesis
	#[serde(default = "default_max_tokens")]
	pub max_tokens: usize,

	/// Sampling temperature, only used when `beam_width` is 1. Zero always picks the most likely
	/// token.
	#[serde(default = "default_temperature")]
	pub temperature: f32,
}

impl Default for DecodeConfig {
	fn default() -> Self {
		DecodeConfig {
			beam_width: default_beam_width(),
			max_tokens: default_max_tokens(),
			temperature: default_temperature(),
		}
	}
}

const fn default_beam_width() -> usize {
	1
}

const fn default_max_tokens() -> usize {
	224
}

const fn default_temperature() -> f32 {
	0.0
}

/// Bias settings as supplied by the host, validated when turned into a processor
#[derive(Deserialize, Debug, Clone)]
pub struct BiasConfig {
	/// Interpolation weight between the raw model distribution (0.0) and the corpus distribution
	/// (1.0)
	pub strength: f32,

	/// How probability mass is spread over candidate tokens
	#[serde(default)]
	pub weighting: CandidateWeighting,
}

impl BiasConfig {
	/// Build the logits processor for this configuration. Fails before any decoding starts when
	/// the strength is out of range.
	pub fn processor<'corpus>(&self, corpus: &'corpus BiasCorpus) -> Result<BiasLogitsProcessor<'corpus>, BiasError> {
		let strength = BiasStrength::new(self.strength)?;
		Ok(BiasLogitsProcessor::new(corpus, strength).with_weighting(self.weighting))
	}
}
