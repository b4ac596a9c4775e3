use std::time::Instant;

use bidec_bias::{log_softmax, BiasCorpus, BiasLogitsProcessor, HypothesisId, LogitsProcessor, TokenId, Tokenizer};
use partial_sort::PartialSort;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::{info, trace};

use crate::{config::DecodeConfig, hypothesis::Hypothesis, model::SpeechModel, stats::DecodeStats, types::DecodeError};

/// Drives one decode call: repeatedly asks the model for next-token logits, runs them through the
/// bias processor (when one is supplied), selects tokens and advances each hypothesis's corpus
/// cursor with the token that was actually chosen.
pub struct DecodeSession<'a, M: SpeechModel> {
	model: &'a M,
	tokenizer: &'a dyn Tokenizer,
	config: DecodeConfig,
}

impl<'a, M: SpeechModel> DecodeSession<'a, M> {
	pub fn new(model: &'a M, tokenizer: &'a dyn Tokenizer, config: DecodeConfig) -> DecodeSession<'a, M> {
		DecodeSession { model, tokenizer, config }
	}

	/// Decode one audio input to text. `processor = None` decodes without bias. The transcription
	/// is the detokenization of the best-scoring hypothesis; start and end tokens are excluded.
	pub fn decode(&self, features: &M::Features, processor: Option<&BiasLogitsProcessor>) -> Result<String, DecodeError> {
		let mut rng = rand::thread_rng();
		self.decode_with_rng(features, processor, &mut rng)
	}

	/// Like [Self::decode] but with a caller-supplied RNG, so sampled decoding can be made
	/// deterministic
	pub fn decode_with_rng<R: Rng>(
		&self,
		features: &M::Features,
		processor: Option<&BiasLogitsProcessor>,
		rng: &mut R,
	) -> Result<String, DecodeError> {
		if self.config.beam_width == 0 {
			return Err(DecodeError::NoHypothesis);
		}

		let corpus = processor.map(|p| p.corpus());
		let start_tokens = self.model.start_tokens();
		let end_token = self.model.end_token();
		let vocabulary_size = self.tokenizer.vocabulary_size();

		let mut stats = DecodeStats::default();
		let mut next_id: HypothesisId = 1;
		let mut live = vec![Hypothesis::root(0, corpus)];
		let mut finished: Vec<Hypothesis> = vec![];

		for step in 0..self.config.max_tokens {
			if live.is_empty() || finished.len() >= self.config.beam_width {
				break;
			}

			let mut expansions: Vec<Hypothesis> = vec![];
			for hypothesis in &live {
				let prefix: Vec<TokenId> = start_tokens.iter().chain(hypothesis.tokens.iter()).copied().collect();
				let start = Instant::now();
				let raw = self.model.next_logits(features, &prefix);
				stats.predict_duration += start.elapsed();
				stats.predicted_tokens += 1;

				if raw.len() != vocabulary_size {
					return Err(DecodeError::LogitsLength {
						step,
						expected: vocabulary_size,
						actual: raw.len(),
					});
				}

				// A vocabulary mismatch inside the processor aborts the whole decode call; it is
				// a configuration bug, not a transient condition
				let adjusted = match (processor, &hypothesis.bias_state) {
					(Some(processor), Some(state)) => processor.apply(state, &raw)?,
					_ => raw,
				};

				let log_probs = log_softmax(&adjusted);
				if !log_probs.iter().any(|lp| lp.is_finite()) {
					return Err(DecodeError::EmptyLogits { step });
				}

				if self.config.beam_width == 1 {
					let token = self.select_token(&log_probs, rng);
					expansions.push(self.expand(hypothesis, token as TokenId, log_probs[token], end_token, corpus, &mut next_id));
				} else {
					for (token, log_prob) in top_tokens(&log_probs, self.config.beam_width) {
						expansions.push(self.expand(hypothesis, token, log_prob, end_token, corpus, &mut next_id));
					}
				}
			}

			// Prune to the beam width by cumulative log-probability. Completed hypotheses are set
			// aside and do not occupy a beam slot.
			expansions.sort_by(|a, b| b.log_probability.total_cmp(&a.log_probability));
			stats.hypotheses_forked += expansions.len();
			live.clear();
			for hypothesis in expansions {
				if hypothesis.finished {
					trace!(hypothesis = hypothesis.id, tokens = ?hypothesis.tokens, "hypothesis finished");
					finished.push(hypothesis);
				} else if live.len() < self.config.beam_width {
					live.push(hypothesis);
				} else {
					stats.hypotheses_pruned += 1;
				}
			}
			stats.steps += 1;
		}

		// Length exhausted: whatever is still live completes as-is
		finished.append(&mut live);

		// TODO: apply a length penalty when comparing finished hypotheses of different lengths
		let best = finished
			.into_iter()
			.max_by(|a, b| a.log_probability.total_cmp(&b.log_probability))
			.ok_or(DecodeError::NoHypothesis)?;

		info!(
			steps = stats.steps,
			forked = stats.hypotheses_forked,
			pruned = stats.hypotheses_pruned,
			"decode finished; {} predicted tokens, {:.3} t/s",
			stats.predicted_tokens,
			stats.tokens_per_second()
		);

		Ok(self.tokenizer.decode(&best.tokens))
	}

	fn expand(
		&self,
		hypothesis: &Hypothesis,
		token: TokenId,
		log_probability: f32,
		end_token: TokenId,
		corpus: Option<&BiasCorpus>,
		next_id: &mut HypothesisId,
	) -> Hypothesis {
		let id = *next_id;
		*next_id += 1;
		if token == end_token {
			hypothesis.finish(id, log_probability)
		} else {
			hypothesis.extend(id, token, log_probability, corpus)
		}
	}

	/// Token selection for the single-hypothesis path: argmax, or temperature sampling when a
	/// temperature is configured
	fn select_token<R: Rng>(&self, log_probs: &[f32], rng: &mut R) -> usize {
		if self.config.temperature > 0.0 {
			let weights: Vec<f32> = log_probs.iter().map(|lp| (lp / self.config.temperature).exp()).collect();
			if let Ok(distribution) = WeightedIndex::new(&weights) {
				return distribution.sample(rng);
			}
			// Every weight underflowed to zero; fall through to argmax
		}
		log_probs
			.iter()
			.enumerate()
			.max_by(|a, b| a.1.total_cmp(b.1))
			.map(|(token, _)| token)
			.unwrap_or(0)
	}
}

/// The `n` most likely tokens with their log-probabilities, unreachable tokens excluded
fn top_tokens(log_probs: &[f32], n: usize) -> Vec<(TokenId, f32)> {
	let mut indexed: Vec<(TokenId, f32)> = log_probs.iter().enumerate().map(|(token, lp)| (token as TokenId, *lp)).collect();
	let n = n.min(indexed.len());
	indexed.partial_sort(n, |a, b| b.1.total_cmp(&a.1));
	indexed.truncate(n);
	indexed.retain(|(_, lp)| lp.is_finite());
	indexed
}
