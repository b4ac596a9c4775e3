use bidec_bias::{BeamState, BiasCorpus, HypothesisId, TokenId};

/// One in-flight candidate transcription. Carries its emitted tokens, its cumulative
/// log-probability and its cursor into the bias corpus (when a corpus is in play).
#[derive(Debug, Clone)]
pub struct Hypothesis {
	pub id: HypothesisId,
	pub tokens: Vec<TokenId>,
	pub log_probability: f32,
	pub bias_state: Option<BeamState>,
	pub finished: bool,
}

impl Hypothesis {
	/// The initial hypothesis every decode starts from: no tokens yet, positioned at the corpus
	/// root when biasing is active
	pub fn root(id: HypothesisId, corpus: Option<&BiasCorpus>) -> Hypothesis {
		Hypothesis {
			id,
			tokens: vec![],
			log_probability: 0.0,
			bias_state: corpus.map(|c| BeamState::new(c, id)),
			finished: false,
		}
	}

	/// Fork this hypothesis with one more emitted token. The bias cursor is copied (a single node
	/// index) and advanced with the token, so each child tracks its own corpus position.
	#[must_use]
	pub fn extend(&self, id: HypothesisId, token: TokenId, log_probability: f32, corpus: Option<&BiasCorpus>) -> Hypothesis {
		let bias_state = match (self.bias_state, corpus) {
			(Some(state), Some(corpus)) => Some(state.fork(id).advance(corpus, token)),
			_ => None,
		};

		let mut tokens = self.tokens.clone();
		tokens.push(token);
		Hypothesis {
			id,
			tokens,
			log_probability: self.log_probability + log_probability,
			bias_state,
			finished: false,
		}
	}

	/// Complete this hypothesis (end token seen or length exhausted). The end token itself is not
	/// part of the transcription.
	#[must_use]
	pub fn finish(&self, id: HypothesisId, log_probability: f32) -> Hypothesis {
		Hypothesis {
			id,
			tokens: self.tokens.clone(),
			log_probability: self.log_probability + log_probability,
			bias_state: self.bias_state,
			finished: true,
		}
	}
}

#[cfg(test)]
mod test {
	use super::Hypothesis;
	use bidec_bias::BiasCorpus;

	#[test]
	fn test_fork_advances_independently() {
		let corpus = BiasCorpus::build(vec![vec![5, 6], vec![5, 7]]).unwrap();
		let root = Hypothesis::root(0, Some(&corpus));
		let parent = root.extend(1, 5, -0.1, Some(&corpus));

		let left = parent.extend(2, 6, -0.2, Some(&corpus));
		let right = parent.extend(3, 7, -0.3, Some(&corpus));

		assert_eq!(left.tokens, vec![5, 6]);
		assert_eq!(right.tokens, vec![5, 7]);
		assert!((left.log_probability - -0.3).abs() < 1e-6);
		assert!((right.log_probability - -0.4).abs() < 1e-6);
		assert!(left.bias_state.unwrap().at_terminal(&corpus));
		assert!(right.bias_state.unwrap().at_terminal(&corpus));
		assert_ne!(left.bias_state.unwrap().node(), right.bias_state.unwrap().node());
	}

	#[test]
	fn test_unbiased_hypothesis_has_no_cursor() {
		let root = Hypothesis::root(0, None);
		let child = root.extend(1, 42, -1.0, None);
		assert!(child.bias_state.is_none());
		assert_eq!(child.tokens, vec![42]);
	}
}
