use crate::corpus::{BiasCorpus, NodeIndex};
use crate::TokenId;

/// Identifier for one in-flight decoding hypothesis, assigned by the decode loop
pub type HypothesisId = usize;

/// Per-hypothesis cursor into a [BiasCorpus], tracking how far along some bias sentence the
/// hypothesis currently is. Copying one of these is how a beam fork duplicates bias progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamState {
	node: NodeIndex,
	hypothesis: HypothesisId,
}

impl BeamState {
	/// State for a freshly created hypothesis: positioned at the corpus root
	pub fn new(corpus: &BiasCorpus, hypothesis: HypothesisId) -> BeamState {
		BeamState {
			node: corpus.root(),
			hypothesis,
		}
	}

	pub fn node(&self) -> NodeIndex {
		self.node
	}

	pub fn hypothesis(&self) -> HypothesisId {
		self.hypothesis
	}

	/// Copy this state for a hypothesis forked off the current one
	pub fn fork(&self, hypothesis: HypothesisId) -> BeamState {
		BeamState { hypothesis, ..*self }
	}

	/// Consume one emitted token. A token matching an outgoing edge moves to the child node; any
	/// other token resets to the root. The corpus is advisory, not a grammar: a hypothesis that
	/// diverges from every bias sentence simply loses its boost until a new phrase prefix is
	/// recognized starting from the root.
	pub fn advance(&self, corpus: &BiasCorpus, token: TokenId) -> BeamState {
		match corpus.lookup(self.node, token) {
			Some(child) => BeamState { node: child, ..*self },
			None => {
				if self.node != corpus.root() {
					tracing::trace!(hypothesis = self.hypothesis, token, "hypothesis diverged from corpus, resetting to root");
				}
				BeamState {
					node: corpus.root(),
					..*self
				}
			}
		}
	}

	/// Whether this state sits at the end of some complete bias sentence
	pub fn at_terminal(&self, corpus: &BiasCorpus) -> bool {
		corpus.is_terminal(self.node)
	}
}
