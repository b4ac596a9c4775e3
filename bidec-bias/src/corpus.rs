use std::collections::HashMap;

use thiserror::Error;

use crate::{TokenId, TokenizationError, Tokenizer};

/// Index of a trie node in the corpus arena
pub type NodeIndex = usize;

const ROOT: NodeIndex = 0;

#[derive(Error, Debug)]
pub enum CorpusError {
	#[error("no usable bias sentences remain after filtering")]
	EmptyCorpus,

	#[error("tokenization error: {0}")]
	Tokenization(#[from] TokenizationError),
}

#[derive(Debug, Clone)]
struct TrieNode {
	/// Outgoing edges; at most one edge per token
	children: HashMap<TokenId, NodeIndex>,

	/// Whether some bias sentence ends at this node
	is_terminal: bool,

	/// Distance from the root (root is 0)
	depth: usize,

	/// Number of inserted sentences whose token sequence passes through this node
	weight: u32,
}

impl TrieNode {
	fn new(depth: usize) -> TrieNode {
		TrieNode {
			children: HashMap::new(),
			is_terminal: false,
			depth,
			weight: 0,
		}
	}
}

/// A prefix trie over the token sequences of a set of bias sentences. Built once, then shared
/// read-only across all in-flight decoding hypotheses; nodes are arena-indexed so a position in
/// the trie is a plain integer that can be copied around freely.
#[derive(Debug)]
pub struct BiasCorpus {
	nodes: Vec<TrieNode>,
}

impl BiasCorpus {
	/// Build a corpus from already-tokenized sentences. Empty token sequences are filtered out;
	/// if nothing remains, no corpus is built.
	pub fn build<I>(sentences: I) -> Result<BiasCorpus, CorpusError>
	where
		I: IntoIterator<Item = Vec<TokenId>>,
	{
		let sentences: Vec<Vec<TokenId>> = sentences.into_iter().filter(|s| !s.is_empty()).collect();
		if sentences.is_empty() {
			return Err(CorpusError::EmptyCorpus);
		}

		let mut corpus = BiasCorpus {
			nodes: vec![TrieNode::new(0)],
		};
		for sentence in &sentences {
			corpus.insert(sentence);
		}

		tracing::debug!(
			sentences = sentences.len(),
			nodes = corpus.nodes.len(),
			terminals = corpus.terminal_count(),
			"bias corpus built"
		);
		Ok(corpus)
	}

	/// Build a corpus from sentence text, tokenizing each line through the supplied tokenizer.
	/// Blank lines are skipped before tokenization; tokenizer failures abort the build.
	pub fn from_sentences<S: AsRef<str>>(sentences: &[S], tokenizer: &dyn Tokenizer) -> Result<BiasCorpus, CorpusError> {
		let mut tokenized = Vec::with_capacity(sentences.len());
		for sentence in sentences {
			let sentence = sentence.as_ref().trim();
			if sentence.is_empty() {
				continue;
			}
			tokenized.push(tokenizer.encode(sentence)?);
		}
		Self::build(tokenized)
	}

	fn insert(&mut self, tokens: &[TokenId]) {
		let mut current = ROOT;
		self.nodes[ROOT].weight += 1;
		for token in tokens {
			let next = match self.nodes[current].children.get(token) {
				Some(child) => *child,
				None => {
					let child = self.nodes.len();
					let depth = self.nodes[current].depth + 1;
					self.nodes.push(TrieNode::new(depth));
					self.nodes[current].children.insert(*token, child);
					child
				}
			};
			self.nodes[next].weight += 1;
			current = next;
		}
		self.nodes[current].is_terminal = true;
	}

	/// The root node; every hypothesis starts matching here
	pub fn root(&self) -> NodeIndex {
		ROOT
	}

	/// Follow the edge labeled `token` out of `node`, if there is one
	pub fn lookup(&self, node: NodeIndex, token: TokenId) -> Option<NodeIndex> {
		self.nodes[node].children.get(&token).copied()
	}

	/// The outgoing edges of `node`: the tokens the corpus supports at this position
	pub fn candidates(&self, node: NodeIndex) -> impl Iterator<Item = (TokenId, NodeIndex)> + '_ {
		self.nodes[node].children.iter().map(|(token, child)| (*token, *child))
	}

	/// Follow a whole token sequence from the root; `None` as soon as an edge is missing
	pub fn walk(&self, tokens: &[TokenId]) -> Option<NodeIndex> {
		let mut current = ROOT;
		for token in tokens {
			current = self.lookup(current, *token)?;
		}
		Some(current)
	}

	pub fn is_terminal(&self, node: NodeIndex) -> bool {
		self.nodes[node].is_terminal
	}

	pub fn depth(&self, node: NodeIndex) -> usize {
		self.nodes[node].depth
	}

	/// Number of inserted sentences passing through `node`; used for frequency-weighted biasing
	pub fn weight(&self, node: NodeIndex) -> u32 {
		self.nodes[node].weight
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	pub fn terminal_count(&self) -> usize {
		self.nodes.iter().filter(|n| n.is_terminal).count()
	}
}

#[cfg(test)]
mod test {
	use super::BiasCorpus;

	#[test]
	fn test_duplicate_insertion_is_idempotent() {
		let once = BiasCorpus::build(vec![vec![5, 6, 7]]).unwrap();
		let twice = BiasCorpus::build(vec![vec![5, 6, 7], vec![5, 6, 7]]).unwrap();
		assert_eq!(once.node_count(), twice.node_count());
		assert_eq!(once.terminal_count(), twice.terminal_count());
	}

	#[test]
	fn test_shared_prefixes_share_nodes() {
		// "call mom" / "call dad": root + 'call' + two leaves
		let corpus = BiasCorpus::build(vec![vec![5, 6], vec![5, 7]]).unwrap();
		assert_eq!(corpus.node_count(), 4);
		assert_eq!(corpus.terminal_count(), 2);
		assert_eq!(corpus.weight(corpus.lookup(corpus.root(), 5).unwrap()), 2);
	}
}
