use thiserror::Error;

pub mod beam;
pub mod corpus;
pub mod processor;

pub use beam::{BeamState, HypothesisId};
pub use corpus::{BiasCorpus, CorpusError, NodeIndex};
pub use processor::{log_softmax, BiasError, BiasLogitsProcessor, BiasStrength, CandidateWeighting};

/// Identifier for a single entry in the model's vocabulary. Opaque to this crate; only equality matters
pub type TokenId = u32;

/// Errors originating in the host's tokenizer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizationError {
	#[error("text could not be encoded: {0}")]
	UnencodableText(String),

	#[error("invalid token id {0}")]
	InvalidTokenId(TokenId),
}

/// The tokenizer of the host model stack. The biasing core only ever talks to the tokenizer through
/// this contract; it never inspects token text itself.
pub trait Tokenizer {
	/// Encode a piece of text to a sequence of token ids
	fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizationError>;

	/// Decode a sequence of token ids back to text
	fn decode(&self, tokens: &[TokenId]) -> String;

	/// Number of entries in the vocabulary; used to validate logits vector lengths
	fn vocabulary_size(&self) -> usize;
}

/// An object that adjusts next-token logits during decoding. Matching progress is tracked outside
/// the processor (one [BeamState] per hypothesis) so a single processor can serve a whole beam.
pub trait LogitsProcessor {
	/// Return adjusted logits for the next token, given the hypothesis's current corpus position
	fn apply(&self, state: &BeamState, raw_logits: &[f32]) -> Result<Vec<f32>, BiasError>;
}
