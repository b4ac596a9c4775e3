use bidec_bias::BiasError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
	#[error("bias error: {0}")]
	Bias(#[from] BiasError),

	#[error("model produced {actual} logits at step {step} where the tokenizer vocabulary has {expected}")]
	LogitsLength { step: usize, expected: usize, actual: usize },

	#[error("model produced an unusable logits vector at step {step}")]
	EmptyLogits { step: usize },

	#[error("no decoding hypothesis available; beam width must be at least 1")]
	NoHypothesis,
}
