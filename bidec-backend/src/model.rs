use bidec_bias::TokenId;

/// The host's speech model, seen purely as a per-step source of next-token log-probabilities.
/// The decode loop never recomputes or inspects the acoustic side; it only feeds back the token
/// prefix chosen so far.
pub trait SpeechModel {
	/// Opaque acoustic representation of one audio input, produced by the host's feature
	/// extraction
	type Features;

	/// Log-probabilities over the full vocabulary for the next token, conditioned on the audio
	/// features and the tokens emitted so far (including the start tokens)
	fn next_logits(&self, features: &Self::Features, prefix: &[TokenId]) -> Vec<f32>;

	/// Tokens the decoder is primed with before the first generation step. These are fed to the
	/// model as part of every prefix but never appear in the transcription.
	fn start_tokens(&self) -> Vec<TokenId> {
		vec![]
	}

	/// Token that ends a transcription
	fn end_token(&self) -> TokenId;
}
