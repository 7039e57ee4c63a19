// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token estimation.
//!
//! Known OpenAI models are counted with the matching BPE encoding from
//! `tiktoken-rs`. Anything else falls back to a characters-per-token ratio.
//! Encoders are built once per model identifier and memoized in a
//! concurrent map.

use std::sync::Arc;

use dashmap::DashMap;
use meterr_core::{ChatMessage, Content, MessageContent};
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// Average characters per token used by the fallback estimator.
pub const CHARS_PER_TOKEN: usize = 4;

/// Fixed framing cost of one chat message (role markers and separators).
pub const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// Tokens that prime the assistant reply after a chat prompt.
pub const REPLY_OVERHEAD_TOKENS: u32 = 2;

/// Suffixes that do not change a model's encoding.
const VERSION_SUFFIXES: &[&str] = &["-preview", "-1106"];

/// A strategy for counting tokens in plain text.
pub trait TokenEncoder: Send + Sync {
    /// Human-readable identifier, e.g. the BPE encoding name.
    fn name(&self) -> &str;

    /// Number of tokens in `text`. Must be deterministic.
    fn count(&self, text: &str) -> u32;
}

/// BPE encoder backed by `tiktoken-rs`.
pub struct TiktokenEncoder {
    name: String,
    bpe: CoreBPE,
}

impl TiktokenEncoder {
    /// Encoder for `model`, or `None` when tiktoken does not know it.
    pub fn for_model(model: &str) -> Option<Self> {
        let normalized = normalize_model(model);
        match tiktoken_rs::get_bpe_from_model(&normalized) {
            Ok(bpe) => Some(Self {
                name: format!("tiktoken:{normalized}"),
                bpe,
            }),
            Err(e) => {
                debug!(model, error = %e, "no BPE encoding for model");
                None
            }
        }
    }
}

impl TokenEncoder for TiktokenEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self, text: &str) -> u32 {
        saturate(self.bpe.encode_ordinary(text).len())
    }
}

/// Fallback encoder: one token per [`CHARS_PER_TOKEN`] characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharRatioEncoder;

impl TokenEncoder for CharRatioEncoder {
    fn name(&self) -> &str {
        "char-ratio"
    }

    fn count(&self, text: &str) -> u32 {
        saturate(text.chars().count() / CHARS_PER_TOKEN)
    }
}

fn saturate(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Strip suffixes that share the base model's encoding.
fn normalize_model(model: &str) -> String {
    let mut normalized = model.trim().to_lowercase();
    for suffix in VERSION_SUFFIXES {
        normalized = normalized.replace(suffix, "");
    }
    normalized
}

/// Counts tokens for arbitrary content, memoizing one encoder per model.
///
/// Safe to share across tasks. Two callers racing on a cold model may both
/// build an encoder; the last insert wins and both results are identical.
pub struct TokenEstimator {
    cache: DashMap<String, Arc<dyn TokenEncoder>>,
    custom: Vec<(String, Arc<dyn TokenEncoder>)>,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenEstimator {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            custom: Vec::new(),
        }
    }

    /// Use `encoder` for every model whose identifier starts with `prefix`.
    ///
    /// Registered prefixes take priority over the built-in encodings; the
    /// longest matching prefix wins.
    pub fn with_encoder(mut self, prefix: impl Into<String>, encoder: Arc<dyn TokenEncoder>) -> Self {
        self.custom.push((prefix.into().to_lowercase(), encoder));
        self.custom.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    /// The encoder used for `model`, building and caching it on first use.
    pub fn encoder_for(&self, model: &str) -> Arc<dyn TokenEncoder> {
        if let Some(cached) = self.cache.get(model).map(|e| Arc::clone(e.value())) {
            return cached;
        }

        let encoder = self.resolve(model);
        debug!(model, encoder = encoder.name(), "token encoder initialized");
        self.cache.insert(model.to_string(), Arc::clone(&encoder));
        encoder
    }

    fn resolve(&self, model: &str) -> Arc<dyn TokenEncoder> {
        let lowered = model.to_lowercase();
        if let Some((_, encoder)) = self
            .custom
            .iter()
            .find(|(prefix, _)| lowered.starts_with(prefix.as_str()))
        {
            return Arc::clone(encoder);
        }
        match TiktokenEncoder::for_model(model) {
            Some(encoder) => Arc::new(encoder),
            None => Arc::new(CharRatioEncoder),
        }
    }

    /// Number of models with a memoized encoder.
    pub fn cached_models(&self) -> usize {
        self.cache.len()
    }

    /// Tokens in a plain string.
    pub fn count_text(&self, text: &str, model: &str) -> u32 {
        self.encoder_for(model).count(text)
    }

    /// Tokens in a chat transcript, including per-message framing and the
    /// reply primer. The primer is counted even for an empty transcript.
    pub fn count_messages(&self, messages: &[ChatMessage], model: &str) -> u32 {
        let encoder = self.encoder_for(model);
        let body: u32 = messages
            .iter()
            .map(|message| message_tokens(encoder.as_ref(), message))
            .fold(0u32, u32::saturating_add);
        body.saturating_add(REPLY_OVERHEAD_TOKENS)
    }

    /// Tokens in any supported content shape.
    pub fn estimate(&self, content: &Content, model: &str) -> u32 {
        match content {
            Content::Text(text) => self.count_text(text, model),
            Content::Messages(messages) => self.count_messages(messages, model),
        }
    }
}

fn message_tokens(encoder: &dyn TokenEncoder, message: &ChatMessage) -> u32 {
    let mut tokens = MESSAGE_OVERHEAD_TOKENS.saturating_add(encoder.count(&message.role));
    tokens = tokens.saturating_add(match &message.content {
        MessageContent::Text(text) => encoder.count(text),
        // Only text parts are billed as prompt tokens here.
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| part.as_text())
            .map(|text| encoder.count(text))
            .fold(0u32, u32::saturating_add),
    });
    if let Some(name) = &message.name {
        tokens = tokens.saturating_add(encoder.count(name));
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterr_core::ContentPart;
    use proptest::prelude::*;

    /// One token per whitespace-separated word; easy to reason about.
    struct WordEncoder;

    impl TokenEncoder for WordEncoder {
        fn name(&self) -> &str {
            "words"
        }

        fn count(&self, text: &str) -> u32 {
            text.split_whitespace().count() as u32
        }
    }

    fn words() -> TokenEstimator {
        TokenEstimator::new().with_encoder("", Arc::new(WordEncoder))
    }

    #[test]
    fn empty_text_is_zero_tokens() {
        let estimator = TokenEstimator::new();
        assert_eq!(estimator.count_text("", "gpt-4"), 0);
        assert_eq!(estimator.count_text("", "claude-3-opus"), 0);
    }

    #[test]
    fn gpt4_hello_world_is_a_few_tokens() {
        let n = TokenEstimator::new().count_text("Hello, world!", "gpt-4");
        assert!((1..=5).contains(&n), "got {n}");
    }

    #[test]
    fn unknown_model_uses_char_ratio() {
        let estimator = TokenEstimator::new();
        let encoder = estimator.encoder_for("claude-3-opus");
        assert_eq!(encoder.name(), "char-ratio");
        assert_eq!(estimator.count_text("abcdefgh", "claude-3-opus"), 2);
        assert_eq!(estimator.count_text("abc", "claude-3-opus"), 0);
    }

    #[test]
    fn char_ratio_counts_characters_not_bytes() {
        // Eight two-byte characters.
        assert_eq!(CharRatioEncoder.count("éééééééé"), 2);
    }

    #[test]
    fn preview_suffix_shares_base_encoding() {
        assert_eq!(normalize_model("gpt-4-1106-preview"), "gpt-4");
        assert_eq!(normalize_model("GPT-4-Vision-Preview"), "gpt-4-vision");
        let estimator = TokenEstimator::new();
        let text = "The quick brown fox jumps over the lazy dog.";
        assert_eq!(
            estimator.count_text(text, "gpt-4-1106-preview"),
            estimator.count_text(text, "gpt-4")
        );
    }

    #[test]
    fn encoders_are_memoized_per_model() {
        let estimator = TokenEstimator::new();
        let a = estimator.encoder_for("gpt-4");
        let b = estimator.encoder_for("gpt-4");
        assert!(Arc::ptr_eq(&a, &b));
        estimator.encoder_for("gpt-3.5-turbo");
        assert_eq!(estimator.cached_models(), 2);
    }

    #[test]
    fn concurrent_first_use_is_safe() {
        let estimator = TokenEstimator::new();
        let counts: Vec<u32> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| estimator.count_text("concurrent estimation", "gpt-4o")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(counts.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(estimator.cached_models(), 1);
    }

    #[test]
    fn custom_prefix_takes_priority() {
        let estimator = TokenEstimator::new().with_encoder("gpt-4", Arc::new(WordEncoder));
        assert_eq!(estimator.count_text("one two three", "gpt-4o"), 3);
        assert_eq!(estimator.encoder_for("gpt-3.5-turbo").name(), "tiktoken:gpt-3.5-turbo");
    }

    #[test]
    fn message_accounting_adds_framing() {
        let estimator = words();
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hello there").with_name("alice"),
        ];
        // system: 4 + role(1) + 2; user: 4 + role(1) + 2 + name(1); reply: 2
        assert_eq!(estimator.count_messages(&messages, "any"), 7 + 8 + 2);
    }

    #[test]
    fn non_text_parts_are_ignored() {
        let estimator = words();
        let messages = vec![ChatMessage::user(vec![
            ContentPart::text("describe this"),
            ContentPart::ImageUrl {
                image_url: serde_json::json!({"url": "https://example.com/a.png"}),
            },
        ])];
        assert_eq!(estimator.count_messages(&messages, "any"), 4 + 1 + 2 + 2);
    }

    #[test]
    fn empty_transcript_counts_reply_primer() {
        assert_eq!(words().count_messages(&[], "any"), REPLY_OVERHEAD_TOKENS);
        assert_eq!(TokenEstimator::new().count_messages(&[], "gpt-4"), 2);
    }

    #[test]
    fn estimate_dispatches_on_shape() {
        let estimator = words();
        assert_eq!(estimator.estimate(&Content::from("a b c"), "any"), 3);
        let chat = Content::from(vec![ChatMessage::user("a b c")]);
        assert_eq!(estimator.estimate(&chat, "any"), 4 + 1 + 3 + 2);
    }

    proptest! {
        #[test]
        fn estimation_is_deterministic(text in ".{0,200}", model in "(gpt-4|gpt-3.5-turbo|mystery-model)") {
            let estimator = TokenEstimator::new();
            let first = estimator.count_text(&text, &model);
            let second = estimator.count_text(&text, &model);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn char_ratio_never_exceeds_length(text in ".{0,400}") {
            let n = CharRatioEncoder.count(&text) as usize;
            prop_assert!(n <= text.chars().count());
        }
    }
}
