//! Token accounting for the two encodings in play.
//!
//! Chat models and the embedding model tokenize differently, and each side
//! enforces its own input limit, so counts are always taken with the
//! encoding of the model that will receive the text.
//!
//! Counts are estimated from character length with an encoding-specific
//! characters-per-token ratio. For English text this lands within a few
//! percent of the real BPE count and errs on the high side.

/// A tokenizer vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Vocabulary of the gpt-4o chat family.
    O200kBase,
    /// Vocabulary of the text-embedding-3 family.
    Cl100kBase,
}

impl Encoding {
    /// Average characters per token.
    pub fn chars_per_token(self) -> f32 {
        match self {
            Encoding::O200kBase => 3.9,
            Encoding::Cl100kBase => 3.7,
        }
    }

    /// Estimate the token count of `text`.
    ///
    /// Empty text is zero tokens; any non-empty text is at least one.
    pub fn count(self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count();
        let estimated = (chars as f32 / self.chars_per_token()).ceil() as usize;
        estimated.max(1)
    }
}

/// Encoding used for everything sent to a chat model.
pub const CHAT_ENCODING: Encoding = Encoding::O200kBase;

/// Encoding used for everything sent to the embedding model.
pub const EMBED_ENCODING: Encoding = Encoding::Cl100kBase;

/// Token count of chat-bound text.
pub fn chat_token_count(text: &str) -> usize {
    CHAT_ENCODING.count(text)
}

/// Token count of embedding-bound text.
pub fn embed_token_count(text: &str) -> usize {
    EMBED_ENCODING.count(text)
}
