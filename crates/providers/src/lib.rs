//! Model provider implementations for Blossom.
//!
//! All providers implement the `blossom_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
