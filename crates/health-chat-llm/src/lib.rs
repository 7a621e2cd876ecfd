//! LLM access for the patient chat.
//!
//! This crate provides the prompt templates, an OpenAI-compatible completion
//! and moderation client, and named entity extraction over patient messages
//! (through the LLM or an offline lexicon).

pub mod client;
pub mod extraction;
pub mod prompts;

pub use client::*;
pub use extraction::*;
pub use prompts::*;
