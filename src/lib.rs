//! NeuroCheck - neurodiversity-friendliness analysis of images and text
//!
//! Classifies and reads user content, sends it to a chat-completion service
//! with a schema-constrained prompt, and normalizes the loosely-typed reply
//! into a stable result.

pub mod ai;
pub mod analysis;
pub mod app;
pub mod content;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod readiness;

pub use error::{Error, Result};
