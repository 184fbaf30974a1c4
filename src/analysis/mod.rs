//! Request dispatch and response interpretation
//!
//! [`AnalysisDispatcher`] sends the kind-specific prompt, [`normalize`] turns
//! the reply into a [`NormalizedResult`](crate::models::NormalizedResult), and
//! [`classify_sentiment`] derives the friendly / not-friendly badge.

pub mod dispatch;
pub mod normalize;
pub mod sentiment;

pub use dispatch::{AnalysisDispatcher, AnalysisPrompt};
pub use normalize::normalize;
pub use sentiment::{classify_sentiment, sentiment_of, Sentiment};
