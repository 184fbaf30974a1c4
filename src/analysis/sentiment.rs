use crate::models::NormalizedResult;
use serde::Serialize;

const POSITIVE_KEYWORDS: &[&str] = &[
    "friendly",
    "suitable",
    "accessible",
    "clear",
    "good contrast",
    "well-structured",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "challenging",
    "overwhelming",
    "low contrast",
    "complex",
    "ambiguous",
    "difficult",
    "confusing",
    "visually cluttered",
];

/// Keyword-based verdict shown next to a result. Heuristic only.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Sentiment {
    Friendly,
    NotFriendly,
    Neutral,
}

/// Negative keywords take precedence over positive ones.
pub fn classify_sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    if NEGATIVE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        Sentiment::NotFriendly
    } else if POSITIVE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        Sentiment::Friendly
    } else {
        Sentiment::Neutral
    }
}

pub fn sentiment_of(result: &NormalizedResult) -> Sentiment {
    classify_sentiment(result.overall())
}
