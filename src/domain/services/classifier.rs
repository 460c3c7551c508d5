//! Response triage.
//!
//! Keyword rules run before sentiment scoring: short replies such as "no"
//! or "stop" score unreliably against a general lexicon.
//!
//! Order (first match wins):
//! - missing, non-text or blank response: Not Interested
//! - any negative keyword: Not Interested
//! - any urgency keyword: Very Interested
//! - compound >= 0.6: Very Interested; compound <= -0.05: Not Interested
//! - otherwise: Interested

use crate::domain::model::{Classification, Dataset, CLASSIFICATION_FIELD, RESPONSE_FIELD};
use crate::domain::ports::SentimentScorer;
use crate::utils::error::Result;
use serde_json::Value;

const NEGATIVE_KEYWORDS: &[&str] = &["stop", "no", "not interested", "unsubscribe"];
const URGENCY_KEYWORDS: &[&str] = &[
    "asap",
    "urgent",
    "right away",
    "please",
    "definitely",
    "absolutely",
];

const VERY_INTERESTED_THRESHOLD: f64 = 0.6;
const NOT_INTERESTED_THRESHOLD: f64 = -0.05;

pub struct Classifier<S: SentimentScorer> {
    scorer: S,
}

impl<S: SentimentScorer> Classifier<S> {
    pub fn new(scorer: S) -> Self {
        Self { scorer }
    }

    pub fn classify_value(&self, value: Option<&Value>) -> Classification {
        match value {
            Some(Value::String(text)) => self.classify_text(text),
            _ => Classification::NotInterested,
        }
    }

    pub fn classify_text(&self, text: &str) -> Classification {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return Classification::NotInterested;
        }

        if NEGATIVE_KEYWORDS.iter().any(|kw| normalized.contains(kw)) {
            return Classification::NotInterested;
        }
        if URGENCY_KEYWORDS.iter().any(|kw| normalized.contains(kw)) {
            return Classification::VeryInterested;
        }

        classify_score(self.scorer.compound(&normalized))
    }

    /// Adds the `classification` column to every record.
    pub fn classify_dataset(&self, mut dataset: Dataset) -> Result<Dataset> {
        dataset.require_column(RESPONSE_FIELD, "query results")?;

        dataset.set_column(CLASSIFICATION_FIELD, |record| {
            let label = self.classify_value(record.get(RESPONSE_FIELD));
            Value::String(label.as_str().to_string())
        });

        Ok(dataset)
    }
}

pub fn classify_score(score: f64) -> Classification {
    if score >= VERY_INTERESTED_THRESHOLD {
        Classification::VeryInterested
    } else if score <= NOT_INTERESTED_THRESHOLD {
        Classification::NotInterested
    } else {
        Classification::Interested
    }
}
