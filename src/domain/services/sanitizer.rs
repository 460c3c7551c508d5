use crate::domain::model::Dataset;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::LazyLock;

// Control characters Sheets and XLSX reject inside a cell.
static ILLEGAL_CHARACTERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").expect("illegal character pattern is valid")
});

pub fn clean_str(text: &str) -> Cow<'_, str> {
    ILLEGAL_CHARACTERS.replace_all(text, "")
}

/// Strips illegal characters from strings; every other value passes through.
pub fn clean_value(value: &mut Value) {
    if let Value::String(text) = value {
        if let Cow::Owned(cleaned) = clean_str(text) {
            *text = cleaned;
        }
    }
}

pub fn sanitize_dataset(mut dataset: Dataset) -> Dataset {
    let mut cleaned = 0usize;
    for record in dataset.records_mut() {
        for value in record.data.values_mut() {
            let before = value.as_str().map(str::len);
            clean_value(value);
            if before != value.as_str().map(str::len) {
                cleaned += 1;
            }
        }
    }
    if cleaned > 0 {
        tracing::debug!("Removed illegal characters from {} cells", cleaned);
    }
    dataset
}
