use crate::domain::model::{
    Classification, CrossTab, CrossTabRow, Dataset, GroupValue, GroupingSpec,
    CLASSIFICATION_FIELD,
};
use crate::utils::error::{EtlError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// The five pivots published alongside the raw data.
pub fn default_groupings() -> Vec<GroupingSpec> {
    vec![
        GroupingSpec::single("By Application Status", "application_status"),
        GroupingSpec::single("By Lead Type", "lead_type"),
        GroupingSpec::single("By UTM Source", "utm_source"),
        GroupingSpec::single("By Customer", "customer_name"),
        GroupingSpec::pair("By Cust & Lead Type", "customer_name", "lead_type"),
    ]
}

pub fn aggregate_all(dataset: &Dataset, specs: &[GroupingSpec]) -> Result<Vec<CrossTab>> {
    specs.iter().map(|spec| crosstab(dataset, spec)).collect()
}

/// Counts classifications per distinct key. Rows whose key has a null or
/// missing part are left out; every row carries all three counts.
pub fn crosstab(dataset: &Dataset, spec: &GroupingSpec) -> Result<CrossTab> {
    if spec.fields.is_empty() {
        return Err(EtlError::ProcessingError {
            message: format!("grouping '{}' has no fields", spec.title),
        });
    }

    let context = format!("dataset for '{}'", spec.title);
    dataset.require_column(CLASSIFICATION_FIELD, &context)?;
    for field in &spec.fields {
        dataset.require_column(field, &context)?;
    }

    let mut groups: BTreeMap<Vec<GroupValue>, [u64; 3]> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in dataset.records() {
        let key: Option<Vec<GroupValue>> = spec
            .fields
            .iter()
            .map(|field| GroupValue::from_value(record.get(field)))
            .collect();
        let Some(key) = key else {
            skipped += 1;
            continue;
        };

        let classification = record
            .get(CLASSIFICATION_FIELD)
            .and_then(Value::as_str)
            .and_then(Classification::from_label)
            .ok_or_else(|| EtlError::ProcessingError {
                message: format!("record without a valid classification in '{}'", spec.title),
            })?;

        groups.entry(key).or_insert([0; 3])[classification.index()] += 1;
    }

    if skipped > 0 {
        tracing::debug!(
            "{}: {} records with empty grouping values left out",
            spec.title,
            skipped
        );
    }

    Ok(CrossTab {
        title: spec.title.clone(),
        key_fields: spec.fields.clone(),
        rows: groups
            .into_iter()
            .map(|(key, counts)| CrossTabRow { key, counts })
            .collect(),
    })
}
