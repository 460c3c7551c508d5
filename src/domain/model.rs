use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_date_order;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// Free-text column the classifier reads.
pub const RESPONSE_FIELD: &str = "last_clinician_response";
/// Column the classifier writes.
pub const CLASSIFICATION_FIELD: &str = "classification";

/// One row of query output. Field order follows the upstream column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.data.insert(field.into(), value);
    }
}

impl From<Map<String, Value>> for Record {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

/// Records sharing a schema. `columns` is the union of record fields in
/// first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.data.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, records }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// An empty dataset has no schema to check against, so it passes.
    pub fn require_column(&self, name: &str, context: &str) -> Result<()> {
        if self.is_empty() || self.has_column(name) {
            Ok(())
        } else {
            Err(EtlError::SchemaError {
                field: name.to_string(),
                context: context.to_string(),
            })
        }
    }

    /// Writes `name` on every record. A new column goes last; an existing
    /// one keeps its position.
    pub fn set_column<F>(&mut self, name: &str, mut value_for: F)
    where
        F: FnMut(&Record) -> Value,
    {
        for record in &mut self.records {
            let value = value_for(record);
            record.insert(name, value);
        }
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }

    /// Header row followed by one row per record, in column order.
    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        let mut rows = Vec::with_capacity(self.records.len() + 1);
        rows.push(
            self.columns
                .iter()
                .map(|c| Value::String(c.clone()))
                .collect(),
        );
        for record in &self.records {
            rows.push(
                self.columns
                    .iter()
                    .map(|c| to_cell(record.get(c)))
                    .collect(),
            );
        }
        rows
    }
}

/// Renders a field as a spreadsheet cell: nulls become blank, nested
/// values become compact JSON text.
pub fn to_cell(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) => Value::String(String::new()),
        Some(v @ (Value::Array(_) | Value::Object(_))) => Value::String(v.to_string()),
        Some(v) => v.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "Not Interested")]
    NotInterested,
    #[serde(rename = "Interested")]
    Interested,
    #[serde(rename = "Very Interested")]
    VeryInterested,
}

impl Classification {
    pub const ALL: [Classification; 3] = [
        Classification::NotInterested,
        Classification::Interested,
        Classification::VeryInterested,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::NotInterested => "Not Interested",
            Classification::Interested => "Interested",
            Classification::VeryInterested => "Very Interested",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named cross-tabulation request: one or two fields to group by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingSpec {
    pub title: String,
    pub fields: Vec<String>,
}

impl GroupingSpec {
    pub fn single(title: &str, field: &str) -> Self {
        Self {
            title: title.to_string(),
            fields: vec![field.to_string()],
        }
    }

    pub fn pair(title: &str, first: &str, second: &str) -> Self {
        Self {
            title: title.to_string(),
            fields: vec![first.to_string(), second.to_string()],
        }
    }
}

/// A non-null grouping value. Orders booleans before numbers before text.
#[derive(Debug, Clone)]
pub enum GroupValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl GroupValue {
    /// `None` for null or missing values; those rows fall out of the pivot.
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        match value? {
            Value::Null => None,
            Value::Bool(b) => Some(GroupValue::Bool(*b)),
            Value::Number(n) => Some(GroupValue::Number(n.clone())),
            Value::String(s) => Some(GroupValue::Text(s.clone())),
            other => Some(GroupValue::Text(other.to_string())),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            GroupValue::Bool(b) => Value::Bool(*b),
            GroupValue::Number(n) => Value::Number(n.clone()),
            GroupValue::Text(s) => Value::String(s.clone()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            GroupValue::Bool(_) => 0,
            GroupValue::Number(_) => 1,
            GroupValue::Text(_) => 2,
        }
    }
}

impl Ord for GroupValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (GroupValue::Bool(a), GroupValue::Bool(b)) => a.cmp(b),
            (GroupValue::Number(a), GroupValue::Number(b)) => compare_numbers(a, b),
            (GroupValue::Text(a), GroupValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

// 兩邊都是整數時精確比較，超過 2^53 的 id 不能走 f64
fn compare_numbers(a: &serde_json::Number, b: &serde_json::Number) -> Ordering {
    match (a.as_i64(), b.as_i64(), a.as_u64(), b.as_u64()) {
        (Some(x), Some(y), _, _) => x.cmp(&y),
        (_, _, Some(x), Some(y)) => x.cmp(&y),
        // 負數 i64 對上超出 i64 的 u64
        (Some(_), None, _, Some(_)) => Ordering::Less,
        (None, Some(_), Some(_), _) => Ordering::Greater,
        _ => {
            let x = a.as_f64().unwrap_or(f64::NAN);
            let y = b.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
    }
}

impl PartialOrd for GroupValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GroupValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupValue {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossTabRow {
    pub key: Vec<GroupValue>,
    pub counts: [u64; 3],
}

impl CrossTabRow {
    pub fn count(&self, classification: Classification) -> u64 {
        self.counts[classification.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Counts of each classification per group, one row per distinct key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossTab {
    pub title: String,
    pub key_fields: Vec<String>,
    pub rows: Vec<CrossTabRow>,
}

impl CrossTab {
    pub fn total(&self) -> u64 {
        self.rows.iter().map(CrossTabRow::total).sum()
    }

    pub fn column_count(&self) -> usize {
        self.key_fields.len() + Classification::ALL.len()
    }

    /// Header (key fields then classification labels) followed by the rows.
    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        let header = self
            .key_fields
            .iter()
            .map(|f| Value::String(f.clone()))
            .chain(
                Classification::ALL
                    .iter()
                    .map(|c| Value::String(c.as_str().to_string())),
            )
            .collect();

        std::iter::once(header)
            .chain(self.rows.iter().map(|row| {
                row.key
                    .iter()
                    .map(GroupValue::to_value)
                    .chain(row.counts.iter().map(|n| Value::from(*n)))
                    .collect()
            }))
            .collect()
    }
}

/// Inclusive calendar window passed to the query as `start_date`/`end_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        validate_date_order(start, end)?;
        Ok(Self { start, end })
    }

    /// `end` back to `end - lookback_days`.
    pub fn ending_on(end: NaiveDate, lookback_days: u32) -> Self {
        let start = end - chrono::Duration::days(i64::from(lookback_days));
        Self { start, end }
    }

    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start_param(), self.end_param())
    }
}

/// Everything a sink publishes for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub range: DateRange,
    pub dataset: Dataset,
    pub aggregations: Vec<CrossTab>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub destination: String,
    pub rows_written: usize,
    pub sheets_written: usize,
}
