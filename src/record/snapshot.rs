//! Field extraction from candidate interval lines.
//!
//! A [`Snapshot`] is built from exactly one line and always covers one full
//! schema: any unparseable value or unexpected width rejects the whole line.

use std::collections::BTreeMap;

use thiserror::Error;

use super::classify::classify;
use super::schema::{Schema, TIMESTAMP_TOKENS};

/// Reasons a line does not produce a snapshot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("not an interval line")]
    NotCandidate,

    #[error("expected 2 timestamp tokens, got {count}")]
    MissingTimestamp { count: usize },

    #[error("value {index} is not a number: {token:?}")]
    InvalidNumber { index: usize, token: String },

    #[error("{count} values match no known schema")]
    UnknownWidth { count: usize },
}

/// One complete interval report, keyed by the fields of its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    schema: Schema,
    values: Vec<f64>,
}

impl Snapshot {
    /// Build a snapshot from an already-split candidate line.
    ///
    /// The first two tokens are the interval timestamp pair and are dropped.
    /// The remaining tokens map positionally onto the schema whose width
    /// equals their count.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ExtractError> {
        let raw = tokens
            .get(TIMESTAMP_TOKENS..)
            .ok_or(ExtractError::MissingTimestamp {
                count: tokens.len(),
            })?;

        let mut values = Vec::with_capacity(raw.len());
        for (index, token) in raw.iter().enumerate() {
            let token = token.as_ref();
            let value = token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ExtractError::InvalidNumber {
                    index,
                    token: token.to_string(),
                })?;
            values.push(value);
        }

        let schema = Schema::from_value_count(values.len()).ok_or(ExtractError::UnknownWidth {
            count: values.len(),
        })?;

        Ok(Self { schema, values })
    }

    /// Classify and extract a raw line in one step.
    pub fn from_line(line: &str) -> Result<Self, ExtractError> {
        classify(line).ok_or(ExtractError::NotCandidate)?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        Self::from_tokens(&tokens)
    }

    /// Schema this snapshot was matched against.
    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Values in schema field order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Look up a single field by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema
            .index_of(name)
            .and_then(|i| self.values.get(i).copied())
    }

    /// Iterate `(field, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.schema
            .fields()
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Number of fields, always equal to the schema width.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Never true for a snapshot produced by extraction.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy into an owned name-to-value map.
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        self.iter().collect()
    }
}
