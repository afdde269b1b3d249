//! Dimension values
//!
//! A dimension is an ordered list of labels (`bldg1`, `f2`, `cam`, ...). Floor
//! labels usually end in their floor number, which restrictions use to resolve
//! numeric floor references.

use crate::types::DimensionKind;
use serde::{Deserialize, Serialize};

/// A single value of a dimension
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionValue {
    /// Position in the configured list
    pub index: usize,
    /// Label substituted into topics
    pub label: String,
    /// Number taken from the trailing digits of the label, if any
    pub number: Option<u32>,
}

impl DimensionValue {
    /// Create a value, parsing the trailing number from the label
    pub fn new(index: usize, label: impl Into<String>) -> Self {
        let label = label.into();
        let number = trailing_number(&label);
        Self { index, label, number }
    }

    /// Whether the label ends with the given suffix
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.label.ends_with(suffix)
    }
}

fn trailing_number(label: &str) -> Option<u32> {
    let digits_start = label
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    label[digits_start..].parse().ok()
}

/// An ordered list of values for one dimension kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    /// Which dimension this is
    pub kind: DimensionKind,
    /// Values in configured order
    pub values: Vec<DimensionValue>,
}

impl Dimension {
    /// Build a dimension from its labels
    pub fn from_labels<S: AsRef<str>>(kind: DimensionKind, labels: &[S]) -> Self {
        let values = labels
            .iter()
            .enumerate()
            .map(|(index, label)| DimensionValue::new(index, label.as_ref()))
            .collect();
        Self { kind, values }
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the dimension has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Labels in configured order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|v| v.label.as_str())
    }

    /// First value whose trailing number equals `number`
    pub fn find_by_number(&self, number: u32) -> Option<&DimensionValue> {
        self.values.iter().find(|v| v.number == Some(number))
    }
}
