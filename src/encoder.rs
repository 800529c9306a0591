//! Label encoding of categorical columns.
//!
//! Each column gets its own vocabulary: the distinct labels observed in the
//! training data, sorted ascending. A label's code is its index in that
//! sorted list, so codes depend only on the set of labels and not on row
//! order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::EncodeError;

/// Maps the labels of a single column to integer codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    column: String,
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fits an encoder on every label observed in a column.
    pub fn fit<I, S>(column: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = labels
            .into_iter()
            .map(|label| label.as_ref().to_string())
            .collect();

        Self {
            column: column.into(),
            classes: classes.into_iter().collect(),
        }
    }

    /// Column this encoder was fitted on.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Known labels in code order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Returns the code for a label, failing on labels not seen during fit.
    pub fn transform(&self, label: &str) -> Result<usize, EncodeError> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(label))
            .map_err(|_| EncodeError::UnseenLabel {
                column: self.column.clone(),
                label: label.to_string(),
            })
    }
}

/// Column name → fitted encoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncoderTable {
    encoders: BTreeMap<String, LabelEncoder>,
}

impl EncoderTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the encoder for its column.
    pub fn insert(&mut self, encoder: LabelEncoder) {
        self.encoders.insert(encoder.column.clone(), encoder);
    }

    /// Returns the encoder for a column.
    pub fn get(&self, column: &str) -> Option<&LabelEncoder> {
        self.encoders.get(column)
    }

    /// Encodes a label of the given column.
    pub fn encode(&self, column: &str, label: &str) -> Result<usize, EncodeError> {
        self.get(column)
            .ok_or_else(|| EncodeError::UnknownColumn(column.to_string()))?
            .transform(label)
    }

    /// Iterates over encoders in column-name order.
    pub fn iter(&self) -> impl Iterator<Item = &LabelEncoder> {
        self.encoders.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_sorts_distinct_labels() {
        let encoder = LabelEncoder::fit("Diet", ["Vegan", "Keto", "Vegan", "Non-Vegetarian"]);
        assert_eq!(encoder.classes(), &["Keto", "Non-Vegetarian", "Vegan"]);
    }

    #[test]
    fn test_transform_returns_sorted_index() {
        let encoder = LabelEncoder::fit("Gender", ["Male", "Female", "Other", "Male"]);
        assert_eq!(encoder.transform("Female").unwrap(), 0);
        assert_eq!(encoder.transform("Male").unwrap(), 1);
        assert_eq!(encoder.transform("Other").unwrap(), 2);
    }

    #[test]
    fn test_codes_independent_of_row_order() {
        let a = LabelEncoder::fit("Goal", ["Endurance", "Weight Loss", "Muscle Gain"]);
        let b = LabelEncoder::fit("Goal", ["Muscle Gain", "Endurance", "Weight Loss"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_transform_unseen_label_fails() {
        let encoder = LabelEncoder::fit("Gender", ["Male", "Female"]);
        let err = encoder.transform("Other").unwrap_err();
        assert!(matches!(
            err,
            EncodeError::UnseenLabel { ref column, ref label } if column == "Gender" && label == "Other"
        ));
    }

    #[test]
    fn test_transform_is_exact_match() {
        let encoder = LabelEncoder::fit("Gender", ["Male", "Female"]);
        assert!(encoder.transform("male").is_err());
        assert!(encoder.transform("Male ").is_err());
    }

    #[test]
    fn test_table_encode_unknown_column() {
        let mut table = EncoderTable::new();
        table.insert(LabelEncoder::fit("Gender", ["Male"]));
        assert_eq!(table.encode("Gender", "Male").unwrap(), 0);
        assert!(matches!(
            table.encode("Diet", "Vegan"),
            Err(EncodeError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_table_json_is_column_keyed() {
        let mut table = EncoderTable::new();
        table.insert(LabelEncoder::fit("Gender", ["Male", "Female"]));
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["Gender"]["classes"][0], "Female");

        let restored: EncoderTable = serde_json::from_value(json).unwrap();
        assert_eq!(restored, table);
    }
}
