//! Domain models for survey rows.
//!
//! # Architecture
//!
//! ```text
//! Wide survey row (RawRecord)                         Long rows (NormalizedRecord)
//! ┌───────────────────────────────────────────┐      ┌─────────────────────────┐
//! │ Submission ID: 7                          │      │ 7, Rice,  1, 50, Retail │
//! │ Items to Choose: "Rice, Flour"            │  →   │ 7, Flour, 2, 40, ...    │
//! │ Value - Rice: 50   Value - Flour: 40 ...  │      └─────────────────────────┘
//! └───────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of the wide export: column name → cell text.
///
/// Columns are kept in a `BTreeMap` so that equality and hashing cover the
/// whole row, which is what deduplication keys on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    /// Cell text, `None` when the column is not part of this row.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Cell text, empty when the column is not part of this row.
    pub fn value(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy of this row restricted to `columns`. Columns the row lacks stay absent.
    pub fn project<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> RawRecord {
        columns
            .into_iter()
            .filter_map(|column| {
                self.fields
                    .get_key_value(column)
                    .map(|(k, v)| (k.clone(), v.clone()))
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Output column headers, in output order.
pub const OUTPUT_COLUMNS: [&str; 10] = [
    "Submission ID",
    "UserId",
    "Submission time",
    "DistrictName",
    "UpazilaName",
    "Items to Choose",
    "hasProduct",
    "Price",
    "Purchase Options",
    "ShopType",
];

/// One row of the long table: a single item reported by a single submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(rename = "Submission ID")]
    pub submission_id: String,

    #[serde(rename = "UserId")]
    pub user_id: String,

    #[serde(rename = "Submission time")]
    pub submission_time: String,

    #[serde(rename = "DistrictName")]
    pub district: String,

    #[serde(rename = "UpazilaName")]
    pub upazila: String,

    /// Trimmed item token.
    #[serde(rename = "Items to Choose")]
    pub item_name: String,

    /// Category code, never 0 in emitted records.
    #[serde(rename = "hasProduct")]
    pub item_code: u32,

    #[serde(rename = "Price")]
    pub price: f64,

    #[serde(rename = "Purchase Options")]
    pub purchase_option: Option<String>,

    #[serde(rename = "ShopType")]
    pub shop_type: Option<String>,
}

impl NormalizedRecord {
    /// Cells in [`OUTPUT_COLUMNS`] order. Absent values become empty cells.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.submission_id.clone(),
            self.user_id.clone(),
            self.submission_time.clone(),
            self.district.clone(),
            self.upazila.clone(),
            self.item_name.clone(),
            self.item_code.to_string(),
            format_price(self.price),
            self.purchase_option.clone().unwrap_or_default(),
            self.shop_type.clone().unwrap_or_default(),
        ]
    }
}

/// Render a price the way it was most likely typed: `50` rather than `50.0`.
pub fn format_price(price: f64) -> String {
    format!("{}", price)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NormalizedRecord {
        NormalizedRecord {
            submission_id: "12".into(),
            user_id: "u-3".into(),
            submission_time: "2024-05-01 10:00".into(),
            district: "Dhaka".into(),
            upazila: "Savar".into(),
            item_name: "Eggs".into(),
            item_code: 7,
            price: 145.5,
            purchase_option: Some("Dozen".into()),
            shop_type: None,
        }
    }

    #[test]
    fn test_project_keeps_only_listed_columns() {
        let record = RawRecord::new()
            .with("Submission ID", "1")
            .with("Noise", "x")
            .with("Value - Rice", "50");

        let projected = record.project(["Submission ID", "Value - Rice", "Value - Flour"]);

        assert_eq!(projected.len(), 2);
        assert_eq!(projected.get("Value - Rice"), Some("50"));
        assert!(!projected.contains("Noise"));
        assert!(!projected.contains("Value - Flour"));
    }

    #[test]
    fn test_value_defaults_to_empty() {
        let record = RawRecord::new().with("a", "1");
        assert_eq!(record.value("a"), "1");
        assert_eq!(record.value("b"), "");
        assert_eq!(record.get("b"), None);
    }

    #[test]
    fn test_to_row_matches_output_columns() {
        let row = sample().to_row();
        assert_eq!(row.len(), OUTPUT_COLUMNS.len());
        assert_eq!(row[5], "Eggs");
        assert_eq!(row[6], "7");
        assert_eq!(row[7], "145.5");
        assert_eq!(row[8], "Dozen");
        assert_eq!(row[9], "");
    }

    #[test]
    fn test_format_price_drops_trailing_zero() {
        assert_eq!(format_price(50.0), "50");
        assert_eq!(format_price(42.25), "42.25");
    }

    #[test]
    fn test_json_uses_output_headers() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["Submission ID"], "12");
        assert_eq!(json["hasProduct"], 7);
        assert_eq!(json["ShopType"], serde_json::Value::Null);
    }
}
