//! Source column schema and header validation.
//!
//! The export must carry five identity columns and the multi-valued items
//! column. Per-item columns are optional: a category whose column is missing
//! simply resolves to "absent" for that attribute.
//!
//! # Example
//!
//! ```rust,ignore
//! use pricereshape::schema::SourceSchema;
//!
//! let schema = SourceSchema::default();
//! let headers = vec!["Submission ID".to_string()];
//! let err = schema.validate_headers(&headers).unwrap_err();
//! assert!(err.missing.contains(&"DistrictName".to_string()));
//! ```

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::SchemaError;
use crate::models::RawRecord;

/// Header names of the required source columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSchema {
    pub submission_id: String,
    pub user_id: String,
    pub submission_time: String,
    pub district: String,
    pub upazila: String,
    /// Comma-separated list of chosen items.
    pub items: String,
}

impl Default for SourceSchema {
    fn default() -> Self {
        Self {
            submission_id: "Submission ID".to_string(),
            user_id: "UserId".to_string(),
            submission_time: "Submission time".to_string(),
            district: "DistrictName".to_string(),
            upazila: "UpazilaName".to_string(),
            items: "Items to Choose".to_string(),
        }
    }
}

impl SourceSchema {
    pub fn identity_columns(&self) -> [&str; 5] {
        [
            &self.submission_id,
            &self.user_id,
            &self.submission_time,
            &self.district,
            &self.upazila,
        ]
    }

    /// Identity columns followed by the items column.
    pub fn required_columns(&self) -> [&str; 6] {
        let [a, b, c, d, e] = self.identity_columns();
        [a, b, c, d, e, self.items.as_str()]
    }

    /// Every column a reshape reads: required columns, then catalog columns.
    pub fn projected_columns<'a>(&'a self, catalog: &'a Catalog) -> Vec<&'a str> {
        let mut columns: Vec<&str> = self.required_columns().to_vec();
        for column in catalog.columns() {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }

    /// Check that `headers` contain every required column.
    pub fn validate_headers(&self, headers: &[String]) -> Result<(), SchemaError> {
        self.check(|column| headers.iter().any(|h| h == column))
    }

    /// Check that a single row carries every required column.
    pub fn validate_record(&self, record: &RawRecord) -> Result<(), SchemaError> {
        self.check(|column| record.contains(column))
    }

    fn check(&self, present: impl Fn(&str) -> bool) -> Result<(), SchemaError> {
        let missing: Vec<String> = self
            .required_columns()
            .into_iter()
            .filter(|column| !present(*column))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError { missing })
        }
    }

    /// Catalog columns absent from `headers`. Not an error, but worth a warning.
    pub fn missing_category_columns<'a>(
        &self,
        catalog: &'a Catalog,
        headers: &[String],
    ) -> Vec<&'a str> {
        catalog
            .columns()
            .into_iter()
            .filter(|column| !headers.iter().any(|h| h == column))
            .collect()
    }

    /// Fields a row must fill to count as complete. The user id may be blank.
    pub fn completeness_columns(&self) -> [&str; 5] {
        [
            self.submission_id.as_str(),
            self.submission_time.as_str(),
            self.district.as_str(),
            self.upazila.as_str(),
            self.items.as_str(),
        ]
    }

    /// True when none of the [`completeness_columns`](Self::completeness_columns)
    /// is blank. Whitespace-only cells count as blank.
    pub fn is_complete(&self, record: &RawRecord) -> bool {
        self.completeness_columns()
            .into_iter()
            .all(|column| !record.value(column).trim().is_empty())
    }
}
