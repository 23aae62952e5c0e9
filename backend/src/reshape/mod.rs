//! Wide-to-long reshaping of survey rows.
//!
//! ```text
//! RawRecord ─▶ project ─▶ separate rows ─▶ (dedup) ─▶ resolve ─▶ filter ─▶ sort ─▶ NormalizedRecord
//! ```
//!
//! - `expand`: the reusable "separate rows" primitive
//! - `resolve`: category lookup and price classification
//! - `order`: submission id ordering
//! - `pipeline`: file/bytes → records, with logging
//!
//! The reshape itself is pure: no I/O, no logging, no shared state.
//!
//! # Example
//!
//! ```rust,ignore
//! use pricereshape::{reshape, RawRecord};
//!
//! let row = RawRecord::new()
//!     .with("Submission ID", "1")
//!     .with("UserId", "u1")
//!     .with("Submission time", "2024-03-01")
//!     .with("DistrictName", "Dhaka")
//!     .with("UpazilaName", "Savar")
//!     .with("Items to Choose", "Rice, Flour")
//!     .with("Value - Rice", "50")
//!     .with("Value - Flour", "40");
//!
//! let records = reshape(&[row])?;
//! assert_eq!(records.len(), 2);
//! ```

pub mod expand;
pub mod order;
pub mod pipeline;
pub mod resolve;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::ControlFlow;

use crate::catalog::Catalog;
use crate::error::{ReshapeError, ReshapeResult};
use crate::models::{NormalizedRecord, RawRecord};
use crate::schema::SourceSchema;

pub use expand::{separate_rows, split_tokens, ITEM_SEPARATOR};
pub use order::{sort_records, IdOrdering};
pub use resolve::{classify_price, resolve, Candidate, PriceCell, Rejection};

/// Options for a reshape run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReshapeOptions {
    /// Collapse expanded rows whose identity, token and values repeat.
    pub dedup: bool,

    /// Drop input rows with a blank submission id, time, district, upazila or
    /// items field before expansion. A blank user id is allowed.
    pub skip_incomplete: bool,

    /// Only emit these items (by category name). Empty means all.
    pub items: Vec<String>,
}

/// Counters describing what happened to each input row and token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReshapeStats {
    pub input_rows: usize,
    pub incomplete_rows: usize,
    pub tokens: usize,
    pub duplicates: usize,
    pub unmatched_items: usize,
    pub excluded_items: usize,
    pub missing_prices: usize,
    pub not_available_prices: usize,
    pub non_numeric_prices: usize,
    pub emitted: usize,
}

impl ReshapeStats {
    fn reject(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::UnmatchedItem => self.unmatched_items += 1,
            Rejection::MissingPrice => self.missing_prices += 1,
            Rejection::NotAvailable => self.not_available_prices += 1,
            Rejection::NonNumericPrice => self.non_numeric_prices += 1,
        }
    }

    /// Tokens that did not become output rows.
    pub fn dropped(&self) -> usize {
        self.tokens - self.emitted
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows → {} items → {} records ({} dropped)",
            self.input_rows,
            self.tokens,
            self.emitted,
            self.dropped()
        )
    }
}

/// Result of a reshape run.
#[derive(Debug, Clone)]
pub struct ReshapeOutcome {
    /// Sorted output rows.
    pub records: Vec<NormalizedRecord>,
    pub stats: ReshapeStats,
    /// How submission ids were compared while sorting.
    pub ordering: IdOrdering,
}

/// Reshaper configured with a catalog, a source schema and options.
#[derive(Debug, Clone, Default)]
pub struct Reshaper {
    catalog: Catalog,
    schema: SourceSchema,
    options: ReshapeOptions,
}

impl Reshaper {
    pub fn new(catalog: Catalog, schema: SourceSchema, options: ReshapeOptions) -> Self {
        Self {
            catalog,
            schema,
            options,
        }
    }

    /// Built-in catalog and default schema with the given options.
    pub fn with_options(options: ReshapeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    pub fn options(&self) -> &ReshapeOptions {
        &self.options
    }

    /// Reshape parsed rows whose header is known up front.
    ///
    /// The header is checked even when there are no rows.
    pub fn run_with_headers(
        &self,
        headers: &[String],
        rows: &[RawRecord],
    ) -> ReshapeResult<ReshapeOutcome> {
        self.schema.validate_headers(headers)?;
        self.run(rows)
    }

    /// Reshape rows. Every row must carry the required columns.
    pub fn run(&self, rows: &[RawRecord]) -> ReshapeResult<ReshapeOutcome> {
        self.run_with_progress(rows, |_| ControlFlow::Continue(()))
    }

    /// Reshape rows, reporting the number of processed input rows after each one.
    ///
    /// Returning `ControlFlow::Break` from `progress` stops the run with
    /// [`ReshapeError::Cancelled`]; nothing is emitted.
    pub fn run_with_progress<F>(
        &self,
        rows: &[RawRecord],
        mut progress: F,
    ) -> ReshapeResult<ReshapeOutcome>
    where
        F: FnMut(usize) -> ControlFlow<()>,
    {
        for row in rows {
            self.schema.validate_record(row)?;
        }
        let allowed = self.allowed_codes()?;
        let columns = self.schema.projected_columns(&self.catalog);

        let mut stats = ReshapeStats::default();
        let mut seen: HashSet<RawRecord> = HashSet::new();
        let mut records = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            stats.input_rows += 1;

            if self.options.skip_incomplete && !self.schema.is_complete(row) {
                stats.incomplete_rows += 1;
            } else {
                let projected = row.project(columns.iter().copied());

                for expanded in separate_rows(&projected, &self.schema.items, ITEM_SEPARATOR) {
                    stats.tokens += 1;

                    if self.options.dedup && !seen.insert(expanded.clone()) {
                        stats.duplicates += 1;
                        continue;
                    }

                    let candidate = resolve(&expanded, &self.schema, &self.catalog);

                    if let Some(allowed) = &allowed {
                        if candidate.is_matched() && !allowed.contains(&candidate.item_code) {
                            stats.excluded_items += 1;
                            continue;
                        }
                    }

                    match candidate.into_record() {
                        Ok(record) => records.push(record),
                        Err(rejection) => stats.reject(rejection),
                    }
                }
            }

            if progress(index + 1).is_break() {
                return Err(ReshapeError::Cancelled {
                    processed: index + 1,
                });
            }
        }

        let ordering = sort_records(&mut records);
        stats.emitted = records.len();

        Ok(ReshapeOutcome {
            records,
            stats,
            ordering,
        })
    }

    /// Codes admitted by the item filter, `None` when every item is admitted.
    fn allowed_codes(&self) -> ReshapeResult<Option<HashSet<u32>>> {
        if self.options.items.is_empty() {
            return Ok(None);
        }

        self.options
            .items
            .iter()
            .map(|name| {
                self.catalog
                    .lookup(name.trim())
                    .map(|c| c.code)
                    .ok_or_else(|| ReshapeError::UnknownItem(name.clone()))
            })
            .collect::<ReshapeResult<HashSet<u32>>>()
            .map(Some)
    }
}

/// Reshape rows with the built-in catalog, default schema and default options.
pub fn reshape(rows: &[RawRecord]) -> ReshapeResult<Vec<NormalizedRecord>> {
    Reshaper::default().run(rows).map(|outcome| outcome.records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;

    fn row(id: &str, items: &str, values: &[(&str, &str)]) -> RawRecord {
        let mut record = RawRecord::new()
            .with("Submission ID", id)
            .with("UserId", format!("user-{id}"))
            .with("Submission time", "2024-03-01 09:00")
            .with("DistrictName", "Dhaka")
            .with("UpazilaName", "Savar")
            .with("Items to Choose", items);
        for (column, value) in values {
            record.insert(*column, *value);
        }
        record
    }

    fn items_and_prices(records: &[NormalizedRecord]) -> Vec<(String, u32, f64)> {
        records
            .iter()
            .map(|r| (r.item_name.clone(), r.item_code, r.price))
            .collect()
    }

    #[test]
    fn test_two_items_one_row_each() {
        let input = row(
            "1",
            "Rice, Flour",
            &[("Value - Rice", "50"), ("Value - Flour", "40")],
        );
        let records = reshape(&[input]).unwrap();

        assert_eq!(
            items_and_prices(&records),
            vec![("Rice".into(), 1, 50.0), ("Flour".into(), 2, 40.0)]
        );
        assert!(records.iter().all(|r| r.submission_id == "1"));
    }

    #[test]
    fn test_items_sorted_by_code() {
        let input = row(
            "1",
            "Onion, Rice, Eggs",
            &[("Value - Rice", "50"), ("Value - Eggs", "130"), ("Value - Onion", "70")],
        );
        let codes: Vec<u32> = reshape(&[input]).unwrap().iter().map(|r| r.item_code).collect();
        assert_eq!(codes, vec![1, 7, 11]);
    }

    #[test]
    fn test_unknown_item_dropped() {
        let input = row("1", "Banana", &[("Value - Rice", "50")]);
        assert!(reshape(&[input]).unwrap().is_empty());
    }

    #[test]
    fn test_na_price_dropped() {
        let input = row("1", "Rice", &[("Value - Rice", "NA")]);
        assert!(reshape(&[input]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_district_column_is_schema_error() {
        let mut input = RawRecord::new();
        for (column, value) in [
            ("Submission ID", "1"),
            ("UserId", "u"),
            ("Submission time", "t"),
            ("UpazilaName", "Savar"),
            ("Items to Choose", "Rice"),
            ("Value - Rice", "50"),
        ] {
            input.insert(column, value);
        }
        let valid = row("2", "Rice", &[("Value - Rice", "50")]);

        let err = reshape(&[valid, input]).unwrap_err();
        match err {
            ReshapeError::Schema(SchemaError { missing }) => {
                assert_eq!(missing, vec!["DistrictName".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_headers_checked_without_rows() {
        let reshaper = Reshaper::default();
        let headers = vec!["Submission ID".to_string(), "UserId".to_string()];
        assert!(matches!(
            reshaper.run_with_headers(&headers, &[]),
            Err(ReshapeError::Schema(_))
        ));
    }

    #[test]
    fn test_blank_items_yield_nothing() {
        let rows = [
            row("1", "", &[("Value - Rice", "50")]),
            row("2", "   ", &[("Value - Rice", "50")]),
        ];
        let outcome = Reshaper::default().run(&rows).unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats.tokens, 0);
        assert_eq!(outcome.stats.input_rows, 2);
    }

    #[test]
    fn test_repeated_item_kept_twice_without_dedup() {
        let input = row("1", "Rice, Rice", &[("Value - Rice", "50")]);
        let records = reshape(&[input]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].item_code, records[1].item_code);
    }

    #[test]
    fn test_repeated_item_collapsed_with_dedup() {
        let input = row("1", "Rice, Rice", &[("Value - Rice", "50")]);
        let reshaper = Reshaper::with_options(ReshapeOptions {
            dedup: true,
            ..Default::default()
        });
        let outcome = reshaper.run(&[input.clone(), input]).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.stats.duplicates, 3);
    }

    #[test]
    fn test_dedup_ignores_unprojected_columns() {
        let a = row("1", "Rice", &[("Value - Rice", "50"), ("Comment", "first")]);
        let b = row("1", "Rice", &[("Value - Rice", "50"), ("Comment", "second")]);
        let reshaper = Reshaper::with_options(ReshapeOptions {
            dedup: true,
            ..Default::default()
        });
        assert_eq!(reshaper.run(&[a, b]).unwrap().records.len(), 1);
    }

    #[test]
    fn test_dedup_keeps_different_values() {
        let a = row("1", "Rice", &[("Value - Rice", "50")]);
        let b = row("1", "Rice", &[("Value - Rice", "55")]);
        let reshaper = Reshaper::with_options(ReshapeOptions {
            dedup: true,
            ..Default::default()
        });
        assert_eq!(reshaper.run(&[a, b]).unwrap().records.len(), 2);
    }

    #[test]
    fn test_output_ordering_property() {
        let rows = [
            row("12", "Potato, Rice", &[("Value - Rice", "50"), ("Value - Potato", "30")]),
            row("3", "Sugar, Flour", &[("Value - Sugar", "120"), ("Value - Flour", "45")]),
            row("12", "Flour", &[("Value - Flour", "44")]),
            row("7", "Green Chilli", &[("Value - Green Chilli", "200")]),
        ];
        let records = reshape(&rows).unwrap();
        assert_eq!(records.len(), 6);

        for pair in records.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let (ia, ib): (i64, i64) = (a.submission_id.parse().unwrap(), b.submission_id.parse().unwrap());
            assert!(ia < ib || (ia == ib && a.item_code <= b.item_code));
        }
        assert_eq!(records[0].submission_id, "3");
        assert_eq!(records.last().unwrap().submission_id, "12");
    }

    #[test]
    fn test_each_valid_token_appears_once() {
        let input = row(
            "5",
            "Rice, Banana, Salt, Eggs, Onion",
            &[
                ("Value - Rice", "50"),
                ("Value - Salt", "NA"),
                ("Value - Eggs", "12x"),
                ("Value - Onion", "65"),
            ],
        );
        let outcome = Reshaper::default().run(&[input]).unwrap();
        let names: Vec<&str> = outcome.records.iter().map(|r| r.item_name.as_str()).collect();

        assert_eq!(names, vec!["Rice", "Onion"]);
        assert_eq!(outcome.stats.tokens, 5);
        assert_eq!(outcome.stats.unmatched_items, 1);
        assert_eq!(outcome.stats.not_available_prices, 1);
        assert_eq!(outcome.stats.non_numeric_prices, 1);
        assert_eq!(outcome.stats.emitted, 2);
        assert_eq!(outcome.stats.dropped(), 3);
    }

    #[test]
    fn test_reshape_is_idempotent_on_its_output() {
        let catalog = Catalog::builtin();
        let rows = [
            row("2", "Rice, Eggs, Onion", &[
                ("Value - Rice", "50"),
                ("Rice Purchase Options", "Loose"),
                ("Type of Shop for Rice", "Retail"),
                ("Value - Eggs", "140"),
                ("Value - Onion", "70"),
            ]),
            row("1", "Flour", &[("Value - Flour", "40")]),
        ];
        let first = reshape(&rows).unwrap();

        let again: Vec<RawRecord> = first
            .iter()
            .map(|r| {
                let category = catalog.lookup(&r.item_name).unwrap();
                let mut raw = row(&r.submission_id, &r.item_name, &[]);
                if let Some(column) = &category.value_column {
                    raw.insert(column.as_str(), r.price.to_string());
                }
                if let (Some(column), Some(value)) = (&category.purchase_option_column, &r.purchase_option) {
                    raw.insert(column.as_str(), value.as_str());
                }
                if let (Some(column), Some(value)) = (&category.shop_type_column, &r.shop_type) {
                    raw.insert(column.as_str(), value.as_str());
                }
                raw
            })
            .collect();

        assert_eq!(reshape(&again).unwrap(), first);
    }

    #[test]
    fn test_skip_incomplete() {
        let rows = [
            row("1", "Rice", &[("Value - Rice", "50")]),
            row("", "Rice", &[("Value - Rice", "50")]),
        ];

        assert_eq!(reshape(&rows).unwrap().len(), 2);

        let reshaper = Reshaper::with_options(ReshapeOptions {
            skip_incomplete: true,
            ..Default::default()
        });
        let outcome = reshaper.run(&rows).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.stats.incomplete_rows, 1);
    }

    #[test]
    fn test_skip_incomplete_keeps_blank_user_id() {
        let input = row("1", "Rice", &[("Value - Rice", "50")]).with("UserId", "");
        let reshaper = Reshaper::with_options(ReshapeOptions {
            skip_incomplete: true,
            ..Default::default()
        });
        let outcome = reshaper.run(&[input]).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].user_id, "");
        assert_eq!(outcome.stats.incomplete_rows, 0);
    }

    #[test]
    fn test_item_filter() {
        let input = row(
            "1",
            "Rice, Flour, Banana",
            &[("Value - Rice", "50"), ("Value - Flour", "40")],
        );
        let reshaper = Reshaper::with_options(ReshapeOptions {
            items: vec!["Rice".into()],
            ..Default::default()
        });
        let outcome = reshaper.run(&[input]).unwrap();

        assert_eq!(items_and_prices(&outcome.records), vec![("Rice".into(), 1, 50.0)]);
        assert_eq!(outcome.stats.excluded_items, 1);
        assert_eq!(outcome.stats.unmatched_items, 1);
    }

    #[test]
    fn test_unknown_item_in_filter_is_error() {
        let reshaper = Reshaper::with_options(ReshapeOptions {
            items: vec!["Banana".into()],
            ..Default::default()
        });
        let input = row("1", "Rice", &[("Value - Rice", "50")]);
        assert!(matches!(
            reshaper.run(&[input]),
            Err(ReshapeError::UnknownItem(name)) if name == "Banana"
        ));
    }

    #[test]
    fn test_progress_reports_and_cancels() {
        let rows: Vec<RawRecord> = (1..=5)
            .map(|i| row(&i.to_string(), "Rice", &[("Value - Rice", "50")]))
            .collect();
        let reshaper = Reshaper::default();

        let mut seen = Vec::new();
        let outcome = reshaper
            .run_with_progress(&rows, |n| {
                seen.push(n);
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(outcome.records.len(), 5);

        let result = reshaper.run_with_progress(&rows, |n| {
            if n == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert!(matches!(result, Err(ReshapeError::Cancelled { processed: 2 })));
    }

    #[test]
    fn test_custom_catalog_and_schema() {
        let catalog = Catalog::new(vec![
            crate::catalog::ItemCategory::new(3, "Fish").with_value_column("Fish price"),
            crate::catalog::ItemCategory::new(1, "Tea").with_value_column("Tea price"),
        ])
        .unwrap();
        let schema = SourceSchema {
            submission_id: "id".into(),
            user_id: "user".into(),
            submission_time: "time".into(),
            district: "district".into(),
            upazila: "upazila".into(),
            items: "items".into(),
        };
        let input: RawRecord = [
            ("id", "A1"),
            ("user", "u"),
            ("time", "t"),
            ("district", "d"),
            ("upazila", "p"),
            ("items", "Fish, Tea"),
            ("Fish price", "300"),
            ("Tea price", "20"),
        ]
        .into_iter()
        .collect();

        let outcome = Reshaper::new(catalog, schema, ReshapeOptions::default())
            .run(&[input])
            .unwrap();

        assert_eq!(outcome.ordering, IdOrdering::Lexicographic);
        assert_eq!(
            items_and_prices(&outcome.records),
            vec![("Tea".into(), 1, 20.0), ("Fish".into(), 3, 300.0)]
        );
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ReshapeOptions = serde_json::from_str(r#"{"dedup": true}"#).unwrap();
        assert!(options.dedup);
        assert!(!options.skip_incomplete);
        assert!(options.items.is_empty());
    }
}
