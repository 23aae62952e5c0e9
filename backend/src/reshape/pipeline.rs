//! High-level pipeline: survey export → normalized price rows.
//!
//! Combines parsing, header validation and the reshape, and reports every
//! step through the log broadcaster so the CLI and SSE clients can follow.
//!
//! # Example
//!
//! ```rust,ignore
//! use pricereshape::reshape::pipeline::{process_file, PipelineOptions};
//! use std::path::Path;
//!
//! let output = process_file(Path::new("survey.csv"), &PipelineOptions::default())?;
//! println!("{} records", output.records.len());
//! ```

use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use super::{IdOrdering, ReshapeOptions, ReshapeStats, Reshaper};
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::catalog::Catalog;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{NormalizedRecord, RawRecord};
use crate::parser::{parse_bytes_with, parse_csv_file, ParseResult};
use crate::schema::SourceSchema;

/// Rows between two progress log lines.
const PROGRESS_INTERVAL: usize = 5_000;

/// Options for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Force a delimiter instead of detecting it.
    pub delimiter: Option<char>,

    /// Catalog JSON file. Falls back to `PRICERESHAPE_CATALOG`, then the built-in table.
    pub catalog_path: Option<PathBuf>,

    /// Options passed to the reshape.
    pub reshape: ReshapeOptions,
}

/// Result of a complete pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Ordered normalized rows
    pub records: Vec<NormalizedRecord>,

    /// What happened to each row and token
    pub stats: ReshapeStats,

    /// How submission ids were ordered
    pub ordering: IdOrdering,

    /// CSV parsing metadata
    pub csv_info: CsvInfo,
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Reshape a survey export on disk.
pub fn process_file(path: &Path, options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    log_info(format!("📖 Reading {}...", path.display()));
    let parsed = parse_csv_file(path, options.delimiter).inspect_err(|e| log_error(e.to_string()))?;
    process_parsed(parsed, options)
}

/// Reshape an uploaded survey export.
pub fn process_bytes(bytes: &[u8], options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    log_info(format!("📖 Reading upload ({} bytes)...", bytes.len()));
    let parsed = parse_bytes_with(bytes, options.delimiter).inspect_err(|e| log_error(e.to_string()))?;
    process_parsed(parsed, options)
}

/// Reshape rows that were parsed elsewhere.
pub fn process_records(
    records: Vec<RawRecord>,
    headers: Vec<String>,
    options: &PipelineOptions,
) -> PipelineResult<PipelineOutput> {
    let parsed = ParseResult {
        records,
        encoding: "utf-8".to_string(),
        delimiter: ',',
        headers,
    };
    process_parsed(parsed, options)
}

/// Catalog selected by `options`: explicit file, then environment, then built-in.
pub fn load_catalog(options: &PipelineOptions) -> PipelineResult<Catalog> {
    let catalog = match &options.catalog_path {
        Some(path) => {
            log_info(format!("Using catalog file: {}", path.display()));
            Catalog::load(path)?
        }
        None => Catalog::from_env()?,
    };
    Ok(catalog)
}

fn process_parsed(parsed: ParseResult, options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!(
        "Read {} rows, {} columns",
        parsed.records.len(),
        parsed.headers.len()
    ));

    let csv_info = CsvInfo {
        encoding: parsed.encoding,
        delimiter: parsed.delimiter,
        headers: parsed.headers,
        row_count: parsed.records.len(),
    };

    let catalog = load_catalog(options)?;
    log_info(format!("🗂️  {} item categories", catalog.len()));

    let reshaper = Reshaper::new(catalog, SourceSchema::default(), options.reshape.clone());
    check_headers(&reshaper, &csv_info.headers)?;

    log_info("🔄 Reshaping to one row per submission and item...");
    let total = parsed.records.len();
    let outcome = reshaper
        .run_with_progress(&parsed.records, |done| {
            if done % PROGRESS_INTERVAL == 0 && done < total {
                log_info_indent(format!("{done}/{total} rows"), 1);
            }
            ControlFlow::Continue(())
        })
        .inspect_err(|e| log_error(e.to_string()))?;

    print_stats(&outcome.stats);
    log_info(format!("Submission ids ordered {}", ordering_label(outcome.ordering)));

    Ok(PipelineOutput {
        records: outcome.records,
        stats: outcome.stats,
        ordering: outcome.ordering,
        csv_info,
    })
}

fn check_headers(reshaper: &Reshaper, headers: &[String]) -> PipelineResult<()> {
    log_info("✔️  Checking required columns...");
    if let Err(err) = reshaper.schema().validate_headers(headers) {
        log_error(err.to_string());
        return Err(PipelineError::from(err));
    }
    log_success("All required columns present");

    let missing = reshaper
        .schema()
        .missing_category_columns(reshaper.catalog(), headers);
    if !missing.is_empty() {
        log_warning(format!(
            "{} item column(s) not in file, their values count as absent:",
            missing.len()
        ));
        for column in missing.iter().take(5) {
            log_info_indent(*column, 1);
        }
        if missing.len() > 5 {
            log_info_indent(format!("... +{}", missing.len() - 5), 1);
        }
    }
    Ok(())
}

fn print_stats(stats: &ReshapeStats) {
    log_success(stats.summary());

    if stats.incomplete_rows > 0 {
        log_warning(format!("{} incomplete rows skipped", stats.incomplete_rows));
    }
    if stats.duplicates > 0 {
        log_warning(format!("{} duplicate rows collapsed", stats.duplicates));
    }
    if stats.unmatched_items > 0 {
        log_warning(format!("{} unknown items dropped", stats.unmatched_items));
    }
    if stats.excluded_items > 0 {
        log_info(format!("{} items outside the item filter", stats.excluded_items));
    }
    let no_price = stats.missing_prices + stats.not_available_prices + stats.non_numeric_prices;
    if no_price > 0 {
        log_warning(format!(
            "{} items without a usable price (missing: {}, NA: {}, not a number: {})",
            no_price, stats.missing_prices, stats.not_available_prices, stats.non_numeric_prices
        ));
    }
}

fn ordering_label(ordering: IdOrdering) -> &'static str {
    match ordering {
        IdOrdering::Numeric => "numerically",
        IdOrdering::Lexicographic => "as text",
    }
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}
