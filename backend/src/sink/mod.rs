//! Output writers for normalized records.
//!
//! CSV rows follow [`OUTPUT_COLUMNS`]; absent optional values are empty cells.
//! JSON is an array of objects keyed by the same column names.

use csv::Writer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::error::{SinkError, SinkResult};
use crate::models::{NormalizedRecord, OUTPUT_COLUMNS};

/// Output format for normalized records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Csv => "text/csv; charset=utf-8",
            OutputFormat::Json => "application/json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{other}' (expected csv or json)")),
        }
    }
}

/// Write records as CSV with a header row.
pub fn write_csv<W: Write>(writer: W, records: &[NormalizedRecord]) -> SinkResult<W> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(OUTPUT_COLUMNS)?;

    for record in records {
        wtr.write_record(record.to_row())?;
    }

    wtr.into_inner().map_err(|e| SinkError::IoError(e.into_error()))
}

/// Records as a CSV document.
pub fn to_csv_string(records: &[NormalizedRecord]) -> SinkResult<String> {
    let data = write_csv(Vec::new(), records)?;
    Ok(String::from_utf8(data)?)
}

/// Records as a pretty-printed JSON array.
pub fn to_json_string(records: &[NormalizedRecord]) -> SinkResult<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Records rendered in `format`.
pub fn render(records: &[NormalizedRecord], format: OutputFormat) -> SinkResult<String> {
    match format {
        OutputFormat::Csv => to_csv_string(records),
        OutputFormat::Json => to_json_string(records),
    }
}
