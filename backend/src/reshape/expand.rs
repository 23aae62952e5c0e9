//! Multi-valued field expansion ("separate rows").
//!
//! A cell such as `"Rice, Flour"` becomes two rows that are identical except
//! for that cell, which holds `"Rice"` and `"Flour"` respectively.

use crate::models::RawRecord;

/// Separator used by the survey's items column.
pub const ITEM_SEPARATOR: char = ',';

/// Trimmed, non-empty tokens of a delimited cell, in order.
///
/// Trimming is Unicode-aware, so non-breaking and other wide spaces go too.
pub fn split_tokens(value: &str, separator: char) -> impl Iterator<Item = &str> + '_ {
    value
        .split(separator)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// One copy of `record` per token of `column`, with `column` set to the token.
///
/// A blank or missing cell yields no rows at all.
pub fn separate_rows<'a>(
    record: &'a RawRecord,
    column: &'a str,
    separator: char,
) -> impl Iterator<Item = RawRecord> + 'a {
    split_tokens(record.value(column), separator).map(move |token| {
        let mut row = record.clone();
        row.insert(column, token);
        row
    })
}
