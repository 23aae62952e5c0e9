//! Output ordering by submission and item code.

use serde::{Deserialize, Serialize};

use crate::models::NormalizedRecord;

/// How submission ids were compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdOrdering {
    /// Every id parsed as an integer.
    Numeric,
    /// At least one id is not an integer; ids compare as text.
    Lexicographic,
}

impl IdOrdering {
    pub fn detect<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        if ids.into_iter().all(|id| parse_id(id).is_some()) {
            IdOrdering::Numeric
        } else {
            IdOrdering::Lexicographic
        }
    }
}

fn parse_id(id: &str) -> Option<i128> {
    id.trim().parse().ok()
}

/// Stable sort by (submission id, item code). Equal keys keep input order.
pub fn sort_records(records: &mut [NormalizedRecord]) -> IdOrdering {
    let ordering = IdOrdering::detect(records.iter().map(|r| r.submission_id.as_str()));

    match ordering {
        IdOrdering::Numeric => {
            records.sort_by_key(|r| (parse_id(&r.submission_id).unwrap_or_default(), r.item_code))
        }
        IdOrdering::Lexicographic => records.sort_by(|a, b| {
            a.submission_id
                .cmp(&b.submission_id)
                .then(a.item_code.cmp(&b.item_code))
        }),
    }

    ordering
}
