//! Category resolution: pick the wide columns that belong to a row's item.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::{Catalog, ItemCategory};
use crate::models::{NormalizedRecord, RawRecord};
use crate::schema::SourceSchema;

/// Literal the survey uses for "not available".
pub const NOT_AVAILABLE: &str = "NA";

/// Plain decimal number, optionally signed, optionally with an exponent.
static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("valid number pattern")
});

/// What the price cell of a candidate row holds.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceCell {
    /// No value column for the item, column missing from the file, or blank cell.
    Absent,
    /// The literal `NA`.
    NotAvailable,
    /// Text that is not a number.
    Invalid(String),
    Value(f64),
}

/// Classify price text. Surrounding whitespace is ignored.
pub fn classify_price(text: Option<&str>) -> PriceCell {
    let Some(text) = text.map(str::trim) else {
        return PriceCell::Absent;
    };

    if text.is_empty() {
        return PriceCell::Absent;
    }
    if text == NOT_AVAILABLE {
        return PriceCell::NotAvailable;
    }
    if !NUMBER.is_match(text) {
        return PriceCell::Invalid(text.to_string());
    }

    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => PriceCell::Value(value),
        _ => PriceCell::Invalid(text.to_string()),
    }
}

/// Why a candidate did not make it into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnmatchedItem,
    MissingPrice,
    NotAvailable,
    NonNumericPrice,
}

/// An expanded row after resolution, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub submission_id: String,
    pub user_id: String,
    pub submission_time: String,
    pub district: String,
    pub upazila: String,
    pub item_name: String,
    /// 0 when the token matched no category.
    pub item_code: u32,
    pub price: PriceCell,
    pub purchase_option: Option<String>,
    pub shop_type: Option<String>,
}

impl Candidate {
    pub fn is_matched(&self) -> bool {
        self.item_code != 0
    }

    /// Keep the candidate only if it names a known item with a numeric price.
    pub fn into_record(self) -> Result<NormalizedRecord, Rejection> {
        if !self.is_matched() {
            return Err(Rejection::UnmatchedItem);
        }

        let price = match self.price {
            PriceCell::Value(price) => price,
            PriceCell::Absent => return Err(Rejection::MissingPrice),
            PriceCell::NotAvailable => return Err(Rejection::NotAvailable),
            PriceCell::Invalid(_) => return Err(Rejection::NonNumericPrice),
        };

        Ok(NormalizedRecord {
            submission_id: self.submission_id,
            user_id: self.user_id,
            submission_time: self.submission_time,
            district: self.district,
            upazila: self.upazila,
            item_name: self.item_name,
            item_code: self.item_code,
            price,
            purchase_option: self.purchase_option,
            shop_type: self.shop_type,
        })
    }
}

/// Resolve a single-token row against the catalog.
///
/// The token is the row's items cell. Attributes are read only from the
/// matched category's own columns; an unmatched token resolves nothing.
pub fn resolve(row: &RawRecord, schema: &SourceSchema, catalog: &Catalog) -> Candidate {
    let item_name = row.value(&schema.items).to_string();
    let category = catalog.lookup(&item_name);

    let (item_code, price, purchase_option, shop_type) = match category {
        Some(category) => resolve_category(row, category),
        None => (0, PriceCell::Absent, None, None),
    };

    Candidate {
        submission_id: row.value(&schema.submission_id).to_string(),
        user_id: row.value(&schema.user_id).to_string(),
        submission_time: row.value(&schema.submission_time).to_string(),
        district: row.value(&schema.district).to_string(),
        upazila: row.value(&schema.upazila).to_string(),
        item_name,
        item_code,
        price,
        purchase_option,
        shop_type,
    }
}

fn resolve_category(
    row: &RawRecord,
    category: &ItemCategory,
) -> (u32, PriceCell, Option<String>, Option<String>) {
    let price = classify_price(cell(row, category.value_column.as_deref()));
    let purchase_option = text(row, category.purchase_option_column.as_deref());
    let shop_type = text(row, category.shop_type_column.as_deref());
    (category.code, price, purchase_option, shop_type)
}

fn cell<'a>(row: &'a RawRecord, column: Option<&str>) -> Option<&'a str> {
    column.and_then(|c| row.get(c))
}

fn text(row: &RawRecord, column: Option<&str>) -> Option<String> {
    cell(row, column)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(item: &str) -> RawRecord {
        RawRecord::new()
            .with("Submission ID", "3")
            .with("UserId", "u1")
            .with("Submission time", "2024-01-02")
            .with("DistrictName", "Khulna")
            .with("UpazilaName", "Dumuria")
            .with("Items to Choose", item)
            .with("Value - Rice", "52.5")
            .with("Rice Purchase Options", "Loose")
            .with("Type of Shop for Rice", "Retail")
            .with("Value - Eggs", "140")
            .with("Eggs Purchase Options", "Dozen")
            .with("Value - Onion", " 60 ")
            .with("Type of Shop for Onion", "Wet market")
            .with("Value - Flour", "NA")
            .with("Value - Salt", "forty")
            .with("Value - Sugar", "")
    }

    #[test]
    fn test_classify_price() {
        assert_eq!(classify_price(None), PriceCell::Absent);
        assert_eq!(classify_price(Some("  ")), PriceCell::Absent);
        assert_eq!(classify_price(Some("NA")), PriceCell::NotAvailable);
        assert_eq!(classify_price(Some(" NA ")), PriceCell::NotAvailable);
        assert_eq!(classify_price(Some("50")), PriceCell::Value(50.0));
        assert_eq!(classify_price(Some("-2.5")), PriceCell::Value(-2.5));
        assert_eq!(classify_price(Some(".5")), PriceCell::Value(0.5));
        assert_eq!(classify_price(Some("1e2")), PriceCell::Value(100.0));
        assert_eq!(
            classify_price(Some("50 taka")),
            PriceCell::Invalid("50 taka".into())
        );
        assert!(matches!(classify_price(Some("inf")), PriceCell::Invalid(_)));
        assert!(matches!(classify_price(Some("NaN")), PriceCell::Invalid(_)));
        assert!(matches!(classify_price(Some("1e999")), PriceCell::Invalid(_)));
    }

    #[test]
    fn test_resolves_own_columns_only() {
        let candidate = resolve(&row("Rice"), &SourceSchema::default(), &Catalog::builtin());

        assert_eq!(candidate.item_code, 1);
        assert_eq!(candidate.price, PriceCell::Value(52.5));
        assert_eq!(candidate.purchase_option.as_deref(), Some("Loose"));
        assert_eq!(candidate.shop_type.as_deref(), Some("Retail"));
        assert_eq!(candidate.district, "Khulna");
    }

    #[test]
    fn test_eggs_have_no_shop_type() {
        let candidate = resolve(&row("Eggs"), &SourceSchema::default(), &Catalog::builtin());
        let record = candidate.into_record().unwrap();

        assert_eq!(record.item_code, 7);
        assert_eq!(record.price, 140.0);
        assert_eq!(record.purchase_option.as_deref(), Some("Dozen"));
        assert_eq!(record.shop_type, None);
    }

    #[test]
    fn test_onion_has_no_purchase_option() {
        let candidate = resolve(&row("Onion"), &SourceSchema::default(), &Catalog::builtin());
        let record = candidate.into_record().unwrap();

        assert_eq!(record.item_code, 11);
        assert_eq!(record.price, 60.0);
        assert_eq!(record.purchase_option, None);
        assert_eq!(record.shop_type.as_deref(), Some("Wet market"));
    }

    #[test]
    fn test_unmatched_token() {
        let candidate = resolve(&row("Banana"), &SourceSchema::default(), &Catalog::builtin());

        assert_eq!(candidate.item_code, 0);
        assert_eq!(candidate.price, PriceCell::Absent);
        assert_eq!(candidate.purchase_option, None);
        assert_eq!(candidate.into_record(), Err(Rejection::UnmatchedItem));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let candidate = resolve(&row("rice"), &SourceSchema::default(), &Catalog::builtin());
        assert_eq!(candidate.item_code, 0);
    }

    #[test]
    fn test_rejections() {
        let schema = SourceSchema::default();
        let catalog = Catalog::builtin();
        let reject = |item: &str| resolve(&row(item), &schema, &catalog).into_record().unwrap_err();

        assert_eq!(reject("Flour"), Rejection::NotAvailable);
        assert_eq!(reject("Salt"), Rejection::NonNumericPrice);
        assert_eq!(reject("Sugar"), Rejection::MissingPrice);
        // Potato's value column is not in the row at all
        assert_eq!(reject("Potato"), Rejection::MissingPrice);
    }

    #[test]
    fn test_category_without_value_column() {
        let catalog = Catalog::new(vec![
            ItemCategory::new(1, "Rice").with_shop_type_column("Type of Shop for Rice"),
        ])
        .unwrap();
        let candidate = resolve(&row("Rice"), &SourceSchema::default(), &catalog);

        assert_eq!(candidate.item_code, 1);
        assert_eq!(candidate.price, PriceCell::Absent);
        assert_eq!(candidate.into_record(), Err(Rejection::MissingPrice));
    }
}
