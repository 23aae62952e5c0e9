//! Item category registry.
//!
//! Maps each item name that may appear in `Items to Choose` to its legacy
//! product code and to the wide columns holding its price, purchase option and
//! shop type. The built-in table reproduces the survey's column layout,
//! including the categories that lack a purchase-option or shop-type column.
//!
//! A catalog can also be loaded from JSON so a survey with a different item
//! list needs no code change:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "items": [
//!     { "code": 1, "name": "Rice", "value_column": "Value - Rice",
//!       "purchase_option_column": "Rice Purchase Options",
//!       "shop_type_column": "Type of Shop for Rice" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{CatalogError, CatalogResult};

/// Environment variable naming a catalog JSON file.
pub const CATALOG_ENV: &str = "PRICERESHAPE_CATALOG";

/// (code, name, value column, purchase-option column, shop-type column)
type CategoryRow = (
    u32,
    &'static str,
    Option<&'static str>,
    Option<&'static str>,
    Option<&'static str>,
);

const BUILTIN: [CategoryRow; 12] = [
    (1, "Rice", Some("Value - Rice"), Some("Rice Purchase Options"), Some("Type of Shop for Rice")),
    (2, "Flour", Some("Value - Flour"), Some("Flour Purchase Options"), Some("Type of Shop for Flour")),
    (3, "Lentil", Some("Value - Lentil"), Some("Lentils Purchase Options"), Some("Type of Shop for Lentils")),
    (4, "Soybean Oil", Some("Value - Soybean Oil"), Some("Soybean Oil Purchase Options"), Some("Type of Shop for Soybean Oil")),
    (5, "Salt", Some("Value - Salt"), Some("Salt Purchase Options"), Some("Type of Shop for Salt")),
    (6, "Sugar", Some("Value - Sugar"), Some("Sugar Purchase Options"), Some("Type of Shop for Sugar")),
    (7, "Eggs", Some("Value - Eggs"), Some("Eggs Purchase Options"), None),
    (8, "Chicken", Some("Value - Chicken"), Some("Chicken Purchase Options"), Some("Type of Shop for Chicken")),
    (9, "Potato", Some("Value - Potato"), Some("Potato Purchase Options"), Some("Type of Shop for Potato")),
    (10, "Eggplant", Some("Value - Eggplant"), None, Some("Type of Shop for Eggplant")),
    (11, "Onion", Some("Value - Onion"), None, Some("Type of Shop for Onion")),
    (12, "Green Chilli", Some("Value - Green Chilli"), None, Some("Type of Shop for Green Chilli")),
];

/// One commodity the survey asks about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCategory {
    /// Legacy product code, used for ordering. 0 is reserved for "unmatched".
    pub code: u32,

    /// Name as it appears in `Items to Choose` (matched case-sensitively).
    pub name: String,

    /// Column holding the price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_column: Option<String>,

    /// Column holding the purchase option.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_option_column: Option<String>,

    /// Column holding the shop type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_type_column: Option<String>,
}

impl ItemCategory {
    pub fn new(code: u32, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            value_column: None,
            purchase_option_column: None,
            shop_type_column: None,
        }
    }

    pub fn with_value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = Some(column.into());
        self
    }

    pub fn with_purchase_option_column(mut self, column: impl Into<String>) -> Self {
        self.purchase_option_column = Some(column.into());
        self
    }

    pub fn with_shop_type_column(mut self, column: impl Into<String>) -> Self {
        self.shop_type_column = Some(column.into());
        self
    }

    /// Every wide column this category reads.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        [
            self.value_column.as_deref(),
            self.purchase_option_column.as_deref(),
            self.shop_type_column.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// On-disk catalog format.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default = "default_version")]
    version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,

    items: Vec<ItemCategory>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Ordered set of categories with O(1) lookup by name.
#[derive(Debug, Clone)]
pub struct Catalog {
    categories: Vec<ItemCategory>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate names/codes, blank names and code 0.
    pub fn new(categories: Vec<ItemCategory>) -> CatalogResult<Self> {
        let mut codes = HashSet::new();
        let mut names = HashSet::new();

        for category in &categories {
            let name = category.name.trim();
            if name.is_empty() {
                return Err(CatalogError::EmptyName(category.code));
            }
            if category.code == 0 {
                return Err(CatalogError::ReservedCode(category.name.clone()));
            }
            if !codes.insert(category.code) {
                return Err(CatalogError::DuplicateCode(category.code));
            }
            if !names.insert(name.to_string()) {
                return Err(CatalogError::DuplicateName(category.name.clone()));
            }
        }

        Ok(Self::indexed(categories))
    }

    /// The survey's built-in twelve categories.
    pub fn builtin() -> Self {
        let categories = BUILTIN
            .iter()
            .map(|&(code, name, value, purchase, shop)| ItemCategory {
                code,
                name: name.to_string(),
                value_column: value.map(str::to_string),
                purchase_option_column: purchase.map(str::to_string),
                shop_type_column: shop.map(str::to_string),
            })
            .collect();
        Self::indexed(categories)
    }

    fn indexed(categories: Vec<ItemCategory>) -> Self {
        let by_name = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.trim().to_string(), i))
            .collect();
        Self { categories, by_name }
    }

    /// Category whose name equals `token` exactly.
    pub fn lookup(&self, token: &str) -> Option<&ItemCategory> {
        self.by_name.get(token).map(|&i| &self.categories[i])
    }

    pub fn categories(&self) -> &[ItemCategory] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// All wide columns referenced by any category, first occurrence order.
    pub fn columns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.categories
            .iter()
            .flat_map(ItemCategory::columns)
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Parse a catalog from JSON.
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.items)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> CatalogResult<String> {
        let file = CatalogFile {
            version: default_version(),
            description: String::new(),
            items: self.categories.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Load a catalog JSON file.
    pub fn load(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Write this catalog as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> CatalogResult<()> {
        fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }

    /// Catalog named by `PRICERESHAPE_CATALOG`, or the built-in one.
    pub fn from_env() -> CatalogResult<Self> {
        match std::env::var(CATALOG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
            _ => Ok(Self::builtin()),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
