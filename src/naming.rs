//! Property ↔ column name mapping.

use convert_case::{Case, Casing};

/// `articleKey` → `article_key`
pub fn column_name(property: &str) -> String {
    property.to_case(Case::Snake)
}

/// `article_key` → `articleKey`
pub fn property_name(column: &str) -> String {
    column.to_case(Case::Camel)
}
