use std::error::Error;

use super::{cause_chain, quoted_after, ExceptionTranslator};
use crate::naming::property_name;
use crate::validation::{FieldError, ValidationErrors};

/// Reads MySQL's `Duplicate entry '…' for key '…'` and
/// `Data too long for column '…'` messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlTranslator;

impl ExceptionTranslator for MysqlTranslator {
    fn translate(&self, error: &(dyn Error + 'static)) -> Option<ValidationErrors> {
        cause_chain(error).into_iter().find_map(|e| translate_message(&e.to_string()))
    }
}

fn translate_message(message: &str) -> Option<ValidationErrors> {
    if message.contains("Duplicate entry '") {
        let key = quoted_after(message, " for key '")?;
        return Some(FieldError::duplicate(key_field(key)).into());
    }
    if let Some(column) = quoted_after(message, "Data too long for column '") {
        return Some(FieldError::truncated(property_name(column)).into());
    }
    None
}

/// `users.PRIMARY` → `id`, `article_key_UNIQUE` → `articleKey`.
fn key_field(key: &str) -> String {
    // MySQL 8 prefixes the table name
    let key = key.rsplit('.').next().unwrap_or(key);
    if key == "PRIMARY" {
        return "id".to_string();
    }
    property_name(key.strip_suffix("_UNIQUE").unwrap_or(key))
}
