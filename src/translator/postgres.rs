use std::error::Error;

use sqlx::postgres::PgDatabaseError;

use super::{cause_chain, ExceptionTranslator};
use crate::naming::property_name;
use crate::validation::{FieldError, ValidationErrors};

/// Reads the unique-violation detail `Key (col1, col2)=(…) already exists`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresTranslator;

impl ExceptionTranslator for PostgresTranslator {
    fn translate(&self, error: &(dyn Error + 'static)) -> Option<ValidationErrors> {
        cause_chain(error).into_iter().find_map(|e| {
            match detail(e) {
                Some(detail) => translate_detail(&detail),
                None => translate_detail(&e.to_string()),
            }
        })
    }
}

/// Server-supplied DETAIL of a Postgres database error.
fn detail(error: &(dyn Error + 'static)) -> Option<String> {
    match error.downcast_ref::<sqlx::Error>()? {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<PgDatabaseError>()
            .and_then(|pg| pg.detail())
            .map(str::to_string),
        _ => None,
    }
}

fn translate_detail(detail: &str) -> Option<ValidationErrors> {
    if !detail.contains("already exists") {
        return None;
    }
    let start = detail.find("Key (")? + "Key (".len();
    let rest = &detail[start..];
    let columns = &rest[..rest.find(')')?];
    let errors: ValidationErrors = columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| FieldError::duplicate(property_name(c.trim_matches('"'))))
        .collect();
    if errors.is_empty() { None } else { Some(errors) }
}
