//! Constraint-violation messages to field errors, per dialect.

use std::error::Error;
use std::fmt;

use rowkit::prelude::*;
use rowkit::validation::ErrorCode;

/// Driver-style error with an optional cause.
#[derive(Debug)]
struct DriverError {
    message: String,
    cause: Option<Box<DriverError>>,
}

impl DriverError {
    fn leaf(message: &str) -> Self {
        Self {
            message: message.to_string(),
            cause: None,
        }
    }

    fn around(message: &str, cause: DriverError) -> Self {
        Self {
            message: message.to_string(),
            cause: Some(Box::new(cause)),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for DriverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

fn fields(errors: &ValidationErrors) -> Vec<(&str, ErrorCode)> {
    errors.errors().iter().map(|e| (e.field.as_str(), e.code)).collect()
}

#[test]
fn mysql_primary_key() {
    let err = DriverError::leaf("Duplicate entry '1' for key 'PRIMARY'");
    let errors = Dialect::MySQL.translator().translate(&err).unwrap();
    assert_eq!(fields(&errors), vec![("id", ErrorCode::DuplicateRecord)]);
}

#[test]
fn mysql_unique_key_behind_wrapper() {
    let err = DriverError::around(
        "could not execute statement",
        DriverError::leaf("Duplicate entry 'abc-en' for key 'article.article_key_UNIQUE'"),
    );
    let errors = Dialect::MySQL.translator().translate(&err).unwrap();
    assert_eq!(fields(&errors), vec![("articleKey", ErrorCode::DuplicateRecord)]);
}

#[test]
fn mysql_data_too_long() {
    let err = DriverError::leaf("Data too long for column 'display_name' at row 1");
    let errors = Dialect::MySQL.translator().translate(&err).unwrap();
    assert_eq!(fields(&errors), vec![("displayName", ErrorCode::DataTruncation)]);
}

#[test]
fn postgres_composite_key() {
    let err = DriverError::leaf("Key (article_key, lang)=(abc, en) already exists.");
    let errors = Dialect::Postgres.translator().translate(&err).unwrap();
    assert_eq!(
        fields(&errors),
        vec![("articleKey", ErrorCode::DuplicateRecord), ("lang", ErrorCode::DuplicateRecord)]
    );
}

#[test]
fn postgres_composite_key_without_values() {
    let err = DriverError::leaf("Key (article_key, lang) already exists");
    let errors = Dialect::Postgres.translator().translate(&err).unwrap();
    assert_eq!(
        fields(&errors),
        vec![("articleKey", ErrorCode::DuplicateRecord), ("lang", ErrorCode::DuplicateRecord)]
    );
}

#[test]
fn other_errors_pass_through() {
    let err = DriverError::leaf("connection reset by peer");
    assert!(Dialect::MySQL.translator().translate(&err).is_none());
    assert!(Dialect::Postgres.translator().translate(&err).is_none());
}
