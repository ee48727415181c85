//! Field-attributable validation errors.

use serde::Serialize;

/// What went wrong with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    /// A unique constraint covering the field was violated.
    DuplicateRecord,
    /// The value does not fit the column.
    DataTruncation,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::DuplicateRecord => write!(f, "duplicate record"),
            ErrorCode::DataTruncation => write!(f, "data truncation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldError {
    /// Property name (camelCase)
    pub field: String,
    pub code: ErrorCode,
}

impl FieldError {
    pub fn duplicate(field: impl Into<String>) -> Self {
        Self { field: field.into(), code: ErrorCode::DuplicateRecord }
    }

    pub fn truncated(field: impl Into<String>) -> Self {
        Self { field: field.into(), code: ErrorCode::DataTruncation }
    }
}

/// Accumulated field errors, returned rather than thrown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Fields carrying at least one error, in report order.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    /// `Ok(())` when nothing was collected, the errors otherwise.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self { errors: vec![error] }
    }
}

impl FromIterator<FieldError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self { errors: iter.into_iter().collect() }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation failed")?;
        for (i, e) in self.errors.iter().enumerate() {
            write!(f, "{} {}: {}", if i == 0 { ":" } else { ";" }, e.field, e.code)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let errors: ValidationErrors =
            [FieldError::duplicate("articleKey"), FieldError::duplicate("lang")].into_iter().collect();
        let err = errors.into_result().unwrap_err();
        assert_eq!(err.fields(), vec!["articleKey", "lang"]);
        assert_eq!(
            err.to_string(),
            "Validation failed: articleKey: duplicate record; lang: duplicate record"
        );
    }
}
