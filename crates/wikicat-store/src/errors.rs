//! Store-specific constructors for `ExError`

use wikicat_core::errors::{ExError, ExErrorKind, WikicatError};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create a JSON (de)serialization error
pub fn serialization_error(operation: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create a rule-file shape error
pub fn rules_file_invalid(reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("load_rules")
        .with_message(reason.to_string())
}

/// Map a filesystem error on a page to the matching domain error
pub fn page_io(operation: &str, title: &str, err: std::io::Error) -> ExError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ExError::from(WikicatError::PageNotFound {
            title: title.to_string(),
        })
        .with_op(operation.to_string())
    } else {
        io_error(operation, err).with_page(title)
    }
}
