use thiserror::Error;
use wikicat_core_types::RequestId;

/// Result type alias using the canonical structured error
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code usable in logs, tests and host
/// applications. Rate limiting has its own kind so page stores that can
/// classify their failures do not have to rely on message sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Validation
    InvalidInput,
    InvalidTitle,
    NotFound,
    AlreadyExists,
    MalformedInvocation,

    // Review bridge
    MalformedResponse,
    ReviewUnavailable,
    Cancelled,

    // Remote mutation
    RateLimited,
    WriteRejected,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    ExternalService,
    Timeout,
    Concurrency,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidTitle => "ERR_INVALID_TITLE",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::MalformedInvocation => "ERR_MALFORMED_INVOCATION",
            ExErrorKind::MalformedResponse => "ERR_MALFORMED_RESPONSE",
            ExErrorKind::ReviewUnavailable => "ERR_REVIEW_UNAVAILABLE",
            ExErrorKind::Cancelled => "ERR_CANCELLED",
            ExErrorKind::RateLimited => "ERR_RATE_LIMITED",
            ExErrorKind::WriteRejected => "ERR_WRITE_REJECTED",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::ExternalService => "ERR_EXTERNAL_SERVICE",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification kind plus the page/template/request context the
/// failure happened in. Built with the `with_*` methods:
///
/// ```
/// use wikicat_core::errors::{ExError, ExErrorKind};
///
/// let err = ExError::new(ExErrorKind::NotFound)
///     .with_op("move_page")
///     .with_page("Category:Old")
///     .with_message("source page is missing");
/// assert_eq!(err.code(), "ERR_NOT_FOUND");
/// assert_eq!(err.page(), Some("Category:Old"));
/// ```
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    page: Option<String>,
    template: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            page: None,
            template: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add page title context
    pub fn with_page(mut self, title: impl Into<String>) -> Self {
        self.page = Some(title.into());
        self
    }

    /// Add template name context
    pub fn with_template(mut self, name: impl Into<String>) -> Self {
        self.template = Some(name.into());
        self
    }

    /// Add confirmation request context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(page) = &self.page {
            write!(f, " (page: {})", page)?;
        }
        if let Some(template) = &self.template {
            write!(f, " (template: {})", template)?;
        }
        if let Some(source) = &self.source {
            write!(f, " <- {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain errors raised by migration operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WikicatError {
    /// Page does not exist
    #[error("Page not found: {title}")]
    PageNotFound { title: String },

    /// Move target already exists
    #[error("Page already exists: {title}")]
    PageExists { title: String },

    /// Title is empty or otherwise unusable
    #[error("Invalid title: {reason}")]
    InvalidTitle { reason: String },

    /// Fragment is not a `{{name|...}}` invocation with parameters
    #[error("Malformed template invocation: {fragment}")]
    MalformedInvocation { fragment: String },

    /// Review surface answered with something the worker cannot use
    #[error("Malformed review response for request {request_id}: {reason}")]
    MalformedResponse { request_id: String, reason: String },

    /// Review surface failed or went away
    #[error("Review surface unavailable: {reason}")]
    ReviewUnavailable { reason: String },

    /// Rate-limit-class failures persisted through every retry
    #[error("Rate limit persisted on {title} after {attempts} attempts")]
    RateLimitExhausted { title: String, attempts: u32 },

    /// Remote rejected the write for a non rate-limit reason
    #[error("Write rejected for {title}: {reason}")]
    WriteRejected { title: String, reason: String },

    /// Cooperative cancellation was requested
    #[error("Migration cancelled")]
    Cancelled,

    /// Row of the migration input could not be used
    #[error("Invalid row at line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    /// User-supplied regular expression did not compile
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Configuration could not be loaded
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<WikicatError> for ExError {
    fn from(err: WikicatError) -> Self {
        let message = err.to_string();
        match err {
            WikicatError::PageNotFound { title } => ExError::new(ExErrorKind::NotFound)
                .with_page(title)
                .with_message(message),

            WikicatError::PageExists { title } => ExError::new(ExErrorKind::AlreadyExists)
                .with_page(title)
                .with_message(message),

            WikicatError::InvalidTitle { .. } => {
                ExError::new(ExErrorKind::InvalidTitle).with_message(message)
            }

            WikicatError::MalformedInvocation { .. } => {
                ExError::new(ExErrorKind::MalformedInvocation).with_message(message)
            }

            WikicatError::MalformedResponse { request_id, .. } => {
                ExError::new(ExErrorKind::MalformedResponse)
                    .with_request_id(RequestId::from_string(request_id))
                    .with_message(message)
            }

            WikicatError::ReviewUnavailable { .. } => {
                ExError::new(ExErrorKind::ReviewUnavailable).with_message(message)
            }

            WikicatError::RateLimitExhausted { title, .. } => {
                ExError::new(ExErrorKind::RateLimited)
                    .with_page(title)
                    .with_message(message)
            }

            WikicatError::WriteRejected { title, .. } => ExError::new(ExErrorKind::WriteRejected)
                .with_page(title)
                .with_message(message),

            WikicatError::Cancelled => ExError::new(ExErrorKind::Cancelled).with_message(message),

            WikicatError::InvalidRow { .. }
            | WikicatError::InvalidPattern { .. }
            | WikicatError::InvalidConfig { .. } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = ExError::new(ExErrorKind::WriteRejected)
            .with_op("save_page")
            .with_page("Foo")
            .with_message("protected");
        let text = err.to_string();
        assert!(text.starts_with("[ERR_WRITE_REJECTED]"));
        assert!(text.contains("save_page"));
        assert!(text.contains("(page: Foo)"));
    }

    #[test]
    fn test_source_chain_is_exposed() {
        let inner = ExError::new(ExErrorKind::Io).with_message("disk full");
        let outer = ExError::new(ExErrorKind::Persistence).with_source(inner);
        let source = std::error::Error::source(&outer);
        assert!(source.is_some());
        assert_eq!(outer.source_error().map(|e| e.kind()), Some(ExErrorKind::Io));
    }
}
