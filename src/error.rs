use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "job.batch_size", "settings.service_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "dispatcher", "batcher")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Job-level error type.
///
/// Only faults of the engine itself (or of loading its inputs) end up here.
/// A record the remote service refuses is a [`SubmitError`] and is collected,
/// never returned from a job.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Dispatch infrastructure fault: {message}{}", format_context(.context))]
    Infrastructure {
        message: String,
        context: ErrorContext,
    },

    #[error("Batch encoding error: {message}{}", format_context(.context))]
    Encoding {
        message: String,
        context: ErrorContext,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid service URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn infrastructure(msg: impl Into<String>) -> Self {
        Error::Infrastructure {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn infrastructure_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Infrastructure {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn encoding_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Encoding {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Infrastructure { context, .. }
            | Error::Encoding { context, .. } => Some(context),
            _ => None,
        }
    }
}

/// Why a single unit of work (or one record of a batch) failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("rejected by service: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("no response after {0:?}")]
    Timeout(Duration),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("submission panicked: {0}")]
    Panicked(String),

    #[error("batch response has no entry for step {0}")]
    MissingResponse(usize),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl SubmitError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        SubmitError::Rejected {
            status,
            message: message.into(),
        }
    }
}

impl SubmitError {
    /// Classify an HTTP client error. `timeout` is the deadline the client
    /// was configured with, reported when the request ran out of time.
    pub fn from_http(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            SubmitError::Timeout(timeout)
        } else if let Some(status) = e.status() {
            SubmitError::rejected(status.as_u16(), e.to_string())
        } else {
            SubmitError::Transport(e.to_string())
        }
    }
}
