use crate::batch::BatchId;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field or configuration key that caused the error (e.g., "requests", "accessories")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., the offending request id)
    pub details: Option<String>,
    /// Source of the error (e.g., "batch_request", "batch_registry")
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

/// Errors reported synchronously by the batching layer.
///
/// Failures of individual requests never show up here: they travel through
/// the batch's failure callback as a [`crate::RequestError`].
#[derive(Debug, Error)]
pub enum Error {
    /// The batch was built from an invalid request set.
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// Programmer error: starting twice, configuring after start.
    #[error("Misuse error: {message}{}", format_context(.context))]
    Misuse {
        message: String,
        context: ErrorContext,
    },

    /// A batch identity was registered while already present.
    #[error("Batch {batch} is already registered")]
    DuplicateRegistration { batch: BatchId },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },
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
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new misuse error with structured context
    pub fn misuse_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Misuse {
            message: msg.into(),
            context,
        }
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Misuse { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            Error::DuplicateRegistration { .. } => None,
        }
    }

    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::Misuse { .. })
    }
}
