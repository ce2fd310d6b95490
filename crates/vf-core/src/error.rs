//! Unified error type for variantforge.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].

use std::fmt;
use std::time::Duration;

/// Unified error type covering all failure modes in variantforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing input (no files selected, unreadable source, bad preset).
    /// Rejected before anything enters the queue.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A preset could not be sampled (malformed bounds slipped past validation).
    #[error("Sampling error: {0}")]
    Sampling(String),

    /// Parameters could not be turned into a transform program.
    #[error("Build error: {0}")]
    Build(String),

    /// An execution backend failed (engine crash, non-2xx, empty output).
    #[error("Backend error [{backend}]: {message}")]
    Backend {
        /// Name of the backend that failed.
        backend: String,
        /// Human-readable error description.
        message: String,
    },

    /// A backend call exceeded its time budget.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "job", "result").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The operation conflicts with the entity's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An upload exceeded the configured size ceiling.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Sampling(_) => 422,
            Error::Build(_) => 422,
            Error::Backend { .. } => 502,
            Error::Timeout(_) => 504,
            Error::NotFound { .. } => 404,
            Error::Conflict(_) => 409,
            Error::PayloadTooLarge(_) => 413,
            Error::Io { .. } => 500,
            Error::Tool { .. } => 502,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Sampling(_) => "sampling_error",
            Error::Build(_) => "build_error",
            Error::Backend { .. } => "backend_error",
            Error::Timeout(_) => "timeout",
            Error::NotFound { .. } => "not_found",
            Error::Conflict(_) => "conflict",
            Error::PayloadTooLarge(_) => "payload_too_large",
            Error::Io { .. } => "io_error",
            Error::Tool { .. } => "tool_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Backend`].
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display() {
        let err = Error::Validation("no files selected".into());
        assert_eq!(err.to_string(), "Validation error: no files selected");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn backend_display() {
        let err = Error::backend("remote", "HTTP 500: boom");
        assert_eq!(err.to_string(), "Backend error [remote]: HTTP 500: boom");
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn timeout_display() {
        let err = Error::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Timed out after 5s");
        assert_eq!(err.http_status(), 504);
    }

    #[test]
    fn not_found_display() {
        let err = Error::not_found("job", "abc-123");
        assert_eq!(err.to_string(), "job not found: abc-123");
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn conflict_and_too_large_statuses() {
        assert_eq!(Error::Conflict("busy".into()).http_status(), 409);
        assert_eq!(Error::PayloadTooLarge("2 GB".into()).http_status(), 413);
    }

    #[test]
    fn sampling_and_build_statuses() {
        assert_eq!(Error::Sampling("inverted".into()).http_status(), 422);
        let err = Error::Build("image parameters for video".into());
        assert_eq!(err.to_string(), "Build error: image parameters for video");
        assert_eq!(err.code(), "build_error");
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: exit code 1");
        assert_eq!(err.http_status(), 502);
    }
}
