//! Error types for xblackbox.
//!
//! This module defines all error types used throughout the xblackbox crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for xblackbox operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Recorder State Errors ===
    /// `start` was called while a session is already open.
    #[error("already recording")]
    AlreadyRecording,

    /// `stop` was called while no session is open.
    #[error("not recording")]
    NotRecording,

    /// The operation is only allowed while idle.
    #[error("operation not allowed while recording: {operation}")]
    RecordingActive {
        /// Description of the refused operation.
        operation: String,
    },

    // === Trace File Errors ===
    /// Failed to create the trace file.
    #[error("failed to create trace file {path}: {source}")]
    TraceCreate {
        /// Path to the trace file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Writing to an open trace failed.
    #[error("trace write failed: {0}")]
    TraceWrite(#[source] std::io::Error),

    /// A trace could not be decoded.
    #[error("malformed trace: {message}")]
    TraceFormat {
        /// Description of what was malformed.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Navigation Errors ===
    /// Failed to load a facility index.
    #[error("failed to load navigation index {path}: {message}")]
    NavIndexLoad {
        /// Path to the index file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

}

/// A specialized Result type for xblackbox operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new trace format error.
    #[must_use]
    pub fn trace_format(message: impl Into<String>) -> Self {
        Self::TraceFormat {
            message: message.into(),
        }
    }

    /// Create an error for an operation refused during a session.
    #[must_use]
    pub fn recording_active(operation: impl Into<String>) -> Self {
        Self::RecordingActive {
            operation: operation.into(),
        }
    }

    /// Check if this error means no session was open.
    #[must_use]
    pub fn is_not_recording(&self) -> bool {
        matches!(self, Self::NotRecording)
    }

    /// Check if this error means a session was already open.
    #[must_use]
    pub fn is_already_recording(&self) -> bool {
        matches!(self, Self::AlreadyRecording)
    }

    /// Check if this error came from the trace file itself.
    #[must_use]
    pub fn is_trace_io(&self) -> bool {
        matches!(self, Self::TraceCreate { .. } | Self::TraceWrite(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::NotRecording.to_string(), "not recording");
        assert_eq!(Error::AlreadyRecording.to_string(), "already recording");
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::NotRecording.is_not_recording());
        assert!(!Error::AlreadyRecording.is_not_recording());
        assert!(Error::AlreadyRecording.is_already_recording());
        assert!(!Error::NotRecording.is_already_recording());
        assert!(!Error::NotRecording.is_trace_io());
    }

    #[test]
    fn test_trace_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::TraceCreate {
            path: PathBuf::from("/flights/flightdata_20240101_120000.xdr"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("flightdata_20240101_120000.xdr"));
        assert!(msg.contains("access denied"));
        assert!(err.is_trace_io());
    }

    #[test]
    fn test_trace_write_is_trace_io() {
        let err = Error::TraceWrite(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "disk full",
        ));
        assert!(err.is_trace_io());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_recording_active_error_display() {
        let err = Error::recording_active("change recording level");
        assert!(err.to_string().contains("change recording level"));
    }

    #[test]
    fn test_trace_format_error_display() {
        let err = Error::trace_format("bad magic");
        assert_eq!(err.to_string(), "malformed trace: bad magic");
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "invalid interval".to_string(),
        };
        assert!(err.to_string().contains("invalid interval"));
    }

    #[test]
    fn test_nav_index_load_error_display() {
        let err = Error::NavIndexLoad {
            path: PathBuf::from("/data/airports.json"),
            message: "expected array".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/airports.json"));
        assert!(msg.contains("expected array"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("/root/forbidden"));
    }
}
