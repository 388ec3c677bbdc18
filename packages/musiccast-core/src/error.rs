//! Centralized error types for the MusicCast core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Classifies failures the way the reconciler and linker react to them
//! - Provides machine-readable codes for front ends

use thiserror::Error;

use crate::api::transport::TransportError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_) => "http_error_status",
            Self::Malformed(_) => "malformed_response",
            Self::InvalidUrl(_) => "invalid_url",
        }
    }
}

/// Library-wide error type.
#[derive(Debug, Error)]
pub enum MusicCastError {
    /// Network, timeout or malformed response. Recoverable.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Inbound data (event or response) could not be decoded.
    #[error("Decode failure: {0}")]
    Decode(String),

    /// Event or response belongs to a different device.
    #[error("Identity mismatch: expected device {expected}, got {actual}")]
    IdentityMismatch { expected: String, actual: String },

    /// Device answered a control command with a non-zero response code.
    #[error("{operation} rejected by device (response_code {code})")]
    ProtocolRejection { operation: &'static str, code: i64 },

    /// Device did not answer during construction.
    #[error("Failed to initialize device {address}: {reason}")]
    Initialization { address: String, reason: String },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Socket setup failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for MusicCastError {
    fn code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.code(),
            Self::Decode(_) => "decode_failed",
            Self::IdentityMismatch { .. } => "identity_mismatch",
            Self::ProtocolRejection { .. } => "protocol_rejection",
            Self::Initialization { .. } => "initialization_failed",
            Self::Config(_) => "configuration_error",
            Self::Io(_) => "io_error",
        }
    }
}

impl MusicCastError {
    /// Returns true if the failure came from the network rather than the device.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<serde_json::Error> for MusicCastError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::api::transport::TransportResult;

/// Convenient Result alias for library-wide operations.
pub type MusicCastResult<T> = Result<T, MusicCastError>;
