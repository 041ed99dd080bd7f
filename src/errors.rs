//! Transfer error types.
//!
//! [`TransferError`] is the only error type that crosses the proxy
//! boundary.  Backend-native failures (SDK errors, HTTP failures, protocol
//! error documents) are display-formatted into it with source/destination
//! context attached -- the native types never leak to callers.

use thiserror::Error;

/// Errors surfaced by the transfer proxy.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Login failed or the supplied session was not issued by this backend.
    #[error("authentication failed: {reason}")]
    Authentication { reason: String },

    /// A transfer operation against the backend failed.
    #[error("transfer failed [{source_location} -> {destination_location}]: {reason}")]
    Transfer {
        source_location: String,
        destination_location: String,
        reason: String,
    },

    /// A malformed file location was supplied.
    #[error("invalid location {location}: {reason}")]
    InvalidLocation { location: String, reason: String },

    /// A grid endpoint could not be activated before submission.
    #[error("failed to activate endpoint {endpoint}: {code}")]
    EndpointActivation { endpoint: String, code: String },

    /// A synchronous transfer wait was interrupted before completion.
    #[error("transfer {request_id} was interrupted before completion")]
    Interrupted { request_id: String },

    /// The active backend does not implement this operation.
    #[error("operation {operation} is not supported by the {backend} backend")]
    Unsupported {
        operation: &'static str,
        backend: &'static str,
    },

    /// The remote service returned a document we could not consume, or a
    /// status/report query failed outright.
    #[error("protocol error ({context}): {reason}")]
    Protocol { context: String, reason: String },
}

impl TransferError {
    /// Short machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Authentication { .. } => "Authentication",
            TransferError::Transfer { .. } => "Transfer",
            TransferError::InvalidLocation { .. } => "InvalidLocation",
            TransferError::EndpointActivation { .. } => "EndpointActivation",
            TransferError::Interrupted { .. } => "Interrupted",
            TransferError::Unsupported { .. } => "Unsupported",
            TransferError::Protocol { .. } => "Protocol",
        }
    }

    /// Wrap a backend failure with source/destination context.
    pub fn transfer(
        source_location: impl std::fmt::Display,
        destination_location: impl std::fmt::Display,
        reason: impl std::fmt::Display,
    ) -> Self {
        TransferError::Transfer {
            source_location: source_location.to_string(),
            destination_location: destination_location.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Wrap a failed status/report/listing exchange.
    pub fn protocol(context: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        TransferError::Protocol {
            context: context.to_string(),
            reason: reason.to_string(),
        }
    }
}

// -- Tests -------------------------------------------------------------------
