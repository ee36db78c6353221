//! Error types for the service layer.

/// Errors that can occur when talking to a service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The service's actor has stopped; its mailbox is closed.
    #[error("service at {0} is not running")]
    Unavailable(String),
}
