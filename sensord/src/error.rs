//! Errors seen by clients of the registry tree
//!
//! The entities themselves never fail a request: ownership mismatches are dropped,
//! dead devices and deadlines become outcome values. What a client *can* observe is
//! the transport: a mailbox that no longer accepts messages, or a reply target that
//! was dropped without an answer.

use thiserror::Error;

/// Errors from talking to an entity through its handle
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Mailbox closed: {0}")]
    MailboxClosed(String),

    #[error("No reply from {0}")]
    NoReply(String),

    #[error("Mailbox full: {0}")]
    MailboxFull(String),
}

impl RegistryError {
    /// True when the target entity has already exited
    pub fn is_closed(&self) -> bool {
        matches!(self, RegistryError::MailboxClosed(_))
    }
}

/// Response from a handle operation
pub type RegistryResponse<T> = Result<T, RegistryError>;
