//! Registry error types

use super::handle::ListenerId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The stream behind this registry has stopped
    Closed,
    /// Handle was unregistered or dropped; handles are never reused
    HandleRetired(ListenerId),
    /// Handle is already a member of a different registry
    ForeignHandle(ListenerId),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Closed => write!(f, "Stream has stopped"),
            RegistryError::HandleRetired(id) => write!(f, "Handle already retired: {}", id),
            RegistryError::ForeignHandle(id) => {
                write!(f, "Handle belongs to another registry: {}", id)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
