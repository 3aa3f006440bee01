//! Error types for matcher construction and resolution

use std::error::Error as StdError;

use crate::matcher::SlotId;
use crate::reflect::ClassId;

/// Protocol and session errors
///
/// Protocol errors (`Finalized`, `DependencyInvariant`, `AlreadyResolved`) are
/// programmer errors and are never retried. `Catalog` aborts the whole session
/// before any matcher is evaluated.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// A matcher was edited after `build()`
    #[error("Matcher {0} cannot be modified after it is finalized")]
    Finalized(SlotId),

    /// A matcher published while dependencies were still outstanding
    #[error("Illegal dependency count {found} for matcher {slot} on publish (expected 1)")]
    DependencyInvariant {
        /// Publishing matcher
        slot: SlotId,
        /// Count observed immediately before the decrement
        found: usize,
    },

    /// A placeholder received a second value
    #[error("Matcher {0} was already resolved")]
    AlreadyResolved(SlotId),

    /// The name catalog could not be retrieved
    #[error("Failed to retrieve name catalog: {0}")]
    Catalog(#[from] CatalogError),
}

/// Failure to turn a name or handle into usable reflective data
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No class with this name exists in the pool
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// Handle was not issued by this resolver
    #[error("Unknown class handle {0:?}")]
    UnknownClass(ClassId),

    /// The class exists but cannot be linked
    #[error("Failed to link {class}: {reason}")]
    Linkage {
        /// Class name
        class: String,
        /// Underlying cause
        reason: String,
    },
}

/// Name catalog retrieval errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The provider could not enumerate its names
    #[error("Name source unavailable: {0}")]
    Unavailable(String),

    /// I/O error while reading a name list
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single evaluation task, caught at the join barrier
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Reflective lookup failed outside candidate resolution
    #[error("Reflective lookup failed: {0}")]
    Resolve(#[from] ResolveError),

    /// The task panicked
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// Protocol violation while publishing
    #[error(transparent)]
    Protocol(#[from] MatchError),
}

impl TaskError {
    /// Build a `Panicked` error from a `catch_unwind` payload
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        TaskError::Panicked(message)
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Metadata pool loading errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Failed to read the dump
    #[error("Failed to read metadata dump: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("Failed to parse metadata dump: {0}")]
    Json(#[from] serde_json::Error),
}

/// Walk `source()` links down to the innermost error
pub fn root_cause<'a>(err: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut current = err;
    while let Some(next) = current.source() {
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_task_error() {
        let err = TaskError::Protocol(MatchError::Catalog(CatalogError::Unavailable(
            "dex".to_string(),
        )));
        // Protocol is transparent, so the chain is MatchError -> CatalogError
        let root = root_cause(&err);
        assert_eq!(root.to_string(), "Name source unavailable: dex");
    }

    #[test]
    fn test_root_cause_of_leaf_is_itself() {
        let err = ResolveError::ClassNotFound("a.B".to_string());
        assert_eq!(root_cause(&err).to_string(), "Class not found: a.B");
    }

    #[test]
    fn test_panic_payloads() {
        let err = TaskError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "Task panicked: boom");

        let err = TaskError::from_panic(Box::new(String::from("bang")));
        assert_eq!(err.to_string(), "Task panicked: bang");

        let err = TaskError::from_panic(Box::new(7u32));
        assert_eq!(err.to_string(), "Task panicked: unknown panic payload");
    }
}
