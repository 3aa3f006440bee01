//! Failure handling during resolution
//!
//! An [`ExceptionPolicy`] is consulted whenever a named candidate cannot be
//! resolved into a class handle, and whenever an evaluation task fails. The
//! root cause of the failure chain is passed in.

use std::error::Error as StdError;

use serde::{Deserialize, Serialize};

/// What to do after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Skip the failed candidate and keep scanning
    #[default]
    Continue,
    /// Stop scanning the current matcher's remaining candidates
    Abort,
}

/// Client hook deciding how resolution proceeds after a failure
pub trait ExceptionPolicy: Send + Sync {
    /// Inspect `failure` (already reduced to its root cause)
    fn decide(&self, failure: &(dyn StdError + 'static)) -> Decision;
}

impl<F> ExceptionPolicy for F
where
    F: Fn(&(dyn StdError + 'static)) -> Decision + Send + Sync,
{
    fn decide(&self, failure: &(dyn StdError + 'static)) -> Decision {
        self(failure)
    }
}

/// Default policy: log at debug level and continue
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuePolicy;

impl ExceptionPolicy for ContinuePolicy {
    fn decide(&self, failure: &(dyn StdError + 'static)) -> Decision {
        tracing::debug!(%failure, "policy.continue");
        Decision::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;

    #[test]
    fn test_default_continues() {
        let err = ResolveError::ClassNotFound("a.B".to_string());
        assert_eq!(ContinuePolicy.decide(&err), Decision::Continue);
        assert_eq!(Decision::default(), Decision::Continue);
    }

    #[test]
    fn test_closure_policy() {
        let policy = |failure: &(dyn StdError + 'static)| {
            if failure.to_string().contains("a.B") {
                Decision::Abort
            } else {
                Decision::Continue
            }
        };
        let hit = ResolveError::ClassNotFound("a.B".to_string());
        let miss = ResolveError::ClassNotFound("a.C".to_string());
        assert_eq!(policy.decide(&hit), Decision::Abort);
        assert_eq!(policy.decide(&miss), Decision::Continue);
    }
}
