//! Session configuration (hookfinder.toml)
//!
//! ```toml
//! [matcher]
//! workers = 4                       # 0 = one per CPU
//! miss-policy = "disable-constraint" # or "force-empty"
//! prune-unconsumed = true
//! ```
//!
//! The keys may also appear at the top level of a dedicated file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scheduler::WorkerPool;

/// What a dependent does when one of its dependencies resolved to nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissPolicy {
    /// The attribute referring to the missed placeholder imposes no constraint
    #[default]
    DisableConstraint,
    /// The dependent resolves to an empty result without scanning
    ForceEmpty,
}

/// Tunables of a resolution session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    /// Worker threads; 0 selects the number of CPUs
    pub workers: usize,
    /// Handling of missed dependencies
    pub miss_policy: MissPolicy,
    /// Skip matchers nobody consumes (no key, observer or callback)
    pub prune_unconsumed: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            miss_policy: MissPolicy::default(),
            prune_unconsumed: true,
        }
    }
}

impl SessionConfig {
    /// Parse from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut table: toml::Table = content.parse()?;
        let section = match table.remove("matcher") {
            Some(section) => section,
            None => toml::Value::Table(table),
        };
        Ok(section.try_into()?)
    }

    /// Load from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), ?config, "config.loaded");
        Ok(config)
    }

    /// Worker pool sized from `workers`
    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool::new(self.workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.workers, 0);
        assert_eq!(config.miss_policy, MissPolicy::DisableConstraint);
        assert!(config.prune_unconsumed);
        assert_eq!(SessionConfig::from_toml("").unwrap(), config);
    }

    #[test]
    fn test_matcher_section() {
        let config = SessionConfig::from_toml(
            r#"
            [matcher]
            workers = 3
            miss-policy = "force-empty"
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.miss_policy, MissPolicy::ForceEmpty);
        assert!(config.prune_unconsumed);
    }

    #[test]
    fn test_top_level_keys() {
        let config = SessionConfig::from_toml("prune-unconsumed = false\nworkers = 1").unwrap();
        assert_eq!(config.workers, 1);
        assert!(!config.prune_unconsumed);
    }

    #[test]
    fn test_invalid_policy() {
        let err = SessionConfig::from_toml("miss-policy = \"ignore\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_worker_pool_size() {
        let config = SessionConfig {
            workers: 2,
            ..Default::default()
        };
        assert_eq!(config.worker_pool().threads(), 2);
        assert_eq!(
            SessionConfig::default().worker_pool().threads(),
            num_cpus::get()
        );
    }
}
