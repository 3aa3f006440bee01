//! Outcome of a resolution session
//!
//! A [`MatchResult`] records, for every matcher, whether it resolved, missed,
//! stayed unresolved or was pruned, plus the values of keyed matchers. It can
//! be saved as JSON and fed back into a later session to skip matchers whose
//! values are already known. Keyed values are saved together with their
//! names, so a later session can re-resolve them against its own reflector.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, ResolveError};
use crate::matcher::{DependencyGraph, Entity, EntityKind, Kind, SlotId};
use crate::placeholder::{Match, Placeholder};
use crate::policy::Decision;
use crate::reflect::{ClassId, MemberRef, Reflector};

/// Final state of one matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Published a non-empty result
    Resolved,
    /// Published an empty result
    Missed,
    /// Never became ready (a dependency never reported)
    Unresolved,
    /// Skipped because nothing consumed it
    Pruned,
}

/// Per-matcher entry of a [`MatchResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherReport {
    /// Slot of the matcher
    pub slot: SlotId,
    /// Entity kind
    pub kind: EntityKind,
    /// Result key, if one was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Final state
    pub outcome: Outcome,
    /// Sweep that published the value; 0 if seeded from a previous result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<usize>,
    /// Published values
    #[serde(default)]
    pub values: Vec<Entity>,
    /// Names of the values, parallel to `values`; empty when unnamed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<ValueName>,
}

/// Handle-independent name of a published value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueName {
    /// Class name, or the declaring class name of a member
    pub class: String,
    /// Member signature such as `put(a.Key,int):void`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
}

impl ValueName {
    /// Name `value` through the reflector that issued its handles
    pub fn describe(
        reflector: &dyn Reflector,
        value: &Entity,
    ) -> Result<Option<Self>, ResolveError> {
        match *value {
            Entity::Class(class) | Entity::Parameter { class, .. } => Ok(Some(Self {
                class: reflector.class_name(class)?,
                member: None,
            })),
            Entity::Field(member) | Entity::Method(member) | Entity::Constructor(member) => {
                let candidates = value.kind().members(reflector, member.class)?;
                let Some(candidate) = candidates.iter().find(|c| c.entity == *value) else {
                    return Ok(None);
                };
                Ok(Some(Self {
                    class: reflector.class_name(member.class)?,
                    member: Some(candidate.signature(reflector)?),
                }))
            }
        }
    }

    /// Find the value of the same kind with this name in `reflector`
    pub fn locate(
        &self,
        reflector: &dyn Reflector,
        value: &Entity,
    ) -> Result<Option<Entity>, ResolveError> {
        let class = reflector.load_class(&self.class)?;
        match (*value, &self.member) {
            (Entity::Class(_), None) => Ok(Some(Entity::Class(class))),
            (Entity::Parameter { index, .. }, None) => Ok(Some(Entity::Parameter { index, class })),
            (Entity::Class(_) | Entity::Parameter { .. }, Some(_)) | (_, None) => Ok(None),
            (_, Some(signature)) => {
                for candidate in value.kind().members(reflector, class)? {
                    if candidate.signature(reflector)? == *signature {
                        return Ok(Some(candidate.entity));
                    }
                }
                Ok(None)
            }
        }
    }
}

/// Names for every value, or none if any value cannot be named
fn names_of(reflector: &dyn Reflector, slot: SlotId, values: &[Entity]) -> Vec<ValueName> {
    let mut names = Vec::with_capacity(values.len());
    for value in values {
        match ValueName::describe(reflector, value) {
            Ok(Some(name)) => names.push(name),
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::debug!(slot = %slot, error = %err, "result.unnamed_value");
                return Vec::new();
            }
        }
    }
    names
}

/// A failure seen during resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Matcher being evaluated
    pub slot: SlotId,
    /// Root cause message
    pub message: String,
    /// Policy decision
    pub decision: Decision,
}

/// Everything a session produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    sweeps: usize,
    matchers: Vec<MatcherReport>,
    #[serde(default)]
    failures: Vec<Failure>,
    #[serde(skip)]
    keys: BTreeMap<String, usize>,
}

impl MatchResult {
    pub(crate) fn collect(
        graph: &DependencyGraph,
        reflector: &dyn Reflector,
        sweeps: usize,
        failures: Vec<Failure>,
        prune: bool,
    ) -> Self {
        let matchers = graph
            .ids()
            .map(|slot| {
                let matcher = graph.matcher(slot);
                let published = graph.published(slot);
                let outcome = match published {
                    Some(p) if p.values.is_empty() => Outcome::Missed,
                    Some(_) => Outcome::Resolved,
                    None if matcher.is_pruned(prune) => Outcome::Pruned,
                    None => Outcome::Unresolved,
                };
                let values = published.map(|p| p.values.to_vec()).unwrap_or_default();
                let names = match &matcher.key {
                    Some(_) => names_of(reflector, slot, &values),
                    None => Vec::new(),
                };
                MatcherReport {
                    slot,
                    kind: matcher.kind,
                    key: matcher.key.clone(),
                    outcome,
                    sweep: published.map(|p| p.sweep),
                    values,
                    names,
                }
            })
            .collect();
        Self::from_parts(sweeps, matchers, failures)
    }

    fn from_parts(sweeps: usize, matchers: Vec<MatcherReport>, failures: Vec<Failure>) -> Self {
        let mut result = Self {
            sweeps,
            matchers,
            failures,
            keys: BTreeMap::new(),
        };
        result.index_keys();
        result
    }

    fn index_keys(&mut self) {
        self.keys.clear();
        for (index, report) in self.matchers.iter().enumerate() {
            if let Some(key) = &report.key {
                if self.keys.insert(key.clone(), index).is_some() {
                    tracing::warn!(key = %key, slot = %report.slot, "result.duplicate_key");
                }
            }
        }
    }

    /// Number of sweeps the run took (including the final empty one)
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// All matcher reports in slot order
    pub fn reports(&self) -> &[MatcherReport] {
        &self.matchers
    }

    /// Failures reported to the exception policy
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Report of the matcher behind a placeholder
    pub fn report<P: Placeholder>(&self, placeholder: &P) -> Option<&MatcherReport> {
        self.matchers.get(placeholder.slot().index())
    }

    /// Outcome of the matcher behind a placeholder
    pub fn outcome<P: Placeholder>(&self, placeholder: &P) -> Option<Outcome> {
        self.report(placeholder).map(|r| r.outcome)
    }

    /// Values of the matcher behind a placeholder (empty unless resolved)
    pub fn values<P: Placeholder>(&self, placeholder: &P) -> &[Entity] {
        self.report(placeholder).map_or(&[][..], |r| r.values.as_slice())
    }

    /// Single value of a match-first placeholder
    pub fn value<K: Kind>(&self, placeholder: &Match<K>) -> Option<Entity> {
        self.values(placeholder).first().copied()
    }

    /// Report stored under `key`
    pub fn keyed(&self, key: &str) -> Option<&MatcherReport> {
        self.keys.get(key).map(|index| &self.matchers[*index])
    }

    /// Values stored under `key`
    pub fn get(&self, key: &str) -> Option<&[Entity]> {
        self.keyed(key).map(|r| r.values.as_slice())
    }

    /// Classes stored under `key`
    pub fn classes(&self, key: &str) -> Vec<ClassId> {
        self.get(key)
            .unwrap_or_default()
            .iter()
            .filter_map(Entity::as_class)
            .collect()
    }

    /// First class stored under `key`
    pub fn class(&self, key: &str) -> Option<ClassId> {
        self.classes(key).first().copied()
    }

    /// Members stored under `key`
    pub fn members(&self, key: &str) -> Vec<MemberRef> {
        self.get(key)
            .unwrap_or_default()
            .iter()
            .filter_map(Entity::as_member)
            .collect()
    }

    /// Keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse JSON produced by [`MatchResult::to_json`]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut result: MatchResult = serde_json::from_str(json)?;
        result.index_keys();
        Ok(result)
    }

    /// Write JSON to a file
    pub fn save(&self, path: &Path) -> Result<(), PoolError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read JSON from a file
    pub fn load(path: &Path) -> Result<Self, PoolError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }
}
