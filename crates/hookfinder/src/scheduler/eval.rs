//! Evaluation of a single ready matcher

use rustc_hash::FxHashSet;

use crate::config::MissPolicy;
use crate::error::{root_cause, TaskError};
use crate::expr::{Containment, ResolvedValues};
use crate::matcher::{CandidateSource, Constraints, Entity, MemberSource, SlotId};
use crate::policy::Decision;
use crate::reflect::ClassId;

use super::Scheduler;

impl Scheduler<'_> {
    /// Scan candidates for `slot` and publish the result
    ///
    /// Returns whether the published result is non-empty.
    pub(super) fn evaluate(&self, slot: SlotId, sweep: usize) -> Result<bool, TaskError> {
        let matcher = self.graph.matcher(slot);
        let missed = matcher.missed_dependencies();

        let values = if missed > 0 && self.config.miss_policy == MissPolicy::ForceEmpty {
            tracing::debug!(slot = %slot, missed, "matcher.forced_empty");
            Vec::new()
        } else {
            match matcher.kind.capabilities().candidates {
                CandidateSource::Catalog => self.match_classes(slot, &matcher.constraints)?,
                CandidateSource::Members(source) => {
                    self.match_members(slot, &matcher.constraints, source)?
                }
                CandidateSource::Literal => Vec::new(),
            }
        };

        tracing::trace!(slot = %slot, kind = ?matcher.kind, found = values.len(), sweep, "matcher.evaluated");
        let publication = self.graph.publish(slot, values, sweep)?;
        self.observer_panics(slot, publication.panics);
        Ok(publication.non_empty)
    }

    /// Drop an expression that names a missed placeholder
    ///
    /// Under `ForceEmpty` a matcher with a missed dependency never gets here,
    /// so this only relaxes `DisableConstraint` evaluation.
    fn active<'c>(&self, expr: Option<&'c Containment>) -> Option<&'c Containment> {
        let expr = expr?;
        let missed = expr
            .slots()
            .into_iter()
            .find(|slot| self.graph.resolved(*slot).map_or(true, <[Entity]>::is_empty));
        match missed {
            Some(operand) => {
                tracing::trace!(operand = %operand, "expression.disabled");
                None
            }
            None => Some(expr),
        }
    }

    fn match_classes(&self, slot: SlotId, c: &Constraints) -> Result<Vec<Entity>, TaskError> {
        let range = self.catalog.candidates(c.name.as_ref());
        let super_class = c.super_class.and_then(|s| self.graph.resolved_class(s));
        let interfaces = self.active(c.interfaces.as_ref());
        let mut found = Vec::new();

        for index in range {
            let Some(name) = self.catalog.get(index) else {
                break;
            };
            if c.name.as_ref().is_some_and(|filter| !filter.accepts(name)) {
                continue;
            }

            let class = match self.reflector.load_class(name) {
                Ok(class) => class,
                Err(err) => {
                    let decision = self.policy.decide(root_cause(&err));
                    tracing::debug!(slot = %slot, class = name, error = %err, ?decision, "candidate.failed");
                    self.record(slot, err.to_string(), decision);
                    match decision {
                        Decision::Continue => continue,
                        Decision::Abort => break,
                    }
                }
            };

            if !c.modifiers.accepts(self.reflector.class_modifiers(class)?) {
                continue;
            }
            if let Some(expected) = super_class {
                if self.reflector.superclass(class)? != Some(expected) {
                    continue;
                }
            }
            if let Some(expr) = interfaces {
                let set: FxHashSet<Entity> = self
                    .reflector
                    .interfaces(class)?
                    .into_iter()
                    .map(Entity::Class)
                    .collect();
                if !expr.test(&set, self.graph) {
                    continue;
                }
            }

            found.push(Entity::Class(class));
            if c.match_first {
                break;
            }
        }
        Ok(found)
    }

    fn match_members(
        &self,
        slot: SlotId,
        c: &Constraints,
        source: MemberSource,
    ) -> Result<Vec<Entity>, TaskError> {
        // Without a resolved declaring class there is nothing to enumerate
        let Some(class) = c.declaring_class.and_then(|s| self.graph.resolved_class(s)) else {
            tracing::trace!(slot = %slot, "matcher.no_declaring_class");
            return Ok(Vec::new());
        };
        let value_type = c.value_type.and_then(|s| self.graph.resolved_class(s));
        let parameter_types = self.active(c.parameter_types.as_ref());
        let mut found = Vec::new();

        for candidate in source(self.reflector, class)? {
            if !c.modifiers.accepts(candidate.modifiers) {
                continue;
            }
            if let (Some(filter), Some(name)) = (&c.name, &candidate.name) {
                if !filter.accepts(name) {
                    continue;
                }
            }
            if value_type.is_some() && candidate.value_type != value_type {
                continue;
            }
            let parameters = candidate.parameters.as_deref().unwrap_or_default();
            if c.parameter_count.is_some_and(|count| count != parameters.len()) {
                continue;
            }
            if let Some(expr) = parameter_types {
                if !expr.test(&parameter_set(parameters), self.graph) {
                    continue;
                }
            }

            found.push(candidate.entity);
            if c.match_first {
                break;
            }
        }
        Ok(found)
    }
}

/// Parameter types both as plain classes and tagged with their position
fn parameter_set(parameters: &[ClassId]) -> FxHashSet<Entity> {
    parameters
        .iter()
        .enumerate()
        .flat_map(|(index, class)| {
            [
                Entity::Class(*class),
                Entity::Parameter {
                    index: index as u32,
                    class: *class,
                },
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_set_tags_positions() {
        let set = parameter_set(&[ClassId(1), ClassId(2), ClassId(1)]);
        assert!(set.contains(&Entity::Class(ClassId(1))));
        assert!(set.contains(&Entity::Parameter {
            index: 2,
            class: ClassId(1)
        }));
        assert!(!set.contains(&Entity::Parameter {
            index: 1,
            class: ClassId(1)
        }));
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn test_parameter_set_empty() {
        assert!(parameter_set(&[]).is_empty());
    }
}
