//! Matcher arena and dependency bookkeeping
//!
//! Wiring (subscribe, unsubscribe, finalize) happens through `&mut self`
//! before a run. During a run the graph is shared read-only between workers;
//! the only mutable state is each matcher's atomic dependency counter and
//! each slot's write-once value.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::{MatchError, TaskError};
use crate::expr::{Containment, ResolvedValues};
use crate::placeholder::{Callback, Published, Slot, Subscriber};
use crate::reflect::ClassId;

use super::{Entity, EntityKind, Matcher, SlotId};

/// A matcher together with its placeholder
#[derive(Debug)]
pub(crate) struct Node {
    pub matcher: Matcher,
    pub slot: Slot,
}

/// Result of a successful publish
#[derive(Debug)]
pub(crate) struct Publication {
    pub non_empty: bool,
    /// Dependents whose count was decremented
    pub notified: usize,
    /// Observers that panicked
    pub panics: Vec<TaskError>,
}

/// Arena of matcher nodes indexed by [`SlotId`]
#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    nodes: Vec<Node>,
    callbacks: Vec<Callback>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh matcher (dependency count 1, pending)
    pub fn insert(&mut self, kind: EntityKind) -> SlotId {
        let id = SlotId(self.nodes.len() as u32);
        self.nodes.push(Node {
            matcher: Matcher::new(kind),
            slot: Slot::default(),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        (0..self.nodes.len() as u32).map(SlotId)
    }

    #[cfg(test)]
    pub fn node(&self, id: SlotId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn matcher(&self, id: SlotId) -> &Matcher {
        &self.nodes[id.index()].matcher
    }

    pub fn matcher_mut(&mut self, id: SlotId) -> &mut Matcher {
        &mut self.nodes[id.index()].matcher
    }

    /// Mutable access for editing; fails once the matcher is finalized
    pub fn editable(&mut self, id: SlotId) -> Result<&mut Matcher, MatchError> {
        let matcher = &mut self.nodes[id.index()].matcher;
        if matcher.finalized {
            return Err(MatchError::Finalized(id));
        }
        Ok(matcher)
    }

    /// Freeze a matcher's constraints
    pub fn finalize(&mut self, id: SlotId) -> Result<(), MatchError> {
        let matcher = self.editable(id)?;
        matcher.finalized = true;
        tracing::trace!(
            slot = %id,
            kind = ?matcher.kind,
            dependencies = matcher.dependencies.load(Ordering::Relaxed) - 1,
            "matcher.finalized"
        );
        Ok(())
    }

    /// Register `dependent` as an observer of `dependency`
    pub fn subscribe(&mut self, dependent: SlotId, dependency: SlotId) {
        let node = &mut self.nodes[dependency.index()];
        node.slot.subscribers.push(Subscriber::Matcher(dependent));
        node.matcher.pending = false;
        *self.nodes[dependent.index()].matcher.dependencies.get_mut() += 1;
    }

    /// Undo one `subscribe(dependent, dependency)`
    pub fn unsubscribe(&mut self, dependent: SlotId, dependency: SlotId) {
        let node = &mut self.nodes[dependency.index()];
        if !node.slot.unsubscribe(Subscriber::Matcher(dependent)) {
            return;
        }
        if node.slot.subscribers.is_empty() && node.matcher.key.is_none() {
            node.matcher.pending = true;
        }
        *self.nodes[dependent.index()].matcher.dependencies.get_mut() -= 1;
    }

    /// Replace a single-valued reference: deregister `old`, register `new`
    pub fn relink(&mut self, dependent: SlotId, old: Option<SlotId>, new: Option<SlotId>) {
        if let Some(old) = old {
            self.unsubscribe(dependent, old);
        }
        if let Some(new) = new {
            self.subscribe(dependent, new);
        }
    }

    /// Replace an expression reference, one dependency per distinct placeholder
    pub fn relink_expr(
        &mut self,
        dependent: SlotId,
        old: Option<&Containment>,
        new: Option<&Containment>,
    ) {
        for slot in old.map(Containment::slots).unwrap_or_default() {
            self.unsubscribe(dependent, slot);
        }
        for slot in new.map(Containment::slots).unwrap_or_default() {
            self.subscribe(dependent, slot);
        }
    }

    /// Drop every dependency of `dependent`, making it ready
    pub fn detach(&mut self, dependent: SlotId) {
        let constraints = &self.nodes[dependent.index()].matcher.constraints;
        let mut refs: Vec<SlotId> = constraints.single_refs().collect();
        for expr in [&constraints.interfaces, &constraints.parameter_types]
            .into_iter()
            .flatten()
        {
            refs.extend(expr.slots());
        }
        for dependency in refs {
            self.unsubscribe(dependent, dependency);
        }
    }

    /// Attach a client callback to `slot`
    pub fn add_callback(&mut self, slot: SlotId, callback: Callback) {
        let index = self.callbacks.len();
        self.callbacks.push(callback);
        let node = &mut self.nodes[slot.index()];
        node.slot.subscribers.push(Subscriber::Callback(index));
        node.matcher.pending = false;
    }

    pub fn set_key(&mut self, slot: SlotId, key: String) {
        let matcher = &mut self.nodes[slot.index()].matcher;
        matcher.key = Some(key);
        matcher.pending = false;
    }

    /// Published value of `slot`, if any
    pub fn published(&self, slot: SlotId) -> Option<&Published> {
        self.nodes[slot.index()].slot.get()
    }

    /// First resolved value of `slot` as a class
    pub fn resolved_class(&self, slot: SlotId) -> Option<ClassId> {
        self.resolved(slot)?.first()?.as_class()
    }

    /// Publish the final value of `id` and notify its observers
    ///
    /// The matcher's count must read exactly 1 and is swapped to 0 in the same
    /// atomic step. Every dependent is decremented, including on an empty
    /// result, so a missing dependency never leaves a dependent stuck.
    /// Client callbacks run afterwards; their panics are caught and returned.
    pub fn publish(
        &self,
        id: SlotId,
        values: Vec<Entity>,
        sweep: usize,
    ) -> Result<Publication, MatchError> {
        let node = &self.nodes[id.index()];
        node.matcher
            .dependencies
            .compare_exchange(1, 0, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|found| MatchError::DependencyInvariant { slot: id, found })?;

        let values: Arc<[Entity]> = values.into();
        let non_empty = !values.is_empty();
        node.slot
            .set(Published {
                values: values.clone(),
                sweep,
            })
            .map_err(|_| MatchError::AlreadyResolved(id))?;

        let mut notified = 0;
        for subscriber in &node.slot.subscribers {
            if let Subscriber::Matcher(dependent) = *subscriber {
                let matcher = &self.nodes[dependent.index()].matcher;
                if !non_empty {
                    matcher.missed.fetch_add(1, Ordering::AcqRel);
                }
                matcher.dependencies.fetch_sub(1, Ordering::AcqRel);
                notified += 1;
            }
        }

        // Observers run after every dependent is released
        let mut panics = Vec::new();
        for subscriber in &node.slot.subscribers {
            let Subscriber::Callback(index) = *subscriber else {
                continue;
            };
            let outcome = match &self.callbacks[index] {
                Callback::Match(f) if non_empty => {
                    panic::catch_unwind(AssertUnwindSafe(|| f(&values)))
                }
                Callback::Miss(f) if !non_empty => panic::catch_unwind(AssertUnwindSafe(|| f())),
                _ => Ok(()),
            };
            if let Err(payload) = outcome {
                panics.push(TaskError::from_panic(payload));
            }
        }

        tracing::trace!(
            slot = %id,
            values = values.len(),
            notified,
            sweep,
            "matcher.published"
        );
        Ok(Publication {
            non_empty,
            notified,
            panics,
        })
    }
}

impl ResolvedValues for DependencyGraph {
    fn resolved(&self, slot: SlotId) -> Option<&[Entity]> {
        self.published(slot).map(|p| &*p.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Operand;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;

    fn count(graph: &DependencyGraph, id: SlotId) -> usize {
        graph.matcher(id).dependencies.load(Ordering::Acquire)
    }

    #[test]
    fn test_subscribe_and_replace() {
        let mut graph = DependencyGraph::new();
        let a = graph.insert(EntityKind::Class);
        let b = graph.insert(EntityKind::Class);
        let m = graph.insert(EntityKind::Method);

        graph.relink(m, None, Some(a));
        assert_eq!(count(&graph, m), 2);
        assert!(!graph.matcher(a).pending);

        graph.relink(m, Some(a), Some(b));
        assert_eq!(count(&graph, m), 2);
        assert!(graph.node(a).slot.subscribers.is_empty());
        assert!(graph.matcher(a).pending);
        assert_eq!(graph.node(b).slot.subscribers, vec![Subscriber::Matcher(m)]);
    }

    #[test]
    fn test_same_dependency_twice_counts_twice() {
        let mut graph = DependencyGraph::new();
        let a = graph.insert(EntityKind::Class);
        let f = graph.insert(EntityKind::Field);

        graph.relink(f, None, Some(a));
        graph.relink(f, None, Some(a));
        assert_eq!(count(&graph, f), 3);

        graph.publish(a, vec![Entity::Class(ClassId(0))], 1).unwrap();
        assert_eq!(count(&graph, f), 1);
        assert!(graph.matcher(f).is_ready());
    }

    #[test]
    fn test_expression_counts_distinct_slots() {
        let mut graph = DependencyGraph::new();
        let a = graph.insert(EntityKind::Class);
        let b = graph.insert(EntityKind::Class);
        let c = graph.insert(EntityKind::Class);
        let expr = Containment::member(Operand::Value(a))
            .and(&Containment::all_of(b))
            .or(&Containment::member(Operand::Value(a)));

        graph.relink_expr(c, None, Some(&expr));
        assert_eq!(count(&graph, c), 3);

        graph.relink_expr(c, Some(&expr), None);
        assert_eq!(count(&graph, c), 1);
    }

    #[test]
    fn test_publish_requires_ready() {
        let mut graph = DependencyGraph::new();
        let a = graph.insert(EntityKind::Class);
        let b = graph.insert(EntityKind::Class);
        graph.relink(b, None, Some(a));

        let err = graph.publish(b, vec![], 1).unwrap_err();
        assert!(matches!(err, MatchError::DependencyInvariant { found: 2, .. }));

        graph.publish(a, vec![], 1).unwrap();
        let err = graph.publish(a, vec![], 1).unwrap_err();
        assert!(matches!(err, MatchError::DependencyInvariant { found: 0, .. }));
    }

    #[test]
    fn test_empty_publish_records_miss() {
        let mut graph = DependencyGraph::new();
        let a = graph.insert(EntityKind::Class);
        let f = graph.insert(EntityKind::Field);
        graph.relink(f, None, Some(a));

        let publication = graph.publish(a, vec![], 1).unwrap();
        assert!(!publication.non_empty);
        assert_eq!(publication.notified, 1);
        assert_eq!(graph.matcher(f).missed_dependencies(), 1);
        assert_eq!(graph.resolved(a), Some(&[][..]));
        assert_eq!(graph.resolved_class(a), None);
    }

    #[test]
    fn test_callbacks_fire_by_outcome() {
        let hits = Arc::new(AtomicUsize::new(0));
        let misses = Arc::new(AtomicUsize::new(0));
        let mut graph = DependencyGraph::new();
        let a = graph.insert(EntityKind::Class);
        let b = graph.insert(EntityKind::Class);
        for slot in [a, b] {
            let hits = hits.clone();
            graph.add_callback(slot, Callback::Match(Box::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })));
            let misses = misses.clone();
            graph.add_callback(slot, Callback::Miss(Box::new(move || {
                misses.fetch_add(1, Ordering::SeqCst);
            })));
        }

        graph.publish(a, vec![Entity::Class(ClassId(1))], 1).unwrap();
        graph.publish(b, vec![], 1).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(misses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_callback_still_releases_dependents() {
        let mut graph = DependencyGraph::new();
        let a = graph.insert(EntityKind::Class);
        graph.add_callback(a, Callback::Match(Box::new(|_| panic!("observer failed"))));
        let m = graph.insert(EntityKind::Method);
        graph.relink(m, None, Some(a));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        graph.add_callback(a, Callback::Match(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        let publication = graph.publish(a, vec![Entity::Class(ClassId(1))], 1).unwrap();
        assert_eq!(publication.notified, 1);
        assert!(graph.matcher(m).is_ready());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(publication.panics.len(), 1);
        assert_eq!(
            publication.panics[0].to_string(),
            "Task panicked: observer failed"
        );
    }

    #[test]
    fn test_detach_makes_ready() {
        let mut graph = DependencyGraph::new();
        let a = graph.insert(EntityKind::Class);
        let m = graph.insert(EntityKind::Method);
        graph.relink(m, None, Some(a));
        graph.nodes[m.index()].matcher.constraints.declaring_class = Some(a);

        graph.detach(m);
        assert!(graph.matcher(m).is_ready());
        assert!(graph.node(a).slot.subscribers.is_empty());
    }

    #[test]
    fn test_concurrent_publish_leaves_dependent_ready() {
        let mut graph = DependencyGraph::new();
        let deps: Vec<SlotId> = (0..32).map(|_| graph.insert(EntityKind::Class)).collect();
        let target = graph.insert(EntityKind::Method);
        for dep in &deps {
            graph.relink(target, None, Some(*dep));
        }
        assert_eq!(count(&graph, target), 33);

        std::thread::scope(|scope| {
            for dep in &deps {
                let graph = &graph;
                scope.spawn(move || graph.publish(*dep, vec![], 1).unwrap());
            }
        });
        assert_eq!(count(&graph, target), 1);
        assert_eq!(graph.matcher(target).missed_dependencies(), 32);
    }

    proptest! {
        #[test]
        fn prop_ready_after_all_dependencies_in_any_order(
            order in Just((0..8usize).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let mut graph = DependencyGraph::new();
            let deps: Vec<SlotId> = (0..8).map(|_| graph.insert(EntityKind::Class)).collect();
            let target = graph.insert(EntityKind::Field);
            for dep in &deps {
                graph.relink(target, None, Some(*dep));
            }
            for (published, i) in order.iter().enumerate() {
                prop_assert!(!graph.matcher(target).is_ready());
                graph.publish(deps[*i], vec![Entity::Class(ClassId(*i as u32))], 1).unwrap();
                prop_assert_eq!(count(&graph, target), 8 - published);
            }
            prop_assert!(graph.matcher(target).is_ready());
        }
    }
}
