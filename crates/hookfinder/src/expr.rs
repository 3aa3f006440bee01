//! Containment expressions over resolved placeholders
//!
//! A [`Containment`] is a boolean tree tested against a concrete set of
//! reflective values, e.g. the interfaces of a candidate class or the
//! parameter types of a candidate method. Leaves refer to placeholders and
//! read their published values at evaluation time.
//!
//! ```text
//! MEMBER(m)       m resolved and m ∈ set
//! NON_MEMBER(m)   not MEMBER(m)
//! ALL_OF(s)       s non-empty and every element ∈ set
//! ANY_OF(s)       some element ∈ set
//! AND / OR / NOT  usual short-circuit logic
//! ```

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::matcher::{Entity, SlotId};

/// Read access to published placeholder values
pub(crate) trait ResolvedValues {
    /// Values of `slot`, or `None` if it has not been published
    fn resolved(&self, slot: SlotId) -> Option<&[Entity]>;
}

/// Leaf operand referring to a single-valued placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operand {
    /// The resolved value itself
    Value(SlotId),
    /// The resolved class at a parameter position
    Parameter { slot: SlotId, index: u32 },
}

impl Operand {
    fn slot(&self) -> SlotId {
        match self {
            Operand::Value(slot) | Operand::Parameter { slot, .. } => *slot,
        }
    }

    fn entity(&self, values: &dyn ResolvedValues) -> Option<Entity> {
        let first = *values.resolved(self.slot())?.first()?;
        match self {
            Operand::Value(_) => Some(first),
            Operand::Parameter { index, .. } => first.as_class().map(|class| Entity::Parameter {
                index: *index,
                class,
            }),
        }
    }
}

#[derive(Debug)]
enum Node {
    Member(Operand),
    NonMember(Operand),
    AllOf(SlotId),
    AnyOf(SlotId),
    And(Arc<Node>, Arc<Node>),
    Or(Arc<Node>, Arc<Node>),
    Not(Arc<Node>),
}

/// Immutable, shareable containment expression
///
/// Combinators return new expressions; operands are shared, not copied.
#[derive(Clone)]
pub struct Containment {
    root: Arc<Node>,
}

impl Containment {
    fn from_node(node: Node) -> Self {
        Self {
            root: Arc::new(node),
        }
    }

    pub(crate) fn member(operand: Operand) -> Self {
        Self::from_node(Node::Member(operand))
    }

    pub(crate) fn non_member(operand: Operand) -> Self {
        Self::from_node(Node::NonMember(operand))
    }

    pub(crate) fn all_of(slot: SlotId) -> Self {
        Self::from_node(Node::AllOf(slot))
    }

    pub(crate) fn any_of(slot: SlotId) -> Self {
        Self::from_node(Node::AnyOf(slot))
    }

    /// Both expressions hold
    pub fn and(&self, other: &Containment) -> Containment {
        Self::from_node(Node::And(self.root.clone(), other.root.clone()))
    }

    /// Either expression holds
    pub fn or(&self, other: &Containment) -> Containment {
        Self::from_node(Node::Or(self.root.clone(), other.root.clone()))
    }

    /// Negation
    pub fn negate(&self) -> Containment {
        Self::from_node(Node::Not(self.root.clone()))
    }

    /// Distinct placeholders referenced by this expression, in slot order
    pub(crate) fn slots(&self) -> Vec<SlotId> {
        let mut slots = Vec::new();
        let mut stack = vec![&*self.root];
        while let Some(node) = stack.pop() {
            match node {
                Node::Member(op) | Node::NonMember(op) => slots.push(op.slot()),
                Node::AllOf(slot) | Node::AnyOf(slot) => slots.push(*slot),
                Node::And(l, r) | Node::Or(l, r) => {
                    stack.push(r);
                    stack.push(l);
                }
                Node::Not(inner) => stack.push(inner),
            }
        }
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    /// Evaluate against `set`
    pub(crate) fn test(&self, set: &FxHashSet<Entity>, values: &dyn ResolvedValues) -> bool {
        eval(&self.root, set, values)
    }
}

fn eval(node: &Node, set: &FxHashSet<Entity>, values: &dyn ResolvedValues) -> bool {
    match node {
        Node::Member(op) => op.entity(values).is_some_and(|e| set.contains(&e)),
        Node::NonMember(op) => !op.entity(values).is_some_and(|e| set.contains(&e)),
        Node::AllOf(slot) => match values.resolved(*slot) {
            Some(items) if !items.is_empty() => items.iter().all(|e| set.contains(e)),
            _ => false,
        },
        Node::AnyOf(slot) => values
            .resolved(*slot)
            .is_some_and(|items| items.iter().any(|e| set.contains(e))),
        Node::And(l, r) => eval(l, set, values) && eval(r, set, values),
        Node::Or(l, r) => eval(l, set, values) || eval(r, set, values),
        Node::Not(inner) => !eval(inner, set, values),
    }
}

impl std::ops::Not for Containment {
    type Output = Containment;

    fn not(self) -> Containment {
        self.negate()
    }
}

impl fmt::Debug for Containment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_node(&self.root, f)
    }
}

fn fmt_node(node: &Node, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match node {
        Node::Member(Operand::Value(slot)) => write!(f, "{}", slot),
        Node::Member(Operand::Parameter { slot, index }) => write!(f, "{}@{}", slot, index),
        Node::NonMember(Operand::Value(slot)) => write!(f, "!{}", slot),
        Node::NonMember(Operand::Parameter { slot, index }) => write!(f, "!{}@{}", slot, index),
        Node::AllOf(slot) => write!(f, "all({})", slot),
        Node::AnyOf(slot) => write!(f, "any({})", slot),
        Node::And(l, r) => {
            f.write_str("(")?;
            fmt_node(l, f)?;
            f.write_str(" & ")?;
            fmt_node(r, f)?;
            f.write_str(")")
        }
        Node::Or(l, r) => {
            f.write_str("(")?;
            fmt_node(l, f)?;
            f.write_str(" | ")?;
            fmt_node(r, f)?;
            f.write_str(")")
        }
        Node::Not(inner) => {
            f.write_str("not ")?;
            fmt_node(inner, f)
        }
    }
}
