//! Matchers and the dependency graph between them
//!
//! A matcher is a mutable constraint descriptor for one entity kind. While it
//! is being edited it may reference the placeholders of other matchers; each
//! reference makes it a subscriber of that placeholder and raises its
//! dependency count. `build()` freezes the constraints. From then on the
//! matcher is only read, and it becomes ready for evaluation when its
//! dependency count drops back to 1.

mod editor;
mod graph;
mod kind;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::expr::Containment;
use crate::reflect::{ClassId, MemberRef, ModifierMask};

pub use editor::MatcherEditor;
pub(crate) use graph::DependencyGraph;
pub use kind::{Capabilities, Class, Constructor, ExecutableKind, Field, Kind, MemberKind, Method};
pub(crate) use kind::{CandidateSource, MemberCandidate, MemberSource};

/// Index of a matcher and its placeholder inside a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub(crate) u32);

impl SlotId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Entity kinds known to the engine
///
/// Declaration order is the category order of a resolution sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Classes and interfaces
    Class,
    /// Declared fields
    Field,
    /// Declared methods
    Method,
    /// Declared constructors
    Constructor,
    /// String literals (resolved at construction)
    String,
    /// Positional parameter types (derived from class matches)
    Parameter,
}

impl EntityKind {
    /// All kinds in sweep order
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Class,
        EntityKind::Field,
        EntityKind::Method,
        EntityKind::Constructor,
        EntityKind::String,
        EntityKind::Parameter,
    ];
}

/// A resolved reflective value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    /// A class handle
    Class(ClassId),
    /// A declared field
    Field(MemberRef),
    /// A declared method
    Method(MemberRef),
    /// A declared constructor
    Constructor(MemberRef),
    /// A parameter type at a fixed position
    Parameter {
        /// Zero-based parameter position
        index: u32,
        /// Parameter type
        class: ClassId,
    },
}

impl Entity {
    /// Kind of this value
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Class(_) => EntityKind::Class,
            Entity::Field(_) => EntityKind::Field,
            Entity::Method(_) => EntityKind::Method,
            Entity::Constructor(_) => EntityKind::Constructor,
            Entity::Parameter { .. } => EntityKind::Parameter,
        }
    }

    /// Class handle, for `Class` and `Parameter` values
    pub fn as_class(&self) -> Option<ClassId> {
        match self {
            Entity::Class(id) | Entity::Parameter { class: id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Member handle, for fields, methods and constructors
    pub fn as_member(&self) -> Option<MemberRef> {
        match self {
            Entity::Field(m) | Entity::Method(m) | Entity::Constructor(m) => Some(*m),
            _ => None,
        }
    }
}

/// Literal string constraint (the string matcher)
///
/// String matches carry their value from construction, so they never wait on
/// the scheduler and never count as a dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameFilter {
    /// Name must equal this
    pub exact: Option<String>,
    /// Name must start with this
    pub prefix: Option<String>,
}

impl NameFilter {
    /// Exact name
    pub fn exact(name: impl Into<String>) -> Self {
        Self {
            exact: Some(name.into()),
            prefix: None,
        }
    }

    /// Name prefix
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            exact: None,
            prefix: Some(prefix.into()),
        }
    }

    /// Add a prefix requirement
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Test a name against every set requirement
    pub fn accepts(&self, name: &str) -> bool {
        self.exact.as_deref().is_none_or(|exact| exact == name)
            && self.prefix.as_deref().is_none_or(|prefix| name.starts_with(prefix))
    }
}

impl From<&str> for NameFilter {
    fn from(name: &str) -> Self {
        NameFilter::exact(name)
    }
}

impl From<String> for NameFilter {
    fn from(name: String) -> Self {
        NameFilter::exact(name)
    }
}

/// Constraint attributes of a matcher
///
/// Which attributes a kind uses is fixed by the typed editor; unused ones stay
/// `None`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Constraints {
    pub match_first: bool,
    pub modifiers: ModifierMask,
    pub name: Option<NameFilter>,
    pub super_class: Option<SlotId>,
    pub interfaces: Option<Containment>,
    pub declaring_class: Option<SlotId>,
    /// Field type or method return type
    pub value_type: Option<SlotId>,
    pub parameter_count: Option<usize>,
    pub parameter_types: Option<Containment>,
}

impl Constraints {
    /// Placeholders referenced through single-value attributes
    pub fn single_refs(&self) -> impl Iterator<Item = SlotId> + '_ {
        [self.super_class, self.declaring_class, self.value_type]
            .into_iter()
            .flatten()
    }
}

/// A matcher node
#[derive(Debug)]
pub(crate) struct Matcher {
    pub kind: EntityKind,
    pub constraints: Constraints,
    pub key: Option<String>,
    /// True while neither a key nor an observer is attached
    pub pending: bool,
    pub finalized: bool,
    /// Outstanding dependencies + 1; 0 once published
    pub dependencies: AtomicUsize,
    /// Dependencies that reported an empty result
    pub missed: AtomicUsize,
}

impl Matcher {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            constraints: Constraints::default(),
            key: None,
            pending: true,
            finalized: false,
            dependencies: AtomicUsize::new(1),
            missed: AtomicUsize::new(0),
        }
    }

    /// Ready iff every dependency has reported and the matcher is unpublished
    pub fn is_ready(&self) -> bool {
        self.dependencies.load(Ordering::Acquire) == 1
    }

    /// Unconsumed matchers are skipped when pruning is on
    pub fn is_pruned(&self, prune: bool) -> bool {
        prune && self.pending
    }

    pub fn missed_dependencies(&self) -> usize {
        self.missed.load(Ordering::Acquire)
    }
}
