//! Typed placeholders for values that are filled in during resolution
//!
//! Every matcher owns exactly one placeholder. [`Match`] stands for the single
//! value of a match-first matcher, [`Sequence`] for the value list of a
//! match-all matcher. Handles are plain indices into the owning session and
//! are `Copy`; the value itself lives in the session's slot table.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use crate::expr::{Containment, Operand};
use crate::matcher::{Class, Entity, Kind, SlotId};

/// Something that refers to a session slot
pub trait Placeholder {
    /// Entity kind of the slot's values
    type Kind: Kind;

    /// Slot this handle refers to
    fn slot(&self) -> SlotId;
}

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name<K> {
            slot: SlotId,
            _kind: PhantomData<fn() -> K>,
        }

        impl<K> $name<K> {
            pub(crate) fn new(slot: SlotId) -> Self {
                Self {
                    slot,
                    _kind: PhantomData,
                }
            }
        }

        impl<K> Clone for $name<K> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<K> Copy for $name<K> {}

        impl<K> PartialEq for $name<K> {
            fn eq(&self, other: &Self) -> bool {
                self.slot == other.slot
            }
        }

        impl<K> Eq for $name<K> {}

        impl<K: Kind> fmt::Debug for $name<K> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}<{:?}>({})", stringify!($name), K::KIND, self.slot)
            }
        }

        impl<K: Kind> Placeholder for $name<K> {
            type Kind = K;

            fn slot(&self) -> SlotId {
                self.slot
            }
        }
    };
}

handle!(
    /// Handle to an editable matcher, valid until the matcher is built
    MatcherId
);
handle!(
    /// Single-valued placeholder of a match-first matcher
    Match
);
handle!(
    /// Multi-valued placeholder of a match-all matcher
    Sequence
);

impl Match<Class> {
    /// The resolved class is a member of the tested set
    pub fn contained(&self) -> Containment {
        Containment::member(Operand::Value(self.slot))
    }

    /// The resolved class is not a member of the tested set
    pub fn not_contained(&self) -> Containment {
        Containment::non_member(Operand::Value(self.slot))
    }

    /// The resolved class taken as the type of parameter `index`
    pub fn as_parameter(&self, index: u32) -> ParameterMatch {
        ParameterMatch {
            slot: self.slot,
            index,
        }
    }
}

impl Sequence<Class> {
    /// Every resolved class is in the tested set (false if none resolved)
    pub fn all_of(&self) -> Containment {
        Containment::all_of(self.slot)
    }

    /// At least one resolved class is in the tested set
    pub fn any_of(&self) -> Containment {
        Containment::any_of(self.slot)
    }
}

/// A class match bound to a parameter position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterMatch {
    slot: SlotId,
    index: u32,
}

impl ParameterMatch {
    /// Parameter `index` has the resolved type
    pub fn contained(&self) -> Containment {
        Containment::member(self.operand())
    }

    /// Parameter `index` does not have the resolved type
    pub fn not_contained(&self) -> Containment {
        Containment::non_member(self.operand())
    }

    fn operand(&self) -> Operand {
        Operand::Parameter {
            slot: self.slot,
            index: self.index,
        }
    }
}

/// Observer entry on a slot
///
/// The list is a multiset: the same dependent appears once per reference, and
/// removal takes out a single occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Subscriber {
    /// A dependent matcher
    Matcher(SlotId),
    /// An index into the session's callback table
    Callback(usize),
}

/// Client callback fired once when a slot is published
pub(crate) enum Callback {
    Match(Box<dyn Fn(&[Entity]) + Send + Sync>),
    Miss(Box<dyn Fn() + Send + Sync>),
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Match(_) => f.write_str("Callback::Match"),
            Callback::Miss(_) => f.write_str("Callback::Miss"),
        }
    }
}

/// Published value of a slot
#[derive(Debug, Clone)]
pub(crate) struct Published {
    pub values: Arc<[Entity]>,
    /// Sweep that produced the value; 0 for values seeded from a previous run
    pub sweep: usize,
}

/// Value cell and observer list of one placeholder
#[derive(Debug, Default)]
pub(crate) struct Slot {
    value: OnceLock<Published>,
    pub subscribers: Vec<Subscriber>,
}

impl Slot {
    pub fn get(&self) -> Option<&Published> {
        self.value.get()
    }

    /// Store the value; fails if one is already present
    pub fn set(&self, published: Published) -> Result<(), Published> {
        self.value.set(published)
    }

    /// Remove one occurrence of `subscriber`
    pub fn unsubscribe(&mut self, subscriber: Subscriber) -> bool {
        match self.subscribers.iter().position(|s| *s == subscriber) {
            Some(index) => {
                self.subscribers.swap_remove(index);
                true
            }
            None => false,
        }
    }
}
