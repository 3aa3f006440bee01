//! Typed constraint setters
//!
//! Setters are only offered for the attributes a kind supports, so a field
//! matcher has no `parameter_types` and a constructor matcher has no `name`.

use std::marker::PhantomData;

use crate::expr::Containment;
use crate::placeholder::{Match, Placeholder};
use crate::reflect::Modifiers;

use super::{
    Class, Constraints, DependencyGraph, ExecutableKind, Field, Kind, MemberKind, Method,
    NameFilter, SlotId,
};

/// Mutable view of one matcher while it is being configured
pub struct MatcherEditor<'s, K> {
    graph: &'s mut DependencyGraph,
    slot: SlotId,
    _kind: PhantomData<fn() -> K>,
}

impl<'s, K: Kind> MatcherEditor<'s, K> {
    pub(crate) fn new(graph: &'s mut DependencyGraph, slot: SlotId) -> Self {
        Self {
            graph,
            slot,
            _kind: PhantomData,
        }
    }

    fn constraints(&mut self) -> &mut Constraints {
        &mut self.graph.matcher_mut(self.slot).constraints
    }

    fn require(&mut self, flags: Modifiers, set: bool) -> &mut Self {
        self.constraints().modifiers.require(flags, set);
        self
    }

    fn set_single(
        &mut self,
        target: Match<Class>,
        pick: fn(&mut Constraints) -> &mut Option<SlotId>,
    ) {
        let new = Some(target.slot());
        let old = std::mem::replace(pick(self.constraints()), new);
        self.graph.relink(self.slot, old, new);
    }

    fn set_expr(
        &mut self,
        expr: Containment,
        pick: fn(&mut Constraints) -> &mut Option<Containment>,
    ) {
        let old = pick(self.constraints()).replace(expr.clone());
        self.graph.relink_expr(self.slot, old.as_ref(), Some(&expr));
    }

    /// Slot of the matcher being edited
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Stop after the first accepted candidate
    pub fn match_first(&mut self, first: bool) -> &mut Self {
        self.constraints().match_first = first;
        self
    }

    /// Record the result under `key` in the session result
    pub fn key(&mut self, key: impl Into<String>) -> &mut Self {
        self.graph.set_key(self.slot, key.into());
        self
    }

    /// Require or forbid `public`
    pub fn public(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::PUBLIC, set)
    }

    /// Require or forbid `private`
    pub fn private(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::PRIVATE, set)
    }

    /// Require or forbid `protected`
    pub fn protected(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::PROTECTED, set)
    }

    /// Require package-private access (no access modifier)
    pub fn package_private(&mut self, set: bool) -> &mut Self {
        self.constraints().modifiers.require_package_private(set);
        self
    }

    /// Require or forbid arbitrary modifier flags
    pub fn modifiers(&mut self, flags: Modifiers, set: bool) -> &mut Self {
        self.require(flags, set)
    }
}

impl MatcherEditor<'_, Class> {
    /// Class name constraint
    pub fn name(&mut self, name: impl Into<NameFilter>) -> &mut Self {
        self.constraints().name = Some(name.into());
        self
    }

    /// Direct superclass must be the resolved class
    pub fn super_class(&mut self, class: Match<Class>) -> &mut Self {
        self.set_single(class, |c| &mut c.super_class);
        self
    }

    /// Constraint over the directly implemented interfaces
    pub fn interfaces(&mut self, expr: Containment) -> &mut Self {
        self.set_expr(expr, |c| &mut c.interfaces);
        self
    }

    /// Require or forbid `abstract`
    pub fn is_abstract(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::ABSTRACT, set)
    }

    /// Require or forbid `static` (nested classes)
    pub fn is_static(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::STATIC, set)
    }

    /// Require or forbid `final`
    pub fn is_final(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::FINAL, set)
    }

    /// Require or forbid interface types
    pub fn is_interface(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::INTERFACE, set)
    }
}

impl<K: MemberKind> MatcherEditor<'_, K> {
    /// Class that must declare the member
    pub fn declaring_class(&mut self, class: Match<Class>) -> &mut Self {
        self.set_single(class, |c| &mut c.declaring_class);
        self
    }

    /// Require or forbid compiler-generated members
    pub fn synthetic(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::SYNTHETIC, set)
    }
}

impl<K: ExecutableKind> MatcherEditor<'_, K> {
    /// Exact number of parameters
    pub fn parameter_count(&mut self, count: usize) -> &mut Self {
        self.constraints().parameter_count = Some(count);
        self
    }

    /// Constraint over the parameter types
    ///
    /// The tested set holds every parameter type both as a plain class and
    /// tagged with its position (see [`Match::as_parameter`]).
    pub fn parameter_types(&mut self, expr: Containment) -> &mut Self {
        self.set_expr(expr, |c| &mut c.parameter_types);
        self
    }

    /// Require or forbid variable arity
    pub fn is_varargs(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::VARARGS, set)
    }
}

impl MatcherEditor<'_, Field> {
    /// Field name constraint
    pub fn name(&mut self, name: impl Into<NameFilter>) -> &mut Self {
        self.constraints().name = Some(name.into());
        self
    }

    /// Declared type must be the resolved class
    pub fn field_type(&mut self, class: Match<Class>) -> &mut Self {
        self.set_single(class, |c| &mut c.value_type);
        self
    }

    /// Require or forbid `static`
    pub fn is_static(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::STATIC, set)
    }

    /// Require or forbid `final`
    pub fn is_final(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::FINAL, set)
    }

    /// Require or forbid `transient`
    pub fn is_transient(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::TRANSIENT, set)
    }

    /// Require or forbid `volatile`
    pub fn is_volatile(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::VOLATILE, set)
    }
}

impl MatcherEditor<'_, Method> {
    /// Method name constraint
    pub fn name(&mut self, name: impl Into<NameFilter>) -> &mut Self {
        self.constraints().name = Some(name.into());
        self
    }

    /// Return type must be the resolved class
    pub fn return_type(&mut self, class: Match<Class>) -> &mut Self {
        self.set_single(class, |c| &mut c.value_type);
        self
    }

    /// Require or forbid `abstract`
    pub fn is_abstract(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::ABSTRACT, set)
    }

    /// Require or forbid `static`
    pub fn is_static(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::STATIC, set)
    }

    /// Require or forbid `final`
    pub fn is_final(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::FINAL, set)
    }

    /// Require or forbid `synchronized`
    pub fn is_synchronized(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::SYNCHRONIZED, set)
    }

    /// Require or forbid `native`
    pub fn is_native(&mut self, set: bool) -> &mut Self {
        self.require(Modifiers::NATIVE, set)
    }
}
