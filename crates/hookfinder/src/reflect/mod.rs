//! Reflective metadata collaborators
//!
//! The matcher engine never touches a runtime directly. It consumes two
//! collaborators:
//!
//! - [`NameSource`]: per-source sorted lists of fully qualified class names
//!   (one list per dex file, jar, or module).
//! - [`Reflector`]: turns a name into a class handle and answers structural
//!   queries about a handle (modifiers, superclass, interfaces and declared
//!   members). Implementations must not force static initialization.
//!
//! [`MetadataPool`] is an in-memory implementation of both, used for offline
//! analysis of metadata dumps and in tests.

mod modifiers;
mod pool;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, ResolveError};

pub use modifiers::{ModifierMask, Modifiers};
pub use pool::{ClassDef, ConstructorDef, FieldDef, MetadataPool, MethodDef, SourceDef};

/// Opaque class handle issued by a [`Reflector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub u32);

/// Handle to a declared member: declaring class plus declaration index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberRef {
    /// Declaring class
    pub class: ClassId,
    /// Index within the class's declared fields, methods or constructors
    pub index: u32,
}

/// Declared field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: ClassId,
    /// Modifier flags
    pub modifiers: Modifiers,
    /// Handle of this field
    pub member: MemberRef,
}

/// Declared method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Method name
    pub name: String,
    /// Return type
    pub return_type: ClassId,
    /// Parameter types in declaration order
    pub parameters: Vec<ClassId>,
    /// Modifier flags
    pub modifiers: Modifiers,
    /// Handle of this method
    pub member: MemberRef,
}

/// Declared constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorInfo {
    /// Parameter types in declaration order
    pub parameters: Vec<ClassId>,
    /// Modifier flags
    pub modifiers: Modifiers,
    /// Handle of this constructor
    pub member: MemberRef,
}

/// Reflective resolver
pub trait Reflector: Send + Sync {
    /// Resolve a fully qualified name without initializing the class
    fn load_class(&self, name: &str) -> Result<ClassId, ResolveError>;

    /// Name of a resolved class
    fn class_name(&self, class: ClassId) -> Result<String, ResolveError>;

    /// Modifier flags of a class
    fn class_modifiers(&self, class: ClassId) -> Result<Modifiers, ResolveError>;

    /// Direct superclass, `None` for roots, interfaces and primitives
    fn superclass(&self, class: ClassId) -> Result<Option<ClassId>, ResolveError>;

    /// Directly implemented interfaces
    fn interfaces(&self, class: ClassId) -> Result<Vec<ClassId>, ResolveError>;

    /// Fields declared by the class itself
    fn declared_fields(&self, class: ClassId) -> Result<Vec<FieldInfo>, ResolveError>;

    /// Methods declared by the class itself
    fn declared_methods(&self, class: ClassId) -> Result<Vec<MethodInfo>, ResolveError>;

    /// Constructors declared by the class itself
    fn declared_constructors(&self, class: ClassId) -> Result<Vec<ConstructorInfo>, ResolveError>;
}

/// Provider of the class name universe
pub trait NameSource: Send + Sync {
    /// One sorted list per source; lists may overlap
    fn name_lists(&self) -> Result<Vec<Vec<String>>, CatalogError>;
}

/// A fixed set of name lists, e.g. read from a file index
impl NameSource for Vec<Vec<String>> {
    fn name_lists(&self) -> Result<Vec<Vec<String>>, CatalogError> {
        Ok(self.clone())
    }
}
