//! In-memory reflective metadata pool
//!
//! Holds class metadata grouped by source (the analogue of dex files or jars).
//! Type names that are referenced but never defined, such as `int` or
//! `java.lang.Object`, become stub classes: they resolve and compare by
//! identity, but they are not part of any source's name list.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::{
    ClassId, ConstructorInfo, FieldInfo, MemberRef, MethodInfo, Modifiers, NameSource, Reflector,
};
use crate::error::{CatalogError, PoolError, ResolveError};

// ============================================================================
// Definitions (serialized form)
// ============================================================================

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type name
    #[serde(rename = "type")]
    pub field_type: String,
    /// Modifier flags
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl FieldDef {
    /// New field with no modifiers
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            modifiers: Modifiers::NONE,
        }
    }

    /// Set modifier flags
    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Method definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Return type name
    #[serde(default = "void_type")]
    pub return_type: String,
    /// Parameter type names
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Modifier flags
    #[serde(default)]
    pub modifiers: Modifiers,
}

fn void_type() -> String {
    "void".to_string()
}

impl MethodDef {
    /// New method with no parameters and no modifiers
    pub fn new(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type: return_type.into(),
            parameters: Vec::new(),
            modifiers: Modifiers::NONE,
        }
    }

    /// Set parameter types
    pub fn params<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    /// Set modifier flags
    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Constructor definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorDef {
    /// Parameter type names
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Modifier flags
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl ConstructorDef {
    /// New constructor with the given parameter types
    pub fn new<I, S>(parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parameters: parameters.into_iter().map(Into::into).collect(),
            modifiers: Modifiers::NONE,
        }
    }

    /// Set modifier flags
    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Class definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Fully qualified name
    pub name: String,
    /// Modifier flags
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Superclass name
    #[serde(default)]
    pub superclass: Option<String>,
    /// Implemented interface names
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Declared fields
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Declared methods
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    /// Declared constructors
    #[serde(default)]
    pub constructors: Vec<ConstructorDef>,
    /// Listed and defined, but fails to link when loaded
    #[serde(default)]
    pub broken: bool,
}

impl ClassDef {
    /// New class with no modifiers, superclass or members
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set modifier flags
    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Set the superclass
    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a method
    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a constructor
    pub fn constructor(mut self, constructor: ConstructorDef) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Mark the class as failing to link
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

/// One source of classes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDef {
    /// Classes defined by this source
    #[serde(default)]
    pub classes: Vec<ClassDef>,
    /// Names listed by this source that cannot be resolved at all
    #[serde(default)]
    pub unresolvable: Vec<String>,
}

impl SourceDef {
    /// Source with the given classes
    pub fn new(classes: Vec<ClassDef>) -> Self {
        Self {
            classes,
            unresolvable: Vec::new(),
        }
    }

    /// List a name that has no definition
    pub fn unresolvable(mut self, name: impl Into<String>) -> Self {
        self.unresolvable.push(name.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct PoolDump {
    sources: Vec<SourceDef>,
}

// ============================================================================
// Resolved metadata
// ============================================================================

/// Resolved metadata for a single class
#[derive(Debug, Clone)]
struct ClassMetadata {
    name: String,
    modifiers: Modifiers,
    superclass: Option<ClassId>,
    interfaces: Vec<ClassId>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    constructors: Vec<ConstructorInfo>,
    broken: bool,
    defined: bool,
}

impl ClassMetadata {
    fn stub(name: &str) -> Self {
        Self {
            name: name.to_string(),
            modifiers: Modifiers::PUBLIC,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            broken: false,
            defined: false,
        }
    }
}

/// Registry of class metadata implementing [`Reflector`] and [`NameSource`]
#[derive(Debug, Default)]
pub struct MetadataPool {
    /// Metadata indexed by class ID
    classes: Vec<ClassMetadata>,
    /// Name to class ID mapping
    by_name: FxHashMap<String, ClassId>,
    /// Per-source sorted name lists
    sources: Vec<Vec<String>>,
    /// Listed names no source defines
    unresolvable: FxHashSet<String>,
}

impl MetadataPool {
    /// Create a pool from source definitions
    ///
    /// When a class is defined by more than one source the first definition
    /// wins, as with parent-first class loading.
    pub fn from_sources(sources: Vec<SourceDef>) -> Self {
        let mut pool = Self::default();

        // Pass 1: claim IDs for every defined class so references resolve to them
        let mut pending = Vec::new();
        for source in &sources {
            let mut names = Vec::with_capacity(source.classes.len() + source.unresolvable.len());
            for def in &source.classes {
                names.push(def.name.clone());
                let id = pool.intern(&def.name);
                let meta = &mut pool.classes[id.0 as usize];
                if !meta.defined {
                    meta.defined = true;
                    pending.push((id, def));
                }
            }
            names.extend(source.unresolvable.iter().cloned());
            names.sort();
            names.dedup();
            pool.sources.push(names);
        }

        for name in sources.iter().flat_map(|source| &source.unresolvable) {
            let defined = pool
                .class_id(name)
                .is_some_and(|id| pool.classes[id.0 as usize].defined);
            if !defined {
                pool.unresolvable.insert(name.clone());
            }
        }

        // Pass 2: resolve type references, creating stubs as needed
        for (id, def) in pending {
            pool.populate(id, def);
        }

        tracing::debug!(
            classes = pool.classes.len(),
            sources = pool.sources.len(),
            "metadata.pool.loaded"
        );
        pool
    }

    /// Parse a JSON dump of the form `{"sources": [{"classes": [...]}]}`
    pub fn from_json(json: &str) -> Result<Self, PoolError> {
        let dump: PoolDump = serde_json::from_str(json)?;
        Ok(Self::from_sources(dump.sources))
    }

    /// Read a JSON dump from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Look up a class handle by name, including stubs
    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// Number of known classes, including stubs
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    fn intern(&mut self, name: &str) -> ClassId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(ClassMetadata::stub(name));
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn populate(&mut self, id: ClassId, def: &ClassDef) {
        let superclass = def.superclass.as_deref().map(|name| self.intern(name));
        let interfaces = def.interfaces.iter().map(|name| self.intern(name)).collect();

        let fields = def
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| FieldInfo {
                name: field.name.clone(),
                field_type: self.intern(&field.field_type),
                modifiers: field.modifiers,
                member: MemberRef {
                    class: id,
                    index: index as u32,
                },
            })
            .collect();

        let methods = def
            .methods
            .iter()
            .enumerate()
            .map(|(index, method)| MethodInfo {
                name: method.name.clone(),
                return_type: self.intern(&method.return_type),
                parameters: method.parameters.iter().map(|p| self.intern(p)).collect(),
                modifiers: method.modifiers,
                member: MemberRef {
                    class: id,
                    index: index as u32,
                },
            })
            .collect();

        let constructors = def
            .constructors
            .iter()
            .enumerate()
            .map(|(index, ctor)| ConstructorInfo {
                parameters: ctor.parameters.iter().map(|p| self.intern(p)).collect(),
                modifiers: ctor.modifiers,
                member: MemberRef {
                    class: id,
                    index: index as u32,
                },
            })
            .collect();

        let meta = &mut self.classes[id.0 as usize];
        meta.modifiers = def.modifiers;
        meta.superclass = superclass;
        meta.interfaces = interfaces;
        meta.fields = fields;
        meta.methods = methods;
        meta.constructors = constructors;
        meta.broken = def.broken;
    }

    fn get(&self, class: ClassId) -> Result<&ClassMetadata, ResolveError> {
        self.classes
            .get(class.0 as usize)
            .ok_or(ResolveError::UnknownClass(class))
    }
}

impl Reflector for MetadataPool {
    fn load_class(&self, name: &str) -> Result<ClassId, ResolveError> {
        if self.unresolvable.contains(name) {
            return Err(ResolveError::ClassNotFound(name.to_string()));
        }
        let id = self
            .class_id(name)
            .ok_or_else(|| ResolveError::ClassNotFound(name.to_string()))?;
        let meta = self.get(id)?;
        if meta.broken {
            return Err(ResolveError::Linkage {
                class: name.to_string(),
                reason: "class failed verification".to_string(),
            });
        }
        Ok(id)
    }

    fn class_name(&self, class: ClassId) -> Result<String, ResolveError> {
        Ok(self.get(class)?.name.clone())
    }

    fn class_modifiers(&self, class: ClassId) -> Result<Modifiers, ResolveError> {
        Ok(self.get(class)?.modifiers)
    }

    fn superclass(&self, class: ClassId) -> Result<Option<ClassId>, ResolveError> {
        Ok(self.get(class)?.superclass)
    }

    fn interfaces(&self, class: ClassId) -> Result<Vec<ClassId>, ResolveError> {
        Ok(self.get(class)?.interfaces.clone())
    }

    fn declared_fields(&self, class: ClassId) -> Result<Vec<FieldInfo>, ResolveError> {
        Ok(self.get(class)?.fields.clone())
    }

    fn declared_methods(&self, class: ClassId) -> Result<Vec<MethodInfo>, ResolveError> {
        Ok(self.get(class)?.methods.clone())
    }

    fn declared_constructors(&self, class: ClassId) -> Result<Vec<ConstructorInfo>, ResolveError> {
        Ok(self.get(class)?.constructors.clone())
    }
}

impl NameSource for MetadataPool {
    fn name_lists(&self) -> Result<Vec<Vec<String>>, CatalogError> {
        Ok(self.sources.clone())
    }
}
