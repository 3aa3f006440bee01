//! Kind markers and the per-kind capability table

use crate::error::ResolveError;
use crate::reflect::{ClassId, Modifiers, Reflector};

use super::{Entity, EntityKind};

mod sealed {
    pub trait Sealed {}
}

/// Compile-time entity kind of a matcher or placeholder
pub trait Kind: sealed::Sealed + Send + Sync + 'static {
    /// Runtime tag
    const KIND: EntityKind;
}

/// Kinds declared by a class (fields, methods, constructors)
pub trait MemberKind: Kind {}

/// Kinds with a parameter list (methods, constructors)
pub trait ExecutableKind: MemberKind {}

macro_rules! kind_marker {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {}

        impl sealed::Sealed for $name {}

        impl Kind for $name {
            const KIND: EntityKind = EntityKind::$name;
        }
    };
}

kind_marker!(
    /// Class kind
    Class
);
kind_marker!(
    /// Field kind
    Field
);
kind_marker!(
    /// Method kind
    Method
);
kind_marker!(
    /// Constructor kind
    Constructor
);

impl MemberKind for Field {}
impl MemberKind for Method {}
impl MemberKind for Constructor {}
impl ExecutableKind for Method {}
impl ExecutableKind for Constructor {}

/// A declared member flattened for constraint checks
#[derive(Debug, Clone)]
pub(crate) struct MemberCandidate {
    pub entity: Entity,
    pub name: Option<String>,
    pub modifiers: Modifiers,
    /// Field type or return type
    pub value_type: Option<ClassId>,
    pub parameters: Option<Vec<ClassId>>,
}

impl MemberCandidate {
    /// Name plus parameter and value type names, independent of handle numbering
    pub fn signature(&self, reflector: &dyn Reflector) -> Result<String, ResolveError> {
        let mut signature = self.name.clone().unwrap_or_else(|| "<init>".to_string());
        if let Some(parameters) = &self.parameters {
            let names = parameters
                .iter()
                .map(|class| reflector.class_name(*class))
                .collect::<Result<Vec<_>, _>>()?;
            signature.push('(');
            signature.push_str(&names.join(","));
            signature.push(')');
        }
        if let Some(value_type) = self.value_type {
            signature.push(':');
            signature.push_str(&reflector.class_name(value_type)?);
        }
        Ok(signature)
    }
}

pub(crate) type MemberSource =
    fn(&dyn Reflector, ClassId) -> Result<Vec<MemberCandidate>, ResolveError>;

/// Where a kind's candidates come from
#[derive(Clone, Copy)]
pub(crate) enum CandidateSource {
    /// Value fixed at construction; never scheduled
    Literal,
    /// Names from the catalog, resolved through the reflector
    Catalog,
    /// Declared members of the resolved declaring class
    Members(MemberSource),
}

/// Static description of what a kind supports
#[derive(Clone, Copy)]
pub struct Capabilities {
    /// Evaluated by the scheduler
    pub scheduled: bool,
    pub(crate) candidates: CandidateSource,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("scheduled", &self.scheduled)
            .finish_non_exhaustive()
    }
}

static CAPABILITIES: [Capabilities; 6] = [
    // Class
    Capabilities {
        scheduled: true,
        candidates: CandidateSource::Catalog,
    },
    // Field
    Capabilities {
        scheduled: true,
        candidates: CandidateSource::Members(fields_of),
    },
    // Method
    Capabilities {
        scheduled: true,
        candidates: CandidateSource::Members(methods_of),
    },
    // Constructor
    Capabilities {
        scheduled: true,
        candidates: CandidateSource::Members(constructors_of),
    },
    // String
    Capabilities {
        scheduled: false,
        candidates: CandidateSource::Literal,
    },
    // Parameter
    Capabilities {
        scheduled: false,
        candidates: CandidateSource::Literal,
    },
];

impl EntityKind {
    /// Capability row of this kind
    pub fn capabilities(self) -> &'static Capabilities {
        &CAPABILITIES[self as usize]
    }

    /// Declared members of `class`; empty for kinds without a declaring class
    pub(crate) fn members(
        self,
        reflector: &dyn Reflector,
        class: ClassId,
    ) -> Result<Vec<MemberCandidate>, ResolveError> {
        match self.capabilities().candidates {
            CandidateSource::Members(source) => source(reflector, class),
            CandidateSource::Catalog | CandidateSource::Literal => Ok(Vec::new()),
        }
    }

    /// Scheduled kinds in sweep order
    pub fn scheduled() -> impl Iterator<Item = EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(|kind| kind.capabilities().scheduled)
    }
}

fn fields_of(reflector: &dyn Reflector, class: ClassId) -> Result<Vec<MemberCandidate>, ResolveError> {
    Ok(reflector
        .declared_fields(class)?
        .into_iter()
        .map(|field| MemberCandidate {
            entity: Entity::Field(field.member),
            name: Some(field.name),
            modifiers: field.modifiers,
            value_type: Some(field.field_type),
            parameters: None,
        })
        .collect())
}

fn methods_of(reflector: &dyn Reflector, class: ClassId) -> Result<Vec<MemberCandidate>, ResolveError> {
    Ok(reflector
        .declared_methods(class)?
        .into_iter()
        .map(|method| MemberCandidate {
            entity: Entity::Method(method.member),
            name: Some(method.name),
            modifiers: method.modifiers,
            value_type: Some(method.return_type),
            parameters: Some(method.parameters),
        })
        .collect())
}

fn constructors_of(
    reflector: &dyn Reflector,
    class: ClassId,
) -> Result<Vec<MemberCandidate>, ResolveError> {
    Ok(reflector
        .declared_constructors(class)?
        .into_iter()
        .map(|ctor| MemberCandidate {
            entity: Entity::Constructor(ctor.member),
            name: None,
            modifiers: ctor.modifiers,
            value_type: None,
            parameters: Some(ctor.parameters),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_order() {
        let order: Vec<EntityKind> = EntityKind::scheduled().collect();
        assert_eq!(
            order,
            vec![
                EntityKind::Class,
                EntityKind::Field,
                EntityKind::Method,
                EntityKind::Constructor
            ]
        );
    }

    #[test]
    fn test_capability_rows() {
        assert!(matches!(
            EntityKind::Class.capabilities().candidates,
            CandidateSource::Catalog
        ));
        assert!(matches!(
            EntityKind::Method.capabilities().candidates,
            CandidateSource::Members(_)
        ));
        assert!(matches!(
            EntityKind::Constructor.capabilities().candidates,
            CandidateSource::Members(_)
        ));
        assert!(!EntityKind::String.capabilities().scheduled);
        assert!(!EntityKind::Parameter.capabilities().scheduled);
    }

    #[test]
    fn test_member_signatures() {
        use crate::reflect::{
            ClassDef, ConstructorDef, FieldDef, MetadataPool, MethodDef, SourceDef,
        };

        let pool = MetadataPool::from_sources(vec![SourceDef::new(vec![ClassDef::new("a.A")
            .field(FieldDef::new("count", "int"))
            .method(MethodDef::new("put", "void").params(["a.Key", "int"]))
            .constructor(ConstructorDef::new(["a.Key"]))])]);
        let class = pool.class_id("a.A").unwrap();

        let signatures = |kind: EntityKind| -> Vec<String> {
            kind.members(&pool, class)
                .unwrap()
                .iter()
                .map(|m| m.signature(&pool).unwrap())
                .collect()
        };
        assert_eq!(signatures(EntityKind::Field), vec!["count:int"]);
        assert_eq!(signatures(EntityKind::Method), vec!["put(a.Key,int):void"]);
        assert_eq!(signatures(EntityKind::Constructor), vec!["<init>(a.Key)"]);
        assert!(signatures(EntityKind::Class).is_empty());
    }

    #[test]
    fn test_markers_map_to_tags() {
        assert_eq!(<Class as Kind>::KIND, EntityKind::Class);
        assert_eq!(<Constructor as Kind>::KIND, EntityKind::Constructor);
    }
}
