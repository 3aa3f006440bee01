//! Hookfinder - Declarative matcher engine for locating hook targets
//!
//! Clients describe the classes, fields, methods and constructors they want to
//! hook as matchers over reflective metadata. Matchers may refer to each
//! other's results (a method's declaring class, a class's superclass, the
//! parameter types of a constructor); those references form a dependency
//! graph that the scheduler resolves concurrently, sweep by sweep, until no
//! further progress is possible.
//!
//! # Example
//!
//! ```ignore
//! use hookfinder::{MetadataPool, NameFilter, Session};
//!
//! let pool = MetadataPool::load("dump.json")?;
//! let mut session = Session::new();
//! let activity = session.exact_class("android.app.Activity");
//! let main = session.first_class(|m| {
//!     m.super_class(activity).name(NameFilter::prefix("com.app."));
//! });
//! session.methods(|m| {
//!     m.declaring_class(main).name("onCreate").key("on_create");
//! });
//!
//! let result = session.run(&pool, &pool)?;
//! for method in result.members("on_create") {
//!     println!("{:?}", method);
//! }
//! ```

#![warn(missing_docs)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod expr;
pub mod matcher;
pub mod placeholder;
pub mod policy;
pub mod reflect;
pub mod result;
pub mod scheduler;
pub mod session;

pub use catalog::NameCatalog;
pub use config::{MissPolicy, SessionConfig};
pub use error::{CatalogError, ConfigError, MatchError, PoolError, ResolveError, TaskError};
pub use expr::Containment;
pub use matcher::{
    Class, Constructor, Entity, EntityKind, Field, MatcherEditor, Method, NameFilter, SlotId,
};
pub use placeholder::{Match, MatcherId, ParameterMatch, Placeholder, Sequence};
pub use policy::{ContinuePolicy, Decision, ExceptionPolicy};
pub use reflect::{
    ClassDef, ClassId, ConstructorDef, FieldDef, MemberRef, MetadataPool, MethodDef, Modifiers,
    NameSource, Reflector, SourceDef,
};
pub use result::{Failure, MatchResult, MatcherReport, Outcome, ValueName};
pub use scheduler::WorkerPool;
pub use session::Session;
