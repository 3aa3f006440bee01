//! End-to-end Resolution Tests
//!
//! Runs whole sessions against an in-memory metadata pool:
//! - Catalog lookups by exact name and prefix
//! - Cross-category dependencies and sweep ordering
//! - Containment constraints over interfaces and parameter types
//! - Miss policies, observers, pruning and exception policies
//!
//! # Running Tests
//! ```bash
//! cargo test -p hookfinder --test resolution_tests
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hookfinder::reflect::{ConstructorInfo, FieldInfo, MethodInfo};
use hookfinder::{
    ClassDef, ClassId, ConstructorDef, Decision, Entity, FieldDef, MatchError, MetadataPool,
    Method, MethodDef, MissPolicy, Modifiers, NameFilter, Outcome, Placeholder, Reflector,
    ResolveError, Session, SessionConfig, SourceDef, WorkerPool,
};

fn app_pool() -> MetadataPool {
    let public = Modifiers::PUBLIC;
    MetadataPool::from_sources(vec![
        SourceDef::new(vec![
            ClassDef::new("app.Base")
                .modifiers(public | Modifiers::ABSTRACT)
                .implements("app.Listener")
                .method(MethodDef::new("onCreate", "void").modifiers(public)),
            ClassDef::new("app.Main")
                .modifiers(public)
                .extends("app.Base")
                .implements("app.Listener")
                .implements("app.Closeable")
                .field(FieldDef::new("count", "int").modifiers(Modifiers::PRIVATE))
                .field(
                    FieldDef::new("TAG", "java.lang.String")
                        .modifiers(public | Modifiers::STATIC | Modifiers::FINAL),
                )
                .method(
                    MethodDef::new("onCreate", "void")
                        .params(["app.Bundle"])
                        .modifiers(public),
                )
                .method(MethodDef::new("run", "void").modifiers(public))
                .method(
                    MethodDef::new("handle", "app.Bundle")
                        .params(["app.Event", "int"])
                        .modifiers(Modifiers::PRIVATE),
                )
                .constructor(ConstructorDef::new(Vec::<String>::new()).modifiers(public))
                .constructor(ConstructorDef::new(["app.Bundle"])),
            ClassDef::new("app.Other")
                .modifiers(public)
                .extends("app.Base")
                .implements("app.Listener"),
        ]),
        SourceDef::new(vec![
            ClassDef::new("app.Listener")
                .modifiers(public | Modifiers::INTERFACE | Modifiers::ABSTRACT),
            ClassDef::new("app.Closeable").modifiers(Modifiers::INTERFACE),
            ClassDef::new("app.Bundle").modifiers(public),
            ClassDef::new("app.Event").modifiers(public),
            ClassDef::new("lib.Util").modifiers(public | Modifiers::FINAL),
        ]),
    ])
}

fn class_names(pool: &MetadataPool, values: &[Entity]) -> Vec<String> {
    values
        .iter()
        .filter_map(Entity::as_class)
        .map(|id| pool.class_name(id).unwrap())
        .collect()
}

// ===== Catalog Lookups =====

#[test]
fn test_exact_and_prefix_lookup() {
    let pool = MetadataPool::from_sources(vec![SourceDef::new(vec![
        ClassDef::new("a.A"),
        ClassDef::new("a.B"),
        ClassDef::new("b.C"),
    ])]);

    let mut session = Session::new();
    let prefixed = session.classes(|m| {
        m.name(NameFilter::prefix("a.")).key("prefixed");
    });
    let exact = session.classes(|m| {
        m.name("a.B").key("exact");
    });
    let absent = session.classes(|m| {
        m.name("a.Z").key("absent");
    });

    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(class_names(&pool, result.values(&prefixed)), vec!["a.A", "a.B"]);
    assert_eq!(class_names(&pool, result.values(&exact)), vec!["a.B"]);
    assert_eq!(result.outcome(&absent), Some(Outcome::Missed));
}

#[test]
fn test_match_first_class_stops_at_first_hit() {
    let pool = app_pool();
    let mut session = Session::new();
    let first = session.first_class(|m| {
        m.name(NameFilter::prefix("app.")).public(true).key("first");
    });

    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(result.values(&first).len(), 1);
    assert_eq!(result.class("first"), pool.class_id("app.Base"));
}

#[test]
fn test_class_modifier_constraints() {
    let pool = app_pool();
    let mut session = Session::new();
    session.classes(|m| {
        m.is_interface(true).key("interfaces");
    });
    session.classes(|m| {
        m.is_final(true).key("finals");
    });
    session.classes(|m| {
        m.package_private(true).key("package");
    });

    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(
        class_names(&pool, result.get("interfaces").unwrap()),
        vec!["app.Closeable", "app.Listener"]
    );
    assert_eq!(class_names(&pool, result.get("finals").unwrap()), vec!["lib.Util"]);
    assert_eq!(class_names(&pool, result.get("package").unwrap()), vec!["app.Closeable"]);
}

// ===== Dependencies and Sweeps =====

#[test]
fn test_superclass_then_declaring_class_ordering() {
    let pool = app_pool();
    let mut session = Session::new();
    let base = session.exact_class("app.Base");
    let main = session.first_class(|m| {
        m.super_class(base).name(NameFilter::prefix("app.M"));
    });
    let run = session.methods(|m| {
        m.declaring_class(main).name("run").key("run");
    });

    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(result.report(&base).and_then(|r| r.sweep), Some(1));
    assert_eq!(result.report(&main).and_then(|r| r.sweep), Some(2));
    assert_eq!(result.report(&run).and_then(|r| r.sweep), Some(2));
    assert_eq!(result.members("run").len(), 1);
    assert_eq!(result.sweeps(), 3);
}

#[test]
fn test_chain_resolves_within_depth_plus_one_sweeps() {
    const DEPTH: usize = 6;
    let classes = (0..DEPTH)
        .map(|i| {
            let def = ClassDef::new(format!("chain.C{i}"));
            if i == 0 {
                def
            } else {
                def.extends(format!("chain.C{}", i - 1))
            }
        })
        .collect();
    let pool = MetadataPool::from_sources(vec![SourceDef::new(classes)]);

    let mut session = Session::new();
    let mut previous = session.exact_class("chain.C0");
    for _ in 1..DEPTH {
        let parent = previous;
        previous = session.first_class(|m| {
            m.super_class(parent);
        });
    }
    session.set_key(&previous, "leaf");

    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(result.class("leaf"), pool.class_id(&format!("chain.C{}", DEPTH - 1)));
    assert_eq!(result.sweeps(), DEPTH + 1);
    assert!(result.reports().iter().all(|r| r.outcome == Outcome::Resolved));
}

#[test]
fn test_forward_reference_and_replacement() {
    let pool = app_pool();
    let mut session = Session::new();

    // Method matcher created before the class it depends on
    let id = session.matcher::<Method>();
    let wrong = session.exact_class("lib.Util");
    let main = session.exact_class("app.Main");
    session
        .edit(id)
        .unwrap()
        .declaring_class(wrong)
        .declaring_class(main)
        .name("onCreate")
        .key("on_create");
    let methods = session.build(id).unwrap();

    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(result.values(&methods).len(), 1);
    assert_eq!(result.outcome(&wrong), Some(Outcome::Pruned));
    assert_eq!(result.outcome(&main), Some(Outcome::Resolved));
}

#[test]
fn test_edit_after_build_is_rejected() {
    let mut session = Session::new();
    let id = session.matcher::<Method>();
    session.build(id).unwrap();
    assert!(matches!(session.edit(id), Err(MatchError::Finalized(_))));
}

// ===== Member Constraints =====

#[test]
fn test_field_constraints() {
    let pool = app_pool();
    let mut session = Session::new();
    let main = session.exact_class("app.Main");
    let string = session.exact_class("java.lang.String");
    session.fields(|m| {
        m.declaring_class(main).is_static(true).is_final(true).key("constants");
    });
    session.fields(|m| {
        m.declaring_class(main).private(true).key("private");
    });
    session.fields(|m| {
        m.declaring_class(main).field_type(string).key("strings");
    });

    let result = session.run(&pool, &pool).unwrap();
    let main_id = pool.class_id("app.Main").unwrap();
    let names = |key: &str| -> Vec<String> {
        let fields = pool.declared_fields(main_id).unwrap();
        result
            .members(key)
            .iter()
            .map(|m| fields[m.index as usize].name.clone())
            .collect()
    };
    assert_eq!(names("constants"), vec!["TAG"]);
    assert_eq!(names("private"), vec!["count"]);
    // java.lang.String is a stub outside the catalog, so the constraint is dropped
    assert_eq!(names("strings"), vec!["count", "TAG"]);
}

#[test]
fn test_parameter_constraints() {
    let pool = app_pool();
    let mut session = Session::new();
    let main = session.exact_class("app.Main");
    let bundle = session.exact_class("app.Bundle");
    let event = session.exact_class("app.Event");

    session.constructors(|m| {
        m.declaring_class(main)
            .parameter_types(bundle.as_parameter(0).contained())
            .key("bundle_ctor");
    });
    session.constructors(|m| {
        m.declaring_class(main).parameter_count(0).key("default_ctor");
    });
    session.methods(|m| {
        m.declaring_class(main)
            .parameter_count(2)
            .parameter_types(event.as_parameter(0).contained().and(&bundle.not_contained()))
            .key("handle");
    });
    session.methods(|m| {
        m.declaring_class(main).return_type(bundle).key("returns_bundle");
    });
    session.methods(|m| {
        m.declaring_class(main)
            .parameter_types(event.as_parameter(1).contained())
            .key("event_second");
    });

    let result = session.run(&pool, &pool).unwrap();
    let main_id = pool.class_id("app.Main").unwrap();
    let ctors: Vec<ConstructorInfo> = pool.declared_constructors(main_id).unwrap();
    let methods: Vec<MethodInfo> = pool.declared_methods(main_id).unwrap();

    assert_eq!(result.members("bundle_ctor"), vec![ctors[1].member]);
    assert_eq!(result.members("default_ctor"), vec![ctors[0].member]);
    assert_eq!(result.members("handle"), vec![methods[2].member]);
    assert_eq!(result.members("returns_bundle"), vec![methods[2].member]);
    assert!(result.get("event_second").unwrap().is_empty());
}

#[test]
fn test_interface_containment() {
    let pool = app_pool();
    let mut session = Session::new();
    let listener = session.exact_class("app.Listener");
    let closeable = session.exact_class("app.Closeable");
    let interfaces = session.classes(|m| {
        m.name(NameFilter::prefix("app.")).is_interface(true);
    });

    session.classes(|m| {
        m.interfaces(listener.contained().and(&closeable.not_contained()))
            .key("listener_only");
    });
    session.classes(|m| {
        m.interfaces(interfaces.all_of()).key("all");
    });
    session.classes(|m| {
        m.interfaces(!interfaces.any_of()).name(NameFilter::prefix("app.")).key("none");
    });

    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(
        class_names(&pool, result.get("listener_only").unwrap()),
        vec!["app.Base", "app.Other"]
    );
    assert_eq!(class_names(&pool, result.get("all").unwrap()), vec!["app.Main"]);
    assert_eq!(
        class_names(&pool, result.get("none").unwrap()),
        vec!["app.Bundle", "app.Closeable", "app.Event", "app.Listener"]
    );
}

// ===== Misses, Observers and Pruning =====

#[test]
fn test_miss_policies() {
    let pool = app_pool();
    for (policy, expected) in [
        (MissPolicy::DisableConstraint, vec!["app.Main"]),
        (MissPolicy::ForceEmpty, vec![]),
    ] {
        let mut session = Session::with_config(SessionConfig {
            miss_policy: policy,
            ..Default::default()
        });
        let missing = session.exact_class("app.Missing");
        let dependent = session.classes(|m| {
            m.super_class(missing).name(NameFilter::prefix("app.M")).key("dependent");
        });
        let members = session.methods(|m| {
            m.declaring_class(missing).key("members");
        });

        let result = session.run(&pool, &pool).unwrap();
        assert_eq!(result.outcome(&missing), Some(Outcome::Missed));
        assert_eq!(class_names(&pool, result.values(&dependent)), expected);
        assert_eq!(result.outcome(&members), Some(Outcome::Missed));
    }
}

#[test]
fn test_miss_policies_on_containment_operands() {
    let pool = app_pool();
    for (policy, interface_matches, parameter_matches) in [
        (MissPolicy::DisableConstraint, vec!["app.Main"], 3),
        (MissPolicy::ForceEmpty, vec![], 0),
    ] {
        let mut session = Session::with_config(SessionConfig {
            miss_policy: policy,
            ..Default::default()
        });
        let missing = session.exact_class("app.Missing");
        let listener = session.exact_class("app.Listener");
        let main = session.exact_class("app.Main");
        let by_interface = session.classes(|m| {
            m.interfaces(missing.contained())
                .name(NameFilter::prefix("app.M"))
                .key("by_interface");
        });
        let mixed = session.classes(|m| {
            m.interfaces(listener.contained().and(&missing.not_contained()))
                .name(NameFilter::prefix("app.M"))
                .key("mixed");
        });
        let by_parameter = session.methods(|m| {
            m.declaring_class(main)
                .parameter_types(missing.contained())
                .key("by_parameter");
        });

        let result = session.run(&pool, &pool).unwrap();
        assert_eq!(class_names(&pool, result.values(&by_interface)), interface_matches);
        assert_eq!(class_names(&pool, result.values(&mixed)), interface_matches);
        assert_eq!(result.values(&by_parameter).len(), parameter_matches);
        if parameter_matches == 0 {
            assert_eq!(result.outcome(&by_parameter), Some(Outcome::Missed));
        }
    }
}

#[test]
fn test_observers_fire_once_per_outcome() {
    let pool = app_pool();
    let matched = Arc::new(AtomicUsize::new(0));
    let missed = Arc::new(AtomicUsize::new(0));

    let mut session = Session::new();
    let main = session.exact_class("app.Main");
    let missing = session.exact_class("app.Missing");
    {
        let matched = matched.clone();
        session.on_match(&main, move |values| {
            assert_eq!(values.len(), 1);
            matched.fetch_add(1, Ordering::SeqCst);
        });
    }
    {
        let missed = missed.clone();
        session.on_miss(&missing, move || {
            missed.fetch_add(1, Ordering::SeqCst);
        });
    }
    {
        let matched = matched.clone();
        session.on_match(&missing, move |_| {
            matched.fetch_add(100, Ordering::SeqCst);
        });
    }

    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(matched.load(Ordering::SeqCst), 1);
    assert_eq!(missed.load(Ordering::SeqCst), 1);
    assert_eq!(result.outcome(&main), Some(Outcome::Resolved));
}

#[test]
fn test_panicking_observer_does_not_block_dependents() {
    let pool = app_pool();
    let mut session = Session::new();
    let main = session.exact_class("app.Main");
    session.on_match(&main, |_| panic!("observer failed"));
    let run = session.methods(|m| {
        m.declaring_class(main).name("run").key("run");
    });

    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(result.outcome(&main), Some(Outcome::Resolved));
    assert_eq!(result.values(&run).len(), 1);

    let failures = result.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].slot, main.slot());
    assert_eq!(failures[0].message, "Task panicked: observer failed");
    assert_eq!(failures[0].decision, Decision::Continue);
}

#[test]
fn test_unconsumed_matchers_are_pruned() {
    let pool = app_pool();

    let mut session = Session::new();
    let unused = session.exact_class("app.Main");
    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(result.outcome(&unused), Some(Outcome::Pruned));

    let mut session = Session::with_config(SessionConfig {
        prune_unconsumed: false,
        ..Default::default()
    });
    let unused = session.exact_class("app.Main");
    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(result.outcome(&unused), Some(Outcome::Resolved));
}

// ===== Exception Policy =====

fn partially_broken_pool() -> MetadataPool {
    MetadataPool::from_sources(vec![SourceDef::new(vec![
        ClassDef::new("a.A"),
        ClassDef::new("a.C"),
        ClassDef::new("b.D"),
    ])
    .unresolvable("a.B")])
}

#[test]
fn test_abort_stops_only_the_failing_matcher() {
    let pool = partially_broken_pool();
    let mut session = Session::new();
    session.set_exception_handler(|_| Decision::Abort);
    let x = session.classes(|m| {
        m.name(NameFilter::prefix("a.")).key("x");
    });
    let y = session.classes(|m| {
        m.name("a.C").key("y");
    });

    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(class_names(&pool, result.values(&x)), vec!["a.A"]);
    assert_eq!(class_names(&pool, result.values(&y)), vec!["a.C"]);

    assert_eq!(result.failures().len(), 1);
    let failure = &result.failures()[0];
    assert_eq!(failure.decision, Decision::Abort);
    assert_eq!(failure.message, "Class not found: a.B");
}

#[test]
fn test_continue_skips_failed_candidate() {
    let pool = partially_broken_pool();
    let seen = Arc::new(AtomicUsize::new(0));
    let mut session = Session::new();
    {
        let seen = seen.clone();
        session.set_exception_handler(move |failure| {
            assert!(failure.to_string().contains("a.B"));
            seen.fetch_add(1, Ordering::SeqCst);
            Decision::Continue
        });
    }
    let x = session.classes(|m| {
        m.name(NameFilter::prefix("a.")).key("x");
    });

    let result = session.run(&pool, &pool).unwrap();
    assert_eq!(class_names(&pool, result.values(&x)), vec!["a.A", "a.C"]);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

/// Delegates to a pool but panics when asked for the methods of one class
struct Faulty {
    inner: MetadataPool,
    poisoned: ClassId,
}

impl Reflector for Faulty {
    fn load_class(&self, name: &str) -> Result<ClassId, ResolveError> {
        self.inner.load_class(name)
    }

    fn class_name(&self, class: ClassId) -> Result<String, ResolveError> {
        self.inner.class_name(class)
    }

    fn class_modifiers(&self, class: ClassId) -> Result<Modifiers, ResolveError> {
        self.inner.class_modifiers(class)
    }

    fn superclass(&self, class: ClassId) -> Result<Option<ClassId>, ResolveError> {
        self.inner.superclass(class)
    }

    fn interfaces(&self, class: ClassId) -> Result<Vec<ClassId>, ResolveError> {
        self.inner.interfaces(class)
    }

    fn declared_fields(&self, class: ClassId) -> Result<Vec<FieldInfo>, ResolveError> {
        if class == self.poisoned {
            return Err(ResolveError::Linkage {
                class: "app.Main".to_string(),
                reason: "field table corrupt".to_string(),
            });
        }
        self.inner.declared_fields(class)
    }

    fn declared_methods(&self, class: ClassId) -> Result<Vec<MethodInfo>, ResolveError> {
        if class == self.poisoned {
            panic!("method table unreadable");
        }
        self.inner.declared_methods(class)
    }

    fn declared_constructors(&self, class: ClassId) -> Result<Vec<ConstructorInfo>, ResolveError> {
        self.inner.declared_constructors(class)
    }
}

#[test]
fn test_task_failures_publish_empty_and_continue() {
    let pool = app_pool();
    let poisoned = pool.class_id("app.Main").unwrap();
    let faulty = Faulty {
        inner: app_pool(),
        poisoned,
    };

    let mut session = Session::new();
    let main = session.exact_class("app.Main");
    let methods = session.methods(|m| {
        m.declaring_class(main).key("methods");
    });
    let fields = session.fields(|m| {
        m.declaring_class(main).key("fields");
    });
    let ctors = session.constructors(|m| {
        m.declaring_class(main).key("ctors");
    });

    let result = session.run(&pool, &faulty).unwrap();
    assert_eq!(result.outcome(&methods), Some(Outcome::Missed));
    assert_eq!(result.outcome(&fields), Some(Outcome::Missed));
    assert_eq!(result.values(&ctors).len(), 2);

    let mut messages: Vec<&str> = result.failures().iter().map(|f| f.message.as_str()).collect();
    messages.sort();
    assert_eq!(
        messages,
        vec![
            "Failed to link app.Main: field table corrupt",
            "Task panicked: method table unreadable"
        ]
    );
}

// ===== Concurrency =====

#[test]
fn test_pool_size_does_not_change_results() {
    let pool = app_pool();
    let run = |workers: WorkerPool| {
        let mut session = Session::new();
        session.set_worker_pool(workers);
        let base = session.exact_class("app.Base");
        let bundle = session.exact_class("app.Bundle");
        session.classes(|m| {
            m.super_class(base).key("subclasses");
        });
        let main = session.first_class(|m| {
            m.super_class(base).name("app.Main");
        });
        session.methods(|m| {
            m.declaring_class(main).public(true).key("public_methods");
        });
        session.constructors(|m| {
            m.declaring_class(main)
                .parameter_types(bundle.contained())
                .key("bundle_ctors");
        });
        session.fields(|m| {
            m.declaring_class(main).key("fields");
        });
        session.run(&pool, &pool).unwrap()
    };

    let inline = run(WorkerPool::inline());
    for threads in [2, 8] {
        assert_eq!(run(WorkerPool::new(threads)), inline);
    }
    assert_eq!(inline.members("public_methods").len(), 2);
    assert_eq!(inline.members("bundle_ctors").len(), 1);
    assert_eq!(inline.classes("subclasses").len(), 2);
}
