use ferrous_inject::{Callable, DiError, Injectable, Parameter, Strategy, TypeRegistry};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// Concurrent first resolutions of a singleton must build it exactly once.
#[test]
fn test_singleton_built_once_under_contention() {
    struct Expensive;
    let builds = Arc::new(AtomicU32::new(0));
    let counter = builds.clone();

    let mut registry = TypeRegistry::new();
    registry
        .add_factory(
            Strategy::Singleton,
            Callable::new("Expensive", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                Ok(Expensive)
            }),
        )
        .unwrap();
    let resolver = registry.build().unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = resolver.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                resolver.require::<Expensive>().unwrap()
            })
        })
        .collect();

    let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
}

/// A failed build leaves nothing cached; a later request retries.
#[test]
fn test_failed_singleton_build_is_retried() {
    struct Flaky;
    let fail = Arc::new(AtomicBool::new(true));
    let toggle = fail.clone();

    let mut registry = TypeRegistry::new();
    registry
        .add_factory(
            Strategy::Singleton,
            Callable::new("Flaky", move |_| {
                if toggle.load(Ordering::SeqCst) {
                    return Err(DiError::InvalidRegistration {
                        type_name: "Flaky".into(),
                        reason: "backend unavailable".into(),
                    });
                }
                Ok(Flaky)
            }),
        )
        .unwrap();
    let resolver = registry.build().unwrap();

    assert!(resolver.require::<Flaky>().is_err());
    fail.store(false, Ordering::SeqCst);
    let a = resolver.require::<Flaky>().unwrap();
    let b = resolver.require::<Flaky>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

struct Pool;
struct Worker {
    pool: Arc<Pool>,
}

impl Injectable for Pool {
    fn constructor() -> Callable<Self> {
        Callable::new("Pool", |_| Ok(Pool))
    }
}

impl Injectable for Worker {
    fn constructor() -> Callable<Self> {
        Callable::new("Worker", |args| Ok(Worker { pool: args.get("pool")? })).param(Parameter::injectable::<Pool>("pool"))
    }
}

/// Sessions on different threads keep their scoped instances apart while
/// sharing singletons.
#[test]
fn test_sessions_on_many_threads() {
    let mut registry = TypeRegistry::new();
    registry.add_singleton::<Pool>().unwrap().add_scoped::<Worker>().unwrap();
    let resolver = registry.build().unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let resolver = resolver.clone();
            thread::spawn(move || {
                let session = resolver.get_scoped_session();
                let a = session.require::<Worker>().unwrap();
                let b = session.require::<Worker>().unwrap();
                assert!(Arc::ptr_eq(&a, &b));
                session.close_session();
                a
            })
        })
        .collect();

    let workers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for pair in workers.windows(2) {
        assert!(!Arc::ptr_eq(&pair[0], &pair[1]));
        assert!(Arc::ptr_eq(&pair[0].pool, &pair[1].pool));
    }
}

/// Resolvers are handed across tokio tasks.
#[tokio::test]
async fn test_resolver_across_tasks() {
    let mut registry = TypeRegistry::new();
    registry.add_singleton::<Pool>().unwrap().add_transient::<Worker>().unwrap();
    let resolver = registry.build().unwrap();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let resolver = resolver.clone();
        tasks.push(tokio::spawn(async move { resolver.require::<Worker>().unwrap() }));
    }

    let mut workers = Vec::new();
    for task in tasks {
        workers.push(task.await.unwrap());
    }
    assert!(workers.windows(2).all(|w| Arc::ptr_eq(&w[0].pool, &w[1].pool)));
}
