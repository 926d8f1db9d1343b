use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_inject::*;
use std::sync::Arc;

// ===== Micro Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let mut registry = TypeRegistry::new();
    registry.add_instance(42u64).unwrap();
    let resolver = registry.build().unwrap();

    c.bench_function("singleton_hit_u64", |b| {
        b.iter(|| {
            let v = resolver.require::<u64>().unwrap();
            black_box(v);
        })
    });
}

fn bench_singleton_cold(c: &mut Criterion) {
    struct ExpensiveToCreate {
        data: Vec<u64>,
    }

    c.bench_function("singleton_cold_expensive", |b| {
        b.iter_batched(
            || {
                let mut registry = TypeRegistry::new();
                registry
                    .add_factory(
                        Strategy::Singleton,
                        Callable::new("ExpensiveToCreate", |_| {
                            Ok(ExpensiveToCreate {
                                data: (0..1000).collect(),
                            })
                        }),
                    )
                    .unwrap();
                registry.build().unwrap()
            },
            |resolver| {
                let v = resolver.require::<ExpensiveToCreate>().unwrap();
                black_box(v.data.len());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_scoped_vs_transient(c: &mut Criterion) {
    struct Service {
        data: [u8; 64],
    }

    let mut group = c.benchmark_group("scoped_vs_transient");

    for strategy in [Strategy::Scoped, Strategy::Transient] {
        let mut registry = TypeRegistry::new();
        registry
            .add_factory(strategy, Callable::new("Service", |_| Ok(Service { data: [0; 64] })))
            .unwrap();
        let resolver = registry.build().unwrap();
        let session = resolver.get_scoped_session();

        group.bench_function(strategy.as_str(), |b| {
            b.iter(|| {
                let v = session.require::<Service>().unwrap();
                black_box(v.data[0]);
            })
        });
    }

    group.finish();
}

fn bench_session_lifecycle(c: &mut Criterion) {
    struct UnitOfWork;

    let mut registry = TypeRegistry::new();
    registry
        .add_factory(Strategy::Scoped, Callable::new("UnitOfWork", |_| Ok(UnitOfWork)))
        .unwrap();
    let resolver = registry.build().unwrap();

    c.bench_function("session_open_resolve_close", |b| {
        b.iter(|| {
            let session = resolver.get_scoped_session();
            black_box(session.require::<UnitOfWork>().unwrap());
            session.close_session();
        })
    });
}

struct Entity;

struct Repository;

impl Injectable for Repository {
    const TYPE_PARAMS: &'static [&'static str] = &["T"];

    fn constructor() -> Callable<Self> {
        Callable::new("Repository", |_| Ok(Repository))
    }
}

fn bench_generic_resolution(c: &mut Criterion) {
    let mut registry = TypeRegistry::new();
    registry
        .register(TypeRegistration::<Repository>::injectable(Strategy::Singleton).match_all())
        .unwrap();
    let resolver = registry.build().unwrap();
    let expr = TypeExpr::generic_of::<Repository>([TypeExpr::of::<Entity>()]);
    resolver.require_type::<Repository>(&expr).unwrap();

    c.bench_function("generic_match_all_hit", |b| {
        b.iter(|| {
            let v = resolver.require_type::<Repository>(black_box(&expr)).unwrap();
            black_box(v);
        })
    });
}

fn bench_call_binding(c: &mut Criterion) {
    struct Mailer;
    struct Clock;

    let mut registry = TypeRegistry::new();
    registry.add_instance(Mailer).unwrap().add_instance(Clock).unwrap();
    let resolver = registry.build().unwrap();

    let handler = Callable::new("handler", |args| {
        args.get::<Mailer>("mailer")?;
        args.get::<Clock>("clock")?;
        Ok(*args.get::<u32>("id")?)
    })
    .param(Parameter::of::<Mailer>("mailer"))
    .param(Parameter::of::<Clock>("clock"))
    .param(Parameter::untyped("id"));

    c.bench_function("call_two_injected_one_supplied", |b| {
        b.iter(|| {
            let out = resolver.call(&handler, CallArgs::new().named("id", 7u32)).unwrap();
            black_box(out);
        })
    });
}

/// `Link[T]` depends on `T`, so `Link[Link[End]]` is a two-link chain.
struct Link;

impl Injectable for Link {
    const TYPE_PARAMS: &'static [&'static str] = &["T"];

    fn constructor() -> Callable<Self> {
        Callable::new("Link", |_| Ok(Link)).param(Parameter::new("next", TypeExpr::var("T")))
    }
}

struct End;

fn bench_dependency_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_depth");

    let mut registry = TypeRegistry::new();
    registry
        .register(TypeRegistration::<Link>::injectable(Strategy::Transient).match_all())
        .unwrap()
        .add_factory(Strategy::Transient, Callable::new("End", |_| Ok(End)))
        .unwrap();
    let resolver = registry.build().unwrap();

    for depth in [1usize, 5, 10, 20] {
        let expr = (0..depth).fold(TypeExpr::of::<End>(), |inner, _| TypeExpr::generic_of::<Link>([inner]));
        group.bench_with_input(BenchmarkId::new("transient_chain", depth), &expr, |b, expr| {
            b.iter(|| {
                let v = resolver.require_type::<Link>(expr).unwrap();
                black_box(v);
            })
        });
    }

    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");

    let mut registry = TypeRegistry::new();
    registry.add_instance(42u64).unwrap();
    let resolver = registry.build().unwrap();

    for &thread_count in &[1u64, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("singleton_threads", thread_count),
            &thread_count,
            |b, &threads| {
                b.iter_custom(|iters| {
                    let start = std::time::Instant::now();
                    std::thread::scope(|s| {
                        for _ in 0..threads {
                            let resolver = &resolver;
                            s.spawn(move || {
                                for _ in 0..iters / threads {
                                    black_box(resolver.require::<u64>().unwrap());
                                }
                            });
                        }
                    });
                    start.elapsed()
                })
            },
        );
    }

    group.finish();
}

// ===== Macro Benchmarks =====

fn bench_mixed_workload(c: &mut Criterion) {
    // 70% singleton hits, 20% scoped hits, 10% transient builds
    struct SingletonService(u64);
    struct ScopedService(u64);
    struct TransientService(u64);

    let mut registry = TypeRegistry::new();
    registry
        .add_instance(SingletonService(1))
        .unwrap()
        .add_factory(Strategy::Scoped, Callable::new("ScopedService", |_| Ok(ScopedService(2))))
        .unwrap()
        .add_factory(
            Strategy::Transient,
            Callable::new("TransientService", |_| Ok(TransientService(3))),
        )
        .unwrap();
    let resolver = registry.build().unwrap();
    let session = resolver.get_scoped_session();
    let _ = session.require::<ScopedService>().unwrap();

    c.bench_function("mixed_workload_realistic", |b| {
        b.iter(|| {
            for _ in 0..7 {
                let v = resolver.require::<SingletonService>().unwrap();
                black_box(v.0);
            }
            for _ in 0..2 {
                let v = session.require::<ScopedService>().unwrap();
                black_box(v.0);
            }
            let v: Arc<TransientService> = resolver.require().unwrap();
            black_box(v.0);
        })
    });
}

criterion_group!(
    micro_benches,
    bench_singleton_hit,
    bench_singleton_cold,
    bench_scoped_vs_transient,
    bench_session_lifecycle,
    bench_generic_resolution,
    bench_call_binding,
    bench_dependency_depth,
    bench_contention
);

criterion_group!(macro_benches, bench_mixed_workload);

criterion_main!(micro_benches, macro_benches);
