//! Property-based tests for resolution
//!
//! These tests check caching, binding and depth behavior over generated
//! registrations and call shapes rather than fixed examples.

use ferrous_inject::{
    AnyArc, ArgResolverOptions, ArgumentResolver, CallArgs, Callable, ContainerConfig, DiError, DiResult,
    Injectable, Parameter, Signature, TypeExpr, TypeRegistration, TypeRegistry,
};
use ferrous_inject::Strategy as Lifetime;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Named {
    value: String,
}

proptest! {
    #[test]
    fn singleton_instance_is_stable(value in "\\PC{0,50}") {
        let mut registry = TypeRegistry::new();
        registry.add_instance(Named { value: value.clone() }).unwrap();
        let resolver = registry.build().unwrap();

        let first = resolver.require::<Named>().unwrap();
        let second = resolver.get_scoped_session().require::<Named>().unwrap();
        prop_assert!(Arc::ptr_eq(&first, &second));
        prop_assert_eq!(&first.value, &value);
    }
}

fn lifetime() -> impl Strategy<Value = Lifetime> {
    prop_oneof![
        Just(Lifetime::Singleton),
        Just(Lifetime::Scoped),
        Just(Lifetime::Transient),
    ]
}

struct Counted;

proptest! {
    #[test]
    fn builds_follow_strategy(
        strategy in lifetime(),
        sessions in 1usize..5,
        per_session in 1usize..5,
    ) {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();

        let mut registry = TypeRegistry::new();
        registry
            .add_factory(strategy, Callable::new("Counted", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Counted)
            }))
            .unwrap();
        let resolver = registry.build().unwrap();

        for _ in 0..sessions {
            let session = resolver.get_scoped_session();
            for _ in 0..per_session {
                session.require::<Counted>().unwrap();
            }
            session.close_session();
        }

        let expected = match strategy {
            Lifetime::Singleton => 1,
            Lifetime::Scoped => sessions,
            Lifetime::Transient => sessions * per_session,
        };
        prop_assert_eq!(builds.load(Ordering::SeqCst), expected);
    }
}

struct Marker;

struct Fixed {
    id: usize,
    priority: i32,
}

impl ArgumentResolver for Fixed {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn supports(&self, options: &ArgResolverOptions<'_>) -> bool {
        options.descriptor.origin().type_id() == std::any::TypeId::of::<Marker>()
    }

    fn resolve(&self, _options: &ArgResolverOptions<'_>) -> DiResult<AnyArc> {
        Ok(Arc::new(self.id))
    }
}

proptest! {
    #[test]
    fn first_highest_priority_resolver_wins(priorities in prop::collection::vec(-5i32..5, 1..8)) {
        let mut registry = TypeRegistry::new();
        for (id, priority) in priorities.iter().enumerate() {
            registry.add_arg_resolver(Arc::new(Fixed { id, priority: *priority }));
        }
        let resolver = registry.build().unwrap();

        let handler = Callable::new("handler", |args| Ok(*args.get::<usize>("marker")?))
            .param(Parameter::of::<Marker>("marker"));
        let winner = resolver.call(&handler, CallArgs::new()).unwrap();

        let best = priorities.iter().copied().max().unwrap();
        let expected = priorities.iter().position(|p| *p == best).unwrap();
        prop_assert_eq!(winner, expected);
    }
}

proptest! {
    #[test]
    fn positional_and_named_binding_agree(values in prop::collection::vec(0u32..1000, 1..8), split in 0usize..8) {
        let names: Vec<String> = (0..values.len()).map(|i| format!("p{}", i)).collect();
        let signature: Signature = names.iter().map(|n| Parameter::untyped(n.as_str())).collect();
        let body_names = names.clone();
        let sum = Callable::new("sum", move |args| {
            let mut total = 0u32;
            for name in &body_names {
                total += *args.get::<u32>(name)?;
            }
            Ok(total)
        })
        .with_signature(signature);

        let split = split.min(values.len());
        let mut args = CallArgs::new();
        for value in &values[..split] {
            args = args.arg(*value);
        }
        for (name, value) in names[split..].iter().zip(&values[split..]) {
            args = args.named(name.clone(), *value);
        }

        let resolver = TypeRegistry::new().build().unwrap();
        prop_assert_eq!(resolver.call(&sum, args).unwrap(), values.iter().sum::<u32>());
    }
}

/// `Node[T]` depends on whatever `T` is, so `Node[Node[Leaf]]` is a chain of
/// three builds.
struct Node {
    depth: usize,
}

impl Injectable for Node {
    const TYPE_PARAMS: &'static [&'static str] = &["T"];

    fn constructor() -> Callable<Self> {
        Callable::new("Node", |args| {
            let below = args
                .raw("inner")
                .and_then(|inner| inner.downcast_ref::<Node>())
                .map(|n| n.depth)
                .unwrap_or(0);
            Ok(Node { depth: below + 1 })
        })
        .param(Parameter::new("inner", TypeExpr::var("T")))
    }
}

struct Leaf;

fn nested(levels: usize) -> TypeExpr {
    (0..levels).fold(TypeExpr::of::<Leaf>(), |inner, _| TypeExpr::generic_of::<Node>([inner]))
}

proptest! {
    #[test]
    fn depth_limit_is_exact(levels in 1usize..12, max_depth in 1usize..12) {
        let mut registry = TypeRegistry::new();
        registry
            .with_config(ContainerConfig::default().max_depth(max_depth))
            .register(TypeRegistration::<Node>::injectable(Lifetime::Transient).match_all())
            .unwrap()
            .add_factory(Lifetime::Transient, Callable::new("Leaf", |_| Ok(Leaf)))
            .unwrap();
        let resolver = registry.build().unwrap();

        let result = resolver.require_type::<Node>(&nested(levels));
        // the leaf is one more build below the outermost node
        if levels < max_depth {
            prop_assert_eq!(result.unwrap().depth, levels);
        } else {
            prop_assert!(matches!(result, Err(DiError::DepthExceeded(d)) if d == max_depth));
        }
    }
}
