use ferrous_inject::{
    CallArgs, Callable, DiError, InitHook, Injectable, Origin, Parameter, Resolver, Strategy, TypeDescriptor,
    TypeExpr, TypeRegistration, TypeRegistry,
};
use std::sync::{Arc, Mutex};

fn counting<T: Send + Sync + 'static>(
    name: &'static str,
    counter: Arc<Mutex<u32>>,
    make: fn() -> T,
) -> Callable<T> {
    Callable::new(name, move |_| {
        *counter.lock().unwrap() += 1;
        Ok(make())
    })
}

#[test]
fn test_singleton_identity() {
    struct Config;
    let counter = Arc::new(Mutex::new(0));

    let mut registry = TypeRegistry::new();
    registry
        .add_factory(Strategy::Singleton, counting("Config", counter.clone(), || Config))
        .unwrap();
    let resolver = registry.build().unwrap();

    let a = resolver.require::<Config>().unwrap();
    let b = resolver.require::<Config>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(*counter.lock().unwrap(), 1);
}

#[test]
fn test_transient_creates_new_instances() {
    struct Job;
    let counter = Arc::new(Mutex::new(0));

    let mut registry = TypeRegistry::new();
    registry
        .add_factory(Strategy::Transient, counting("Job", counter.clone(), || Job))
        .unwrap();
    let resolver = registry.build().unwrap();

    let a = resolver.require::<Job>().unwrap();
    let b = resolver.require::<Job>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(*counter.lock().unwrap(), 2);
}

#[test]
fn test_registered_instance() {
    let mut registry = TypeRegistry::new();
    registry.add_instance(42usize).unwrap().add_instance("hello".to_string()).unwrap();
    let resolver = registry.build().unwrap();

    assert_eq!(*resolver.require::<usize>().unwrap(), 42);
    assert_eq!(*resolver.require::<String>().unwrap(), "hello");
    assert!(Arc::ptr_eq(
        &resolver.require::<usize>().unwrap(),
        &resolver.require::<usize>().unwrap()
    ));
}

// A depends on B and C, B and C both depend on the singleton D
struct D;
struct B {
    d: Arc<D>,
}
struct C {
    d: Arc<D>,
}
struct A {
    b: Arc<B>,
    c: Arc<C>,
}

impl Injectable for D {
    fn constructor() -> Callable<Self> {
        Callable::new("D", |_| Ok(D))
    }
}

impl Injectable for B {
    fn constructor() -> Callable<Self> {
        Callable::new("B", |args| Ok(B { d: args.get("d")? })).param(Parameter::injectable::<D>("d"))
    }
}

impl Injectable for C {
    fn constructor() -> Callable<Self> {
        Callable::new("C", |args| Ok(C { d: args.get("d")? })).param(Parameter::injectable::<D>("d"))
    }
}

impl Injectable for A {
    fn constructor() -> Callable<Self> {
        Callable::new("A", |args| {
            Ok(A {
                b: args.get("b")?,
                c: args.get("c")?,
            })
        })
        .param(Parameter::injectable::<B>("b"))
        .param(Parameter::injectable::<C>("c"))
    }
}

#[test]
fn test_shared_singleton_in_graph() {
    let mut registry = TypeRegistry::new();
    registry
        .add_transient::<A>()
        .unwrap()
        .add_transient::<B>()
        .unwrap()
        .add_transient::<C>()
        .unwrap()
        .add_singleton::<D>()
        .unwrap();
    let resolver = registry.build().unwrap();

    let a = resolver.require::<A>().unwrap();
    assert!(Arc::ptr_eq(&a.b.d, &a.c.d));
    assert!(Arc::ptr_eq(&a.b.d, &resolver.require::<D>().unwrap()));
}

#[test]
fn test_not_registered_names_type_parameter_and_callable() {
    let mut registry = TypeRegistry::new();
    registry.add_transient::<B>().unwrap();
    let resolver = registry.build().unwrap();

    match resolver.require::<B>() {
        Err(DiError::TypeNotRegistered { type_name, site: Some(site) }) => {
            assert_eq!(type_name, "D");
            assert_eq!(site.param, "d");
            assert_eq!(site.callable, "B");
        }
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }

    let err = resolver.require::<D>().err().unwrap();
    assert!(err.to_string().contains("Type D is not a registered type"));
}

#[test]
fn test_nullable_parameter_gets_none() {
    struct Cache;
    struct Service {
        cache: Option<Arc<Cache>>,
    }

    let mut registry = TypeRegistry::new();
    registry
        .add_factory(
            Strategy::Transient,
            Callable::new("Service", |args| Ok(Service { cache: args.get_optional("cache")? }))
                .param(Parameter::new("cache", TypeExpr::of::<Cache>().or_none())),
        )
        .unwrap();
    let resolver = registry.build().unwrap();

    assert!(resolver.require::<Service>().unwrap().cache.is_none());
}

#[test]
fn test_default_used_when_not_registered() {
    let handler = Callable::new("handler", |args| Ok(args.cloned::<u32>("retries")?))
        .param(Parameter::of::<u32>("retries").default(3u32));

    let resolver = TypeRegistry::new().build().unwrap();
    assert_eq!(resolver.call(&handler, CallArgs::new()).unwrap(), 3);
    assert_eq!(resolver.call(&handler, CallArgs::new().arg(5u32)).unwrap(), 5);

    let mut registry = TypeRegistry::new();
    registry.add_instance(9u32).unwrap();
    let resolver = registry.build().unwrap();
    assert_eq!(resolver.call(&handler, CallArgs::new()).unwrap(), 9);
}

#[test]
fn test_preset_constructor_arguments() {
    struct Endpoint {
        host: String,
        port: u16,
    }

    let mut registry = TypeRegistry::new();
    registry
        .register(
            TypeRegistration::<Endpoint>::new(Strategy::Singleton)
                .factory(
                    Callable::new("Endpoint", |args| {
                        Ok(Endpoint {
                            host: args.cloned("host")?,
                            port: args.cloned("port")?,
                        })
                    })
                    .param(Parameter::of::<String>("host"))
                    .param(Parameter::of::<u16>("port")),
                )
                .arg("localhost".to_string())
                .named_arg("port", 8080u16),
        )
        .unwrap();
    let resolver = registry.build().unwrap();

    let endpoint = resolver.require::<Endpoint>().unwrap();
    assert_eq!(endpoint.host, "localhost");
    assert_eq!(endpoint.port, 8080);
}

#[test]
fn test_build_immediately() {
    struct Warm;
    let counter = Arc::new(Mutex::new(0));

    let mut registry = TypeRegistry::new();
    registry
        .register(
            TypeRegistration::<Warm>::new(Strategy::Singleton)
                .factory(counting("Warm", counter.clone(), || Warm))
                .build_immediately(),
        )
        .unwrap();

    let resolver = registry.build().unwrap();
    assert_eq!(*counter.lock().unwrap(), 1);
    resolver.require::<Warm>().unwrap();
    assert_eq!(*counter.lock().unwrap(), 1);
}

#[test]
fn test_resolver_and_descriptor_parameters() {
    struct Target;

    let handler = Callable::new("handler", |args| {
        let resolver = args.get::<Resolver>("resolver")?;
        let target = args.get::<TypeDescriptor>("target")?;
        Ok((resolver.is_session(), target.to_string()))
    })
    .param(Parameter::of::<Resolver>("resolver"))
    .param(Parameter::new("target", ferrous_inject::descriptor_of(TypeExpr::of::<Target>())));

    let resolver = TypeRegistry::new().build().unwrap();
    assert_eq!(resolver.call(&handler, CallArgs::new()).unwrap(), (false, "Target".to_string()));

    let session = resolver.get_scoped_session();
    assert_eq!(session.call(&handler, CallArgs::new()).unwrap(), (true, "Target".to_string()));
}

#[test]
fn test_of_type_and_is_registered() {
    struct Animal;
    struct Dog;
    struct Cat;
    struct Rock;

    let animal = TypeDescriptor::of::<Animal>();
    let mut registry = TypeRegistry::new();
    registry
        .register(
            TypeRegistration::<Dog>::new(Strategy::Transient)
                .factory(Callable::new("Dog", |_| Ok(Dog)))
                .base(animal.clone()),
        )
        .unwrap()
        .register(TypeRegistration::<Rock>::new(Strategy::Transient).factory(Callable::new("Rock", |_| Ok(Rock))))
        .unwrap()
        .register(
            TypeRegistration::<Cat>::new(Strategy::Transient)
                .factory(Callable::new("Cat", |_| Ok(Cat)))
                .base(animal),
        )
        .unwrap();

    let names: Vec<String> = registry
        .of_type(&Origin::of::<Animal>())
        .iter()
        .map(|r| r.descriptor().to_string())
        .collect();
    assert_eq!(names, vec!["Dog", "Cat"]);

    let resolver = registry.build().unwrap();
    assert!(resolver.is_registered(&TypeExpr::of::<Dog>()));
    assert!(!resolver.is_registered(&TypeExpr::of::<Animal>()));
}

struct Clock;

/// Never registered; built on demand with `instantiate`.
struct Greeting {
    name: String,
    clock: Arc<Clock>,
    warmed: bool,
}

impl Injectable for Greeting {
    fn constructor() -> Callable<Self> {
        Callable::new("Greeting", |args| {
            Ok(Greeting {
                name: args.cloned::<String>("name")?,
                clock: args.get("clock")?,
                warmed: false,
            })
        })
        .param(Parameter::untyped("name"))
        .param(Parameter::of::<Clock>("clock"))
    }

    fn init_hooks() -> Vec<InitHook<Self>> {
        vec![InitHook::new("Greeting::warm", |g: &mut Greeting, _| {
            g.warmed = true;
            Ok(())
        })]
    }
}

#[test]
fn test_instantiate_unregistered_type() {
    let mut registry = TypeRegistry::new();
    registry
        .add_factory(Strategy::Singleton, Callable::new("Clock", |_| Ok(Clock)))
        .unwrap();
    let resolver = registry.build().unwrap();

    let first = resolver
        .instantiate::<Greeting>(CallArgs::new().named("name", "Ada".to_string()))
        .unwrap();
    let second = resolver
        .instantiate::<Greeting>(CallArgs::new().arg("Grace".to_string()))
        .unwrap();

    assert_eq!(first.name, "Ada");
    assert_eq!(second.name, "Grace");
    assert!(first.warmed && second.warmed);
    assert!(Arc::ptr_eq(&first.clock, &resolver.require::<Clock>().unwrap()));
    assert!(Arc::ptr_eq(&first.clock, &second.clock));

    // nothing was registered or cached for Greeting
    assert!(!resolver.is_registered(&TypeExpr::injectable::<Greeting>()));
    assert!(matches!(
        resolver.require::<Greeting>(),
        Err(DiError::TypeNotRegistered { .. })
    ));

    assert!(matches!(
        resolver.instantiate::<Greeting>(CallArgs::new()),
        Err(DiError::AnnotationMissing { .. })
    ));
}
