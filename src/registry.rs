//! Type registrations and the startup-time registry.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::arg_resolver::ArgumentResolver;
use crate::callable::{AnyArc, Callable, Injectable};
use crate::config::ContainerConfig;
use crate::context::ScopeContext;
use crate::error::{DiError, DiResult};
use crate::hooks::{self, ErasedHook, InitHook};
use crate::observer::{Observers, ResolutionObserver};
use crate::resolver::Resolver;
use crate::strategy::Strategy;
use crate::types::{Origin, TypeDescriptor, TypeExpr};

pub(crate) type ErasedFactory = Callable<Box<dyn Any + Send + Sync>>;

/// Builder describing how one type is provided.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{Callable, Strategy, TypeExpr, TypeRegistration, TypeRegistry};
///
/// struct Repository;
/// struct User;
///
/// let mut registry = TypeRegistry::new();
/// // Repository[User] only
/// registry.register(
///     TypeRegistration::<Repository>::new(Strategy::Singleton)
///         .as_generic(&["T"])
///         .type_args([TypeExpr::of::<User>()])
///         .factory(Callable::new("Repository", |_| Ok(Repository))),
/// ).unwrap();
/// ```
pub struct TypeRegistration<T> {
    origin: Origin,
    strategy: Strategy,
    factory: Option<Callable<T>>,
    explicit_factory: bool,
    instance: Option<Arc<T>>,
    match_all: bool,
    build_immediately: bool,
    type_args: Vec<TypeExpr>,
    ancestors: Vec<TypeDescriptor>,
    own_hooks: Vec<InitHook<T>>,
    base_hooks: Vec<(TypeDescriptor, InitHook<T>)>,
    before_init: Vec<InitHook<T>>,
    after_init: Vec<InitHook<T>>,
    args: Vec<AnyArc>,
    named_args: IndexMap<String, AnyArc>,
}

impl<T: Any + Send + Sync> TypeRegistration<T> {
    /// Registration without a constructor; supply `factory` or `instance`.
    pub fn new(strategy: Strategy) -> Self {
        Self {
            origin: Origin::of::<T>(),
            strategy,
            factory: None,
            explicit_factory: false,
            instance: None,
            match_all: false,
            build_immediately: false,
            type_args: Vec::new(),
            ancestors: Vec::new(),
            own_hooks: Vec::new(),
            base_hooks: Vec::new(),
            before_init: Vec::new(),
            after_init: Vec::new(),
            args: Vec::new(),
            named_args: IndexMap::new(),
        }
    }

    pub fn factory(mut self, factory: Callable<T>) -> Self {
        self.factory = Some(factory);
        self.explicit_factory = true;
        self
    }

    /// Pre-built instance; only valid for singletons.
    pub fn instance(self, value: T) -> Self {
        self.shared_instance(Arc::new(value))
    }

    pub fn shared_instance(mut self, value: Arc<T>) -> Self {
        self.instance = Some(value);
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Covers every argument tuple of this generic origin. Exact
    /// registrations of the same origin take precedence.
    pub fn match_all(mut self) -> Self {
        self.match_all = true;
        self
    }

    /// Build the singleton when the registry is built instead of on first use.
    pub fn build_immediately(mut self) -> Self {
        self.build_immediately = true;
        self
    }

    /// Declares the runtime generic parameters of `T`.
    pub fn as_generic(mut self, params: &'static [&'static str]) -> Self {
        self.origin = self.origin.with_params(params);
        self
    }

    /// Concrete type arguments this registration is for.
    pub fn type_args(mut self, args: impl IntoIterator<Item = TypeExpr>) -> Self {
        self.type_args = args.into_iter().collect();
        self
    }

    /// Adds an ancestor. List ancestors nearest first.
    pub fn base(mut self, ancestor: TypeDescriptor) -> Self {
        self.ancestors.push(ancestor);
        self
    }

    /// Hook declared by the registered type itself.
    pub fn init_hook(mut self, hook: InitHook<T>) -> Self {
        self.own_hooks.push(hook);
        self
    }

    /// Hook inherited from `ancestor`; it runs before the hooks of every
    /// type nearer to `T`.
    pub fn base_init_hook(mut self, ancestor: &TypeDescriptor, hook: InitHook<T>) -> Self {
        self.base_hooks.push((ancestor.clone(), hook));
        self
    }

    /// Callback for this registration only, run before every type hook.
    pub fn before_init(mut self, hook: InitHook<T>) -> Self {
        self.before_init.push(hook);
        self
    }

    /// Callback for this registration only, run after every type hook.
    pub fn after_init(mut self, hook: InitHook<T>) -> Self {
        self.after_init.push(hook);
        self
    }

    /// Preset positional constructor argument.
    pub fn arg<V: Any + Send + Sync>(mut self, value: V) -> Self {
        self.args.push(Arc::new(value));
        self
    }

    /// Preset named constructor argument.
    pub fn named_arg<V: Any + Send + Sync>(mut self, name: impl Into<String>, value: V) -> Self {
        self.named_args.insert(name.into(), Arc::new(value));
        self
    }

    fn invalid(&self, reason: impl Into<String>) -> DiError {
        DiError::InvalidRegistration {
            type_name: self.origin.simple_name().to_string(),
            reason: reason.into(),
        }
    }

    fn into_registered(self, sequence: usize) -> DiResult<RegisteredType> {
        let descriptor = if self.match_all {
            if !self.type_args.is_empty() {
                return Err(self.invalid("a match-all registration cannot fix type arguments"));
            }
            TypeDescriptor::from_origin(self.origin)
        } else {
            let expr = TypeExpr::generic(self.origin, self.type_args.iter().cloned());
            TypeDescriptor::resolve(&expr)?
        };
        if descriptor.args().len() > self.origin.params().len() {
            return Err(self.invalid(format!(
                "{} type arguments given, {} declared",
                descriptor.args().len(),
                self.origin.params().len()
            )));
        }
        let type_name = descriptor.to_string();

        if self.instance.is_some() {
            if self.strategy != Strategy::Singleton {
                return Err(DiError::InstanceExists {
                    type_name,
                    reason: "an instance can only be registered as a singleton",
                });
            }
            if self.explicit_factory {
                return Err(DiError::InstanceExists {
                    type_name,
                    reason: "an instance cannot be combined with a factory",
                });
            }
            if self.build_immediately {
                return Err(DiError::InstanceExists {
                    type_name,
                    reason: "an instance is already built",
                });
            }
        } else if self.factory.is_none() {
            return Err(self.invalid("no factory, instance or default constructor"));
        }
        if self.build_immediately && self.strategy != Strategy::Singleton {
            return Err(self.invalid(format!(
                "only singletons can be built immediately, not {}",
                self.strategy
            )));
        }

        // levels: before_init 0, ancestors 1..=depth (most distant first),
        // own hooks depth + 1, after_init depth + 2
        let depth = self.ancestors.len();
        let mut erased_hooks = Vec::with_capacity(
            self.own_hooks.len() + self.base_hooks.len() + self.before_init.len() + self.after_init.len(),
        );
        for hook in self.before_init {
            erased_hooks.push(hook.erase(0));
        }
        for (ancestor, hook) in self.base_hooks {
            let index = self
                .ancestors
                .iter()
                .position(|a| *a == ancestor)
                .ok_or_else(|| DiError::InvalidRegistration {
                    type_name: type_name.clone(),
                    reason: format!("{} is not an ancestor", ancestor),
                })?;
            erased_hooks.push(hook.erase(depth - index));
        }
        for hook in self.own_hooks {
            erased_hooks.push(hook.erase(depth + 1));
        }
        for hook in self.after_init {
            erased_hooks.push(hook.erase(depth + 2));
        }
        hooks::order(&mut erased_hooks);

        let instance = self.instance.map(|i| i as AnyArc);
        let factory = if instance.is_some() {
            None
        } else {
            self.factory
                .map(|f| f.map_output(|value| Box::new(value) as Box<dyn Any + Send + Sync>))
        };

        Ok(RegisteredType {
            descriptor,
            strategy: self.strategy,
            match_all: self.match_all,
            build_immediately: self.build_immediately,
            ancestors: self.ancestors,
            instance,
            factory,
            hooks: erased_hooks,
            args: self.args,
            named_args: self.named_args,
            sequence,
        })
    }
}

impl<T: Injectable> TypeRegistration<T> {
    /// Registration using `T`'s own constructor and declared parameters.
    pub fn injectable(strategy: Strategy) -> Self {
        let mut registration = Self::new(strategy);
        registration.origin = Origin::injectable::<T>();
        registration.factory = Some(T::constructor());
        registration.own_hooks = T::init_hooks();
        registration
    }
}

impl<T> fmt::Debug for TypeRegistration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistration")
            .field("origin", &self.origin)
            .field("strategy", &self.strategy)
            .field("match_all", &self.match_all)
            .field("build_immediately", &self.build_immediately)
            .finish()
    }
}

/// A validated registration, as stored in the registry.
pub struct RegisteredType {
    pub(crate) descriptor: TypeDescriptor,
    pub(crate) strategy: Strategy,
    pub(crate) match_all: bool,
    pub(crate) build_immediately: bool,
    pub(crate) ancestors: Vec<TypeDescriptor>,
    pub(crate) instance: Option<AnyArc>,
    pub(crate) factory: Option<ErasedFactory>,
    pub(crate) hooks: Vec<ErasedHook>,
    pub(crate) args: Vec<AnyArc>,
    pub(crate) named_args: IndexMap<String, AnyArc>,
    sequence: usize,
}

impl RegisteredType {
    /// Registered descriptor; `Any` arguments for match-all registrations.
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn is_match_all(&self) -> bool {
        self.match_all
    }

    pub fn is_build_immediately(&self) -> bool {
        self.build_immediately
    }

    pub fn ancestors(&self) -> &[TypeDescriptor] {
        &self.ancestors
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Descriptor the instance built for `requested` is cached under.
    /// Always carries the registered origin and its declared parameters.
    pub(crate) fn cache_key(&self, requested: &TypeDescriptor) -> TypeDescriptor {
        if self.match_all {
            TypeDescriptor::with_args(*self.descriptor.origin(), requested.args().to_vec())
        } else {
            self.descriptor.clone()
        }
    }

    fn derives_from(&self, base: &Origin) -> bool {
        self.descriptor.origin() == base || self.ancestors.iter().any(|a| a.origin() == base)
    }
}

impl fmt::Debug for RegisteredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredType")
            .field("descriptor", &self.descriptor)
            .field("strategy", &self.strategy)
            .field("match_all", &self.match_all)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Registrations of one origin.
struct TypeBag {
    origin: Origin,
    types: IndexMap<TypeDescriptor, Arc<RegisteredType>>,
    match_all: Option<Arc<RegisteredType>>,
}

impl TypeBag {
    fn new(origin: Origin) -> Self {
        Self {
            origin,
            types: IndexMap::new(),
            match_all: None,
        }
    }
}

/// Startup-time table of registrations.
///
/// Populated single-threaded during bootstrap, then consumed by
/// [`build`](Self::build); the resolver only ever reads it.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{Callable, Strategy, TypeRegistration, TypeRegistry};
///
/// struct Settings { name: &'static str }
///
/// let mut registry = TypeRegistry::new();
/// registry.add_instance(Settings { name: "app" }).unwrap();
///
/// let resolver = registry.build().unwrap();
/// assert_eq!(resolver.require::<Settings>().unwrap().name, "app");
/// ```
pub struct TypeRegistry {
    bags: IndexMap<Origin, TypeBag>,
    sequence: Vec<Arc<RegisteredType>>,
    pub(crate) arg_resolvers: Vec<Arc<dyn ArgumentResolver>>,
    pub(crate) observers: Observers,
    pub(crate) config: ContainerConfig,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            bags: IndexMap::new(),
            sequence: Vec::new(),
            arg_resolvers: Vec::new(),
            observers: Observers::default(),
            config: ContainerConfig::default(),
        }
    }

    /// Validates and stores a registration.
    pub fn register<T: Any + Send + Sync>(&mut self, registration: TypeRegistration<T>) -> DiResult<&mut Self> {
        let origin = registration.origin;
        let registered = Arc::new(registration.into_registered(self.sequence.len())?);
        let bag = self.bags.entry(origin).or_insert_with(|| TypeBag::new(origin));

        if bag.origin.params().len() != origin.params().len() {
            return Err(DiError::InvalidRegistration {
                type_name: origin.simple_name().to_string(),
                reason: format!(
                    "declares {} generic parameters, previously registered with {}",
                    origin.params().len(),
                    bag.origin.params().len()
                ),
            });
        }

        if registered.match_all {
            if bag.match_all.is_some() {
                return Err(DiError::TypeRegistered {
                    type_name: registered.descriptor.to_string(),
                });
            }
            bag.match_all = Some(registered.clone());
        } else {
            if bag.types.contains_key(&registered.descriptor) {
                return Err(DiError::TypeRegistered {
                    type_name: registered.descriptor.to_string(),
                });
            }
            bag.types.insert(registered.descriptor.clone(), registered.clone());
        }

        tracing::debug!(
            r#type = %registered.descriptor,
            strategy = registered.strategy.as_str(),
            match_all = registered.match_all,
            "type registered"
        );
        self.sequence.push(registered);
        Ok(self)
    }

    pub fn add_singleton<T: Injectable>(&mut self) -> DiResult<&mut Self> {
        self.register(TypeRegistration::<T>::injectable(Strategy::Singleton))
    }

    pub fn add_scoped<T: Injectable>(&mut self) -> DiResult<&mut Self> {
        self.register(TypeRegistration::<T>::injectable(Strategy::Scoped))
    }

    pub fn add_transient<T: Injectable>(&mut self) -> DiResult<&mut Self> {
        self.register(TypeRegistration::<T>::injectable(Strategy::Transient))
    }

    /// Registers a pre-built singleton.
    pub fn add_instance<T: Any + Send + Sync>(&mut self, value: T) -> DiResult<&mut Self> {
        self.register(TypeRegistration::<T>::new(Strategy::Singleton).instance(value))
    }

    pub fn add_factory<T: Any + Send + Sync>(&mut self, strategy: Strategy, factory: Callable<T>) -> DiResult<&mut Self> {
        self.register(TypeRegistration::<T>::new(strategy).factory(factory))
    }

    /// Adds a resolver to the argument resolver chain.
    pub fn add_arg_resolver(&mut self, resolver: Arc<dyn ArgumentResolver>) -> &mut Self {
        self.arg_resolvers.push(resolver);
        self
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ResolutionObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    pub fn with_config(&mut self, config: ContainerConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Registration serving `descriptor`: the exact one, else the origin's
    /// match-all one.
    pub fn get(&self, descriptor: &TypeDescriptor) -> DiResult<&Arc<RegisteredType>> {
        self.find(descriptor).ok_or_else(|| DiError::TypeNotRegistered {
            type_name: descriptor.key().to_string(),
            site: None,
        })
    }

    pub(crate) fn find(&self, descriptor: &TypeDescriptor) -> Option<&Arc<RegisteredType>> {
        let bag = self.bags.get(descriptor.origin())?;
        let key = descriptor.padded_to(bag.origin.params().len());
        bag.types.get(&key).or(bag.match_all.as_ref())
    }

    pub fn is_registered(&self, descriptor: &TypeDescriptor) -> bool {
        self.find(descriptor).is_some()
    }

    /// Registrations whose origin is `base` or lists `base` among its
    /// ancestors, in registration order.
    pub fn of_type(&self, base: &Origin) -> Vec<&Arc<RegisteredType>> {
        self.sequence.iter().filter(|r| r.derives_from(base)).collect()
    }

    /// Registrations whose origin's simple name is `name`.
    pub fn literal_matches(&self, name: &str) -> Vec<&Arc<RegisteredType>> {
        self.sequence
            .iter()
            .filter(|r| r.descriptor.simple_name() == name)
            .collect()
    }

    /// Registrations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredType>> + '_ {
        self.sequence.iter()
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Closes registration and returns a resolver over a fresh root context.
    pub fn build(self) -> DiResult<Resolver> {
        Resolver::new(self, ScopeContext::root())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("registrations", &self.sequence)
            .field("arg_resolvers", &self.arg_resolvers.len())
            .field("observers", &self.observers.len())
            .field("config", &self.config)
            .finish()
    }
}
