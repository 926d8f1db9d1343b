//! The resolver: application-facing entry point over a built registry.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::arg_resolver::{ArgumentResolver, ArgumentResolverChain, ResolverArgResolver, TypeDescriptorArgResolver};
use crate::callable::{downcast, AnyArc, CallArgs, Callable, Injectable};
use crate::config::ContainerConfig;
use crate::context::ScopeContext;
use crate::error::{DiError, DiResult};
use crate::internal::CircularGuard;
use crate::logging::LoggerArgResolver;
use crate::observer::TracingObserver;
use crate::registry::TypeRegistry;
use crate::types::{GenericMeta, TypeDescriptor, TypeExpr};

mod binding;

use binding::{forward_name, Binding};

/// Resolves types and calls functions against a built registry.
///
/// A resolver is bound to one [`ScopeContext`]: the root one returned by
/// [`TypeRegistry::build`], or a session opened with
/// [`get_scoped_session`](Self::get_scoped_session). Every resolver of one
/// container shares the registry and the root singleton cache. Cloning is
/// cheap and keeps the same context.
///
/// # Thread Safety
///
/// `Resolver` is `Send + Sync`. Concurrent first resolutions of one singleton
/// build it once; the other callers wait for that build and share its result.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{CallArgs, Callable, Parameter, Strategy, TypeRegistry};
/// use std::sync::Arc;
///
/// struct Database { url: String }
///
/// let mut registry = TypeRegistry::new();
/// registry.add_instance(Database { url: "postgres://localhost".into() }).unwrap();
/// let resolver = registry.build().unwrap();
///
/// let handler = Callable::new("handler", |args| {
///     let db = args.get::<Database>("db")?;
///     let limit = args.cloned::<u32>("limit")?;
///     Ok(format!("{} ({})", db.url, limit))
/// })
/// .param(Parameter::of::<Database>("db"))
/// .param(Parameter::of::<u32>("limit"));
///
/// let out = resolver.call(&handler, CallArgs::new().named("limit", 10u32)).unwrap();
/// assert_eq!(out, "postgres://localhost (10)");
/// ```
#[derive(Clone)]
pub struct Resolver {
    shared: Arc<Shared>,
    context: ScopeContext,
}

struct Shared {
    registry: TypeRegistry,
    chain: ArgumentResolverChain,
    root: ScopeContext,
}

impl Resolver {
    /// Builds a resolver over `registry`, caching singletons in `root`.
    ///
    /// Pre-built instances are bound into `root` and build-immediately
    /// singletons are constructed before this returns.
    pub fn new(mut registry: TypeRegistry, root: ScopeContext) -> DiResult<Self> {
        let root = root.root_context();

        let mut resolvers = std::mem::take(&mut registry.arg_resolvers);
        resolvers.push(Arc::new(LoggerArgResolver::new()) as Arc<dyn ArgumentResolver>);
        resolvers.push(Arc::new(TypeDescriptorArgResolver));
        resolvers.push(Arc::new(ResolverArgResolver));
        let chain = ArgumentResolverChain::new(resolvers);

        if registry.config.log_resolutions {
            registry.observers.add(Arc::new(TracingObserver::new()));
        }

        for registration in registry.iter() {
            if let Some(instance) = &registration.instance {
                root.bind(&registration.descriptor, instance.clone())?;
            }
        }

        let eager: Vec<TypeDescriptor> = registry
            .iter()
            .filter(|r| r.build_immediately)
            .map(|r| r.descriptor.clone())
            .collect();

        let resolver = Self {
            shared: Arc::new(Shared {
                registry,
                chain,
                root: root.clone(),
            }),
            context: root,
        };

        for descriptor in &eager {
            let mut guard = resolver.new_guard();
            resolver.resolve_descriptor(descriptor, &mut guard)?;
        }

        tracing::debug!(
            registrations = resolver.shared.registry.len(),
            arg_resolvers = resolver.shared.chain.len(),
            eager = eager.len(),
            "resolver built"
        );
        Ok(resolver)
    }

    /// Instance of the non-generic type `T`.
    pub fn require<T: Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
        self.require_type::<T>(&TypeExpr::of::<T>())
    }

    /// Instance for `expr`, downcast to `T`.
    pub fn require_type<T: Any + Send + Sync>(&self, expr: &TypeExpr) -> DiResult<Arc<T>> {
        downcast(self.require_any(expr)?)
    }

    /// Type-erased instance for `expr`.
    ///
    /// A forward reference is matched against the simple names of the
    /// registered types; a union of two or more types is rejected.
    pub fn require_any(&self, expr: &TypeExpr) -> DiResult<AnyArc> {
        let descriptor = self.top_level_descriptor(expr)?;
        let mut guard = self.new_guard();
        let instance = self.resolve_descriptor(&descriptor, &mut guard);
        debug_assert!(guard.is_empty());
        instance
    }

    /// Binds `callable`'s parameters and calls it.
    ///
    /// Supplied arguments are bound first; every remaining parameter is
    /// injected.
    pub fn call<R: 'static>(&self, callable: &Callable<R>, args: CallArgs) -> DiResult<R> {
        let mut guard = self.new_guard();
        let bound = self.bind_args(
            &Binding {
                callable: callable.name(),
                signature: callable.signature(),
                positional: args.positional(),
                named: args.named_args(),
                lookup: None,
                caller: None,
            },
            &mut guard,
        )?;
        callable.invoke(bound)
    }

    /// Binds synchronously, then awaits the future the callable returns.
    pub async fn call_async<F, R>(&self, callable: &Callable<F>, args: CallArgs) -> DiResult<R>
    where
        F: Future<Output = DiResult<R>> + 'static,
    {
        let future = self.call(callable, args)?;
        future.await
    }

    /// Builds a fresh `T` without registering it.
    ///
    /// `args` are bound first, as with [`call`](Self::call); the remaining
    /// constructor parameters are injected and `T`'s own init hooks run.
    /// The instance is never cached, and a registration of `T` is ignored.
    pub fn instantiate<T: Injectable>(&self, args: CallArgs) -> DiResult<T> {
        let mut guard = self.new_guard();
        self.build_unregistered(&args, &mut guard)
    }

    /// Resolver bound to a freshly opened session.
    pub fn get_scoped_session(&self) -> Resolver {
        tracing::debug!("scoped session opened");
        Resolver {
            shared: self.shared.clone(),
            context: self.context.open_session(),
        }
    }

    /// Closes this resolver's session. No-op on the root resolver.
    pub fn close_session(&self) {
        self.context.close_session();
    }

    /// True while bound to an open session.
    pub fn is_session(&self) -> bool {
        self.context.is_open_session()
    }

    /// Generic arguments `instance` was built with, if it came from a
    /// registration of a generic origin.
    pub fn generic_meta<T: ?Sized>(&self, instance: &Arc<T>) -> Option<GenericMeta> {
        self.context.meta_of(Arc::as_ptr(instance) as *const ())
    }

    /// True when `expr` parses strictly and has a registration.
    pub fn is_registered(&self, expr: &TypeExpr) -> bool {
        TypeDescriptor::resolve(expr)
            .map(|t| self.shared.registry.is_registered(&t))
            .unwrap_or(false)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.shared.registry
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.shared.registry.config
    }

    pub fn context(&self) -> &ScopeContext {
        &self.context
    }

    /// Resolver bound to the root context of this container.
    pub fn root(&self) -> Resolver {
        Resolver {
            shared: self.shared.clone(),
            context: self.shared.root.clone(),
        }
    }

    fn new_guard(&self) -> CircularGuard {
        CircularGuard::new(self.config().max_depth, Arc::as_ptr(&self.shared) as usize)
    }

    fn top_level_descriptor(&self, expr: &TypeExpr) -> DiResult<TypeDescriptor> {
        if expr.non_null_arity() >= 2 {
            return Err(DiError::UnionNotAllowed {
                type_name: expr.to_string(),
                site: None,
            });
        }
        if let Some((name, _)) = forward_name(expr) {
            return self.literal_match(&name, None);
        }
        let descriptor = TypeDescriptor::resolve(expr)?;
        if descriptor.is_union() {
            return Err(DiError::UnionNotAllowed {
                type_name: descriptor.to_string(),
                site: None,
            });
        }
        Ok(descriptor)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("session", &self.context.is_session())
            .field("registrations", &self.shared.registry.len())
            .finish()
    }
}
