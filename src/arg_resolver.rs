//! Pluggable argument resolvers consulted before default instantiation.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::callable::AnyArc;
use crate::error::{DiError, DiResult};
use crate::resolver::Resolver;
use crate::strategy::Strategy;
use crate::types::{Origin, TypeArg, TypeDescriptor, TypeExpr};

/// What an argument resolver gets to see about the parameter being bound.
pub struct ArgResolverOptions<'a> {
    /// Resolver performing the binding (root or session)
    pub resolver: &'a Resolver,
    /// Type whose constructor or hook declares the parameter
    pub caller: Option<&'a TypeDescriptor>,
    pub caller_strategy: Option<Strategy>,
    /// Name of the callable declaring the parameter
    pub callable: &'a str,
    /// Parameter name
    pub name: &'a str,
    /// Parsed annotation of the parameter
    pub descriptor: &'a TypeDescriptor,
    pub nullable: bool,
    pub has_default: bool,
}

impl fmt::Debug for ArgResolverOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgResolverOptions")
            .field("caller", &self.caller)
            .field("caller_strategy", &self.caller_strategy)
            .field("callable", &self.callable)
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("nullable", &self.nullable)
            .finish()
    }
}

/// Produces arguments for parameters it recognizes.
///
/// Resolvers are tried in descending priority, ties kept in registration
/// order. The first one whose `supports` returns true produces the argument
/// and its output is used as is. Resolvers reporting `scoped() == true` are
/// only consulted by a resolver bound to an open session.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{
///     AnyArc, ArgResolverOptions, ArgumentResolver, Callable, CallArgs, DiResult,
///     Parameter, TypeRegistry,
/// };
/// use std::sync::Arc;
///
/// struct RequestId(String);
///
/// struct RequestIdResolver;
/// impl ArgumentResolver for RequestIdResolver {
///     fn supports(&self, options: &ArgResolverOptions<'_>) -> bool {
///         options.descriptor.origin().type_id() == std::any::TypeId::of::<RequestId>()
///     }
///     fn resolve(&self, _options: &ArgResolverOptions<'_>) -> DiResult<AnyArc> {
///         Ok(Arc::new(RequestId("req-1".into())))
///     }
/// }
///
/// let mut registry = TypeRegistry::new();
/// registry.add_arg_resolver(Arc::new(RequestIdResolver));
/// let resolver = registry.build().unwrap();
///
/// let handler = Callable::new("handler", |args| Ok(args.get::<RequestId>("id")?.0.clone()))
///     .param(Parameter::of::<RequestId>("id"));
/// assert_eq!(resolver.call(&handler, CallArgs::new()).unwrap(), "req-1");
/// ```
pub trait ArgumentResolver: Send + Sync {
    fn priority(&self) -> i32 {
        0
    }

    fn scoped(&self) -> bool {
        false
    }

    fn supports(&self, options: &ArgResolverOptions<'_>) -> bool;

    fn resolve(&self, options: &ArgResolverOptions<'_>) -> DiResult<AnyArc>;
}

/// Argument resolvers in consultation order.
#[derive(Clone, Default)]
pub(crate) struct ArgumentResolverChain {
    resolvers: Vec<Arc<dyn ArgumentResolver>>,
}

impl ArgumentResolverChain {
    pub(crate) fn new(resolvers: impl IntoIterator<Item = Arc<dyn ArgumentResolver>>) -> Self {
        let mut resolvers: Vec<_> = resolvers.into_iter().collect();
        // stable: equal priorities keep registration order
        resolvers.sort_by_key(|r| std::cmp::Reverse(r.priority()));
        Self { resolvers }
    }

    /// First resolver, in priority order, that supports the parameter.
    pub(crate) fn find(&self, options: &ArgResolverOptions<'_>, in_session: bool) -> Option<&Arc<dyn ArgumentResolver>> {
        self.resolvers
            .iter()
            .filter(|r| in_session || !r.scoped())
            .find(|r| r.supports(options))
    }

    pub(crate) fn len(&self) -> usize {
        self.resolvers.len()
    }
}

fn origin_is<T: Any>(descriptor: &TypeDescriptor) -> bool {
    descriptor.origin().type_id() == std::any::TypeId::of::<T>()
}

/// Origin used to annotate a parameter that receives a descriptor:
/// `TypeDescriptor[X]`.
pub fn descriptor_origin() -> Origin {
    Origin::generic::<TypeDescriptor>(&["T"])
}

/// Annotation `TypeDescriptor[target]`.
pub fn descriptor_of(target: TypeExpr) -> TypeExpr {
    TypeExpr::generic(descriptor_origin(), [target])
}

/// Serves `TypeDescriptor[X]` parameters with the descriptor of `X`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeDescriptorArgResolver;

impl ArgumentResolver for TypeDescriptorArgResolver {
    fn supports(&self, options: &ArgResolverOptions<'_>) -> bool {
        origin_is::<TypeDescriptor>(options.descriptor)
    }

    fn resolve(&self, options: &ArgResolverOptions<'_>) -> DiResult<AnyArc> {
        match options.descriptor.args().first() {
            Some(TypeArg::Type(target)) => Ok(Arc::new(target.clone())),
            _ => Err(DiError::typing(
                format!(
                    "Parameter '{}' of '{}' needs a concrete type argument",
                    options.name, options.callable
                ),
                Some(options.descriptor.to_string()),
            )),
        }
    }
}

/// Serves `Resolver` parameters with the resolver doing the binding.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResolverArgResolver;

impl ArgumentResolver for ResolverArgResolver {
    fn supports(&self, options: &ArgResolverOptions<'_>) -> bool {
        origin_is::<Resolver>(options.descriptor)
    }

    fn resolve(&self, options: &ArgResolverOptions<'_>) -> DiResult<AnyArc> {
        Ok(Arc::new(options.resolver.clone()))
    }
}
