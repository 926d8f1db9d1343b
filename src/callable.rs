//! Explicit call metadata: parameters, signatures and callables.
//!
//! The resolver never inspects a function. Everything it binds is described
//! by a [`Signature`] attached to a [`Callable`], and every type it can build
//! on its own implements [`Injectable`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{DiError, DiResult};
use crate::hooks::InitHook;
use crate::types::{GenericMeta, TypeExpr};

/// Type-erased shared instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// How a parameter accepts its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Only fillable by position; never injectable
    PositionalOnly,
    /// Fillable by position or by name
    PositionalOrKeyword,
    /// Fillable by name only
    KeywordOnly,
    /// Positional wildcard; never injectable
    VarPositional,
    /// Catch-all for named arguments no other parameter accepts
    VarKeyword,
}

/// One declared parameter.
#[derive(Clone)]
pub struct Parameter {
    name: Arc<str>,
    kind: ParamKind,
    annotation: Option<TypeExpr>,
    default: Option<Option<AnyArc>>,
}

impl Parameter {
    /// Positional-or-keyword parameter annotated with `annotation`.
    pub fn new(name: impl Into<Arc<str>>, annotation: TypeExpr) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::PositionalOrKeyword,
            annotation: Some(annotation),
            default: None,
        }
    }

    /// Parameter annotated with the non-generic type `T`.
    pub fn of<T: Any>(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, TypeExpr::of::<T>())
    }

    /// Parameter annotated with the [`Injectable`] type `T`.
    pub fn injectable<T: Injectable>(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, TypeExpr::injectable::<T>())
    }

    /// Parameter without annotation; only a supplied argument or a default
    /// can fill it.
    pub fn untyped(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::PositionalOrKeyword,
            annotation: None,
            default: None,
        }
    }

    /// `**name`: receives unconsumed named arguments.
    pub fn var_keyword(name: impl Into<Arc<str>>) -> Self {
        Self::untyped(name).kind(ParamKind::VarKeyword)
    }

    /// `*name`: rejected when the callable is bound.
    pub fn var_positional(name: impl Into<Arc<str>>) -> Self {
        Self::untyped(name).kind(ParamKind::VarPositional)
    }

    pub fn kind(mut self, kind: ParamKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn keyword_only(self) -> Self {
        self.kind(ParamKind::KeywordOnly)
    }

    pub fn positional_only(self) -> Self {
        self.kind(ParamKind::PositionalOnly)
    }

    pub fn default<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.default = Some(Some(Arc::new(value)));
        self
    }

    /// Default value of `None`.
    pub fn default_none(mut self) -> Self {
        self.default = Some(None);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn param_kind(&self) -> ParamKind {
        self.kind
    }

    pub fn annotation(&self) -> Option<&TypeExpr> {
        self.annotation.as_ref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub(crate) fn default_value(&self) -> Option<Option<AnyArc>> {
        self.default.clone()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("annotation", &self.annotation.as_ref().map(|a| a.to_string()))
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Ordered parameter list of a callable.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<Parameter>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl FromIterator<Parameter> for Signature {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

type Body<R> = Arc<dyn Fn(BoundArgs) -> DiResult<R> + Send + Sync>;

/// A signature plus the body that consumes the bound arguments.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{Callable, Parameter};
///
/// struct Mailer;
/// struct Notifier { mailer: std::sync::Arc<Mailer> }
///
/// let ctor = Callable::new("Notifier::new", |args| {
///     Ok(Notifier { mailer: args.get::<Mailer>("mailer")? })
/// })
/// .param(Parameter::of::<Mailer>("mailer"));
/// assert_eq!(ctor.signature().len(), 1);
/// ```
pub struct Callable<R> {
    name: Arc<str>,
    signature: Signature,
    body: Body<R>,
}

impl<R> Clone for Callable<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            signature: self.signature.clone(),
            body: self.body.clone(),
        }
    }
}

impl<R: 'static> Callable<R> {
    pub fn new<F>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(BoundArgs) -> DiResult<R> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature: Signature::new(),
            body: Arc::new(body),
        }
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.signature.params.push(param);
        self
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Same signature, output transformed by `f`.
    pub fn map_output<U: 'static, F>(self, f: F) -> Callable<U>
    where
        F: Fn(R) -> U + Send + Sync + 'static,
    {
        let body = self.body;
        Callable {
            name: self.name,
            signature: self.signature,
            body: Arc::new(move |args| body(args).map(&f)),
        }
    }

    pub(crate) fn invoke(&self, args: BoundArgs) -> DiResult<R> {
        (self.body)(args)
    }
}

impl<R> fmt::Debug for Callable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

/// A type the container can build without an explicit factory.
///
/// `TYPE_PARAMS` lists the runtime generic parameters the type declares; its
/// constructor can read the concrete arguments with
/// [`BoundArgs::generic_meta`], and its parameter annotations may use those
/// symbols (`TypeExpr::var("T")`).
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{Callable, Injectable, Parameter, Strategy, TypeRegistry};
/// use std::sync::Arc;
///
/// struct Config;
/// impl Injectable for Config {
///     fn constructor() -> Callable<Self> {
///         Callable::new("Config", |_| Ok(Config))
///     }
/// }
///
/// struct Service { config: Arc<Config> }
/// impl Injectable for Service {
///     fn constructor() -> Callable<Self> {
///         Callable::new("Service", |args| Ok(Service { config: args.get("config")? }))
///             .param(Parameter::injectable::<Config>("config"))
///     }
/// }
///
/// let mut registry = TypeRegistry::new();
/// registry.add_singleton::<Config>().unwrap().add_transient::<Service>().unwrap();
/// let resolver = registry.build().unwrap();
/// let service = resolver.require::<Service>().unwrap();
/// assert!(Arc::ptr_eq(&service.config, &resolver.require::<Config>().unwrap()));
/// ```
pub trait Injectable: Any + Send + Sync + Sized {
    const TYPE_PARAMS: &'static [&'static str] = &[];

    fn constructor() -> Callable<Self>;

    /// Hooks the type declares itself, run in order after every build.
    fn init_hooks() -> Vec<InitHook<Self>> {
        Vec::new()
    }
}

/// Arguments supplied by the caller of [`Resolver::call`](crate::Resolver::call).
#[derive(Clone, Default)]
pub struct CallArgs {
    positional: Vec<AnyArc>,
    named: IndexMap<String, AnyArc>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg<T: Any + Send + Sync>(self, value: T) -> Self {
        self.arg_shared(Arc::new(value))
    }

    pub fn arg_shared(mut self, value: AnyArc) -> Self {
        self.positional.push(value);
        self
    }

    pub fn named<T: Any + Send + Sync>(self, name: impl Into<String>, value: T) -> Self {
        self.named_shared(name, Arc::new(value))
    }

    pub fn named_shared(mut self, name: impl Into<String>, value: AnyArc) -> Self {
        self.named.insert(name.into(), value);
        self
    }

    pub fn positional(&self) -> &[AnyArc] {
        &self.positional
    }

    pub fn named_args(&self) -> &IndexMap<String, AnyArc> {
        &self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

impl fmt::Debug for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallArgs")
            .field("positional", &self.positional.len())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The arguments a callable body receives.
///
/// A parameter bound to `None` (nullable and not registered, or a `None`
/// default) is present but empty: [`get`](Self::get) fails on it while
/// [`get_optional`](Self::get_optional) returns `Ok(None)`.
pub struct BoundArgs {
    callable: Arc<str>,
    values: IndexMap<Arc<str>, Option<AnyArc>>,
    kwargs: IndexMap<String, AnyArc>,
    generic: Option<GenericMeta>,
}

impl BoundArgs {
    pub(crate) fn new(callable: Arc<str>) -> Self {
        Self {
            callable,
            values: IndexMap::new(),
            kwargs: IndexMap::new(),
            generic: None,
        }
    }

    pub(crate) fn insert(&mut self, name: Arc<str>, value: Option<AnyArc>) {
        self.values.insert(name, value);
    }

    pub(crate) fn insert_kwarg(&mut self, name: String, value: AnyArc) {
        self.kwargs.insert(name, value);
    }

    pub(crate) fn set_generic_meta(&mut self, meta: GenericMeta) {
        self.generic = Some(meta);
    }

    pub(crate) fn is_bound(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The argument bound to `name`, downcast to `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Arc<T>> {
        self.get_optional(name)?.ok_or_else(|| self.missing(name))
    }

    /// The argument bound to `name`, `None` when bound to `None`.
    pub fn get_optional<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Option<Arc<T>>> {
        match self.values.get(name) {
            None => Err(self.missing(name)),
            Some(None) => Ok(None),
            Some(Some(value)) => downcast(value.clone()).map(Some),
        }
    }

    /// Owned copy of the argument bound to `name`.
    pub fn cloned<T: Any + Send + Sync + Clone>(&self, name: &str) -> DiResult<T> {
        self.get::<T>(name).map(|v| (*v).clone())
    }

    /// The raw argument bound to `name`.
    pub fn raw(&self, name: &str) -> Option<&AnyArc> {
        self.values.get(name).and_then(Option::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Named arguments collected by the `**kwargs` parameter.
    pub fn kwargs(&self) -> &IndexMap<String, AnyArc> {
        &self.kwargs
    }

    pub fn kwarg<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Arc<T>> {
        match self.kwargs.get(name) {
            Some(value) => downcast(value.clone()),
            None => Err(self.missing(name)),
        }
    }

    /// Generic arguments of the type being constructed.
    pub fn generic_meta(&self) -> Option<&GenericMeta> {
        self.generic.as_ref()
    }

    pub fn callable(&self) -> &str {
        &self.callable
    }

    fn missing(&self, name: &str) -> DiError {
        DiError::ArgumentMissing {
            callable: self.callable.to_string(),
            param: name.to_string(),
        }
    }
}

impl fmt::Debug for BoundArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundArgs")
            .field("callable", &self.callable)
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .field("kwargs", &self.kwargs.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Downcasts a shared instance, reporting the expected type on failure.
pub(crate) fn downcast<T: Any + Send + Sync>(value: AnyArc) -> DiResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| DiError::TypeMismatch {
        type_name: std::any::type_name::<T>().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_none_is_optional_but_not_required() {
        let mut args = BoundArgs::new("f".into());
        args.insert("a".into(), None);
        args.insert("b".into(), Some(Arc::new(7u32)));

        assert!(args.get_optional::<u32>("a").unwrap().is_none());
        assert!(matches!(args.get::<u32>("a"), Err(DiError::ArgumentMissing { .. })));
        assert_eq!(args.cloned::<u32>("b").unwrap(), 7);
        assert!(matches!(args.get::<String>("b"), Err(DiError::TypeMismatch { .. })));
        assert!(matches!(args.get::<u32>("c"), Err(DiError::ArgumentMissing { .. })));
    }

    #[test]
    fn map_output_keeps_signature() {
        let c = Callable::new("double", |args| Ok(*args.get::<u32>("x")? * 2))
            .param(Parameter::of::<u32>("x"))
            .map_output(|v| v + 1);
        let mut args = BoundArgs::new("double".into());
        args.insert("x".into(), Some(Arc::new(4u32)));
        assert_eq!(c.signature().params()[0].name(), "x");
        assert_eq!(c.invoke(args).unwrap(), 9);
    }
}
