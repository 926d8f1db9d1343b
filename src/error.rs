//! Error types for the injection container.

use std::fmt;

/// Where a failing parameter lives: the callable and the parameter name.
///
/// Carried by the binding errors so misconfiguration can be traced back to
/// the constructor or function that asked for the dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSite {
    /// Name of the callable being bound (constructor, factory, hook or function)
    pub callable: String,
    /// Name of the parameter that could not be bound
    pub param: String,
}

impl ParamSite {
    pub(crate) fn new(callable: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            callable: callable.into(),
            param: param.into(),
        }
    }
}

impl fmt::Display for ParamSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parameter '{}' of '{}'", self.param, self.callable)
    }
}

fn at(site: &Option<ParamSite>) -> String {
    match site {
        Some(site) => format!(" ({})", site),
        None => String::new(),
    }
}

/// Injection errors
///
/// Every variant is a wiring defect, reported synchronously and never
/// retried by the container. The messages name the offending type and, when
/// the failure happened while binding a parameter, the parameter and the
/// callable that declared it.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{DiError, TypeRegistry};
///
/// struct Unregistered;
///
/// let resolver = TypeRegistry::new().build().unwrap();
/// match resolver.require::<Unregistered>() {
///     Err(DiError::TypeNotRegistered { type_name, .. }) => {
///         assert!(type_name.contains("Unregistered"));
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
    /// A non match-all registration already exists for this type
    #[error("Type {type_name} is already registered")]
    TypeRegistered { type_name: String },

    /// Nothing is registered for this type
    #[error("Type {type_name} is not a registered type in the injection system{}", at(.site))]
    TypeNotRegistered {
        type_name: String,
        site: Option<ParamSite>,
    },

    /// An instance conflicts with the registration or with a context binding
    #[error("Instance conflict for {type_name}: {reason}")]
    InstanceExists {
        type_name: String,
        reason: &'static str,
    },

    /// A parameter has neither an annotation nor a default value
    #[error("Annotation is required ({site})")]
    AnnotationMissing { site: ParamSite },

    /// The callable declares positional-only parameters or a positional wildcard
    #[error("Positional only parameters and positional wildcards are not allowed (parameter '{param}' of '{callable}')")]
    NoPositionalParameter { callable: String, param: String },

    /// More arguments were supplied than the callable accepts
    #[error("Expected {expected} arguments for '{callable}', {given} given")]
    InvalidArgCount {
        callable: String,
        expected: usize,
        given: usize,
    },

    /// A forward reference matched no registered type
    #[error("Literal '{name}' does not match any registered type{}", at(.site))]
    NoLiteralMatch { name: String, site: Option<ParamSite> },

    /// A forward reference matched several registered types
    #[error("Literal '{name}' matches too many registered types: {}{}", .candidates.join(", "), at(.site))]
    TooManyLiteralMatch {
        name: String,
        candidates: Vec<String>,
        site: Option<ParamSite>,
    },

    /// A parameter is annotated with a union of two or more concrete types
    #[error("Type unions are not allowed: {type_name}{}", at(.site))]
    UnionNotAllowed {
        type_name: String,
        site: Option<ParamSite>,
    },

    /// A scoped type was required while no session is open
    #[error("Cannot resolve scoped type {type_name} outside of a scoped session")]
    ScopedOutsideSession { type_name: String },

    /// A scoped type was reached from a chain that outlives the session
    #[error("Cannot instantiate scoped type {type_name} in {strategy} type {caller}")]
    ScopedInNonScoped {
        type_name: String,
        caller: String,
        strategy: &'static str,
    },

    /// Dependency cycle, with the full path
    #[error("A circular dependency has been detected: {}", .path.join(" -> "))]
    Circular { path: Vec<String> },

    /// A type expression could not be turned into a descriptor
    #[error("Typing error{}: {message}", .type_name.as_ref().map(|t| format!(" in {}", t)).unwrap_or_default())]
    Typing {
        message: String,
        type_name: Option<String>,
    },

    /// A generic symbol has no binding in the current lookup
    #[error("Generic symbol ~{symbol} is not bound in {type_name}")]
    TypeVarNotFound { symbol: String, type_name: String },

    /// A type-erased value did not downcast to the requested type
    #[error("Type mismatch for: {type_name}")]
    TypeMismatch { type_name: String },

    /// A callable body read an argument that was not bound or bound to `None`
    #[error("Argument '{param}' of '{callable}' is not bound")]
    ArgumentMissing { callable: String, param: String },

    /// The registration cannot be accepted as built
    #[error("Invalid registration for {type_name}: {reason}")]
    InvalidRegistration {
        type_name: String,
        reason: String,
    },

    /// Resolution went deeper than the configured limit
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),

    /// A configuration value could not be read
    #[error("Invalid configuration value for '{key}': {message}")]
    Config { key: String, message: String },
}

impl DiError {
    pub(crate) fn typing(message: impl Into<String>, type_name: Option<String>) -> Self {
        DiError::Typing {
            message: message.into(),
            type_name,
        }
    }
}

/// Result type for injection operations
pub type DiResult<T> = Result<T, DiError>;
