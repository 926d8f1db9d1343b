//! Injected loggers.
//!
//! A parameter annotated `Logger[Owner]` is served by [`LoggerArgResolver`]
//! without any registration. Every event the logger emits goes through
//! `tracing` with the owner's type name as a structured field.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::arg_resolver::{ArgResolverOptions, ArgumentResolver};
use crate::callable::AnyArc;
use crate::error::DiResult;
use crate::types::{Origin, TypeArg, TypeExpr};

/// Logger scoped to one owner type.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{Callable, Injectable, Logger, Parameter, TypeRegistry};
/// use std::sync::Arc;
///
/// struct Mailer { log: Arc<Logger> }
/// impl Injectable for Mailer {
///     fn constructor() -> Callable<Self> {
///         Callable::new("Mailer", |args| Ok(Mailer { log: args.get("log")? }))
///             .param(Parameter::new("log", Logger::of::<Mailer>()))
///     }
/// }
///
/// let mut registry = TypeRegistry::new();
/// registry.add_singleton::<Mailer>().unwrap();
/// let mailer = registry.build().unwrap().require::<Mailer>().unwrap();
/// assert_eq!(mailer.log.owner(), "Mailer");
/// mailer.log.info("ready");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Logger {
    owner: Arc<str>,
}

impl Logger {
    pub fn new(owner: impl Into<Arc<str>>) -> Self {
        Self { owner: owner.into() }
    }

    /// Generic origin `Logger[Owner]`.
    pub fn origin() -> Origin {
        Origin::generic::<Logger>(&["Owner"])
    }

    /// Annotation for a logger owned by `T`.
    pub fn of<T: Any>() -> TypeExpr {
        TypeExpr::generic(Self::origin(), [TypeExpr::of::<T>()])
    }

    /// Annotation for a logger owned by whoever declares the parameter.
    pub fn untyped() -> TypeExpr {
        TypeExpr::generic(Self::origin(), [])
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn debug(&self, message: impl fmt::Display) {
        tracing::debug!(owner = %self.owner, "{}", message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        tracing::info!(owner = %self.owner, "{}", message);
    }

    pub fn warning(&self, message: impl fmt::Display) {
        tracing::warn!(owner = %self.owner, "{}", message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        tracing::error!(owner = %self.owner, "{}", message);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Logger {}>", self.owner)
    }
}

/// Serves `Logger[Owner]` parameters, one shared logger per owner.
///
/// A bare `Logger` annotation takes the declaring type as owner, or `root`
/// for plain callables.
#[derive(Debug, Default)]
pub struct LoggerArgResolver {
    loggers: Mutex<HashMap<String, Arc<Logger>>>,
}

impl LoggerArgResolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArgumentResolver for LoggerArgResolver {
    fn supports(&self, options: &ArgResolverOptions<'_>) -> bool {
        options.descriptor.origin() == &Logger::origin()
    }

    fn resolve(&self, options: &ArgResolverOptions<'_>) -> DiResult<AnyArc> {
        let owner = match options.descriptor.args().first() {
            Some(TypeArg::Type(owner)) => owner.to_string(),
            _ => options
                .caller
                .map(|c| c.to_string())
                .unwrap_or_else(|| "root".to_string()),
        };
        let logger: AnyArc = self
            .loggers
            .lock()
            .entry(owner)
            .or_insert_with_key(|owner| Arc::new(Logger::new(owner.as_str())))
            .clone();
        Ok(logger)
    }
}
