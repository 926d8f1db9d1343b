//! Injection strategy definitions.

use std::fmt;

/// Injection strategies controlling instance caching behavior
///
/// # Strategy Characteristics
///
/// - **Singleton**: built once per container tree, cached in the root context
/// - **Scoped**: built once per open session, cached in that session
/// - **Transient**: built on every resolution, never cached
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{Callable, Strategy, TypeRegistration, TypeRegistry};
/// use std::sync::Arc;
///
/// struct Database;
/// struct UnitOfWork;
///
/// let mut registry = TypeRegistry::new();
/// registry
///     .register(TypeRegistration::<Database>::new(Strategy::Singleton)
///         .factory(Callable::new("Database", |_| Ok(Database))))
///     .unwrap()
///     .register(TypeRegistration::<UnitOfWork>::new(Strategy::Scoped)
///         .factory(Callable::new("UnitOfWork", |_| Ok(UnitOfWork))))
///     .unwrap();
///
/// let resolver = registry.build().unwrap();
/// let session = resolver.get_scoped_session();
///
/// // Singleton: the session sees the root instance
/// let db1 = resolver.require::<Database>().unwrap();
/// let db2 = session.require::<Database>().unwrap();
/// assert!(Arc::ptr_eq(&db1, &db2));
///
/// // Scoped: same within the session
/// let uow1 = session.require::<UnitOfWork>().unwrap();
/// let uow2 = session.require::<UnitOfWork>().unwrap();
/// assert!(Arc::ptr_eq(&uow1, &uow2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Single instance per container tree, shared by every session
    Singleton,
    /// Single instance per open session, distinct across sessions
    Scoped,
    /// New instance per resolution, never cached
    Transient,
}

impl Strategy {
    /// Lower-case name used in error messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Singleton => "singleton",
            Strategy::Scoped => "scoped",
            Strategy::Transient => "transient",
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Singleton
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
