//! # ferrous-inject
//!
//! Runtime object-graph resolution: a type registry, generic-aware type
//! descriptors, scoped sessions and an extensible parameter binding algorithm
//! with circular dependency detection.
//!
//! ## Features
//!
//! - **Strategies**: Singleton, Scoped and Transient instances, with scoped
//!   instances refused anywhere they could outlive their session
//! - **Runtime generics**: `Repository[User]` and `Repository[Order]` are
//!   distinct registrations of one Rust type, and constructors can use the
//!   bound arguments
//! - **Explicit signatures**: parameters are described by [`Parameter`]s,
//!   bound from supplied arguments first and injected otherwise
//! - **Forward references**: a parameter annotated by name resolves against
//!   the registered types' simple names
//! - **Argument resolvers**: a priority-ordered chain serving special
//!   parameters such as [`Logger`]
//! - **Initializer hooks**: post-construction hooks with injected parameters,
//!   run base first
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_inject::{Callable, Injectable, Parameter, TypeRegistry};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     fn constructor() -> Callable<Self> {
//!         Callable::new("UserService", |args| Ok(UserService { db: args.get("db")? }))
//!             .param(Parameter::of::<Database>("db"))
//!     }
//! }
//!
//! let mut registry = TypeRegistry::new();
//! registry
//!     .add_instance(Database { url: "postgres://localhost".into() })
//!     .unwrap()
//!     .add_transient::<UserService>()
//!     .unwrap();
//!
//! let resolver = registry.build().unwrap();
//! let users = resolver.require::<UserService>().unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Scoped Sessions
//!
//! ```rust
//! use ferrous_inject::{Callable, DiError, Strategy, TypeRegistration, TypeRegistry};
//! use std::sync::Arc;
//!
//! struct UnitOfWork;
//!
//! let mut registry = TypeRegistry::new();
//! registry
//!     .register(TypeRegistration::<UnitOfWork>::new(Strategy::Scoped)
//!         .factory(Callable::new("UnitOfWork", |_| Ok(UnitOfWork))))
//!     .unwrap();
//! let resolver = registry.build().unwrap();
//!
//! assert!(matches!(
//!     resolver.require::<UnitOfWork>(),
//!     Err(DiError::ScopedOutsideSession { .. })
//! ));
//!
//! let session = resolver.get_scoped_session();
//! let a = session.require::<UnitOfWork>().unwrap();
//! let b = session.require::<UnitOfWork>().unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! session.close_session();
//! ```
//!
//! ## Generic Types
//!
//! ```rust
//! use ferrous_inject::{Callable, Injectable, TypeExpr, TypeRegistration, Strategy, TypeRegistry};
//!
//! struct Repository {
//!     entity: String,
//! }
//!
//! impl Injectable for Repository {
//!     const TYPE_PARAMS: &'static [&'static str] = &["T"];
//!
//!     fn constructor() -> Callable<Self> {
//!         Callable::new("Repository", |args| {
//!             let entity = args
//!                 .generic_meta()
//!                 .and_then(|m| m.descriptor(0))
//!                 .map(|t| t.to_string())
//!                 .unwrap_or_default();
//!             Ok(Repository { entity })
//!         })
//!     }
//! }
//!
//! struct User;
//!
//! let mut registry = TypeRegistry::new();
//! registry
//!     .register(TypeRegistration::<Repository>::injectable(Strategy::Singleton).match_all())
//!     .unwrap();
//! let resolver = registry.build().unwrap();
//!
//! let users = resolver
//!     .require_type::<Repository>(&TypeExpr::generic_of::<Repository>([TypeExpr::of::<User>()]))
//!     .unwrap();
//! assert_eq!(users.entity, "User");
//! assert_eq!(resolver.generic_meta(&users).unwrap().descriptor(0).unwrap().to_string(), "User");
//! ```

pub mod arg_resolver;
pub mod callable;
pub mod config;
pub mod context;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod observer;
pub mod registry;
pub mod resolver;
pub mod strategy;
pub mod types;

mod internal;

pub use arg_resolver::{
    descriptor_of, descriptor_origin, ArgResolverOptions, ArgumentResolver, ResolverArgResolver,
    TypeDescriptorArgResolver,
};
pub use callable::{AnyArc, BoundArgs, CallArgs, Callable, Injectable, ParamKind, Parameter, Signature};
pub use config::{ConfigProvider, ConfigSource, ConfigValue, ContainerConfig, EnvironmentConfigSource, MapConfigSource};
pub use context::ScopeContext;
pub use error::{DiError, DiResult, ParamSite};
pub use hooks::InitHook;
pub use logging::{Logger, LoggerArgResolver};
pub use observer::{MetricsObserver, ResolutionObserver, TracingObserver, TypeMetrics};
pub use registry::{RegisteredType, TypeRegistration, TypeRegistry};
pub use resolver::Resolver;
pub use strategy::Strategy;
pub use types::{GenericMeta, Origin, ParseOptions, TypeArg, TypeDescriptor, TypeExpr, TypeRef, TypeVar, TypeVarLookup};
