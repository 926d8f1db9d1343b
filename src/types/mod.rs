//! Generic-aware type descriptors.
//!
//! A [`TypeDescriptor`] is the hashable identity the registry and the scope
//! caches are keyed by. It is built from a [`TypeExpr`] once per distinct
//! expression and never mutated afterwards.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::callable::Injectable;
use crate::error::{DiError, DiResult};

mod expr;
mod lookup;

pub use expr::{Origin, TypeExpr};
pub use lookup::TypeVarLookup;

/// A generic parameter symbol such as `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeVar(pub &'static str);

impl TypeVar {
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~{}", self.0)
    }
}

/// One bound generic argument of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeArg {
    /// A concrete type
    Type(TypeDescriptor),
    /// The universal placeholder used for missing arguments
    Any,
    /// A symbol kept unresolved because the caller tolerated it
    Var(TypeVar),
    /// A name kept unresolved because the caller tolerated it
    Forward(Arc<str>),
}

impl TypeArg {
    pub fn as_descriptor(&self) -> Option<&TypeDescriptor> {
        match self {
            TypeArg::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, TypeArg::Any)
    }
}

impl fmt::Display for TypeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeArg::Type(t) => write!(f, "{}", t),
            TypeArg::Any => f.write_str("Any"),
            TypeArg::Var(v) => write!(f, "{}", v),
            TypeArg::Forward(name) => write!(f, "'{}'", name),
        }
    }
}

/// Options for [`TypeDescriptor::parse`].
///
/// Both strictness flags default to `true`: a forward reference or a free
/// generic symbol is a [`DiError::Typing`] unless the caller opts out.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions<'a> {
    pub lookup: Option<&'a TypeVarLookup>,
    pub raise_on_string: bool,
    pub raise_on_typevar: bool,
}

impl<'a> ParseOptions<'a> {
    pub fn new() -> Self {
        Self {
            lookup: None,
            raise_on_string: true,
            raise_on_typevar: true,
        }
    }

    pub fn lookup(mut self, lookup: &'a TypeVarLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Defer forward references instead of failing.
    pub fn tolerate_strings(mut self) -> Self {
        self.raise_on_string = false;
        self
    }

    /// Keep unbound symbols instead of failing.
    pub fn tolerate_type_vars(mut self) -> Self {
        self.raise_on_typevar = false;
        self
    }
}

impl Default for ParseOptions<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of parsing a top-level type expression.
#[derive(Debug, Clone)]
pub enum TypeRef {
    Resolved(TypeDescriptor),
    /// A forward reference deferred for later literal matching
    Forward { name: Arc<str>, nullable: bool },
    /// A free symbol retained because the caller tolerated it
    Var { var: TypeVar, nullable: bool },
    Any,
}

impl TypeRef {
    pub fn into_descriptor(self) -> Option<TypeDescriptor> {
        match self {
            TypeRef::Resolved(t) => Some(t),
            _ => None,
        }
    }
}

/// Immutable value identifying a possibly generic type.
///
/// Two descriptors are equal iff their origins and argument tuples are
/// equal; nullability and union members do not take part in identity, so a
/// `User | None` annotation finds the `User` registration.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{Origin, TypeDescriptor, TypeExpr};
///
/// struct Container;
/// struct A;
/// struct B;
///
/// let origin = Origin::generic::<Container>(&["T"]);
/// let ca = TypeDescriptor::resolve(&TypeExpr::generic(origin, [TypeExpr::of::<A>()])).unwrap();
/// let cb = TypeDescriptor::resolve(&TypeExpr::generic(origin, [TypeExpr::of::<B>()])).unwrap();
/// assert_ne!(ca, cb);
/// assert_eq!(ca.to_string(), "Container[A]");
///
/// // Missing arguments default to Any
/// let bare = TypeDescriptor::resolve(&TypeExpr::generic(origin, [])).unwrap();
/// assert_eq!(bare.to_string(), "Container[Any]");
/// ```
#[derive(Clone)]
pub struct TypeDescriptor {
    origin: Origin,
    args: Arc<[TypeArg]>,
    nullable: bool,
    union: Arc<[TypeDescriptor]>,
}

impl TypeDescriptor {
    /// Descriptor of a non-generic type.
    pub fn of<T: Any>() -> Self {
        Self::from_origin(Origin::of::<T>())
    }

    /// Descriptor of an [`Injectable`] type with all arguments set to `Any`.
    pub fn of_injectable<T: Injectable>() -> Self {
        Self::from_origin(Origin::injectable::<T>())
    }

    /// Descriptor of `origin` with all declared arguments set to `Any`.
    pub fn from_origin(origin: Origin) -> Self {
        Self::with_args(origin, Vec::new())
    }

    /// Descriptor of `origin` with the given arguments, padded with `Any`.
    pub fn with_args(origin: Origin, mut args: Vec<TypeArg>) -> Self {
        while args.len() < origin.params().len() {
            args.push(TypeArg::Any);
        }
        Self {
            origin,
            args: args.into(),
            nullable: false,
            union: Arc::from(Vec::new()),
        }
    }

    /// Parses a type expression.
    ///
    /// - `T | None` yields a nullable `T`; two or more non-null members make a
    ///   union whose first member is the origin.
    /// - Missing generic arguments are padded with `Any`.
    /// - Forward references fail unless `raise_on_string` is off, in which
    ///   case a top-level one is returned as [`TypeRef::Forward`].
    /// - Symbols are substituted from the lookup; an unbound one fails unless
    ///   `raise_on_typevar` is off.
    pub fn parse(expr: &TypeExpr, options: ParseOptions<'_>) -> DiResult<TypeRef> {
        match expr {
            TypeExpr::Union(_) => Self::parse_union(&expr.members(), options),
            TypeExpr::None => Err(DiError::typing("None is not a type on its own", None)),
            other => Self::parse_single(other, false, options),
        }
    }

    /// Strict parse that must produce a concrete descriptor.
    pub fn resolve(expr: &TypeExpr) -> DiResult<TypeDescriptor> {
        Self::resolve_with(expr, ParseOptions::new())
    }

    /// Parse that must produce a concrete descriptor, with custom options.
    pub fn resolve_with(expr: &TypeExpr, options: ParseOptions<'_>) -> DiResult<TypeDescriptor> {
        match Self::parse(expr, options)? {
            TypeRef::Resolved(t) => Ok(t),
            TypeRef::Forward { name, .. } => Err(DiError::typing(
                format!("Type '{}' is an unresolved forward reference", name),
                None,
            )),
            TypeRef::Var { var, .. } => Err(DiError::typing(
                format!("Type {} is an unbound generic parameter", var),
                None,
            )),
            TypeRef::Any => Err(DiError::typing("Any is not a concrete type", None)),
        }
    }

    fn parse_union(members: &[&TypeExpr], options: ParseOptions<'_>) -> DiResult<TypeRef> {
        let nullable = members.iter().any(|m| matches!(m, TypeExpr::None));
        let mut concrete = members.iter().copied().filter(|m| !matches!(m, TypeExpr::None));
        let first = concrete
            .next()
            .ok_or_else(|| DiError::typing("Union has no member besides None", None))?;
        let rest: Vec<&TypeExpr> = concrete.collect();

        let head = Self::parse_single(first, nullable, options)?;
        if rest.is_empty() {
            return Ok(head);
        }

        let mut head = match head {
            TypeRef::Resolved(t) => t,
            _ => {
                return Err(DiError::typing(
                    format!("Union member {} must be a concrete type", first),
                    None,
                ))
            }
        };
        let mut union = Vec::with_capacity(rest.len());
        for member in rest {
            match Self::parse_single(member, false, options)? {
                TypeRef::Resolved(t) => union.push(t),
                _ => {
                    return Err(DiError::typing(
                        format!("Union member {} must be a concrete type", member),
                        None,
                    ))
                }
            }
        }
        head.union = union.into();
        Ok(TypeRef::Resolved(head))
    }

    fn parse_single(expr: &TypeExpr, nullable: bool, options: ParseOptions<'_>) -> DiResult<TypeRef> {
        match expr {
            TypeExpr::Named { origin, args } => {
                let mut bound = Vec::with_capacity(args.len().max(origin.params().len()));
                for arg in args {
                    bound.push(Self::parse_arg(arg, origin, options)?);
                }
                let mut t = Self::with_args(*origin, bound);
                t.nullable = nullable;
                Ok(TypeRef::Resolved(t))
            }
            TypeExpr::Forward(name) => {
                if options.raise_on_string {
                    return Err(DiError::typing(
                        format!("Type '{}' cannot be a string", name),
                        None,
                    ));
                }
                Ok(TypeRef::Forward {
                    name: name.clone(),
                    nullable,
                })
            }
            TypeExpr::Var(symbol) => match Self::bind_symbol(TypeVar(symbol), None, options)? {
                TypeArg::Type(mut t) => {
                    t.nullable = t.nullable || nullable;
                    Ok(TypeRef::Resolved(t))
                }
                TypeArg::Any => Ok(TypeRef::Any),
                TypeArg::Var(var) => Ok(TypeRef::Var { var, nullable }),
                TypeArg::Forward(name) => Ok(TypeRef::Forward { name, nullable }),
            },
            TypeExpr::Any => Ok(TypeRef::Any),
            TypeExpr::Union(_) => Self::parse_union(&expr.members(), options),
            TypeExpr::None => Err(DiError::typing("None is not a type on its own", None)),
        }
    }

    fn parse_arg(arg: &TypeExpr, origin: &Origin, options: ParseOptions<'_>) -> DiResult<TypeArg> {
        let owner = || Some(origin.simple_name().to_string());
        match arg {
            TypeExpr::Forward(name) => {
                if options.raise_on_string {
                    return Err(DiError::typing(
                        format!("Generic parameter '{}' cannot be a string", name),
                        owner(),
                    ));
                }
                Ok(TypeArg::Forward(name.clone()))
            }
            TypeExpr::Var(symbol) => Self::bind_symbol(TypeVar(symbol), Some(origin), options),
            TypeExpr::Any => Ok(TypeArg::Any),
            TypeExpr::None => Err(DiError::typing("None cannot be a generic argument", owner())),
            other => match Self::parse(other, options)? {
                TypeRef::Resolved(t) => Ok(TypeArg::Type(t)),
                TypeRef::Any => Ok(TypeArg::Any),
                TypeRef::Var { var, .. } => Ok(TypeArg::Var(var)),
                TypeRef::Forward { name, .. } => Ok(TypeArg::Forward(name)),
            },
        }
    }

    fn bind_symbol(var: TypeVar, origin: Option<&Origin>, options: ParseOptions<'_>) -> DiResult<TypeArg> {
        let owner = || origin.map(|o| o.simple_name().to_string());
        match options.lookup {
            Some(lookup) => {
                if let Some(arg) = lookup.find(var.name()) {
                    return Ok(arg.clone());
                }
                if options.raise_on_typevar {
                    return Err(DiError::typing(
                        format!("TypeVar {} could not be found in lookup", var),
                        owner(),
                    ));
                }
            }
            None => {
                if options.raise_on_typevar {
                    return Err(DiError::typing(
                        format!("Generic parameter {} cannot be a TypeVar", var),
                        owner(),
                    ));
                }
            }
        }
        Ok(TypeArg::Var(var))
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn args(&self) -> &[TypeArg] {
        &self.args
    }

    pub(crate) fn args_arc(&self) -> Arc<[TypeArg]> {
        self.args.clone()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_union(&self) -> bool {
        !self.union.is_empty()
    }

    /// Union members besides the origin.
    pub fn union(&self) -> &[TypeDescriptor] {
        &self.union
    }

    /// True when an argument is still a symbol or a forward reference.
    pub fn has_unresolved_args(&self) -> bool {
        self.args
            .iter()
            .any(|a| matches!(a, TypeArg::Var(_) | TypeArg::Forward(_)))
    }

    pub fn simple_name(&self) -> &'static str {
        self.origin.simple_name()
    }

    /// Lookup mapping this descriptor's declared symbols to its arguments.
    pub fn lookup(&self) -> TypeVarLookup {
        TypeVarLookup::new(self)
    }

    /// Identity-only copy: not nullable, no union members.
    pub(crate) fn key(&self) -> TypeDescriptor {
        if !self.nullable && self.union.is_empty() {
            return self.clone();
        }
        Self {
            origin: self.origin,
            args: self.args.clone(),
            nullable: false,
            union: Arc::from(Vec::new()),
        }
    }

    /// Same descriptor padded with `Any` up to `params` arguments.
    pub(crate) fn padded_to(&self, params: usize) -> TypeDescriptor {
        if self.args.len() >= params {
            return self.key();
        }
        let mut args = self.args.to_vec();
        while args.len() < params {
            args.push(TypeArg::Any);
        }
        Self {
            origin: self.origin,
            args: args.into(),
            nullable: false,
            union: Arc::from(Vec::new()),
        }
    }

    pub(crate) fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin && self.args == other.args
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.origin.hash(state);
        self.args.hash(state);
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.origin.simple_name())?;
        if !self.args.is_empty() {
            f.write_str("[")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", arg)?;
            }
            f.write_str("]")?;
        }
        for member in self.union.iter() {
            write!(f, " | {}", member)?;
        }
        if self.nullable {
            f.write_str(" | None")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Type {}>", self)
    }
}

impl From<&TypeDescriptor> for TypeExpr {
    fn from(t: &TypeDescriptor) -> Self {
        let args = t
            .args
            .iter()
            .map(|arg| match arg {
                TypeArg::Type(inner) => TypeExpr::from(inner),
                TypeArg::Any => TypeExpr::Any,
                TypeArg::Var(v) => TypeExpr::Var(v.name()),
                TypeArg::Forward(name) => TypeExpr::Forward(name.clone()),
            })
            .collect();
        let head = TypeExpr::Named {
            origin: t.origin,
            args,
        };
        if t.union.is_empty() && !t.nullable {
            return head;
        }
        let mut members = vec![head];
        members.extend(t.union.iter().map(TypeExpr::from));
        if t.nullable {
            members.push(TypeExpr::None);
        }
        TypeExpr::Union(members)
    }
}

/// Generic arguments an instance was built with.
///
/// Recorded for every instance built from a registration whose origin
/// declares generic parameters; read back with
/// [`Resolver::generic_meta`](crate::Resolver::generic_meta).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericMeta {
    args: Arc<[TypeArg]>,
}

impl GenericMeta {
    pub(crate) fn new(args: Arc<[TypeArg]>) -> Self {
        Self { args }
    }

    pub fn args(&self) -> &[TypeArg] {
        &self.args
    }

    /// Descriptor of the argument at `index`, when it is a concrete type.
    pub fn descriptor(&self, index: usize) -> Option<&TypeDescriptor> {
        self.args.get(index).and_then(TypeArg::as_descriptor)
    }
}
