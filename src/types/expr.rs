//! Type expressions: what a parameter or a registration is annotated with.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::callable::Injectable;

/// Identity of a (possibly generic) type: its `TypeId`, its full name and the
/// symbols of its declared generic parameters.
///
/// Generic parameters are runtime parameters here: a `Repository` struct that
/// declares `&["T"]` can be resolved as `Repository[User]` and
/// `Repository[Order]`, and both instances share the same Rust type.
///
/// Equality and hashing use the `TypeId` only.
#[derive(Clone, Copy)]
pub struct Origin {
    id: TypeId,
    name: &'static str,
    params: &'static [&'static str],
}

impl Origin {
    /// Origin of a non-generic type.
    pub fn of<T: Any>() -> Self {
        Self::generic::<T>(&[])
    }

    /// Origin of a type declaring runtime generic parameters.
    pub fn generic<T: Any>(params: &'static [&'static str]) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            params,
        }
    }

    /// Origin of an [`Injectable`] type, with the parameters it declares.
    pub fn injectable<T: Injectable>() -> Self {
        Self::generic::<T>(T::TYPE_PARAMS)
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Full path, as reported by `std::any::type_name`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment without generic arguments: `app::users::UserService`
    /// becomes `UserService`. This is the name literal matching compares.
    pub fn simple_name(&self) -> &'static str {
        simple_name(self.name)
    }

    pub fn params(&self) -> &'static [&'static str] {
        self.params
    }

    /// Same type identity, different declared parameters.
    pub(crate) fn with_params(self, params: &'static [&'static str]) -> Self {
        Self { params, ..self }
    }
}

pub(crate) fn simple_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

impl PartialEq for Origin {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Origin {}

impl Hash for Origin {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Origin")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// An annotation as written on a parameter or passed to `require_type`.
///
/// This is the unparsed form; [`TypeDescriptor::parse`](crate::TypeDescriptor::parse)
/// turns it into a descriptor, resolving symbols against a lookup and
/// detecting nullability and unions.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{Origin, TypeExpr};
///
/// struct Repository;
/// struct User;
///
/// // Repository[User]
/// let repo = TypeExpr::generic(Origin::generic::<Repository>(&["T"]), [TypeExpr::of::<User>()]);
/// // User | None
/// let maybe_user = TypeExpr::of::<User>().or_none();
/// // 'User', resolved later by simple name
/// let forward = TypeExpr::forward("User");
/// # let _ = (repo, maybe_user, forward);
/// ```
#[derive(Clone, Debug)]
pub enum TypeExpr {
    /// A type, possibly with generic arguments
    Named { origin: Origin, args: Vec<TypeExpr> },
    /// A generic parameter symbol such as `T`
    Var(&'static str),
    /// A type referenced by its simple name
    Forward(Arc<str>),
    /// `A | B | ...`, possibly containing `None`
    Union(Vec<TypeExpr>),
    /// The null member of a union
    None,
    /// The universal placeholder
    Any,
}

impl TypeExpr {
    pub fn of<T: Any>() -> Self {
        TypeExpr::Named {
            origin: Origin::of::<T>(),
            args: Vec::new(),
        }
    }

    /// An [`Injectable`] type without arguments; missing arguments become `Any`.
    pub fn injectable<T: Injectable>() -> Self {
        TypeExpr::Named {
            origin: Origin::injectable::<T>(),
            args: Vec::new(),
        }
    }

    pub fn generic(origin: Origin, args: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::Named {
            origin,
            args: args.into_iter().collect(),
        }
    }

    pub fn generic_of<T: Injectable>(args: impl IntoIterator<Item = TypeExpr>) -> Self {
        Self::generic(Origin::injectable::<T>(), args)
    }

    pub fn var(symbol: &'static str) -> Self {
        TypeExpr::Var(symbol)
    }

    pub fn forward(name: impl Into<Arc<str>>) -> Self {
        TypeExpr::Forward(name.into())
    }

    /// `A | B | ...`; nested unions are flattened into one.
    pub fn union(members: impl IntoIterator<Item = TypeExpr>) -> Self {
        let mut flat = Vec::new();
        for member in members {
            match member {
                TypeExpr::Union(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        TypeExpr::Union(flat)
    }

    /// `self | None`
    pub fn or_none(self) -> Self {
        match self {
            TypeExpr::Union(mut members) => {
                if !members.iter().any(|m| matches!(m, TypeExpr::None)) {
                    members.push(TypeExpr::None);
                }
                TypeExpr::Union(members)
            }
            other => TypeExpr::Union(vec![other, TypeExpr::None]),
        }
    }

    /// Number of non-null members: 1 for anything that is not a union.
    pub fn non_null_arity(&self) -> usize {
        match self {
            TypeExpr::Union(_) => self
                .members()
                .iter()
                .filter(|m| !matches!(m, TypeExpr::None))
                .count(),
            _ => 1,
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.members().iter().any(|m| matches!(m, TypeExpr::None))
    }

    /// Members with nested unions flattened; `[self]` for anything else.
    pub(crate) fn members(&self) -> Vec<&TypeExpr> {
        let mut out = Vec::new();
        self.collect_members(&mut out);
        out
    }

    fn collect_members<'a>(&'a self, out: &mut Vec<&'a TypeExpr>) {
        match self {
            TypeExpr::Union(members) => {
                for member in members {
                    member.collect_members(out);
                }
            }
            other => out.push(other),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named { origin, args } => {
                f.write_str(origin.simple_name())?;
                if !args.is_empty() {
                    f.write_str("[")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str("]")?;
                }
                Ok(())
            }
            TypeExpr::Var(symbol) => write!(f, "~{}", symbol),
            TypeExpr::Forward(name) => write!(f, "'{}'", name),
            TypeExpr::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
            TypeExpr::None => f.write_str("None"),
            TypeExpr::Any => f.write_str("Any"),
        }
    }
}
