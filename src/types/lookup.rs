use super::{TypeArg, TypeDescriptor, TypeVar};
use crate::error::{DiError, DiResult};

/// Maps the generic symbols an origin declares to the arguments of one
/// concrete descriptor.
///
/// Built from the descriptor being resolved and passed down explicitly to
/// the parsing of its constructor's parameter annotations, so a parameter
/// annotated `Repo[T]` inside `Service[User]` resolves to `Repo[User]`.
#[derive(Debug, Clone, Default)]
pub struct TypeVarLookup {
    owner: Option<String>,
    bindings: Vec<(&'static str, TypeArg)>,
}

impl TypeVarLookup {
    pub fn new(descriptor: &TypeDescriptor) -> Self {
        let bindings = descriptor
            .origin()
            .params()
            .iter()
            .copied()
            .zip(descriptor.args().iter().cloned())
            .collect();
        Self {
            owner: Some(descriptor.to_string()),
            bindings,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Bound argument for `symbol`.
    pub fn get(&self, symbol: &str) -> DiResult<&TypeArg> {
        self.find(symbol).ok_or_else(|| DiError::TypeVarNotFound {
            symbol: symbol.to_string(),
            type_name: self.owner.clone().unwrap_or_else(|| "<empty lookup>".into()),
        })
    }

    /// Bound argument for `symbol`, or the symbol itself when unbound.
    pub fn get_or_symbol(&self, symbol: &'static str) -> TypeArg {
        self.find(symbol)
            .cloned()
            .unwrap_or(TypeArg::Var(TypeVar(symbol)))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.find(symbol).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &TypeArg)> + '_ {
        self.bindings.iter().map(|(symbol, arg)| (*symbol, arg))
    }

    pub(crate) fn find(&self, symbol: &str) -> Option<&TypeArg> {
        self.bindings
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, arg)| arg)
    }
}
