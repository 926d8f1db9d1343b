//! Post-construction initializer hooks.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::callable::{BoundArgs, Parameter, Signature};
use crate::error::{DiError, DiResult};

type HookBody<T> = Arc<dyn Fn(&mut T, BoundArgs) -> DiResult<()> + Send + Sync>;

/// A hook run on a freshly built instance before it is shared.
///
/// The hook's own parameters are injected the same way constructor
/// parameters are.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{InitHook, Parameter};
///
/// struct Clock;
/// struct Cache { warmed: bool }
///
/// let warm_up = InitHook::new("Cache::warm_up", |cache: &mut Cache, args| {
///     args.get::<Clock>("clock")?;
///     cache.warmed = true;
///     Ok(())
/// })
/// .param(Parameter::of::<Clock>("clock"));
/// assert_eq!(warm_up.name(), "Cache::warm_up");
/// ```
pub struct InitHook<T> {
    name: Arc<str>,
    signature: Signature,
    body: HookBody<T>,
}

impl<T> Clone for InitHook<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            signature: self.signature.clone(),
            body: self.body.clone(),
        }
    }
}

impl<T: Any + Send + Sync> InitHook<T> {
    pub fn new<F>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(&mut T, BoundArgs) -> DiResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature: Signature::new(),
            body: Arc::new(body),
        }
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.signature = self.signature.param(param);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn erase(self, level: usize) -> ErasedHook {
        let body = self.body;
        let type_name = std::any::type_name::<T>();
        ErasedHook {
            level,
            name: self.name,
            signature: self.signature,
            body: Arc::new(move |target, args| {
                let target = target
                    .downcast_mut::<T>()
                    .ok_or_else(|| DiError::TypeMismatch {
                        type_name: type_name.to_string(),
                    })?;
                body(target, args)
            }),
        }
    }
}

impl<T> fmt::Debug for InitHook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitHook").field("name", &self.name).finish()
    }
}

type ErasedBody = Arc<dyn Fn(&mut (dyn Any + Send + Sync), BoundArgs) -> DiResult<()> + Send + Sync>;

/// Hook with its instance type erased and its level fixed.
///
/// Lower levels run first: a registration's `before_init` callbacks, then
/// ancestors from the most distant one, then the type's own hooks, then
/// `after_init`.
#[derive(Clone)]
pub(crate) struct ErasedHook {
    pub(crate) level: usize,
    pub(crate) name: Arc<str>,
    pub(crate) signature: Signature,
    body: ErasedBody,
}

impl ErasedHook {
    pub(crate) fn run(&self, target: &mut (dyn Any + Send + Sync), args: BoundArgs) -> DiResult<()> {
        (self.body)(target, args)
    }
}

impl fmt::Debug for ErasedHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedHook")
            .field("level", &self.level)
            .field("name", &self.name)
            .finish()
    }
}

/// Orders hooks base first, declaration order within a level.
pub(crate) fn order(hooks: &mut [ErasedHook]) {
    hooks.sort_by_key(|h| h.level);
}
