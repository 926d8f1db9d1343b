//! Circular dependency detection infrastructure.

use std::cell::RefCell;

use indexmap::IndexMap;

use crate::error::{DiError, DiResult};
use crate::strategy::Strategy;
use crate::types::TypeDescriptor;

pub(crate) const DEFAULT_MAX_DEPTH: usize = 1024;

thread_local! {
    /// Builds in flight on this thread, across every guard, tagged with the
    /// container that owns them.
    static IN_FLIGHT: RefCell<Vec<(usize, TypeDescriptor)>> = const { RefCell::new(Vec::new()) };
}

/// Pops this thread's in-flight entry on drop, unwinding included.
struct InFlight;

impl InFlight {
    fn push(owner: usize, key: &TypeDescriptor) -> Self {
        IN_FLIGHT.with(|f| f.borrow_mut().push((owner, key.key())));
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let _ = IN_FLIGHT.try_with(|f| f.borrow_mut().pop());
    }
}

/// Descriptors currently under construction within one resolution call tree.
///
/// One guard is created per top-level `require` or `call` and threaded down
/// explicitly, so unrelated resolutions (other threads, other sessions) never
/// see each other's entries. A factory that resolves through an injected
/// `Resolver` starts a new guard on the same thread; the thread-local
/// in-flight list catches it coming back to a type still being built.
#[derive(Debug)]
pub(crate) struct CircularGuard {
    stack: IndexMap<TypeDescriptor, Strategy>,
    max_depth: usize,
    owner: usize,
}

impl CircularGuard {
    /// Guard for one call tree of the container identified by `owner`.
    pub(crate) fn new(max_depth: usize, owner: usize) -> Self {
        Self {
            stack: IndexMap::new(),
            max_depth,
            owner,
        }
    }

    /// Fails with the full path when `key` is already being constructed,
    /// by this call tree or by one further up this thread's stack.
    pub(crate) fn check(&self, key: &TypeDescriptor) -> DiResult<()> {
        if self.stack.contains_key(key) {
            let mut path: Vec<String> = self.stack.keys().map(|t| t.to_string()).collect();
            path.push(key.to_string());
            return Err(DiError::Circular { path });
        }
        let outer = IN_FLIGHT.with(|f| {
            let f = f.borrow();
            f.iter()
                .position(|(owner, t)| *owner == self.owner && t == key)
                .map(|start| {
                    f[start..]
                        .iter()
                        .filter(|(owner, _)| *owner == self.owner)
                        .map(|(_, t)| t.to_string())
                        .collect::<Vec<_>>()
                })
        });
        if let Some(mut path) = outer {
            path.push(key.to_string());
            return Err(DiError::Circular { path });
        }
        Ok(())
    }

    /// Runs `f` with `key` pushed; the entry is popped whatever `f` returns.
    pub(crate) fn enter<R>(
        &mut self,
        key: &TypeDescriptor,
        strategy: Strategy,
        f: impl FnOnce(&mut Self) -> DiResult<R>,
    ) -> DiResult<R> {
        self.check(key)?;
        if self.stack.len() >= self.max_depth {
            return Err(DiError::DepthExceeded(self.stack.len()));
        }
        self.stack.insert(key.key(), strategy);
        let in_flight = InFlight::push(self.owner, key);
        let result = f(self);
        drop(in_flight);
        self.stack.pop();
        result
    }

    /// The type whose construction is requesting the current dependency.
    pub(crate) fn caller(&self) -> Option<(&TypeDescriptor, Strategy)> {
        self.stack.last().map(|(t, s)| (t, *s))
    }

    /// Nearest singleton in the chain, if any.
    pub(crate) fn nearest_singleton(&self) -> Option<&TypeDescriptor> {
        self.stack
            .iter()
            .rev()
            .find(|(_, s)| **s == Strategy::Singleton)
            .map(|(t, _)| t)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.stack.len()
    }
}

impl Default for CircularGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn reentry_reports_path_and_unwinds() {
        let a = TypeDescriptor::of::<A>();
        let b = TypeDescriptor::of::<B>();
        let mut guard = CircularGuard::default();

        let err = guard
            .enter(&a, Strategy::Singleton, |g| {
                g.enter(&b, Strategy::Transient, |g| g.enter(&a, Strategy::Singleton, |_| Ok(())))
            })
            .unwrap_err();

        match err {
            DiError::Circular { path } => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(guard.is_empty());
    }

    #[test]
    fn nested_guard_on_same_thread_sees_outer_builds() {
        let a = TypeDescriptor::of::<A>();
        let b = TypeDescriptor::of::<B>();
        let mut outer = CircularGuard::new(DEFAULT_MAX_DEPTH, 7);

        let err = outer
            .enter(&a, Strategy::Singleton, |_| {
                let mut inner = CircularGuard::new(DEFAULT_MAX_DEPTH, 7);
                inner.enter(&b, Strategy::Singleton, |g| g.check(&a))
            })
            .unwrap_err();
        match err {
            DiError::Circular { path } => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("unexpected error: {other}"),
        }

        // another container on the same thread is unaffected
        outer
            .enter(&a, Strategy::Singleton, |_| CircularGuard::new(DEFAULT_MAX_DEPTH, 8).check(&a))
            .unwrap();
        assert!(IN_FLIGHT.with(|f| f.borrow().is_empty()));
    }

    #[test]
    fn depth_limit() {
        let mut guard = CircularGuard::new(1, 0);
        let err = guard
            .enter(&TypeDescriptor::of::<A>(), Strategy::Transient, |g| {
                g.enter(&TypeDescriptor::of::<B>(), Strategy::Transient, |_| Ok(()))
            })
            .unwrap_err();
        assert!(matches!(err, DiError::DepthExceeded(1)));
        assert_eq!(guard.len(), 0);
    }
}
