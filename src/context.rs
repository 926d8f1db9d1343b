//! Instance caches: the root context and the session contexts layered on it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::callable::AnyArc;
use crate::error::{DiError, DiResult};
use crate::types::{GenericMeta, TypeDescriptor};

/// Per-descriptor cache cell. Holding its lock is what makes a first build
/// exclusive; a failed build leaves it `None`.
pub(crate) type Slot = Arc<Mutex<Option<AnyArc>>>;

type Tag = (Weak<dyn Any + Send + Sync>, GenericMeta);

const MIN_PRUNE: usize = 64;

/// Generic tags keyed by instance address. Dead entries are swept when the
/// table doubles, so tagging stays amortized O(1).
struct TagTable {
    entries: HashMap<usize, Tag>,
    prune_at: usize,
}

impl TagTable {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            prune_at: MIN_PRUNE,
        }
    }

    fn insert(&mut self, instance: &AnyArc, meta: GenericMeta) {
        if self.entries.len() >= self.prune_at {
            self.entries.retain(|_, (weak, _)| weak.strong_count() > 0);
            self.prune_at = (self.entries.len() * 2).max(MIN_PRUNE);
        }
        // a reused address replaces the dead entry it belonged to
        self.entries
            .insert(address(instance), (Arc::downgrade(instance), meta));
    }

    fn get(&self, ptr: *const ()) -> Option<GenericMeta> {
        self.entries
            .get(&(ptr as usize))
            .filter(|(weak, _)| weak.strong_count() > 0)
            .map(|(_, meta)| meta.clone())
    }
}

fn address(instance: &AnyArc) -> usize {
    Arc::as_ptr(instance) as *const () as usize
}

/// Instance cache keyed by [`TypeDescriptor`].
///
/// The root context holds singletons and never closes. A session context is
/// a child of the root: it holds scoped instances and anything bound into it,
/// and reads through to the root for everything else.
///
/// Cloning is cheap and yields a handle on the same cache.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{ScopeContext, TypeDescriptor};
/// use std::sync::Arc;
///
/// struct Request(u32);
///
/// let root = ScopeContext::root();
/// let session = root.open_session();
/// let key = TypeDescriptor::of::<Request>();
///
/// session.bind(&key, Arc::new(Request(7))).unwrap();
/// assert!(session.get(&key).is_some());
/// assert!(root.get(&key).is_none());
///
/// session.close_session();
/// assert!(session.get(&key).is_none());
/// ```
#[derive(Clone)]
pub struct ScopeContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    parent: Option<ScopeContext>,
    slots: Mutex<HashMap<TypeDescriptor, Slot>>,
    closed: AtomicBool,
    tags: Mutex<TagTable>,
}

impl ScopeContext {
    pub fn root() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<ScopeContext>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                parent,
                slots: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
                tags: Mutex::new(TagTable::new()),
            }),
        }
    }

    /// Opens a session whose parent is this context's root.
    pub fn open_session(&self) -> ScopeContext {
        Self::with_parent(Some(self.root_context()))
    }

    /// Discards this session's own cache. The root is never closed.
    pub fn close_session(&self) {
        if self.inner.parent.is_none() {
            return;
        }
        self.inner.closed.store(true, Ordering::Release);
        let dropped = std::mem::take(&mut *self.inner.slots.lock());
        tracing::debug!(instances = dropped.len(), "scoped session closed");
    }

    pub fn is_session(&self) -> bool {
        self.inner.parent.is_some()
    }

    /// True for a session that has not been closed.
    pub fn is_open_session(&self) -> bool {
        self.is_session() && !self.inner.closed.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn parent(&self) -> Option<&ScopeContext> {
        self.inner.parent.as_ref()
    }

    pub(crate) fn root_context(&self) -> ScopeContext {
        match &self.inner.parent {
            Some(parent) => parent.root_context(),
            None => self.clone(),
        }
    }

    /// Binds `instance` to `descriptor` in this context.
    ///
    /// Re-binding the same instance is a no-op; binding a different one
    /// fails with [`DiError::InstanceExists`].
    pub fn bind(&self, descriptor: &TypeDescriptor, instance: AnyArc) -> DiResult<()> {
        let slot = self.slot(descriptor);
        let mut cell = slot.lock();
        match &*cell {
            Some(existing) if same_instance(existing, &instance) => Ok(()),
            Some(_) => Err(DiError::InstanceExists {
                type_name: descriptor.to_string(),
                reason: "a different instance is already bound in this context",
            }),
            None => {
                *cell = Some(instance);
                Ok(())
            }
        }
    }

    /// Cached instance for `descriptor`: this context first, then the parent.
    pub fn get(&self, descriptor: &TypeDescriptor) -> Option<AnyArc> {
        if !self.is_closed() {
            let slot = self.inner.slots.lock().get(descriptor).cloned();
            if let Some(slot) = slot {
                if let Some(instance) = slot.lock().clone() {
                    return Some(instance);
                }
            }
        }
        self.inner.parent.as_ref().and_then(|p| p.get(descriptor))
    }

    /// True when this context itself (not its parent) holds an instance.
    pub fn contains(&self, descriptor: &TypeDescriptor) -> bool {
        let slot = self.inner.slots.lock().get(descriptor).cloned();
        slot.map(|s| s.lock().is_some()).unwrap_or(false)
    }

    /// Number of instances held by this context itself.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self.inner.slots.lock().values().cloned().collect();
        slots.iter().filter(|s| s.lock().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn slot(&self, descriptor: &TypeDescriptor) -> Slot {
        self.inner
            .slots
            .lock()
            .entry(descriptor.key())
            .or_default()
            .clone()
    }

    /// Records the generic arguments `instance` was built with, in the root.
    pub(crate) fn tag(&self, instance: &AnyArc, meta: GenericMeta) {
        let root = self.root_context();
        let mut tags = root.inner.tags.lock();
        tags.insert(instance, meta);
    }

    pub(crate) fn meta_of(&self, ptr: *const ()) -> Option<GenericMeta> {
        let root = self.root_context();
        let tags = root.inner.tags.lock();
        tags.get(ptr)
    }
}

fn same_instance(a: &AnyArc, b: &AnyArc) -> bool {
    address(a) == address(b)
}

impl fmt::Debug for ScopeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeContext")
            .field("session", &self.is_session())
            .field("closed", &self.is_closed())
            .field("instances", &self.len())
            .finish()
    }
}
