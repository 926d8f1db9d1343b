//! Diagnostic observers for resolution traceability.
//!
//! Observers are registered on the [`TypeRegistry`](crate::TypeRegistry)
//! before `build()` and are notified around every instance the resolver
//! constructs. Cache hits are not reported.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::DiError;
use crate::strategy::Strategy;
use crate::types::TypeDescriptor;

/// Observer trait for resolution events.
///
/// Calls are made synchronously on the resolving thread; keep
/// implementations cheap.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{ResolutionObserver, Strategy, TypeDescriptor, TypeRegistry};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Journal(Mutex<Vec<String>>);
///
/// impl ResolutionObserver for Journal {
///     fn resolving(&self, descriptor: &TypeDescriptor, _strategy: Strategy) {
///         self.0.lock().unwrap().push(descriptor.to_string());
///     }
///     fn resolved(&self, _: &TypeDescriptor, _: Strategy, _: Duration) {}
/// }
///
/// let mut registry = TypeRegistry::new();
/// registry.add_observer(Arc::new(Journal::default()));
/// ```
pub trait ResolutionObserver: Send + Sync {
    /// Called before an instance is constructed.
    fn resolving(&self, descriptor: &TypeDescriptor, strategy: Strategy);

    /// Called once construction and initializer hooks succeeded.
    fn resolved(&self, descriptor: &TypeDescriptor, strategy: Strategy, duration: Duration);

    /// Called when construction failed. The error still propagates.
    fn failed(&self, descriptor: &TypeDescriptor, error: &DiError) {
        let _ = (descriptor, error);
    }
}

#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ResolutionObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn ResolutionObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    #[inline]
    pub(crate) fn resolving(&self, descriptor: &TypeDescriptor, strategy: Strategy) {
        for observer in &self.observers {
            observer.resolving(descriptor, strategy);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, descriptor: &TypeDescriptor, strategy: Strategy, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(descriptor, strategy, duration);
        }
    }

    #[inline]
    pub(crate) fn failed(&self, descriptor: &TypeDescriptor, error: &DiError) {
        for observer in &self.observers {
            observer.failed(descriptor, error);
        }
    }
}

/// Emits one structured `tracing` event per resolution event.
///
/// Installed automatically when
/// [`ContainerConfig::log_resolutions`](crate::ContainerConfig) is set.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    target: &'static str,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self {
            target: "ferrous_inject",
        }
    }

    /// Label attached to every event as the `container` field.
    pub fn with_target(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionObserver for TracingObserver {
    fn resolving(&self, descriptor: &TypeDescriptor, strategy: Strategy) {
        tracing::debug!(
            container = self.target,
            r#type = %descriptor,
            strategy = strategy.as_str(),
            "resolving"
        );
    }

    fn resolved(&self, descriptor: &TypeDescriptor, strategy: Strategy, duration: Duration) {
        tracing::info!(
            container = self.target,
            r#type = %descriptor,
            strategy = strategy.as_str(),
            elapsed_us = duration.as_micros() as u64,
            "resolved"
        );
    }

    fn failed(&self, descriptor: &TypeDescriptor, error: &DiError) {
        tracing::warn!(
            container = self.target,
            r#type = %descriptor,
            error = %error,
            "resolution failed"
        );
    }
}

/// Per-type counters of builds, failures and cumulative build time.
#[derive(Debug, Default)]
pub struct MetricsObserver {
    builds: AtomicU64,
    failures: AtomicU64,
    per_type: Mutex<HashMap<String, TypeMetrics>>,
}

/// Counters for one descriptor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TypeMetrics {
    pub builds: u64,
    pub failures: u64,
    pub total_time: Duration,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Counters for the descriptor displayed as `type_name`.
    pub fn for_type(&self, type_name: &str) -> TypeMetrics {
        self.per_type.lock().get(type_name).copied().unwrap_or_default()
    }

    pub fn snapshot(&self) -> HashMap<String, TypeMetrics> {
        self.per_type.lock().clone()
    }
}

impl ResolutionObserver for MetricsObserver {
    fn resolving(&self, _descriptor: &TypeDescriptor, _strategy: Strategy) {}

    fn resolved(&self, descriptor: &TypeDescriptor, _strategy: Strategy, duration: Duration) {
        self.builds.fetch_add(1, Ordering::Relaxed);
        let mut per_type = self.per_type.lock();
        let entry = per_type.entry(descriptor.to_string()).or_default();
        entry.builds += 1;
        entry.total_time += duration;
    }

    fn failed(&self, descriptor: &TypeDescriptor, _error: &DiError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.per_type
            .lock()
            .entry(descriptor.to_string())
            .or_default()
            .failures += 1;
    }
}
