//! Lazily materialized bean sources.
//!
//! A [`BeanSource`] is the handle a discovering component hands to
//! [`crate::domain::DeferredRegistry::declare_pending`]. Nothing is
//! materialized until the name is first accessed.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::BeanInstance;

const UNKNOWN_CLASS: &str = "unknown";

/// External reference used to obtain the concrete object to register.
///
/// `acquire` and `release` bracket a speculative hold on the source (for
/// example a use count on a service reference). Every `acquire` is paired
/// with exactly one `release`, except for the hold kept by a successful
/// registration.
pub trait BeanSource: Send + Sync + fmt::Debug {
    /// Type names the bean declares it publishes.
    fn published_types(&self) -> &[String];

    /// Module owning the published types, used for subtype checks.
    fn owning_module(&self) -> Option<&str> {
        None
    }

    /// Class name reported for the bean before it is materialized.
    fn class_name(&self) -> &str {
        self.published_types()
            .first()
            .map_or(UNKNOWN_CLASS, String::as_str)
    }

    /// Takes a speculative hold on the source.
    fn acquire(&self) {}

    /// Drops a hold taken by [`BeanSource::acquire`].
    fn release(&self) {}

    /// Produces the concrete object, or `None` if it is gone.
    fn materialize(&self) -> Option<BeanInstance>;
}

/// RAII hold on a [`BeanSource`]. Dropping it releases the source unless
/// [`SourceLease::retain`] handed the hold over to a live registration.
#[derive(Debug)]
pub struct SourceLease {
    source: Arc<dyn BeanSource>,
    held: bool,
}

impl SourceLease {
    /// Acquires a hold on `source`.
    #[must_use]
    pub fn acquire(source: &Arc<dyn BeanSource>) -> Self {
        source.acquire();
        Self {
            source: Arc::clone(source),
            held: true,
        }
    }

    /// Returns the leased source.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn BeanSource> {
        &self.source
    }

    /// Keeps the hold for the lifetime of the registration.
    pub fn retain(mut self) {
        self.held = false;
    }
}

impl Drop for SourceLease {
    fn drop(&mut self) {
        if self.held {
            self.source.release();
        }
    }
}

type Materializer = Arc<dyn Fn() -> Option<BeanInstance> + Send + Sync>;

/// A [`BeanSource`] backed by a closure.
///
/// Counts materializations and outstanding holds, which makes it usable
/// both for simple embeddings and for verifying the activation protocol.
pub struct ClosureSource {
    published_types: Vec<String>,
    module: Option<String>,
    materializer: Materializer,
    materializations: AtomicUsize,
    outstanding: AtomicUsize,
}

impl ClosureSource {
    /// Creates a source publishing `types` and producing beans with `f`.
    #[must_use]
    pub fn new<I, S, F>(types: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn() -> Option<BeanInstance> + Send + Sync + 'static,
    {
        Self {
            published_types: types.into_iter().map(Into::into).collect(),
            module: None,
            materializer: Arc::new(f),
            materializations: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Sets the owning module.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Number of times [`BeanSource::materialize`] ran.
    #[must_use]
    pub fn materializations(&self) -> usize {
        self.materializations.load(Ordering::Acquire)
    }

    /// Number of holds acquired and not yet released.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ClosureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureSource")
            .field("published_types", &self.published_types)
            .field("module", &self.module)
            .field("materializations", &self.materializations())
            .field("outstanding", &self.outstanding())
            .finish_non_exhaustive()
    }
}

impl BeanSource for ClosureSource {
    fn published_types(&self) -> &[String] {
        &self.published_types
    }

    fn owning_module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    fn acquire(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&self) {
        // Saturate rather than wrap if a caller releases without acquiring.
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    fn materialize(&self) -> Option<BeanInstance> {
        self.materializations.fetch_add(1, Ordering::AcqRel);
        (self.materializer)()
    }
}
