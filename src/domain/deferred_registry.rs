//! Deferred registration state machine.
//!
//! [`DeferredRegistry`] keeps a map from pending names to their
//! [`RegistrationHolder`]s in a sharded [`DashMap`], so contention on one
//! name never serializes unrelated names. No map guard is ever held while
//! a bean is materialized, registered, or waited for.
//!
//! # Resolution
//!
//! The first thread to win [`RegistrationHolder::try_begin_processing`]
//! materializes the bean, adapts it, and registers it with the underlying
//! registry. It removes the holder from the map *before* publishing the
//! terminal phase, so the name can be declared again the moment waiters
//! wake. Losing threads release their speculative hold on the bean source
//! and wait for the winner's outcome.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{NotificationSink, ObjectName, Phase, RegistrationHolder, WaitPolicy};
use crate::bean::{BeanAdapter, BeanSource, SourceLease};
use crate::error::ActivationError;
use crate::registry::{ObjectInstance, ObjectRegistry};

/// Result of [`DeferredRegistry::resolve_pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// No holder exists; the name is whatever the underlying registry says.
    NotPending,
    /// This call performed the resolution and reached the given phase.
    Won(Phase),
    /// Another thread performed it; this is the phase it reached.
    Lost(Phase),
}

impl ResolveOutcome {
    /// The terminal phase, if a holder was involved.
    #[must_use]
    pub const fn phase(self) -> Option<Phase> {
        match self {
            Self::NotPending => None,
            Self::Won(phase) | Self::Lost(phase) => Some(phase),
        }
    }
}

/// Pending-name map plus the resolution protocol.
///
/// Constructed explicitly and shared via `Arc`; independent instances do
/// not interact.
#[derive(Debug)]
pub struct DeferredRegistry {
    pending: DashMap<ObjectName, Arc<RegistrationHolder>>,
    underlying: Arc<dyn ObjectRegistry>,
    adapter: Arc<dyn BeanAdapter>,
    sink: Arc<dyn NotificationSink>,
    wait_policy: WaitPolicy,
}

impl DeferredRegistry {
    /// Creates an empty registry delegating to `underlying`.
    #[must_use]
    pub fn new(
        underlying: Arc<dyn ObjectRegistry>,
        adapter: Arc<dyn BeanAdapter>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            pending: DashMap::new(),
            underlying,
            adapter,
            sink,
            wait_policy: WaitPolicy::default(),
        }
    }

    /// Sets how long losing threads wait for the winner.
    #[must_use]
    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    /// The registry real registrations are delegated to.
    #[must_use]
    pub fn underlying(&self) -> &Arc<dyn ObjectRegistry> {
        &self.underlying
    }

    /// The configured wait policy.
    #[must_use]
    pub const fn wait_policy(&self) -> WaitPolicy {
        self.wait_policy
    }

    /// Declares `name` as a pending registration backed by `source`.
    ///
    /// Returns `false` if a holder for `name` already exists. On success
    /// the sink is told the name is registered, before anything has been
    /// materialized.
    pub fn declare_pending(&self, name: ObjectName, source: Arc<dyn BeanSource>) -> bool {
        let inserted = match self.pending.entry(name.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RegistrationHolder::new(name.clone(), source)));
                true
            }
        };

        if inserted {
            tracing::debug!(%name, "registration declared pending");
            self.sink.on_registered(&name);
        } else {
            tracing::debug!(%name, "registration already pending");
        }
        inserted
    }

    /// [`Self::declare_pending`] with the collision reported as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::AlreadyPending`] if `name` is tracked.
    pub fn declare(
        &self,
        name: ObjectName,
        source: Arc<dyn BeanSource>,
    ) -> Result<(), ActivationError> {
        if self.declare_pending(name.clone(), source) {
            Ok(())
        } else {
            Err(ActivationError::AlreadyPending(name))
        }
    }

    /// Resolves the pending registration for `name`, if any.
    ///
    /// Winner and losers report the same terminal phase. When activation
    /// fails the phase is [`Phase::Unregistered`] and the cause
    /// ([`ActivationError::NotFound`], [`ActivationError::NotCompliant`],
    /// [`ActivationError::RegistrationFailed`]) is available from
    /// [`RegistrationHolder::failure`].
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::WaitTimedOut`] if this call loses the race
    /// and the wait policy expires.
    pub fn resolve_pending(&self, name: &ObjectName) -> Result<ResolveOutcome, ActivationError> {
        let Some(holder) = self.holder(name) else {
            return Ok(ResolveOutcome::NotPending);
        };

        if holder.current_phase() == Phase::Pending {
            let lease = SourceLease::acquire(holder.source());
            if holder.try_begin_processing() {
                return Ok(ResolveOutcome::Won(self.activate(&holder, lease)));
            }
            // Lost the race: give back the speculative hold exactly once.
            drop(lease);
            tracing::debug!(%name, "lost activation race");
        }

        self.await_terminal(&holder).map(ResolveOutcome::Lost)
    }

    /// Resolves every name currently pending. Failures and timeouts are
    /// logged and skipped; a single bad candidate never aborts the sweep.
    pub fn resolve_all(&self) {
        let mut names: Vec<ObjectName> = self.pending.iter().map(|e| e.key().clone()).collect();
        names.sort();
        for name in &names {
            match self.resolve_pending(name) {
                Ok(outcome) if outcome.phase() == Some(Phase::Unregistered) => {
                    tracing::debug!(%name, "skipping unresolvable pending registration");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(%name, error = %err, "skipping pending registration");
                }
            }
        }
    }

    /// Cancels the pending registration for `name` without registering it.
    ///
    /// Returns `true` if this call performed the cancellation, `false` if
    /// nothing was pending or another thread resolved it first (in which
    /// case this call waits for that thread to finish).
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::WaitTimedOut`] if the wait expires.
    pub fn cancel_pending(&self, name: &ObjectName) -> Result<bool, ActivationError> {
        let Some(holder) = self.holder(name) else {
            return Ok(false);
        };

        if holder.try_begin_processing() {
            self.retire(&holder);
            holder.complete(Phase::Unregistered);
            self.sink.on_unregistered(name);
            tracing::info!(%name, "pending registration cancelled");
            return Ok(true);
        }

        self.await_terminal(&holder)?;
        Ok(false)
    }

    /// Returns the holder tracking `name`, if any.
    #[must_use]
    pub fn holder(&self, name: &ObjectName) -> Option<Arc<RegistrationHolder>> {
        self.pending.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the phase of the holder tracking `name`, if any.
    #[must_use]
    pub fn phase_of(&self, name: &ObjectName) -> Option<Phase> {
        self.pending.get(name).map(|entry| entry.current_phase())
    }

    /// Returns `true` if a holder for `name` is in the map.
    #[must_use]
    pub fn is_pending(&self, name: &ObjectName) -> bool {
        self.pending.contains_key(name)
    }

    /// Number of holders in the map.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Snapshot of pending names not yet `Unregistered`, with their
    /// sources. May be stale by the time the caller reads it.
    #[must_use]
    pub fn pending_entries(&self) -> Vec<(ObjectName, Arc<dyn BeanSource>)> {
        self.pending
            .iter()
            .filter(|entry| entry.current_phase() != Phase::Unregistered)
            .map(|entry| (entry.key().clone(), Arc::clone(entry.source())))
            .collect()
    }

    /// Winner path: materialize, adapt, register, then publish the outcome.
    fn activate(&self, holder: &Arc<RegistrationHolder>, lease: SourceLease) -> Phase {
        let name = holder.name();
        let mut guard = Activation {
            registry: self,
            holder,
            finished: false,
        };

        match self.register_real_bean(name, lease) {
            Ok(instance) => {
                guard.finish(Phase::Registered);
                tracing::info!(%name, class_name = %instance.class_name, "deferred bean activated");
                Phase::Registered
            }
            Err(err) => {
                tracing::debug!(%name, error = %err, "deferred activation failed");
                holder.record_failure(err);
                guard.finish(Phase::Unregistered);
                Phase::Unregistered
            }
        }
    }

    fn register_real_bean(
        &self,
        name: &ObjectName,
        lease: SourceLease,
    ) -> Result<ObjectInstance, ActivationError> {
        let source = Arc::clone(lease.source());
        let instance = source
            .materialize()
            .ok_or_else(|| ActivationError::NotFound(name.clone()))?;

        let bean = self
            .adapter
            .adapt(instance, source.published_types())
            .map_err(|err| ActivationError::NotCompliant {
                name: name.clone(),
                reason: err.reason().to_string(),
            })?;

        let registered = self.underlying.register_bean(bean, name).map_err(|err| {
            ActivationError::RegistrationFailed {
                name: name.clone(),
                reason: err.to_string(),
            }
        })?;

        // The live registration keeps the hold on the source.
        lease.retain();
        Ok(registered)
    }

    fn await_terminal(&self, holder: &RegistrationHolder) -> Result<Phase, ActivationError> {
        let phase = holder.current_phase();
        if phase.is_terminal() {
            return Ok(phase);
        }
        if holder.is_owned_by_current_thread() {
            tracing::warn!(
                name = %holder.name(),
                "re-entrant resolution: thread is waiting on its own activation"
            );
        }
        holder.await_completion(self.wait_policy)
    }

    /// Removes `holder` from the map, leaving any newer holder for the same
    /// name in place.
    fn retire(&self, holder: &Arc<RegistrationHolder>) {
        self.pending
            .remove_if(holder.name(), |_, current| Arc::ptr_eq(current, holder));
    }
}

/// Publishes the winner's outcome exactly once, even if activation unwinds.
struct Activation<'a> {
    registry: &'a DeferredRegistry,
    holder: &'a Arc<RegistrationHolder>,
    finished: bool,
}

impl Activation<'_> {
    fn finish(&mut self, outcome: Phase) {
        self.finished = true;
        self.registry.retire(self.holder);
        self.holder.complete(outcome);
        if outcome != Phase::Registered {
            // Balances the optimistic notification sent at declaration.
            self.registry.sink.on_unregistered(self.holder.name());
        }
    }
}

impl Drop for Activation<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(Phase::Unregistered);
        }
    }
}
