//! Per-name state of a pending registration.
//!
//! A [`RegistrationHolder`] moves monotonically through
//! `Pending → Processing → {Registered, Unregistered}`. The only way out
//! of `Pending` is a single compare-and-set, so exactly one thread ever
//! owns the real work. Every other thread blocks on the completion signal
//! until the owner publishes the terminal phase.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use super::ObjectName;
use crate::bean::BeanSource;
use crate::error::ActivationError;

/// Default bound on how long a losing thread waits for the winner.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(30);

/// Lifecycle phase of a holder.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Declared; nobody has started resolving it.
    Pending = 0,
    /// One thread is registering or cancelling it.
    Processing = 1,
    /// The bean is live in the underlying registry.
    Registered = 2,
    /// The bean will never be registered through this holder.
    Unregistered = 3,
}

impl Phase {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Processing,
            2 => Self::Registered,
            _ => Self::Unregistered,
        }
    }

    /// Returns `true` for `Registered` and `Unregistered`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Registered | Self::Unregistered)
    }
}

/// How long a thread that lost the activation race waits for the winner.
///
/// Waiting forever risks deadlock if the winner itself blocks on the same
/// name, so indefinite waiting must be chosen explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Block until the winner completes, however long that takes.
    Indefinite,
    /// Give up with [`ActivationError::WaitTimedOut`] after this long.
    Bounded(Duration),
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::Bounded(DEFAULT_WAIT)
    }
}

/// Mutable state for one pending name.
#[derive(Debug)]
pub struct RegistrationHolder {
    name: ObjectName,
    phase: AtomicU8,
    source: Arc<dyn BeanSource>,
    done: Mutex<bool>,
    completed: Condvar,
    owner: Mutex<Option<ThreadId>>,
    failure: Mutex<Option<ActivationError>>,
}

impl RegistrationHolder {
    /// Creates a holder in [`Phase::Pending`].
    #[must_use]
    pub fn new(name: ObjectName, source: Arc<dyn BeanSource>) -> Self {
        Self {
            name,
            phase: AtomicU8::new(Phase::Pending as u8),
            source,
            done: Mutex::new(false),
            completed: Condvar::new(),
            owner: Mutex::new(None),
            failure: Mutex::new(None),
        }
    }

    /// Name this holder tracks.
    #[must_use]
    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    /// Bean source used to materialize the real bean.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn BeanSource> {
        &self.source
    }

    /// Non-blocking snapshot of the phase.
    #[must_use]
    pub fn current_phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Moves `Pending → Processing`. Returns `true` to exactly one caller
    /// over the holder's lifetime.
    pub fn try_begin_processing(&self) -> bool {
        let won = self
            .phase
            .compare_exchange(
                Phase::Pending as u8,
                Phase::Processing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won {
            *self.owner.lock() = Some(thread::current().id());
        }
        won
    }

    /// Returns `true` if the calling thread won [`Self::try_begin_processing`].
    #[must_use]
    pub fn is_owned_by_current_thread(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    /// Records why the activation did not register the bean. Must happen
    /// before [`Self::complete`] so waiters can read it.
    pub fn record_failure(&self, cause: ActivationError) {
        *self.failure.lock() = Some(cause);
    }

    /// Why the winning thread ended in [`Phase::Unregistered`], if it
    /// failed rather than being cancelled.
    #[must_use]
    pub fn failure(&self) -> Option<ActivationError> {
        self.failure.lock().clone()
    }

    /// Publishes the terminal phase and wakes every waiter.
    ///
    /// Only the thread that won [`Self::try_begin_processing`] may call
    /// this, once. Later calls and non-terminal outcomes are ignored.
    pub fn complete(&self, outcome: Phase) {
        if !outcome.is_terminal() {
            tracing::warn!(name = %self.name, ?outcome, "ignoring non-terminal completion");
            return;
        }
        let mut done = self.done.lock();
        if *done {
            tracing::warn!(name = %self.name, ?outcome, "holder already completed");
            return;
        }
        self.phase.store(outcome as u8, Ordering::Release);
        *done = true;
        drop(done);
        self.completed.notify_all();
    }

    /// Returns `true` once [`Self::complete`] has run.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        *self.done.lock()
    }

    /// Blocks until [`Self::complete`] has run, then returns the terminal
    /// phase. Spurious wakeups re-enter the wait.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::WaitTimedOut`] if a bounded policy
    /// expires first.
    pub fn await_completion(&self, policy: WaitPolicy) -> Result<Phase, ActivationError> {
        let mut done = self.done.lock();
        let deadline = match policy {
            WaitPolicy::Indefinite => None,
            WaitPolicy::Bounded(limit) => Instant::now().checked_add(limit).map(|d| (d, limit)),
        };

        while !*done {
            match deadline {
                None => self.completed.wait(&mut done),
                Some((deadline, limit)) => {
                    if self.completed.wait_until(&mut done, deadline).timed_out() && !*done {
                        tracing::warn!(name = %self.name, ?limit, "timed out waiting for activation");
                        return Err(ActivationError::WaitTimedOut {
                            name: self.name.clone(),
                            waited: limit,
                        });
                    }
                }
            }
        }
        drop(done);
        Ok(self.current_phase())
    }
}
