//! Error types for the registry contract, the activation core, and beans.
//!
//! [`RegistryError`] is the uniform error of every
//! [`crate::registry::ObjectRegistry`] operation. [`ActivationError`] is the
//! narrower taxonomy produced while resolving a pending registration; the
//! facade translates it into [`RegistryError`] so callers see one contract
//! whether a name was pending or already live.

use std::time::Duration;

use crate::domain::{ListenerId, ObjectName, ObjectNameError};

/// Failure raised by a [`crate::bean::ManagedBean`] while serving a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BeanError {
    /// The bean exposes no attribute with this name.
    #[error("attribute not found: {0}")]
    AttributeNotFound(String),

    /// The attribute exists but cannot be written.
    #[error("attribute is read-only: {0}")]
    ReadOnly(String),

    /// The bean exposes no operation with this name.
    #[error("operation not found: {0}")]
    OperationNotFound(String),

    /// An argument was rejected by the bean.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Any other bean-side failure.
    #[error("{0}")]
    Failed(String),
}

/// Failure while declaring, resolving, or cancelling a pending registration.
///
/// There is no unregistration variant. Cancelling a pending name only
/// drops its holder and never calls into the underlying registry, so it
/// cannot be vetoed. Unregistering a live bean goes straight to the
/// underlying registry, which reports a veto from
/// [`crate::bean::ManagedBean::pre_deregister`] as
/// [`RegistryError::UnregistrationFailed`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ActivationError {
    /// A holder for this name already exists.
    #[error("registration for {0} is already pending")]
    AlreadyPending(ObjectName),

    /// The bean source yielded no object.
    #[error("bean source for {0} yielded no object")]
    NotFound(ObjectName),

    /// No published type of the bean is usable as a management interface.
    #[error("bean for {name} is not compliant: {reason}")]
    NotCompliant {
        /// Name being resolved.
        name: ObjectName,
        /// Why the adapter refused the bean.
        reason: String,
    },

    /// The underlying registry rejected the real registration.
    #[error("registration of {name} failed: {reason}")]
    RegistrationFailed {
        /// Name being resolved.
        name: ObjectName,
        /// Failure reported by the underlying registry.
        reason: String,
    },

    /// A losing thread gave up waiting for the winner to finish.
    #[error("gave up waiting {waited:?} for resolution of {name}")]
    WaitTimedOut {
        /// Name being resolved.
        name: ObjectName,
        /// How long the caller waited.
        waited: Duration,
    },
}

/// Uniform error of the object registry contract.
///
/// # Error Code Ranges
///
/// | Range     | Category                  |
/// |-----------|---------------------------|
/// | 1000–1999 | Malformed request         |
/// | 2000–2999 | Not found / conflict      |
/// | 3000–3999 | Registration lifecycle    |
/// | 4000–4999 | Bean-side failure         |
/// | 5000–5999 | Internal                  |
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No bean is registered (or resolvable) under this name.
    #[error("instance not found: {0}")]
    InstanceNotFound(ObjectName),

    /// A bean is already registered or pending under this name.
    #[error("instance already exists: {0}")]
    InstanceAlreadyExists(ObjectName),

    /// The bean cannot be exposed through the registry.
    #[error("not compliant: {name}: {reason}")]
    NotCompliant {
        /// Name the bean was offered under.
        name: ObjectName,
        /// Why the bean was refused.
        reason: String,
    },

    /// The bean refused to be registered.
    #[error("registration of {name} failed: {reason}")]
    RegistrationFailed {
        /// Name the bean was offered under.
        name: ObjectName,
        /// Reason reported by the bean or registry.
        reason: String,
    },

    /// The bean refused to be unregistered.
    #[error("unregistration of {name} failed: {reason}")]
    UnregistrationFailed {
        /// Name being unregistered.
        name: ObjectName,
        /// Reason reported by the bean or registry.
        reason: String,
    },

    /// A name could not be parsed, or a pattern was used where a concrete
    /// name is required.
    #[error("malformed object name: {0}")]
    MalformedName(String),

    /// The target bean rejected an attribute or operation request.
    #[error("bean {name} failed: {source}")]
    Bean {
        /// Target bean.
        name: ObjectName,
        /// Bean-side failure.
        #[source]
        source: BeanError,
    },

    /// No listener with this id is attached to the bean.
    #[error("listener {listener} not attached to {name}")]
    ListenerNotFound {
        /// Target bean.
        name: ObjectName,
        /// Listener that was not found.
        listener: ListenerId,
    },

    /// The listener bean is not attached to the bean.
    #[error("listener bean {listener} not attached to {name}")]
    ListenerBeanNotFound {
        /// Target bean.
        name: ObjectName,
        /// Listener bean that was not found.
        listener: ObjectName,
    },

    /// No factory is known for this class name.
    #[error("class not found: {0}")]
    ClassNotFound(String),

    /// Payload could not be decoded.
    #[error("deserialization failed: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// Resolution of a pending name did not finish within the wait policy.
    #[error("timed out waiting for pending registration of {0}")]
    ResolutionTimedOut(ObjectName),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MalformedName(_) => 1001,
            Self::Deserialization(_) => 1002,
            Self::InstanceNotFound(_) => 2001,
            Self::InstanceAlreadyExists(_) => 2002,
            Self::ListenerNotFound { .. } => 2003,
            Self::ClassNotFound(_) => 2004,
            Self::ListenerBeanNotFound { .. } => 2005,
            Self::NotCompliant { .. } => 3001,
            Self::RegistrationFailed { .. } => 3002,
            Self::UnregistrationFailed { .. } => 3003,
            Self::ResolutionTimedOut(_) => 3004,
            Self::Bean { .. } => 4001,
            Self::Internal(_) => 5000,
        }
    }

    /// Returns `true` for the "instance not found" signal.
    #[must_use]
    pub const fn is_instance_not_found(&self) -> bool {
        matches!(self, Self::InstanceNotFound(_))
    }
}

impl From<ObjectNameError> for RegistryError {
    fn from(err: ObjectNameError) -> Self {
        Self::MalformedName(err.to_string())
    }
}

impl From<ActivationError> for RegistryError {
    /// Targeted translation: every resolution failure except a timeout or
    /// a collision looks like the name simply does not exist.
    fn from(err: ActivationError) -> Self {
        match err {
            ActivationError::AlreadyPending(name) => Self::InstanceAlreadyExists(name),
            ActivationError::WaitTimedOut { name, .. } => Self::ResolutionTimedOut(name),
            ActivationError::NotFound(name)
            | ActivationError::NotCompliant { name, .. }
            | ActivationError::RegistrationFailed { name, .. } => Self::InstanceNotFound(name),
        }
    }
}
