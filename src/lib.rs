//! # deferred-registry
//!
//! Delayed activation for managed beans.
//!
//! Beans are declared by name together with a [`bean::BeanSource`] that
//! knows how to produce them, but nothing is materialized until some
//! caller first touches the name through the [`service::ForwardingFacade`].
//! Exactly one thread performs each activation; every other thread that
//! races on the same name waits for that result.
//!
//! ## Architecture
//!
//! ```text
//! Callers (any thread)
//!     │
//!     ├── ForwardingFacade (service/)     implements ObjectRegistry
//!     │
//!     ├── DeferredRegistry (domain/)      pending map, CAS winner, waiters
//!     │     ├── RegistrationHolder        per-name phase + completion signal
//!     │     └── NotificationSink          EventBus (tokio broadcast)
//!     │
//!     ├── BeanSource / BeanAdapter (bean/)
//!     │
//!     └── InMemoryRegistry (registry/)    underlying ObjectRegistry
//! ```

pub mod bean;
pub mod config;
pub mod domain;
pub mod error;
pub mod registry;
pub mod service;
