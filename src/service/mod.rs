//! Service layer: the forwarding facade that callers use as a registry.
//!
//! The facade coordinates between the deferred activation core and the
//! underlying registry.

pub mod forwarding_facade;

pub use forwarding_facade::ForwardingFacade;
