//! Bean layer: managed beans, lazy bean sources, adapters, and type checks.
//!
//! These are the collaborators the activation core consumes: a source that
//! materializes the real object on demand, an adapter that makes it
//! registrable, and a type hierarchy for answering instance-of questions
//! without materializing anything.

pub mod adapter;
pub mod bean_source;
pub mod managed_bean;
pub mod type_hierarchy;

pub use adapter::{BeanAdapter, NotCompliant, StandardBeanAdapter, WrapperFactory};
pub use bean_source::{BeanSource, ClosureSource, SourceLease};
pub use managed_bean::{AttributeBean, AttributeInfo, BeanInfo, BeanInstance, ManagedBean};
pub use type_hierarchy::{StaticTypeHierarchy, TypeHierarchy};
