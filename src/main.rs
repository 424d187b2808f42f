//! deferred-registry demo entry point.
//!
//! Declares a batch of pending beans, then lets a pool of blocking workers
//! race to read them through the facade while a background task logs the
//! registration events.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use deferred_registry::bean::{
    AttributeBean, BeanInstance, BeanSource, ClosureSource, StandardBeanAdapter,
    StaticTypeHierarchy,
};
use deferred_registry::config::ActivatorConfig;
use deferred_registry::domain::{DeferredRegistry, EventBus, NotificationSink, ObjectName};
use deferred_registry::registry::{InMemoryRegistry, ObjectRegistry};
use deferred_registry::service::ForwardingFacade;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ActivatorConfig::from_env()?;
    tracing::info!(
        domain = %config.default_domain,
        beans = config.demo_bean_count,
        workers = config.demo_worker_threads,
        "starting deferred-registry demo"
    );

    // Build registry layer
    let underlying = Arc::new(InMemoryRegistry::new(config.default_domain.clone()));
    let event_bus = EventBus::new(config.event_bus_capacity);
    let deferred = Arc::new(
        DeferredRegistry::new(
            underlying,
            Arc::new(StandardBeanAdapter::new()),
            Arc::new(event_bus.clone()) as Arc<dyn NotificationSink>,
        )
        .with_wait_policy(config.wait_policy()),
    );
    let hierarchy = StaticTypeHierarchy::new()
        .with_supertype("demo.WorkerMBean", "demo.ResourceMBean");
    let facade = Arc::new(ForwardingFacade::new(deferred, Arc::new(hierarchy)));

    // Log registration events in the background
    let mut events = event_bus.subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::info!(name = %event.name(), event = event.event_type_str(), "registration event");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Declare pending beans
    let mut sources = Vec::with_capacity(config.demo_bean_count);
    let mut names = Vec::with_capacity(config.demo_bean_count);
    for index in 0..config.demo_bean_count {
        let name = ObjectName::parse(&format!("demo:type=Worker,index={index}"))?;
        let source = Arc::new(
            ClosureSource::new(["demo.WorkerMBean"], move || {
                Some(BeanInstance::Managed(Arc::new(
                    AttributeBean::new("demo.Worker")
                        .with_interface("demo.WorkerMBean")
                        .with_read_only_attribute("Index", json!(index))
                        .with_attribute("Load", json!(0)),
                )))
            })
            .with_module("demo"),
        );
        facade.declare(name.clone(), Arc::clone(&source) as Arc<dyn BeanSource>)?;
        sources.push(source);
        names.push(name);
    }
    tracing::info!(
        pending = facade.deferred().pending_count(),
        visible = facade.bean_count(),
        "beans declared"
    );

    // Race workers over every name
    let names = Arc::new(names);
    let mut workers = Vec::with_capacity(config.demo_worker_threads);
    for worker in 0..config.demo_worker_threads {
        let facade = Arc::clone(&facade);
        let names = Arc::clone(&names);
        workers.push(tokio::task::spawn_blocking(move || {
            let mut reads = 0_usize;
            for name in names.iter() {
                match facade.get_attribute(name, "Index") {
                    Ok(_) => reads += 1,
                    Err(err) => tracing::warn!(worker, %name, error = %err, "read failed"),
                }
            }
            reads
        }));
    }

    let mut total_reads = 0;
    for handle in workers {
        total_reads += handle.await?;
    }

    let activations: usize = sources.iter().map(|s| s.materializations()).sum();
    tracing::info!(
        total_reads,
        activations,
        pending = facade.deferred().pending_count(),
        registered = facade.bean_count(),
        "demo finished"
    );

    drop(facade);
    drop(event_bus);
    logger.await?;

    Ok(())
}
