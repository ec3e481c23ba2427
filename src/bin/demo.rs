use async_trait::async_trait;
use cronkeeper::config::SchedulerConfig;
use cronkeeper::model::{ExecutionSpec, HandlerDeclaration};
use cronkeeper::recovery::recover;
use cronkeeper::registration::register;
use cronkeeper::registry::{Handler, HandlerRegistry};
use cronkeeper::scheduler::Scheduler;
use cronkeeper::store::memory::InMemoryTaskStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct HeartbeatHandler;

#[async_trait]
impl Handler for HeartbeatHandler {
    async fn call(&self) -> Result<(), String> {
        tracing::info!("heartbeat");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let store: Arc<dyn cronkeeper::store::TaskStore> = Arc::new(InMemoryTaskStore::new());
    let registry = Arc::new(HandlerRegistry::new());
    registry.register("demo.Heartbeat", None, Arc::new(HeartbeatHandler));

    let declarations = vec![(
        HandlerDeclaration::new(None, "demo.Heartbeat", "call"),
        vec![ExecutionSpec::new("* * * * *").with_desc("prints a heartbeat every minute")],
    )];
    register(store.as_ref(), declarations).await?;

    let scheduler = Scheduler::with_system_clock(store, registry, SchedulerConfig::builder().build());
    recover(&scheduler).await?;

    tracing::info!("cronkeeper demo running, press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    scheduler.shutdown().await;
    Ok(())
}
