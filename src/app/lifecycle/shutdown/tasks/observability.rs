use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::task::LifecycleTask;
use crate::core::observability;
use anyhow::Error;
use async_trait::async_trait;
use tracing::info;

pub struct ObservabilityShutdownTask;

#[async_trait]
impl LifecycleTask<StartupContext> for ObservabilityShutdownTask {
    fn name(&self) -> &'static str {
        "observability_shutdown"
    }

    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        if let Some(provider) = context.observability.get() {
            info!("Shutting down observability");
            observability::shutdown(provider)?;
        }

        Ok(())
    }
}
