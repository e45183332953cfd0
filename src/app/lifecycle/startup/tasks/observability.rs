use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::task::LifecycleTask;
use crate::core::observability;
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use tracing::info;

pub struct ConfigureObservabilityTask;

#[async_trait]
impl LifecycleTask<StartupContext> for ConfigureObservabilityTask {
    fn name(&self) -> &'static str {
        "observability"
    }

    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context.config()?;

        let observability = observability::init(&config.logging)?;
        context
            .observability
            .set(observability)
            .map_err(|_| anyhow!("Observability context already initialized"))?;

        info!("Observability configured, level={}", config.logging.level);

        Ok(())
    }
}
