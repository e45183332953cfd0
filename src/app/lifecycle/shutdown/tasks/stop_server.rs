use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::task::LifecycleTask;
use anyhow::Error;
use async_trait::async_trait;
use tracing::info;

pub struct StopServerTask;

#[async_trait]
impl LifecycleTask<StartupContext> for StopServerTask {
    fn name(&self) -> &'static str {
        "stop_server"
    }

    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        match context.server.get() {
            Some(server) => {
                info!("Closing listener gracefully..");
                server.stop(true).await;
                info!("Listener closed");
            }
            None => {
                info!("Skipping listener shutdown, was never started");
            }
        }

        Ok(())
    }
}
