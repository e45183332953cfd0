use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::task::LifecycleTask;
use crate::core::config_manager::ConfigManager;
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use std::sync::Arc;

pub struct ConfigLoadTask {
    manager: Arc<ConfigManager>,
}

impl ConfigLoadTask {
    pub fn new(manager: ConfigManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}

#[async_trait]
impl LifecycleTask<StartupContext> for ConfigLoadTask {
    fn name(&self) -> &'static str {
        "config_load"
    }

    async fn run(&self, ctx: &StartupContext) -> Result<(), Error> {
        let cfg = self.manager.reload()?;

        // logging is not configured yet at this point
        println!("Config loaded from {}", self.manager.path().display());
        println!("{:?}", cfg);

        ctx.config_manager
            .set(self.manager.clone())
            .map_err(|_| anyhow!("Config manager already set on startup context"))
    }
}
