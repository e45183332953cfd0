use crate::app::config::FitadsConfig;
use crate::core::ads::AdvertisementCache;
use crate::core::config_manager::ConfigManager;
use crate::core::observability::Observability;
use actix_web::dev::ServerHandle;
use std::sync::{Arc, OnceLock};

/// Shared state assembled by the startup lifecycle and
/// handed back to the shutdown lifecycle
#[derive(Default)]
pub struct StartupContext {
    /// Owner of the config loaded from disk
    pub config_manager: OnceLock<Arc<ConfigManager>>,
    /// Present once logging and otel exporters are up
    pub observability: OnceLock<Observability>,
    /// The process wide advertisement cache
    pub ad_cache: OnceLock<Arc<AdvertisementCache>>,
    /// The running http server
    pub server: OnceLock<ServerHandle>,
}

impl StartupContext {
    /// Current validated config, read through the config manager
    pub fn config(&self) -> Result<Arc<FitadsConfig>, anyhow::Error> {
        self.config_manager
            .get()
            .ok_or_else(|| anyhow::anyhow!("Config manager not set on startup context"))?
            .get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_requires_manager() {
        let ctx = StartupContext::default();
        assert!(ctx.config().is_err());

        let manager = Arc::new(ConfigManager::new("fitads.yaml".into()));
        assert!(ctx.config_manager.set(manager).is_ok());

        // manager present but nothing loaded yet
        assert!(ctx.config().is_err());
    }
}
