use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::startup::tasks::ad_cache::AdCacheStartTask;
use crate::app::lifecycle::startup::tasks::config_load::ConfigLoadTask;
use crate::app::lifecycle::startup::tasks::observability::ConfigureObservabilityTask;
use crate::app::lifecycle::startup::tasks::start_server::StartServerTask;
use crate::app::lifecycle::task::Lifecycle;
use crate::core::config_manager::ConfigManager;
use std::path::PathBuf;
use tracing::info_span;

/// Builds the ordered startup tasks. Config must load first since
/// every later task reads it from the context
pub fn build_start_lifecycle(cfg_path: PathBuf) -> Lifecycle<StartupContext> {
    let cfg_manager = ConfigManager::new(cfg_path);

    Lifecycle::new(|| info_span!("startup"))
        .with(Box::new(ConfigLoadTask::new(cfg_manager)))
        .with(Box::new(ConfigureObservabilityTask))
        .with(Box::new(AdCacheStartTask))
        .with(Box::new(StartServerTask))
}
