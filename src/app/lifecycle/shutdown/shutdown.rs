use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::shutdown::tasks::observability::ObservabilityShutdownTask;
use crate::app::lifecycle::shutdown::tasks::stop_server::StopServerTask;
use crate::app::lifecycle::task::Lifecycle;
use tracing::info_span;

/// Builds the shutdown tasks run against the context the startup
/// lifecycle filled in. Observability goes last so the server
/// shutdown is still logged and exported
pub fn build_shutdown_lifecycle() -> Lifecycle<StartupContext> {
    Lifecycle::new(|| info_span!("shutdown"))
        .with(Box::new(StopServerTask))
        .with(Box::new(ObservabilityShutdownTask))
}
