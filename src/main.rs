mod app;
mod core;

use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::shutdown::build_shutdown_lifecycle;
use crate::app::lifecycle::startup::build_start_lifecycle;
use actix_web::rt::signal;
use mimalloc::MiMalloc;
use std::path::PathBuf;
use tracing::info;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const DEFAULT_CONFIG_PATH: &str = "fitads.yaml";

#[actix_web::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let cfg_path = std::env::var("FITADS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let startup = build_start_lifecycle(cfg_path);
    let ctx = StartupContext::default();

    match startup.run(&ctx).await {
        Ok(_) => info!("Startup successful"),
        Err(e) => panic!("Startup failed: {:?}", e),
    }

    signal::ctrl_c().await.expect("Failed to listen for sigint");

    match build_shutdown_lifecycle().run(&ctx).await {
        Ok(_) => info!("Shutdown successful"),
        Err(e) => panic!("Clean shutdown failed {:?}", e),
    }
}
