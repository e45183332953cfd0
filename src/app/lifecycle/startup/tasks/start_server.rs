use crate::app::handlers::{self, ServeSettings};
use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::task::LifecycleTask;
use actix_web::middleware::Compress;
use actix_web::{App, HttpServer, web};
use anyhow::{Context, Error, anyhow};
use async_trait::async_trait;
use tracing::info;

pub struct StartServerTask;

#[async_trait]
impl LifecycleTask<StartupContext> for StartServerTask {
    fn name(&self) -> &'static str {
        "start_server"
    }

    async fn run(&self, ctx: &StartupContext) -> Result<(), Error> {
        let config = ctx.config()?;

        let cache = web::Data::from(
            ctx.ad_cache
                .get()
                .ok_or_else(|| anyhow!("Advertisement cache not built before server start"))?
                .clone(),
        );

        let settings = web::Data::new(ServeSettings {
            span_sample_rate: config.logging.span_sample_rate,
            max_count: config.cache.max_size,
        });

        let mut server = HttpServer::new(move || {
            App::new()
                .wrap(Compress::default())
                .app_data(cache.clone())
                .app_data(settings.clone())
                .configure(handlers::configure)
        })
        .disable_signals();

        if config.server.workers > 0 {
            server = server.workers(config.server.workers);
        }

        let server = server
            .bind((config.server.bind.as_str(), config.server.port))
            .with_context(|| {
                format!(
                    "failed binding {}:{}",
                    config.server.bind, config.server.port
                )
            })?
            .run();

        ctx.server
            .set(server.handle())
            .map_err(|_| anyhow!("Could not set server"))?;

        actix_web::rt::spawn(server);

        info!(
            "Started http server on {}:{}, ready for requests",
            config.server.bind, config.server.port
        );

        Ok(())
    }
}
