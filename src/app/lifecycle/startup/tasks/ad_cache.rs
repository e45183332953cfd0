use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::task::LifecycleTask;
use crate::core::ads::{AdvertisementCache, HttpAdSource};
use crate::core::clock::SystemClock;
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Builds the process wide advertisement cache over the configured
/// source. The cache starts empty and fills on first demand
pub struct AdCacheStartTask;

#[async_trait]
impl LifecycleTask<StartupContext> for AdCacheStartTask {
    fn name(&self) -> &'static str {
        "ad_cache"
    }

    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context.config()?;

        let source = HttpAdSource::new(&config.source)?;
        let cache = AdvertisementCache::new(&config.cache, Arc::new(source), Arc::new(SystemClock));

        context
            .ad_cache
            .set(Arc::new(cache))
            .map_err(|_| anyhow!("Failed to set advertisement cache on startup context"))?;

        info!(
            "Started advertisement cache, source={} max_size={} ttl={}s max_usage={}",
            config.source.base_url,
            config.cache.max_size,
            config.cache.cache_duration.as_secs(),
            config.cache.max_usage_count
        );

        Ok(())
    }
}
