use crate::app::config::SourceConfig;
use crate::core::models::advertisement::{Advertisement, Envelope};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, redirect};
use serde::de::DeserializeOwned;
use std::time::Duration;
use strum::AsRefStr;
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

const BULK_ROUTE: &str = "getMultipleAdvertisements";
const SINGLE_ROUTE: &str = "getRandomAdvertisement";

/// Why a fetch from the advertisement source produced nothing
#[derive(Debug, Error, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("source answered with http {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("source reported success=false")]
    Rejected,
}

/// Upstream provider of advertisements
#[async_trait]
pub trait AdSource: Send + Sync {
    /// Fetch a batch of advertisements, sized by the source
    async fn fetch_bulk(&self) -> Result<Vec<Advertisement>, FetchError>;

    /// Fetch a single advertisement
    async fn fetch_single(&self) -> Result<Advertisement, FetchError>;
}

/// [`AdSource`] over the FitVerse advertisement http routes
pub struct HttpAdSource {
    client: Client,
    bulk_url: Url,
    single_url: Url,
}

impl HttpAdSource {
    pub fn new(config: &SourceConfig) -> Result<Self, anyhow::Error> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .redirect(redirect::Policy::limited(3))
            .gzip(true)
            .deflate(true)
            .hickory_dns(true)
            .build()
            .context("failed building advertisement source http client")?;

        let (bulk_url, single_url) = endpoints(config)?;

        Ok(HttpAdSource {
            client,
            bulk_url,
            single_url,
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        debug!("Fetching advertisements from {}", url);

        let res = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if tracing::event_enabled!(tracing::Level::TRACE) {
            trace!("{}", String::from_utf8_lossy(&bytes));
        }

        decode_envelope(&bytes)
    }
}

/// Builds the bulk and single route urls off the configured base
fn endpoints(config: &SourceConfig) -> Result<(Url, Url), anyhow::Error> {
    // join() drops the last path segment unless the base ends in a slash
    let mut base = config.base_url.clone();
    if !base.ends_with('/') {
        base.push('/');
    }
    let base = Url::parse(&base).with_context(|| format!("invalid source url {base}"))?;

    let mut bulk_url = base.join(BULK_ROUTE)?;
    bulk_url
        .query_pairs_mut()
        .append_pair("limit", &config.bulk_limit.to_string());

    Ok((bulk_url, base.join(SINGLE_ROUTE)?))
}

/// Unwraps a `{ success, data }` envelope
fn decode_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FetchError> {
    let envelope: Envelope<T> =
        serde_json::from_slice(bytes).map_err(|e| FetchError::Malformed(e.to_string()))?;

    if !envelope.success {
        return Err(FetchError::Rejected);
    }

    envelope
        .data
        .ok_or_else(|| FetchError::Malformed("missing data".into()))
}

#[async_trait]
impl AdSource for HttpAdSource {
    async fn fetch_bulk(&self) -> Result<Vec<Advertisement>, FetchError> {
        self.get(&self.bulk_url).await
    }

    async fn fetch_single(&self) -> Result<Advertisement, FetchError> {
        self.get(&self.single_url).await
    }
}
