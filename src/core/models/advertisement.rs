use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// An advertisement as published by the upstream source. Display
/// fields are opaque to the cache and passed through untouched
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into))]
pub struct Advertisement {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    #[builder(default)]
    pub title: String,
    #[serde(default)]
    #[builder(default)]
    pub link: String,
    #[serde(default)]
    #[builder(default)]
    pub description: String,
    /// Image url or reference as stored by the advertiser
    #[serde(default)]
    #[builder(default)]
    pub image: String,
    #[serde(default)]
    #[builder(default)]
    pub advertiser_name: String,
    #[serde(default)]
    #[builder(default)]
    pub contact_email: String,
    /// Business expiry set by the advertiser, never served at or past it
    pub valid_until: DateTime<Utc>,
    /// Per view tracking id assigned by the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub view_id: Option<String>,
}

/// `{ success, data }` wrapper used by the advertisement source
/// routes, and mirrored by the routes this service exposes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope {
            success: true,
            data: Some(data),
        }
    }
}

/// An advertisement held by the cache along with its bookkeeping
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedAdvertisement {
    #[serde(flatten)]
    pub ad: Advertisement,
    pub fetched_at: DateTime<Utc>,
    pub usage_count: u32,
}

impl CachedAdvertisement {
    /// Wraps a freshly fetched advertisement, usage starts at zero
    pub fn new(ad: Advertisement, fetched_at: DateTime<Utc>) -> Self {
        CachedAdvertisement {
            ad,
            fetched_at,
            usage_count: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.ad.id
    }

    pub fn valid_until(&self) -> DateTime<Utc> {
        self.ad.valid_until
    }
}
