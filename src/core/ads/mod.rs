mod cache;
mod coordinator;
mod selection;
mod source;
mod store;
mod validity;

pub use cache::{AdvertisementCache, CacheStats};
pub use source::{AdSource, FetchError, HttpAdSource};
