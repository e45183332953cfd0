use crate::core::ads::AdvertisementCache;
use crate::core::models::advertisement::Envelope;
use crate::sample_or_attach_root_span;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use tracing::{Instrument, Span, debug};

/// Request handling settings shared with every worker
pub struct ServeSettings {
    pub span_sample_rate: f32,
    /// Upper bound on `count` for multi advertisement requests
    pub max_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    pub count: Option<usize>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/hi", web::get().to(|| async { "hi!" }))
        .service(
            web::scope("/ads")
                .route("", web::get().to(multiple_ads))
                .route("/random", web::get().to(random_ad))
                .route("/refresh", web::post().to(refresh_ads))
                .route("/stats", web::get().to(cache_stats)),
        );
}

async fn random_ad(
    cache: web::Data<AdvertisementCache>,
    settings: web::Data<ServeSettings>,
) -> HttpResponse {
    let span = sample_or_attach_root_span!(
        settings.span_sample_rate,
        "ads_random",
        ad_id = tracing::field::Empty,
    );

    async move {
        match cache.random_advertisement().await {
            Some(ad) => {
                Span::current().record("ad_id", ad.id());
                HttpResponse::Ok().json(Envelope::ok(ad))
            }
            None => {
                debug!("No advertisement available");
                HttpResponse::NoContent().finish()
            }
        }
    }
    .instrument(span)
    .await
}

async fn multiple_ads(
    cache: web::Data<AdvertisementCache>,
    settings: web::Data<ServeSettings>,
    query: web::Query<CountQuery>,
) -> HttpResponse {
    let count = query.count.unwrap_or(1).min(settings.max_count);

    let span = sample_or_attach_root_span!(
        settings.span_sample_rate,
        "ads_multiple",
        requested = count,
        served = tracing::field::Empty,
    );

    async move {
        let ads = cache.multiple_advertisements(count).await;
        Span::current().record("served", ads.len());

        HttpResponse::Ok().json(Envelope::ok(ads))
    }
    .instrument(span)
    .await
}

async fn refresh_ads(cache: web::Data<AdvertisementCache>) -> HttpResponse {
    let span = tracing::info_span!("ads_refresh", fetched = tracing::field::Empty);

    async move {
        let ads = cache.force_refresh().await;
        Span::current().record("fetched", ads.len());

        HttpResponse::Ok().json(Envelope::ok(ads))
    }
    .instrument(span)
    .await
}

async fn cache_stats(cache: web::Data<AdvertisementCache>) -> HttpResponse {
    HttpResponse::Ok().json(cache.stats())
}
