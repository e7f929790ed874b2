use axum::{
    routing::{get, post},
    Router,
    extract::{Json, State, rejection::JsonRejection},
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use chrono::Utc;
use tracing::{info, warn};

use crate::error::{Result, AppError};
use crate::api::models::{
    CountryTrendRequest, HashtagTrendRequest, TrendingResponse, UserProfileRequest,
    UserScrapeRequest, VideoSummary, WelcomeResponse,
};
use crate::provider::{ProviderError, RawVideo, UserProfile};
use crate::shaper::{retain_recent, summarize};
use crate::AppState;

pub const WELCOME_MESSAGE: &str = "Welcome to TikTok Scraper API";

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/scrape/user", post(scrape_user_handler))
        .route("/scrape/user/info", post(user_info_handler))
        .route("/trending/hashtag", post(hashtag_trends_handler))
        .route("/trending/country", post(country_trends_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root_handler() -> Json<WelcomeResponse> {
    Json(WelcomeResponse { message: WELCOME_MESSAGE })
}

async fn scrape_user_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UserScrapeRequest>, JsonRejection>,
) -> Result<Json<Vec<VideoSummary>>> {
    let Json(req) = payload?;
    let query = req.validate()?;
    info!(username = %query.username, count = query.count, "Scraping user videos");

    let raw = upstream(state.provider.user_videos(&query.username, query.count).await)?;
    Ok(Json(shape(raw, query.count)))
}

async fn user_info_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UserProfileRequest>, JsonRejection>,
) -> Result<Json<UserProfile>> {
    let Json(req) = payload?;
    let username = req.validate()?;
    info!(username = %username, "Fetching user profile");

    let profile = upstream(state.provider.user_profile(&username).await)?;
    Ok(Json(profile))
}

async fn hashtag_trends_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<HashtagTrendRequest>, JsonRejection>,
) -> Result<Json<TrendingResponse>> {
    let Json(req) = payload?;
    let query = req.validate()?;
    info!(hashtag = %query.key, count = query.count, days = query.days, "Fetching hashtag trends");

    let raw = upstream(state.provider.hashtag_videos(&query.key, query.count).await)?;
    let videos = retain_recent(shape(raw, query.count), query.days, Utc::now());

    Ok(Json(TrendingResponse {
        hashtag: Some(query.key),
        country_code: None,
        days: query.days,
        videos,
    }))
}

async fn country_trends_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CountryTrendRequest>, JsonRejection>,
) -> Result<Json<TrendingResponse>> {
    let Json(req) = payload?;
    let query = req.validate()?;
    info!(country_code = %query.key, count = query.count, days = query.days, "Fetching country trends");

    let raw = upstream(state.provider.trending_videos(&query.key, query.count).await)?;
    let videos = retain_recent(shape(raw, query.count), query.days, Utc::now());

    Ok(Json(TrendingResponse {
        hashtag: None,
        country_code: Some(query.key),
        days: query.days,
        videos,
    }))
}

/// Converts a provider failure into an HTTP error, logging it on the way out.
fn upstream<T>(result: std::result::Result<T, ProviderError>) -> Result<T> {
    result.map_err(|err| {
        warn!(error = %err, "Provider call failed");
        AppError::from(err)
    })
}

fn shape(raw: Vec<RawVideo>, count: usize) -> Vec<VideoSummary> {
    raw.into_iter().take(count).map(summarize).collect()
}
