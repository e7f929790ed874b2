use async_trait::async_trait;
use serde::Serialize;

/// Failures reported by a scraping provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("rate limited by upstream")]
    RateLimited,

    #[error("request blocked by upstream: {0}")]
    Blocked(String),

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected upstream response: {0}")]
    InvalidResponse(String),

    #[error("upstream returned status {code}: {message}")]
    Upstream { code: i64, message: String },
}

/// A video record as handed back by a provider. Every field may be absent;
/// shaping decides the defaults.
#[derive(Debug, Clone, Default)]
pub struct RawVideo {
    pub id: Option<String>,
    pub description: Option<String>,
    pub create_time: Option<i64>,
    pub author: Option<RawAuthor>,
    pub stats: Option<RawStats>,
    pub video_url: Option<String>,
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawAuthor {
    pub username: Option<String>,
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawStats {
    pub likes: Option<u64>,
    pub shares: Option<u64>,
    pub comments: Option<u64>,
    pub plays: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub nickname: String,
    #[serde(skip)]
    pub sec_uid: String,
    pub follower_count: u64,
    pub following_count: u64,
    pub likes_count: u64,
    pub video_count: u64,
}

/// The scraping capability the router forwards to.
///
/// Each call is one logical operation; implementations may issue several
/// sequential upstream requests (pagination) but must return at most
/// `count` videos.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    async fn user_profile(&self, username: &str) -> Result<UserProfile, ProviderError>;

    async fn user_videos(&self, username: &str, count: usize)
    -> Result<Vec<RawVideo>, ProviderError>;

    async fn hashtag_videos(
        &self,
        hashtag: &str,
        count: usize,
    ) -> Result<Vec<RawVideo>, ProviderError>;

    async fn trending_videos(
        &self,
        country_code: &str,
        count: usize,
    ) -> Result<Vec<RawVideo>, ProviderError>;
}
