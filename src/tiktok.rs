//! TikTok web provider.
//!
//! Talks to the endpoints the tiktok.com web app uses. User lookups go
//! through the profile page's hydration script; video listings go through
//! the JSON item-list endpoints and are paged by cursor.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode, cookie::Jar};
use scraper::{Html, Selector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::TikTokConfig;
use crate::shaper::is_valid_username;
use crate::provider::{
    ProviderError, RawAuthor, RawStats, RawVideo, UserProfile, VideoProvider,
};

const PAGE_SIZE: usize = 30;
const MAX_PAGES: usize = 50;

// webapp.user-detail status codes for unknown, banned or private-and-gone accounts
const USER_MISSING_CODES: [i64; 3] = [10202, 10221, 10222];

static HYDRATION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("script#__UNIVERSAL_DATA_FOR_REHYDRATION__")
        .expect("Failed to parse hydration selector")
});

struct Session {
    client: Client,
}

pub struct TikTokProvider {
    config: TikTokConfig,
    session: OnceCell<Session>,
}

impl TikTokProvider {
    pub fn new(config: TikTokConfig) -> Self {
        Self {
            config,
            session: OnceCell::new(),
        }
    }

    /// Returns the shared session, creating it on first use. A failed
    /// initialization leaves the cell empty so the next call retries.
    async fn session(&self) -> Result<&Session, ProviderError> {
        self.session.get_or_try_init(|| self.open_session()).await
    }

    async fn open_session(&self) -> Result<Session, ProviderError> {
        let jar = Arc::new(Jar::default());
        if let Some(token) = &self.config.ms_token {
            if let Ok(url) = self.config.base_url.parse::<reqwest::Url>() {
                jar.add_cookie_str(&format!("msToken={}; Path=/", token), &url);
            }
        }

        let client = Client::builder()
            .cookie_provider(jar)
            .user_agent(self.config.user_agent.as_str())
            .timeout(self.config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        // Anonymous visitor cookies (ttwid and friends) come from the landing page.
        let warm_up = client.get(&self.config.base_url).send().await?;
        info!(status = %warm_up.status(), "TikTok session initialized");

        Ok(Session { client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn base_params(&self, region: &str) -> Vec<(&'static str, String)> {
        let mut params: Vec<(&'static str, String)> = [
            ("aid", "1988"),
            ("app_language", "en"),
            ("app_name", "tiktok_web"),
            ("browser_language", "en-US"),
            ("browser_name", "Mozilla"),
            ("browser_online", "true"),
            ("browser_platform", "Win32"),
            ("channel", "tiktok_web"),
            ("cookie_enabled", "true"),
            ("device_platform", "web_pc"),
            ("os", "windows"),
            ("screen_height", "1080"),
            ("screen_width", "1920"),
            ("tz_name", "UTC"),
        ]
        .iter()
        .map(|(k, v)| (*k, v.to_string()))
        .collect();
        params.push(("region", region.to_string()));
        if let Some(token) = &self.config.ms_token {
            params.push(("msToken", token.clone()));
        }
        params
    }

    async fn fetch_text(
        &self,
        session: &Session,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<String, ProviderError> {
        let response = session.client.get(self.url(path)).query(params).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::Upstream {
                code: i64::from(status.as_u16()),
                message: status.canonical_reason().unwrap_or("unexpected status").to_string(),
            });
        }
        Ok(response.text().await?)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, ProviderError> {
        let body = self.fetch_text(session, path, params).await?;
        decode_json(&body)
    }

    /// Pages through an item-list endpoint until `count` videos are collected
    /// or the upstream runs dry.
    async fn collect_items(
        &self,
        path: &str,
        params: Vec<(&'static str, String)>,
        count: usize,
    ) -> Result<Vec<RawVideo>, ProviderError> {
        let session = self.session().await?;
        let mut videos: Vec<RawVideo> = Vec::with_capacity(count.min(PAGE_SIZE * 4));
        let mut cursor: i64 = 0;

        for page_number in 0..MAX_PAGES {
            if videos.len() >= count {
                break;
            }

            let mut query = params.clone();
            query.push(("count", (count - videos.len()).min(PAGE_SIZE).to_string()));
            query.push(("cursor", cursor.to_string()));

            let page: ItemListPage = self.fetch_json(session, path, &query).await?;
            check_status(page.status_code, page.status_msg.as_deref())?;

            let items = page.item_list.unwrap_or_default();
            let fetched = items.len();
            debug!(path, page = page_number, fetched, cursor, "fetched item page");
            videos.extend(items.into_iter().map(RawVideo::from));

            if fetched == 0 || !page.has_more {
                break;
            }
            cursor = page.cursor.unwrap_or(cursor.saturating_add(fetched as i64));
        }

        videos.truncate(count);
        Ok(videos)
    }
}

#[async_trait]
impl VideoProvider for TikTokProvider {
    async fn user_profile(&self, username: &str) -> Result<UserProfile, ProviderError> {
        // Anything outside the handle charset could rewrite the request path.
        if !is_valid_username(username) {
            return Err(ProviderError::NotFound(format!("user @{}", username)));
        }
        let session = self.session().await?;
        let html = self.fetch_text(session, &format!("/@{}", username), &[]).await?;
        parse_user_page(&html, username)
    }

    async fn user_videos(&self, username: &str, count: usize) -> Result<Vec<RawVideo>, ProviderError> {
        let profile = self.user_profile(username).await?;
        let mut params = self.base_params("US");
        params.push(("secUid", profile.sec_uid));
        params.push(("coverFormat", "2".to_string()));
        self.collect_items("/api/post/item_list/", params, count).await
    }

    async fn hashtag_videos(&self, hashtag: &str, count: usize) -> Result<Vec<RawVideo>, ProviderError> {
        let session = self.session().await?;
        let mut params = self.base_params("US");
        params.push(("challengeName", hashtag.to_string()));
        let detail: ChallengeDetail = self.fetch_json(session, "/api/challenge/detail/", &params).await?;
        let challenge_id = challenge_id(detail, hashtag)?;

        let mut params = self.base_params("US");
        params.push(("challengeID", challenge_id));
        self.collect_items("/api/challenge/item_list/", params, count).await
    }

    async fn trending_videos(&self, country_code: &str, count: usize) -> Result<Vec<RawVideo>, ProviderError> {
        let mut params = self.base_params(country_code);
        params.push(("from_page", "fyp".to_string()));
        self.collect_items("/api/recommend/item_list/", params, count).await
    }
}

fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    let trimmed = body.trim();
    // An empty body or an HTML page in place of JSON is how the web API refuses unsigned traffic.
    if trimmed.is_empty() || trimmed.starts_with('<') {
        return Err(ProviderError::Blocked(
            "expected JSON but received an empty or HTML body".to_string(),
        ));
    }
    serde_json::from_str(trimmed).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

fn check_status(code: Option<i64>, message: Option<&str>) -> Result<(), ProviderError> {
    match code {
        None | Some(0) => Ok(()),
        Some(code) => Err(ProviderError::Upstream {
            code,
            message: message.filter(|m| !m.is_empty()).unwrap_or("unknown error").to_string(),
        }),
    }
}

fn challenge_id(detail: ChallengeDetail, hashtag: &str) -> Result<String, ProviderError> {
    check_status(detail.status_code, detail.status_msg.as_deref())?;
    detail
        .challenge_info
        .and_then(|info| info.challenge)
        .and_then(|challenge| challenge.id)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::NotFound(format!("hashtag #{}", hashtag)))
}

/// Reads the user detail out of a profile page's hydration script.
fn parse_user_page(html: &str, username: &str) -> Result<UserProfile, ProviderError> {
    let document = Html::parse_document(html);
    let script = document
        .select(&HYDRATION_SELECTOR)
        .next()
        .map(|element| element.text().collect::<String>())
        .ok_or_else(|| {
            ProviderError::Blocked("profile page did not contain hydration data".to_string())
        })?;

    let hydration: Hydration = serde_json::from_str(&script)
        .map_err(|e| ProviderError::InvalidResponse(format!("hydration data: {}", e)))?;
    let detail = hydration
        .default_scope
        .user_detail
        .ok_or_else(|| ProviderError::InvalidResponse("missing webapp.user-detail".to_string()))?;

    if let Some(code) = detail.status_code {
        if USER_MISSING_CODES.contains(&code) {
            return Err(ProviderError::NotFound(format!("user @{}", username)));
        }
    }
    check_status(detail.status_code, detail.status_msg.as_deref())?;

    let info = detail.user_info.unwrap_or_default();
    let user = info
        .user
        .ok_or_else(|| ProviderError::NotFound(format!("user @{}", username)))?;
    let sec_uid = user
        .sec_uid
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse("user detail without secUid".to_string()))?;
    let stats = info.stats.unwrap_or_default();

    Ok(UserProfile {
        username: user.unique_id.unwrap_or_else(|| username.to_string()),
        nickname: user.nickname.unwrap_or_default(),
        sec_uid,
        follower_count: stats.follower_count.unwrap_or(0),
        following_count: stats.following_count.unwrap_or(0),
        likes_count: stats.heart_count.unwrap_or(0),
        video_count: stats.video_count.unwrap_or(0),
    })
}

// Wire types. TikTok is inconsistent about numbers vs numeric strings, so
// scalar fields go through the lenient helpers below.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ItemListPage {
    #[serde(deserialize_with = "lenient_i64")]
    status_code: Option<i64>,
    status_msg: Option<String>,
    item_list: Option<Vec<WireItem>>,
    #[serde(deserialize_with = "lenient_bool")]
    has_more: bool,
    #[serde(deserialize_with = "lenient_i64")]
    cursor: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireItem {
    #[serde(deserialize_with = "lenient_string")]
    id: Option<String>,
    desc: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    create_time: Option<i64>,
    author: Option<WireAuthor>,
    stats: Option<WireStats>,
    video: Option<WireVideo>,
    challenges: Option<Vec<WireChallenge>>,
    text_extra: Option<Vec<WireTextExtra>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireAuthor {
    unique_id: Option<String>,
    nickname: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireStats {
    #[serde(deserialize_with = "lenient_u64")]
    digg_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    share_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    comment_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    play_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireVideo {
    download_addr: Option<String>,
    play_addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireChallenge {
    #[serde(deserialize_with = "lenient_string")]
    id: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireTextExtra {
    hashtag_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ChallengeDetail {
    #[serde(deserialize_with = "lenient_i64")]
    status_code: Option<i64>,
    status_msg: Option<String>,
    challenge_info: Option<ChallengeInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChallengeInfo {
    challenge: Option<WireChallenge>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Hydration {
    #[serde(rename = "__DEFAULT_SCOPE__")]
    default_scope: DefaultScope,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DefaultScope {
    #[serde(rename = "webapp.user-detail")]
    user_detail: Option<UserDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserDetail {
    #[serde(deserialize_with = "lenient_i64")]
    status_code: Option<i64>,
    status_msg: Option<String>,
    user_info: Option<WireUserInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireUserInfo {
    user: Option<WireUser>,
    stats: Option<WireUserStats>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireUser {
    unique_id: Option<String>,
    nickname: Option<String>,
    sec_uid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireUserStats {
    #[serde(deserialize_with = "lenient_u64")]
    follower_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    following_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    heart_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    video_count: Option<u64>,
}

impl From<WireItem> for RawVideo {
    fn from(item: WireItem) -> Self {
        let mut hashtags: Vec<String> = item
            .challenges
            .unwrap_or_default()
            .into_iter()
            .filter_map(|challenge| challenge.title)
            .collect();
        if hashtags.is_empty() {
            hashtags = item
                .text_extra
                .unwrap_or_default()
                .into_iter()
                .filter_map(|extra| extra.hashtag_name)
                .filter(|name| !name.is_empty())
                .collect();
        }

        let video_url = item.video.and_then(|video| {
            video
                .download_addr
                .filter(|addr| !addr.is_empty())
                .or(video.play_addr)
        });

        RawVideo {
            id: item.id,
            description: item.desc,
            create_time: item.create_time,
            author: item.author.map(|author| RawAuthor {
                username: author.unique_id,
                nickname: author.nickname,
            }),
            stats: item.stats.map(|stats| RawStats {
                likes: stats.digg_count,
                shares: stats.share_count,
                comments: stats.comment_count,
                plays: stats.play_count,
            }),
            video_url,
            hashtags,
        }
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "1"),
        _ => false,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
