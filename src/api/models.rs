use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::shaper::{is_valid_username, normalize_country_code, normalize_hashtag, normalize_username};

fn default_count() -> u32 {
    10
}

fn default_days() -> u32 {
    7
}

fn default_country_code() -> String {
    "US".to_string()
}

fn positive(field: &str, value: u32) -> Result<usize> {
    if value == 0 {
        return Err(AppError::InvalidRequest(format!("{} must be a positive integer", field)));
    }
    Ok(value as usize)
}

#[derive(Debug, Deserialize)]
pub struct UserScrapeRequest {
    pub username: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

#[derive(Debug, Deserialize)]
pub struct UserProfileRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct HashtagTrendRequest {
    pub hashtag: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_days")]
    pub days: u32,
}

#[derive(Debug, Deserialize)]
pub struct CountryTrendRequest {
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_days")]
    pub days: u32,
}

/// A user scrape after validation: normalized username, count as a limit.
#[derive(Debug, PartialEq)]
pub struct UserQuery {
    pub username: String,
    pub count: usize,
}

/// A trending query after validation. `key` is the hashtag or country code.
#[derive(Debug, PartialEq)]
pub struct TrendQuery {
    pub key: String,
    pub count: usize,
    pub days: u32,
}

fn required_username(raw: &str) -> Result<String> {
    let username = normalize_username(raw);
    if username.is_empty() {
        return Err(AppError::InvalidRequest("username must not be empty".to_string()));
    }
    if !is_valid_username(&username) {
        return Err(AppError::InvalidRequest(
            "username may only contain letters, digits, '.' and '_'".to_string(),
        ));
    }
    Ok(username)
}

impl UserScrapeRequest {
    pub fn validate(&self) -> Result<UserQuery> {
        Ok(UserQuery {
            username: required_username(&self.username)?,
            count: positive("count", self.count)?,
        })
    }
}

impl UserProfileRequest {
    pub fn validate(&self) -> Result<String> {
        required_username(&self.username)
    }
}

impl HashtagTrendRequest {
    pub fn validate(&self) -> Result<TrendQuery> {
        let hashtag = normalize_hashtag(&self.hashtag);
        if hashtag.is_empty() {
            return Err(AppError::InvalidRequest("hashtag must not be empty".to_string()));
        }
        positive("days", self.days)?;
        Ok(TrendQuery {
            key: hashtag,
            count: positive("count", self.count)?,
            days: self.days,
        })
    }
}

impl CountryTrendRequest {
    pub fn validate(&self) -> Result<TrendQuery> {
        let country_code = normalize_country_code(&self.country_code);
        if country_code.is_empty() {
            return Err(AppError::InvalidRequest("country_code must not be empty".to_string()));
        }
        positive("days", self.days)?;
        Ok(TrendQuery {
            key: country_code,
            count: positive("count", self.count)?,
            days: self.days,
        })
    }
}

#[derive(Serialize)]
pub struct WelcomeResponse {
    pub message: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoStats {
    pub likes: u64,
    pub shares: u64,
    pub comments: u64,
    pub plays: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoSummary {
    pub id: String,
    pub description: String,
    pub stats: VideoStats,
    pub video_url: String,
    pub author: String,
    pub author_nickname: String,
    pub hashtags: Vec<String>,
    pub create_time: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    pub days: u32,
    pub videos: Vec<VideoSummary>,
}
