use chrono::{DateTime, Duration, Utc};

use crate::api::models::{VideoStats, VideoSummary};
use crate::provider::RawVideo;

/// Maps a loosely populated provider record into the fixed output shape.
/// Absent text becomes empty, absent counters zero, absent time the epoch.
pub fn summarize(raw: RawVideo) -> VideoSummary {
    let stats = raw.stats.unwrap_or_default();
    let author = raw.author.unwrap_or_default();
    let create_time = raw.create_time.unwrap_or(0);

    VideoSummary {
        id: raw.id.unwrap_or_default(),
        description: raw.description.unwrap_or_default(),
        stats: VideoStats {
            likes: stats.likes.unwrap_or(0),
            shares: stats.shares.unwrap_or(0),
            comments: stats.comments.unwrap_or(0),
            plays: stats.plays.unwrap_or(0),
        },
        video_url: raw.video_url.unwrap_or_default(),
        author: author.username.unwrap_or_default(),
        author_nickname: author.nickname.unwrap_or_default(),
        hashtags: raw
            .hashtags
            .iter()
            .map(|tag| normalize_hashtag(tag))
            .filter(|tag| !tag.is_empty())
            .collect(),
        create_time,
        created_at: DateTime::from_timestamp(create_time, 0).unwrap_or_default(),
    }
}

/// Keeps videos created within the last `days` days relative to `now`,
/// preserving order.
pub fn retain_recent(videos: Vec<VideoSummary>, days: u32, now: DateTime<Utc>) -> Vec<VideoSummary> {
    // Windows reaching past chrono's range keep everything.
    let threshold = Duration::try_days(i64::from(days))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .timestamp();
    videos
        .into_iter()
        .filter(|video| video.create_time >= threshold)
        .collect()
}

pub fn normalize_hashtag(raw: &str) -> String {
    raw.trim().trim_matches('#').trim().to_string()
}

/// TikTok handles are limited to letters, digits, `.` and `_`.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

pub fn normalize_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').trim().to_string()
}

pub fn normalize_country_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{RawAuthor, RawStats};

    fn video_at(id: &str, create_time: i64) -> VideoSummary {
        summarize(RawVideo {
            id: Some(id.to_string()),
            create_time: Some(create_time),
            ..Default::default()
        })
    }

    #[test]
    fn missing_fields_get_defaults() {
        let summary = summarize(RawVideo::default());
        assert_eq!(summary.id, "");
        assert_eq!(summary.description, "");
        assert_eq!(summary.stats, VideoStats::default());
        assert!(summary.hashtags.is_empty());
        assert_eq!(summary.create_time, 0);
        assert_eq!(summary.created_at.timestamp(), 0);
    }

    #[test]
    fn populated_record_maps_every_field() {
        let summary = summarize(RawVideo {
            id: Some("7301".to_string()),
            description: Some("hello #dance".to_string()),
            create_time: Some(1_700_000_000),
            author: Some(RawAuthor {
                username: Some("alice".to_string()),
                nickname: Some("Alice".to_string()),
            }),
            stats: Some(RawStats {
                likes: Some(10),
                shares: Some(2),
                comments: None,
                plays: Some(400),
            }),
            video_url: Some("https://v.example/7301.mp4".to_string()),
            hashtags: vec!["dance".to_string(), "#fyp".to_string(), "".to_string()],
        });

        assert_eq!(summary.author, "alice");
        assert_eq!(summary.author_nickname, "Alice");
        assert_eq!(summary.stats, VideoStats { likes: 10, shares: 2, comments: 0, plays: 400 });
        assert_eq!(summary.hashtags, vec!["dance", "fyp"]);
        assert_eq!(summary.created_at.to_rfc3339(), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn window_drops_old_videos_and_keeps_order() {
        let now = Utc::now();
        let day = 86_400;
        let ts = now.timestamp();
        let videos = vec![
            video_at("a", ts - day),
            video_at("b", ts - 10 * day),
            video_at("c", ts - 2 * day),
            video_at("d", ts - 10 * day),
            video_at("e", ts),
        ];

        let kept = retain_recent(videos, 7, now);
        let ids: Vec<&str> = kept.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "e"]);
    }

    #[test]
    fn window_is_idempotent() {
        let now = Utc::now();
        let ts = now.timestamp();
        let videos: Vec<_> = (0..10).map(|i| video_at(&i.to_string(), ts - i * 43_200)).collect();

        let once = retain_recent(videos, 3, now);
        let twice = retain_recent(once.clone(), 3, now);
        assert_eq!(once, twice);
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let now = Utc::now();
        let edge = (now - Duration::days(7)).timestamp();
        let kept = retain_recent(vec![video_at("edge", edge)], 7, now);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn window_past_calendar_range_keeps_everything() {
        let now = Utc::now();
        let videos = vec![video_at("old", 0), video_at("new", now.timestamp())];
        let kept = retain_recent(videos, 100_000_000, now);
        assert_eq!(kept.len(), 2);

        let kept = retain_recent(vec![video_at("new", now.timestamp())], u32::MAX, now);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn username_charset() {
        assert!(is_valid_username("alice.b_2"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("a/../api/recommend/item_list"));
        assert!(!is_valid_username("a?x=1"));
        assert!(!is_valid_username("a#b"));
    }

    #[test]
    fn missing_create_time_is_outside_any_window() {
        let kept = retain_recent(vec![summarize(RawVideo::default())], 365, Utc::now());
        assert!(kept.is_empty());
    }

    #[test]
    fn normalizers() {
        assert_eq!(normalize_hashtag(" #dance# "), "dance");
        assert_eq!(normalize_username("@alice "), "alice");
        assert_eq!(normalize_country_code("de"), "DE");
    }
}
