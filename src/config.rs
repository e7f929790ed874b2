use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub tiktok: TikTokConfig,
}

/// Settings for the TikTok web provider.
#[derive(Clone, Debug)]
pub struct TikTokConfig {
    pub base_url: String,
    pub ms_token: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for TikTokConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.tiktok.com".to_string(),
            ms_token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = get("PORT").unwrap_or_else(|| "8000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let defaults = TikTokConfig::default();

        let timeout = match get("TIKTOK_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| {
                    AppError::ConfigError(format!("Invalid TIKTOK_TIMEOUT_SECS: {}", e))
                })?;
                if secs == 0 {
                    return Err(AppError::ConfigError("TIKTOK_TIMEOUT_SECS must be positive".to_string()));
                }
                Duration::from_secs(secs)
            }
            None => defaults.timeout,
        };

        let tiktok = TikTokConfig {
            base_url: get("TIKTOK_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            ms_token: get("TIKTOK_MS_TOKEN").filter(|token| !token.is_empty()),
            user_agent: get("TIKTOK_USER_AGENT").unwrap_or(defaults.user_agent),
            timeout,
        };

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            tiktok,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.tiktok.base_url, "https://www.tiktok.com");
        assert!(config.tiktok.ms_token.is_none());
        assert_eq!(config.tiktok.timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides_are_read() {
        let config = config_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9100"),
            ("TIKTOK_BASE_URL", "http://localhost:4000/"),
            ("TIKTOK_MS_TOKEN", "abc"),
            ("TIKTOK_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.server_addr, "127.0.0.1:9100".parse().unwrap());
        assert_eq!(config.tiktok.base_url, "http://localhost:4000");
        assert_eq!(config.tiktok.ms_token.as_deref(), Some("abc"));
        assert_eq!(config.tiktok.timeout, Duration::from_secs(5));
    }

    #[test]
    fn empty_ms_token_is_ignored() {
        let config = config_from(&[("TIKTOK_MS_TOKEN", "")]).unwrap();
        assert!(config.tiktok.ms_token.is_none());
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert!(matches!(config_from(&[("PORT", "eighty")]), Err(AppError::ConfigError(_))));
        assert!(matches!(config_from(&[("HOST", "not-an-ip")]), Err(AppError::ConfigError(_))));
        assert!(matches!(
            config_from(&[("TIKTOK_TIMEOUT_SECS", "0")]),
            Err(AppError::ConfigError(_))
        ));
    }
}
