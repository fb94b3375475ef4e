// Runtime configuration, read once at startup from the environment
// (after `.env` has been loaded).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// One year.
const MAX_LOOKBACK_HOURS: i64 = 24 * 365;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // News + model
    pub gnews_api_key: String,
    pub gemini_api_keys: Vec<String>,
    pub gemini_model: String,
    pub news_query: String,
    pub news_language: String,
    pub news_max_articles: u32,
    pub news_lookback_hours: i64,
    pub curated_article_count: usize,

    // Files
    pub work_dir: PathBuf,
    pub template_path: PathBuf,
    pub output_path: PathBuf,

    // Sharing
    pub service_account_key: PathBuf,
    pub drive_folder_id: Option<String>,
    pub share_ttl: Duration,

    // Web
    pub bind_addr: SocketAddr,
    pub session_secret: String,
    pub app_username: String,
    pub app_password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or_default = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let gnews_api_key = var("GNEWS_API_KEY").ok_or(ConfigError::Missing("GNEWS_API_KEY"))?;
        let gemini_api_keys = gemini_keys(var("GEMINI_API_KEYS"), var("GEMINI_API_KEY"))?;

        let session_secret = match var("SESSION_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("SESSION_SECRET not set, sessions will not survive a restart");
                random_secret()
            }
        };

        let ip: IpAddr = parse(&var, "BIND_ADDR", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse(&var, "PORT", 5000)?;

        Ok(Self {
            gnews_api_key,
            gemini_api_keys,
            gemini_model: or_default("GEMINI_MODEL", "gemini-1.5-pro"),
            news_query: or_default("NEWS_QUERY", "business technology"),
            news_language: or_default("NEWS_LANGUAGE", "en"),
            news_max_articles: parse(&var, "NEWS_MAX_ARTICLES", 10)?,
            news_lookback_hours: parse_in_range(
                &var,
                "NEWS_LOOKBACK_HOURS",
                24,
                1..=MAX_LOOKBACK_HOURS,
            )?,
            curated_article_count: parse(&var, "CURATED_ARTICLE_COUNT", 10)?,
            work_dir: PathBuf::from(or_default("WORK_DIR", "news_files")),
            template_path: PathBuf::from(or_default("TEMPLATE_PATH", "template.pptx")),
            output_path: PathBuf::from(or_default("OUTPUT_PATH", "final_presentation.pptx")),
            service_account_key: PathBuf::from(or_default(
                "GOOGLE_SERVICE_ACCOUNT_KEY",
                "service_credentials.json",
            )),
            drive_folder_id: var("DRIVE_FOLDER_ID"),
            share_ttl: Duration::from_secs(parse(&var, "SHARE_TTL_SECS", 300)?),
            bind_addr: SocketAddr::new(ip, port),
            session_secret,
            app_username: or_default("APP_USERNAME", "admin"),
            app_password: or_default("APP_PASSWORD", "password123"),
        })
    }
}

/// A comma-separated list wins over the single-key variable.
fn gemini_keys(list: Option<String>, single: Option<String>) -> Result<Vec<String>, ConfigError> {
    let keys: Vec<String> = list
        .map(|l| {
            l.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if !keys.is_empty() {
        return Ok(keys);
    }

    single
        .map(|k| vec![k.trim().to_string()])
        .ok_or(ConfigError::Missing("GEMINI_API_KEYS or GEMINI_API_KEY"))
}

fn parse<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: name,
            value: raw,
        }),
    }
}

fn parse_in_range<T, F>(
    var: &F,
    name: &'static str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd,
    F: Fn(&str) -> Option<String>,
{
    let value = parse(var, name, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var: name,
            value: var(name).unwrap_or_default(),
        })
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("GNEWS_API_KEY", "g"), ("GEMINI_API_KEY", "k")]).unwrap();

        assert_eq!(config.gemini_api_keys, vec!["k".to_string()]);
        assert_eq!(config.gemini_model, "gemini-1.5-pro");
        assert_eq!(config.news_query, "business technology");
        assert_eq!(config.news_max_articles, 10);
        assert_eq!(config.news_lookback_hours, 24);
        assert_eq!(config.curated_article_count, 10);
        assert_eq!(config.work_dir, PathBuf::from("news_files"));
        assert_eq!(config.template_path, PathBuf::from("template.pptx"));
        assert_eq!(config.output_path, PathBuf::from("final_presentation.pptx"));
        assert_eq!(config.share_ttl, Duration::from_secs(300));
        assert_eq!(config.bind_addr, "0.0.0.0:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.app_username, "admin");
        assert_eq!(config.app_password, "password123");
        assert!(config.drive_folder_id.is_none());
        assert!(!config.session_secret.is_empty());
    }

    #[test]
    fn test_key_list_beats_single_key() {
        let config = config_from(&[
            ("GNEWS_API_KEY", "g"),
            ("GEMINI_API_KEYS", " a, ,b ,c,"),
            ("GEMINI_API_KEY", "ignored"),
        ])
        .unwrap();

        assert_eq!(config.gemini_api_keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_keys_are_fatal() {
        assert_eq!(
            config_from(&[("GEMINI_API_KEY", "k")]).unwrap_err(),
            ConfigError::Missing("GNEWS_API_KEY")
        );
        assert_eq!(
            config_from(&[("GNEWS_API_KEY", "g"), ("GEMINI_API_KEYS", " , ")]).unwrap_err(),
            ConfigError::Missing("GEMINI_API_KEYS or GEMINI_API_KEY")
        );
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = config_from(&[
            ("GNEWS_API_KEY", "g"),
            ("GEMINI_API_KEY", "k"),
            ("PORT", "eighty"),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "PORT",
                value: "eighty".to_string()
            }
        );
    }

    #[test]
    fn test_lookback_outside_window_is_rejected() {
        for raw in ["0", "-6", "100000000000"] {
            let err = config_from(&[
                ("GNEWS_API_KEY", "g"),
                ("GEMINI_API_KEY", "k"),
                ("NEWS_LOOKBACK_HOURS", raw),
            ])
            .unwrap_err();

            assert_eq!(
                err,
                ConfigError::Invalid {
                    var: "NEWS_LOOKBACK_HOURS",
                    value: raw.to_string()
                }
            );
        }

        let config = config_from(&[
            ("GNEWS_API_KEY", "g"),
            ("GEMINI_API_KEY", "k"),
            ("NEWS_LOOKBACK_HOURS", "8760"),
        ])
        .unwrap();
        assert_eq!(config.news_lookback_hours, 8760);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("GNEWS_API_KEY", "g"),
            ("GEMINI_API_KEY", "k"),
            ("PORT", "8080"),
            ("BIND_ADDR", "127.0.0.1"),
            ("DRIVE_FOLDER_ID", "folder"),
            ("SESSION_SECRET", "s3cret"),
            ("SHARE_TTL_SECS", "60"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.drive_folder_id.as_deref(), Some("folder"));
        assert_eq!(config.session_secret, "s3cret");
        assert_eq!(config.share_ttl, Duration::from_secs(60));
    }
}
