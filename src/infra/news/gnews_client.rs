// =============================================================================
// GNEWS CLIENT
// =============================================================================
//
// `NewsSource` backed by the GNews search API (https://gnews.io/docs/v4).
// One request per run; any upstream failure yields an empty batch.
//
// **Environment Variables:**
// - `GNEWS_API_KEY` - API key (required)
// - `NEWS_QUERY`, `NEWS_MAX_ARTICLES`, `NEWS_LOOKBACK_HOURS` - search tuning

use crate::core::news::Article;
use crate::core::pipeline::NewsSource;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;
use std::time::Duration;

pub const DEFAULT_GNEWS_BASE_URL: &str = "https://gnews.io";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const NO_TITLE: &str = "No title";
const NO_SOURCE: &str = "No source";
const NO_TIME: &str = "No time";
const NO_LINK: &str = "No link";
const NO_DESCRIPTION: &str = "No description";

#[derive(Debug, Clone)]
pub struct GNewsSettings {
    pub api_key: String,
    pub query: String,
    pub language: String,
    pub max_articles: u32,
    pub lookback_hours: i64,
}

// =============================================================================
// GNEWS API RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SearchResponse {
    articles: Vec<RemoteArticle>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RemoteArticle {
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    image: Option<String>,
    published_at: Option<String>,
    source: Option<RemoteSource>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RemoteSource {
    name: Option<String>,
}

impl RemoteArticle {
    fn into_article(self) -> Article {
        let content = self
            .content
            .filter(|c| !c.trim().is_empty())
            .or(self.description)
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        Article {
            title: self.title.unwrap_or_else(|| NO_TITLE.to_string()),
            source: self
                .source
                .and_then(|s| s.name)
                .unwrap_or_else(|| NO_SOURCE.to_string()),
            time: self.published_at.unwrap_or_else(|| NO_TIME.to_string()),
            link: self.url.unwrap_or_else(|| NO_LINK.to_string()),
            content,
            image: self.image,
            selection_reason: None,
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GNewsClient {
    client: Client,
    settings: GNewsSettings,
    base_url: String,
}

impl GNewsClient {
    pub fn new(settings: GNewsSettings) -> Self {
        Self::with_base_url(settings, DEFAULT_GNEWS_BASE_URL.to_string())
    }

    pub fn with_base_url(settings: GNewsSettings, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            settings,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn search(&self) -> Result<Vec<Article>, Box<dyn Error + Send + Sync>> {
        let hours = self.settings.lookback_hours;
        let from = window_start(Utc::now(), hours)
            .ok_or_else(|| format!("Look-back of {} hours is out of range", hours))?
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let max = self.settings.max_articles.to_string();

        let response = self
            .client
            .get(format!("{}/api/v4/search", self.base_url))
            .query(&[
                ("q", self.settings.query.as_str()),
                ("lang", self.settings.language.as_str()),
                ("max", max.as_str()),
                ("from", from.as_str()),
                ("expand", "content"),
                ("apikey", self.settings.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("GNews returned status {}", response.status()).into());
        }

        let body: SearchResponse = response.json().await?;
        Ok(body
            .articles
            .into_iter()
            .map(RemoteArticle::into_article)
            .collect())
    }
}

/// Start of the search window, or `None` if it cannot be represented.
fn window_start(now: DateTime<Utc>, lookback_hours: i64) -> Option<DateTime<Utc>> {
    now.checked_sub_signed(ChronoDuration::try_hours(lookback_hours)?)
}

#[async_trait]
impl NewsSource for GNewsClient {
    async fn fetch_latest(&self) -> Vec<Article> {
        tracing::info!(query = %self.settings.query, "Fetching news from GNews");
        match self.search().await {
            Ok(articles) => {
                tracing::info!(count = articles.len(), "Fetched articles from GNews");
                articles
            }
            Err(e) => {
                tracing::error!(error = %e, "Error fetching news");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> GNewsSettings {
        GNewsSettings {
            api_key: "gnews-key".to_string(),
            query: "business technology".to_string(),
            language: "en".to_string(),
            max_articles: 10,
            lookback_hours: 24,
        }
    }

    #[test]
    fn test_missing_fields_become_sentinels() {
        let article = RemoteArticle::default().into_article();

        assert_eq!(article.title, "No title");
        assert_eq!(article.source, "No source");
        assert_eq!(article.time, "No time");
        assert_eq!(article.link, "No link");
        assert_eq!(article.content, "No description");
        assert!(article.image.is_none());
    }

    #[test]
    fn test_empty_content_falls_back_to_description() {
        let remote = RemoteArticle {
            content: Some("  ".to_string()),
            description: Some("Short blurb".to_string()),
            ..Default::default()
        };
        assert_eq!(remote.into_article().content, "Short blurb");
    }

    #[tokio::test]
    async fn test_fetch_maps_items_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/search"))
            .and(query_param("q", "business technology"))
            .and(query_param("expand", "content"))
            .and(query_param("apikey", "gnews-key"))
            .and(query_param("max", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalArticles": 3,
                "articles": [
                    {
                        "title": "First",
                        "description": "d1",
                        "content": "full text one",
                        "url": "https://a.example/1",
                        "image": "https://a.example/1.jpg",
                        "publishedAt": "2026-10-17T06:00:00Z",
                        "source": {"name": "Alpha Wire", "url": "https://a.example"}
                    },
                    {"title": "Second", "description": "d2"},
                    {"title": "Third", "content": "three"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GNewsClient::with_base_url(settings(), server.uri());
        let articles = client.fetch_latest().await;

        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
        assert_eq!(articles[0].source, "Alpha Wire");
        assert_eq!(articles[0].content, "full text one");
        assert_eq!(articles[0].image.as_deref(), Some("https://a.example/1.jpg"));
        assert_eq!(articles[1].content, "d2");
        assert_eq!(articles[1].source, "No source");

        // The look-back window is sent as an RFC 3339 UTC timestamp.
        let requests = server.received_requests().await.unwrap();
        let from = requests[0]
            .url
            .query_pairs()
            .find(|(k, _)| k == "from")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(from.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&from).is_ok());
    }

    #[test]
    fn test_window_start() {
        let now = Utc::now();
        assert_eq!(window_start(now, 24), Some(now - ChronoDuration::hours(24)));
        assert!(window_start(now, 100_000_000_000).is_none());
        assert!(window_start(now, i64::MAX).is_none());
    }

    #[tokio::test]
    async fn test_unrepresentable_window_yields_empty_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = GNewsClient::with_base_url(
            GNewsSettings {
                lookback_hours: 100_000_000_000,
                ..settings()
            },
            server.uri(),
        );
        assert!(client.fetch_latest().await.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_yields_empty_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/search"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quota"))
            .mount(&server)
            .await;

        let client = GNewsClient::with_base_url(settings(), server.uri());
        assert!(client.fetch_latest().await.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_body_yields_empty_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = GNewsClient::with_base_url(settings(), server.uri());
        assert!(client.fetch_latest().await.is_empty());
    }
}
