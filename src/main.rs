// This is the entry point of the news deck service.
//
// **Architecture Overview:**
// - `core/` = Business logic (news curation, deck filling, sharing, auth)
// - `infra/` = Implementations of core traits (GNews, Gemini, Drive, PPTX)
// - `web/` = HTTP adapters (login, dashboard, generate/download)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Serve the web app until Ctrl+C, then resolve pending share expiries

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "web/web_layer.rs"]
mod web;

mod config;

use crate::config::AppConfig;
use crate::core::auth::{SessionStore, StaticCredentials};
use crate::core::news::KeyPool;
use crate::core::pipeline::{PipelineService, PipelineSettings, Workspace};
use crate::core::sharing::{ShareService, ShutdownPolicy};
use crate::infra::ai::GeminiClient;
use crate::infra::deck::PptxTemplate;
use crate::infra::google_drive::{DriveClient, ServiceAccountAuth, DRIVE_SCOPE};
use crate::infra::images::HttpImageFetcher;
use crate::infra::news::{GNewsClient, GNewsSettings};
use crate::web::session::SessionCookies;
use crate::web::AppState;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Sleep between articles so a single key is not hammered.
const ARTICLE_PAUSE: Duration = Duration::from_secs(1);
const SESSION_LIFETIME_HOURS: i64 = 12;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;

    if !config.template_path.exists() {
        tracing::warn!(
            template = %config.template_path.display(),
            "Deck template not found, runs will fail until it exists"
        );
    }

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let keys = KeyPool::new(&config.gemini_api_keys)?;
    tracing::info!(keys = keys.len(), model = %config.gemini_model, "Gemini key pool ready");

    let news = Arc::new(GNewsClient::new(GNewsSettings {
        api_key: config.gnews_api_key.clone(),
        query: config.news_query.clone(),
        language: config.news_language.clone(),
        max_articles: config.news_max_articles,
        lookback_hours: config.news_lookback_hours,
    }));

    let pipeline = Arc::new(PipelineService::new(
        news,
        Arc::new(HttpImageFetcher::default()),
        Arc::new(PptxTemplate::new(&config.template_path)),
        Arc::new(GeminiClient::new(config.gemini_model.clone())),
        keys,
        Workspace::new(&config.work_dir),
        PipelineSettings {
            curated_count: config.curated_article_count,
            output_path: config.output_path.clone(),
            article_pause: ARTICLE_PAUSE,
        },
    ));

    let drive_auth = ServiceAccountAuth::from_file(&config.service_account_key, DRIVE_SCOPE)
        .await
        .map_err(|e| anyhow::anyhow!("Could not load Drive credentials: {}", e))?;
    let drive = Arc::new(DriveClient::new(
        Arc::new(drive_auth),
        config.drive_folder_id.clone(),
    ));
    let share = Arc::new(ShareService::new(drive, config.share_ttl));

    let state = AppState {
        pipeline,
        publisher: share.clone(),
        credentials: Arc::new(StaticCredentials::new(
            config.app_username.clone(),
            config.app_password.clone(),
        )),
        sessions: SessionStore::new(chrono::Duration::hours(SESSION_LIFETIME_HOURS)),
        cookies: SessionCookies::new(&config.session_secret),
        output_path: config.output_path.clone(),
    };

    // ========================================================================
    // SERVE
    // ========================================================================

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Could not bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "News deck service listening");

    axum::serve(listener, web::create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    share.shutdown(ShutdownPolicy::DeleteNow).await;
    tracing::info!("Stopped");
    Ok(())
}
