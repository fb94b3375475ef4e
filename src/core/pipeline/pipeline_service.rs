// The end-to-end run: fetch -> curate -> summarize (+ images) -> build deck.
//
// Every external collaborator is a port, so the whole run can be driven in
// tests without network or a real template.

use super::workspace::{
    Workspace, ALL_NEWS_SNAPSHOT, FINAL_NEWS_SNAPSHOT, SELECTED_NEWS_SNAPSHOT,
};
use crate::core::deck::{build_deck, DeckError, DeckTemplate};
use crate::core::news::{
    Article, CurationService, KeyPool, LanguageModel, SlideArticle, SummaryService,
};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Deck error: {0}")]
    Deck(#[from] DeckError),

    #[error("Background task failed: {0}")]
    Task(String),
}

// ============================================================================
// PORTS
// ============================================================================

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Fetches the latest batch. Upstream failures yield an empty batch.
    async fn fetch_latest(&self) -> Vec<Article>;
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Downloads `url` and stores it as a JPEG at `destination`.
    /// Returns `false` if the image could not be fetched.
    async fn fetch(&self, url: &str, destination: &Path) -> bool;
}

/// What the web layer triggers.
#[async_trait]
pub trait DeckPipeline: Send + Sync {
    /// Runs the whole pipeline. `Ok(None)` means there was nothing to build.
    async fn run(&self) -> Result<Option<PipelineReport>, PipelineError>;
}

// ============================================================================
// SERVICE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub output: PathBuf,
    pub fetched: usize,
    pub selected: usize,
    pub slides: usize,
    pub curation_fallback: bool,
    pub summary_fallbacks: usize,
}

impl PipelineReport {
    /// True if any stage silently fell back to degraded output.
    pub fn degraded(&self) -> bool {
        self.curation_fallback || self.summary_fallbacks > 0
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub curated_count: usize,
    pub output_path: PathBuf,
    /// Pause between articles to stay under model rate limits.
    pub article_pause: Duration,
}

pub struct PipelineService {
    news: Arc<dyn NewsSource>,
    images: Arc<dyn ImageFetcher>,
    template: Arc<dyn DeckTemplate>,
    curator: CurationService,
    summarizer: SummaryService,
    workspace: Workspace,
    /// Held for a whole run, which also keeps runs from overlapping.
    keys: Mutex<KeyPool>,
    settings: PipelineSettings,
}

impl PipelineService {
    pub fn new(
        news: Arc<dyn NewsSource>,
        images: Arc<dyn ImageFetcher>,
        template: Arc<dyn DeckTemplate>,
        model: Arc<dyn LanguageModel>,
        keys: KeyPool,
        workspace: Workspace,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            news,
            images,
            template,
            curator: CurationService::new(Arc::clone(&model)),
            summarizer: SummaryService::new(model),
            workspace,
            keys: Mutex::new(keys),
            settings,
        }
    }

    async fn remove_stale_output(&self) -> std::io::Result<()> {
        match tokio::fs::remove_file(&self.settings.output_path).await {
            Ok(()) => {
                tracing::debug!("Removed previous presentation");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn summarize_all(
        &self,
        selected: &[Article],
        keys: &mut KeyPool,
    ) -> (Vec<SlideArticle>, usize) {
        let mut slides = Vec::with_capacity(selected.len());
        let mut fallbacks = 0;

        for (i, article) in selected.iter().enumerate() {
            if i > 0 && !self.settings.article_pause.is_zero() {
                tokio::time::sleep(self.settings.article_pause).await;
            }

            tracing::info!(index = i + 1, title = %article.title, "Processing selected article");

            let summary = self
                .summarizer
                .summarize(&article.title, &article.content, keys)
                .await;
            if summary.fallback {
                fallbacks += 1;
            }

            let image_path = self.workspace.image_path(i);
            match article.image.as_deref().filter(|url| !url.trim().is_empty()) {
                Some(url) => {
                    self.images.fetch(url, &image_path).await;
                }
                None => tracing::info!(index = i + 1, "No image URL for article"),
            }

            slides.push(SlideArticle::from_summary(
                article,
                summary,
                image_path.display().to_string(),
            ));
        }

        (slides, fallbacks)
    }
}

#[async_trait]
impl DeckPipeline for PipelineService {
    async fn run(&self) -> Result<Option<PipelineReport>, PipelineError> {
        let mut keys = self.keys.lock().await;
        tracing::info!("Starting pipeline run");

        self.remove_stale_output().await?;
        self.workspace.prepare().await?;

        let articles = self.news.fetch_latest().await;
        if articles.is_empty() {
            tracing::warn!("No news articles fetched, nothing to build");
            self.workspace.clear().await?;
            return Ok(None);
        }
        self.workspace
            .write_snapshot(ALL_NEWS_SNAPSHOT, &articles)
            .await?;

        let curator_key = keys.next_key().to_string();
        let curation = self
            .curator
            .select_top(&articles, self.settings.curated_count, &curator_key)
            .await;
        if curation.fallback {
            tracing::warn!("Curation fell back to the first articles in fetch order");
        }
        self.workspace
            .write_snapshot(SELECTED_NEWS_SNAPSHOT, &curation.articles)
            .await?;

        let (slides, summary_fallbacks) = self.summarize_all(&curation.articles, &mut keys).await;
        self.workspace
            .write_snapshot(FINAL_NEWS_SNAPSHOT, &slides)
            .await?;

        let template = Arc::clone(&self.template);
        let image_dir = self.workspace.root().to_path_buf();
        let output = self.settings.output_path.clone();
        let deck_slides = slides.clone();
        let populated = tokio::task::spawn_blocking(move || {
            build_deck(template.as_ref(), &deck_slides, &image_dir, &output)
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;

        self.workspace.clear().await?;
        tracing::info!(folder = %self.workspace.root().display(), "Deleted work folder");

        let report = PipelineReport {
            output: self.settings.output_path.clone(),
            fetched: articles.len(),
            selected: slides.len(),
            slides: populated,
            curation_fallback: curation.fallback,
            summary_fallbacks,
        };
        tracing::info!(
            output = %report.output.display(),
            slides = report.slides,
            degraded = report.degraded(),
            "Pipeline complete"
        );
        Ok(Some(report))
    }
}
