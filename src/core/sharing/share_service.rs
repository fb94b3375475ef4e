use super::expiry_scheduler::{ExpiryScheduler, ShutdownPolicy};
use async_trait::async_trait;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const PPTX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("Presentation file not found: {0}")]
    MissingArtifact(PathBuf),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Could not share uploaded file: {0}")]
    Permission(String),
}

/// Remote file storage (a cloud drive folder).
#[async_trait]
pub trait FileHost: Send + Sync {
    /// Uploads a local file and returns its remote id.
    async fn upload(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;

    /// Grants anyone-with-the-link read access.
    async fn share_publicly(&self, file_id: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn delete(&self, file_id: &str) -> Result<(), Box<dyn Error + Send + Sync>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub file_id: String,
    pub url: String,
}

/// Publishes a generated artifact behind a temporary public link.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    async fn publish(&self, artifact: &Path) -> Result<ShareLink, ShareError>;
}

pub fn slides_link(file_id: &str) -> String {
    format!("https://docs.google.com/presentation/d/{}", file_id)
}

pub struct ShareService {
    host: Arc<dyn FileHost>,
    scheduler: ExpiryScheduler,
    ttl: Duration,
}

impl ShareService {
    pub fn new(host: Arc<dyn FileHost>, ttl: Duration) -> Self {
        Self {
            host,
            scheduler: ExpiryScheduler::new(),
            ttl,
        }
    }

    /// Resolves every pending link expiry. Called once on process exit.
    pub async fn shutdown(&self, policy: ShutdownPolicy) {
        self.scheduler.shutdown(policy).await;
    }
}

#[async_trait]
impl ArtifactPublisher for ShareService {
    async fn publish(&self, artifact: &Path) -> Result<ShareLink, ShareError> {
        if !artifact.exists() {
            return Err(ShareError::MissingArtifact(artifact.to_path_buf()));
        }

        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "presentation.pptx".to_string());

        tracing::info!(%name, "Uploading presentation");
        let file_id = self
            .host
            .upload(artifact, &name, PPTX_MIME_TYPE)
            .await
            .map_err(|e| ShareError::Upload(e.to_string()))?;

        // Scheduled before any further await so an uploaded file always expires.
        self.scheduler
            .schedule(Arc::clone(&self.host), file_id.clone(), self.ttl);

        self.host
            .share_publicly(&file_id)
            .await
            .map_err(|e| ShareError::Permission(e.to_string()))?;

        let url = slides_link(&file_id);
        tracing::info!(%file_id, %url, "Presentation shared");

        Ok(ShareLink { file_id, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sharing::test_support::RecordingHost;
    use tempfile::NamedTempFile;

    #[tokio::test(start_paused = true)]
    async fn test_publish_uploads_shares_and_expires() {
        let host = RecordingHost::new();
        let service = ShareService::new(host.clone(), Duration::from_secs(300));
        let artifact = NamedTempFile::new().unwrap();

        let link = service.publish(artifact.path()).await.unwrap();

        assert_eq!(link.file_id, "remote-1");
        assert_eq!(link.url, "https://docs.google.com/presentation/d/remote-1");
        assert_eq!(host.shared(), vec!["remote-1".to_string()]);
        assert!(host.deleted().is_empty());

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(host.deleted(), vec!["remote-1".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let host = RecordingHost::new();
        let service = ShareService::new(host.clone(), Duration::from_secs(300));

        let err = service
            .publish(Path::new("/nonexistent/deck.pptx"))
            .await
            .unwrap_err();

        assert!(matches!(err, ShareError::MissingArtifact(_)));
        assert_eq!(host.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_error_propagates() {
        let host = RecordingHost::failing_uploads();
        let service = ShareService::new(host.clone(), Duration::from_secs(300));
        let artifact = NamedTempFile::new().unwrap();

        let err = service.publish(artifact.path()).await.unwrap_err();

        assert!(matches!(err, ShareError::Upload(_)));
        assert!(host.shared().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_cancelled_after_upload_still_expires() {
        let host = RecordingHost::slow_shares(Duration::from_secs(5));
        let service = ShareService::new(host.clone(), Duration::from_secs(300));
        let artifact = NamedTempFile::new().unwrap();

        let cancelled =
            tokio::time::timeout(Duration::from_secs(1), service.publish(artifact.path())).await;
        assert!(cancelled.is_err());
        assert_eq!(host.upload_count(), 1);
        assert!(host.shared().is_empty());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        service.shutdown(ShutdownPolicy::DeleteNow).await;

        assert_eq!(host.deleted(), vec!["remote-1".to_string()]);
    }
}
