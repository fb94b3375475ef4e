use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const ALL_NEWS_SNAPSHOT: &str = "all_news.json";
pub const SELECTED_NEWS_SNAPSHOT: &str = "selected_news.json";
pub const FINAL_NEWS_SNAPSHOT: &str = "final_news.json";

/// Local directory holding one run's transient artifacts: JSON snapshots of
/// each stage and the downloaded article images.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts a run from an empty directory.
    pub async fn prepare(&self) -> std::io::Result<()> {
        self.clear().await?;
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Writes `value` as pretty JSON, replacing any earlier file of that name.
    pub async fn write_snapshot<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<PathBuf, std::io::Error> {
        let path = self.root.join(name);
        let json = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&path, json).await?;
        tracing::debug!(path = %path.display(), "Wrote snapshot");
        Ok(path)
    }

    /// Where the image for slide `index` is downloaded to.
    pub fn image_path(&self, index: usize) -> PathBuf {
        self.root.join(format!("image_{}.jpg", index))
    }

    /// Removes the directory and everything in it. Missing is fine.
    pub async fn clear(&self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
