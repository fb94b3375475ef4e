use crate::core::pipeline::ImageFetcher;
use async_trait::async_trait;
use image::ImageFormat;
use reqwest::Client;
use std::error::Error;
use std::path::Path;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// One initial attempt plus two retries.
const MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(2);

/// Downloads article images and stores them as RGB JPEG files.
pub struct HttpImageFetcher {
    client: Client,
    retry_pause: Duration,
}

impl HttpImageFetcher {
    pub fn new(retry_pause: Duration) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            retry_pause,
        }
    }

    async fn try_fetch(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let response = self.client.get(url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(format!("status {}", response.status()).into());
        }
        let bytes = response.bytes().await?;

        let destination = destination.to_path_buf();
        tokio::task::spawn_blocking(move || reencode_as_jpeg(&bytes, &destination)).await??;
        Ok(())
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_PAUSE)
    }
}

/// Decodes any supported format, drops alpha and writes a JPEG.
fn reencode_as_jpeg(bytes: &[u8], destination: &Path) -> Result<(), image::ImageError> {
    let rgb = image::load_from_memory(bytes)?.into_rgb8();
    rgb.save_with_format(destination, ImageFormat::Jpeg)
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> bool {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_fetch(url, destination).await {
                Ok(()) => {
                    tracing::info!(path = %destination.display(), "Downloaded image");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(attempt, %url, error = %e, "Failed to download image");
                }
            }

            if attempt < MAX_ATTEMPTS && !self.retry_pause.is_zero() {
                tokio::time::sleep(self.retry_pause).await;
            }
        }

        tracing::warn!(%url, attempts = MAX_ATTEMPTS, "Giving up on image");
        false
    }
}
