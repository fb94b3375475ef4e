// =============================================================================
// GOOGLE DRIVE CLIENT
// =============================================================================
//
// `FileHost` over the Drive v3 REST API:
// - upload:      POST /upload/drive/v3/files?uploadType=multipart (multipart/related)
// - share:       POST /drive/v3/files/{id}/permissions  {type: anyone, role: reader}
// - delete:      DELETE /drive/v3/files/{id}
//
// **Environment Variables:**
// - `DRIVE_FOLDER_ID` - Folder the deck is uploaded into (optional; the
//   service account's root otherwise)

use super::service_account::AccessTokenProvider;
use crate::core::sharing::FileHost;
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DRIVE_BASE_URL: &str = "https://www.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parents: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct Permission {
    #[serde(rename = "type")]
    kind: &'static str,
    role: &'static str,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DriveErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DriveErrorResponse {
    error: DriveErrorDetail,
}

pub struct DriveClient {
    client: Client,
    auth: Arc<dyn AccessTokenProvider>,
    folder_id: Option<String>,
    base_url: String,
}

impl DriveClient {
    pub fn new(auth: Arc<dyn AccessTokenProvider>, folder_id: Option<String>) -> Self {
        Self::with_base_url(auth, folder_id, DEFAULT_DRIVE_BASE_URL.to_string())
    }

    pub fn with_base_url(
        auth: Arc<dyn AccessTokenProvider>,
        folder_id: Option<String>,
        base_url: String,
    ) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            auth,
            folder_id: folder_id.filter(|f| !f.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Turns a non-success response into an error carrying Drive's message.
    async fn check(
        response: reqwest::Response,
        action: &str,
    ) -> Result<reqwest::Response, Box<dyn Error + Send + Sync>> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await?;
        if let Ok(error_response) = serde_json::from_str::<DriveErrorResponse>(&text) {
            return Err(format!(
                "Drive {} failed ({}): {}",
                action, status, error_response.error.message
            )
            .into());
        }
        Err(format!("Drive {} failed ({}): {}", action, status, text).into())
    }
}

/// Builds a `multipart/related` body: JSON metadata, then the file bytes.
fn multipart_related(
    boundary: &str,
    metadata: &[u8],
    mime_type: &str,
    content: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + content.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[async_trait]
impl FileHost for DriveClient {
    async fn upload(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let content = tokio::fs::read(path).await?;
        let metadata = serde_json::to_vec(&FileMetadata {
            name,
            parents: self.folder_id.as_deref().into_iter().collect(),
        })?;

        let boundary: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let body = multipart_related(&boundary, &metadata, mime_type, &content);

        let token = self.auth.access_token().await?;
        tracing::debug!(%name, bytes = content.len(), "Uploading file to Drive");

        let response = self
            .client
            .post(format!("{}/upload/drive/v3/files", self.base_url))
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .bearer_auth(token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let created: CreatedFile = Self::check(response, "upload").await?.json().await?;
        Ok(created.id)
    }

    async fn share_publicly(&self, file_id: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(format!(
                "{}/drive/v3/files/{}/permissions",
                self.base_url, file_id
            ))
            .bearer_auth(token)
            .json(&Permission {
                kind: "anyone",
                role: "reader",
            })
            .send()
            .await?;

        Self::check(response, "permission").await?;
        Ok(())
    }

    async fn delete(&self, file_id: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .delete(format!("{}/drive/v3/files/{}", self.base_url, file_id))
            .bearer_auth(token)
            .send()
            .await?;

        Self::check(response, "delete").await?;
        Ok(())
    }
}
