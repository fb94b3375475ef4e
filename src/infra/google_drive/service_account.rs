// =============================================================================
// GOOGLE SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// OAuth2 for server-to-server calls: a JWT signed with the service account's
// RSA key is exchanged at the token endpoint for a short-lived access token.
//
// **Setup:**
// 1. Create a service account in Google Cloud Console and enable the
//    Google Drive API for its project.
// 2. Create a JSON key for it and save the file next to the binary.
// 3. Share the destination Drive folder with the service account email
//    (looks like: name@project.iam.gserviceaccount.com) as Editor.
//
// **Environment Variables:**
// - `GOOGLE_SERVICE_ACCOUNT_KEY` - Path to the JSON key file
//   (default `service_credentials.json`)

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Tokens are reused for this long; Google issues them for an hour.
const TOKEN_CACHE_TTL: Duration = Duration::from_secs(55 * 60);
/// A cached token this close to expiry is refreshed instead.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Anything that can hand out a bearer token for Google APIs.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    /// The service account email (used as issuer in JWT).
    client_email: String,

    /// The private key in PEM format.
    private_key: String,

    /// Where to exchange the JWT for an access token.
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    /// Max 1 hour from iat.
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// Authenticator that handles OAuth2 with service account credentials.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    scope: String,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    /// Creates a new authenticator from a JSON key file path.
    pub async fn from_file(
        path: impl AsRef<Path>,
        scope: &str,
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            format!(
                "Could not read service account key {}: {}",
                path.display(),
                e
            )
        })?;
        Self::from_json(&content, scope)
    }

    /// Creates a new authenticator from JSON content.
    pub fn from_json(json: &str, scope: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)?;
        tracing::info!(account = %credentials.client_email, "Loaded service account");
        Ok(Self {
            credentials,
            scope: scope.to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    fn claims(&self, now: u64) -> JwtClaims {
        JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        }
    }

    /// Fetches a new access token from Google.
    async fn fetch_new_token(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &self.claims(now), &key)?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(format!("Token exchange failed ({}): {}", status, text).into());
        }

        let token_response: TokenResponse = response.json().await?;
        tracing::debug!("Obtained new Google access token");
        Ok(token_response.access_token)
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountAuth {
    /// Gets a valid access token, refreshing if necessary.
    async fn access_token(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + REFRESH_MARGIN {
                    return Ok(token.token.clone());
                }
            }
        }

        let new_token = self.fetch_new_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(CachedToken {
                token: new_token.clone(),
                expires_at: SystemTime::now() + TOKEN_CACHE_TTL,
            });
        }

        Ok(new_token)
    }
}
