// =============================================================================
// GOOGLE SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// The Sheets API needs an OAuth2 access token. We get one with the JWT bearer
// grant: sign a short-lived JWT with the service account's private key and
// swap it at the token endpoint.
//
// **Setup:**
// 1. Create a service account in Google Cloud Console and enable the
//    Google Sheets API for the project.
// 2. Download a JSON key for it.
// 3. Share the target spreadsheet with the service account email as Editor.
// 4. Set one of:
//    - `GOOGLE_SERVICE_ACCOUNT_KEY`  - path to the JSON key file
//    - `GOOGLE_SERVICE_ACCOUNT_JSON` - the JSON content itself

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::sync::SyncError;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Tokens live for an hour; refresh a bit early.
const TOKEN_LIFETIME: Duration = Duration::from_secs(55 * 60);
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The fields we need from the service account JSON key.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    client_email: String,
    private_key: String,
    token_uri: String,
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    /// At most one hour after `iat`.
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

/// Hands out access tokens for one service account and scope, caching them
/// until shortly before expiry.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    scope: String,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    pub async fn from_file(path: &str) -> Result<Self, SyncError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SyncError::Auth(format!("cannot read key file {}: {}", path, e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)
            .map_err(|e| SyncError::Auth(format!("invalid service account JSON: {}", e)))?;
        Ok(Self {
            credentials,
            scope: SPREADSHEETS_SCOPE.to_string(),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    pub async fn from_env() -> Result<Self, SyncError> {
        if let Ok(path) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
            return Self::from_file(&path).await;
        }

        if let Ok(json) = std::env::var("GOOGLE_SERVICE_ACCOUNT_JSON") {
            return Self::from_json(&json);
        }

        Err(SyncError::Auth(
            "Neither GOOGLE_SERVICE_ACCOUNT_KEY nor GOOGLE_SERVICE_ACCOUNT_JSON is set.".into(),
        ))
    }

    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    /// Gets a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String, SyncError> {
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
                expires_at: SystemTime::now() + TOKEN_LIFETIME,
            });
        }

        Ok(new_token)
    }

    fn build_claims(&self, now: u64) -> JwtClaims {
        JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        }
    }

    async fn fetch_new_token(&self) -> Result<String, SyncError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SyncError::Auth(e.to_string()))?
            .as_secs();

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| SyncError::Auth(format!("bad private key: {}", e)))?;
        let jwt = encode(&header, &self.build_claims(now), &key)
            .map_err(|e| SyncError::Auth(e.to_string()))?;

        tracing::debug!(account = %self.credentials.client_email, "Requesting Google access token");

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "Token exchange failed ({}): {}",
                status, text
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(e.to_string()))?;
        Ok(token_response.access_token)
    }
}
