//! Service Account Authentication
//!
//! Signs an RS256 JWT with the service account key and trades it for an
//! OAuth access token. Tokens are cached until shortly before they expire.

use crate::StorageError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive.file";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// OAuth credentials for a Google service account
pub struct ServiceAccountAuth {
    client_email: String,
    key: EncodingKey,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// Load the PEM-encoded RSA private key of the service account
    pub fn new(client_email: &str, private_key_pem: &str) -> Result<Self, StorageError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| StorageError::Auth(format!("invalid private key: {}", e)))?;

        Ok(Self {
            client_email: client_email.to_string(),
            key,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            cached: Mutex::new(None),
        })
    }

    pub fn with_token_url(mut self, token_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Current access token, fetching a new one when needed
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String, StorageError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached
            .as_ref()
            .filter(|t| t.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now)
        {
            return Ok(token.token.clone());
        }

        let assertion = self.sign_assertion(now)?;
        let response = http
            .post(&self.token_url)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Auth(format!("malformed token response: {}", e)))?;

        debug!("Obtained access token valid for {}s", token.expires_in);
        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: now + Duration::seconds(token.expires_in),
        });

        Ok(token.access_token)
    }

    /// Drop the cached token so the next call re-authenticates
    pub async fn invalidate(&self) {
        if self.cached.lock().await.take().is_some() {
            info!("Access token for {} invalidated", self.client_email);
        }
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, StorageError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: SCOPES,
            aud: &self.token_url,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| StorageError::Auth(format!("failed to sign assertion: {}", e)))
    }
}
