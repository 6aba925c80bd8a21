//! Google Sheets Store
//!
//! Readings live in a single sheet, one row each, below a header row.
//! Talks to the Sheets v4 REST API directly.

mod auth;
pub mod rows;

pub use auth::{ServiceAccountAuth, DEFAULT_TOKEN_URL};

use crate::{ConnectionStatus, ReadingStore, StorageError};
use async_trait::async_trait;
use chrono::FixedOffset;
use data_validator::Reading;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
/// Asia/Kolkata, which observes no daylight saving
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Google Sheets connection settings
#[derive(Clone)]
pub struct SheetsConfig {
    pub sheet_id: String,
    pub client_email: String,
    /// PEM-encoded RSA key of the service account
    pub private_key: String,
    pub sheet_name: String,
    /// Fixed offset the timestamp column is written in
    pub utc_offset_minutes: i32,
    pub api_base: String,
    pub token_url: String,
}

impl SheetsConfig {
    /// Settings with defaults; escaped `\n` sequences in the key become newlines
    pub fn new(sheet_id: &str, client_email: &str, private_key: &str) -> Self {
        Self {
            sheet_id: sheet_id.to_string(),
            client_email: client_email.to_string(),
            private_key: private_key.replace("\\n", "\n"),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            api_base: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }

    pub fn offset(&self) -> Result<FixedOffset, StorageError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            StorageError::InvalidConfig(format!(
                "UTC offset of {} minutes is out of range",
                self.utc_offset_minutes
            ))
        })
    }
}

impl fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("sheet_id", &self.sheet_id)
            .field("client_email", &self.client_email)
            .field("private_key", &format_args!("<{} bytes>", self.private_key.len()))
            .field("sheet_name", &self.sheet_name)
            .field("utc_offset_minutes", &self.utc_offset_minutes)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reading store backed by a Google Sheet
pub struct SheetsStore {
    config: SheetsConfig,
    offset: FixedOffset,
    http: reqwest::Client,
    auth: ServiceAccountAuth,
}

impl SheetsStore {
    pub fn new(config: SheetsConfig) -> Result<Self, StorageError> {
        let offset = config.offset()?;
        Url::parse(&config.api_base)
            .map_err(|e| StorageError::InvalidConfig(format!("invalid API base: {}", e)))?;

        let auth = ServiceAccountAuth::new(&config.client_email, &config.private_key)?
            .with_token_url(&config.token_url);
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        info!(
            "Google Sheets configured with sheet ID {}... as {}",
            config.sheet_id.chars().take(10).collect::<String>(),
            auth.client_email()
        );

        Ok(Self {
            config,
            offset,
            http,
            auth,
        })
    }

    pub fn sheet_id(&self) -> &str {
        &self.config.sheet_id
    }

    fn range(&self, cells: &str) -> String {
        format!("{}!{}", self.config.sheet_name, cells)
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}[:{action}]`
    fn values_url(&self, range: &str, action: Option<&str>) -> Result<Url, StorageError> {
        let target = match action {
            Some(action) => format!("{}:{}", range, action),
            None => range.to_string(),
        };
        self.spreadsheet_url(&["values", target.as_str()])
    }

    fn spreadsheet_url(&self, tail: &[&str]) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| StorageError::InvalidConfig(format!("invalid API base: {}", e)))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StorageError::InvalidConfig("API base cannot carry a path".to_string())
            })?;
            segments
                .pop_if_empty()
                .extend(["v4", "spreadsheets", self.config.sheet_id.as_str()])
                .extend(tail);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StorageError> {
        let token = self.auth.access_token(&self.http).await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.auth.invalidate().await;
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }

    /// Fetch spreadsheet metadata; succeeds only when the sheet is reachable
    async fn fetch_spreadsheet_metadata(&self) -> Result<(), StorageError> {
        let mut url = self.spreadsheet_url(&[])?;
        url.query_pairs_mut().append_pair("fields", "spreadsheetId");
        self.send(self.http.get(url)).await?;
        Ok(())
    }

    async fn get_values(&self, cells: &str) -> Result<ValueRange, StorageError> {
        let url = self.values_url(&self.range(cells), None)?;
        self.send(self.http.get(url))
            .await?
            .json::<ValueRange>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl ReadingStore for SheetsStore {
    fn backend(&self) -> &'static str {
        "google-sheets"
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        let header_cells = "A1:D1";
        let existing = self.get_values(header_cells).await?;
        if existing.values.first().is_some_and(|row| !row.is_empty()) {
            debug!("Sheet header already present");
            return Ok(());
        }

        let url = self.values_url(&self.range(header_cells), None)?;
        let body = json!({ "values": [rows::HEADER] });
        self.send(
            self.http
                .put(url)
                .query(&[("valueInputOption", "RAW")])
                .json(&body),
        )
        .await?;

        info!("Google Sheet initialized with headers");
        Ok(())
    }

    async fn append(&self, reading: &Reading) -> Result<(), StorageError> {
        let url = self.values_url(&self.range("A:D"), Some("append"))?;
        let body = json!({ "values": [rows::to_row(reading, &self.offset)] });

        self.send(
            self.http
                .post(url)
                .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
                .json(&body),
        )
        .await
        .inspect_err(|e| error!("Error saving reading to Google Sheets: {}", e))?;

        debug!("Reading appended to Google Sheets");
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Reading>, StorageError> {
        let range = self
            .get_values("A:D")
            .await
            .inspect_err(|e| error!("Error fetching from Google Sheets: {}", e))?;

        let readings = rows::readings_from_rows(&range.values, limit, &self.offset);
        debug!("Fetched {} readings from Google Sheets", readings.len());
        Ok(readings)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let url = self.values_url(&self.range("A2:D"), Some("clear"))?;
        self.send(self.http.post(url).json(&json!({}))).await?;

        info!("Google Sheets data cleared (headers preserved)");
        Ok(())
    }

    async fn connection_status(&self) -> ConnectionStatus {
        let sheet_id = Some(self.config.sheet_id.clone());

        if let Err(e) = self.auth.access_token(&self.http).await {
            warn!("Google Sheets authentication failed: {}", e);
            return ConnectionStatus::failed(sheet_id, e.to_string());
        }

        match self.fetch_spreadsheet_metadata().await {
            Ok(_) => ConnectionStatus::connected(sheet_id),
            Err(e) => ConnectionStatus::failed(sheet_id, e.to_string()),
        }
    }
}

/// Map a failed Sheets API response to a storage error
fn classify_failure(status: StatusCode, body: &str) -> StorageError {
    match status {
        StatusCode::FORBIDDEN => StorageError::AccessDenied(
            "share the sheet with the service account email and grant Editor access".to_string(),
        ),
        StatusCode::NOT_FOUND => {
            StorageError::NotFound("sheet not found, check the configured sheet ID".to_string())
        }
        StatusCode::UNAUTHORIZED => StorageError::Auth(body.to_string()),
        _ if body.contains("PERMISSION_DENIED") => StorageError::AccessDenied(
            "sheet not shared with the service account".to_string(),
        ),
        _ => StorageError::Unavailable(format!("Sheets API returned {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_key_newlines_unescaped() {
        let config = SheetsConfig::new("id", "svc@example.com", "-----BEGIN\\nabc\\n-----END");
        assert_eq!(config.private_key, "-----BEGIN\nabc\n-----END");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = SheetsConfig::new("id", "svc@example.com", "secret-material");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret-material"));
        assert!(printed.contains("<15 bytes>"));
    }

    #[test]
    fn test_offset_bounds() {
        let mut config = SheetsConfig::new("id", "svc@example.com", "key");
        assert_eq!(config.offset().unwrap().local_minus_utc(), 330 * 60);

        config.utc_offset_minutes = 24 * 60;
        assert!(matches!(config.offset(), Err(StorageError::InvalidConfig(_))));
    }

    #[test]
    fn test_new_rejects_bad_key() {
        let config = SheetsConfig::new("id", "svc@example.com", "key");
        assert!(matches!(SheetsStore::new(config), Err(StorageError::Auth(_))));
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(StatusCode::FORBIDDEN, ""),
            StorageError::AccessDenied(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::NOT_FOUND, ""),
            StorageError::NotFound(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "{\"status\":\"PERMISSION_DENIED\"}"),
            StorageError::AccessDenied(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            StorageError::Unavailable(_)
        ));
    }

    #[test]
    fn test_value_range_without_values() {
        let range: ValueRange = serde_json::from_str(r#"{"range":"Sheet1!A1:D1"}"#).unwrap();
        assert!(range.values.is_empty());
    }
}
