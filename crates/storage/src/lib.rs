//! Storage Layer
//!
//! Persists normalized readings behind the [`ReadingStore`] trait. Two
//! backends ship: a bounded in-memory buffer and a Google Sheets adapter.

mod memory;
pub mod sheets;

pub use memory::MemoryStore;
pub use sheets::{SheetsConfig, SheetsStore};

use async_trait::async_trait;
use data_validator::Reading;
use serde::Serialize;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Google Sheets not configured")]
    NotConfigured,
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

/// Result of probing a store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn connected(sheet_id: Option<String>) -> Self {
        Self {
            connected: true,
            sheet_id,
            error: None,
        }
    }

    pub fn failed(sheet_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            connected: false,
            sheet_id,
            error: Some(error.into()),
        }
    }
}

/// Persistence collaborator for readings
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Short backend name for health output
    fn backend(&self) -> &'static str;

    /// Prepare the backing store (header row, schema)
    async fn initialize(&self) -> Result<(), StorageError>;

    async fn append(&self, reading: &Reading) -> Result<(), StorageError>;

    /// Up to `limit` readings, newest first
    async fn list_recent(&self, limit: usize) -> Result<Vec<Reading>, StorageError>;

    async fn latest(&self) -> Result<Option<Reading>, StorageError> {
        Ok(self.list_recent(1).await?.into_iter().next())
    }

    /// Remove every stored reading
    async fn clear(&self) -> Result<(), StorageError>;

    async fn connection_status(&self) -> ConnectionStatus;
}
