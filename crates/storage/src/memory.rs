//! In-Memory Store

use crate::{ConnectionStatus, ReadingStore, StorageError};
use async_trait::async_trait;
use data_validator::Reading;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Default number of readings kept before the oldest are evicted
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded reading buffer, for local runs and tests
pub struct MemoryStore {
    readings: Mutex<VecDeque<Reading>>,
    capacity: usize,
}

impl MemoryStore {
    /// Create a store that retains at most `capacity` readings
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        info!("Creating in-memory reading store (capacity {})", capacity);
        Self {
            readings: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity,
        }
    }

    /// Number of readings currently held
    pub fn len(&self) -> usize {
        self.readings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<Reading>>, StorageError> {
        self.readings
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn append(&self, reading: &Reading) -> Result<(), StorageError> {
        let mut readings = self.lock()?;

        // Enforce retention
        while readings.len() >= self.capacity {
            readings.pop_front();
        }

        readings.push_back(reading.clone());
        debug!("Stored reading ({} held)", readings.len());
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Reading>, StorageError> {
        let readings = self.lock()?;
        Ok(readings.iter().rev().take(limit).cloned().collect())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.lock()?.clear();
        info!("In-memory reading store cleared");
        Ok(())
    }

    async fn connection_status(&self) -> ConnectionStatus {
        match self.lock() {
            Ok(_) => ConnectionStatus::connected(None),
            Err(e) => ConnectionStatus::failed(None, e.to_string()),
        }
    }
}
