use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Dataset, Schema};
use super::errors::StoreError;

/// Which backend actually served an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendUsed {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "gsheets")]
    Remote,
}

impl BackendUsed {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendUsed::Local => "local",
            BackendUsed::Remote => "gsheets",
        }
    }
}

impl fmt::Display for BackendUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A place the whole dataset can be loaded from and saved to
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Read every stored reading, oldest first
    async fn load(&self) -> Result<Dataset, StoreError>;

    /// Replace the stored content with `dataset`, header included
    async fn save(&self, dataset: &Dataset) -> Result<(), StoreError>;

    /// Identity reported back to callers
    fn backend(&self) -> BackendUsed;

    /// Column layout written by this store
    fn schema(&self) -> Schema;

    /// Load, add `incoming`, sort by timestamp, save; returns the saved dataset
    async fn append(&self, incoming: &Dataset) -> Result<Dataset, StoreError> {
        let mut dataset = self.load().await?;
        for reading in incoming.iter() {
            dataset.push(reading.clone());
        }
        dataset.sort_by_timestamp();
        self.save(&dataset).await?;
        Ok(dataset)
    }

    /// Load, union with `incoming` without duplicates, save
    async fn merge(&self, incoming: &Dataset) -> Result<Dataset, StoreError> {
        let mut existing = self.load().await?;
        // Stored derived values may be stale; compare rows as they will be written
        existing.recompute_derived();
        let mut incoming = incoming.clone();
        incoming.recompute_derived();

        let merged = existing.merge(&incoming);
        self.save(&merged).await?;
        Ok(merged)
    }

    /// Remove every reading, keeping the header row
    async fn clear(&self) -> Result<(), StoreError> {
        self.save(&Dataset::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!(BackendUsed::Local.to_string(), "local");
        assert_eq!(BackendUsed::Remote.to_string(), "gsheets");
        assert_eq!(serde_json::to_string(&BackendUsed::Remote).unwrap(), "\"gsheets\"");
    }
}
