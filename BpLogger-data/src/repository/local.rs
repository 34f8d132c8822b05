use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::models::{Dataset, Schema};
use super::codec::{dataset_to_csv, decode_table, read_csv, DecodeOptions};
use super::errors::StoreError;
use super::store::{BackendUsed, DatasetStore};

/// Dataset store backed by a CSV file on disk
#[derive(Debug, Clone)]
pub struct LocalCsvStore {
    path: PathBuf,
    schema: Schema,
    recompute_on_load: bool,
}

impl LocalCsvStore {
    pub fn new(path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self {
            path: path.into(),
            schema,
            recompute_on_load: false,
        }
    }

    /// Always recompute derived columns when loading
    pub fn with_recompute_on_load(mut self, recompute: bool) -> Self {
        self.recompute_on_load = recompute;
        self
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::LocalIo {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl DatasetStore for LocalCsvStore {
    async fn load(&self) -> Result<Dataset, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No local data at {}, starting empty", self.path.display());
                return Ok(Dataset::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Dataset::new());
        }

        let table = read_csv(bytes.as_slice())?;
        let mut dataset = decode_table(&table, DecodeOptions::load(self.recompute_on_load))?;
        dataset.sort_by_timestamp();

        debug!("Loaded {} readings from {}", dataset.len(), self.path.display());
        Ok(dataset)
    }

    async fn save(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let mut dataset = dataset.clone();
        dataset.recompute_derived();
        dataset.sort_by_timestamp();

        let bytes = dataset_to_csv(self.schema, &dataset)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }
        tokio::fs::write(&self.path, bytes).await.map_err(|e| self.io_error(e))?;

        info!("Saved {} readings to {}", dataset.len(), self.path.display());
        Ok(())
    }

    fn backend(&self) -> BackendUsed {
        BackendUsed::Local
    }

    fn schema(&self) -> Schema {
        self.schema
    }
}
