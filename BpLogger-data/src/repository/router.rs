use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::StoreConfig;
use crate::models::{Dataset, Reading, Schema};
use super::errors::StoreError;
use super::local::LocalCsvStore;
use super::store::{BackendUsed, DatasetStore};

/// Outcome of a routed operation
#[derive(Debug, Clone, PartialEq)]
pub struct Persisted<T> {
    pub value: T,
    /// Backend that actually served the operation
    pub backend: BackendUsed,
    /// Fallback notices the user should see
    pub warnings: Vec<String>,
}

impl<T> Persisted<T> {
    pub fn new(value: T, backend: BackendUsed) -> Self {
        Self {
            value,
            backend,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Persisted<U> {
        Persisted {
            value: f(self.value),
            backend: self.backend,
            warnings: self.warnings,
        }
    }
}

/// Where data goes, for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub backend: BackendUsed,
    pub csv_path: String,
    pub worksheet: Option<String>,
    pub spreadsheet: Option<String>,
}

/// Persistence operations the reading service is built on
#[async_trait]
pub trait ReadingRepositoryTrait: Send + Sync {
    /// Backend used when nothing fails
    fn select_backend(&self) -> BackendUsed;

    fn status(&self) -> BackendStatus;

    /// Column layout used for stored and exported data
    fn schema(&self) -> Schema;

    /// Remote when enabled, local on any remote failure
    async fn load_with_fallback(&self) -> Result<Persisted<Dataset>, StoreError>;

    /// Preferred backend first, local on any remote failure
    async fn save_with_fallback(&self, dataset: &Dataset, preferred: BackendUsed) -> Result<Persisted<()>, StoreError>;

    /// Load, add one reading, sort, save
    async fn append(&self, reading: Reading, preferred: BackendUsed) -> Result<Persisted<Dataset>, StoreError> {
        let loaded = self.load_with_fallback().await?;
        let mut warnings = loaded.warnings;
        let preferred = downgrade_after_fallback(preferred, loaded.backend);

        let mut dataset = loaded.value;
        dataset.push(reading);
        dataset.sort_by_timestamp();

        let saved = self.save_with_fallback(&dataset, preferred).await?;
        warnings.extend(saved.warnings);
        Ok(Persisted {
            value: dataset,
            backend: saved.backend,
            warnings,
        })
    }

    /// Union with `incoming` without exact duplicates, saved to the selected backend
    async fn merge(&self, incoming: &Dataset) -> Result<Persisted<Dataset>, StoreError> {
        let loaded = self.load_with_fallback().await?;
        let mut warnings = loaded.warnings;
        let preferred = downgrade_after_fallback(self.select_backend(), loaded.backend);

        let mut existing = loaded.value;
        existing.recompute_derived();
        let mut incoming = incoming.clone();
        incoming.recompute_derived();
        let merged = existing.merge(&incoming);

        let saved = self.save_with_fallback(&merged, preferred).await?;
        warnings.extend(saved.warnings);
        Ok(Persisted {
            value: merged,
            backend: saved.backend,
            warnings,
        })
    }

    /// Replace everything with an empty dataset on the selected backend
    async fn clear(&self) -> Result<Persisted<()>, StoreError> {
        self.save_with_fallback(&Dataset::new(), self.select_backend()).await
    }
}

/// A dataset read from the local copy must not be written over the remote one
fn downgrade_after_fallback(preferred: BackendUsed, loaded_from: BackendUsed) -> BackendUsed {
    if preferred == BackendUsed::Remote && loaded_from == BackendUsed::Local {
        BackendUsed::Local
    } else {
        preferred
    }
}

/// Chooses between the spreadsheet and the local file, falling back to the file
#[derive(Clone)]
pub struct BackendRouter {
    local: Arc<dyn DatasetStore>,
    remote: Option<Arc<dyn DatasetStore>>,
    schema: Schema,
    csv_path: String,
    worksheet: Option<String>,
    spreadsheet: Option<String>,
}

impl std::fmt::Debug for BackendRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRouter")
            .field("csv_path", &self.csv_path)
            .field("remote", &self.remote.is_some())
            .field("worksheet", &self.worksheet)
            .finish()
    }
}

impl BackendRouter {
    /// Router over explicit stores
    pub fn new(local: Arc<dyn DatasetStore>, remote: Option<Arc<dyn DatasetStore>>) -> Self {
        Self {
            schema: local.schema(),
            local,
            remote,
            csv_path: String::new(),
            worksheet: None,
            spreadsheet: None,
        }
    }

    /// Build both stores from configuration
    pub fn from_config(config: &StoreConfig) -> Self {
        let local: Arc<dyn DatasetStore> = Arc::new(
            LocalCsvStore::new(&config.csv_path, config.schema()).with_recompute_on_load(config.recompute_on_load),
        );
        let remote = remote_store(config);

        if remote.is_some() {
            info!("Google Sheets enabled, worksheet '{}'", config.worksheet);
        } else {
            info!("Using local CSV at {}", config.csv_path.display());
        }

        Self {
            local,
            schema: config.schema(),
            csv_path: config.csv_path.display().to_string(),
            worksheet: remote.as_ref().map(|_| config.worksheet.clone()),
            spreadsheet: remote.as_ref().and_then(|_| config.spreadsheet.clone()),
            remote,
        }
    }

    async fn save_local(&self, dataset: &Dataset) -> Result<(), StoreError> {
        self.local.save(dataset).await.map_err(|e| {
            error!("Local save failed: {}", e);
            e
        })
    }
}

#[cfg(feature = "gsheets")]
fn remote_store(config: &StoreConfig) -> Option<Arc<dyn DatasetStore>> {
    use super::spreadsheet::RemoteSpreadsheetStore;
    use crate::sheets::{auth::credentials_usable, GoogleSheetsClient};

    let key = config.service_account.as_ref()?;
    if !credentials_usable(key) {
        warn!("Service account credential is incomplete, Google Sheets disabled");
        return None;
    }

    match GoogleSheetsClient::new(key.clone()) {
        Ok(client) => Some(Arc::new(
            RemoteSpreadsheetStore::new(
                Arc::new(client),
                config.spreadsheet.clone(),
                config.worksheet.clone(),
                config.schema(),
            )
            .with_recompute_on_load(config.recompute_on_load),
        )),
        Err(e) => {
            warn!("Google Sheets disabled: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "gsheets"))]
fn remote_store(config: &StoreConfig) -> Option<Arc<dyn DatasetStore>> {
    if config.service_account.is_some() {
        warn!("Service account configured but Google Sheets support is not compiled in");
    }
    None
}

#[async_trait]
impl ReadingRepositoryTrait for BackendRouter {
    fn select_backend(&self) -> BackendUsed {
        if self.remote.is_some() {
            BackendUsed::Remote
        } else {
            BackendUsed::Local
        }
    }

    fn status(&self) -> BackendStatus {
        BackendStatus {
            backend: self.select_backend(),
            csv_path: self.csv_path.clone(),
            worksheet: self.worksheet.clone(),
            spreadsheet: self.spreadsheet.clone(),
        }
    }

    fn schema(&self) -> Schema {
        self.schema
    }

    async fn load_with_fallback(&self) -> Result<Persisted<Dataset>, StoreError> {
        if let Some(remote) = &self.remote {
            debug!("Loading readings from Google Sheets");
            match remote.load().await {
                Ok(dataset) => return Ok(Persisted::new(dataset, BackendUsed::Remote)),
                Err(e) => {
                    let message = format!("Google Sheets read issue: {}. Falling back to local CSV.", e);
                    warn!("{}", message);
                    let dataset = self.local.load().await?;
                    return Ok(Persisted {
                        value: dataset,
                        backend: BackendUsed::Local,
                        warnings: vec![message],
                    });
                }
            }
        }

        debug!("Loading readings from local CSV");
        Ok(Persisted::new(self.local.load().await?, BackendUsed::Local))
    }

    async fn save_with_fallback(&self, dataset: &Dataset, preferred: BackendUsed) -> Result<Persisted<()>, StoreError> {
        if preferred == BackendUsed::Remote {
            if let Some(remote) = &self.remote {
                match remote.save(dataset).await {
                    Ok(()) => return Ok(Persisted::new((), BackendUsed::Remote)),
                    Err(e) => {
                        error!("{}", e);
                        self.save_local(dataset).await?;
                        return Ok(Persisted {
                            value: (),
                            backend: BackendUsed::Local,
                            warnings: vec![e.to_string(), "Saved locally instead.".to_string()],
                        });
                    }
                }
            }
        }

        self.save_local(dataset).await?;
        Ok(Persisted::new((), BackendUsed::Local))
    }
}

/// In-memory stores for exercising the router and the services
#[cfg(any(test, feature = "mock"))]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Dataset store kept in memory, with switchable failures
    #[derive(Debug)]
    pub struct MemoryStore {
        dataset: Mutex<Dataset>,
        backend: BackendUsed,
        fail_load: AtomicBool,
        fail_save: AtomicBool,
    }

    impl MemoryStore {
        pub fn new(backend: BackendUsed) -> Self {
            Self {
                dataset: Mutex::new(Dataset::new()),
                backend,
                fail_load: AtomicBool::new(false),
                fail_save: AtomicBool::new(false),
            }
        }

        pub fn with_readings(self, readings: Vec<Reading>) -> Self {
            *self.lock() = Dataset::from_readings(readings);
            self
        }

        pub fn with_load_failure(self) -> Self {
            self.fail_load.store(true, Ordering::SeqCst);
            self
        }

        pub fn with_save_failure(self) -> Self {
            self.fail_save.store(true, Ordering::SeqCst);
            self
        }

        /// What a subsequent load would return
        pub fn snapshot(&self) -> Dataset {
            self.lock().clone()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, Dataset> {
            self.dataset.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    #[async_trait]
    impl DatasetStore for MemoryStore {
        async fn load(&self) -> Result<Dataset, StoreError> {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(match self.backend {
                    BackendUsed::Remote => StoreError::read("simulated outage"),
                    BackendUsed::Local => StoreError::LocalIo {
                        path: "memory".into(),
                        source: std::io::Error::new(std::io::ErrorKind::Other, "simulated outage"),
                    },
                });
            }
            Ok(self.snapshot())
        }

        async fn save(&self, dataset: &Dataset) -> Result<(), StoreError> {
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(match self.backend {
                    BackendUsed::Remote => StoreError::write("simulated outage"),
                    BackendUsed::Local => StoreError::LocalIo {
                        path: "memory".into(),
                        source: std::io::Error::new(std::io::ErrorKind::Other, "simulated outage"),
                    },
                });
            }
            let mut dataset = dataset.clone();
            dataset.recompute_derived();
            dataset.sort_by_timestamp();
            *self.lock() = dataset;
            Ok(())
        }

        fn backend(&self) -> BackendUsed {
            self.backend
        }

        fn schema(&self) -> Schema {
            Schema::default()
        }
    }

    /// Router over a local and an optional remote in-memory store
    pub fn memory_router(local: Arc<MemoryStore>, remote: Option<Arc<MemoryStore>>) -> BackendRouter {
        BackendRouter::new(local, remote.map(|r| r as Arc<dyn DatasetStore>))
    }

    #[cfg(test)]
    mod router_tests {
        use super::*;
        use crate::models::TIMESTAMP_FORMAT;
        use chrono::NaiveDateTime;

        fn reading(raw_ts: &str, systolic: i32, diastolic: i32) -> Reading {
            let ts = NaiveDateTime::parse_from_str(raw_ts, TIMESTAMP_FORMAT).unwrap();
            Reading::new(ts, systolic, diastolic, Some(70), "")
        }

        #[tokio::test]
        async fn test_select_backend() {
            let local = Arc::new(MemoryStore::new(BackendUsed::Local));
            assert_eq!(memory_router(local.clone(), None).select_backend(), BackendUsed::Local);

            let remote = Arc::new(MemoryStore::new(BackendUsed::Remote));
            assert_eq!(memory_router(local, Some(remote)).select_backend(), BackendUsed::Remote);
        }

        #[tokio::test]
        async fn test_remote_save_failure_lands_locally() {
            let local = Arc::new(MemoryStore::new(BackendUsed::Local));
            let remote = Arc::new(MemoryStore::new(BackendUsed::Remote).with_save_failure());
            let router = memory_router(local.clone(), Some(remote.clone()));

            let result = router
                .append(reading("2024-03-01 08:00:00", 120, 80), BackendUsed::Remote)
                .await
                .unwrap();

            assert_eq!(result.backend, BackendUsed::Local);
            assert_eq!(result.backend.to_string(), "local");
            assert!(result.warnings.iter().any(|w| w.contains("Write to Google Sheets failed")));
            assert_eq!(local.snapshot().len(), 1);
            assert!(remote.snapshot().is_empty());
        }

        #[tokio::test]
        async fn test_remote_load_failure_reads_local() {
            let local = Arc::new(
                MemoryStore::new(BackendUsed::Local).with_readings(vec![reading("2024-03-01 08:00:00", 120, 80)]),
            );
            let remote = Arc::new(MemoryStore::new(BackendUsed::Remote).with_load_failure());
            let router = memory_router(local, Some(remote));

            let loaded = router.load_with_fallback().await.unwrap();
            assert_eq!(loaded.backend, BackendUsed::Local);
            assert_eq!(loaded.value.len(), 1);
            assert_eq!(loaded.warnings.len(), 1);
        }

        #[tokio::test]
        async fn test_append_after_read_fallback_does_not_overwrite_remote() {
            let local = Arc::new(MemoryStore::new(BackendUsed::Local));
            let remote = Arc::new(
                MemoryStore::new(BackendUsed::Remote)
                    .with_readings(vec![reading("2024-02-01 08:00:00", 150, 95)])
                    .with_load_failure(),
            );
            let router = memory_router(local.clone(), Some(remote.clone()));

            let result = router
                .append(reading("2024-03-01 08:00:00", 120, 80), BackendUsed::Remote)
                .await
                .unwrap();

            assert_eq!(result.backend, BackendUsed::Local);
            assert_eq!(remote.snapshot().len(), 1);
            assert_eq!(remote.snapshot().readings()[0].systolic, 150);
        }

        #[tokio::test]
        async fn test_append_keeps_ascending_order() {
            let local = Arc::new(MemoryStore::new(BackendUsed::Local));
            let router = memory_router(local.clone(), None);

            router.append(reading("2024-03-03 08:00:00", 120, 80), BackendUsed::Local).await.unwrap();
            router.append(reading("2024-03-01 08:00:00", 121, 80), BackendUsed::Local).await.unwrap();
            let result = router.append(reading("2024-03-02 08:00:00", 122, 80), BackendUsed::Local).await.unwrap();

            let systolics: Vec<i32> = result.value.iter().map(|r| r.systolic).collect();
            assert_eq!(systolics, vec![121, 122, 120]);
        }

        #[tokio::test]
        async fn test_merge_and_clear_use_selected_backend() {
            let local = Arc::new(MemoryStore::new(BackendUsed::Local));
            let remote = Arc::new(MemoryStore::new(BackendUsed::Remote));
            let router = memory_router(local.clone(), Some(remote.clone()));

            let incoming = Dataset::from_readings(vec![
                reading("2024-03-01 08:00:00", 120, 80),
                reading("2024-03-01 08:00:00", 120, 80),
            ]);
            let merged = router.merge(&incoming).await.unwrap();
            assert_eq!(merged.backend, BackendUsed::Remote);
            assert_eq!(merged.value.len(), 1);
            assert_eq!(remote.snapshot().len(), 1);

            let cleared = router.clear().await.unwrap();
            assert_eq!(cleared.backend, BackendUsed::Remote);
            assert!(remote.snapshot().is_empty());
            assert!(local.snapshot().is_empty());
        }

        #[tokio::test]
        async fn test_local_failure_is_hard() {
            let local = Arc::new(MemoryStore::new(BackendUsed::Local).with_save_failure());
            let router = memory_router(local, None);
            assert!(matches!(
                router.clear().await,
                Err(StoreError::LocalIo { .. })
            ));
        }
    }
}
