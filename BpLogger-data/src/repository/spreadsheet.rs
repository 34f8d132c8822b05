use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::{Dataset, Schema};
use crate::sheets::{
    spreadsheet_key, SpreadsheetClient, SpreadsheetInfo, WorksheetInfo, CREATED_SPREADSHEET_TITLE,
    NEW_WORKSHEET_COLUMNS, NEW_WORKSHEET_ROWS,
};
use super::codec::{decode_table, encode_table, DecodeOptions, Table};
use super::errors::StoreError;
use super::store::{BackendUsed, DatasetStore};

/// Dataset store backed by one worksheet of a spreadsheet
pub struct RemoteSpreadsheetStore<C: SpreadsheetClient> {
    client: Arc<C>,
    /// Configured URL or key; `None` creates a spreadsheet on first use
    spreadsheet: Option<String>,
    worksheet: String,
    schema: Schema,
    recompute_on_load: bool,
    /// Key of the spreadsheet once opened or created
    resolved: Mutex<Option<String>>,
}

impl<C: SpreadsheetClient> RemoteSpreadsheetStore<C> {
    pub fn new(client: Arc<C>, spreadsheet: Option<String>, worksheet: impl Into<String>, schema: Schema) -> Self {
        Self {
            client,
            spreadsheet,
            worksheet: worksheet.into(),
            schema,
            recompute_on_load: false,
            resolved: Mutex::new(None),
        }
    }

    pub fn with_recompute_on_load(mut self, recompute: bool) -> Self {
        self.recompute_on_load = recompute;
        self
    }

    /// Key of the spreadsheet in use, if it has been resolved yet
    pub async fn spreadsheet_id(&self) -> Option<String> {
        self.resolved.lock().await.clone()
    }

    async fn resolve_spreadsheet(&self) -> Result<SpreadsheetInfo, StoreError> {
        let mut resolved = self.resolved.lock().await;
        if let Some(id) = resolved.as_ref() {
            return self.client.open(id).await;
        }

        let info = match self.spreadsheet.as_deref() {
            Some(reference) => {
                let key = spreadsheet_key(reference)
                    .ok_or_else(|| StoreError::Open(format!("'{}' is not a spreadsheet URL or key", reference)))?;
                self.client.open(&key).await?
            }
            None => {
                let info = self.client.create(CREATED_SPREADSHEET_TITLE).await?;
                info!(
                    "Created spreadsheet '{}' with key {}; set BP_SPREADSHEET to reuse it",
                    CREATED_SPREADSHEET_TITLE, info.spreadsheet_id
                );
                info
            }
        };

        *resolved = Some(info.spreadsheet_id.clone());
        Ok(info)
    }

    /// Spreadsheet key and worksheet, adding the worksheet with a header when absent
    async fn ensure_worksheet(&self) -> Result<(String, WorksheetInfo), StoreError> {
        let info = self.resolve_spreadsheet().await?;
        if let Some(worksheet) = info.worksheet(&self.worksheet) {
            return Ok((info.spreadsheet_id.clone(), worksheet.clone()));
        }

        debug!("Worksheet '{}' missing, adding it", self.worksheet);
        let worksheet = self
            .client
            .add_worksheet(&info.spreadsheet_id, &self.worksheet, NEW_WORKSHEET_ROWS, NEW_WORKSHEET_COLUMNS)
            .await?;
        self.client
            .write_values(&info.spreadsheet_id, &self.worksheet, &[self.schema.header()])
            .await?;
        Ok((info.spreadsheet_id, worksheet))
    }
}

#[async_trait]
impl<C: SpreadsheetClient + 'static> DatasetStore for RemoteSpreadsheetStore<C> {
    async fn load(&self) -> Result<Dataset, StoreError> {
        let (spreadsheet_id, _) = self.ensure_worksheet().await?;
        let mut values = self.client.read_values(&spreadsheet_id, &self.worksheet).await?;
        if values.is_empty() {
            return Ok(Dataset::new());
        }

        let header = values.remove(0);
        let table = Table { header, rows: values };
        let mut dataset = decode_table(&table, DecodeOptions::load(self.recompute_on_load))?;
        dataset.sort_by_timestamp();

        debug!("Loaded {} readings from worksheet '{}'", dataset.len(), self.worksheet);
        Ok(dataset)
    }

    async fn save(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let mut dataset = dataset.clone();
        dataset.recompute_derived();
        dataset.sort_by_timestamp();

        let table = encode_table(self.schema, &dataset);
        let mut rows = Vec::with_capacity(table.rows.len() + 1);
        rows.push(table.header);
        rows.extend(table.rows);

        let (spreadsheet_id, worksheet) = self.ensure_worksheet().await?;
        self.client.clear_values(&spreadsheet_id, &self.worksheet).await?;
        let columns = worksheet.column_count.max(self.schema.columns().len() as u32);
        self.client
            .resize(&spreadsheet_id, worksheet.sheet_id, rows.len() as u32, columns)
            .await?;
        self.client.write_values(&spreadsheet_id, &self.worksheet, &rows).await?;

        info!("Saved {} readings to worksheet '{}'", dataset.len(), self.worksheet);
        Ok(())
    }

    fn backend(&self) -> BackendUsed {
        BackendUsed::Remote
    }

    fn schema(&self) -> Schema {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Reading, TIMESTAMP_FORMAT};
    use crate::sheets::InMemorySheets;
    use chrono::NaiveDateTime;

    fn reading(raw_ts: &str, systolic: i32, diastolic: i32) -> Reading {
        let ts = NaiveDateTime::parse_from_str(raw_ts, TIMESTAMP_FORMAT).unwrap();
        Reading::new(ts, systolic, diastolic, None, "")
    }

    #[tokio::test]
    async fn test_creates_spreadsheet_once() {
        let client = Arc::new(InMemorySheets::new());
        let store = RemoteSpreadsheetStore::new(client.clone(), None, "bp_data", Schema::default());

        assert!(store.load().await.unwrap().is_empty());
        store
            .save(&Dataset::from_readings(vec![reading("2024-03-01 08:00:00", 120, 80)]))
            .await
            .unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);

        assert_eq!(client.created_count(), 1);
        assert_eq!(store.spreadsheet_id().await.as_deref(), Some("created-1"));
    }

    #[tokio::test]
    async fn test_new_worksheet_gets_header() {
        let client = Arc::new(InMemorySheets::new().with_spreadsheet("1AbC"));
        let store = RemoteSpreadsheetStore::new(
            client.clone(),
            Some("https://docs.google.com/spreadsheets/d/1AbC/edit".into()),
            "bp_data",
            Schema::default(),
        );

        store.load().await.unwrap();
        let values = client.values("1AbC", "bp_data").unwrap();
        assert_eq!(values, vec![Schema::default().header()]);
        assert_eq!(client.grid("1AbC", "bp_data"), Some((1000, 20)));
    }

    #[tokio::test]
    async fn test_save_resizes_to_content() {
        let client = Arc::new(InMemorySheets::new().with_spreadsheet("1AbC"));
        let store = RemoteSpreadsheetStore::new(client.clone(), Some("1AbC".into()), "bp_data", Schema::default());

        let dataset = Dataset::from_readings(vec![
            reading("2024-03-02 08:00:00", 130, 85),
            reading("2024-03-01 08:00:00", 120, 80),
        ]);
        store.save(&dataset).await.unwrap();

        let values = client.values("1AbC", "bp_data").unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[1][0], "2024-03-01 08:00:00");
        assert_eq!(client.grid("1AbC", "bp_data"), Some((3, 20)));

        store.clear().await.unwrap();
        assert_eq!(client.values("1AbC", "bp_data").unwrap(), vec![Schema::default().header()]);
    }

    #[tokio::test]
    async fn test_load_tolerates_trimmed_rows() {
        let client = Arc::new(InMemorySheets::new().with_spreadsheet("1AbC"));
        client.put_values(
            "1AbC",
            "bp_data",
            vec![
                Schema::default().header(),
                vec!["2024-03-01 08:00:00".into(), "120".into(), "80".into()],
            ],
        );
        let store = RemoteSpreadsheetStore::new(client, Some("1AbC".into()), "bp_data", Schema::default());

        let dataset = store.load().await.unwrap();
        assert_eq!(dataset.len(), 1);
        assert!(dataset.readings()[0].has_consistent_derived());
    }

    #[tokio::test]
    async fn test_unknown_spreadsheet_fails_to_open() {
        let client = Arc::new(InMemorySheets::new());
        let store = RemoteSpreadsheetStore::new(client, Some("missing".into()), "bp_data", Schema::default());
        assert!(matches!(store.load().await, Err(StoreError::Open(_))));
    }
}
