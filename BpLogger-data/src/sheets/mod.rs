//! Minimal spreadsheet access used by the remote dataset store.
//!
//! The store only needs a handful of calls: open or create a spreadsheet,
//! find or add a worksheet, and read, clear, resize and write cell values.
//! [`SpreadsheetClient`] captures exactly those so the store can run against
//! Google Sheets in production and an in-memory workbook in tests.

use async_trait::async_trait;

use crate::repository::StoreError;

#[cfg(feature = "gsheets")]
pub mod auth;
#[cfg(feature = "gsheets")]
pub mod google;
#[cfg(any(test, feature = "mock"))]
pub mod memory;

#[cfg(feature = "gsheets")]
pub use auth::ServiceAccountAuth;
#[cfg(feature = "gsheets")]
pub use google::GoogleSheetsClient;
#[cfg(any(test, feature = "mock"))]
pub use memory::InMemorySheets;

/// Title given to spreadsheets created on first use
pub const CREATED_SPREADSHEET_TITLE: &str = "Blood Pressure Logger Data";

/// Grid size of a newly added worksheet
pub const NEW_WORKSHEET_ROWS: u32 = 1000;
pub const NEW_WORKSHEET_COLUMNS: u32 = 20;

/// A worksheet inside a spreadsheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetInfo {
    /// Numeric id used by structural updates
    pub sheet_id: i64,
    pub title: String,
    pub row_count: u32,
    pub column_count: u32,
}

/// A spreadsheet and its worksheets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetInfo {
    pub spreadsheet_id: String,
    pub title: String,
    pub worksheets: Vec<WorksheetInfo>,
}

impl SpreadsheetInfo {
    pub fn worksheet(&self, title: &str) -> Option<&WorksheetInfo> {
        self.worksheets.iter().find(|w| w.title == title)
    }
}

/// The spreadsheet calls the remote store is built on
#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    /// Look up a spreadsheet by key
    async fn open(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, StoreError>;

    /// Create a new spreadsheet owned by the service account
    async fn create(&self, title: &str) -> Result<SpreadsheetInfo, StoreError>;

    /// Add a worksheet with the given grid size
    async fn add_worksheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<WorksheetInfo, StoreError>;

    /// Every non-empty row of a worksheet, header included
    async fn read_values(&self, spreadsheet_id: &str, worksheet: &str) -> Result<Vec<Vec<String>>, StoreError>;

    /// Remove every cell value from a worksheet
    async fn clear_values(&self, spreadsheet_id: &str, worksheet: &str) -> Result<(), StoreError>;

    /// Change the grid size of a worksheet
    async fn resize(&self, spreadsheet_id: &str, sheet_id: i64, rows: u32, columns: u32) -> Result<(), StoreError>;

    /// Write rows starting at A1, values taken literally
    async fn write_values(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StoreError>;
}

/// Spreadsheet key from either a bare key or a full spreadsheet URL
pub fn spreadsheet_key(reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    if let Some(start) = reference.find("/spreadsheets/d/") {
        let rest = &reference[start + "/spreadsheets/d/".len()..];
        let key: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        return if key.is_empty() { None } else { Some(key) };
    }

    if reference.contains("://") {
        return None;
    }

    Some(reference.to_string())
}
