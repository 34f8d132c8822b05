use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{SpreadsheetClient, SpreadsheetInfo, WorksheetInfo};
use crate::repository::StoreError;

#[derive(Debug, Clone)]
struct Sheet {
    info: WorksheetInfo,
    values: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
struct Workbook {
    title: String,
    sheets: Vec<Sheet>,
}

/// In-memory stand-in for Google Sheets
#[derive(Debug, Default)]
pub struct InMemorySheets {
    workbooks: Mutex<HashMap<String, Workbook>>,
    created: AtomicUsize,
    fail_open: AtomicBool,
    fail_read: AtomicBool,
    fail_write: AtomicBool,
}

impl InMemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create an empty spreadsheet with the given key
    pub fn with_spreadsheet(self, spreadsheet_id: &str) -> Self {
        self.lock().insert(
            spreadsheet_id.to_string(),
            Workbook {
                title: spreadsheet_id.to_string(),
                sheets: Vec::new(),
            },
        );
        self
    }

    /// Make every open/create call fail
    pub fn with_open_failure(self) -> Self {
        self.fail_open.store(true, Ordering::SeqCst);
        self
    }

    /// Make every value read fail
    pub fn with_read_failure(self) -> Self {
        self.fail_read.store(true, Ordering::SeqCst);
        self
    }

    /// Make every clear/resize/write fail
    pub fn with_write_failure(self) -> Self {
        self.fail_write.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_write_failure(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }

    /// Number of spreadsheets created through the client
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Snapshot of a worksheet's values
    pub fn values(&self, spreadsheet_id: &str, worksheet: &str) -> Option<Vec<Vec<String>>> {
        self.lock()
            .get(spreadsheet_id)
            .and_then(|book| book.sheets.iter().find(|s| s.info.title == worksheet))
            .map(|sheet| sheet.values.clone())
    }

    /// Grid size of a worksheet
    pub fn grid(&self, spreadsheet_id: &str, worksheet: &str) -> Option<(u32, u32)> {
        self.lock()
            .get(spreadsheet_id)
            .and_then(|book| book.sheets.iter().find(|s| s.info.title == worksheet))
            .map(|sheet| (sheet.info.row_count, sheet.info.column_count))
    }

    /// Overwrite a worksheet's values directly
    pub fn put_values(&self, spreadsheet_id: &str, worksheet: &str, values: Vec<Vec<String>>) {
        let mut books = self.lock();
        let book = books.entry(spreadsheet_id.to_string()).or_insert_with(|| Workbook {
            title: spreadsheet_id.to_string(),
            sheets: Vec::new(),
        });
        let next_id = book.sheets.len() as i64;
        match book.sheets.iter_mut().find(|s| s.info.title == worksheet) {
            Some(sheet) => sheet.values = values,
            None => book.sheets.push(Sheet {
                info: WorksheetInfo {
                    sheet_id: next_id,
                    title: worksheet.to_string(),
                    row_count: values.len().max(1) as u32,
                    column_count: 20,
                },
                values,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Workbook>> {
        // A poisoned lock only means another test thread panicked
        self.workbooks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn info(id: &str, book: &Workbook) -> SpreadsheetInfo {
        SpreadsheetInfo {
            spreadsheet_id: id.to_string(),
            title: book.title.clone(),
            worksheets: book.sheets.iter().map(|s| s.info.clone()).collect(),
        }
    }

    fn check(flag: &AtomicBool, error: impl FnOnce() -> StoreError) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(error())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SpreadsheetClient for InMemorySheets {
    async fn open(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, StoreError> {
        Self::check(&self.fail_open, || StoreError::Open("simulated outage".into()))?;
        self.lock()
            .get(spreadsheet_id)
            .map(|book| Self::info(spreadsheet_id, book))
            .ok_or_else(|| StoreError::Open(format!("spreadsheet {} not found", spreadsheet_id)))
    }

    async fn create(&self, title: &str) -> Result<SpreadsheetInfo, StoreError> {
        Self::check(&self.fail_open, || StoreError::Open("simulated outage".into()))?;
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("created-{}", n);
        let book = Workbook {
            title: title.to_string(),
            sheets: Vec::new(),
        };
        let info = Self::info(&id, &book);
        self.lock().insert(id, book);
        Ok(info)
    }

    async fn add_worksheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<WorksheetInfo, StoreError> {
        Self::check(&self.fail_open, || StoreError::Open("simulated outage".into()))?;
        let mut books = self.lock();
        let book = books
            .get_mut(spreadsheet_id)
            .ok_or_else(|| StoreError::Open(format!("spreadsheet {} not found", spreadsheet_id)))?;
        let info = WorksheetInfo {
            sheet_id: book.sheets.len() as i64 + 1,
            title: title.to_string(),
            row_count: rows,
            column_count: columns,
        };
        book.sheets.push(Sheet {
            info: info.clone(),
            values: Vec::new(),
        });
        Ok(info)
    }

    async fn read_values(&self, spreadsheet_id: &str, worksheet: &str) -> Result<Vec<Vec<String>>, StoreError> {
        Self::check(&self.fail_read, || StoreError::read("simulated outage"))?;
        self.values(spreadsheet_id, worksheet)
            .ok_or_else(|| StoreError::read(format!("worksheet {} not found", worksheet)))
    }

    async fn clear_values(&self, spreadsheet_id: &str, worksheet: &str) -> Result<(), StoreError> {
        Self::check(&self.fail_write, || StoreError::write("simulated outage"))?;
        let mut books = self.lock();
        let sheet = books
            .get_mut(spreadsheet_id)
            .and_then(|book| book.sheets.iter_mut().find(|s| s.info.title == worksheet))
            .ok_or_else(|| StoreError::write(format!("worksheet {} not found", worksheet)))?;
        sheet.values.clear();
        Ok(())
    }

    async fn resize(&self, spreadsheet_id: &str, sheet_id: i64, rows: u32, columns: u32) -> Result<(), StoreError> {
        Self::check(&self.fail_write, || StoreError::write("simulated outage"))?;
        let mut books = self.lock();
        let sheet = books
            .get_mut(spreadsheet_id)
            .and_then(|book| book.sheets.iter_mut().find(|s| s.info.sheet_id == sheet_id))
            .ok_or_else(|| StoreError::write(format!("sheet {} not found", sheet_id)))?;
        sheet.info.row_count = rows;
        sheet.info.column_count = columns;
        Ok(())
    }

    async fn write_values(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StoreError> {
        Self::check(&self.fail_write, || StoreError::write("simulated outage"))?;
        let mut books = self.lock();
        let sheet = books
            .get_mut(spreadsheet_id)
            .and_then(|book| book.sheets.iter_mut().find(|s| s.info.title == worksheet))
            .ok_or_else(|| StoreError::write(format!("worksheet {} not found", worksheet)))?;
        if rows.len() as u32 > sheet.info.row_count {
            return Err(StoreError::write("exceeds grid limits"));
        }
        sheet.values = rows.to_vec();
        Ok(())
    }
}
