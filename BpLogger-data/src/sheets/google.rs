use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use super::auth::ServiceAccountAuth;
use super::{SpreadsheetClient, SpreadsheetInfo, WorksheetInfo};
use crate::config::ServiceAccountKey;
use crate::repository::errors::RemoteOperation;
use crate::repository::StoreError;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Upper bound for any single Sheets or token call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client shared by the Sheets calls and the token exchange
pub fn http_client() -> Result<Client, StoreError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| StoreError::Auth(format!("could not build HTTP client: {}", e)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetResource {
    spreadsheet_id: String,
    #[serde(default)]
    properties: SpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<SheetResource>,
}

#[derive(Debug, Default, Deserialize)]
struct SpreadsheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetResource {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    grid_properties: GridProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: u32,
    #[serde(default)]
    column_count: u32,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl From<SheetProperties> for WorksheetInfo {
    fn from(p: SheetProperties) -> Self {
        WorksheetInfo {
            sheet_id: p.sheet_id,
            title: p.title,
            row_count: p.grid_properties.row_count,
            column_count: p.grid_properties.column_count,
        }
    }
}

impl From<SpreadsheetResource> for SpreadsheetInfo {
    fn from(r: SpreadsheetResource) -> Self {
        SpreadsheetInfo {
            spreadsheet_id: r.spreadsheet_id,
            title: r.properties.title,
            worksheets: r.sheets.into_iter().map(|s| s.properties.into()).collect(),
        }
    }
}

/// A1 range covering a whole worksheet, quoted for names with spaces
fn sheet_range(worksheet: &str) -> String {
    format!("'{}'", worksheet.replace('\'', "''"))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Which error a failed call maps to
#[derive(Debug, Clone, Copy)]
enum CallKind {
    Open,
    Remote(RemoteOperation),
}

impl CallKind {
    fn error(self, message: String) -> StoreError {
        match self {
            CallKind::Open => StoreError::Open(message),
            CallKind::Remote(operation) => StoreError::RemoteIo { operation, message },
        }
    }
}

/// Google Sheets v4 REST client authenticated as a service account
#[derive(Debug)]
pub struct GoogleSheetsClient {
    http: Client,
    auth: ServiceAccountAuth,
}

impl GoogleSheetsClient {
    pub fn new(key: ServiceAccountKey) -> Result<Self, StoreError> {
        let http = http_client()?;
        let auth = ServiceAccountAuth::new(key, http.clone())?;
        Ok(Self { http, auth })
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, StoreError> {
        let token = self.auth.access_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        builder: RequestBuilder,
        kind: CallKind,
    ) -> Result<T, StoreError> {
        let response = builder.send().await.map_err(|e| {
            error!("Google Sheets request failed: {}", e);
            kind.error(format!("network error: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("Google Sheets returned {}: {}", status, body);
            return Err(kind.error(format!("{} - {}", status, body)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| kind.error(format!("unexpected response: {}", e)))
    }

    async fn batch_update(&self, spreadsheet_id: &str, request: Value, kind: CallKind) -> Result<Value, StoreError> {
        let url = format!("{}/{}:batchUpdate", SHEETS_API, spreadsheet_id);
        let builder = self
            .request(Method::POST, &url)
            .await?
            .json(&json!({ "requests": [request] }));
        self.send(builder, kind).await
    }
}

#[async_trait]
impl SpreadsheetClient for GoogleSheetsClient {
    async fn open(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, StoreError> {
        debug!("Opening spreadsheet {}", spreadsheet_id);
        let url = format!(
            "{}/{}?fields=spreadsheetId,properties.title,sheets.properties",
            SHEETS_API,
            urlencoding::encode(spreadsheet_id)
        );
        let builder = self.request(Method::GET, &url).await?;
        let resource: SpreadsheetResource = self.send(builder, CallKind::Open).await?;
        Ok(resource.into())
    }

    async fn create(&self, title: &str) -> Result<SpreadsheetInfo, StoreError> {
        debug!("Creating spreadsheet '{}'", title);
        let builder = self
            .request(Method::POST, SHEETS_API)
            .await?
            .json(&json!({ "properties": { "title": title } }));
        let resource: SpreadsheetResource = self.send(builder, CallKind::Open).await?;
        Ok(resource.into())
    }

    async fn add_worksheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<WorksheetInfo, StoreError> {
        debug!("Adding worksheet '{}' to {}", title, spreadsheet_id);
        let reply = self
            .batch_update(
                spreadsheet_id,
                json!({
                    "addSheet": {
                        "properties": {
                            "title": title,
                            "gridProperties": { "rowCount": rows, "columnCount": columns }
                        }
                    }
                }),
                CallKind::Open,
            )
            .await?;

        let properties = reply
            .pointer("/replies/0/addSheet/properties")
            .cloned()
            .ok_or_else(|| StoreError::Open("addSheet reply missing properties".to_string()))?;
        let properties: SheetProperties =
            serde_json::from_value(properties).map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(properties.into())
    }

    async fn read_values(&self, spreadsheet_id: &str, worksheet: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let url = format!(
            "{}/{}/values/{}",
            SHEETS_API,
            spreadsheet_id,
            urlencoding::encode(&sheet_range(worksheet))
        );
        let builder = self.request(Method::GET, &url).await?;
        let range: ValueRange = self.send(builder, CallKind::Remote(RemoteOperation::Read)).await?;

        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn clear_values(&self, spreadsheet_id: &str, worksheet: &str) -> Result<(), StoreError> {
        let url = format!(
            "{}/{}/values/{}:clear",
            SHEETS_API,
            spreadsheet_id,
            urlencoding::encode(&sheet_range(worksheet))
        );
        let builder = self.request(Method::POST, &url).await?.json(&json!({}));
        let _: Value = self.send(builder, CallKind::Remote(RemoteOperation::Write)).await?;
        Ok(())
    }

    async fn resize(&self, spreadsheet_id: &str, sheet_id: i64, rows: u32, columns: u32) -> Result<(), StoreError> {
        self.batch_update(
            spreadsheet_id,
            json!({
                "updateSheetProperties": {
                    "properties": {
                        "sheetId": sheet_id,
                        "gridProperties": { "rowCount": rows, "columnCount": columns }
                    },
                    "fields": "gridProperties.rowCount,gridProperties.columnCount"
                }
            }),
            CallKind::Remote(RemoteOperation::Write),
        )
        .await?;
        Ok(())
    }

    async fn write_values(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StoreError> {
        let range = format!("{}!A1", sheet_range(worksheet));
        let url = format!(
            "{}/{}/values/{}?valueInputOption=RAW",
            SHEETS_API,
            spreadsheet_id,
            urlencoding::encode(&range)
        );
        let builder = self.request(Method::PUT, &url).await?.json(&json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        }));
        let _: Value = self.send(builder, CallKind::Remote(RemoteOperation::Write)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_is_bounded() {
        assert!(REQUEST_TIMEOUT > CONNECT_TIMEOUT);
        assert!(REQUEST_TIMEOUT <= Duration::from_secs(60));
        assert!(http_client().is_ok());
    }

    #[test]
    fn test_sheet_range_quotes_names() {
        assert_eq!(sheet_range("bp_data"), "'bp_data'");
        assert_eq!(sheet_range("Tom's data"), "'Tom''s data'");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!("120")), "120");
        assert_eq!(cell_text(&json!(120)), "120");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn test_spreadsheet_resource_conversion() {
        let resource: SpreadsheetResource = serde_json::from_value(json!({
            "spreadsheetId": "1AbC",
            "properties": { "title": "Blood Pressure Logger Data" },
            "sheets": [
                { "properties": { "sheetId": 0, "title": "bp_data",
                  "gridProperties": { "rowCount": 1000, "columnCount": 20 } } }
            ]
        }))
        .unwrap();

        let info: SpreadsheetInfo = resource.into();
        assert_eq!(info.spreadsheet_id, "1AbC");
        assert_eq!(info.worksheet("bp_data").map(|w| w.row_count), Some(1000));
    }
}
