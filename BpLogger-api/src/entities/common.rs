use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Where readings are stored, as shown to clients
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StorageInfo {
    /// `local` or `gsheets`
    pub backend: String,

    /// Local CSV file, also the fallback target
    pub csv_path: String,

    /// Worksheet name when Google Sheets is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worksheet: Option<String>,

    /// Configured spreadsheet URL or key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet: Option<String>,
}

impl From<bp_logger_domain::BackendStatus> for StorageInfo {
    fn from(status: bp_logger_domain::BackendStatus) -> Self {
        Self {
            backend: status.backend.to_string(),
            csv_path: status.csv_path,
            worksheet: status.worksheet,
            spreadsheet: status.spreadsheet,
        }
    }
}
