//! Store configuration for the blood pressure logger
//!
//! Everything the stores need is gathered here once at startup and passed to
//! their constructors:
//! - where the local CSV file lives
//! - which spreadsheet and worksheet to use
//! - the Google service-account credential, if any

use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::Schema;

/// Default path of the local CSV file
pub const DEFAULT_CSV_PATH: &str = "bp_data.csv";

/// Default worksheet name inside the spreadsheet
pub const DEFAULT_WORKSHEET: &str = "bp_data";

/// Default OAuth2 token endpoint for service accounts
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was set to something unusable
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    /// The credential file could not be read
    #[error("Failed to read service account file {path}: {source}")]
    CredentialFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credential JSON did not parse
    #[error("Invalid service account JSON: {0}")]
    CredentialJson(#[from] serde_json::Error),
}

/// Google service-account key, as downloaded from the cloud console
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceAccountKey {
    /// Always "service_account" for usable keys
    #[serde(rename = "type", default)]
    pub key_type: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub private_key_id: String,

    /// PEM encoded RSA private key
    pub private_key: String,

    /// Identity the spreadsheet must be shared with
    pub client_email: String,

    /// Where signed assertions are exchanged for access tokens
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parse a key from its JSON form
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Cheap structural check; the key itself is parsed by the authenticator
    pub fn looks_complete(&self) -> bool {
        !self.client_email.trim().is_empty() && self.private_key.contains("PRIVATE KEY")
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("key_type", &self.key_type)
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path of the local CSV file
    pub csv_path: PathBuf,

    /// Spreadsheet URL or key; `None` creates a new spreadsheet on first use
    pub spreadsheet: Option<String>,

    /// Worksheet name inside the spreadsheet
    pub worksheet: String,

    /// Service-account credential enabling the spreadsheet backend
    pub service_account: Option<ServiceAccountKey>,

    /// Whether readings carry a pulse column
    pub track_pulse: bool,

    /// Recompute derived columns on every load instead of only when unusable
    pub recompute_on_load: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            spreadsheet: None,
            worksheet: DEFAULT_WORKSHEET.to_string(),
            service_account: None,
            track_pulse: true,
            recompute_on_load: false,
        }
    }
}

impl StoreConfig {
    /// Local-only configuration writing to `csv_path`
    pub fn local(csv_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            ..Self::default()
        }
    }

    /// Create a new store configuration from environment variables.
    ///
    /// A `.env` file is honoured when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let csv_path = get("BP_CSV_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_PATH));
        let spreadsheet = get("BP_SPREADSHEET");
        let worksheet = get("BP_WORKSHEET").unwrap_or_else(|| DEFAULT_WORKSHEET.to_string());
        let track_pulse = parse_flag("BP_TRACK_PULSE", get("BP_TRACK_PULSE"), true)?;
        let recompute_on_load = parse_flag("BP_RECOMPUTE_ON_LOAD", get("BP_RECOMPUTE_ON_LOAD"), false)?;

        let service_account = if let Some(json) = get("BP_GCP_SERVICE_ACCOUNT") {
            debug!("Using inline service account credential");
            Some(ServiceAccountKey::from_json(&json)?)
        } else if let Some(path) = get("BP_GCP_SERVICE_ACCOUNT_FILE").or_else(|| get("GOOGLE_APPLICATION_CREDENTIALS")) {
            let path = PathBuf::from(path);
            debug!("Reading service account credential from {}", path.display());
            let json = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::CredentialFile { path: path.clone(), source })?;
            Some(ServiceAccountKey::from_json(&json)?)
        } else {
            None
        };

        info!(
            "Store configuration: csv_path={}, worksheet={}, spreadsheet={}, credentials={}",
            csv_path.display(),
            worksheet,
            spreadsheet.as_deref().unwrap_or("auto-create"),
            service_account.is_some()
        );

        Ok(Self {
            csv_path,
            spreadsheet,
            worksheet,
            service_account,
            track_pulse,
            recompute_on_load,
        })
    }

    /// Column layout implied by this configuration
    pub fn schema(&self) -> Schema {
        Schema::new(self.track_pulse)
    }
}

fn parse_flag(name: &str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: other.to_string(),
        }),
    }
}
