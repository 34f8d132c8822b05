use std::path::PathBuf;
use thiserror::Error;

/// Error type for dataset store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Service-account authentication failed
    #[error("Google auth failed: {0}")]
    Auth(String),

    /// The spreadsheet or worksheet could not be opened or created
    #[error("Opening spreadsheet failed: {0}")]
    Open(String),

    /// Reading from or writing to the worksheet failed
    #[error("{operation} Google Sheets failed: {message}")]
    RemoteIo {
        operation: RemoteOperation,
        message: String,
    },

    /// The local CSV file could not be read or written
    #[error("Local file error at {path}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding or decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Uploaded data could not be parsed
    #[error("Import failed: {0}")]
    ImportParse(String),

    /// Stored data lacks a column every reading needs
    #[error("Stored data is missing required column '{0}'")]
    MissingColumn(&'static str),

    /// No remote backend is configured
    #[error("No Google credentials found in configuration")]
    RemoteUnavailable,
}

/// Direction of a failed spreadsheet call, used in messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    Read,
    Write,
}

impl std::fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteOperation::Read => write!(f, "Read from"),
            RemoteOperation::Write => write!(f, "Write to"),
        }
    }
}

impl StoreError {
    /// Remote read failure
    pub fn read(message: impl Into<String>) -> Self {
        StoreError::RemoteIo {
            operation: RemoteOperation::Read,
            message: message.into(),
        }
    }

    /// Remote write failure
    pub fn write(message: impl Into<String>) -> Self {
        StoreError::RemoteIo {
            operation: RemoteOperation::Write,
            message: message.into(),
        }
    }

    /// Whether the error came from the spreadsheet backend
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            StoreError::Auth(_) | StoreError::Open(_) | StoreError::RemoteIo { .. } | StoreError::RemoteUnavailable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_messages() {
        assert_eq!(StoreError::read("quota").to_string(), "Read from Google Sheets failed: quota");
        assert_eq!(StoreError::write("quota").to_string(), "Write to Google Sheets failed: quota");
        assert!(StoreError::Auth("bad key".into()).is_remote());
        assert!(!StoreError::ImportParse("line 2".into()).is_remote());
    }
}
