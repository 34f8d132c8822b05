// Repository module structure
pub mod codec;
pub mod errors;
mod local;
mod router;
mod spreadsheet;
mod store;

// Re-export commonly used types
pub use errors::{RemoteOperation, StoreError};
pub use local::LocalCsvStore;
pub use router::{BackendRouter, BackendStatus, Persisted, ReadingRepositoryTrait};
pub use spreadsheet::RemoteSpreadsheetStore;
pub use store::{BackendUsed, DatasetStore};

// Re-export test modules for both testing and when mock feature is enabled
#[cfg(any(test, feature = "mock"))]
pub use router::tests;
