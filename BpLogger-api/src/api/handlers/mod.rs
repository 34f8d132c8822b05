pub mod health;
pub mod readings;


// Re-export handlers for easier imports
pub use readings::{
    clear_readings, create_reading, export_readings, import_readings, list_readings, trends, weekly_summary,
};
pub use health::health_check;
