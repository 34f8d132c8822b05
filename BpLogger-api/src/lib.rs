// BpLogger-api lib.rs
//
// HTTP surface of the blood pressure logger.

// Public modules
pub mod api;
pub mod entities;
pub mod openapi;
