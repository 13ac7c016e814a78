//! HTTP request handlers organized by functionality

pub mod api;
pub mod pages;
pub mod streaming;

pub use api::{HealthReport, api_health};
pub use pages::{index_page, view_page};
pub use streaming::{download_file, stream_file};
