//! HTTP request handlers for the web server.

mod api;
mod dashboard;
mod static_files;
mod upload;

pub use api::{api_document, api_documents, api_status};
pub use dashboard::dashboard;
pub use static_files::serve_css;
pub use upload::{reload_pipeline, upload_document};
