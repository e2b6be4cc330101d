//! API client facade for the ECM backend
//!
//! JSON, upload and download operations routed through the resilient
//! pipeline, with errors mapped onto the generic error taxonomy.

pub mod client;
pub mod errors;

pub use client::{ApiClient, ApiClientBuilder, UPLOAD_FIELD};
pub use errors::ApiError;
