//! Document workflows shared by the HTTP handlers: uploads, index handoff, and lookups.

mod service;
pub mod types;

pub use service::{DocumentService, GREETING};
pub use types::{GatewayError, IndexUpload, UploadOutcome, UploadRequest};
