//! Domain types and models

pub mod claims;
pub mod preview;
pub mod request;
pub mod response;
pub mod session;

pub use claims::TokenClaims;
pub use preview::{
    BatchProgress, PreviewFailureCategory, PreviewFailureSummary, PreviewFailureVerdict,
    PreviewItem, ReasonCount,
};
pub use request::{
    FailureClass, FilePart, HttpMethod, OperationClass, RequestBody, RequestDescriptor,
    RetryContext,
};
pub use response::{ErrorEnvelope, HttpResponse};
pub use session::{Credentials, InitStatus, RedirectReason, StorageScope};
