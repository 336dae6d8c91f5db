use crate::verification::types::{RawResponse, RegisterRequest, ScanRequest, TransportError};
use async_trait::async_trait;

/// Transport to the remote verification service.
///
/// Implementations return the raw status and body of whatever the service
/// answered, including non-2xx answers; only failing to get an answer at all
/// is an error. Interpreting the body is the submitter's job.
#[async_trait]
pub trait VerificationBackend: Send + Sync {
    /// `POST /facescanner`
    async fn post_scan(&self, request: &ScanRequest) -> Result<RawResponse, TransportError>;

    /// `POST /register`
    async fn post_registration(&self, request: &RegisterRequest) -> Result<RawResponse, TransportError>;
}
