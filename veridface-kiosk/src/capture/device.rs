use crate::data_structures::{EncodedImage, StreamConstraints};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("no camera device available")]
    NotFound,
    #[error("{0}")]
    Other(String),
}

/// Platform camera. Acquisition is the only suspension point; the
/// permission prompt, if any, happens inside it.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn acquire(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, DeviceError>;
}

/// A live stream handed out by a `CameraDevice`.
pub trait VideoStream: Send {
    /// Samples the current frame as an encoded still.
    fn snapshot(&self, jpeg_quality: f32) -> Result<EncodedImage, DeviceError>;

    /// Stops every track of the stream. Must be idempotent.
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}
