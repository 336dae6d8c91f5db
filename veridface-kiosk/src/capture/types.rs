use thiserror::Error;

/// Shown to the user whenever the camera cannot be acquired.
pub const CAMERA_DENIED_MESSAGE: &str =
    "Unable to access camera. Please ensure you have granted camera permissions.";

// Lifecycle of the capture session owned by the adapter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Streaming,
    CameraDenied,
    Stopped,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera not ready for capture")]
    NotReady,
    #[error("camera device failure: {0}")]
    Device(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_human_readable() {
        assert_eq!(CaptureError::NotReady.to_string(), "camera not ready for capture");
        assert_eq!(
            CaptureError::PermissionDenied("blocked".into()).to_string(),
            "camera permission denied: blocked"
        );
    }
}
