use crate::capture::device::{CameraDevice, DeviceError, VideoStream};
use crate::capture::types::{CaptureError, CaptureState, CAMERA_DENIED_MESSAGE};
use crate::config::KioskConfig;
use crate::data_structures::{EncodedImage, StreamConstraints};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The adapter shared between the components that sample frames.
pub type SharedCapture = Arc<Mutex<MediaCaptureAdapter>>;

// Session state owned exclusively by the adapter
struct CaptureSession {
    state: CaptureState,
    stream: Option<Box<dyn VideoStream>>,
    error_message: Option<String>,
}

/// Owns the camera device lifecycle and turns the live stream into stills.
pub struct MediaCaptureAdapter {
    device: Arc<dyn CameraDevice>,
    constraints: StreamConstraints,
    jpeg_quality: f32,
    session: CaptureSession,
}

impl fmt::Debug for MediaCaptureAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaCaptureAdapter")
            .field("constraints", &self.constraints)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("state", &self.session.state)
            .field("error_message", &self.session.error_message)
            .finish()
    }
}

impl MediaCaptureAdapter {
    pub fn new(device: Arc<dyn CameraDevice>, constraints: StreamConstraints, jpeg_quality: f32) -> Self {
        MediaCaptureAdapter {
            device,
            constraints,
            jpeg_quality,
            session: CaptureSession {
                state: CaptureState::Idle,
                stream: None,
                error_message: None,
            },
        }
    }

    pub fn from_config(device: Arc<dyn CameraDevice>, config: &KioskConfig) -> Self {
        Self::new(device, config.stream_constraints(), config.jpeg_quality)
    }

    pub fn into_shared(self) -> SharedCapture {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> CaptureState {
        self.session.state
    }

    pub fn error_message(&self) -> Option<&str> {
        self.session.error_message.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.session.state == CaptureState::Streaming
    }

    /// Requests the front-facing stream. Failures never escape: they land the
    /// session in `CameraDenied` with a message for the user.
    pub async fn start(&mut self) -> CaptureState {
        if self.is_streaming() {
            debug!("[Capture] start() while already streaming; ignoring");
            return self.session.state;
        }
        self.session.error_message = None;

        match self.device.acquire(&self.constraints).await {
            Ok(stream) => {
                info!(
                    "[Capture] Stream acquired ({}x{} ideal)",
                    self.constraints.ideal_width, self.constraints.ideal_height
                );
                self.session.stream = Some(stream);
                self.session.state = CaptureState::Streaming;
            }
            Err(e) => {
                match &e {
                    DeviceError::PermissionDenied(_) => {
                        warn!("[Capture] Camera permission denied: {}", e)
                    }
                    _ => warn!("[Capture] Error accessing camera: {}", e),
                }
                self.session.stream = None;
                self.session.state = CaptureState::CameraDenied;
                self.session.error_message = Some(CAMERA_DENIED_MESSAGE.to_string());
            }
        }
        self.session.state
    }

    /// Releases every acquired track. Safe to call repeatedly or before `start`.
    pub fn stop(&mut self) {
        if let Some(mut stream) = self.session.stream.take() {
            stream.stop();
            info!("[Capture] Stream released");
        }
        if self.session.state == CaptureState::Streaming {
            self.session.state = CaptureState::Stopped;
        }
    }

    /// Samples the current frame. Does not change the session state.
    pub fn capture(&self) -> Result<EncodedImage, CaptureError> {
        let stream = match (&self.session.state, &self.session.stream) {
            (CaptureState::Streaming, Some(stream)) if stream.is_live() => stream,
            _ => return Err(CaptureError::NotReady),
        };
        let image = stream.snapshot(self.jpeg_quality).map_err(|e| match e {
            DeviceError::PermissionDenied(reason) => CaptureError::PermissionDenied(reason),
            other => CaptureError::Device(other.to_string()),
        })?;
        debug!(
            "[Capture] Frame captured ({} bytes, {})",
            image.bytes.len(),
            image.fingerprint()
        );
        Ok(image)
    }
}

impl Drop for MediaCaptureAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}
