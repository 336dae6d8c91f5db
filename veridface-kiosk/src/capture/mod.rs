// Media capture: camera device lifecycle and still-frame sampling

pub mod types;
pub mod device;
pub mod adapter;

pub use types::{CaptureError, CaptureState, CAMERA_DENIED_MESSAGE};
pub use device::{CameraDevice, DeviceError, VideoStream};
pub use adapter::{MediaCaptureAdapter, SharedCapture};
