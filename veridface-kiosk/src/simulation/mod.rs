// Stand-ins for the platform camera and the remote service

pub mod camera;
pub mod mocks;

pub use camera::StillFrameCamera;
pub use mocks::{MockCamera, MockVerificationBackend};
