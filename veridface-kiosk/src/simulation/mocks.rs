use crate::capture::device::{CameraDevice, DeviceError, VideoStream};
use crate::data_structures::{EncodedImage, StreamConstraints};
use crate::verification::interface::VerificationBackend;
use crate::verification::types::{RawResponse, RegisterRequest, ScanRequest, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- Mock camera ---

// Counters shared between the device and every stream it hands out
#[derive(Debug, Default)]
struct CameraCounters {
    denied: AtomicBool,
    acquisitions: AtomicUsize,
    snapshots: AtomicUsize,
    stops: AtomicUsize,
}

/// Camera whose permission outcome is scripted by the test.
/// Each snapshot encodes its sequence number so frames are distinguishable.
#[derive(Clone, Debug, Default)]
pub struct MockCamera {
    counters: Arc<CameraCounters>,
}

impl MockCamera {
    pub fn granting() -> Self {
        MockCamera::default()
    }

    pub fn denying() -> Self {
        let camera = MockCamera::default();
        camera.set_denied(true);
        camera
    }

    pub fn set_denied(&self, denied: bool) {
        self.counters.denied.store(denied, Ordering::SeqCst);
    }

    pub fn acquire_count(&self) -> usize {
        self.counters.acquisitions.load(Ordering::SeqCst)
    }

    pub fn snapshot_count(&self) -> usize {
        self.counters.snapshots.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    /// The bytes the n-th snapshot (1-based) carries.
    pub fn frame_bytes(sequence: usize) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(&(sequence as u64).to_be_bytes());
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }
}

#[async_trait]
impl CameraDevice for MockCamera {
    async fn acquire(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, DeviceError> {
        self.counters.acquisitions.fetch_add(1, Ordering::SeqCst);
        if self.counters.denied.load(Ordering::SeqCst) {
            return Err(DeviceError::PermissionDenied("NotAllowedError".to_string()));
        }
        Ok(Box::new(MockStream {
            counters: self.counters.clone(),
            width: constraints.ideal_width,
            height: constraints.ideal_height,
            live: true,
        }))
    }
}

struct MockStream {
    counters: Arc<CameraCounters>,
    width: u32,
    height: u32,
    live: bool,
}

impl VideoStream for MockStream {
    fn snapshot(&self, _jpeg_quality: f32) -> Result<EncodedImage, DeviceError> {
        let sequence = self.counters.snapshots.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(EncodedImage::jpeg(MockCamera::frame_bytes(sequence), self.width, self.height))
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.counters.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

// --- Mock verification backend ---

type Scripted = Result<RawResponse, TransportError>;

/// Backend that replays scripted responses and records every request.
/// Once the script runs out, the fallback response is returned.
#[derive(Clone)]
pub struct MockVerificationBackend {
    scan_script: Arc<Mutex<VecDeque<Scripted>>>,
    register_script: Arc<Mutex<VecDeque<Scripted>>>,
    fallback: Arc<Mutex<Scripted>>,
    latency: Duration,
    scan_requests: Arc<Mutex<Vec<ScanRequest>>>,
    register_requests: Arc<Mutex<Vec<RegisterRequest>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockVerificationBackend {
    pub fn new() -> Self {
        MockVerificationBackend {
            scan_script: Arc::new(Mutex::new(VecDeque::new())),
            register_script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(Ok(RawResponse::json(
                404,
                &serde_json::json!({ "status": "fail", "match": false, "message": "No match found" }),
            )))),
            latency: Duration::ZERO,
            scan_requests: Arc::new(Mutex::new(Vec::new())),
            register_requests: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every call takes this long to answer (tokio time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_scan(&self, response: Scripted) {
        self.scan_script.lock().unwrap().push_back(response);
    }

    pub fn push_registration(&self, response: Scripted) {
        self.register_script.lock().unwrap().push_back(response);
    }

    pub fn set_fallback(&self, response: Scripted) {
        *self.fallback.lock().unwrap() = response;
    }

    pub fn scan_requests(&self) -> Vec<ScanRequest> {
        self.scan_requests.lock().unwrap().clone()
    }

    pub fn register_requests(&self) -> Vec<RegisterRequest> {
        self.register_requests.lock().unwrap().clone()
    }

    /// Highest number of calls that were ever outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(&self, script: &Mutex<VecDeque<Scripted>>) -> Scripted {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = script.lock().unwrap().pop_front();
        let response = next.unwrap_or_else(|| self.fallback.lock().unwrap().clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

impl Default for MockVerificationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VerificationBackend for MockVerificationBackend {
    async fn post_scan(&self, request: &ScanRequest) -> Result<RawResponse, TransportError> {
        self.scan_requests.lock().unwrap().push(request.clone());
        self.answer(&self.scan_script).await
    }

    async fn post_registration(&self, request: &RegisterRequest) -> Result<RawResponse, TransportError> {
        self.register_requests.lock().unwrap().push(request.clone());
        self.answer(&self.register_script).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::FacingMode;

    #[tokio::test]
    async fn mock_camera_frames_are_sequenced() {
        let camera = MockCamera::granting();
        let constraints = StreamConstraints { facing: FacingMode::User, ideal_width: 4, ideal_height: 4 };
        let mut stream = camera.acquire(&constraints).await.unwrap();

        let first = stream.snapshot(0.8).unwrap();
        let second = stream.snapshot(0.8).unwrap();
        assert_eq!(first.bytes, MockCamera::frame_bytes(1));
        assert_eq!(second.bytes, MockCamera::frame_bytes(2));

        stream.stop();
        stream.stop();
        assert_eq!(camera.stop_count(), 1);
        assert!(!stream.is_live());
    }

    #[tokio::test]
    async fn mock_backend_replays_script_then_fallback() {
        let backend = MockVerificationBackend::new();
        backend.push_scan(Err(TransportError::Timeout { endpoint: "/facescanner".into() }));

        let request = ScanRequest { image: "data:image/jpeg;base64,AA==".into(), venue: "Lab".into() };
        assert!(backend.post_scan(&request).await.is_err());
        let fallback = backend.post_scan(&request).await.unwrap();
        assert_eq!(fallback.status, 404);
        assert_eq!(backend.scan_requests().len(), 2);
    }
}
