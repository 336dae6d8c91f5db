use crate::data_structures::EncodedImage;
use std::time::Duration;

/// Decides whether a captured frame sequence came from a live subject.
pub trait LivenessCheck: Send + Sync {
    fn assess(&self, frames: &[EncodedImage]) -> bool;
}

/// Passes when exactly two non-empty frames bracket the blink window.
///
/// This only proves the frames were taken far enough apart for a blink to
/// fit between them. It does not look for an eye closure, so it cannot stop
/// a printed photo held up to the camera.
#[derive(Clone, Debug)]
pub struct BlinkWindowCheck {
    pub min_gap: Duration,
}

impl BlinkWindowCheck {
    pub fn new(min_gap: Duration) -> Self {
        BlinkWindowCheck { min_gap }
    }
}

impl LivenessCheck for BlinkWindowCheck {
    fn assess(&self, frames: &[EncodedImage]) -> bool {
        match frames {
            [first, second] => {
                !first.bytes.is_empty()
                    && !second.bytes.is_empty()
                    && second.captured_at.saturating_duration_since(first.captured_at) >= self.min_gap
            }
            _ => false,
        }
    }
}
