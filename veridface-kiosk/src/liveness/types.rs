use crate::capture::CaptureError;
use thiserror::Error;

// Steps of a liveness run, in the only order they may occur
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LivenessStep {
    Ready,
    Countdown,
    BlinkPrompt,
    Capturing,
    Done,
}

// Progress published to the UI while a run is driven
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LivenessEvent {
    Countdown(u32),
    BlinkPrompt,
    FrameCaptured { index: usize, fingerprint: String },
    Done { fingerprint: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LivenessError {
    #[error("cannot {action} while in step {from:?}")]
    InvalidTransition {
        from: LivenessStep,
        action: &'static str,
    },
    #[error("liveness run was abandoned")]
    Abandoned,
    #[error("capture failed during liveness run: {0}")]
    Capture(#[from] CaptureError),
    #[error("liveness check rejected the captured frames")]
    CheckFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_ordered() {
        assert!(LivenessStep::Ready < LivenessStep::Countdown);
        assert!(LivenessStep::Countdown < LivenessStep::BlinkPrompt);
        assert!(LivenessStep::BlinkPrompt < LivenessStep::Capturing);
        assert!(LivenessStep::Capturing < LivenessStep::Done);
    }

    #[test]
    fn capture_errors_convert() {
        let err: LivenessError = CaptureError::NotReady.into();
        assert_eq!(err, LivenessError::Capture(CaptureError::NotReady));
    }
}
