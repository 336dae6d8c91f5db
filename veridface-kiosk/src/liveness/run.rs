use crate::data_structures::EncodedImage;
use crate::liveness::types::{LivenessError, LivenessStep};

/// State of one liveness attempt. Pure: timers and the camera live in the
/// sequencer, this only enforces the step order and frame bookkeeping.
#[derive(Clone, Debug)]
pub struct LivenessRun {
    step: LivenessStep,
    countdown_from: u32,
    countdown_remaining: u32,
    frames: Vec<EncodedImage>, // At most two
    abandoned: bool,
}

impl LivenessRun {
    pub fn new(countdown_from: u32) -> Self {
        LivenessRun {
            step: LivenessStep::Ready,
            countdown_from,
            countdown_remaining: countdown_from,
            frames: Vec::with_capacity(2),
            abandoned: false,
        }
    }

    pub fn step(&self) -> LivenessStep {
        self.step
    }

    pub fn countdown_remaining(&self) -> u32 {
        self.countdown_remaining
    }

    pub fn frames(&self) -> &[EncodedImage] {
        &self.frames
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    fn guard(&self, expected: LivenessStep, action: &'static str) -> Result<(), LivenessError> {
        if self.abandoned {
            return Err(LivenessError::Abandoned);
        }
        if self.step != expected {
            return Err(LivenessError::InvalidTransition { from: self.step, action });
        }
        Ok(())
    }

    /// Ready -> Countdown. Returns the first value to display.
    pub fn begin_countdown(&mut self) -> Result<u32, LivenessError> {
        self.guard(LivenessStep::Ready, "begin countdown")?;
        self.countdown_remaining = self.countdown_from;
        self.step = LivenessStep::Countdown;
        if self.countdown_remaining == 0 {
            self.step = LivenessStep::BlinkPrompt;
        }
        Ok(self.countdown_remaining)
    }

    /// One countdown tick. Reaching zero moves to BlinkPrompt.
    pub fn tick(&mut self) -> Result<u32, LivenessError> {
        self.guard(LivenessStep::Countdown, "tick")?;
        self.countdown_remaining -= 1;
        if self.countdown_remaining == 0 {
            self.step = LivenessStep::BlinkPrompt;
        }
        Ok(self.countdown_remaining)
    }

    /// Records a captured frame: the first moves BlinkPrompt -> Capturing,
    /// the second completes the pair. Returns the number of frames held.
    pub fn record_frame(&mut self, frame: EncodedImage) -> Result<usize, LivenessError> {
        if self.abandoned {
            return Err(LivenessError::Abandoned);
        }
        match (self.step, self.frames.len()) {
            (LivenessStep::BlinkPrompt, 0) => {
                self.frames.push(frame);
                self.step = LivenessStep::Capturing;
            }
            (LivenessStep::Capturing, 1) => self.frames.push(frame),
            (from, _) => {
                return Err(LivenessError::InvalidTransition { from, action: "record frame" });
            }
        }
        Ok(self.frames.len())
    }

    /// Capturing (with both frames) -> Done.
    pub fn finish(&mut self) -> Result<&EncodedImage, LivenessError> {
        self.guard(LivenessStep::Capturing, "finish")?;
        if self.frames.len() != 2 {
            return Err(LivenessError::InvalidTransition { from: self.step, action: "finish" });
        }
        self.step = LivenessStep::Done;
        Ok(&self.frames[1])
    }

    /// The image to submit: always the second frame, only once Done.
    pub fn submission_image(&self) -> Option<&EncodedImage> {
        if self.step == LivenessStep::Done && !self.abandoned {
            self.frames.get(1)
        } else {
            None
        }
    }

    /// Consumes the run, dropping the first frame and keeping the second.
    pub fn into_submission(mut self) -> Option<EncodedImage> {
        if self.step != LivenessStep::Done || self.abandoned || self.frames.len() != 2 {
            return None;
        }
        self.frames.pop()
    }

    /// Discards the run. Every later operation fails with `Abandoned`.
    pub fn abandon(&mut self) {
        self.abandoned = true;
        self.frames.clear();
    }
}
