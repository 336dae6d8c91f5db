// Drives a LivenessRun with real timers and the shared capture adapter.

use crate::capture::SharedCapture;
use crate::config::KioskConfig;
use crate::data_structures::EncodedImage;
use crate::liveness::check::{BlinkWindowCheck, LivenessCheck};
use crate::liveness::run::LivenessRun;
use crate::liveness::types::{LivenessError, LivenessEvent, LivenessStep};
use crate::timers::{CancelFlag, ScheduledTask};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LivenessTiming {
    pub countdown_from: u32,
    pub countdown_tick: Duration,
    pub blink_settle: Duration,
    pub blink_window: Duration,
}

impl LivenessTiming {
    pub fn from_config(config: &KioskConfig) -> Self {
        LivenessTiming {
            countdown_from: config.countdown_from,
            countdown_tick: config.countdown_tick,
            blink_settle: config.blink_settle,
            blink_window: config.blink_window,
        }
    }
}

#[derive(Clone)]
pub struct LivenessSequencer {
    timing: LivenessTiming,
    check: Arc<dyn LivenessCheck>,
}

impl LivenessSequencer {
    pub fn new(timing: LivenessTiming, check: Arc<dyn LivenessCheck>) -> Self {
        LivenessSequencer { timing, check }
    }

    /// Uses the blink-window heuristic as the liveness check.
    pub fn from_config(config: &KioskConfig) -> Self {
        let timing = LivenessTiming::from_config(config);
        Self::new(timing, Arc::new(BlinkWindowCheck::new(timing.blink_window)))
    }

    pub fn timing(&self) -> LivenessTiming {
        self.timing
    }

    /// Starts a run in the background. Progress goes to `events`; the final
    /// image (or the reason there is none) comes out of the returned handle.
    pub fn start(
        &self,
        capture: SharedCapture,
        events: mpsc::UnboundedSender<LivenessEvent>,
    ) -> LivenessHandle {
        let flag = CancelFlag::new();
        let (result_tx, result_rx) = oneshot::channel();
        let driver = RunDriver {
            timing: self.timing,
            check: self.check.clone(),
            capture,
            events,
            flag: flag.clone(),
        };
        let guard = flag.clone();
        let task = ScheduledTask::spawn("liveness-run", flag, async move {
            let result = driver.drive().await;
            if guard.is_cancelled() {
                return;
            }
            let _ = result_tx.send(result);
        });
        LivenessHandle { task, result_rx }
    }
}

/// Owner of a running liveness sequence. Dropping it cancels the run.
pub struct LivenessHandle {
    task: ScheduledTask,
    result_rx: oneshot::Receiver<Result<EncodedImage, LivenessError>>,
}

impl LivenessHandle {
    /// Clears every pending timer of the run. No frame is delivered afterwards.
    pub fn cancel(&mut self) {
        if self.task.is_active() {
            info!("[Liveness] Run cancelled");
        }
        self.task.cancel();
    }

    pub fn is_active(&self) -> bool {
        self.task.is_active()
    }

    /// Waits for the run to finish.
    pub async fn finished(self) -> Result<EncodedImage, LivenessError> {
        let LivenessHandle { task, result_rx } = self;
        let result = result_rx.await.unwrap_or(Err(LivenessError::Abandoned));
        drop(task);
        result
    }
}

struct RunDriver {
    timing: LivenessTiming,
    check: Arc<dyn LivenessCheck>,
    capture: SharedCapture,
    events: mpsc::UnboundedSender<LivenessEvent>,
    flag: CancelFlag,
}

impl RunDriver {
    fn emit(&self, event: LivenessEvent) {
        if self.flag.is_cancelled() {
            return;
        }
        // The UI may have stopped listening; the run still completes
        let _ = self.events.send(event);
    }

    fn checkpoint(&self, run: &mut LivenessRun) -> Result<(), LivenessError> {
        if self.flag.is_cancelled() {
            run.abandon();
            return Err(LivenessError::Abandoned);
        }
        Ok(())
    }

    async fn grab(&self, run: &mut LivenessRun) -> Result<EncodedImage, LivenessError> {
        let adapter = self.capture.lock().await;
        self.checkpoint(run)?;
        Ok(adapter.capture()?)
    }

    async fn drive(self) -> Result<EncodedImage, LivenessError> {
        let mut run = LivenessRun::new(self.timing.countdown_from);

        let first = run.begin_countdown()?;
        info!("[Liveness] Countdown started at {}", first);
        self.emit(LivenessEvent::Countdown(first));

        let tick = self.timing.countdown_tick;
        let mut ticker = interval_at(Instant::now() + tick, tick);
        while run.step() == LivenessStep::Countdown {
            ticker.tick().await;
            self.checkpoint(&mut run)?;
            let remaining = run.tick()?;
            debug!("[Liveness] Countdown {}", remaining);
            self.emit(LivenessEvent::Countdown(remaining));
        }

        self.emit(LivenessEvent::BlinkPrompt);
        tokio::time::sleep(self.timing.blink_settle).await;
        self.checkpoint(&mut run)?;

        let frame = self.grab(&mut run).await?;
        let fingerprint = frame.fingerprint();
        run.record_frame(frame)?;
        self.emit(LivenessEvent::FrameCaptured { index: 0, fingerprint });

        tokio::time::sleep(self.timing.blink_window).await;
        self.checkpoint(&mut run)?;

        let frame = self.grab(&mut run).await?;
        let fingerprint = frame.fingerprint();
        run.record_frame(frame)?;
        self.emit(LivenessEvent::FrameCaptured { index: 1, fingerprint });

        // The camera is no longer needed whatever the check decides
        self.capture.lock().await.stop();

        if !self.check.assess(run.frames()) {
            warn!("[Liveness] Check rejected the captured frames");
            run.abandon();
            return Err(LivenessError::CheckFailed);
        }

        let fingerprint = run.finish()?.fingerprint();
        let image = run
            .into_submission()
            .ok_or(LivenessError::InvalidTransition { from: LivenessStep::Done, action: "take submission" })?;
        info!("[Liveness] Run complete, submitting frame {}", fingerprint);
        self.emit(LivenessEvent::Done { fingerprint });
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureError, CaptureState, MediaCaptureAdapter};
    use crate::simulation::mocks::MockCamera;

    struct RejectAll;

    impl LivenessCheck for RejectAll {
        fn assess(&self, _frames: &[EncodedImage]) -> bool {
            false
        }
    }

    async fn streaming_capture(camera: &MockCamera) -> SharedCapture {
        let mut adapter =
            MediaCaptureAdapter::from_config(Arc::new(camera.clone()), &KioskConfig::default());
        assert_eq!(adapter.start().await, CaptureState::Streaming);
        adapter.into_shared()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<LivenessEvent>) -> Vec<LivenessEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_submits_second_frame() {
        let camera = MockCamera::granting();
        let capture = streaming_capture(&camera).await;
        let sequencer = LivenessSequencer::from_config(&KioskConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let started = Instant::now();
        let image = sequencer.start(capture.clone(), tx).finished().await.unwrap();

        assert_eq!(image.bytes, MockCamera::frame_bytes(2));
        assert_eq!(camera.snapshot_count(), 2);
        // 3 ticks + settle + window
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(4500) && elapsed < Duration::from_millis(4510));
        // Camera released once both frames are in
        assert_eq!(capture.lock().await.state(), CaptureState::Stopped);

        let events = drain(&mut rx);
        let countdown: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                LivenessEvent::Countdown(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(countdown, vec![3, 2, 1, 0]);
        assert_eq!(events.iter().filter(|e| **e == LivenessEvent::BlinkPrompt).count(), 1);
        assert!(matches!(events.last(), Some(LivenessEvent::Done { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_countdown_prevents_capture() {
        let camera = MockCamera::granting();
        let capture = streaming_capture(&camera).await;
        let sequencer = LivenessSequencer::from_config(&KioskConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut handle = sequencer.start(capture.clone(), tx);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.cancel();
        let seen_before_cancel = drain(&mut rx);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(camera.snapshot_count(), 0);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(
            seen_before_cancel,
            vec![LivenessEvent::Countdown(3), LivenessEvent::Countdown(2)]
        );
        assert_eq!(handle.finished().await, Err(LivenessError::Abandoned));
        // Cancelling the run leaves the camera to its owner
        assert_eq!(capture.lock().await.state(), CaptureState::Streaming);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_run() {
        let camera = MockCamera::granting();
        let capture = streaming_capture(&camera).await;
        let sequencer = LivenessSequencer::from_config(&KioskConfig::default());
        let (tx, _rx) = mpsc::unbounded_channel();

        let handle = sequencer.start(capture, tx);
        // Blink prompt is showing, first capture still pending
        tokio::time::sleep(Duration::from_millis(3200)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(camera.snapshot_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_camera_fails_with_not_ready() {
        let camera = MockCamera::granting();
        let capture = streaming_capture(&camera).await;
        let sequencer = LivenessSequencer::from_config(&KioskConfig::default());
        let (tx, _rx) = mpsc::unbounded_channel();

        let handle = sequencer.start(capture.clone(), tx);
        capture.lock().await.stop();
        assert_eq!(
            handle.finished().await,
            Err(LivenessError::Capture(CaptureError::NotReady))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_check_yields_no_image() {
        let camera = MockCamera::granting();
        let capture = streaming_capture(&camera).await;
        let config = KioskConfig::default();
        let sequencer = LivenessSequencer::new(LivenessTiming::from_config(&config), Arc::new(RejectAll));
        let (tx, _rx) = mpsc::unbounded_channel();

        assert_eq!(
            sequencer.start(capture.clone(), tx).finished().await,
            Err(LivenessError::CheckFailed)
        );
        assert_eq!(camera.snapshot_count(), 2);
        assert_eq!(capture.lock().await.state(), CaptureState::Stopped);
    }
}
