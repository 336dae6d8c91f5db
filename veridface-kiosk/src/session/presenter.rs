// Check-in screen: periodic scans, result display and auto-reset.

use crate::capture::{CaptureState, SharedCapture, CAMERA_DENIED_MESSAGE};
use crate::config::KioskConfig;
use crate::data_structures::EncodedImage;
use crate::timers::{CancelFlag, ScheduledTask};
use crate::verification::{Confidence, MatchResult, VerificationOutcome, VerificationSubmitter};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Alternatives offered when a face is seen but not recognised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fallback {
    ManualId,
    QrCode,
}

pub const NOT_RECOGNIZED_FALLBACKS: [Fallback; 2] = [Fallback::ManualId, Fallback::QrCode];

#[derive(Clone, Debug, PartialEq)]
pub enum PresentationState {
    Scanning,
    AccessGranted { subject_id: String, confidence: Confidence },
    NotRecognized { fallbacks: Vec<Fallback> },
    NotDetected { reason: String, can_retry: bool },
    CameraDenied { message: String },
}

impl PresentationState {
    /// "87%" while access is granted.
    pub fn confidence_label(&self) -> Option<String> {
        match self {
            PresentationState::AccessGranted { confidence, .. } => Some(confidence.to_string()),
            _ => None,
        }
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self, PresentationState::Scanning)
    }

    fn name(&self) -> &'static str {
        match self {
            PresentationState::Scanning => "scanning",
            PresentationState::AccessGranted { .. } => "access-granted",
            PresentationState::NotRecognized { .. } => "not-recognized",
            PresentationState::NotDetected { .. } => "not-detected",
            PresentationState::CameraDenied { .. } => "camera-denied",
        }
    }
}

/// Maps a decoded submission outcome to what the kiosk shows.
pub fn state_for_outcome(outcome: &VerificationOutcome) -> PresentationState {
    match &outcome.result {
        MatchResult::Matched { subject_id, confidence } => PresentationState::AccessGranted {
            subject_id: subject_id.clone(),
            confidence: *confidence,
        },
        MatchResult::NotMatched { .. } => PresentationState::NotRecognized {
            fallbacks: NOT_RECOGNIZED_FALLBACKS.to_vec(),
        },
        MatchResult::TransportError(e) => PresentationState::NotDetected {
            reason: e.to_string(),
            can_retry: true,
        },
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenterCommand {
    /// Leave a result screen now instead of waiting for the auto-reset.
    Retry,
    /// Re-request the camera after a denial.
    RetryCamera,
    Shutdown,
}

// Wake-ups scheduled by the presenter's own timers and tasks
#[derive(Debug)]
enum PresenterEvent {
    ScanDue,
    Submitted(VerificationOutcome),
    RevertDue { generation: u64 },
}

/// UI side of a running presenter. Dropping it shuts the presenter down.
#[derive(Debug)]
pub struct PresenterHandle {
    commands: mpsc::UnboundedSender<PresenterCommand>,
    state: watch::Receiver<PresentationState>,
}

impl PresenterHandle {
    pub fn state(&self) -> PresentationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PresentationState> {
        self.state.clone()
    }

    /// Waits until the displayed state satisfies `predicate`. `None` once
    /// the presenter has stopped.
    pub async fn wait_for<F>(&mut self, predicate: F) -> Option<PresentationState>
    where
        F: FnMut(&PresentationState) -> bool,
    {
        self.state.wait_for(predicate).await.ok().map(|state| state.clone())
    }

    pub fn retry(&self) {
        let _ = self.commands.send(PresenterCommand::Retry);
    }

    pub fn retry_camera(&self) {
        let _ = self.commands.send(PresenterCommand::RetryCamera);
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(PresenterCommand::Shutdown);
    }
}

/// Drives the check-in screen. Only one submission is ever in flight: a scan
/// fires only while `Scanning` with nothing pending.
pub struct SessionPresenter {
    capture: SharedCapture,
    submitter: VerificationSubmitter,
    venue: String,
    scan_interval: Duration,
    result_display: Duration,

    state: PresentationState,
    state_tx: watch::Sender<PresentationState>,
    commands: mpsc::UnboundedReceiver<PresenterCommand>,
    events_tx: mpsc::UnboundedSender<PresenterEvent>,
    events_rx: mpsc::UnboundedReceiver<PresenterEvent>,

    // Bumped on every state change so a stale revert can be recognised
    generation: u64,
    scan_timer: Option<ScheduledTask>,
    revert_timer: Option<ScheduledTask>,
    in_flight: Option<ScheduledTask>,
}

impl SessionPresenter {
    pub fn new(
        config: &KioskConfig,
        capture: SharedCapture,
        submitter: VerificationSubmitter,
    ) -> (Self, PresenterHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PresentationState::Scanning);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let presenter = SessionPresenter {
            capture,
            submitter,
            venue: config.venue.clone(),
            scan_interval: config.scan_interval,
            result_display: config.result_display,
            state: PresentationState::Scanning,
            state_tx,
            commands: command_rx,
            events_tx,
            events_rx,
            generation: 0,
            scan_timer: None,
            revert_timer: None,
            in_flight: None,
        };
        let handle = PresenterHandle { commands: command_tx, state: state_rx };
        (presenter, handle)
    }

    pub async fn run(mut self) {
        info!("[Presenter] Starting check-in at '{}'", self.venue);
        self.start_camera().await;

        let scan_tx = self.events_tx.clone();
        self.scan_timer = Some(ScheduledTask::every("scan-interval", self.scan_interval, move || {
            let tx = scan_tx.clone();
            async move {
                let _ = tx.send(PresenterEvent::ScanDue);
            }
        }));

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(PresenterCommand::Shutdown) | None => {
                        info!("[Presenter] Shutdown requested");
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
            }
        }

        self.teardown().await;
    }

    fn show(&mut self, state: PresentationState) {
        self.generation += 1;
        self.revert_timer = None;
        info!("[Presenter] {} -> {}", self.state.name(), state.name());
        self.state = state.clone();
        self.state_tx.send_replace(state);
    }

    // Result screens reset after the display period. Camera denial waits for
    // an explicit retry.
    fn schedule_revert(&mut self) {
        if matches!(self.state, PresentationState::Scanning | PresentationState::CameraDenied { .. }) {
            return;
        }
        let generation = self.generation;
        let tx = self.events_tx.clone();
        self.revert_timer = Some(ScheduledTask::after("result-revert", self.result_display, move || async move {
            let _ = tx.send(PresenterEvent::RevertDue { generation });
        }));
    }

    async fn start_camera(&mut self) {
        let (state, message) = {
            let mut adapter = self.capture.lock().await;
            let state = adapter.start().await;
            (state, adapter.error_message().map(str::to_string))
        };
        if state == CaptureState::Streaming {
            if !self.state.is_scanning() {
                self.show(PresentationState::Scanning);
            }
        } else {
            self.show(PresentationState::CameraDenied {
                message: message.unwrap_or_else(|| CAMERA_DENIED_MESSAGE.to_string()),
            });
        }
    }

    async fn handle_command(&mut self, command: PresenterCommand) {
        let camera_denied = matches!(self.state, PresentationState::CameraDenied { .. });
        match command {
            PresenterCommand::RetryCamera if camera_denied => {
                info!("[Presenter] Retrying camera");
                self.start_camera().await;
            }
            PresenterCommand::Retry if !camera_denied && !self.state.is_scanning() => {
                self.show(PresentationState::Scanning);
            }
            other => debug!("[Presenter] {:?} ignored in {}", other, self.state.name()),
        }
    }

    async fn handle_event(&mut self, event: PresenterEvent) {
        match event {
            PresenterEvent::ScanDue => self.scan().await,
            PresenterEvent::Submitted(outcome) => {
                self.in_flight = None;
                if !self.state.is_scanning() {
                    // Left scanning (e.g. camera lost) while the request was out
                    debug!("[Presenter] Dropping outcome that arrived in {}", self.state.name());
                    return;
                }
                self.show(state_for_outcome(&outcome));
                self.schedule_revert();
            }
            PresenterEvent::RevertDue { generation } => {
                if generation == self.generation && !self.state.is_scanning() {
                    self.show(PresentationState::Scanning);
                }
            }
        }
    }

    async fn scan(&mut self) {
        if !self.state.is_scanning() || self.in_flight.is_some() {
            debug!("[Presenter] Scan skipped ({}, in flight: {})", self.state.name(), self.in_flight.is_some());
            return;
        }

        let captured = self.capture.lock().await.capture();
        let image: EncodedImage = match captured {
            Ok(image) => image,
            Err(e) => {
                warn!("[Presenter] Capture failed: {}", e);
                self.show(PresentationState::NotDetected { reason: e.to_string(), can_retry: true });
                self.schedule_revert();
                return;
            }
        };

        let submitter = self.submitter.clone();
        let venue = self.venue.clone();
        let tx = self.events_tx.clone();
        let flag = CancelFlag::new();
        let guard = flag.clone();
        self.in_flight = Some(ScheduledTask::spawn("scan-submission", flag, async move {
            let outcome = submitter.submit_for_match(&image, &venue).await;
            if !guard.is_cancelled() {
                let _ = tx.send(PresenterEvent::Submitted(outcome));
            }
        }));
    }

    async fn teardown(&mut self) {
        self.scan_timer = None;
        self.revert_timer = None;
        self.in_flight = None;
        self.capture.lock().await.stop();
        info!("[Presenter] Stopped");
    }
}

impl Drop for SessionPresenter {
    fn drop(&mut self) {
        // Timers cancel themselves; the camera is released if nobody holds it
        if let Ok(mut adapter) = self.capture.try_lock() {
            adapter.stop();
        }
    }
}
