// Three-step registration: personal details, face capture, review and submit.

use crate::capture::{CaptureState, SharedCapture, CAMERA_DENIED_MESSAGE};
use crate::data_structures::{EncodedImage, ProfileError, RegistrationProfile};
use crate::liveness::{LivenessError, LivenessEvent, LivenessHandle, LivenessSequencer};
use crate::verification::{RegistrationOutcome, RegistrationResult, VerificationSubmitter};
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;

pub const TOTAL_STEPS: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
    PersonalInfo,
    FaceVerification,
    Review,
    Completed,
}

impl WizardStep {
    /// Position shown by the progress indicator (1-based).
    pub fn number(&self) -> u8 {
        match self {
            WizardStep::PersonalInfo => 1,
            WizardStep::FaceVerification => 2,
            WizardStep::Review | WizardStep::Completed => 3,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("cannot {action} on step {actual:?}")]
    WrongStep {
        actual: WizardStep,
        action: &'static str,
    },
    #[error(transparent)]
    InvalidProfile(#[from] ProfileError),
    #[error("camera use has not been consented to")]
    ConsentRequired,
    #[error("{0}")]
    CameraUnavailable(String),
    #[error("a liveness run is already in progress")]
    LivenessInProgress,
    #[error("no liveness run in progress")]
    NoLivenessRun,
    #[error(transparent)]
    Liveness(#[from] LivenessError),
    #[error("no face image has been captured")]
    NoCapture,
}

/// Registration flow state. Owns the liveness run it starts; dropping the
/// wizard cancels it.
pub struct RegistrationWizard {
    step: WizardStep,
    profile: Option<RegistrationProfile>,
    consent: bool,

    capture: SharedCapture,
    sequencer: LivenessSequencer,
    submitter: VerificationSubmitter,

    run: Option<LivenessHandle>,
    captured: Option<EncodedImage>, // awaiting confirmation on step 2
    face_image: Option<EncodedImage>, // confirmed, shown on review

    last_error: Option<String>,
    digital_id: Option<String>,
}

impl RegistrationWizard {
    pub fn new(capture: SharedCapture, sequencer: LivenessSequencer, submitter: VerificationSubmitter) -> Self {
        RegistrationWizard {
            step: WizardStep::PersonalInfo,
            profile: None,
            consent: false,
            capture,
            sequencer,
            submitter,
            run: None,
            captured: None,
            face_image: None,
            last_error: None,
            digital_id: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    /// (current, total) for the progress indicator.
    pub fn progress(&self) -> (u8, u8) {
        (self.step.number(), TOTAL_STEPS)
    }

    pub fn profile(&self) -> Option<&RegistrationProfile> {
        self.profile.as_ref()
    }

    pub fn has_consent(&self) -> bool {
        self.consent
    }

    pub fn captured_image(&self) -> Option<&EncodedImage> {
        self.captured.as_ref()
    }

    pub fn face_image(&self) -> Option<&EncodedImage> {
        self.face_image.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn digital_id(&self) -> Option<&str> {
        self.digital_id.as_deref()
    }

    pub fn liveness_active(&self) -> bool {
        self.run.as_ref().map(|run| run.is_active()).unwrap_or(false)
    }

    fn require(&self, step: WizardStep, action: &'static str) -> Result<(), RegistrationError> {
        if self.step != step {
            return Err(RegistrationError::WrongStep { actual: self.step, action });
        }
        Ok(())
    }

    // --- Step 1 ---

    pub fn submit_personal_info(&mut self, profile: RegistrationProfile) -> Result<(), RegistrationError> {
        self.require(WizardStep::PersonalInfo, "submit personal info")?;
        profile.validate()?;
        info!("[Registration] Personal info accepted for {}", profile.name);
        self.profile = Some(profile);
        self.consent = false;
        self.step = WizardStep::FaceVerification;
        Ok(())
    }

    // --- Step 2 ---

    pub fn give_consent(&mut self) -> Result<(), RegistrationError> {
        self.require(WizardStep::FaceVerification, "give consent")?;
        self.consent = true;
        Ok(())
    }

    /// Declining camera use returns to the personal-info step.
    pub async fn decline(&mut self) -> Result<(), RegistrationError> {
        self.require(WizardStep::FaceVerification, "decline consent")?;
        info!("[Registration] Camera consent declined");
        self.leave_face_step().await;
        Ok(())
    }

    pub async fn start_camera(&mut self) -> Result<(), RegistrationError> {
        self.require(WizardStep::FaceVerification, "start camera")?;
        if !self.consent {
            return Err(RegistrationError::ConsentRequired);
        }
        let mut adapter = self.capture.lock().await;
        match adapter.start().await {
            CaptureState::Streaming => Ok(()),
            _ => Err(RegistrationError::CameraUnavailable(
                adapter.error_message().unwrap_or(CAMERA_DENIED_MESSAGE).to_string(),
            )),
        }
    }

    /// Starts the countdown/blink sequence. Progress arrives on the returned
    /// receiver; `await_liveness` collects the result.
    pub async fn begin_liveness(&mut self) -> Result<mpsc::UnboundedReceiver<LivenessEvent>, RegistrationError> {
        self.require(WizardStep::FaceVerification, "begin liveness")?;
        if !self.consent {
            return Err(RegistrationError::ConsentRequired);
        }
        if self.liveness_active() {
            return Err(RegistrationError::LivenessInProgress);
        }
        if !self.capture.lock().await.is_streaming() {
            return Err(RegistrationError::CameraUnavailable("camera is not streaming".to_string()));
        }
        self.captured = None;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.run = Some(self.sequencer.start(self.capture.clone(), events_tx));
        Ok(events_rx)
    }

    pub async fn await_liveness(&mut self) -> Result<&EncodedImage, RegistrationError> {
        let run = self.run.take().ok_or(RegistrationError::NoLivenessRun)?;
        match run.finished().await {
            Ok(image) => {
                debug!("[Registration] Face captured ({})", image.fingerprint());
                Ok(self.captured.insert(image))
            }
            Err(e) => {
                warn!("[Registration] Liveness run failed: {}", e);
                Err(e.into())
            }
        }
    }

    pub fn cancel_liveness(&mut self) {
        if let Some(mut run) = self.run.take() {
            run.cancel();
        }
    }

    /// Discards the captured image and brings the camera back for another try.
    pub async fn retake(&mut self) -> Result<(), RegistrationError> {
        self.require(WizardStep::FaceVerification, "retake")?;
        self.cancel_liveness();
        self.captured = None;
        self.start_camera().await
    }

    pub fn confirm_capture(&mut self) -> Result<(), RegistrationError> {
        self.require(WizardStep::FaceVerification, "confirm capture")?;
        let image = self.captured.take().ok_or(RegistrationError::NoCapture)?;
        self.face_image = Some(image);
        self.last_error = None;
        self.step = WizardStep::Review;
        Ok(())
    }

    async fn leave_face_step(&mut self) {
        self.cancel_liveness();
        self.captured = None;
        self.consent = false;
        self.capture.lock().await.stop();
        self.step = WizardStep::PersonalInfo;
    }

    /// Step 2 goes back to step 1, cancelling any run. Step 3 goes back to
    /// step 2 with the image discarded.
    pub async fn back(&mut self) -> Result<(), RegistrationError> {
        match self.step {
            WizardStep::FaceVerification => {
                self.leave_face_step().await;
                Ok(())
            }
            WizardStep::Review => {
                self.face_image = None;
                self.last_error = None;
                self.step = WizardStep::FaceVerification;
                Ok(())
            }
            actual => Err(RegistrationError::WrongStep { actual, action: "go back" }),
        }
    }

    // --- Step 3 ---

    /// Posts the registration once. Success completes the wizard; anything
    /// else keeps it on review with the message for the user.
    pub async fn submit(&mut self) -> Result<RegistrationOutcome, RegistrationError> {
        self.require(WizardStep::Review, "submit")?;
        let image = self.face_image.as_ref().ok_or(RegistrationError::NoCapture)?;
        let profile = self
            .profile
            .as_ref()
            .ok_or(RegistrationError::WrongStep { actual: self.step, action: "submit without profile" })?;

        let outcome = self.submitter.submit_registration(profile, image).await;
        match &outcome.result {
            RegistrationResult::Registered { digital_id } => {
                self.digital_id = Some(digital_id.clone());
                self.last_error = None;
                self.step = WizardStep::Completed;
            }
            RegistrationResult::Rejected { message } => {
                self.last_error = Some(format!("Registration failed: {}", message));
            }
            RegistrationResult::TransportError(e) => {
                self.last_error = Some(format!("An unexpected error occurred: {}", e));
            }
        }
        Ok(outcome)
    }
}
