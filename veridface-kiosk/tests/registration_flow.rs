// veridface-kiosk/tests/registration_flow.rs

// Registration wizard from personal details to digital ID, including the
// paths that abandon a liveness run part way.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use veridface_kiosk::{
    capture::{CaptureState, MediaCaptureAdapter, SharedCapture},
    config::KioskConfig,
    data_structures::EncodedImage,
    liveness::{LivenessEvent, LivenessSequencer},
    session::{RegistrationWizard, WizardStep},
    simulation::mocks::{MockCamera, MockVerificationBackend},
    test_utils::{registration_accepted, registration_failed, sample_profile},
    verification::{RegistrationResult, VerificationSubmitter},
};

fn setup(camera: &MockCamera, backend: &MockVerificationBackend) -> (RegistrationWizard, SharedCapture) {
    let config = KioskConfig::default();
    let capture = MediaCaptureAdapter::from_config(Arc::new(camera.clone()), &config).into_shared();
    let wizard = RegistrationWizard::new(
        capture.clone(),
        LivenessSequencer::from_config(&config),
        VerificationSubmitter::new(Arc::new(backend.clone())),
    );
    (wizard, capture)
}

async fn ready_for_capture(wizard: &mut RegistrationWizard) {
    wizard.submit_personal_info(sample_profile()).unwrap();
    wizard.give_consent().unwrap();
    wizard.start_camera().await.unwrap();
}

fn countdown_values(rx: &mut mpsc::UnboundedReceiver<LivenessEvent>) -> Vec<u32> {
    let mut values = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let LivenessEvent::Countdown(n) = event {
            values.push(n);
        }
    }
    values
}

#[tokio::test(start_paused = true)]
async fn completes_with_digital_id() {
    let camera = MockCamera::granting();
    let backend = MockVerificationBackend::new();
    backend.push_registration(Ok(registration_accepted("BIL-7KQ2")));
    let (mut wizard, capture) = setup(&camera, &backend);

    ready_for_capture(&mut wizard).await;
    assert_eq!(wizard.progress(), (2, 3));

    let mut events = wizard.begin_liveness().await.unwrap();
    let captured = wizard.await_liveness().await.unwrap().clone();
    assert_eq!(captured.bytes, MockCamera::frame_bytes(2));
    assert_eq!(countdown_values(&mut events), vec![3, 2, 1, 0]);
    assert_eq!(capture.lock().await.state(), CaptureState::Stopped);

    wizard.confirm_capture().unwrap();
    assert_eq!(wizard.step(), WizardStep::Review);

    let outcome = wizard.submit().await.unwrap();
    assert_eq!(outcome.digital_id(), Some("BIL-7KQ2"));
    assert_eq!(wizard.step(), WizardStep::Completed);
    assert_eq!(wizard.digital_id(), Some("BIL-7KQ2"));

    let sent = backend.register_requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name, sample_profile().name);
    let submitted = EncodedImage::from_data_url(&sent[0].image, 640, 640).unwrap();
    assert_eq!(submitted.bytes, MockCamera::frame_bytes(2));
}

#[tokio::test(start_paused = true)]
async fn failed_submission_stays_on_review_until_resubmitted() {
    let camera = MockCamera::granting();
    let backend = MockVerificationBackend::new();
    backend.push_registration(Ok(registration_failed("No face detected in image")));
    backend.push_registration(Ok(registration_accepted("BIL-0001")));
    let (mut wizard, _capture) = setup(&camera, &backend);

    ready_for_capture(&mut wizard).await;
    let _events = wizard.begin_liveness().await.unwrap();
    wizard.await_liveness().await.unwrap();
    wizard.confirm_capture().unwrap();

    let first = wizard.submit().await.unwrap();
    assert_eq!(
        first.result,
        RegistrationResult::Rejected { message: "No face detected in image".into() }
    );
    assert_eq!(wizard.step(), WizardStep::Review);
    assert_eq!(wizard.last_error(), Some("Registration failed: No face detected in image"));
    assert_eq!(backend.register_requests().len(), 1);

    wizard.submit().await.unwrap();
    assert_eq!(wizard.step(), WizardStep::Completed);
    assert_eq!(wizard.last_error(), None);
    assert_eq!(backend.register_requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn back_mid_countdown_cancels_run_and_releases_camera() {
    let camera = MockCamera::granting();
    let backend = MockVerificationBackend::new();
    let (mut wizard, capture) = setup(&camera, &backend);

    ready_for_capture(&mut wizard).await;
    let mut events = wizard.begin_liveness().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    wizard.back().await.unwrap();
    assert_eq!(wizard.step(), WizardStep::PersonalInfo);
    assert!(!wizard.has_consent());
    assert_eq!(capture.lock().await.state(), CaptureState::Stopped);
    assert_eq!(countdown_values(&mut events), vec![3, 2]);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(camera.snapshot_count(), 0);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn retake_discards_image_and_runs_again() {
    let camera = MockCamera::granting();
    let backend = MockVerificationBackend::new();
    let (mut wizard, capture) = setup(&camera, &backend);

    ready_for_capture(&mut wizard).await;
    let _events = wizard.begin_liveness().await.unwrap();
    wizard.await_liveness().await.unwrap();
    assert!(wizard.captured_image().is_some());

    // The run stopped the camera; retake brings it back
    wizard.retake().await.unwrap();
    assert!(wizard.captured_image().is_none());
    assert_eq!(capture.lock().await.state(), CaptureState::Streaming);
    assert_eq!(camera.acquire_count(), 2);

    let _events = wizard.begin_liveness().await.unwrap();
    let second = wizard.await_liveness().await.unwrap();
    assert_eq!(second.bytes, MockCamera::frame_bytes(4));
}

#[tokio::test(start_paused = true)]
async fn retake_mid_run_prevents_capture() {
    let camera = MockCamera::granting();
    let backend = MockVerificationBackend::new();
    let (mut wizard, capture) = setup(&camera, &backend);

    ready_for_capture(&mut wizard).await;
    let _events = wizard.begin_liveness().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(wizard.liveness_active());

    wizard.retake().await.unwrap();
    assert!(!wizard.liveness_active());
    // Still streaming, so the camera is not re-acquired
    assert_eq!(camera.acquire_count(), 1);
    assert_eq!(capture.lock().await.state(), CaptureState::Streaming);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(camera.snapshot_count(), 0);
}
