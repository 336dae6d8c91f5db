use crate::data_structures::{EncodedImage, RegistrationProfile};
use crate::verification::interface::VerificationBackend;
use crate::verification::types::{
    Confidence, MatchResult, RawResponse, RegisterRequest, RegisterResponse, RegistrationOutcome,
    RegistrationResult, ScanRequest, ScanResponse, TransportError, VerificationOutcome, REGISTER_PATH,
    SCAN_PATH, SUCCESS_STATUS,
};
use log::{info, warn};
use std::sync::Arc;

/// Packages captured images into requests and decodes the answers into
/// closed outcome types. One attempt per call; nothing is retried here.
#[derive(Clone)]
pub struct VerificationSubmitter {
    backend: Arc<dyn VerificationBackend>,
}

impl VerificationSubmitter {
    pub fn new(backend: Arc<dyn VerificationBackend>) -> Self {
        VerificationSubmitter { backend }
    }

    pub async fn submit_for_match(&self, image: &EncodedImage, venue: &str) -> VerificationOutcome {
        let request = ScanRequest {
            image: image.to_data_url(),
            venue: venue.to_string(),
        };
        info!("[Submitter] Submitting frame {} for match at '{}'", image.fingerprint(), venue);

        let result = match self.backend.post_scan(&request).await {
            Ok(raw) => decode_scan_response(&raw),
            Err(e) => MatchResult::TransportError(e),
        };
        match &result {
            MatchResult::Matched { subject_id, confidence } => {
                info!("[Submitter] Matched {} ({})", subject_id, confidence)
            }
            MatchResult::NotMatched { .. } => info!("[Submitter] No match"),
            MatchResult::TransportError(e) => warn!("[Submitter] Scan failed: {}", e),
        }
        VerificationOutcome::new(result)
    }

    pub async fn submit_registration(
        &self,
        profile: &RegistrationProfile,
        image: &EncodedImage,
    ) -> RegistrationOutcome {
        let request = RegisterRequest {
            name: profile.name.clone(),
            email: profile.email.clone(),
            phone: profile.phone.clone(),
            image: image.to_data_url(),
        };
        info!("[Submitter] Submitting registration with frame {}", image.fingerprint());

        let result = match self.backend.post_registration(&request).await {
            Ok(raw) => decode_registration_response(&raw),
            Err(e) => RegistrationResult::TransportError(e),
        };
        match &result {
            RegistrationResult::Registered { digital_id } => {
                info!("[Submitter] Registration completed: {}", digital_id)
            }
            RegistrationResult::Rejected { message } => {
                warn!("[Submitter] Registration rejected: {}", message)
            }
            RegistrationResult::TransportError(e) => warn!("[Submitter] Registration failed: {}", e),
        }
        RegistrationOutcome::new(result)
    }
}

fn malformed(endpoint: &str, raw: &RawResponse, cause: impl ToString) -> TransportError {
    TransportError::MalformedResponse {
        endpoint: endpoint.to_string(),
        status: raw.status,
        cause: cause.to_string(),
    }
}

/// Interprets a `/facescanner` answer. The body is read whatever the HTTP
/// status: the service reports "no match" as a 404 with a JSON body.
pub fn decode_scan_response(raw: &RawResponse) -> MatchResult {
    let response: ScanResponse = match serde_json::from_slice(&raw.body) {
        Ok(response) => response,
        Err(e) => return MatchResult::TransportError(malformed(SCAN_PATH, raw, e)),
    };

    if response.status == SUCCESS_STATUS {
        if response.matched != Some(true) {
            return MatchResult::NotMatched { message: response.message };
        }
        let subject_id = match response.user_id {
            Some(id) if !id.is_empty() => id,
            _ => return MatchResult::TransportError(malformed(SCAN_PATH, raw, "match without user_id")),
        };
        let confidence = match response.confidence.map(Confidence::new) {
            Some(Some(confidence)) => confidence,
            _ => {
                return MatchResult::TransportError(malformed(SCAN_PATH, raw, "match without a valid confidence"))
            }
        };
        return MatchResult::Matched { subject_id, confidence };
    }

    // Any other status: an explicit negative is still a well-formed "no match"
    if response.matched == Some(false) {
        return MatchResult::NotMatched { message: response.message };
    }
    MatchResult::TransportError(TransportError::Rejected {
        endpoint: SCAN_PATH.to_string(),
        status: raw.status,
        message: response.message.unwrap_or_else(|| response.status.clone()),
    })
}

/// Interprets a `/register` answer.
pub fn decode_registration_response(raw: &RawResponse) -> RegistrationResult {
    let response: RegisterResponse = match serde_json::from_slice(&raw.body) {
        Ok(response) => response,
        Err(e) => return RegistrationResult::TransportError(malformed(REGISTER_PATH, raw, e)),
    };

    if response.status == SUCCESS_STATUS {
        return match response.digital_id {
            Some(digital_id) if !digital_id.is_empty() => RegistrationResult::Registered { digital_id },
            _ => RegistrationResult::TransportError(malformed(REGISTER_PATH, raw, "success without digital_id")),
        };
    }
    RegistrationResult::Rejected {
        message: response
            .message
            .unwrap_or_else(|| "Registration failed".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::mocks::MockVerificationBackend;
    use crate::test_utils::{sample_jpeg, sample_profile};
    use crate::verification::types::OutcomeKind;
    use serde_json::json;

    fn raw(status: u16, body: serde_json::Value) -> RawResponse {
        RawResponse::json(status, &body)
    }

    #[test]
    fn success_with_match_is_matched() {
        let result = decode_scan_response(&raw(
            200,
            json!({"status": "success", "match": true, "user_id": "BIL-001", "confidence": 0.87}),
        ));
        match result {
            MatchResult::Matched { subject_id, confidence } => {
                assert_eq!(subject_id, "BIL-001");
                assert_eq!(confidence.percent(), 87);
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn success_without_match_is_not_matched() {
        let explicit = decode_scan_response(&raw(200, json!({"status": "success", "match": false})));
        assert_eq!(explicit, MatchResult::NotMatched { message: None });

        let absent = decode_scan_response(&raw(200, json!({"status": "success"})));
        assert_eq!(absent, MatchResult::NotMatched { message: None });
    }

    #[test]
    fn service_404_no_match_is_not_matched() {
        let result = decode_scan_response(&raw(
            404,
            json!({"status": "fail", "match": false, "message": "No match found"}),
        ));
        assert_eq!(result, MatchResult::NotMatched { message: Some("No match found".into()) });
    }

    #[test]
    fn service_fault_is_rejected_transport_error() {
        let result = decode_scan_response(&raw(500, json!({"status": "fail", "message": "list index out of range"})));
        assert_eq!(
            result,
            MatchResult::TransportError(TransportError::Rejected {
                endpoint: SCAN_PATH.into(),
                status: 500,
                message: "list index out of range".into(),
            })
        );
    }

    #[test]
    fn garbage_body_is_malformed() {
        let result = decode_scan_response(&RawResponse::new(502, "<html>Bad Gateway</html>"));
        assert!(matches!(
            result,
            MatchResult::TransportError(TransportError::MalformedResponse { status: 502, .. })
        ));
    }

    #[test]
    fn match_missing_fields_is_malformed() {
        let no_id = decode_scan_response(&raw(200, json!({"status": "success", "match": true, "confidence": 0.5})));
        assert!(matches!(no_id, MatchResult::TransportError(TransportError::MalformedResponse { .. })));

        let no_conf = decode_scan_response(&raw(200, json!({"status": "success", "match": true, "user_id": "BIL-1"})));
        assert!(matches!(no_conf, MatchResult::TransportError(TransportError::MalformedResponse { .. })));
    }

    #[test]
    fn registration_decoding() {
        assert_eq!(
            decode_registration_response(&raw(200, json!({"status": "success", "digital_id": "BIL-4821"}))),
            RegistrationResult::Registered { digital_id: "BIL-4821".into() }
        );
        assert_eq!(
            decode_registration_response(&raw(400, json!({"status": "fail", "message": "No face detected"}))),
            RegistrationResult::Rejected { message: "No face detected".into() }
        );
        assert_eq!(
            decode_registration_response(&raw(500, json!({"status": "fail"}))),
            RegistrationResult::Rejected { message: "Registration failed".into() }
        );
        assert!(matches!(
            decode_registration_response(&raw(200, json!({"status": "success"}))),
            RegistrationResult::TransportError(TransportError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn submit_for_match_sends_data_url_and_venue() {
        let backend = MockVerificationBackend::new();
        backend.push_scan(Ok(raw(
            200,
            json!({"status": "success", "match": true, "user_id": "BIL-001", "confidence": 0.87}),
        )));
        let submitter = VerificationSubmitter::new(Arc::new(backend.clone()));
        let image = sample_jpeg(7);

        let outcome = submitter.submit_for_match(&image, "Innovation Lab").await;
        assert_eq!(outcome.kind(), OutcomeKind::Matched);

        let sent = backend.scan_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].image, image.to_data_url());
        assert_eq!(sent[0].venue, "Innovation Lab");
    }

    #[tokio::test]
    async fn transport_failure_preserves_cause() {
        let backend = MockVerificationBackend::new();
        backend.push_scan(Err(TransportError::Network {
            endpoint: "http://kiosk/facescanner".into(),
            cause: "connection refused".into(),
        }));
        let submitter = VerificationSubmitter::new(Arc::new(backend));

        let outcome = submitter.submit_for_match(&sample_jpeg(1), "Lab").await;
        match outcome.result {
            MatchResult::TransportError(e) => assert!(e.to_string().contains("connection refused")),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn submit_registration_sends_profile_fields() {
        let backend = MockVerificationBackend::new();
        backend.push_registration(Ok(raw(200, json!({"status": "success", "digital_id": "BIL-1234"}))));
        let submitter = VerificationSubmitter::new(Arc::new(backend.clone()));
        let profile = sample_profile();

        let outcome = submitter.submit_registration(&profile, &sample_jpeg(3)).await;
        assert_eq!(outcome.digital_id(), Some("BIL-1234"));

        let sent = backend.register_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, profile.name);
        assert_eq!(sent[0].email, profile.email);
        assert_eq!(sent[0].phone, profile.phone);
        assert!(sent[0].image.starts_with("data:image/jpeg;base64,"));
    }
}
