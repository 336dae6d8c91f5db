use crate::data_structures::{EncodedImage, RegistrationProfile};
use crate::verification::types::RawResponse;
use serde_json::json;

/// A tiny JPEG-shaped frame whose content is determined by `tag`.
pub fn sample_jpeg(tag: u8) -> EncodedImage {
    EncodedImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xE0, tag, tag, 0xFF, 0xD9], 640, 640)
}

pub fn sample_profile() -> RegistrationProfile {
    RegistrationProfile::new("Aisyah Rahman", "aisyah@example.com", "+673 712 3456")
}

// Canned service answers, shaped like the real endpoints'

pub fn scan_matched(user_id: &str, confidence: f64) -> RawResponse {
    RawResponse::json(
        200,
        &json!({ "status": "success", "match": true, "user_id": user_id, "confidence": confidence }),
    )
}

pub fn scan_not_matched() -> RawResponse {
    RawResponse::json(200, &json!({ "status": "success", "match": false }))
}

pub fn registration_accepted(digital_id: &str) -> RawResponse {
    RawResponse::json(
        200,
        &json!({ "status": "success", "message": "User registered successfully", "digital_id": digital_id }),
    )
}

pub fn registration_failed(message: &str) -> RawResponse {
    RawResponse::json(500, &json!({ "status": "fail", "message": message }))
}
