// Wire contract of the remote verification service and the decoded outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const SCAN_PATH: &str = "/facescanner";
pub const REGISTER_PATH: &str = "/register";
pub const USERS_PATH: &str = "/users";
pub const DASHBOARD_PATH: &str = "/dashboard";

pub const SUCCESS_STATUS: &str = "success";

// --- Requests ---

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ScanRequest {
    pub image: String, // base64 data URL
    pub venue: String,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub image: String, // base64 data URL
}

// --- Responses ---

/// A response as it came off the wire, before any interpretation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        RawResponse { status, body: body.into() }
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        RawResponse { status, body: value.to_string().into_bytes() }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ScanResponse {
    pub status: String,
    #[serde(rename = "match", default)]
    pub matched: Option<bool>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RegisterResponse {
    pub status: String,
    #[serde(default)]
    pub digital_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request to {endpoint} failed: {cause}")]
    Network { endpoint: String, cause: String },
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },
    #[error("malformed response from {endpoint} (HTTP {status}): {cause}")]
    MalformedResponse {
        endpoint: String,
        status: u16,
        cause: String,
    },
    #[error("{endpoint} reported failure (HTTP {status}): {message}")]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },
}

// --- Decoded outcomes ---

/// Match confidence in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    /// Clamps into [0, 1]; `None` for NaN or infinities.
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() {
            Some(Confidence(value.clamp(0.0, 1.0)))
        } else {
            None
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whole percentage as displayed on the kiosk (0.87 -> 87).
    pub fn percent(&self) -> u8 {
        (self.0 * 100.0).round() as u8
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeKind {
    Matched,
    NotMatched,
    TransportError,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MatchResult {
    Matched { subject_id: String, confidence: Confidence },
    NotMatched { message: Option<String> },
    TransportError(TransportError),
}

/// Result of one check-in submission. Produced once, never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationOutcome {
    pub result: MatchResult,
    pub timestamp: DateTime<Utc>,
}

impl VerificationOutcome {
    pub fn new(result: MatchResult) -> Self {
        VerificationOutcome { result, timestamp: Utc::now() }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self.result {
            MatchResult::Matched { .. } => OutcomeKind::Matched,
            MatchResult::NotMatched { .. } => OutcomeKind::NotMatched,
            MatchResult::TransportError(_) => OutcomeKind::TransportError,
        }
    }

    pub fn subject_id(&self) -> Option<&str> {
        match &self.result {
            MatchResult::Matched { subject_id, .. } => Some(subject_id),
            _ => None,
        }
    }

    /// Zero for anything but a match.
    pub fn confidence(&self) -> f64 {
        match &self.result {
            MatchResult::Matched { confidence, .. } => confidence.value(),
            _ => 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationResult {
    Registered { digital_id: String },
    Rejected { message: String },
    TransportError(TransportError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegistrationOutcome {
    pub result: RegistrationResult,
    pub timestamp: DateTime<Utc>,
}

impl RegistrationOutcome {
    pub fn new(result: RegistrationResult) -> Self {
        RegistrationOutcome { result, timestamp: Utc::now() }
    }

    pub fn digital_id(&self) -> Option<&str> {
        match &self.result {
            RegistrationResult::Registered { digital_id } => Some(digital_id),
            _ => None,
        }
    }
}
