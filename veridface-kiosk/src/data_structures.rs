use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use tokio::time::Instant;

pub const JPEG_MIME: &str = "image/jpeg";

// Which camera the stream should come from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

// Requested stream shape; the device may deliver something close to it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataUrlError {
    #[error("not a base64 data URL")]
    NotDataUrl,
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
}

/// A still frame sampled from the camera, already encoded by the device.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: Instant,
}

// Never dump the payload: frames are biometric data
impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl EncodedImage {
    pub fn jpeg(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        EncodedImage {
            mime_type: JPEG_MIME.to_string(),
            bytes,
            width,
            height,
            captured_at: Instant::now(),
        }
    }

    /// `data:<mime>;base64,<payload>`, the form both remote endpoints accept.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    pub fn from_data_url(url: &str, width: u32, height: u32) -> Result<Self, DataUrlError> {
        let rest = url.strip_prefix("data:").ok_or(DataUrlError::NotDataUrl)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUrlError::NotDataUrl)?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or(DataUrlError::NotDataUrl)?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| DataUrlError::InvalidBase64(e.to_string()))?;
        Ok(EncodedImage {
            mime_type: mime_type.to_string(),
            bytes,
            width,
            height,
            captured_at: Instant::now(),
        })
    }

    /// Short SHA-256 prefix used to refer to a frame in logs.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(&digest[..6])
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("name is required")]
    EmptyName,
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"))
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("static regex"))
}

fn phone_separators() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\s\-().]").expect("static regex"))
}

/// Personal details collected in the first registration step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationProfile {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl RegistrationProfile {
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        RegistrationProfile {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.name.trim().is_empty() {
            return Err(ProfileError::EmptyName);
        }
        if !email_pattern().is_match(self.email.trim()) {
            return Err(ProfileError::InvalidEmail(self.email.clone()));
        }
        let digits = phone_separators().replace_all(self.phone.trim(), "");
        if !phone_pattern().is_match(&digits) {
            return Err(ProfileError::InvalidPhone(self.phone.clone()));
        }
        Ok(())
    }
}
