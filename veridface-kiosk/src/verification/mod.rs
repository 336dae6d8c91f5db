// Handoff of captured images to the remote verification service

pub mod types;
pub mod interface;
pub mod http_backend;
pub mod submitter;

pub use types::{
    Confidence, MatchResult, OutcomeKind, RawResponse, RegistrationOutcome, RegistrationResult,
    TransportError, VerificationOutcome,
};
pub use interface::VerificationBackend;
pub use http_backend::HttpBackend;
pub use submitter::VerificationSubmitter;
