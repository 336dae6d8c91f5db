// Liveness module entry point

pub mod types;
pub mod run;
pub mod check;
pub mod sequencer;

// Re-export key types
pub use types::{LivenessError, LivenessEvent, LivenessStep};
pub use run::LivenessRun;
pub use check::{BlinkWindowCheck, LivenessCheck};
pub use sequencer::{LivenessHandle, LivenessSequencer, LivenessTiming};
