// Client-side core of the VerIDFace check-in kiosk and registration wizard.

pub mod config;
pub mod data_structures;
pub mod timers;

pub mod capture;
pub mod liveness;
pub mod verification;

// Front-end flows built on the components above
pub mod session;
pub mod directory;

pub mod simulation;
pub mod test_utils; // Shared fixtures for unit and scenario tests
