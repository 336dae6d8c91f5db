// User-facing flows: the check-in screen and the registration wizard

pub mod presenter;
pub mod registration;

pub use presenter::{
    state_for_outcome, Fallback, PresentationState, PresenterCommand, PresenterHandle, SessionPresenter,
};
pub use registration::{RegistrationError, RegistrationWizard, WizardStep};
