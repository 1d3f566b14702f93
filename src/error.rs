use thiserror::Error;

use crate::form::FieldErrors;

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Bluetooth adapter error: {0}")]
    Adapter(#[from] btleplug::Error),

    #[error("Beacon ranging not started: {0}")]
    Start(String),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server responded with {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error(transparent)]
    RangingStart(#[from] ListenerError),

    #[error("Invalid registration: {0}")]
    Validation(FieldErrors),

    #[error("Registration failed: {0}")]
    Submission(#[from] SubmitError),

    #[error("No beacon selected yet")]
    NoBeaconSelected,
}
