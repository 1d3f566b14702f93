use log::{debug, error, info, warn};
use serde_json::Value;

use crate::client::RegistrationApi;
use crate::config::ScanConfig;
use crate::error::EnrollError;
use crate::form::{FieldErrors, FormSource, RegistrationInput, RegistrationRequest};
use crate::listener::{RangingSource, RangingSubscription};
use crate::messages::{BeaconIdentity, BeaconReading, Region};
use crate::selector::{BeaconSelector, Selection};

const FAILURE_TITLE: &str = "Error registering beacon";
const FAILURE_MESSAGE: &str = "An error occurred while registering the beacon. Please try again.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnrollmentState {
    AwaitingBeacon,
    BeaconSelected(BeaconIdentity),
    Submitting(BeaconIdentity),
    Submitted(BeaconIdentity),
}

#[derive(Debug)]
pub enum Outcome {
    Registered(Value),
    WentBack,
    /// The user left after the last attempt was rejected.
    Failed(EnrollError),
}

/// Drives one registration: ranging, selection, form and submission.
pub struct Manager<R, A> {
    ranger: R,
    api: A,
    region: Region,
    selector: BeaconSelector,
    subscription: Option<RangingSubscription>,
    state: EnrollmentState,
}

impl<R: RangingSource, A: RegistrationApi> Manager<R, A> {
    pub fn new(ranger: R, api: A, scan: &ScanConfig) -> Self {
        Manager {
            ranger,
            api,
            region: scan.region(),
            selector: BeaconSelector::new(scan.acceptance_distance()),
            subscription: None,
            state: EnrollmentState::AwaitingBeacon,
        }
    }

    pub fn state(&self) -> &EnrollmentState {
        &self.state
    }

    pub fn listener_active(&self) -> bool {
        self.subscription.as_ref().is_some_and(|s| !s.is_stopped())
    }

    /// Runs the permission gate, then starts ranging. A denied permission
    /// is only logged.
    pub async fn start_listener(&mut self) -> Result<(), EnrollError> {
        info!("Starting beacon listener");
        self.ranger.request_permission().await.log();

        let subscription = self.ranger.start_ranging(&self.region).await?;
        debug!("Listening for beacons in region {}", subscription.region_id());
        self.subscription = Some(subscription);
        Ok(())
    }

    pub fn stop_listener(&mut self) {
        if let Some(subscription) = self.subscription.as_mut() {
            subscription.stop();
        }
    }

    pub fn handle_batch(&mut self, batch: &[BeaconReading]) -> Selection {
        let selection = self.selector.evaluate(batch);
        match &selection {
            Selection::Pending => {}
            Selection::Accepted(identity) => {
                self.stop_listener();
                self.state = EnrollmentState::BeaconSelected(identity.clone());
            }
            Selection::AlreadyAccepted => self.stop_listener(),
        }
        selection
    }

    /// Waits for a beacon to be selected. Without a live subscription this
    /// never returns.
    pub async fn await_beacon(&mut self) -> BeaconIdentity {
        loop {
            if let Some(identity) = self.selector.accepted() {
                return identity.clone();
            }

            let batch = match self.subscription.as_mut() {
                Some(subscription) => subscription.next_batch().await,
                None => None,
            };
            let Some(batch) = batch else {
                warn!("Beacon listener is not delivering batches, still awaiting beacon");
                return std::future::pending().await;
            };

            self.handle_batch(&batch);
        }
    }

    pub async fn submit(&mut self, input: &RegistrationInput) -> Result<Value, EnrollError> {
        let identity = match &self.state {
            EnrollmentState::BeaconSelected(identity) => identity.clone(),
            _ => return Err(EnrollError::NoBeaconSelected),
        };

        let validated = input.validate().map_err(EnrollError::Validation)?;
        let request = RegistrationRequest::new(&identity, validated);

        self.state = EnrollmentState::Submitting(identity.clone());
        match self.api.register(&request).await {
            Ok(body) => {
                info!("Beacon registered: {}", body);
                self.state = EnrollmentState::Submitted(identity);
                Ok(body)
            }
            Err(err) => {
                error!("Error registering beacon: {}", err);
                self.state = EnrollmentState::BeaconSelected(identity);
                Err(err.into())
            }
        }
    }

    pub fn go_back(&mut self) {
        self.stop_listener();
        info!("Leaving beacon registration");
    }

    pub async fn run<F: FormSource>(&mut self, form: &mut F) -> Outcome {
        if let Err(err) = self.start_listener().await {
            error!("{}", err);
        }

        println!("Bring the beacon close to this device");
        let identity = self.await_beacon().await;

        let mut errors = FieldErrors::default();
        let mut last_failure = None;
        loop {
            let Some(input) = form.fill(&identity, &errors).await else {
                self.go_back();
                return match last_failure {
                    Some(err) => Outcome::Failed(err),
                    None => Outcome::WentBack,
                };
            };

            match self.submit(&input).await {
                Ok(body) => return Outcome::Registered(body),
                Err(EnrollError::Validation(field_errors)) => {
                    debug!("Validation failed: {}", field_errors);
                    errors = field_errors.clone();
                    last_failure = Some(EnrollError::Validation(field_errors));
                }
                Err(err) => {
                    errors = FieldErrors::default();
                    last_failure = Some(err);
                    form.alert(FAILURE_TITLE, FAILURE_MESSAGE);
                }
            }
        }
    }
}
