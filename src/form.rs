use std::collections::BTreeMap;
use std::fmt;

use serde_derive::Serialize;

use crate::messages::BeaconIdentity;

pub const MAX_ALIAS_LEN: usize = 25;
pub const MAX_ALERT_DISTANCE: u32 = 999;
pub const BEACON_TYPE: &str = "type";

/// Raw text the user typed into the registration form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationInput {
    pub beacon_alias: String,
    pub distance_to_alert: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedInput {
    pub beacon_alias: String,
    pub distance_to_alert: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    BeaconAlias,
    DistanceToAlert,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::BeaconAlias => "beacon_alias",
            Field::DistanceToAlert => "distance_to_alert",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, msg)| (*field, msg.as_str()))
    }

    fn insert(&mut self, field: Field, message: &str) {
        self.0.insert(field, message.to_string());
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(field, msg)| format!("{}: {}", field.as_str(), msg))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl RegistrationInput {
    /// Checks every field and reports all failures at once.
    pub fn validate(&self) -> Result<ValidatedInput, FieldErrors> {
        let mut errors = FieldErrors::default();

        let alias = self.beacon_alias.trim();
        if alias.is_empty() {
            errors.insert(Field::BeaconAlias, "Alias is required");
        } else if alias.chars().count() > MAX_ALIAS_LEN {
            errors.insert(Field::BeaconAlias, "Alias must be at most 25 characters");
        }

        let distance = self.distance_to_alert.trim();
        let parsed = if distance.is_empty() {
            errors.insert(Field::DistanceToAlert, "Alert distance is required");
            None
        } else if !distance.chars().all(|c| c.is_ascii_digit()) {
            errors.insert(Field::DistanceToAlert, "Alert distance must be a number");
            None
        } else {
            match distance.parse::<u32>() {
                Ok(meters) if meters <= MAX_ALERT_DISTANCE => Some(meters),
                _ => {
                    errors.insert(
                        Field::DistanceToAlert,
                        "Alert distance must be at most 999 meters",
                    );
                    None
                }
            }
        };

        match parsed {
            Some(distance_to_alert) if errors.is_empty() => Ok(ValidatedInput {
                beacon_alias: alias.to_string(),
                distance_to_alert,
            }),
            _ => Err(errors),
        }
    }
}

/// Body of `POST /beacons_devices`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegistrationRequest {
    pub beacon_alias: String,
    pub beacon_type: &'static str,
    pub beacon_uuid: String,
    pub beacon_major: u16,
    pub beacon_minor: u16,
    pub distance_to_alert: u32,
}

impl RegistrationRequest {
    pub fn new(identity: &BeaconIdentity, input: ValidatedInput) -> Self {
        RegistrationRequest {
            beacon_alias: input.beacon_alias,
            beacon_type: BEACON_TYPE,
            beacon_uuid: identity.uuid.clone(),
            beacon_major: identity.major,
            beacon_minor: identity.minor,
            distance_to_alert: input.distance_to_alert,
        }
    }
}

/// Where registration input comes from. `None` means the user backed out.
pub trait FormSource {
    async fn fill(
        &mut self,
        identity: &BeaconIdentity,
        errors: &FieldErrors,
    ) -> Option<RegistrationInput>;

    /// Blocking notice shown when a submission fails.
    fn alert(&mut self, title: &str, message: &str);
}
