use std::time::Duration;

use log::{debug, warn};
use reqwest::Client;
use serde_json::Value;

use crate::config::ApiConfig;
use crate::error::SubmitError;
use crate::form::RegistrationRequest;

/// Backend that accepts beacon registrations.
pub trait RegistrationApi {
    async fn register(&self, request: &RegistrationRequest) -> Result<Value, SubmitError>;
}

#[derive(Clone, Debug)]
pub struct HttpRegistrationClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRegistrationClient {
    pub fn new(config: &ApiConfig) -> Result<Self, SubmitError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(HttpRegistrationClient {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/beacons_devices", self.base_url)
    }
}

impl RegistrationApi for HttpRegistrationClient {
    async fn register(&self, request: &RegistrationRequest) -> Result<Value, SubmitError> {
        debug!("Calling API: {:?}", request);

        let mut builder = self.client.post(self.endpoint()).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("Registration rejected with {}: {}", status, body);
            return Err(SubmitError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}
