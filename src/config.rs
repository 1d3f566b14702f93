use std::time::Duration;

use serde_derive::Deserialize;
use uuid::Uuid;

use crate::messages::Region;

pub const DEFAULT_REGION_ID: &str = "REGION1";
pub const DEFAULT_ACCEPTANCE_DISTANCE_METERS: f64 = 0.03;
const DEFAULT_BATCH_INTERVAL_MS: u64 = 1000;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub scan: Option<ScanConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ScanConfig {
    pub region_id: Option<String>,
    pub proximity_uuid: Option<Uuid>,
    pub acceptance_distance_meters: Option<f64>,
    pub batch_interval_ms: Option<u64>,
}

impl ScanConfig {
    pub fn region(&self) -> Region {
        Region {
            id: self
                .region_id
                .clone()
                .unwrap_or(DEFAULT_REGION_ID.to_string()),
            proximity_uuid: self.proximity_uuid,
        }
    }

    pub fn acceptance_distance(&self) -> f64 {
        self.acceptance_distance_meters
            .unwrap_or(DEFAULT_ACCEPTANCE_DISTANCE_METERS)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms.unwrap_or(DEFAULT_BATCH_INTERVAL_MS))
    }
}

impl AppConfig {
    pub fn scan(&self) -> ScanConfig {
        self.scan.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config() {
        let config_str = r#"
            [api]
            base_url = "http://localhost:3333"
            token = "secret"

            [scan]
            region_id = "LOBBY"
            proximity_uuid = "445e3f19-f76e-473d-bc40-a0f26686e8e2"
            acceptance_distance_meters = 0.05
            batch_interval_ms = 500
        "#;
        let config: AppConfig = toml::de::from_str(config_str).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:3333");
        assert_eq!(config.api.token.as_deref(), Some("secret"));
        assert!(config.api.timeout_seconds.is_none());

        let scan = config.scan();
        let region = scan.region();
        assert_eq!(region.id, "LOBBY");
        assert_eq!(
            region.proximity_uuid.map(|u| u.to_string()).as_deref(),
            Some("445e3f19-f76e-473d-bc40-a0f26686e8e2")
        );
        assert_eq!(scan.acceptance_distance(), 0.05);
        assert_eq!(scan.batch_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_scan_defaults() {
        let config_str = r#"
            [api]
            base_url = "https://api.example.com"
        "#;
        let config: AppConfig = toml::de::from_str(config_str).unwrap();
        assert!(config.scan.is_none());

        let scan = config.scan();
        assert_eq!(scan.region().id, "REGION1");
        assert!(scan.region().proximity_uuid.is_none());
        assert_eq!(scan.acceptance_distance(), 0.03);
        assert_eq!(scan.batch_interval(), Duration::from_secs(1));
    }
}
