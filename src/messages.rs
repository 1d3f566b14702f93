use mac_address::MacAddress;
use serde_derive::Serialize;
use uuid::Uuid;

/// Identity of the beacon picked for registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BeaconIdentity {
    pub uuid: String,
    pub major: u16,
    pub minor: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Proximity {
    Immediate,
    Near,
    Far,
    Unknown,
}

impl Proximity {
    pub fn from_distance(distance: f64) -> Self {
        match distance {
            d if d < 0.0 || d.is_nan() => Proximity::Unknown,
            d if d < 0.5 => Proximity::Immediate,
            d if d <= 4.0 => Proximity::Near,
            _ => Proximity::Far,
        }
    }
}

/// One ranged beacon, as seen during a single batch window.
#[derive(Clone, Debug, PartialEq)]
pub struct BeaconReading {
    pub uuid: String,
    pub major: u16,
    pub minor: u16,
    /// Estimated distance in meters, negative when unknown.
    pub distance: f64,
    pub proximity: Proximity,
    pub rssi: i16,
    pub tx_power: i8,
    pub address: MacAddress,
}

impl BeaconReading {
    pub fn identity(&self) -> BeaconIdentity {
        BeaconIdentity {
            uuid: self.uuid.clone(),
            major: self.major,
            minor: self.minor,
        }
    }

    fn same_beacon(&self, other: &BeaconReading) -> bool {
        self.uuid == other.uuid && self.major == other.major && self.minor == other.minor
    }
}

/// Scope of a ranging subscription. Without a proximity uuid every beacon matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub id: String,
    pub proximity_uuid: Option<Uuid>,
}

impl Region {
    pub fn matches(&self, reading: &BeaconReading) -> bool {
        match self.proximity_uuid {
            Some(uuid) => uuid.to_string().eq_ignore_ascii_case(&reading.uuid),
            None => true,
        }
    }
}

/// Readings collected between two batch emissions, kept in first-seen order.
#[derive(Debug, Default)]
pub struct RangingWindow {
    readings: Vec<BeaconReading>,
}

impl RangingWindow {
    pub fn record(&mut self, reading: BeaconReading) {
        match self.readings.iter_mut().find(|r| r.same_beacon(&reading)) {
            Some(existing) => *existing = reading,
            None => self.readings.push(reading),
        }
    }

    pub fn drain(&mut self) -> Vec<BeaconReading> {
        std::mem::take(&mut self.readings)
    }
}

#[cfg(test)]
pub(crate) fn reading(uuid: &str, major: u16, minor: u16, distance: f64) -> BeaconReading {
    BeaconReading {
        uuid: uuid.to_string(),
        major,
        minor,
        distance,
        proximity: Proximity::from_distance(distance),
        rssi: -40,
        tx_power: -59,
        address: MacAddress::new([0; 6]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proximity_from_distance() {
        assert_eq!(Proximity::from_distance(-1.0), Proximity::Unknown);
        assert_eq!(Proximity::from_distance(0.02), Proximity::Immediate);
        assert_eq!(Proximity::from_distance(2.0), Proximity::Near);
        assert_eq!(Proximity::from_distance(4.0), Proximity::Near);
        assert_eq!(Proximity::from_distance(12.5), Proximity::Far);
    }

    #[test]
    fn test_region_matching() {
        let any = Region {
            id: "REGION1".to_string(),
            proximity_uuid: None,
        };
        let scoped = Region {
            id: "REGION1".to_string(),
            proximity_uuid: Some(Uuid::parse_str("445e3f19-f76e-473d-bc40-a0f26686e8e2").unwrap()),
        };

        let inside = reading("445E3F19-F76E-473D-BC40-A0F26686E8E2", 1, 2, 1.0);
        let outside = reading("00000000-0000-0000-0000-000000000001", 1, 2, 1.0);

        assert!(any.matches(&outside));
        assert!(scoped.matches(&inside));
        assert!(!scoped.matches(&outside));
    }

    #[test]
    fn test_window_keeps_first_seen_order() {
        let mut window = RangingWindow::default();
        window.record(reading("a", 1, 1, 2.0));
        window.record(reading("b", 1, 1, 3.0));
        window.record(reading("a", 1, 1, 0.5));

        let batch = window.drain();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].uuid, "a");
        assert_eq!(batch[0].distance, 0.5);
        assert_eq!(batch[1].uuid, "b");
        assert!(window.drain().is_empty());
    }
}
