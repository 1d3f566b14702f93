//! iBeacon advertisement decoding and distance estimation.

use mac_address::MacAddress;
use thiserror::Error;
use uuid::Uuid;

use crate::messages::{BeaconReading, Proximity};

/// https://bitbucket.org/bluetooth-SIG/public/src/main/assigned_numbers/company_identifiers/company_identifiers.yaml
pub const APPLE_COMPANY_ID: u16 = 0x004C;

const IBEACON_TYPE: u8 = 0x02;
const IBEACON_LENGTH: u8 = 0x15;
const FRAME_LEN: usize = 23;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),
    #[error("not an iBeacon frame (type {0:#04x}, length {1:#04x})")]
    NotIBeacon(u8, u8),
}

/// Payload of an iBeacon advertisement, without the company id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IBeaconFrame {
    pub uuid: Uuid,
    pub major: u16,
    pub minor: u16,
    /// Calibrated RSSI at one meter.
    pub measured_power: i8,
}

impl IBeaconFrame {
    pub fn parse(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < FRAME_LEN {
            return Err(FrameError::TooShort(data.len()));
        }
        if data[0] != IBEACON_TYPE || data[1] != IBEACON_LENGTH {
            return Err(FrameError::NotIBeacon(data[0], data[1]));
        }

        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&data[2..18]);

        Ok(IBeaconFrame {
            uuid: Uuid::from_bytes(uuid),
            major: u16::from_be_bytes([data[18], data[19]]),
            minor: u16::from_be_bytes([data[20], data[21]]),
            measured_power: data[22] as i8,
        })
    }

    pub fn reading(&self, rssi: i16, address: MacAddress) -> BeaconReading {
        let distance = estimate_distance(self.measured_power, rssi);
        BeaconReading {
            uuid: self.uuid.to_string(),
            major: self.major,
            minor: self.minor,
            distance,
            proximity: Proximity::from_distance(distance),
            rssi,
            tx_power: self.measured_power,
            address,
        }
    }
}

/// Log-distance fit used by the AltBeacon ranging library. Returns -1.0 when
/// the signal can't be used.
pub fn estimate_distance(tx_power: i8, rssi: i16) -> f64 {
    if rssi == 0 || tx_power == 0 {
        return -1.0;
    }

    let ratio = f64::from(rssi) / f64::from(tx_power);
    if ratio < 1.0 {
        ratio.powi(10)
    } else {
        0.89976 * ratio.powf(7.7095) + 0.111
    }
}
