use log::{debug, info};

use crate::messages::{BeaconIdentity, BeaconReading};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Nothing in the batch was close enough.
    Pending,
    Accepted(BeaconIdentity),
    /// A beacon was already fixed; the batch was ignored.
    AlreadyAccepted,
}

/// Picks the beacon to register from ranged batches.
///
/// A reading qualifies when its distance is in `(0, threshold]`. When several
/// readings in one batch qualify, the earliest in arrival order wins, not the
/// nearest. Once a beacon is accepted the selection never changes.
#[derive(Debug)]
pub struct BeaconSelector {
    threshold: f64,
    accepted: Option<BeaconIdentity>,
}

impl BeaconSelector {
    pub fn new(threshold: f64) -> Self {
        BeaconSelector {
            threshold,
            accepted: None,
        }
    }

    pub fn accepted(&self) -> Option<&BeaconIdentity> {
        self.accepted.as_ref()
    }

    pub fn evaluate(&mut self, batch: &[BeaconReading]) -> Selection {
        if !batch.is_empty() {
            debug!("Found {} beacons: {:?}", batch.len(), batch);
        }

        if let Some(identity) = &self.accepted {
            debug!("Beacon already found, ignoring batch: {}", identity.uuid);
            return Selection::AlreadyAccepted;
        }

        match batch.iter().find(|r| self.qualifies(r)) {
            Some(reading) => {
                info!(
                    "Beacon to use: {} major={} minor={} distance={:.3}m ({:?}) rssi={} tx_power={} address={}",
                    reading.uuid,
                    reading.major,
                    reading.minor,
                    reading.distance,
                    reading.proximity,
                    reading.rssi,
                    reading.tx_power,
                    reading.address
                );
                let identity = reading.identity();
                self.accepted = Some(identity.clone());
                Selection::Accepted(identity)
            }
            None => Selection::Pending,
        }
    }

    fn qualifies(&self, reading: &BeaconReading) -> bool {
        reading.distance > 0.0 && reading.distance <= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ACCEPTANCE_DISTANCE_METERS;
    use crate::messages::reading;

    fn selector() -> BeaconSelector {
        BeaconSelector::new(DEFAULT_ACCEPTANCE_DISTANCE_METERS)
    }

    #[test]
    fn test_no_qualifying_reading_leaves_selection_unset() {
        let mut selector = selector();
        let batches = [
            vec![],
            vec![reading("a", 1, 1, 0.0)],
            vec![reading("b", 1, 1, -1.0), reading("c", 1, 1, 0.5)],
            vec![reading("d", 1, 1, 12.0)],
        ];
        for batch in &batches {
            assert_eq!(selector.evaluate(batch), Selection::Pending);
        }
        assert!(selector.accepted().is_none());
    }

    #[test]
    fn test_inclusive_upper_bound() {
        let mut selector = selector();
        let selection = selector.evaluate(&[reading("X", 7, 8, 0.03)]);
        assert_eq!(
            selection,
            Selection::Accepted(BeaconIdentity {
                uuid: "X".to_string(),
                major: 7,
                minor: 8,
            })
        );
    }

    #[test]
    fn test_just_over_threshold_rejected() {
        let mut selector = selector();
        assert_eq!(selector.evaluate(&[reading("X", 7, 8, 0.031)]), Selection::Pending);
        assert!(selector.accepted().is_none());
    }

    #[test]
    fn test_accepted_identity_not_overwritten() {
        let mut selector = selector();
        selector.evaluate(&[reading("first", 1, 1, 0.01)]);

        let selection = selector.evaluate(&[reading("second", 2, 2, 0.02)]);
        assert_eq!(selection, Selection::AlreadyAccepted);
        assert_eq!(selector.accepted().unwrap().uuid, "first");
    }

    #[test]
    fn test_arrival_order_wins_over_nearest() {
        let mut selector = selector();
        let batch = [
            reading("far", 1, 1, 1.5),
            reading("early", 1, 1, 0.025),
            reading("nearest", 1, 1, 0.005),
        ];
        match selector.evaluate(&batch) {
            Selection::Accepted(identity) => assert_eq!(identity.uuid, "early"),
            other => panic!("unexpected selection: {other:?}"),
        }
    }

    #[test]
    fn test_custom_threshold() {
        let mut selector = BeaconSelector::new(0.5);
        assert!(matches!(
            selector.evaluate(&[reading("a", 1, 1, 0.4)]),
            Selection::Accepted(_)
        ));
    }
}
