use log::info;
use tokio::sync::{mpsc, watch};

use crate::error::ListenerError;
use crate::messages::{BeaconReading, Region};
use crate::permission::Permission;

/// Something that can range beacons in a region, such as a BLE adapter.
pub trait RangingSource {
    async fn request_permission(&mut self) -> Permission;

    async fn start_ranging(
        &mut self,
        region: &Region,
    ) -> Result<RangingSubscription, ListenerError>;
}

/// Owned handle to an active ranging subscription.
///
/// Batches arrive on the channel until `stop` is called or the handle is
/// dropped. Stopping more than once is a no-op.
#[derive(Debug)]
pub struct RangingSubscription {
    region_id: String,
    batches: mpsc::Receiver<Vec<BeaconReading>>,
    shutdown: watch::Sender<bool>,
    stopped: bool,
}

impl RangingSubscription {
    pub fn new(
        region_id: String,
        batches: mpsc::Receiver<Vec<BeaconReading>>,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        RangingSubscription {
            region_id,
            batches,
            shutdown,
            stopped: false,
        }
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Next batch, or `None` once stopped or the ranging task has ended.
    pub async fn next_batch(&mut self) -> Option<Vec<BeaconReading>> {
        if self.stopped {
            return None;
        }
        self.batches.recv().await
    }

    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        info!("Stopping beacon listener for region {}", self.region_id);
        self.stopped = true;
        // The ranging task may already be gone.
        let _ = self.shutdown.send(true);
        self.batches.close();
    }
}

impl Drop for RangingSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
