use std::future::Future;
use std::time::Duration;

use btleplug::api::{Central as _, CentralEvent, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, PeripheralId};
use futures::{Stream, StreamExt as _};
use log::{debug, error, info, warn};
use mac_address::MacAddress;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::error::ListenerError;
use crate::ibeacon::{APPLE_COMPANY_ID, IBeaconFrame};
use crate::listener::{RangingSource, RangingSubscription};
use crate::messages::{BeaconReading, RangingWindow, Region};
use crate::permission::Permission;

/// Ranges iBeacons with a btleplug adapter.
pub struct BleRanger {
    adapter: Adapter,
    batch_interval: Duration,
}

impl BleRanger {
    pub fn new(adapter: Adapter, batch_interval: Duration) -> Self {
        BleRanger {
            adapter,
            batch_interval,
        }
    }
}

impl RangingSource for BleRanger {
    async fn request_permission(&mut self) -> Permission {
        match self.adapter.adapter_state().await {
            Ok(state) => {
                debug!("Adapter state: {:?}", state);
                Permission::from_adapter_state(state)
            }
            Err(err) => {
                warn!("Unable to read adapter state: {:?}", err);
                Permission::Denied
            }
        }
    }

    async fn start_ranging(
        &mut self,
        region: &Region,
    ) -> Result<RangingSubscription, ListenerError> {
        let events = self.adapter.events().await?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|err| ListenerError::Start(err.to_string()))?;
        info!("Beacon ranging started in region {}", region.id);

        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let resolver_adapter = self.adapter.clone();
        let resolve = move |event: CentralEvent| {
            let adapter = resolver_adapter.clone();
            async move {
                match event {
                    CentralEvent::DeviceDiscovered(id)
                    | CentralEvent::DeviceUpdated(id)
                    | CentralEvent::ManufacturerDataAdvertisement { id, .. } => {
                        read_beacon(&adapter, &id).await
                    }
                    _ => None,
                }
            }
        };

        let adapter = self.adapter.clone();
        let task_region = region.clone();
        let batch_interval = self.batch_interval;
        tokio::spawn(async move {
            let region_id = task_region.id.clone();
            ranging_loop(events, resolve, task_region, batch_interval, tx, shutdown_rx).await;

            if let Err(err) = adapter.stop_scan().await {
                error!("Error stopping scan: {:?}", err);
            }
            debug!("Ranging for region {} finished", region_id);
        });

        Ok(RangingSubscription::new(region.id.clone(), rx, shutdown_tx))
    }
}

/// Resolves events into readings and emits one batch per `batch_interval`,
/// empty batches included. Returns when shutdown is signalled, the event
/// stream ends, or the batch receiver is gone.
async fn ranging_loop<E, S, F, Fut>(
    mut events: S,
    mut resolve: F,
    region: Region,
    batch_interval: Duration,
    tx: mpsc::Sender<Vec<BeaconReading>>,
    mut shutdown: watch::Receiver<bool>,
) where
    S: Stream<Item = E> + Unpin,
    F: FnMut(E) -> Fut,
    Fut: Future<Output = Option<BeaconReading>>,
{
    let mut ticker = tokio::time::interval(batch_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut window = RangingWindow::default();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            event = events.next() => {
                match event {
                    Some(event) => {
                        if let Some(reading) = resolve(event).await {
                            if region.matches(&reading) {
                                window.record(reading);
                            }
                        }
                    }
                    None => {
                        debug!("No more adapter events");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if tx.send(window.drain()).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn read_beacon(adapter: &Adapter, id: &PeripheralId) -> Option<BeaconReading> {
    let peripheral = adapter.peripheral(id).await.ok()?;
    let properties = peripheral.properties().await.ok()??;
    let data = properties.manufacturer_data.get(&APPLE_COMPANY_ID)?;
    let frame = IBeaconFrame::parse(data).ok()?;
    let rssi = properties.rssi?;

    Some(frame.reading(rssi, MacAddress::new(properties.address.into_inner())))
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc::{UnboundedSender, unbounded};
    use tokio::task::JoinHandle;
    use uuid::Uuid;

    use super::*;
    use crate::messages::reading;

    const INSIDE: &str = "445e3f19-f76e-473d-bc40-a0f26686e8e2";
    const OUTSIDE: &str = "00000000-0000-0000-0000-000000000001";

    struct Harness {
        events: UnboundedSender<BeaconReading>,
        subscription: RangingSubscription,
        task: JoinHandle<()>,
    }

    fn spawn_loop() -> Harness {
        let (events_tx, events_rx) = unbounded();
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let region = Region {
            id: "REGION1".to_string(),
            proximity_uuid: Some(Uuid::parse_str(INSIDE).unwrap()),
        };

        let task = tokio::spawn(ranging_loop(
            events_rx,
            |reading: BeaconReading| async move { Some(reading) },
            region,
            Duration::from_secs(1),
            tx,
            shutdown_rx,
        ));

        Harness {
            events: events_tx,
            subscription: RangingSubscription::new("REGION1".to_string(), rx, shutdown_tx),
            task,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_per_window_filtered_by_region() {
        let mut harness = spawn_loop();
        harness.events.unbounded_send(reading(INSIDE, 1, 1, 0.5)).unwrap();
        harness.events.unbounded_send(reading(OUTSIDE, 1, 1, 0.01)).unwrap();
        harness.events.unbounded_send(reading(INSIDE, 1, 1, 0.02)).unwrap();
        harness.events.unbounded_send(reading(INSIDE, 2, 2, 3.0)).unwrap();

        let first = harness.subscription.next_batch().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!((first[0].major, first[0].distance), (1, 0.02));
        assert_eq!(first[1].major, 2);
        assert!(first.iter().all(|r| r.uuid == INSIDE));

        let second = harness.subscription.next_batch().await.unwrap();
        assert!(second.is_empty());

        harness.subscription.stop();
        harness.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_loop() {
        let mut harness = spawn_loop();
        harness.subscription.stop();

        tokio::time::timeout(Duration::from_secs(5), harness.task)
            .await
            .expect("ranging loop should exit after stop")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_receiver_ends_loop() {
        let (_events_tx, events_rx) = unbounded::<BeaconReading>();
        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let region = Region {
            id: "REGION1".to_string(),
            proximity_uuid: None,
        };
        drop(rx);

        let task = tokio::spawn(ranging_loop(
            events_rx,
            |reading: BeaconReading| async move { Some(reading) },
            region,
            Duration::from_secs(1),
            tx,
            shutdown_rx,
        ));

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("ranging loop should exit once nobody listens")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_stream_end_ends_loop() {
        let Harness {
            events,
            subscription,
            task,
        } = spawn_loop();
        drop(events);

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("ranging loop should exit when events end")
            .unwrap();
        assert!(!subscription.is_stopped());
    }
}
