//! Group registrar task: indexes the device cells of one group

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::actor::{ActorId, Lifeline, Monitor, ReplyTo};
use crate::device::{DeviceCell, DeviceHandle, DeviceIdentity, DeviceMessage, TrackDevice};
use crate::query::GatherQuery;
use crate::registry::RegistryConfig;

use super::handle::GroupHandle;
use super::messages::{GroupMessage, ReplyDeviceList, RespondAllTemperatures};

/// Owns the device cells of one group
///
/// `device_id_to_device` and `actor_to_device_id` are kept as exact duals; every
/// cell in them was spawned here and is watched by `monitor`.
pub struct GroupRegistrar {
    group_id: String,
    config: RegistryConfig,
    device_id_to_device: HashMap<String, DeviceHandle>,
    actor_to_device_id: HashMap<ActorId, String>,
    monitor: Monitor<GroupMessage>,
    rx: mpsc::Receiver<GroupMessage>,
    lifeline: Lifeline,
}

impl GroupRegistrar {
    /// Spawn a registrar task and return its handle
    pub fn spawn(group_id: impl Into<String>, config: RegistryConfig) -> GroupHandle {
        let (registrar, handle) = Self::new(group_id.into(), config);
        tokio::spawn(registrar.run());
        handle
    }

    fn new(group_id: String, config: RegistryConfig) -> (Self, GroupHandle) {
        let (tx, rx) = mpsc::channel(config.mailbox_buffer);
        let (lifeline, exit) = Lifeline::new(ActorId::next());

        let handle = GroupHandle::new(group_id.clone(), tx.clone(), exit, config.query_timeout());
        let registrar = Self {
            group_id,
            config,
            device_id_to_device: HashMap::new(),
            actor_to_device_id: HashMap::new(),
            monitor: Monitor::new(&tx),
            rx,
            lifeline,
        };
        (registrar, handle)
    }

    async fn run(mut self) {
        info!(group_id = %self.group_id, actor = %self.lifeline.id(), "DeviceGroup started");

        while let Some(msg) = self.rx.recv().await {
            match msg {
                GroupMessage::TrackDevice(track) => self.on_track_device(track),

                GroupMessage::ListDevices { request_id, reply_to } => {
                    let reply = ReplyDeviceList {
                        request_id,
                        device_ids: self.device_id_to_device.keys().cloned().collect(),
                    };
                    reply_to.send(reply).await;
                }

                GroupMessage::RequestAllTemperatures {
                    request_id,
                    reply_to,
                    timeout,
                } => self.on_request_all_temperatures(request_id, reply_to, timeout),

                GroupMessage::DeviceTerminated { device } => self.on_device_terminated(device),

                GroupMessage::Stop => {
                    debug!(group_id = %self.group_id, "Stop requested");
                    break;
                }
            }
        }

        self.stop_devices().await;
        self.lifeline.exit();
        info!(group_id = %self.group_id, "DeviceGroup stopped");
    }

    fn on_track_device(&mut self, track: TrackDevice) {
        if track.group_id != self.group_id {
            warn!(
                requested_group = %track.group_id,
                group_id = %self.group_id,
                "Ignoring TrackDevice request for another group"
            );
            return;
        }

        let existing = self.device_id_to_device.get(&track.device_id).cloned();
        let device = match existing {
            Some(device) if !device.has_exited() => device,
            Some(stale) => {
                // Exited but its notice is still in flight: replace it, never reuse it
                self.forget(stale.id());
                self.create_device(&track.device_id)
            }
            None => self.create_device(&track.device_id),
        };

        // Never wait on a child's mailbox; a dropped request surfaces as NoReply to its sender
        if let Err(e) = device.try_send(DeviceMessage::TrackDevice(track)) {
            warn!(group_id = %self.group_id, error = %e, "Failed to forward TrackDevice");
        }
    }

    fn create_device(&mut self, device_id: &str) -> DeviceHandle {
        info!(group_id = %self.group_id, %device_id, "Creating device cell");
        let device = DeviceCell::spawn(
            DeviceIdentity::new(&self.group_id, device_id),
            self.config.mailbox_buffer,
        );
        self.adopt(device.clone());
        device
    }

    /// Index a cell under its device id and watch it
    fn adopt(&mut self, device: DeviceHandle) {
        self.monitor
            .watch(device.exit_watch(), |device| GroupMessage::DeviceTerminated { device });
        self.actor_to_device_id.insert(device.id(), device.device_id().to_string());
        self.device_id_to_device.insert(device.device_id().to_string(), device);
    }

    fn on_request_all_temperatures(
        &self,
        request_id: u64,
        reply_to: ReplyTo<RespondAllTemperatures>,
        timeout: Duration,
    ) {
        let snapshot: Vec<DeviceHandle> = self.device_id_to_device.values().cloned().collect();
        debug!(
            group_id = %self.group_id,
            request_id,
            devices = snapshot.len(),
            "Spawning temperature query"
        );
        GatherQuery::spawn(snapshot, request_id, reply_to, timeout);
    }

    fn on_device_terminated(&mut self, device: ActorId) {
        match self.actor_to_device_id.get(&device) {
            Some(device_id) => {
                info!(group_id = %self.group_id, %device_id, "Device cell has been terminated");
                self.forget(device);
            }
            None => debug!(group_id = %self.group_id, %device, "Ignoring notice for an untracked device"),
        }
    }

    /// Drop a cell from both maps
    fn forget(&mut self, device: ActorId) {
        self.monitor.unwatch(device);
        if let Some(device_id) = self.actor_to_device_id.remove(&device) {
            self.device_id_to_device.remove(&device_id);
        }
    }

    /// Stop every cell and wait for them to exit
    async fn stop_devices(&mut self) {
        let devices: Vec<DeviceHandle> = self.device_id_to_device.drain().map(|(_, device)| device).collect();
        self.actor_to_device_id.clear();

        for device in &devices {
            let _ = device.stop().await;
        }
        join_all(devices.iter().map(DeviceHandle::stopped)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::TemperatureReading;
    use std::collections::BTreeSet;

    fn spawn_group() -> GroupHandle {
        GroupRegistrar::spawn("group", RegistryConfig::default())
    }

    /// A device the test drives by hand, adopted by the registrar like a real cell
    struct FakeDevice {
        rx: mpsc::Receiver<DeviceMessage>,
        lifeline: Lifeline,
    }

    /// Spawn a registrar that already owns one fake device with the given mailbox size
    fn spawn_group_with_fake(device_id: &str, capacity: usize) -> (GroupHandle, DeviceHandle, FakeDevice) {
        let (mut registrar, group) = GroupRegistrar::new("group".to_string(), RegistryConfig::default());
        let (tx, rx) = mpsc::channel(capacity);
        let (lifeline, exit) = Lifeline::new(ActorId::next());
        let device = DeviceHandle::new(DeviceIdentity::new("group", device_id), tx, exit);
        registrar.adopt(device.clone());
        tokio::spawn(registrar.run());
        (group, device, FakeDevice { rx, lifeline })
    }

    async fn expect_read(fake: &mut FakeDevice) {
        match tokio::time::timeout(Duration::from_secs(1), fake.rx.recv()).await {
            Ok(Some(DeviceMessage::ReadTemperature { .. })) => {}
            other => panic!("expected ReadTemperature, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_device_cells() {
        let group = spawn_group();

        let device1 = group.track_device("device1").await.unwrap();
        let device2 = group.track_device("device2").await.unwrap();
        assert_ne!(device1, device2);
        assert_eq!(device1.device_id(), "device1");
        assert_eq!(device2.group_id(), "group");

        assert_eq!(device1.record_temperature(0, 1.0).await.unwrap().request_id, 0);
        assert_eq!(device2.record_temperature(1, 2.0).await.unwrap().request_id, 1);
    }

    #[tokio::test]
    async fn test_return_same_cell_for_same_device_id() {
        let group = spawn_group();

        let first = group.track_device("device1").await.unwrap();
        let second = group.track_device("device1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_ignore_requests_for_wrong_group_id() {
        let group = spawn_group();
        let (probe_tx, mut probe_rx) = mpsc::channel(4);

        group
            .send(GroupMessage::TrackDevice(TrackDevice {
                group_id: "wrongGroup".to_string(),
                device_id: "device1".to_string(),
                reply_to: ReplyTo::Mailbox(probe_tx),
            }))
            .await
            .unwrap();

        let reply = tokio::time::timeout(Duration::from_millis(100), probe_rx.recv()).await;
        assert!(reply.is_err(), "expected no reply for a foreign group");

        let listed = group.list_devices(0).await.unwrap();
        assert!(listed.device_ids.is_empty());
    }

    #[tokio::test]
    async fn test_list_active_devices() {
        let group = spawn_group();
        group.track_device("device1").await.unwrap();
        group.track_device("device2").await.unwrap();

        let reply = group.list_devices(0).await.unwrap();
        assert_eq!(reply.request_id, 0);
        let expected: BTreeSet<String> = ["device1", "device2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(reply.device_ids, expected);
    }

    #[tokio::test]
    async fn test_list_active_devices_after_one_shuts_down() {
        let group = spawn_group();
        let to_shut_down = group.track_device("device1").await.unwrap();
        group.track_device("device2").await.unwrap();

        let reply = group.list_devices(0).await.unwrap();
        assert_eq!(reply.device_ids.len(), 2);

        to_shut_down.stop().await.unwrap();
        to_shut_down.stopped().await;

        // The termination notice is asynchronous; poll until it lands
        let mut remaining = BTreeSet::new();
        for request_id in 1..=20 {
            remaining = group.list_devices(request_id).await.unwrap().device_ids;
            if remaining.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let expected: BTreeSet<String> = ["device2".to_string()].into_iter().collect();
        assert_eq!(remaining, expected);
    }

    #[tokio::test]
    async fn test_replace_stopped_device_with_fresh_cell() {
        let group = spawn_group();
        let old = group.track_device("device1").await.unwrap();
        old.stop().await.unwrap();
        old.stopped().await;

        let fresh = group.track_device("device1").await.unwrap();
        assert_ne!(old, fresh);
        assert!(!fresh.has_exited());
    }

    #[tokio::test]
    async fn test_collect_temperatures_from_all_active_devices() {
        let group = spawn_group();
        let device1 = group.track_device("device1").await.unwrap();
        let device2 = group.track_device("device2").await.unwrap();
        group.track_device("device3").await.unwrap();

        device1.record_temperature(0, 1.0).await.unwrap();
        device2.record_temperature(1, 2.0).await.unwrap();
        // No temperature for device3

        let response = group.request_all_temperatures(0).await.unwrap();
        assert_eq!(response.request_id, 0);
        assert_eq!(response.temperatures.len(), 3);
        assert_eq!(response.temperatures["device1"], TemperatureReading::Value(1.0));
        assert_eq!(response.temperatures["device2"], TemperatureReading::Value(2.0));
        assert_eq!(response.temperatures["device3"], TemperatureReading::NotAvailable);
    }

    #[tokio::test]
    async fn test_empty_group_answers_immediately() {
        let group = spawn_group();

        let response = tokio::time::timeout(Duration::from_millis(500), group.request_all_temperatures(9))
            .await
            .expect("empty query should not wait for the deadline")
            .unwrap();
        assert_eq!(response.request_id, 9);
        assert!(response.temperatures.is_empty());
    }

    #[tokio::test]
    async fn test_stop_stops_all_devices() {
        let group = spawn_group();
        let device1 = group.track_device("device1").await.unwrap();
        let device2 = group.track_device("device2").await.unwrap();

        group.stop().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), group.stopped())
            .await
            .expect("group should stop");

        assert!(device1.has_exited());
        assert!(device2.has_exited());
    }

    #[tokio::test]
    async fn test_query_covers_exactly_the_snapshot() {
        let (group, _slow, mut fake) = spawn_group_with_fake("slow", 8);

        let query = {
            let group = group.clone();
            tokio::spawn(async move {
                group
                    .request_all_temperatures_with_timeout(3, Duration::from_millis(300))
                    .await
            })
        };
        expect_read(&mut fake).await;

        // Joins after the query started, so it is not part of it
        let late = group.track_device("late").await.unwrap();
        late.record_temperature(0, 5.0).await.unwrap();

        let response = query.await.unwrap().unwrap();
        let keys: BTreeSet<String> = response.temperatures.keys().cloned().collect();
        let expected: BTreeSet<String> = ["slow".to_string()].into_iter().collect();
        assert_eq!(keys, expected);
        assert_eq!(response.temperatures["slow"], TemperatureReading::TimedOut);

        let listed = group.list_devices(4).await.unwrap().device_ids;
        assert!(listed.contains("late"));
    }

    #[tokio::test]
    async fn test_device_removed_mid_query_is_still_reported() {
        let (group, _gone, mut fake) = spawn_group_with_fake("gone", 8);

        let query = {
            let group = group.clone();
            tokio::spawn(async move {
                group
                    .request_all_temperatures_with_timeout(5, Duration::from_secs(3))
                    .await
            })
        };
        expect_read(&mut fake).await;
        fake.lifeline.exit();

        let response = tokio::time::timeout(Duration::from_secs(1), query)
            .await
            .expect("query should finish once the device is gone")
            .unwrap()
            .unwrap();
        assert_eq!(response.temperatures.len(), 1);
        assert_eq!(response.temperatures["gone"], TemperatureReading::DeviceUnreachable);

        let mut listed = group.list_devices(6).await.unwrap().device_ids;
        for request_id in 7..50 {
            if listed.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            listed = group.list_devices(request_id).await.unwrap().device_ids;
        }
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_device_does_not_block_the_group() {
        let (group, stalled, _fake) = spawn_group_with_fake("stalled", 1);
        stalled.send(DeviceMessage::Stop).await.unwrap();

        // The forward is dropped instead of waiting for room
        let err = group.track_device("stalled").await.unwrap_err();
        assert!(matches!(err, crate::error::RegistryError::NoReply(_)));

        let listed = tokio::time::timeout(Duration::from_millis(500), group.list_devices(1))
            .await
            .expect("group should keep answering")
            .unwrap();
        assert!(listed.device_ids.contains("stalled"));

        let other = tokio::time::timeout(Duration::from_millis(500), group.track_device("other"))
            .await
            .expect("group should keep registering")
            .unwrap();
        assert_eq!(other.device_id(), "other");
    }
}
