//! Device cell task: owns one sensor's last known reading

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::actor::{ActorId, ExitWatch, Lifeline, ReplyTo};

use super::handle::DeviceHandle;
use super::messages::{
    DeviceIdentity, DeviceMessage, DeviceRegistered, RespondTemperature, TemperatureRecorded, TrackDevice,
};

/// A single simulated sensor
pub struct DeviceCell {
    identity: DeviceIdentity,
    last_temperature_reading: Option<f64>,
    /// Own mailbox, held weakly so the cell can hand out its handle without keeping itself alive
    self_tx: mpsc::WeakSender<DeviceMessage>,
    exit: ExitWatch,
    rx: mpsc::Receiver<DeviceMessage>,
    lifeline: Lifeline,
}

impl DeviceCell {
    /// Spawn a cell task and return its handle
    pub fn spawn(identity: DeviceIdentity, mailbox_buffer: usize) -> DeviceHandle {
        let (tx, rx) = mpsc::channel(mailbox_buffer);
        let (lifeline, exit) = Lifeline::new(ActorId::next());

        let handle = DeviceHandle::new(identity.clone(), tx.clone(), exit.clone());
        let cell = Self {
            identity,
            last_temperature_reading: None,
            self_tx: tx.downgrade(),
            exit,
            rx,
            lifeline,
        };
        tokio::spawn(cell.run());

        handle
    }

    /// Process messages until stopped or until every handle is gone
    async fn run(mut self) {
        info!(device = %self.identity, actor = %self.lifeline.id(), "Device started");

        while let Some(msg) = self.rx.recv().await {
            match msg {
                DeviceMessage::TrackDevice(track) => self.on_track_device(track).await,

                DeviceMessage::RecordTemperature {
                    request_id,
                    value,
                    reply_to,
                } => {
                    info!(device = %self.identity, request_id, value, "Recorded temperature reading");
                    self.last_temperature_reading = Some(value);
                    reply_to.send(TemperatureRecorded { request_id }).await;
                }

                DeviceMessage::ReadTemperature { request_id, reply_to } => {
                    self.on_read_temperature(request_id, reply_to).await;
                }

                DeviceMessage::Stop => {
                    debug!(device = %self.identity, "Stop requested");
                    break;
                }
            }
        }

        self.lifeline.exit();
        info!(device = %self.identity, "Device stopped");
    }

    async fn on_track_device(&self, track: TrackDevice) {
        if !self.identity.matches(&track.group_id, &track.device_id) {
            warn!(
                requested_group = %track.group_id,
                requested_device = %track.device_id,
                device = %self.identity,
                "Ignoring TrackDevice request for another device"
            );
            return;
        }

        let Some(tx) = self.self_tx.upgrade() else {
            debug!(device = %self.identity, "No live handles left, not confirming registration");
            return;
        };
        let device = DeviceHandle::new(self.identity.clone(), tx, self.exit.clone());
        track.reply_to.send(DeviceRegistered { device }).await;
    }

    async fn on_read_temperature(&self, request_id: u64, reply_to: ReplyTo<RespondTemperature>) {
        let response = RespondTemperature {
            request_id,
            device: self.lifeline.id(),
            value: self.last_temperature_reading,
        };
        if !reply_to.send(response).await {
            debug!(device = %self.identity, request_id, "Reader went away before the reply");
        }
    }
}
