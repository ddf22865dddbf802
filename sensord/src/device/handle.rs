//! DeviceHandle - client interface to a device cell

use std::hash::{Hash, Hasher};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::actor::{ActorId, ExitWatch, ReplyTo};
use crate::error::{RegistryError, RegistryResponse};

use super::messages::{DeviceIdentity, DeviceMessage, RespondTemperature, TemperatureRecorded};

/// Cloneable reference to a live device cell
///
/// Two handles are equal when they point at the same cell.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    identity: DeviceIdentity,
    tx: mpsc::Sender<DeviceMessage>,
    exit: ExitWatch,
}

impl DeviceHandle {
    pub(crate) fn new(identity: DeviceIdentity, tx: mpsc::Sender<DeviceMessage>, exit: ExitWatch) -> Self {
        Self { identity, tx, exit }
    }

    pub fn id(&self) -> ActorId {
        self.exit.id()
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn group_id(&self) -> &str {
        &self.identity.group_id
    }

    pub fn device_id(&self) -> &str {
        &self.identity.device_id
    }

    pub fn exit_watch(&self) -> ExitWatch {
        self.exit.clone()
    }

    pub fn has_exited(&self) -> bool {
        self.exit.has_exited()
    }

    /// Send a raw message to the cell
    pub async fn send(&self, msg: DeviceMessage) -> RegistryResponse<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| RegistryError::MailboxClosed(format!("device {}", self.identity)))
    }

    /// Enqueue a message without waiting for room in the mailbox
    pub fn try_send(&self, msg: DeviceMessage) -> RegistryResponse<()> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => RegistryError::MailboxFull(format!("device {}", self.identity)),
            TrySendError::Closed(_) => RegistryError::MailboxClosed(format!("device {}", self.identity)),
        })
    }

    /// Store a new reading and wait for the acknowledgement
    pub async fn record_temperature(&self, request_id: u64, value: f64) -> RegistryResponse<TemperatureRecorded> {
        debug!(device = %self.identity, request_id, value, "DeviceHandle::record_temperature: called");
        let (reply_to, reply_rx) = ReplyTo::once();
        self.send(DeviceMessage::RecordTemperature {
            request_id,
            value,
            reply_to,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| RegistryError::NoReply(format!("device {}", self.identity)))
    }

    /// Read the last stored reading
    pub async fn read_temperature(&self, request_id: u64) -> RegistryResponse<RespondTemperature> {
        debug!(device = %self.identity, request_id, "DeviceHandle::read_temperature: called");
        let (reply_to, reply_rx) = ReplyTo::once();
        self.send(DeviceMessage::ReadTemperature { request_id, reply_to }).await?;
        reply_rx
            .await
            .map_err(|_| RegistryError::NoReply(format!("device {}", self.identity)))
    }

    /// Ask the cell to terminate
    pub async fn stop(&self) -> RegistryResponse<()> {
        debug!(device = %self.identity, "DeviceHandle::stop: called");
        self.send(DeviceMessage::Stop).await
    }

    /// Wait until the cell has exited
    pub async fn stopped(&self) {
        self.exit.clone().exited().await
    }
}

impl PartialEq for DeviceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for DeviceHandle {}

impl Hash for DeviceHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}
