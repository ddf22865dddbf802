//! GroupHandle - client interface to a group registrar

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::actor::{ActorId, ExitWatch, ReplyTo};
use crate::device::{DeviceHandle, TrackDevice};
use crate::error::{RegistryError, RegistryResponse};

use super::messages::{GroupMessage, ReplyDeviceList, RespondAllTemperatures};

/// Extra time a caller waits beyond the query deadline before giving up on the response
pub const CALLER_GRACE: Duration = Duration::from_secs(1);

/// Cloneable reference to a live group registrar
#[derive(Debug, Clone)]
pub struct GroupHandle {
    group_id: String,
    tx: mpsc::Sender<GroupMessage>,
    exit: ExitWatch,
    query_timeout: Duration,
}

impl GroupHandle {
    pub(crate) fn new(
        group_id: String,
        tx: mpsc::Sender<GroupMessage>,
        exit: ExitWatch,
        query_timeout: Duration,
    ) -> Self {
        Self {
            group_id,
            tx,
            exit,
            query_timeout,
        }
    }

    pub fn id(&self) -> ActorId {
        self.exit.id()
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn exit_watch(&self) -> ExitWatch {
        self.exit.clone()
    }

    pub fn has_exited(&self) -> bool {
        self.exit.has_exited()
    }

    /// Default deadline for aggregate reads through this handle
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Send a raw message to the registrar
    pub async fn send(&self, msg: GroupMessage) -> RegistryResponse<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| RegistryError::MailboxClosed(format!("group {}", self.group_id)))
    }

    /// Enqueue a message without waiting for room in the mailbox
    pub fn try_send(&self, msg: GroupMessage) -> RegistryResponse<()> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => RegistryError::MailboxFull(format!("group {}", self.group_id)),
            TrySendError::Closed(_) => RegistryError::MailboxClosed(format!("group {}", self.group_id)),
        })
    }

    /// Register a device in this group and return its handle
    pub async fn track_device(&self, device_id: &str) -> RegistryResponse<DeviceHandle> {
        debug!(group_id = %self.group_id, %device_id, "GroupHandle::track_device: called");
        let (reply_to, reply_rx) = ReplyTo::once();
        self.send(GroupMessage::TrackDevice(TrackDevice {
            group_id: self.group_id.clone(),
            device_id: device_id.to_string(),
            reply_to,
        }))
        .await?;

        let registered = reply_rx
            .await
            .map_err(|_| RegistryError::NoReply(format!("device {}-{}", self.group_id, device_id)))?;
        Ok(registered.device)
    }

    /// List the device ids currently tracked by the group
    pub async fn list_devices(&self, request_id: u64) -> RegistryResponse<ReplyDeviceList> {
        debug!(group_id = %self.group_id, request_id, "GroupHandle::list_devices: called");
        let (reply_to, reply_rx) = ReplyTo::once();
        self.send(GroupMessage::ListDevices { request_id, reply_to }).await?;
        reply_rx
            .await
            .map_err(|_| RegistryError::NoReply(format!("group {}", self.group_id)))
    }

    /// Read every device in the group using the default deadline
    pub async fn request_all_temperatures(&self, request_id: u64) -> RegistryResponse<RespondAllTemperatures> {
        self.request_all_temperatures_with_timeout(request_id, self.query_timeout)
            .await
    }

    /// Read every device in the group within `timeout`
    ///
    /// The caller waits `timeout + CALLER_GRACE` at most, since a query that dies
    /// before answering never sends anything.
    pub async fn request_all_temperatures_with_timeout(
        &self,
        request_id: u64,
        timeout: Duration,
    ) -> RegistryResponse<RespondAllTemperatures> {
        debug!(group_id = %self.group_id, request_id, ?timeout, "GroupHandle::request_all_temperatures: called");
        let (reply_to, reply_rx) = ReplyTo::once();
        self.send(GroupMessage::RequestAllTemperatures {
            request_id,
            reply_to,
            timeout,
        })
        .await?;

        debug!(request_id, "GroupHandle::request_all_temperatures: waiting for reply");
        match tokio::time::timeout(timeout + CALLER_GRACE, reply_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) | Err(_) => Err(RegistryError::NoReply(format!(
                "temperature query {} in group {}",
                request_id, self.group_id
            ))),
        }
    }

    /// Ask the registrar to stop (its cells stop with it)
    pub async fn stop(&self) -> RegistryResponse<()> {
        debug!(group_id = %self.group_id, "GroupHandle::stop: called");
        self.send(GroupMessage::Stop).await
    }

    /// Wait until the registrar has exited
    pub async fn stopped(&self) {
        self.exit.clone().exited().await
    }
}
