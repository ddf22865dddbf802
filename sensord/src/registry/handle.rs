//! RegistryHandle - client interface to the registry root

use tokio::sync::mpsc;
use tracing::debug;

use crate::actor::{ActorId, ExitWatch, ReplyTo};
use crate::device::{DeviceHandle, TrackDevice};
use crate::error::{RegistryError, RegistryResponse};
use crate::group::GroupHandle;

use super::messages::{RegistryMessage, ReplyGroupList};

/// Cloneable reference to the registry root
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryMessage>,
    exit: ExitWatch,
}

impl RegistryHandle {
    pub(crate) fn new(tx: mpsc::Sender<RegistryMessage>, exit: ExitWatch) -> Self {
        Self { tx, exit }
    }

    pub fn id(&self) -> ActorId {
        self.exit.id()
    }

    pub fn exit_watch(&self) -> ExitWatch {
        self.exit.clone()
    }

    pub fn has_exited(&self) -> bool {
        self.exit.has_exited()
    }

    async fn send(&self, msg: RegistryMessage) -> RegistryResponse<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| RegistryError::MailboxClosed("registry".to_string()))
    }

    /// Register a device, creating its group on first reference
    ///
    /// Tracking the same pair again returns the same device.
    pub async fn track_device(&self, group_id: &str, device_id: &str) -> RegistryResponse<DeviceHandle> {
        debug!(%group_id, %device_id, "RegistryHandle::track_device: called");
        let (reply_to, reply_rx) = ReplyTo::once();
        self.send(RegistryMessage::TrackDevice(TrackDevice {
            group_id: group_id.to_string(),
            device_id: device_id.to_string(),
            reply_to,
        }))
        .await?;

        let registered = reply_rx
            .await
            .map_err(|_| RegistryError::NoReply(format!("device {}-{}", group_id, device_id)))?;
        Ok(registered.device)
    }

    /// List the group ids that currently have a live registrar
    pub async fn list_groups(&self, request_id: u64) -> RegistryResponse<ReplyGroupList> {
        debug!(request_id, "RegistryHandle::list_groups: called");
        let (reply_to, reply_rx) = ReplyTo::once();
        self.send(RegistryMessage::ListGroups { request_id, reply_to }).await?;
        reply_rx
            .await
            .map_err(|_| RegistryError::NoReply("registry".to_string()))
    }

    /// Look up the registrar of `group_id`
    pub async fn group(&self, group_id: &str) -> RegistryResponse<Option<GroupHandle>> {
        debug!(%group_id, "RegistryHandle::group: called");
        let (reply_to, reply_rx) = ReplyTo::once();
        self.send(RegistryMessage::GetGroup {
            group_id: group_id.to_string(),
            reply_to,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| RegistryError::NoReply("registry".to_string()))
    }

    /// Ask the root to stop; every group and device stops with it
    pub async fn stop(&self) -> RegistryResponse<()> {
        debug!("RegistryHandle::stop: called");
        self.send(RegistryMessage::Stop).await
    }

    /// Wait until the root has exited
    pub async fn stopped(&self) {
        self.exit.clone().exited().await
    }
}
