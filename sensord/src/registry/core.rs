//! Registry root task

use std::collections::HashMap;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::actor::{ActorId, Lifeline, Monitor};
use crate::device::TrackDevice;
use crate::group::{GroupHandle, GroupMessage, GroupRegistrar};

use super::config::RegistryConfig;
use super::handle::RegistryHandle;
use super::messages::{RegistryMessage, ReplyGroupList};

/// Root of the registry tree: one registrar per group id
pub struct Registry {
    config: RegistryConfig,
    group_id_to_group: HashMap<String, GroupHandle>,
    actor_to_group_id: HashMap<ActorId, String>,
    monitor: Monitor<RegistryMessage>,
    rx: mpsc::Receiver<RegistryMessage>,
    lifeline: Lifeline,
}

impl Registry {
    /// Spawn the root task and return its handle
    pub fn spawn(config: RegistryConfig) -> RegistryHandle {
        let (tx, rx) = mpsc::channel(config.mailbox_buffer);
        let (lifeline, exit) = Lifeline::new(ActorId::next());

        let handle = RegistryHandle::new(tx.clone(), exit);
        let registry = Self {
            config,
            group_id_to_group: HashMap::new(),
            actor_to_group_id: HashMap::new(),
            monitor: Monitor::new(&tx),
            rx,
            lifeline,
        };
        tokio::spawn(registry.run());

        handle
    }

    async fn run(mut self) {
        info!(actor = %self.lifeline.id(), "DeviceManager started");

        while let Some(msg) = self.rx.recv().await {
            match msg {
                RegistryMessage::TrackDevice(track) => self.on_track_device(track),

                RegistryMessage::ListGroups { request_id, reply_to } => {
                    let reply = ReplyGroupList {
                        request_id,
                        group_ids: self.group_id_to_group.keys().cloned().collect(),
                    };
                    reply_to.send(reply).await;
                }

                RegistryMessage::GetGroup { group_id, reply_to } => {
                    let group = self
                        .group_id_to_group
                        .get(&group_id)
                        .filter(|group| !group.has_exited())
                        .cloned();
                    reply_to.send(group).await;
                }

                RegistryMessage::GroupTerminated { group } => self.on_group_terminated(group),

                RegistryMessage::Stop => {
                    debug!("Stop requested");
                    break;
                }
            }
        }

        self.stop_groups().await;
        self.lifeline.exit();
        info!("DeviceManager stopped");
    }

    fn on_track_device(&mut self, track: TrackDevice) {
        let existing = self.group_id_to_group.get(&track.group_id).cloned();
        let group = match existing {
            Some(group) if !group.has_exited() => group,
            Some(stale) => {
                self.forget(stale.id());
                self.create_group(&track.group_id)
            }
            None => self.create_group(&track.group_id),
        };

        let group_id = track.group_id.clone();
        if let Err(e) = group.try_send(GroupMessage::TrackDevice(track)) {
            warn!(%group_id, error = %e, "Failed to forward TrackDevice");
        }
    }

    fn create_group(&mut self, group_id: &str) -> GroupHandle {
        info!(%group_id, "Creating group registrar");
        let group = GroupRegistrar::spawn(group_id, self.config.clone());
        self.monitor
            .watch(group.exit_watch(), |group| RegistryMessage::GroupTerminated { group });
        self.group_id_to_group.insert(group_id.to_string(), group.clone());
        self.actor_to_group_id.insert(group.id(), group_id.to_string());
        group
    }

    fn on_group_terminated(&mut self, group: ActorId) {
        match self.actor_to_group_id.get(&group) {
            Some(group_id) => {
                info!(%group_id, "Device group registrar has been terminated");
                self.forget(group);
            }
            None => debug!(%group, "Ignoring notice for an untracked group"),
        }
    }

    fn forget(&mut self, group: ActorId) {
        self.monitor.unwatch(group);
        if let Some(group_id) = self.actor_to_group_id.remove(&group) {
            self.group_id_to_group.remove(&group_id);
        }
    }

    async fn stop_groups(&mut self) {
        let groups: Vec<GroupHandle> = self.group_id_to_group.drain().map(|(_, group)| group).collect();
        self.actor_to_group_id.clear();

        for group in &groups {
            let _ = group.stop().await;
        }
        join_all(groups.iter().map(GroupHandle::stopped)).await;
    }
}
