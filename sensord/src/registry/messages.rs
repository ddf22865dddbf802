//! Message types for the registry root

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, ReplyTo};
use crate::device::TrackDevice;
use crate::group::GroupHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyGroupList {
    #[serde(rename = "request-id")]
    pub request_id: u64,
    #[serde(rename = "group-ids")]
    pub group_ids: BTreeSet<String>,
}

/// Requests handled by the registry root
#[derive(Debug)]
pub enum RegistryMessage {
    /// Register a device, creating its group on first reference
    TrackDevice(TrackDevice),

    /// List the currently live group ids
    ListGroups {
        request_id: u64,
        reply_to: ReplyTo<ReplyGroupList>,
    },

    /// Look up the registrar of a group
    GetGroup {
        group_id: String,
        reply_to: ReplyTo<Option<GroupHandle>>,
    },

    /// A group registrar exited (internal)
    GroupTerminated { group: ActorId },

    /// Stop the root and every group under it
    Stop,
}
