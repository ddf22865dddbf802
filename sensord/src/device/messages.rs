//! Message types for device cells

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, ReplyTo};

use super::handle::DeviceHandle;

/// (group, device) pair a cell is responsible for
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceIdentity {
    #[serde(rename = "group-id")]
    pub group_id: String,
    #[serde(rename = "device-id")]
    pub device_id: String,
}

impl DeviceIdentity {
    pub fn new(group_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            device_id: device_id.into(),
        }
    }

    pub fn matches(&self, group_id: &str, device_id: &str) -> bool {
        self.group_id == group_id && self.device_id == device_id
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.group_id, self.device_id)
    }
}

/// Registration request, routed root -> group -> device
///
/// The reply target travels with the request, so the answer comes straight from
/// the device cell.
#[derive(Debug)]
pub struct TrackDevice {
    pub group_id: String,
    pub device_id: String,
    pub reply_to: ReplyTo<DeviceRegistered>,
}

/// Registration acknowledgement, carrying the cell's own handle
#[derive(Debug, Clone)]
pub struct DeviceRegistered {
    pub device: DeviceHandle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureRecorded {
    pub request_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RespondTemperature {
    pub request_id: u64,
    /// The answering cell
    pub device: ActorId,
    pub value: Option<f64>,
}

/// Requests handled by a device cell
#[derive(Debug)]
pub enum DeviceMessage {
    /// Confirm registration if the identity matches
    TrackDevice(TrackDevice),

    /// Overwrite the last reading
    RecordTemperature {
        request_id: u64,
        value: f64,
        reply_to: ReplyTo<TemperatureRecorded>,
    },

    /// Report the last reading
    ReadTemperature {
        request_id: u64,
        reply_to: ReplyTo<RespondTemperature>,
    },

    /// Terminate the cell
    Stop,
}
