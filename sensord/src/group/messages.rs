//! Message types for group registrars

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, ReplyTo};
use crate::device::TrackDevice;

/// Per-device outcome of an aggregate read
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "kebab-case")]
pub enum TemperatureReading {
    /// The device answered with a reading
    Value(f64),
    /// The device answered but has no reading yet
    NotAvailable,
    /// The device exited before answering
    DeviceUnreachable,
    /// The deadline elapsed before the device answered
    TimedOut,
}

impl TemperatureReading {
    pub fn value(&self) -> Option<f64> {
        match self {
            TemperatureReading::Value(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<Option<f64>> for TemperatureReading {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(value) => TemperatureReading::Value(value),
            None => TemperatureReading::NotAvailable,
        }
    }
}

impl fmt::Display for TemperatureReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureReading::Value(value) => write!(f, "{:.2}", value),
            TemperatureReading::NotAvailable => write!(f, "not available"),
            TemperatureReading::DeviceUnreachable => write!(f, "device unreachable"),
            TemperatureReading::TimedOut => write!(f, "timed out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyDeviceList {
    #[serde(rename = "request-id")]
    pub request_id: u64,
    #[serde(rename = "device-ids")]
    pub device_ids: BTreeSet<String>,
}

/// Aggregated response, exactly one entry per snapshotted device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespondAllTemperatures {
    #[serde(rename = "request-id")]
    pub request_id: u64,
    pub temperatures: BTreeMap<String, TemperatureReading>,
}

/// Requests handled by a group registrar
#[derive(Debug)]
pub enum GroupMessage {
    /// Register a device in this group (forwarded to the cell)
    TrackDevice(TrackDevice),

    /// List the currently tracked device ids
    ListDevices {
        request_id: u64,
        reply_to: ReplyTo<ReplyDeviceList>,
    },

    /// Read every tracked device within `timeout`
    RequestAllTemperatures {
        request_id: u64,
        reply_to: ReplyTo<RespondAllTemperatures>,
        timeout: Duration,
    },

    /// A tracked cell exited (internal)
    DeviceTerminated { device: ActorId },

    /// Stop the registrar and its cells
    Stop,
}
