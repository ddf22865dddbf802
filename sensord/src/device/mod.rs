//! Device cells
//!
//! A device cell is the leaf of the registry tree. It owns one mutable reading and
//! answers point reads, writes and registration checks, one message at a time.

mod cell;
mod handle;
mod messages;

pub use cell::DeviceCell;
pub use handle::DeviceHandle;
pub use messages::{
    DeviceIdentity, DeviceMessage, DeviceRegistered, RespondTemperature, TemperatureRecorded, TrackDevice,
};
