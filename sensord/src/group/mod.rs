//! Group registrars
//!
//! A registrar owns the device cells of one group: it creates them on first
//! reference, forgets them when they exit, lists them, and hands a snapshot of them
//! to a fresh [`GatherQuery`](crate::query::GatherQuery) for every aggregate read.

mod handle;
mod messages;
mod registrar;

pub use handle::{CALLER_GRACE, GroupHandle};
pub use messages::{GroupMessage, ReplyDeviceList, RespondAllTemperatures, TemperatureReading};
pub use registrar::GroupRegistrar;
