//! Scatter-gather temperature queries
//!
//! A [`GatherQuery`] is spawned per aggregate read. It broadcasts a read to a fixed
//! snapshot of device cells and folds the answers into a [`QueryState`]:
//! - a reply resolves the device as `Value` or `NotAvailable`
//! - an exit notice resolves it as `DeviceUnreachable`
//! - the deadline resolves everything still outstanding as `TimedOut`
//!
//! Exactly one response is sent, then the task exits.

mod core;
mod state;

pub use self::core::{GatherQuery, READ_REQUEST_ID};
pub use state::QueryState;
