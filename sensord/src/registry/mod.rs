//! Registry root
//!
//! The root maps group ids to group registrars, creating them lazily on the
//! first `TrackDevice` for a group and forgetting them when they exit.

mod config;
mod core;
mod handle;
mod messages;

pub use self::core::Registry;
pub use config::RegistryConfig;
pub use handle::RegistryHandle;
pub use messages::{RegistryMessage, ReplyGroupList};
