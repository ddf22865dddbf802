//! sensord - Hierarchical registry of simulated temperature sensors
//!
//! A registry root owns one registrar per group, and each registrar owns one cell
//! per device. Every entity is a tokio task with its own mailbox; clients talk to
//! them through cloneable handles.
//!
//! # Core Concepts
//!
//! - **Idempotent tracking**: registering the same (group, device) twice yields the same cell
//! - **Liveness watching**: parents forget children that exit, and never reuse them
//! - **Scatter-gather reads**: an aggregate query always answers with one outcome per device,
//!   within a deadline, even when devices die mid-query
//!
//! # Modules
//!
//! - [`actor`] - Entity ids, exit watching, reply targets
//! - [`device`] - Device cells
//! - [`group`] - Group registrars
//! - [`query`] - Scatter-gather temperature queries
//! - [`registry`] - Registry root
//! - [`supervisor`] - Top-level owner of the tree
//! - [`simulation`] - Simulated sensors for demos
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod actor;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod group;
pub mod query;
pub mod registry;
pub mod simulation;
pub mod supervisor;

pub use actor::{ActorId, ExitWatch, Lifeline, Monitor, ReplyTo};
pub use config::Config;
pub use device::{DeviceHandle, DeviceIdentity};
pub use error::{RegistryError, RegistryResponse};
pub use group::{GroupHandle, RespondAllTemperatures, TemperatureReading};
pub use registry::{Registry, RegistryConfig, RegistryHandle};
pub use supervisor::Supervisor;
