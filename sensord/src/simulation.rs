//! Simulated sensors for demos and smoke tests
//!
//! Populates the registry with `groups x devices-per-group` cells, records a random
//! reading on most of them, optionally stops a few, then runs one aggregate query
//! per group.

use std::collections::BTreeMap;

use futures::future::try_join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::device::DeviceHandle;
use crate::error::{RegistryError, RegistryResponse};
use crate::group::RespondAllTemperatures;
use crate::registry::RegistryHandle;

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of groups to create
    pub groups: usize,

    /// Devices registered in each group
    #[serde(rename = "devices-per-group")]
    pub devices_per_group: usize,

    /// Lower bound of generated readings
    #[serde(rename = "min-temperature")]
    pub min_temperature: f64,

    /// Upper bound of generated readings (exclusive)
    #[serde(rename = "max-temperature")]
    pub max_temperature: f64,

    /// Devices per group left without a reading
    #[serde(rename = "unread-devices")]
    pub unread_devices: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            groups: 2,
            devices_per_group: 3,
            min_temperature: 15.0,
            max_temperature: 30.0,
            unread_devices: 1,
        }
    }
}

/// Outcome of the aggregate query for one simulated group
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    #[serde(rename = "group-id")]
    pub group_id: String,

    /// Devices stopped before the query was issued
    pub stopped: Vec<String>,

    pub response: RespondAllTemperatures,
}

pub fn group_name(index: usize) -> String {
    format!("group-{}", index)
}

pub fn device_name(index: usize) -> String {
    format!("sensor-{}", index)
}

/// Pick the reading each device of a group gets, `None` for the unread ones
///
/// Runs before any await so the thread-local rng never crosses one.
fn plan_readings(config: &SimulationConfig) -> Vec<Option<f64>> {
    debug!(?config, "plan_readings: called");
    let mut rng = rand::rng();
    (0..config.devices_per_group)
        .map(|index| {
            if index < config.unread_devices {
                None
            } else if config.min_temperature < config.max_temperature {
                Some(rng.random_range(config.min_temperature..config.max_temperature))
            } else {
                Some(config.min_temperature)
            }
        })
        .collect()
}

/// Drives one run of simulated sensors against a registry
pub struct Simulation {
    config: SimulationConfig,
    stop_devices: usize,
}

impl Simulation {
    /// `stop_devices` is the number of devices per group stopped before querying
    pub fn new(config: SimulationConfig, stop_devices: usize) -> Self {
        debug!(?config, stop_devices, "Simulation::new: called");
        Self { config, stop_devices }
    }

    /// Populate the registry, then query every group concurrently
    pub async fn run(&self, registry: &RegistryHandle) -> RegistryResponse<Vec<GroupReport>> {
        debug!("Simulation::run: called");
        let mut stopped_per_group = Vec::with_capacity(self.config.groups);

        for g in 1..=self.config.groups {
            let group_id = group_name(g);
            let readings = plan_readings(&self.config);

            let mut devices = Vec::with_capacity(readings.len());
            for (d, reading) in readings.into_iter().enumerate() {
                let device = registry.track_device(&group_id, &device_name(d + 1)).await?;
                if let Some(value) = reading {
                    device.record_temperature(d as u64, value).await?;
                }
                devices.push(device);
            }

            let stopped = self.stop_last(&devices).await?;
            info!(%group_id, devices = devices.len(), stopped = stopped.len(), "Simulated group populated");
            stopped_per_group.push((group_id, stopped));
        }

        let queries = stopped_per_group
            .into_iter()
            .enumerate()
            .map(|(request_id, (group_id, stopped))| async move {
                // A group with no devices was never created; it has nothing to report
                let response = match registry.group(&group_id).await? {
                    Some(group) => group.request_all_temperatures(request_id as u64).await?,
                    None => RespondAllTemperatures {
                        request_id: request_id as u64,
                        temperatures: BTreeMap::new(),
                    },
                };
                Ok::<_, RegistryError>(GroupReport {
                    group_id,
                    stopped,
                    response,
                })
            });

        try_join_all(queries).await
    }

    async fn stop_last(&self, devices: &[DeviceHandle]) -> RegistryResponse<Vec<String>> {
        let count = self.stop_devices.min(devices.len());
        let victims = &devices[devices.len() - count..];
        for device in victims {
            device.stop().await?;
        }
        for device in victims {
            device.stopped().await;
        }
        Ok(victims.iter().map(|device| device.device_id().to_string()).collect())
    }
}
