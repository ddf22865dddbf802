//! Scatter-gather query task

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::actor::{ActorId, Monitor, ReplyTo};
use crate::device::{DeviceHandle, DeviceMessage, RespondTemperature};
use crate::group::{RespondAllTemperatures, TemperatureReading};

use super::state::QueryState;

/// Sub-request id sent to every device; the query only needs to know who answered
pub const READ_REQUEST_ID: u64 = 0;

/// One aggregate read over a fixed snapshot of device cells
///
/// The task reads every device, folds replies and exit notices into a
/// [`QueryState`], and sends exactly one [`RespondAllTemperatures`] when all devices
/// are resolved or the deadline fires, whichever comes first. It then exits; the
/// deadline timer is owned by the task and goes away with it.
pub struct GatherQuery {
    id: ActorId,
    devices: HashMap<ActorId, DeviceHandle>,
    request_id: u64,
    reply_to: ReplyTo<RespondAllTemperatures>,
    timeout: Duration,
}

impl GatherQuery {
    fn new(
        snapshot: Vec<DeviceHandle>,
        request_id: u64,
        reply_to: ReplyTo<RespondAllTemperatures>,
        timeout: Duration,
    ) -> Self {
        Self {
            id: ActorId::next(),
            devices: snapshot.into_iter().map(|device| (device.id(), device)).collect(),
            request_id,
            reply_to,
            timeout,
        }
    }

    /// Spawn the query task; nothing waits on it
    pub fn spawn(
        snapshot: Vec<DeviceHandle>,
        request_id: u64,
        reply_to: ReplyTo<RespondAllTemperatures>,
        timeout: Duration,
    ) {
        let query = Self::new(snapshot, request_id, reply_to, timeout);
        tokio::spawn(query.run());
    }

    async fn run(self) {
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        info!(
            query = %self.id,
            request_id = self.request_id,
            devices = self.devices.len(),
            "GatherQuery started"
        );

        // Every device answers at most once, so these never fill up
        let capacity = self.devices.len().max(1);
        let (replies_tx, mut replies_rx) = mpsc::channel::<RespondTemperature>(capacity);
        let (exits_tx, mut exits_rx) = mpsc::channel::<ActorId>(capacity);
        let mut monitor = Monitor::new(&exits_tx);

        let device_ids = self
            .devices
            .iter()
            .map(|(id, device)| (*id, device.device_id().to_string()))
            .collect();
        let mut state = QueryState::new(device_ids);

        // Reads go out on their own tasks so a full mailbox can't hold the deadline;
        // whatever is still pending is aborted when the set drops with this task
        let mut deliveries = JoinSet::new();
        for device in self.devices.values() {
            monitor.watch(device.exit_watch(), |device| device);
            let read = DeviceMessage::ReadTemperature {
                request_id: READ_REQUEST_ID,
                reply_to: ReplyTo::Mailbox(replies_tx.clone()),
            };
            let device = device.clone();
            let query = self.id;
            deliveries.spawn(async move {
                if device.send(read).await.is_err() {
                    // Already gone; its exit notice resolves it
                    debug!(%query, device = %device.identity(), "Read not delivered");
                }
            });
        }

        let temperatures = loop {
            if state.is_complete() {
                break state.into_replies();
            }

            // A device's reply is always queued before its exit notice, so replies go first
            tokio::select! {
                biased;

                Some(response) = replies_rx.recv() => {
                    let reading = TemperatureReading::from(response.value);
                    state = self.fold(state, &mut monitor, response.device, reading);
                }

                Some(device) = exits_rx.recv() => {
                    state = self.fold(state, &mut monitor, device, TemperatureReading::DeviceUnreachable);
                }

                () = &mut deadline => {
                    warn!(
                        query = %self.id,
                        request_id = self.request_id,
                        outstanding = state.still_waiting().len(),
                        "GatherQuery deadline elapsed"
                    );
                    break state.into_timed_out();
                }
            }
        };

        let response = RespondAllTemperatures {
            request_id: self.request_id,
            temperatures,
        };
        if !self.reply_to.send(response).await {
            debug!(query = %self.id, "Requester went away before the response");
        }

        info!(query = %self.id, request_id = self.request_id, "GatherQuery stopped");
    }

    /// Shared resolve step for replies and exit notices
    fn fold(
        &self,
        state: QueryState,
        monitor: &mut Monitor<ActorId>,
        device: ActorId,
        reading: TemperatureReading,
    ) -> QueryState {
        monitor.unwatch(device);
        match state.resolve(device, reading) {
            Some(next) => {
                debug!(query = %self.id, %device, ?reading, "Device resolved");
                next
            }
            None => {
                debug!(query = %self.id, %device, "Ignoring event for a resolved device");
                state
            }
        }
    }
}
