//! Supervisor - owns the top of the entity tree
//!
//! Starts one registry root and one dashboard, then idles until told to stop.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::actor::{ActorId, ExitWatch, Lifeline};
use crate::registry::{Registry, RegistryConfig, RegistryHandle};

/// Messages accepted by the dashboard
#[derive(Debug)]
pub enum DashboardMessage {
    Stop,
}

/// Placeholder entity for a future operator view; it only knows how to stop
struct Dashboard {
    rx: mpsc::Receiver<DashboardMessage>,
    lifeline: Lifeline,
}

/// Handle to the dashboard task
#[derive(Debug, Clone)]
pub struct DashboardHandle {
    tx: mpsc::Sender<DashboardMessage>,
    exit: ExitWatch,
}

impl Dashboard {
    fn spawn() -> DashboardHandle {
        let (tx, rx) = mpsc::channel(8);
        let (lifeline, exit) = Lifeline::new(ActorId::next());
        tokio::spawn(Self { rx, lifeline }.run());
        DashboardHandle { tx, exit }
    }

    async fn run(mut self) {
        info!(actor = %self.lifeline.id(), "Dashboard started");
        while let Some(msg) = self.rx.recv().await {
            match msg {
                DashboardMessage::Stop => break,
            }
        }
        self.lifeline.exit();
        info!("Dashboard stopped");
    }
}

impl DashboardHandle {
    pub fn id(&self) -> ActorId {
        self.exit.id()
    }

    pub fn has_exited(&self) -> bool {
        self.exit.has_exited()
    }

    pub async fn stop(&self) {
        debug!("DashboardHandle::stop: called");
        if self.tx.send(DashboardMessage::Stop).await.is_err() {
            debug!("DashboardHandle::stop: dashboard already gone");
        }
    }

    pub async fn stopped(&self) {
        self.exit.clone().exited().await
    }
}

/// Top-level owner of the registry root and the dashboard
pub struct Supervisor {
    registry: RegistryHandle,
    dashboard: DashboardHandle,
}

impl Supervisor {
    /// Start exactly one registry root and one dashboard
    pub fn start(config: &RegistryConfig) -> Self {
        debug!(?config, "Supervisor::start: called");
        let registry = Registry::spawn(config.clone());
        let dashboard = Dashboard::spawn();
        info!(registry = %registry.id(), dashboard = %dashboard.id(), "IoT Application started");
        Self { registry, dashboard }
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn dashboard(&self) -> &DashboardHandle {
        &self.dashboard
    }

    /// Stop the whole tree and wait for it to wind down
    pub async fn stop(self) {
        debug!("Supervisor::stop: called");
        if let Err(e) = self.registry.stop().await {
            warn!(error = %e, "Registry was already stopped");
        }
        self.dashboard.stop().await;

        tokio::join!(self.registry.stopped(), self.dashboard.stopped());
        info!("IoT Application stopped");
    }
}
