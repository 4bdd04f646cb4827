//! Periodic reload of users, programs and functions.
//!
//! A [`Refresher`] owns an in-flight flag shared by the background loop and
//! explicit user-triggered refreshes: a tick that finds a refresh already
//! running is skipped entirely, so two refreshes never write the same
//! snapshot concurrently.

use crate::protocol::{ProgramInfo, UserInfo};
use crate::service::EmulatorService;
use crate::{ClientError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// One consistent view of the dashboard listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub users: Vec<UserInfo>,
    pub programs: Vec<ProgramInfo>,
    pub functions: Vec<ProgramInfo>,
    pub fetched_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    pub fn user(&self, name: &str) -> Option<&UserInfo> {
        self.users.iter().find(|u| u.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Refreshed,
    /// Another refresh was in flight.
    Skipped,
}

/// Clears the in-flight flag when dropped, including on early return.
pub struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Refresher {
    service: Arc<dyn EmulatorService>,
    in_flight: Arc<AtomicBool>,
    snapshot: watch::Sender<Option<Arc<DashboardSnapshot>>>,
}

impl Refresher {
    pub fn new(service: Arc<dyn EmulatorService>) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            service,
            in_flight: Arc::new(AtomicBool::new(false)),
            snapshot,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<DashboardSnapshot>>> {
        self.snapshot.subscribe()
    }

    pub fn latest(&self) -> Option<Arc<DashboardSnapshot>> {
        self.snapshot.borrow().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the in-flight flag, or `None` if a refresh is already running.
    pub fn try_begin(&self) -> Option<InFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(self.in_flight.clone()))
    }

    /// Load the three listings concurrently; they have no data dependency.
    pub async fn load(&self) -> Result<DashboardSnapshot> {
        let (users, programs, functions) = tokio::try_join!(
            self.service.list_users(),
            self.service.list_programs(),
            self.service.list_functions(),
        )?;
        Ok(DashboardSnapshot {
            users,
            programs,
            functions,
            fetched_at: Utc::now(),
        })
    }

    /// One background tick: refresh unless a refresh is already in flight.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let Some(_guard) = self.try_begin() else {
            debug!("Refresh in flight, skipping tick");
            return Ok(TickOutcome::Skipped);
        };
        let snapshot = self.load().await?;
        self.publish(snapshot);
        Ok(TickOutcome::Refreshed)
    }

    /// Refresh triggered by a user action.
    pub async fn refresh_now(&self) -> Result<Arc<DashboardSnapshot>> {
        let _guard = self.try_begin().ok_or(ClientError::RefreshInFlight)?;
        let snapshot = self.load().await?;
        Ok(self.publish(snapshot))
    }

    fn publish(&self, snapshot: DashboardSnapshot) -> Arc<DashboardSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.snapshot.send_replace(Some(snapshot.clone()));
        snapshot
    }

    /// Run [`tick`](Self::tick) every `interval` until the handle is stopped.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> RefreshHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_ms = interval.as_millis() as u64, "Refresh loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.tick().await {
                            warn!("Periodic refresh failed: {}", e);
                        }
                    }
                }
            }
            info!("Refresh loop stopped");
        });
        RefreshHandle { shutdown, task }
    }
}

/// Cancellation handle for a spawned refresh loop.
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Refresh loop ended abnormally: {}", e);
        }
    }
}
