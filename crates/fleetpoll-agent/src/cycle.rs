//! Cycle scheduling and fan-out over the device fleet.

use crate::fetch::Inventory;
use crate::poll::poll_device;
use fleetpoll_common::{CredentialStore, Device, PollOutcome, SnmpError};
use fleetpoll_mapper::MapperRegistry;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Admission control for poll cycles: at most one cycle in flight, and
/// successive cycle starts at least `min_spacing` apart. Overlap is decided
/// at start time, so a cycle that overruns the spacing simply delays the
/// next start instead of stacking.
pub struct CycleGate {
    busy: AtomicBool,
    last_start: Mutex<Option<Instant>>,
    min_spacing: Duration,
}

impl CycleGate {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            busy: AtomicBool::new(false),
            last_start: Mutex::new(None),
            min_spacing,
        }
    }

    /// Claims the gate for a cycle starting at `now`. Returns false when a
    /// cycle is still running or the spacing window has not elapsed.
    pub fn try_begin(&self, now: Instant) -> bool {
        if self.busy.swap(true, Ordering::AcqRel) {
            return false;
        }
        let mut last = match self.last_start.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(started) = *last {
            if now.duration_since(started) < self.min_spacing {
                drop(last);
                self.busy.store(false, Ordering::Release);
                return false;
            }
        }
        *last = Some(now);
        true
    }

    pub fn finish(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Runs one cycle's device list to completion with bounded concurrency.
pub struct Poller {
    registry: Arc<MapperRegistry>,
    snmp_timeout: Duration,
    max_concurrent: usize,
}

impl Poller {
    pub fn new(registry: Arc<MapperRegistry>, snmp_timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            registry,
            snmp_timeout,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Polls every device in the inventory, one task per device, and waits
    /// for all of them. Outcomes arrive in completion order; each device
    /// contributes exactly one.
    pub async fn run_cycle(&self, inventory: Inventory) -> Vec<PollOutcome> {
        self.run_cycle_with(inventory, poll_device).await
    }

    /// Same fan-out with the per-device poll injected, so cycle isolation
    /// can be exercised without live SNMP sessions.
    async fn run_cycle_with<F, Fut>(&self, inventory: Inventory, poll: F) -> Vec<PollOutcome>
    where
        F: Fn(Device, Arc<MapperRegistry>, Arc<dyn CredentialStore>, Duration) -> Fut,
        Fut: Future<Output = PollOutcome> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(inventory.devices.len());

        for device in inventory.devices {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed while we hold it.
                Err(_) => break,
            };
            let ip = device.ip.clone();
            let registry = self.registry.clone();
            let credentials = inventory.credentials.clone();
            let fut = poll(device, registry, credentials, self.snmp_timeout);
            let handle = tokio::spawn(async move {
                let outcome = fut.await;
                drop(permit);
                outcome
            });
            handles.push((ip, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (ip, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(ip = %ip, error = %e, "poll task aborted");
                    outcomes.push(PollOutcome::Error(SnmpError {
                        ip,
                        retryable: false,
                        message: format!("poll task aborted: {e}"),
                    }));
                }
            }
        }
        outcomes
    }
}
