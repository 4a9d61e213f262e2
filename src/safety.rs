//! Fail-safe supervision: the abort latch and the security watchdog.
//!
//! The watchdog runs **independently of the brewing process** on its own
//! thread.  Every probe interval it checks that the brewing server (and with
//! it the operator's remote device) is still reachable.
//!
//! ## Failure lifecycle
//!
//! 1. A probe fails (bad status, timeout, connection refused).
//! 2. The consecutive-failure counter is incremented.  A successful probe
//!    resets it to zero.
//! 3. When the counter reaches the alert threshold, `shutdown()` runs:
//!    the abort latch is raised, then heater off, stirrer off, signal on,
//!    and finally the watchdog marks itself cancelled.
//! 4. The running process sees the latch on its next tick (or its next
//!    guarded actuator command) and moves to `Aborted`.
//!
//! A cancelled watchdog never resumes.  Monitoring again requires a new
//! instance, and new processes refuse to start until the latch is cleared.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{error, info, warn};

use crate::app::ports::{HealthProbe, ProbeError};
use crate::config::SystemConfig;
use crate::drivers::Actuators;
use crate::drivers::task::spawn_worker;
use crate::error::Result;

// ═══════════════════════════════════════════════════════════════
//  Abort latch
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct AbortInner {
    raised: AtomicBool,
    reason: Mutex<Option<String>>,
}

/// Shared fail-safe latch.  Once raised it stays raised until cleared.
#[derive(Clone, Default)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the latch.  Returns `true` for the call that raised it.
    pub fn raise(&self, reason: impl Into<String>) -> bool {
        let mut slot = self
            .inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let first = !self.inner.raised.swap(true, Ordering::SeqCst);
        if first {
            *slot = Some(reason.into());
        }
        first
    }

    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<String> {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Operator acknowledgement after a fail-safe shutdown.
    pub fn clear(&self) {
        let mut slot = self
            .inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = None;
        self.inner.raised.store(false, Ordering::SeqCst);
        info!("Abort latch cleared");
    }
}

impl core::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AbortSignal")
            .field("raised", &self.is_raised())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Security watchdog
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    pub address: String,
    pub interval: Duration,
    pub failures_until_alert: u32,
}

impl WatchdogSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            address: config.watchdog_address.clone(),
            interval: Duration::from_millis(u64::from(config.watchdog_interval_ms)),
            failures_until_alert: config.watchdog_failures_until_alert.max(1),
        }
    }
}

struct WatchdogInner {
    settings: WatchdogSettings,
    actuators: Actuators,
    abort: AbortSignal,
    probe: Mutex<Box<dyn HealthProbe + Send>>,
    failures: AtomicU32,
    shutdown_started: AtomicBool,
    cancelled: AtomicBool,
}

/// Heartbeat monitor with fail-safe shutdown.  Clones share one watchdog.
#[derive(Clone)]
pub struct SecurityWatchdog {
    inner: Arc<WatchdogInner>,
}

impl SecurityWatchdog {
    pub fn new(
        settings: WatchdogSettings,
        actuators: Actuators,
        abort: AbortSignal,
        probe: impl HealthProbe + Send + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(WatchdogInner {
                settings,
                actuators,
                abort,
                probe: Mutex::new(Box::new(probe)),
                failures: AtomicU32::new(0),
                shutdown_started: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Run the probe loop on its own thread until the watchdog is cancelled.
    pub fn spawn(&self) -> Result<JoinHandle<()>> {
        let wd = self.clone();
        spawn_worker("watchdog", move || {
            info!(
                "Watchdog: probing {} every {:?}",
                wd.inner.settings.address, wd.inner.settings.interval
            );
            while !wd.is_cancelled() {
                wd.run_once();
                if wd.is_cancelled() {
                    break;
                }
                std::thread::sleep(wd.inner.settings.interval);
            }
            info!("Watchdog: loop ended");
        })
    }

    /// One probe plus bookkeeping.  Returns `true` if it triggered the shutdown.
    pub fn run_once(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let result = {
            let mut probe = self
                .inner
                .probe
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            probe.probe(&self.inner.settings.address)
        };
        self.record_probe(result)
    }

    /// Feed one probe outcome into the failure counter.
    pub fn record_probe(&self, result: core::result::Result<(), ProbeError>) -> bool {
        if self.is_cancelled() {
            return false;
        }
        match result {
            Ok(()) => {
                let previous = self.inner.failures.swap(0, Ordering::SeqCst);
                if previous > 0 {
                    info!("Watchdog: server reachable again after {} failure(s)", previous);
                }
                false
            }
            Err(e) => {
                let failures = self.inner.failures.fetch_add(1, Ordering::SeqCst) + 1;
                let limit = self.inner.settings.failures_until_alert;
                warn!("Watchdog: probe failed ({}/{}): {}", failures, limit, e);
                if failures >= limit {
                    error!(
                        "Watchdog: {} consecutive probe failures against {}",
                        failures, self.inner.settings.address
                    );
                    self.shutdown();
                    return true;
                }
                false
            }
        }
    }

    /// Fail-safe shutdown: heater off, stirrer off, signal on, cancelled.
    /// Runs once; later calls are no-ops.
    pub fn shutdown(&self) {
        if self.inner.shutdown_started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner
            .abort
            .raise("watchdog: brewing server unreachable");

        let act = &self.inner.actuators;
        if let Err(e) = act.heater.switch_off() {
            error!("Watchdog: heater off failed: {}", e);
        }
        if let Err(e) = act.stirrer.switch_off() {
            error!("Watchdog: stirrer off failed: {}", e);
        }
        if let Err(e) = act.signal.switch_on() {
            error!("Watchdog: signal on failed: {}", e);
        }

        self.inner.cancelled.store(true, Ordering::SeqCst);
        error!("Watchdog: FAIL-SAFE SHUTDOWN, heater and stirrer off, alarm on");
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.failures.load(Ordering::SeqCst)
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.inner.abort
    }
}
