//! Temperature monitor: polls one thermometer and fires threshold listeners.
//!
//! Listeners are **edge-triggered**.  A listener fires once when a sample
//! enters its band `[target - delta, target + delta]`.  It does not fire
//! again while samples stay inside the band, and fires anew after a sample
//! outside the band followed by one inside.  A listener registered while
//! the temperature is already in band fires on the next successful poll.
//!
//! Sample observers see every successful reading, in poll order.  The
//! brewing process uses one to record the temperature history.
//!
//! A failed read is logged and skipped.  Listeners are neither notified nor
//! unregistered, and their band state is untouched, so a flaky sensor does
//! not produce phantom edges.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};

use crate::app::ports::TemperatureReader;
use crate::drivers::task::spawn_worker;
use crate::error::Result;

/// What a listener wants after it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerAction {
    Keep,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

type Callback = Box<dyn FnMut(f32) -> ListenerAction + Send>;
type SampleCallback = Box<dyn FnMut(f32) + Send>;

struct Listener {
    handle: ListenerHandle,
    target: f32,
    delta: f32,
    in_band: bool,
    callback: Callback,
}

impl Listener {
    fn contains(&self, celsius: f32) -> bool {
        celsius >= self.target - self.delta && celsius <= self.target + self.delta
    }
}

pub struct TemperatureMonitor {
    reader: Mutex<Box<dyn TemperatureReader + Send>>,
    listeners: Mutex<Vec<Listener>>,
    observers: Mutex<Vec<(ListenerHandle, SampleCallback)>>,
    next_handle: AtomicU64,
    last: Mutex<Option<f32>>,
    read_failures: AtomicU32,
}

impl TemperatureMonitor {
    pub fn new(reader: impl TemperatureReader + Send + 'static) -> Self {
        Self {
            reader: Mutex::new(Box::new(reader)),
            listeners: Mutex::new(Vec::new()),
            observers: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            last: Mutex::new(None),
            read_failures: AtomicU32::new(0),
        }
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener.  The callback runs on the polling thread while
    /// the listener table is locked: it must not call back into the monitor.
    pub fn subscribe(
        &self,
        target: f32,
        delta: f32,
        callback: impl FnMut(f32) -> ListenerAction + Send + 'static,
    ) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.listeners().push(Listener {
            handle,
            target,
            delta: delta.abs(),
            in_band: false,
            callback: Box::new(callback),
        });
        debug!(
            "Monitor: listener {:?} for {:.1}±{:.1}°C",
            handle, target, delta
        );
        handle
    }

    fn observers(&self) -> MutexGuard<'_, Vec<(ListenerHandle, SampleCallback)>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a callback for every successful sample.  Same locking rule
    /// as [`subscribe`](Self::subscribe).
    pub fn observe(&self, callback: impl FnMut(f32) + Send + 'static) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.observers().push((handle, Box::new(callback)));
        debug!("Monitor: sample observer {:?}", handle);
        handle
    }

    /// Remove a listener or observer.  Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        let removed = {
            let mut listeners = self.listeners();
            let before = listeners.len();
            listeners.retain(|l| l.handle != handle);
            listeners.len() != before
        };
        if removed {
            return true;
        }
        let mut observers = self.observers();
        let before = observers.len();
        observers.retain(|(h, _)| *h != handle);
        observers.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers().len()
    }

    /// Most recent successful sample.
    pub fn last_temperature(&self) -> Option<f32> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Total failed reads since construction.
    pub fn read_failures(&self) -> u32 {
        self.read_failures.load(Ordering::Relaxed)
    }

    /// One poll cycle: read, then fire listeners on band entry.
    pub fn poll_once(&self) -> Option<f32> {
        let sample = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read_temperature();

        let celsius = match sample {
            Ok(t) => t,
            Err(e) => {
                let n = self.read_failures.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("Monitor: temperature read failed ({} so far): {}", n, e);
                return None;
            }
        };
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(celsius);

        for (_, observer) in self.observers().iter_mut() {
            observer(celsius);
        }

        let mut listeners = self.listeners();
        listeners.retain_mut(|l| {
            let inside = l.contains(celsius);
            let entered = inside && !l.in_band;
            l.in_band = inside;
            if entered {
                debug!("Monitor: {:.1}°C entered band of {:?}", celsius, l.handle);
                return (l.callback)(celsius) == ListenerAction::Keep;
            }
            true
        });
        Some(celsius)
    }

    /// Poll every `interval` on a worker thread until the handle is stopped.
    pub fn spawn(self: &Arc<Self>, interval: Duration) -> Result<MonitorHandle> {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let monitor = Arc::clone(self);
        let worker_stop = Arc::clone(&stop);
        let thread = spawn_worker("temp-monitor", move || {
            info!("Monitor: polling every {:?}", interval);
            let (lock, cvar) = &*worker_stop;
            loop {
                monitor.poll_once();
                let stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
                let (stopped, _) = cvar
                    .wait_timeout_while(stopped, interval, |s| !*s)
                    .unwrap_or_else(PoisonError::into_inner);
                if *stopped {
                    break;
                }
            }
            info!("Monitor: polling stopped");
        })?;
        Ok(MonitorHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Stops the polling thread on `stop()` or drop.
pub struct MonitorHandle {
    stop: Arc<(Mutex<bool>, Condvar)>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn stop(&mut self) {
        {
            let (lock, cvar) = &*self.stop;
            *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
            cvar.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
