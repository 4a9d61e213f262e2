//! Acoustic signalling on the signal relay.
//!
//! Beep patterns are queued on a bounded, fixed-capacity queue and played by
//! one worker thread.  Requests beyond the capacity are dropped (a backlog of
//! stale beeps is worse than a missing one).  `cancel_all()` empties the queue
//! and cuts the pattern currently playing short.
//!
//! | Pattern | Shape                              |
//! |---------|------------------------------------|
//! | Single  | on 1 unit                          |
//! | Double  | on 2 units, off 1 unit, on 2 units |
//!
//! One unit is 500 ms in production.
//!
//! The worker uses guarded relay commands: once the fail-safe latch is
//! raised it neither starts nor stops a beep, so the watchdog's continuous
//! alarm stays on.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use heapless::Deque;
use log::{debug, warn};

use super::Actuator;
use super::task::spawn_worker;
use crate::error::Result;
use crate::safety::AbortSignal;

/// Hard upper bound on queued patterns.
pub const MAX_PENDING_BEEPS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeepPattern {
    /// Attention: a confirmation is needed or the run finished.
    Single,
    /// Heads-up: a hop addition is coming.
    Double,
}

impl BeepPattern {
    /// `(signal on, length in units)` steps.
    fn steps(self) -> &'static [(bool, u32)] {
        match self {
            Self::Single => &[(true, 1)],
            Self::Double => &[(true, 2), (false, 1), (true, 2)],
        }
    }
}

struct BeepQueue {
    pending: Deque<BeepPattern, MAX_PENDING_BEEPS>,
    capacity: usize,
    /// Bumped by `cancel_all()`; a playing pattern stops when it changes.
    generation: u64,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<BeepQueue>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BeepQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Beeper {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Beeper {
    pub const DEFAULT_UNIT: Duration = Duration::from_millis(500);

    /// Start the worker.  `capacity` is clamped to [`MAX_PENDING_BEEPS`].
    pub fn spawn(
        signal: Actuator,
        abort: AbortSignal,
        capacity: usize,
        unit: Duration,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(BeepQueue {
                pending: Deque::new(),
                capacity: capacity.clamp(1, MAX_PENDING_BEEPS),
                generation: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = spawn_worker("beeper", move || {
            run_worker(&worker_shared, &signal, &abort, unit);
        })?;
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Queue a pattern.  Returns `false` if the queue is full.
    pub fn request(&self, pattern: BeepPattern) -> bool {
        let mut q = self.shared.lock();
        if q.pending.len() >= q.capacity || q.pending.push_back(pattern).is_err() {
            warn!("Beeper: queue full, dropping {:?}", pattern);
            return false;
        }
        self.shared.wake.notify_all();
        true
    }

    /// Drop every queued pattern and stop the one playing.
    pub fn cancel_all(&self) {
        let mut q = self.shared.lock();
        q.pending.clear();
        q.generation = q.generation.wrapping_add(1);
        self.shared.wake.notify_all();
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }
}

impl Drop for Beeper {
    fn drop(&mut self) {
        {
            let mut q = self.shared.lock();
            q.shutdown = true;
            q.generation = q.generation.wrapping_add(1);
        }
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(shared: &Shared, signal: &Actuator, abort: &AbortSignal, unit: Duration) {
    loop {
        let (pattern, generation) = {
            let mut q = shared.lock();
            loop {
                if q.shutdown {
                    return;
                }
                if let Some(p) = q.pending.pop_front() {
                    break (p, q.generation);
                }
                q = shared.wake.wait(q).unwrap_or_else(PoisonError::into_inner);
            }
        };
        debug!("Beeper: playing {:?}", pattern);
        play(shared, signal, abort, unit, pattern, generation);
    }
}

fn play(
    shared: &Shared,
    signal: &Actuator,
    abort: &AbortSignal,
    unit: Duration,
    pattern: BeepPattern,
    generation: u64,
) {
    for &(on, units) in pattern.steps() {
        let applied = if on {
            signal.switch_on_guarded(abort)
        } else {
            signal.switch_off_guarded(abort)
        };
        match applied {
            Ok(true) => {}
            Ok(false) => return, // fail-safe owns the signal now
            Err(e) => {
                warn!("Beeper: signal relay failed: {}", e);
                return;
            }
        }

        let q = shared.lock();
        let (q, _) = shared
            .wake
            .wait_timeout_while(q, unit * units, |q| q.generation == generation && !q.shutdown)
            .unwrap_or_else(PoisonError::into_inner);
        if q.generation != generation || q.shutdown {
            drop(q);
            let _ = signal.switch_off_guarded(abort);
            return;
        }
    }
    if let Err(e) = signal.switch_off_guarded(abort) {
        warn!("Beeper: signal relay failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::relay::Relay;
    use crate::drivers::sim_pin::SimPin;
    use std::time::Instant;

    fn signal() -> Actuator {
        Actuator::new("signal", Relay::signal(SimPin::new()).unwrap())
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn plays_and_releases_the_signal() {
        let sig = signal();
        let beeper =
            Beeper::spawn(sig.clone(), AbortSignal::new(), 4, Duration::from_millis(5)).unwrap();
        assert!(beeper.request(BeepPattern::Double));
        assert!(wait_until(|| beeper.pending() == 0 && !sig.is_switched_on()));
    }

    #[test]
    fn full_queue_drops_requests() {
        let sig = signal();
        let beeper =
            Beeper::spawn(sig, AbortSignal::new(), 2, Duration::from_millis(200)).unwrap();
        let accepted = (0..6).filter(|_| beeper.request(BeepPattern::Single)).count();
        // One may already be playing, so at most capacity + 1 are accepted.
        assert!(accepted <= 3, "accepted {accepted}");
        beeper.cancel_all();
        assert_eq!(beeper.pending(), 0);
    }

    #[test]
    fn cancel_cuts_the_current_beep() {
        let sig = signal();
        let beeper =
            Beeper::spawn(sig.clone(), AbortSignal::new(), 4, Duration::from_secs(30)).unwrap();
        beeper.request(BeepPattern::Single);
        assert!(wait_until(|| sig.is_switched_on()));
        beeper.cancel_all();
        assert!(wait_until(|| !sig.is_switched_on()));
    }

    #[test]
    fn latched_abort_keeps_the_alarm_on() {
        let sig = signal();
        let abort = AbortSignal::new();
        let beeper =
            Beeper::spawn(sig.clone(), abort.clone(), 4, Duration::from_millis(5)).unwrap();

        abort.raise("watchdog");
        sig.switch_on().unwrap();
        beeper.request(BeepPattern::Double);
        assert!(wait_until(|| beeper.pending() == 0));
        std::thread::sleep(Duration::from_millis(40));
        assert!(sig.is_switched_on());
    }
}
