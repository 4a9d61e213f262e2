//! Named worker threads.
//!
//! Every long-running loop (temperature poll, watchdog probe, beep worker,
//! process runner) gets its own named thread so it shows up in debuggers
//! and panic messages.  Spawn failures are reported instead of panicking.

use std::thread::JoinHandle;

use crate::error::{Error, Result};

/// Stack size for worker loops.  None of them recurse or buffer much.
const WORKER_STACK_KB: usize = 256;

pub fn spawn_worker(
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>> {
    log::info!("Spawning '{}' (stack={}KB)", name, WORKER_STACK_KB);

    std::thread::Builder::new()
        .name(name.into())
        .stack_size(WORKER_STACK_KB * 1024)
        .spawn(f)
        .map_err(|e| {
            log::error!("Spawning '{}' failed: {}", name, e);
            Error::Init("worker thread could not be spawned")
        })
}
