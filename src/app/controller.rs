//! Brew controller: at most one running process per system.
//!
//! The controller starts processes on a runner thread, routes inbound
//! [`BrewCommand`]s to the active one and answers status queries.  It
//! refuses to start while another process is running or while the
//! fail-safe latch is raised.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{info, warn};

use super::commands::BrewCommand;
use super::ports::RecipeStore;
use super::service::{BrewingDeps, BrewingService, BrewingStatus};
use crate::config::SystemConfig;
use crate::drivers::task::spawn_worker;
use crate::error::{Error, Result};
use crate::model::{Recipe, State};

type SharedService = Arc<Mutex<BrewingService>>;

struct Running {
    service: SharedService,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Running {
    fn join(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub struct BrewController {
    config: SystemConfig,
    deps: BrewingDeps,
    recipes: Arc<dyn RecipeStore + Send + Sync>,
    active: Mutex<Option<Running>>,
}

fn lock(service: &Mutex<BrewingService>) -> MutexGuard<'_, BrewingService> {
    service.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BrewController {
    pub fn new(
        config: SystemConfig,
        deps: BrewingDeps,
        recipes: Arc<dyn RecipeStore + Send + Sync>,
    ) -> Self {
        Self {
            config,
            deps,
            recipes,
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<Running>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_service(&self) -> Option<SharedService> {
        self.active().as_ref().map(|r| Arc::clone(&r.service))
    }

    /// Start brewing `recipe`.  Returns the new log id.
    pub fn start_brewing(&self, recipe: Recipe) -> Result<i64> {
        if self.deps.abort.is_raised() {
            warn!("BrewController: refusing to start, fail-safe latch is raised");
            return Err(Error::FailSafeLatched);
        }

        let mut active = self.active();
        if let Some(running) = active.as_ref() {
            if !lock(&running.service).is_finished() {
                return Err(Error::AlreadyRunning);
            }
        }
        if let Some(mut finished) = active.take() {
            finished.join();
        }

        let log_id = self.deps.logs.next_log_id()?;
        let recipe_id = recipe.id.clone();
        let mut service =
            BrewingService::new(recipe, log_id, self.config.clone(), self.deps.clone())?;
        service.start();

        let service = Arc::new(Mutex::new(service));
        let stop = Arc::new(AtomicBool::new(false));
        let interval = Duration::from_millis(u64::from(self.config.control_loop_interval_ms));
        let thread = {
            let service = Arc::clone(&service);
            let stop = Arc::clone(&stop);
            spawn_worker("brew-runner", move || run_process(&service, &stop, interval))?
        };

        info!(
            "BrewController: brewing '{}' as log {}",
            recipe_id, log_id
        );
        *active = Some(Running {
            service,
            stop,
            thread: Some(thread),
        });
        Ok(log_id)
    }

    /// Load a stored recipe and start brewing it.
    pub fn start_recipe(&self, recipe_id: &str) -> Result<i64> {
        let recipe = self.recipes.get_recipe(recipe_id)?;
        self.start_brewing(recipe)
    }

    /// Route an inbound command to the running process.
    pub fn handle_command(&self, command: BrewCommand) -> Result<()> {
        let service = self
            .active_service()
            .ok_or_else(|| Error::NotFound("no brewing process".to_string()))?;
        let mut service = lock(&service);
        match command {
            BrewCommand::ConfirmStep { state } => service.confirm_step(state),
            BrewCommand::ConfirmIodine { duration } => service.confirm_iodine(duration),
            BrewCommand::Cancel => {
                service.cancel();
                Ok(())
            }
        }
    }

    /// Status of the current (or most recent) process.
    pub fn status(&self) -> Option<BrewingStatus> {
        self.active_service().map(|s| lock(&s).status())
    }

    pub fn is_running(&self) -> bool {
        self.active_service()
            .is_some_and(|s| !lock(&s).is_finished())
    }

    /// Where the most recent process saved its log.
    pub fn saved_log(&self) -> Option<PathBuf> {
        self.active_service()
            .and_then(|s| lock(&s).saved_path().map(PathBuf::from))
    }

    /// Block until the current process ends or `timeout` passes.
    pub fn wait_for_completion(&self, timeout: Duration) -> Option<State> {
        let service = self.active_service()?;
        let deadline = Instant::now() + timeout;
        loop {
            {
                let service = lock(&service);
                if service.is_finished() {
                    return Some(service.state());
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Cancel a running process and stop its runner.
    pub fn shutdown(&self) {
        let mut active = self.active();
        if let Some(running) = active.as_mut() {
            lock(&running.service).cancel();
            running.join();
        }
    }
}

impl Drop for BrewController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_process(service: &Mutex<BrewingService>, stop: &AtomicBool, interval: Duration) {
    let mut last = Instant::now();
    loop {
        std::thread::sleep(interval);
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let now = Instant::now();
        let elapsed = now.duration_since(last).as_secs_f64();
        last = now;

        if lock(service).tick(elapsed).is_terminal() {
            break;
        }
    }
    info!("BrewController: runner finished");
}
