//! HTTP health probe for the security watchdog.

use std::time::Duration;

use log::debug;

use crate::app::ports::{HealthProbe, ProbeError};
use crate::config::SystemConfig;

/// One `HEAD` request per probe.  Redirects are not followed and any
/// status in 200–399 counts as healthy.
pub struct HttpProbe {
    agent: ureq::Agent,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .max_redirects(0)
            .build()
            .into();
        Self { agent }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(Duration::from_millis(u64::from(
            config.watchdog_probe_timeout_ms,
        )))
    }
}

impl HealthProbe for HttpProbe {
    fn probe(&mut self, address: &str) -> Result<(), ProbeError> {
        let response = self
            .agent
            .head(address)
            .call()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        debug!("Probe: {} answered {}", address, status);
        if (200..400).contains(&status) {
            Ok(())
        } else {
            Err(ProbeError::Status(status))
        }
    }
}
