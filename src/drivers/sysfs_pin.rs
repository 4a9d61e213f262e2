//! Linux sysfs GPIO output pin.
//!
//! Drives a relay line through `/sys/class/gpio`: the line is exported if
//! the kernel has not done so yet, switched to output, and every level
//! change is one write to its `value` file.  The root directory is
//! configurable so tests can run against a temporary tree.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};
use log::{debug, info};

#[derive(Debug)]
pub struct SysfsPinError {
    path: PathBuf,
    kind: io::ErrorKind,
}

impl SysfsPinError {
    fn new(path: &Path, e: &io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: e.kind(),
        }
    }
}

impl fmt::Display for SysfsPinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.kind)
    }
}

impl std::error::Error for SysfsPinError {}

impl digital::Error for SysfsPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug)]
pub struct SysfsPin {
    line: u8,
    value: PathBuf,
}

impl SysfsPin {
    /// Export GPIO `line` under `root` if needed and configure it as an
    /// output.
    pub fn open(root: &Path, line: u8) -> Result<Self, SysfsPinError> {
        let dir = root.join(format!("gpio{line}"));
        if !dir.exists() {
            let export = root.join("export");
            write(&export, &line.to_string())?;
            info!("GPIO {}: exported", line);
        }
        write(&dir.join("direction"), "out")?;
        Ok(Self {
            line,
            value: dir.join("value"),
        })
    }

    pub fn line(&self) -> u8 {
        self.line
    }

    fn set(&mut self, high: bool) -> Result<(), SysfsPinError> {
        write(&self.value, if high { "1" } else { "0" })?;
        debug!("GPIO {}: {}", self.line, if high { "high" } else { "low" });
        Ok(())
    }
}

fn write(path: &Path, contents: &str) -> Result<(), SysfsPinError> {
    fs::write(path, contents).map_err(|e| SysfsPinError::new(path, &e))
}

impl ErrorType for SysfsPin {
    type Error = SysfsPinError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true)
    }
}
