//! Visual indicator

use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

/// Binary visual indicator
///
/// `set` is called from the input callback context and must not block.
pub trait Indicator: Send + Sync {
    fn set(&self, on: bool);
}

/// LED driven through a sysfs `brightness` attribute
#[derive(Debug)]
pub struct SysfsLed {
    path: PathBuf,
}

impl SysfsLed {
    /// Open the LED, switched off
    ///
    /// Fails when the attribute is missing or not writable; callers treat
    /// that as "no indicator available".
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let led = Self {
            path: path.as_ref().to_path_buf(),
        };
        led.write(false)?;
        debug!("Indicator LED ready at {}", led.path.display());
        Ok(led)
    }

    fn write(&self, on: bool) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.write_all(if on { b"1" } else { b"0" })
    }
}

impl Indicator for SysfsLed {
    fn set(&self, on: bool) {
        if let Err(e) = self.write(on) {
            warn!("Failed to set LED {}: {}", self.path.display(), e);
        }
    }
}
