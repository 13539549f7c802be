//! The acquire, read, persist pipeline and the interactive watch loop.
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::database::ReadingStore;
use crate::record::Reading;
use crate::sensor::{self, Sensor};

/// Fatal failure of one pipeline stage together with its cause.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The hostname of the device could not be determined.
    Identity(String),
    /// The bus or the sensor is not available.
    SensorInit(String),
    /// The sensor did not deliver a valid measurement.
    SensorRead(String),
    /// The reading could not be written to the database.
    Persistence(String),
}

impl PipelineError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Identity(cause) => write!(f, "Device identity lookup failed: {}", cause),
            PipelineError::SensorInit(cause) => write!(f, "Sensor initialization failed: {}", cause),
            PipelineError::SensorRead(cause) => write!(f, "Sensor read failed: {}", cause),
            PipelineError::Persistence(cause) => write!(f, "Database insert failed: {}", cause),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Resolves the name the readings of this device are tagged with.
pub fn device_name() -> Result<String, PipelineError> {
    let hostname = nix::unistd::gethostname().map_err(|err| PipelineError::Identity(err.to_string()))?;
    hostname
        .into_string()
        .map_err(|name| PipelineError::Identity(format!("hostname {:?} is not valid UTF-8", name)))
}

/// Takes a single reading and stores it.
///
/// The sensor is only acquired through `acquire`; nothing is written to `store` unless both
/// acquisition and read succeed.
///
/// # Arguments
///
/// * `acquire` - Opens and binds the sensor.
///
/// * `store` - Destination of the reading.
///
/// * `device_name` - Name the reading is tagged with.
///
/// # Returns
///
/// * `Ok(reading)` - The reading that was stored.
///
/// * `Err(...)` - The first stage that failed.
///
pub fn log_once<S, A, W>(acquire: A, store: &mut W, device_name: &str) -> Result<Reading, PipelineError>
where
    S: Sensor,
    A: FnOnce() -> Result<S, String>,
    W: ReadingStore + ?Sized,
{
    let mut sensor = acquire().map_err(PipelineError::SensorInit)?;
    let reading = sensor::read_reading(&mut sensor, device_name).map_err(PipelineError::SensorRead)?;
    store.insert(&reading).map_err(PipelineError::Persistence)?;

    log::info!(target: "weatherpi", "Stored reading of {}: {}", reading.device_name, reading);
    Ok(reading)
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
/// What the watch loop does when a single read fails.
pub enum ReadFailurePolicy {
    /// Stop the loop and report the failure.
    Abort,
    /// Log the failure and wait for the next sample.
    Continue,
}

impl Default for ReadFailurePolicy {
    fn default() -> Self {
        ReadFailurePolicy::Abort
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
/// Parameters of the interactive watch loop.
pub struct WatchParameters {
    /// Seconds to sleep between two samples.
    pub interval_secs: u64,
    /// Behaviour on a failed read.
    pub on_read_failure: ReadFailurePolicy,
}

impl Default for WatchParameters {
    fn default() -> Self {
        WatchParameters {
            interval_secs: 60,
            on_read_failure: ReadFailurePolicy::default(),
        }
    }
}

impl WatchParameters {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Rejects an interval of zero, which would read the sensor without pause.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err(String::from("The watch interval must be at least one second"));
        }
        Ok(())
    }
}

/// Sleeps for `duration` unless `terminate` is raised earlier.
///
/// Returns `true` if the wait was cut short by the termination flag.
fn wait_for(duration: Duration, terminate: &AtomicBool) -> bool {
    let step = Duration::from_millis(100);
    // Intervals beyond the range of `Instant` never expire.
    let deadline = Instant::now().checked_add(duration);
    loop {
        if terminate.load(Ordering::SeqCst) {
            return true;
        }
        match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                sleep(step.min(deadline - now));
            }
            None => sleep(step),
        }
    }
}

/// Prints a reading of `sensor` to `out` every `params.interval()` until `terminate` is raised.
///
/// A failed read either ends the loop with `PipelineError::SensorRead` or is logged and skipped,
/// depending on `params.on_read_failure`.
pub fn watch<S, O>(sensor: &mut S, device_name: &str, params: &WatchParameters, out: &mut O, terminate: &AtomicBool) -> Result<(), PipelineError>
where
    S: Sensor + ?Sized,
    O: Write,
{
    log::info!(target: "weatherpi::watch", "Sampling every {} second(s)", params.interval_secs);

    while !terminate.load(Ordering::SeqCst) {
        match sensor::read_reading(sensor, device_name) {
            Ok(reading) => {
                if let Err(err) = writeln!(out, "{}", reading).and_then(|_| out.flush()) {
                    log::warn!(target: "weatherpi::watch", "Could not write reading: \'{}\'", err);
                }
            }
            Err(cause) => {
                let err = PipelineError::SensorRead(cause);
                match params.on_read_failure {
                    ReadFailurePolicy::Abort => return Err(err),
                    ReadFailurePolicy::Continue => log::error!(target: "weatherpi::watch", "{}", err),
                }
            }
        }

        if wait_for(params.interval(), terminate) {
            break;
        }
    }

    log::info!(target: "weatherpi::watch", "Termination requested, leaving watch loop");
    Ok(())
}
