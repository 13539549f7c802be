//! Module that contains the reading record produced by the sensor pipeline.
use std::fmt;

use chrono::{DateTime, Utc};

/// Converts a temperature in celsius to fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

#[derive(Debug, Clone, PartialEq)]
/// Struct representing a single temperature and humidity observation of a sensor.
pub struct Reading
{
    /// Timestamp the reading was taken.
    pub observed_at: DateTime<Utc>,
    /// The name of the device that took the reading.
    pub device_name: String,
    /// Temperature value in celsius.
    pub celsius: f64,
    /// Temperature value in fahrenheit, derived from `celsius`.
    pub fahrenheit: f64,
    /// Relative humidity value in percent.
    pub humidity: f64,
}

impl Reading {
    /// Creates a reading observed now. The fahrenheit value is always derived from `celsius`.
    pub fn new(device_name: &str, celsius: f64, humidity: f64) -> Reading {
        Reading::observed(Utc::now(), device_name, celsius, humidity)
    }

    /// Creates a reading with an explicit observation timestamp.
    fn observed(observed_at: DateTime<Utc>, device_name: &str, celsius: f64, humidity: f64) -> Reading {
        Reading {
            observed_at,
            device_name: String::from(device_name),
            celsius,
            fahrenheit: celsius_to_fahrenheit(celsius),
            humidity,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Temp: {:.2} °C / {:.2} °F | Humidity: {:.2} %", self.celsius, self.fahrenheit, self.humidity)
    }
}
