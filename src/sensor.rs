//! Module for acquiring the sensor on the I2C bus and turning its measurements into readings.
use aht20_driver::{AHT20, SENSOR_ADDRESS};
use linux_embedded_hal::{Delay, I2cdev};
use serde::{Deserialize, Serialize};

use crate::record::Reading;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
/// Struct modeling the parameters required to reach the sensor.
pub struct SensorParameters
{
    /// Path of the I2C bus device.
    pub bus: String,
    /// The I2C address of the sensor.
    pub address: u8,
}

impl Default for SensorParameters {
    fn default() -> Self {
        SensorParameters {
            bus: String::from("/dev/i2c-1"),
            address: SENSOR_ADDRESS,
        }
    }
}

/// A bound sensor that can deliver temperature and humidity values.
pub trait Sensor {
    /// Reads the temperature in celsius.
    fn read_temperature(&mut self) -> Result<f64, String>;

    /// Reads the relative humidity in percent.
    fn read_humidity(&mut self) -> Result<f64, String>;
}

/// AHT20 sensor on a linux I2C bus device.
pub struct Aht20Sensor
{
    driver: AHT20<I2cdev>,
    delay: Delay,
}

impl Aht20Sensor {
    /// Takes one measurement, returning `(celsius, humidity)`.
    ///
    /// The driver only hands out a measuring handle after its calibration check, so the check
    /// runs before every measurement.
    fn measure(&mut self) -> Result<(f64, f64), String> {
        let mut initialized = match self.driver.init(&mut self.delay) {
            Ok(initialized) => initialized,
            Err(err) => return Err(format!("sensor not ready: {:?}", err)),
        };

        match initialized.measure(&mut self.delay) {
            Ok(measurement) => Ok((f64::from(measurement.temperature), f64::from(measurement.humidity))),
            Err(err) => Err(format!("measurement failed: {:?}", err)),
        }
    }
}

impl Sensor for Aht20Sensor {
    fn read_temperature(&mut self) -> Result<f64, String> {
        self.measure().map(|(celsius, _)| celsius)
    }

    fn read_humidity(&mut self) -> Result<f64, String> {
        self.measure().map(|(_, humidity)| humidity)
    }
}

/// Opens the I2C bus and binds the AHT20 sensor at the configured address.
///
/// # Arguments
///
/// * `params` - Bus device and address of the sensor.
///
/// # Returns
///
/// * `Ok(...)` - The initialized sensor handle.
///
/// * `Err(...)` - If the bus cannot be opened or the sensor does not answer or calibrate.
///
pub fn acquire(params: &SensorParameters) -> Result<Aht20Sensor, String>
{
    let i2c = match I2cdev::new(&params.bus) {
        Ok(i2c) => i2c,
        Err(err) => {
            log::debug!(target: "weatherpi::sensor", "Could not open i2c bus \'{}\': \'{}\'", params.bus, err);
            return Err(format!("cannot open {}: {}", params.bus, err));
        }
    };

    let mut sensor = Aht20Sensor {
        driver: AHT20::new(i2c, params.address),
        delay: Delay,
    };

    if let Err(err) = sensor.driver.init(&mut sensor.delay) {
        return Err(format!("no calibrated sensor at address {:#04x}: {:?}", params.address, err));
    }

    log::debug!(target: "weatherpi::sensor", "Sensor at address {:#04x} initialized!", params.address);
    Ok(sensor)
}

/// Reads temperature and humidity once and builds a reading for the device.
pub fn read_reading<S: Sensor + ?Sized>(sensor: &mut S, device_name: &str) -> Result<Reading, String>
{
    let celsius = sensor.read_temperature()?;
    let humidity = sensor.read_humidity()?;

    let reading = Reading::new(device_name, celsius, humidity);
    log::debug!(target: "weatherpi::sensor", "Read {:?}", reading);
    Ok(reading)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSensor {
        celsius: f64,
        humidity: f64,
    }

    impl Sensor for FixedSensor {
        fn read_temperature(&mut self) -> Result<f64, String> {
            Ok(self.celsius)
        }

        fn read_humidity(&mut self) -> Result<f64, String> {
            Ok(self.humidity)
        }
    }

    /// Delivers a temperature but fails on the humidity read.
    struct HalfBrokenSensor;

    impl Sensor for HalfBrokenSensor {
        fn read_temperature(&mut self) -> Result<f64, String> {
            Ok(21.0)
        }

        fn read_humidity(&mut self) -> Result<f64, String> {
            Err(String::from("measurement failed: InvalidCrc"))
        }
    }

    #[test]
    fn default_parameters_use_first_bus() {
        let params = SensorParameters::default();
        assert_eq!(params.bus, "/dev/i2c-1");
        assert_eq!(params.address, 0x38);
    }

    #[test]
    fn acquire_fails_for_missing_bus() {
        let params = SensorParameters { bus: String::from("/dev/i2c-does-not-exist"), address: 0x38 };
        let err = acquire(&params).err().unwrap();
        assert!(err.contains("/dev/i2c-does-not-exist"));
    }

    #[test]
    fn read_reading_derives_fahrenheit() {
        let mut sensor = FixedSensor { celsius: 22.5, humidity: 45.3 };
        let reading = read_reading(&mut sensor, "raspi").unwrap();
        assert_eq!(reading.device_name, "raspi");
        assert!((reading.fahrenheit - 72.5).abs() < 1e-9);
        assert!((reading.humidity - 45.3).abs() < 1e-9);
    }

    #[test]
    fn read_failure_is_reported() {
        let err = read_reading(&mut HalfBrokenSensor, "raspi").unwrap_err();
        assert!(err.contains("InvalidCrc"));
    }
}
