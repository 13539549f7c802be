//! Configuration of the program.
//!
//! Every value has a built-in default, so the configuration file is optional and may name only
//! the keys it wants to change.
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::database::DatabaseParameters;
use crate::pipeline::WatchParameters;
use crate::sensor::SensorParameters;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
/// Parameters of the log sink.
pub struct LoggingParameters {
    /// Append-only file the log lines are written to.
    pub file: PathBuf,
    /// Lowest level that is written.
    pub level: LevelFilter,
    /// Optional log4rs configuration file that replaces the built-in sink.
    pub config_file: Option<PathBuf>,
}

impl Default for LoggingParameters {
    fn default() -> Self {
        LoggingParameters {
            file: PathBuf::from("/home/raspi/ahtx0.log"),
            level: LevelFilter::Error,
            config_file: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Configuration {
    pub sensor_parameters: SensorParameters,
    pub database_connection_parameters: DatabaseParameters,
    pub logging_parameters: LoggingParameters,
    pub watch_parameters: WatchParameters,
}

impl Configuration {
    /// Parses a configuration from its YAML representation.
    pub fn from_yaml(configuration_string: &str) -> Result<Configuration, String> {
        if configuration_string.trim().is_empty() {
            return Ok(Configuration::default());
        }
        let configuration = match serde_yaml::from_str::<Configuration>(configuration_string) {
            Ok(configuration) => configuration,
            Err(err) => return Err(format!("Cannot deserialize the configuration: \'{}\'", err)),
        };
        configuration.watch_parameters.validate()?;
        Ok(configuration)
    }

    /// Reads the configuration file at `path`.
    pub fn from_file(path: &Path) -> Result<Configuration, String> {
        let mut configuration_file = match File::open(path) {
            Ok(file) => file,
            Err(err) => return Err(format!("Cannot open the configuration file {}: \'{}\'", path.display(), err)),
        };

        let mut configuration_string = String::new();
        if let Err(err) = configuration_file.read_to_string(&mut configuration_string) {
            return Err(format!("Cannot read the configuration from file {}: \'{}\'", path.display(), err));
        }

        Configuration::from_yaml(configuration_string.as_str())
    }

    /// Loads the configuration file if one is given, the built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Configuration, String> {
        match path {
            Some(path) => Configuration::from_file(path),
            None => Ok(Configuration::default()),
        }
    }
}
