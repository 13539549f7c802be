//! Setup of the log sink.
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::threshold::ThresholdFilter;

use crate::config::LoggingParameters;

/// `<ISO8601 timestamp> [<LEVEL>] <message>`
const LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S%.3f%:z)} [{l}] {m}{n}";

/// Builds the log4rs configuration writing to the append-only log file.
pub fn build_config(params: &LoggingParameters) -> Result<Config, String> {
    let file_appender = match FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .append(true)
        .build(&params.file) {
        Ok(appender) => appender,
        Err(err) => return Err(format!("Cannot open log file {}: \'{}\'", params.file.display(), err)),
    };

    let file = Appender::builder()
        .filter(Box::new(ThresholdFilter::new(params.level)))
        .build("file", Box::new(file_appender));

    match Config::builder()
        .appender(file)
        .build(Root::builder().appender("file").build(params.level)) {
        Ok(config) => Ok(config),
        Err(err) => Err(format!("Invalid logger configuration: \'{}\'", err)),
    }
}

/// Installs the global logger, from the log4rs file if configured and the built-in sink otherwise.
pub fn init(params: &LoggingParameters) -> Result<(), String> {
    if let Some(config_file) = &params.config_file {
        return match log4rs::init_file(config_file, Default::default()) {
            Ok(_) => Ok(()),
            Err(err) => Err(format!("Could not create logger from yaml configuration: {}", err)),
        };
    }

    let config = build_config(params)?;
    match log4rs::init_config(config) {
        Ok(_) => Ok(()),
        Err(err) => Err(format!("Could not install logger: {}", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineError;
    use log::{Level, LevelFilter, Log, Record};
    use std::path::PathBuf;

    #[test]
    fn config_builds_for_writable_file() {
        let file = std::env::temp_dir().join(format!("weatherpi-log-{}.log", std::process::id()));
        let params = LoggingParameters { file: file.clone(), level: LevelFilter::Error, config_file: None };

        let config = build_config(&params).unwrap();
        assert_eq!(config.root().level(), LevelFilter::Error);
        assert_eq!(config.appenders().len(), 1);
        assert!(file.exists());

        let _ = std::fs::remove_file(file);
    }

    #[test]
    fn sink_keeps_only_errors_in_iso8601_format() {
        let file = std::env::temp_dir().join(format!("weatherpi-sink-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&file);
        let params = LoggingParameters { file: file.clone(), level: LevelFilter::Error, config_file: None };
        let logger = log4rs::Logger::new(build_config(&params).unwrap());

        let failure = PipelineError::SensorInit(String::from("cannot open /dev/i2c-1"));
        logger.log(&Record::builder()
            .args(format_args!("{}", failure))
            .level(Level::Error)
            .target("weatherpi")
            .build());
        logger.log(&Record::builder()
            .args(format_args!("Stored reading"))
            .level(Level::Info)
            .target("weatherpi")
            .build());
        logger.flush();

        let written = std::fs::read_to_string(&file).unwrap();
        let _ = std::fs::remove_file(&file);
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 1);

        let (timestamp, message) = match lines[0].find(" [") {
            Some(split) => lines[0].split_at(split),
            None => panic!("no level in line: {}", lines[0]),
        };
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok(), "bad timestamp: {}", timestamp);
        assert!(message.starts_with(" [ERROR] Sensor initialization failed: "));
        assert!(message.contains("initialization failed"));
    }

    #[test]
    fn config_fails_for_unwritable_file() {
        let params = LoggingParameters {
            file: PathBuf::from("/proc/weatherpi/forbidden.log"),
            ..LoggingParameters::default()
        };
        let err = build_config(&params).err().unwrap();
        assert!(err.contains("/proc/weatherpi/forbidden.log"));
    }
}
