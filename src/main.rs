extern crate postgres;
extern crate chrono;
extern crate log;
extern crate log4rs;
extern crate ctrlc;
extern crate clap;

use std::io;
use std::path::Path;
use std::process::exit;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{App, ArgMatches};

use crate::config::Configuration;
use crate::pipeline::{PipelineError, ReadFailurePolicy, WatchParameters};

mod config;
mod database;
mod logging;
mod pipeline;
mod record;
mod sensor;

/// Takes one reading and inserts it into the database.
fn run_log(configuration: &Configuration) -> Result<(), PipelineError> {
    let device_name = pipeline::device_name()?;
    let mut store = database::PostgresStore::new(configuration.database_connection_parameters.clone());

    pipeline::log_once(|| sensor::acquire(&configuration.sensor_parameters), &mut store, &device_name)?;
    Ok(())
}

/// The console never shows the device name, so watch mode runs without one if the lookup fails.
fn watch_device_name(lookup: Result<String, PipelineError>) -> String {
    match lookup {
        Ok(device_name) => device_name,
        Err(err) => {
            log::warn!(target: "weatherpi::watch", "{}", err);
            String::new()
        }
    }
}

/// Prints readings to stdout until `terminate` is raised.
fn run_watch(configuration: &Configuration, terminate: &AtomicBool) -> Result<(), PipelineError> {
    let device_name = watch_device_name(pipeline::device_name());
    let mut sensor = sensor::acquire(&configuration.sensor_parameters).map_err(PipelineError::SensorInit)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    pipeline::watch(&mut sensor, &device_name, &configuration.watch_parameters, &mut out, terminate)
}

fn apply_watch_arguments(watch_parameters: &mut WatchParameters, matches: &ArgMatches) -> Result<(), String> {
    if let Some(interval) = matches.value_of("interval") {
        watch_parameters.interval_secs = match interval.parse::<u64>() {
            Ok(secs) => secs,
            Err(err) => return Err(format!("Invalid interval \'{}\': {}", interval, err)),
        };
    }
    if matches.is_present("continue-on-error") {
        watch_parameters.on_read_failure = ReadFailurePolicy::Continue;
    }
    watch_parameters.validate()
}

fn main() {
    let cli_yaml = clap::load_yaml!("cli.yml");
    let matches = App::from(cli_yaml).get_matches();

    let mut configuration = match Configuration::load(matches.value_of("config").map(Path::new)) {
        Ok(configuration) => configuration,
        Err(err) => {
            eprintln!("{}", err);
            exit(2);
        }
    };

    if let ("watch", Some(watch_matches)) = matches.subcommand() {
        if let Err(err) = apply_watch_arguments(&mut configuration.watch_parameters, watch_matches) {
            eprintln!("{}", err);
            exit(2);
        }
    }

    if let Err(err) = logging::init(&configuration.logging_parameters) {
        eprintln!("{}", err);
        exit(2);
    }

    let result = match matches.subcommand_name() {
        Some("log") => run_log(&configuration),
        Some("watch") => {
            let terminate = Arc::new(AtomicBool::new(false));
            let terminate_handler = Arc::clone(&terminate);
            if let Err(err) = ctrlc::set_handler(move || {
                log::info!(target: "weatherpi", "Termination signal received!");
                terminate_handler.store(true, Ordering::SeqCst);
            }) {
                log::warn!(target: "weatherpi", "Could not install termination handler: \'{}\'", err);
            }
            run_watch(&configuration, &terminate)
        }
        _ => {
            eprintln!("{}", matches.usage());
            exit(2);
        }
    };

    match result {
        Ok(_) => {
            log::debug!(target: "weatherpi", "Exiting");
            exit(0);
        }
        Err(err) => {
            log::error!(target: "weatherpi", "{}", err);
            log::logger().flush();
            exit(err.exit_code());
        }
    }
}
