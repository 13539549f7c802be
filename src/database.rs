//! Module for connecting to a postgres database and storing the readings of the sensor in
//! the database.
use openssl::ssl::{SslConnector, SslFiletype, SslMethod, SslVerifyMode};
use postgres::{Client, NoTls};
use postgres_openssl::MakeTlsConnector;
use serde::{Deserialize, Serialize};

use crate::record::Reading;

static SQL_INSERT_READING: &'static str = include_str!("sql/insert_reading.sql");

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
/// Struct modeling the parameters required for a database connection.
///
/// This includes SSL/TLS encryption.
pub struct DatabaseParameters
{
    /// The hostname of the database server, or the directory of its unix socket.
    pub hostname: String,
    /// The port for the database server.
    pub port: u16,
    /// The username to connect as.
    pub username: String,
    /// The password to connect with.
    pub password: Option<String>,
    /// The database to open on the server.
    pub database: String,
    /// Flag to enable tls for the database server connection.
    pub tls_enable: bool,
    /// Parameters for the tls connection to the database server.
    pub tls_params: Option<DatabaseTlsParameters>,
}

impl Default for DatabaseParameters {
    fn default() -> Self {
        DatabaseParameters {
            hostname: String::from("/var/run/postgresql"),
            port: 5432,
            username: String::from("raspi"),
            password: None,
            database: String::from("sensor_data"),
            tls_enable: false,
            tls_params: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Struct for the parameters required for a tls connection to the database.
pub struct DatabaseTlsParameters {
    /// The path to the server certificate for TLS encryption.
    pub server_ca_path: String,
    /// The path to the client certificate for TLS encryption.
    pub client_cert_path: String,
    /// The path to the client key for TLS encryption.
    pub client_key_path: String,
}

/// Destination for readings.
pub trait ReadingStore {
    /// Persists exactly one reading.
    fn insert(&mut self, reading: &Reading) -> Result<(), String>;
}

/// Store inserting every reading into the `aht20_sensor_readings` table over a fresh connection.
pub struct PostgresStore {
    parameters: DatabaseParameters,
}

impl PostgresStore {
    pub fn new(parameters: DatabaseParameters) -> Self {
        PostgresStore { parameters }
    }
}

impl ReadingStore for PostgresStore {
    fn insert(&mut self, reading: &Reading) -> Result<(), String> {
        let mut database_client = connect(&self.parameters)?;
        insert_reading(&mut database_client, reading)
    }
}

fn postgres_config(connection_parameters: &DatabaseParameters) -> postgres::Config
{
    let mut config = postgres::Config::new();
    config
        .host(&connection_parameters.hostname)
        .port(connection_parameters.port)
        .user(&connection_parameters.username)
        .dbname(&connection_parameters.database)
        .application_name("weatherpi");
    if let Some(password) = &connection_parameters.password {
        config.password(password);
    }
    config
}

fn tls_connector(tls_params: &DatabaseTlsParameters) -> Result<MakeTlsConnector, String>
{
    let mut ssl_connection_builder = match SslConnector::builder(SslMethod::tls()) {
        Ok(builder) => builder,
        Err(err) => {
            log::debug!(target: "weatherpi::db", "Could not create ssl connection builder: \'{}\'", err);
            return Err(format!("could not create ssl connection builder: {}", err));
        }
    };

    ssl_connection_builder.set_verify(SslVerifyMode::NONE);

    if let Err(err) = ssl_connection_builder.set_ca_file(&tls_params.server_ca_path) {
        return Err(format!("could not set ssl ca file \'{}\': {}", tls_params.server_ca_path, err));
    }

    if let Err(err) = ssl_connection_builder.set_certificate_file(&tls_params.client_cert_path, SslFiletype::PEM) {
        return Err(format!("could not set ssl client cert file \'{}\': {}", tls_params.client_cert_path, err));
    }

    if let Err(err) = ssl_connection_builder.set_private_key_file(&tls_params.client_key_path, SslFiletype::PEM) {
        return Err(format!("could not set ssl client key file \'{}\': {}", tls_params.client_key_path, err));
    }

    Ok(MakeTlsConnector::new(ssl_connection_builder.build()))
}

/// Establishes a database connection, encrypted if `tls_enable` is set.
///
/// # Errors
///
/// Errors occur when one of the following conditions is met:
///
/// * TLS is enabled without TLS parameters or the files for the TLS connection cannot be found.
///
/// * The connection cannot be established.
///
/// * The user is not authorized for the database.
///
pub fn connect(connection_parameters: &DatabaseParameters) -> Result<Client, String>
{
    let config = postgres_config(connection_parameters);

    let connection = if connection_parameters.tls_enable {
        let tls_params = match &connection_parameters.tls_params {
            Some(tls_params) => tls_params,
            None => return Err(String::from("TLS enabled but no TLS parameters specified")),
        };
        config.connect(tls_connector(tls_params)?)
    } else {
        config.connect(NoTls)
    };

    match connection {
        Ok(client) => {
            log::debug!(target: "weatherpi::db", "Database connection established!");
            Ok(client)
        }
        Err(err) => Err(format!("could not establish database connection: {}", err)),
    }
}

/// Function to insert a reading into the database.
///
/// The row is written inside a transaction; when any step fails the transaction is dropped
/// uncommitted and rolled back.
///
/// # Arguments
///
/// * `database_client` - Database connection to execute the queries on.
///
/// * `reading` - The reading to add to the database.
///
/// # Returns
///
/// * `Ok(())` - On success.
///
/// * `Err(...)` - If the row cannot be inserted or the transaction cannot be committed.
///
pub fn insert_reading(database_client: &mut Client, reading: &Reading) -> Result<(), String>
{
    let mut transaction = match database_client.transaction() {
        Ok(transaction) => transaction,
        Err(err) => return Err(format!("could not start transaction: {}", err)),
    };

    match transaction.execute(SQL_INSERT_READING,
                              &[&reading.fahrenheit, &reading.humidity, &reading.device_name]) {
        Ok(rows) => log::debug!(target: "weatherpi::db", "Inserted {} row(s)", rows),
        Err(err) => return Err(format!("could not insert reading: {}", err)),
    };

    match transaction.commit() {
        Ok(_) => Ok(()),
        Err(err) => Err(format!("could not commit transaction: {}", err)),
    }
}
