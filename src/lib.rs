#[macro_use]
extern crate log;
#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod biometric;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod workflow;

pub use config::Config;

/// Assemble the server. Configuration, the database connection, the ledger
/// connection and the workflow context are set up by fairings at ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/api", api::routes())
        .register("/", api::catchers())
        .attach(logging::LoggerFairing)
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(config::LedgerFairing)
        .attach(workflow::ContextFairing)
}
