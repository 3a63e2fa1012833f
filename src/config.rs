use std::sync::Arc;

use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    biometric::DEFAULT_MATCH_THRESHOLD,
    ledger::{LedgerClient, LedgerGateway, MemoryLedger, RpcLedger},
    model::mongodb::ensure_indexes_exist,
};

/// How biometric claims are gated at the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricMode {
    /// The terminal submits a template and the server scores it.
    #[default]
    Template,
    /// The terminal matches locally and submits its verdict.
    TerminalConfirmed,
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_auth_ttl")]
    auth_ttl: i64,
    #[serde(default = "default_match_threshold")]
    match_threshold: f64,
    #[serde(default = "default_template_len")]
    template_len: usize,
    #[serde(default)]
    biometric_mode: BiometricMode,
    #[serde(default)]
    unique_contact: bool,
    #[serde(default)]
    vote_recheck_biometric: bool,
    #[serde(default)]
    terminals: Vec<String>,
    // secrets
    jwt_secret: String,
    server_salt: String,
    admin_key_hash: String,
}

fn default_auth_ttl() -> i64 {
    1800
}

fn default_match_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}

fn default_template_len() -> usize {
    128
}

impl Config {
    /// Valid lifetime of session credentials.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl)
    }

    /// Minimum cosine similarity for a biometric match.
    pub fn match_threshold(&self) -> f64 {
        self.match_threshold
    }

    /// Dimensionality every biometric template must have.
    pub fn template_len(&self) -> usize {
        self.template_len
    }

    pub fn biometric_mode(&self) -> BiometricMode {
        self.biometric_mode
    }

    /// Whether email and phone must also be unique across identities.
    pub fn unique_contact(&self) -> bool {
        self.unique_contact
    }

    /// Whether voting requires fresh biometric evidence as well as the secret.
    pub fn vote_recheck_biometric(&self) -> bool {
        self.vote_recheck_biometric
    }

    /// Terminals allowed to log voters in and cast ballots.
    /// Empty means any terminal that identifies itself.
    pub fn terminals(&self) -> &[String] {
        &self.terminals
    }

    /// Secret key used to sign session JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Salt mixed into every identity commitment.
    pub fn server_salt(&self) -> &str {
        &self.server_salt
    }

    /// Argon2-encoded hash of the admin API key.
    pub fn admin_key_hash(&self) -> &str {
        &self.admin_key_hash
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.auth_ttl <= 0 {
            error!("`auth_ttl` must be positive, got {}", config.auth_ttl);
            return Err(rocket);
        }
        if !(0.0..=1.0).contains(&config.match_threshold) {
            error!(
                "`match_threshold` must be within [0, 1], got {}",
                config.match_threshold
            );
            return Err(rocket);
        }

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures the indexes exist, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // The unique indexes are what make duplicate identities and double
        // ballots impossible at the data layer.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "evote".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Configuration for the ledger connection.
#[derive(Deserialize)]
struct LedgerConfig {
    // non-secrets
    ledger_url: Option<String>,
    #[serde(default = "default_settle_timeout")]
    ledger_settle_timeout: u64,
    #[serde(default = "default_poll_interval")]
    ledger_poll_interval: u64,
}

fn default_settle_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    500
}

/// A fairing that loads the ledger config and places a `LedgerGateway` into
/// managed state. Without a `ledger_url`, an in-process ledger is used, which
/// is only suitable for development.
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<LedgerConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load ledger config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let client: Arc<dyn LedgerClient> = match config.ledger_url {
            Some(url) => {
                info!("Using ledger relay at {url}");
                Arc::new(RpcLedger::new(url))
            }
            None => {
                warn!("No `ledger_url` configured, using the in-process development ledger");
                Arc::new(MemoryLedger::new())
            }
        };
        let gateway = LedgerGateway::new(
            client,
            std::time::Duration::from_secs(config.ledger_settle_timeout),
            std::time::Duration::from_millis(config.ledger_poll_interval),
        );

        rocket = rocket.manage(gateway);
        Ok(rocket)
    }
}
