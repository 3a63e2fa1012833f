//! The voter and admin workflows.
//!
//! Every workflow follows the same write discipline: validate and check
//! everything local first, then settle on the ledger, then persist locally.
//! The ledger is the source of truth; a local write that fails after the
//! ledger settled is logged as a reconciliation gap, never retried.

use std::sync::Arc;

use mongodb::Database;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};

use crate::{
    crypto::Commitment,
    ledger::LedgerGateway,
    model::{
        db::{AuditEntry, Ballot, Candidate, Identity, NewAuditEntry, Party},
        mongodb::{Coll, Id},
        store::{AuditLog, BallotStore, CandidateStore, IdentityStore, PartyStore},
    },
    Config,
};

mod ballot;
mod candidates;
mod gate;
mod reconcile;
mod registration;
mod session;

pub use gate::{Gate, GatePass};
pub use reconcile::ReconciliationReport;

/// Everything a workflow needs: configuration, stores, and the ledger.
/// Placed in managed state by [`ContextFairing`].
pub struct Context {
    config: Config,
    identities: Arc<dyn IdentityStore>,
    ballots: Arc<dyn BallotStore>,
    candidates: Arc<dyn CandidateStore>,
    parties: Arc<dyn PartyStore>,
    audit: Arc<dyn AuditLog>,
    ledger: LedgerGateway,
    registration_gate: Gate<Commitment>,
    vote_gate: Gate<Id>,
}

impl Context {
    pub fn new(
        config: Config,
        identities: Arc<dyn IdentityStore>,
        ballots: Arc<dyn BallotStore>,
        candidates: Arc<dyn CandidateStore>,
        parties: Arc<dyn PartyStore>,
        audit: Arc<dyn AuditLog>,
        ledger: LedgerGateway,
    ) -> Self {
        Self {
            config,
            identities,
            ballots,
            candidates,
            parties,
            audit,
            ledger,
            registration_gate: Gate::default(),
            vote_gate: Gate::default(),
        }
    }

    /// A context backed by the MongoDB collections of `db`.
    pub fn from_db(config: Config, db: &Database, ledger: LedgerGateway) -> Self {
        Self::new(
            config,
            Arc::new(Coll::<Identity>::from_db(db)),
            Arc::new(Coll::<Ballot>::from_db(db)),
            Arc::new(Coll::<Candidate>::from_db(db)),
            Arc::new(Coll::<Party>::from_db(db)),
            Arc::new(Coll::<AuditEntry>::from_db(db)),
            ledger,
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ledger(&self) -> &LedgerGateway {
        &self.ledger
    }

    /// Append to the audit trail. The operation being audited has already
    /// happened, so a failure here is only logged.
    async fn record_audit(&self, entry: NewAuditEntry) {
        let action = entry.action;
        if let Err(e) = self.audit.record(entry).await {
            error!("Failed to write {action:?} audit entry: {e}");
        }
    }
}

/// A fairing that assembles the workflow [`Context`] from the managed
/// `Config`, `Database` and `LedgerGateway`. Must be attached after the
/// fairings providing those.
pub struct ContextFairing;

#[rocket::async_trait]
impl Fairing for ContextFairing {
    fn info(&self) -> Info {
        Info {
            name: "Workflow context",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = rocket.state::<Config>().cloned();
        let db = rocket.state::<Database>().cloned();
        let ledger = rocket.state::<LedgerGateway>().cloned();
        match (config, db, ledger) {
            (Some(config), Some(db), Some(ledger)) => {
                let context = Context::from_db(config, &db, ledger);
                Ok(rocket.manage(context))
            }
            _ => {
                error!("Config, database and ledger must be set up before the workflow context");
                Err(rocket)
            }
        }
    }
}
