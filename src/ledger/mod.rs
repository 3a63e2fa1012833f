//! The external ledger: identity registry and ballot registry contract calls.
//!
//! Writes are two-phase. A call is submitted, which yields a transaction
//! reference, and the gateway then polls until the transaction settles or
//! the settlement timeout passes. Transactions that time out stay in the
//! pending journal so that reconciliation can find out what became of them.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rocket::serde::json::Value;
use rocket::tokio::{self, sync::Mutex, time::Instant};
use serde::{Deserialize, Serialize};

use crate::crypto::Commitment;
use crate::error::{Error, Result};

mod memory;
mod rpc;

pub use memory::MemoryLedger;
pub use rpc::RpcLedger;

/// Opaque proof that a transaction was submitted to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(String);

impl TxRef {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TxRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A state-changing contract call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum LedgerCall {
    RegisterIdentity { identity: Commitment },
    AddCandidate { name: String },
    Vote { candidate: u64, identity: Commitment },
}

impl LedgerCall {
    /// Contract method name.
    pub fn method(&self) -> &'static str {
        match self {
            Self::RegisterIdentity { .. } => "registerIdentity",
            Self::AddCandidate { .. } => "addCandidate",
            Self::Vote { .. } => "vote",
        }
    }

    /// Positional contract arguments.
    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::RegisterIdentity { identity } => vec![identity.to_string().into()],
            Self::AddCandidate { name } => vec![name.clone().into()],
            Self::Vote {
                candidate,
                identity,
            } => vec![(*candidate).into(), identity.to_string().into()],
        }
    }
}

/// A read-only contract call.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerQuery {
    IsRegistered(Commitment),
    HasVoted(Commitment),
    CandidatesCount,
    RegisteredIdentities,
}

impl LedgerQuery {
    pub fn method(&self) -> &'static str {
        match self {
            Self::IsRegistered(_) => "isRegistered",
            Self::HasVoted(_) => "hasVoted",
            Self::CandidatesCount => "candidatesCount",
            Self::RegisteredIdentities => "registeredIdentities",
        }
    }

    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::IsRegistered(identity) | Self::HasVoted(identity) => {
                vec![identity.to_string().into()]
            }
            Self::CandidatesCount | Self::RegisteredIdentities => Vec::new(),
        }
    }
}

/// Where a submitted transaction currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Submitted but not yet final.
    Pending,
    /// Final. `output` carries the call's return value where it has one,
    /// e.g. the index assigned by `addCandidate`.
    Confirmed { output: Option<u64> },
    /// Final, but the contract refused it.
    Reverted { reason: String },
}

/// The raw capability to talk to the ledger.
///
/// Implementations report transport failures as [`Error::LedgerUnavailable`]
/// and contract refusals as [`Error::LedgerRejected`].
#[rocket::async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a call, returning as soon as the ledger has accepted it.
    async fn submit(&self, call: &LedgerCall) -> Result<TxRef>;
    /// Look up the status of a submitted transaction.
    async fn status(&self, tx: &TxRef) -> Result<TxStatus>;
    /// Evaluate a read-only call against the latest settled state.
    async fn query(&self, query: &LedgerQuery) -> Result<Value>;
}

/// A transaction that was submitted but whose settlement has not been seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingTx {
    pub tx: TxRef,
    pub call: LedgerCall,
    pub submitted_at: DateTime<Utc>,
}

/// Outcome of re-checking the pending journal.
#[derive(Debug, Default, Serialize)]
pub struct JournalSweep {
    pub confirmed: Vec<TxRef>,
    pub reverted: Vec<TxRef>,
    pub pending: Vec<PendingTx>,
}

/// Typed access to the identity and ballot registries.
#[derive(Clone)]
pub struct LedgerGateway {
    client: Arc<dyn LedgerClient>,
    settle_timeout: Duration,
    poll_interval: Duration,
    journal: Arc<Mutex<HashMap<TxRef, PendingTx>>>,
    candidate_lock: Arc<Mutex<()>>,
}

impl LedgerGateway {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        settle_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            settle_timeout,
            poll_interval,
            journal: Default::default(),
            candidate_lock: Default::default(),
        }
    }

    /// Record an identity commitment in the registry.
    pub async fn register_identity(&self, identity: &Commitment) -> Result<TxRef> {
        let call = LedgerCall::RegisterIdentity {
            identity: *identity,
        };
        let (tx, _) = self.settle(call).await?;
        Ok(tx)
    }

    /// Is this identity commitment in the registry?
    pub async fn is_registered(&self, identity: &Commitment) -> Result<bool> {
        let value = self
            .client
            .query(&LedgerQuery::IsRegistered(*identity))
            .await?;
        expect_bool(&value, "isRegistered")
    }

    /// Has this identity commitment already voted?
    pub async fn has_voted(&self, identity: &Commitment) -> Result<bool> {
        let value = self.client.query(&LedgerQuery::HasVoted(*identity)).await?;
        expect_bool(&value, "hasVoted")
    }

    /// Every identity commitment in the registry.
    pub async fn registered_identities(&self) -> Result<Vec<Commitment>> {
        let value = self
            .client
            .query(&LedgerQuery::RegisteredIdentities)
            .await?;
        value
            .as_array()
            .ok_or_else(|| malformed("registeredIdentities", &value))?
            .iter()
            .map(|item| {
                item.as_str()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| malformed("registeredIdentities", item))
            })
            .collect()
    }

    /// Number of candidates on the ballot. Valid candidate indices are
    /// `0..count`.
    pub async fn candidate_count(&self) -> Result<u64> {
        let value = self.client.query(&LedgerQuery::CandidatesCount).await?;
        value_as_u64(&value).ok_or_else(|| malformed("candidatesCount", &value))
    }

    /// Add a candidate, returning the index the ledger assigned to it.
    pub async fn add_candidate(&self, name: &str) -> Result<(u64, TxRef)> {
        // Held across submit and settlement so that the count fallback
        // below cannot observe another admin's candidate.
        let _lock = self.candidate_lock.lock().await;
        let call = LedgerCall::AddCandidate {
            name: name.to_string(),
        };
        let (tx, output) = self.settle(call).await?;
        let index = match output {
            Some(index) => index,
            None => self.candidate_count().await?.checked_sub(1).ok_or_else(|| {
                Error::LedgerUnavailable(format!(
                    "candidate added in {tx} but the ledger reports no candidates"
                ))
            })?,
        };
        Ok((index, tx))
    }

    /// Cast a vote. The contract refuses a second vote from the same
    /// identity, whatever the local store believes.
    pub async fn cast_vote(&self, candidate: u64, identity: &Commitment) -> Result<TxRef> {
        let call = LedgerCall::Vote {
            candidate,
            identity: *identity,
        };
        let (tx, _) = self.settle(call).await?;
        Ok(tx)
    }

    /// Transactions submitted but not yet seen to settle.
    pub async fn pending(&self) -> Vec<PendingTx> {
        let mut pending: Vec<_> = self.journal.lock().await.values().cloned().collect();
        pending.sort_by_key(|p| p.submitted_at);
        pending
    }

    /// Poll every journalled transaction once, dropping those that settled.
    pub async fn sweep_journal(&self) -> JournalSweep {
        let mut sweep = JournalSweep::default();
        for pending in self.pending().await {
            match self.client.status(&pending.tx).await {
                Ok(TxStatus::Confirmed { .. }) => {
                    info!(
                        "Journalled {} transaction {} has settled",
                        pending.call.method(),
                        pending.tx
                    );
                    self.journal.lock().await.remove(&pending.tx);
                    sweep.confirmed.push(pending.tx);
                }
                Ok(TxStatus::Reverted { reason }) => {
                    warn!(
                        "Journalled {} transaction {} reverted: {reason}",
                        pending.call.method(),
                        pending.tx
                    );
                    self.journal.lock().await.remove(&pending.tx);
                    sweep.reverted.push(pending.tx);
                }
                Ok(TxStatus::Pending) => sweep.pending.push(pending),
                Err(e) => {
                    warn!("Could not check transaction {}: {e}", pending.tx);
                    sweep.pending.push(pending);
                }
            }
        }
        sweep
    }

    /// Submit a call and wait for it to settle.
    async fn settle(&self, call: LedgerCall) -> Result<(TxRef, Option<u64>)> {
        let method = call.method();
        let tx = self.client.submit(&call).await?;
        debug!("Submitted {method} as {tx}");
        self.journal.lock().await.insert(
            tx.clone(),
            PendingTx {
                tx: tx.clone(),
                call,
                submitted_at: Utc::now(),
            },
        );

        let deadline = Instant::now() + self.settle_timeout;
        loop {
            match self.client.status(&tx).await {
                Ok(TxStatus::Confirmed { output }) => {
                    self.journal.lock().await.remove(&tx);
                    debug!("{method} transaction {tx} confirmed");
                    return Ok((tx, output));
                }
                Ok(TxStatus::Reverted { reason }) => {
                    self.journal.lock().await.remove(&tx);
                    warn!("{method} transaction {tx} reverted: {reason}");
                    return Err(Error::LedgerRejected(reason));
                }
                Ok(TxStatus::Pending) => {}
                Err(e) => trace!("Status check for {tx} failed, will retry: {e}"),
            }
            if Instant::now() >= deadline {
                warn!("{method} transaction {tx} did not settle in time, left in the journal");
                return Err(Error::LedgerUnavailable(format!(
                    "transaction {tx} was submitted but not confirmed within {:?}",
                    self.settle_timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn expect_bool(value: &Value, method: &str) -> Result<bool> {
    value.as_bool().ok_or_else(|| malformed(method, value))
}

/// Integers may come back as JSON numbers or as decimal or hex strings,
/// since contract `uint256` values often exceed what JSON numbers can hold.
fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    }
}

fn malformed(method: &str, value: &Value) -> Error {
    Error::LedgerUnavailable(format!("unexpected `{method}` result from ledger: {value}"))
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::json;

    use super::*;
    use crate::crypto::commit;

    fn gateway(ledger: &MemoryLedger) -> LedgerGateway {
        LedgerGateway::new(
            Arc::new(ledger.clone()),
            Duration::from_millis(200),
            Duration::from_millis(5),
        )
    }

    #[rocket::async_test]
    async fn register_then_query() {
        let ledger = MemoryLedger::new();
        let gateway = gateway(&ledger);
        let identity = commit("identity");

        assert!(!gateway.is_registered(&identity).await.unwrap());
        gateway.register_identity(&identity).await.unwrap();
        assert!(gateway.is_registered(&identity).await.unwrap());
        assert_eq!(
            gateway.registered_identities().await.unwrap(),
            vec![identity]
        );
        assert!(gateway.pending().await.is_empty());
    }

    #[rocket::async_test]
    async fn double_registration_rejected() {
        let ledger = MemoryLedger::new();
        let gateway = gateway(&ledger);
        let identity = commit("identity");

        gateway.register_identity(&identity).await.unwrap();
        assert!(matches!(
            gateway.register_identity(&identity).await,
            Err(Error::LedgerRejected(_))
        ));
    }

    #[rocket::async_test]
    async fn waits_for_settlement() {
        let ledger = MemoryLedger::new().with_confirmation_delay(3);
        let gateway = gateway(&ledger);
        let identity = commit("identity");

        gateway.register_identity(&identity).await.unwrap();
        assert!(gateway.is_registered(&identity).await.unwrap());
    }

    #[rocket::async_test]
    async fn unsettled_transaction_is_journalled() {
        let ledger = MemoryLedger::new().with_confirmation_delay(u32::MAX);
        let gateway = gateway(&ledger);
        let identity = commit("identity");

        let result = gateway.register_identity(&identity).await;
        match &result {
            Err(Error::LedgerUnavailable(msg)) => assert!(msg.ends_with("within 200ms"), "{msg}"),
            other => panic!("expected LedgerUnavailable, got {other:?}"),
        }

        // Not final, so not visible to reads.
        assert!(!gateway.is_registered(&identity).await.unwrap());

        let pending = gateway.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].call,
            LedgerCall::RegisterIdentity { identity }
        );

        // Still pending on a sweep.
        let sweep = gateway.sweep_journal().await;
        assert!(sweep.confirmed.is_empty());
        assert_eq!(sweep.pending.len(), 1);

        // Once the ledger finalises it, the sweep clears it.
        ledger.settle_all();
        let sweep = gateway.sweep_journal().await;
        assert_eq!(sweep.confirmed, vec![pending[0].tx.clone()]);
        assert!(gateway.pending().await.is_empty());
        assert!(gateway.is_registered(&identity).await.unwrap());
    }

    #[rocket::async_test]
    async fn offline_ledger() {
        let ledger = MemoryLedger::new();
        let gateway = gateway(&ledger);
        ledger.set_offline(true);

        assert!(matches!(
            gateway.register_identity(&commit("x")).await,
            Err(Error::LedgerUnavailable(_))
        ));
        assert!(matches!(
            gateway.candidate_count().await,
            Err(Error::LedgerUnavailable(_))
        ));
        assert!(gateway.pending().await.is_empty());
    }

    #[rocket::async_test]
    async fn candidates_and_votes() {
        let ledger = MemoryLedger::new();
        let gateway = gateway(&ledger);
        let identity = commit("identity");

        assert_eq!(gateway.candidate_count().await.unwrap(), 0);
        assert_eq!(gateway.add_candidate("Alice").await.unwrap().0, 0);
        assert_eq!(gateway.add_candidate("Bob").await.unwrap().0, 1);
        assert_eq!(gateway.candidate_count().await.unwrap(), 2);

        gateway.register_identity(&identity).await.unwrap();
        assert!(!gateway.has_voted(&identity).await.unwrap());
        gateway.cast_vote(1, &identity).await.unwrap();
        assert!(gateway.has_voted(&identity).await.unwrap());

        // The contract guards against a second vote on its own.
        assert!(matches!(
            gateway.cast_vote(0, &identity).await,
            Err(Error::LedgerRejected(_))
        ));
        assert_eq!(ledger.tally(), vec![0, 1]);
    }

    #[rocket::async_test]
    async fn unregistered_identity_cannot_vote() {
        let ledger = MemoryLedger::new();
        let gateway = gateway(&ledger);
        gateway.add_candidate("Alice").await.unwrap();

        assert!(matches!(
            gateway.cast_vote(0, &commit("nobody")).await,
            Err(Error::LedgerRejected(_))
        ));
    }

    #[test]
    fn integer_encodings() {
        assert_eq!(value_as_u64(&json!(7)), Some(7));
        assert_eq!(value_as_u64(&json!("7")), Some(7));
        assert_eq!(value_as_u64(&json!("0x1f")), Some(31));
        assert_eq!(value_as_u64(&json!(-1)), None);
        assert_eq!(value_as_u64(&json!(true)), None);
    }

    #[test]
    fn call_encoding() {
        let identity = commit("identity");
        let call = LedgerCall::Vote {
            candidate: 2,
            identity,
        };
        assert_eq!(call.method(), "vote");
        assert_eq!(call.args(), vec![json!(2), json!(identity.to_string())]);
        assert_eq!(
            LedgerQuery::CandidatesCount.args(),
            Vec::<Value>::new()
        );
    }
}
