use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rocket::serde::json::{json, Value};

use crate::crypto::{commit, Commitment};
use crate::error::{Error, Result};

use super::{LedgerCall, LedgerClient, LedgerQuery, TxRef, TxStatus};

/// An in-process ledger enforcing the same contract rules as the real one:
/// identities register once, vote once, and only for an existing candidate.
///
/// Transactions take effect when they settle, which by default is
/// immediately; [`MemoryLedger::with_confirmation_delay`] makes them stay
/// pending for a number of status polls.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    registry: Vec<Commitment>,
    registered: HashSet<Commitment>,
    votes: HashMap<Commitment, u64>,
    candidates: Vec<(String, u64)>,
    txs: HashMap<TxRef, Tx>,
    nonce: u64,
    confirmation_delay: u32,
    offline: bool,
    submissions: usize,
}

struct Tx {
    nonce: u64,
    call: LedgerCall,
    polls_remaining: u32,
    status: TxStatus,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep each new transaction pending for `polls` status checks.
    pub fn with_confirmation_delay(self, polls: u32) -> Self {
        self.state().confirmation_delay = polls;
        self
    }

    /// Simulate losing the connection to the ledger.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Number of transactions ever submitted.
    pub fn submissions(&self) -> usize {
        self.state().submissions
    }

    /// Votes per candidate index.
    pub fn tally(&self) -> Vec<u64> {
        self.state().candidates.iter().map(|(_, votes)| *votes).collect()
    }

    /// Settle every pending transaction, in submission order.
    pub fn settle_all(&self) {
        let mut state = self.state();
        let mut pending: Vec<_> = state
            .txs
            .iter()
            .filter(|(_, tx)| tx.status == TxStatus::Pending)
            .map(|(tx_ref, tx)| (tx.nonce, tx_ref.clone()))
            .collect();
        pending.sort();
        for (_, tx_ref) in pending {
            state.settle(&tx_ref);
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn settle(&mut self, tx_ref: &TxRef) {
        let call = match self.txs.get(tx_ref) {
            Some(tx) => tx.call.clone(),
            None => return,
        };
        let status = self.execute(&call);
        if let Some(tx) = self.txs.get_mut(tx_ref) {
            tx.status = status;
        }
    }

    fn execute(&mut self, call: &LedgerCall) -> TxStatus {
        let revert = |reason: &str| TxStatus::Reverted {
            reason: reason.to_string(),
        };
        match call {
            LedgerCall::RegisterIdentity { identity } => {
                if !self.registered.insert(*identity) {
                    return revert("identity already registered");
                }
                self.registry.push(*identity);
                TxStatus::Confirmed { output: None }
            }
            LedgerCall::AddCandidate { name } => {
                self.candidates.push((name.clone(), 0));
                TxStatus::Confirmed {
                    output: Some(self.candidates.len() as u64 - 1),
                }
            }
            LedgerCall::Vote {
                candidate,
                identity,
            } => {
                if !self.registered.contains(identity) {
                    return revert("identity not registered");
                }
                if self.votes.contains_key(identity) {
                    return revert("identity has already voted");
                }
                match self.candidates.get_mut(*candidate as usize) {
                    Some((_, votes)) => *votes += 1,
                    None => return revert("invalid candidate"),
                }
                self.votes.insert(*identity, *candidate);
                TxStatus::Confirmed { output: None }
            }
        }
    }
}

fn offline() -> Error {
    Error::LedgerUnavailable("in-process ledger is offline".to_string())
}

#[rocket::async_trait]
impl LedgerClient for MemoryLedger {
    async fn submit(&self, call: &LedgerCall) -> Result<TxRef> {
        let mut state = self.state();
        if state.offline {
            return Err(offline());
        }
        state.nonce += 1;
        state.submissions += 1;
        let nonce = state.nonce;
        let tx_ref = TxRef::new(commit(format!("tx:{nonce}")).to_string());
        let polls_remaining = state.confirmation_delay;
        state.txs.insert(
            tx_ref.clone(),
            Tx {
                nonce,
                call: call.clone(),
                polls_remaining,
                status: TxStatus::Pending,
            },
        );
        if polls_remaining == 0 {
            state.settle(&tx_ref);
        }
        Ok(tx_ref)
    }

    async fn status(&self, tx_ref: &TxRef) -> Result<TxStatus> {
        let mut state = self.state();
        if state.offline {
            return Err(offline());
        }
        let tx = state
            .txs
            .get_mut(tx_ref)
            .ok_or_else(|| Error::LedgerUnavailable(format!("unknown transaction {tx_ref}")))?;
        if tx.status != TxStatus::Pending {
            return Ok(tx.status.clone());
        }
        if tx.polls_remaining > 1 {
            tx.polls_remaining -= 1;
            return Ok(TxStatus::Pending);
        }
        state.settle(tx_ref);
        Ok(state
            .txs
            .get(tx_ref)
            .map(|tx| tx.status.clone())
            .unwrap_or(TxStatus::Pending))
    }

    async fn query(&self, query: &LedgerQuery) -> Result<Value> {
        let state = self.state();
        if state.offline {
            return Err(offline());
        }
        Ok(match query {
            LedgerQuery::IsRegistered(identity) => json!(state.registered.contains(identity)),
            LedgerQuery::HasVoted(identity) => json!(state.votes.contains_key(identity)),
            LedgerQuery::CandidatesCount => json!(state.candidates.len()),
            LedgerQuery::RegisteredIdentities => json!(state
                .registry
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()),
        })
    }
}
