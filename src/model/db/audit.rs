use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Something worth keeping a record of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Register,
    Login,
    Vote,
    AddCandidate,
    AddParty,
    Reconcile,
}

/// An append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntryCore {
    pub action: AuditAction,
    /// Identity ref, or `admin`.
    pub actor: String,
    pub details: Document,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub ts: DateTime<Utc>,
}

impl AuditEntryCore {
    pub fn new(action: AuditAction, actor: impl ToString, details: Document) -> Self {
        Self {
            action,
            actor: actor.to_string(),
            details,
            ts: Utc::now(),
        }
    }
}

pub type NewAuditEntry = AuditEntryCore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: AuditEntryCore,
}
