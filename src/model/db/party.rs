use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

pub const DEFAULT_PARTY_SYMBOL: &str = "🏛️";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyCore {
    pub name: String,
    pub leader: String,
    pub symbol: String,
}

pub type NewParty = PartyCore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub party: PartyCore,
}

impl Deref for Party {
    type Target = PartyCore;

    fn deref(&self) -> &Self::Target {
        &self.party
    }
}
