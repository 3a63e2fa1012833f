use reqwest::{Client, StatusCode};
use rocket::serde::json::{json, Value};
use serde::Deserialize;

use crate::error::{Error, Result};

use super::{LedgerCall, LedgerClient, LedgerQuery, TxRef, TxStatus};

/// A ledger reached through a JSON relay that holds the signing key and
/// contract ABI:
///
/// - `POST /submit {method, args}` -> `{txHash}`
/// - `GET /tx/<hash>` -> `{status: "pending" | "confirmed" | "reverted", output?, reason?}`
/// - `POST /call {method, args}` -> `{value}`
///
/// Relay errors are reported as `{error}`; a 4xx on submit means the
/// contract refused the call outright.
pub struct RpcLedger {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    tx_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase", tag = "status")]
enum StatusResponse {
    Pending,
    Confirmed {
        #[serde(default)]
        output: Option<Value>,
    },
    Reverted {
        #[serde(default)]
        reason: Option<String>,
    },
}

#[derive(Deserialize)]
struct CallResponse {
    value: Value,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

impl RpcLedger {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

fn unavailable(e: reqwest::Error) -> Error {
    Error::LedgerUnavailable(e.to_string())
}

/// Read the relay's error message, falling back to the HTTP status.
async fn relay_error(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => format!("relay responded with {status}"),
    }
}

#[rocket::async_trait]
impl LedgerClient for RpcLedger {
    async fn submit(&self, call: &LedgerCall) -> Result<TxRef> {
        let body = json!({ "method": call.method(), "args": call.args() });
        let response = self
            .client
            .post(self.url("submit"))
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;
        let status = response.status();
        if status.is_client_error() {
            return Err(Error::LedgerRejected(relay_error(response).await));
        }
        if !status.is_success() {
            return Err(Error::LedgerUnavailable(relay_error(response).await));
        }
        let submitted: SubmitResponse = response.json().await.map_err(unavailable)?;
        Ok(TxRef::new(submitted.tx_hash))
    }

    async fn status(&self, tx: &TxRef) -> Result<TxStatus> {
        let response = self
            .client
            .get(self.url(&format!("tx/{tx}")))
            .send()
            .await
            .map_err(unavailable)?;
        // The relay may not have seen a just-submitted transaction yet.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(TxStatus::Pending);
        }
        if !response.status().is_success() {
            return Err(Error::LedgerUnavailable(relay_error(response).await));
        }
        let status: StatusResponse = response.json().await.map_err(unavailable)?;
        Ok(match status {
            StatusResponse::Pending => TxStatus::Pending,
            StatusResponse::Confirmed { output } => TxStatus::Confirmed {
                output: output.as_ref().and_then(super::value_as_u64),
            },
            StatusResponse::Reverted { reason } => TxStatus::Reverted {
                reason: reason.unwrap_or_else(|| "reverted".to_string()),
            },
        })
    }

    async fn query(&self, query: &LedgerQuery) -> Result<Value> {
        let body = json!({ "method": query.method(), "args": query.args() });
        let response = self
            .client
            .post(self.url("call"))
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(Error::LedgerUnavailable(relay_error(response).await));
        }
        let result: CallResponse = response.json().await.map_err(unavailable)?;
        Ok(result.value)
    }
}
