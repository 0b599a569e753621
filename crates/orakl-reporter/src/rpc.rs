//! JSON-RPC submission.
//!
//! [`RpcClient`] speaks the node's JSON-RPC API: send a raw transaction,
//! poll for its receipt. [`JsonRpcChannel`] signs and submits through it in
//! one of two modes:
//!
//! - [`RpcMode::Plain`]: the oracle pays its own fees (direct channel)
//! - [`RpcMode::FeeDelegated`]: a fee-delegated transaction whose fee payer
//!   is resolved by the node (direct-delegation channel)
//!
//! The mode decides how failures are classified, see [`classify`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::channel::{ChannelError, SubmissionChannel, TxReceipt, TxRequest};
use crate::signer::{encode_hex, TransactionSigner};

/// How a JSON-RPC interaction went wrong.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RpcFailure {
    /// The node could not be reached.
    Transport(String),
    /// The node answered with a JSON-RPC error object.
    Rejected(String),
    /// The answer carried neither a result nor an error.
    MissingResult,
    /// The answer could not be interpreted.
    Malformed(String),
    /// No receipt within the polling budget.
    NotMined(String),
    /// The transaction was included but not executed successfully.
    Reverted(String),
}

/// Receipt polling budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiptPolling {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ReceiptPolling {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    block_number: String,
    status: String,
}

/// Minimal JSON-RPC client.
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChannelError::Other(format!("rpc client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;
        let envelope: Value = resp
            .json()
            .await
            .map_err(|e| RpcFailure::Malformed(e.to_string()))?;
        parse_envelope(envelope)
    }

    /// Broadcast a signed transaction and return its hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcFailure> {
        let result = self
            .call("eth_sendRawTransaction", json!([encode_hex(raw)]))
            .await?;
        match result {
            Value::String(hash) => Ok(hash),
            Value::Null => Err(RpcFailure::MissingResult),
            other => Err(RpcFailure::Malformed(format!("unexpected tx hash {other}"))),
        }
    }

    /// Poll for the receipt of `tx_hash` until it appears or the budget runs out.
    ///
    /// The transaction is already broadcast, so a node that cannot be reached
    /// while polling counts as a pending receipt. Running out of budget is
    /// [`RpcFailure::NotMined`].
    pub async fn wait_for_receipt(&self, tx_hash: &str, polling: ReceiptPolling) -> Result<TxReceipt, RpcFailure> {
        for attempt in 0..polling.attempts {
            match self.call("eth_getTransactionReceipt", json!([tx_hash])).await {
                Ok(result) => {
                    if let Some(receipt) = parse_receipt(result)? {
                        return Ok(receipt);
                    }
                    tracing::trace!(tx_hash, attempt, "receipt pending");
                }
                Err(RpcFailure::Transport(e)) => {
                    tracing::warn!(tx_hash, attempt, error = %e, "receipt poll failed");
                }
                Err(other) => return Err(other),
            }
            tokio::time::sleep(polling.interval).await;
        }
        Err(RpcFailure::NotMined(tx_hash.to_string()))
    }
}

fn parse_envelope(envelope: Value) -> Result<Value, RpcFailure> {
    if let Some(error) = envelope.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(RpcFailure::Rejected(message));
    }
    envelope
        .get("result")
        .cloned()
        .ok_or(RpcFailure::MissingResult)
}

/// `None` while the transaction is pending.
fn parse_receipt(result: Value) -> Result<Option<TxReceipt>, RpcFailure> {
    if result.is_null() {
        return Ok(None);
    }
    let receipt: RpcReceipt =
        serde_json::from_value(result).map_err(|e| RpcFailure::Malformed(e.to_string()))?;
    if receipt.status != "0x1" {
        return Err(RpcFailure::Reverted(receipt.transaction_hash));
    }
    let block_number = u64::from_str_radix(receipt.block_number.trim_start_matches("0x"), 16)
        .map_err(|e| RpcFailure::Malformed(format!("block number: {e}")))?;
    Ok(Some(TxReceipt {
        tx_hash: receipt.transaction_hash,
        block_number,
    }))
}

/// Fee payment mode of a [`JsonRpcChannel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcMode {
    Plain,
    FeeDelegated,
}

/// Map an RPC failure to the error class the pipeline acts on.
///
/// Unreachable nodes are fatal in both modes. In fee-delegated mode every
/// other failure is an execution failure; in plain mode node rejections and
/// reverts are processing errors.
pub fn classify(mode: RpcMode, failure: RpcFailure) -> ChannelError {
    match (mode, failure) {
        (_, RpcFailure::Transport(e)) => ChannelError::Other(format!("node unreachable: {e}")),
        (RpcMode::FeeDelegated, RpcFailure::Malformed(e)) => ChannelError::Other(e),
        (RpcMode::FeeDelegated, RpcFailure::Rejected(e) | RpcFailure::Reverted(e) | RpcFailure::NotMined(e)) => {
            ChannelError::TxTransactionFailed(e)
        }
        (RpcMode::FeeDelegated, RpcFailure::MissingResult) => {
            ChannelError::TxTransactionFailed("missing response".into())
        }
        (RpcMode::Plain, RpcFailure::Rejected(e) | RpcFailure::Reverted(e) | RpcFailure::Malformed(e)) => {
            ChannelError::TxProcessingResponseError(e)
        }
        (RpcMode::Plain, RpcFailure::MissingResult) => {
            ChannelError::TxMissingResponseError("missing response".into())
        }
        (RpcMode::Plain, RpcFailure::NotMined(e)) => ChannelError::TxNotMined(e),
    }
}

/// Submission straight to a node.
pub struct JsonRpcChannel {
    rpc: Arc<RpcClient>,
    signer: Arc<dyn TransactionSigner>,
    mode: RpcMode,
    polling: ReceiptPolling,
}

impl JsonRpcChannel {
    pub fn new(
        rpc: Arc<RpcClient>,
        signer: Arc<dyn TransactionSigner>,
        mode: RpcMode,
        polling: ReceiptPolling,
    ) -> Self {
        Self {
            rpc,
            signer,
            mode,
            polling,
        }
    }
}

#[async_trait]
impl SubmissionChannel for JsonRpcChannel {
    fn name(&self) -> &'static str {
        match self.mode {
            RpcMode::Plain => "direct",
            RpcMode::FeeDelegated => "direct-delegation",
        }
    }

    async fn submit(&self, tx: &TxRequest) -> Result<TxReceipt, ChannelError> {
        let raw = self
            .signer
            .sign(tx, self.mode == RpcMode::FeeDelegated)
            .await?;
        let tx_hash = self
            .rpc
            .send_raw_transaction(&raw)
            .await
            .map_err(|f| classify(self.mode, f))?;
        tracing::debug!(channel = self.name(), tx_hash = %tx_hash, "transaction sent");

        self.rpc
            .wait_for_receipt(&tx_hash, self.polling)
            .await
            .map_err(|f| classify(self.mode, f))
    }
}
