//! External fee delegator channel.
//!
//! The oracle signs a fee-delegated transaction, the delegator service
//! co-signs it as fee payer, and the result is broadcast through the node.
//! Any failure to obtain the co-signature is a
//! [`ChannelError::DelegatorServerIssue`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orakl_types::Address;
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelError, SubmissionChannel, TxReceipt, TxRequest};
use crate::rpc::{classify, ReceiptPolling, RpcClient, RpcMode};
use crate::signer::{decode_hex, encode_hex, TransactionSigner};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DelegatorRequest {
    from: Address,
    to: Address,
    input: String,
    gas: u64,
    raw_tx: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DelegatorResponse {
    signed_raw_tx: Option<String>,
}

pub struct DelegatorChannel {
    client: reqwest::Client,
    url: String,
    signer: Arc<dyn TransactionSigner>,
    rpc: Arc<RpcClient>,
    polling: ReceiptPolling,
}

impl DelegatorChannel {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        signer: Arc<dyn TransactionSigner>,
        rpc: Arc<RpcClient>,
        polling: ReceiptPolling,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChannelError::Other(format!("delegator client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            signer,
            rpc,
            polling,
        })
    }

    async fn co_sign(&self, tx: &TxRequest, raw: &[u8]) -> Result<Vec<u8>, ChannelError> {
        let body = DelegatorRequest {
            from: tx.from,
            to: tx.to,
            input: encode_hex(&tx.payload),
            gas: tx.gas_limit,
            raw_tx: encode_hex(raw),
        };

        let resp = self
            .client
            .post(format!("{}/api/v1/sign/volatile", self.url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::DelegatorServerIssue(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ChannelError::DelegatorServerIssue(format!("{status}: {text}")));
        }

        let signed: DelegatorResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::DelegatorServerIssue(e.to_string()))?;
        let signed_raw_tx = signed
            .signed_raw_tx
            .ok_or_else(|| ChannelError::DelegatorServerIssue("no signed transaction returned".into()))?;
        decode_hex(&signed_raw_tx)
            .map_err(|e| ChannelError::DelegatorServerIssue(e.to_string()))
    }
}

#[async_trait]
impl SubmissionChannel for DelegatorChannel {
    fn name(&self) -> &'static str {
        "external-delegator"
    }

    async fn submit(&self, tx: &TxRequest) -> Result<TxReceipt, ChannelError> {
        let raw = self.signer.sign(tx, true).await?;
        let co_signed = self.co_sign(tx, &raw).await?;

        let tx_hash = self
            .rpc
            .send_raw_transaction(&co_signed)
            .await
            .map_err(|f| classify(RpcMode::FeeDelegated, f))?;
        tracing::debug!(channel = self.name(), tx_hash = %tx_hash, "transaction sent");

        self.rpc
            .wait_for_receipt(&tx_hash, self.polling)
            .await
            .map_err(|f| classify(RpcMode::FeeDelegated, f))
    }
}
