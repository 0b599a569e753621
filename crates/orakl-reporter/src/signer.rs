//! Transaction signing.
//!
//! Keys never enter this process. A [`TransactionSigner`] turns a
//! [`TxRequest`] into raw signed transaction bytes, addressed by the wallet's
//! key handle.

use std::time::Duration;

use async_trait::async_trait;
use orakl_types::Address;
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelError, TxRequest};

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign `tx`. With `fee_delegated` the transaction is built so that a
    /// fee payer can co-sign it.
    async fn sign(&self, tx: &TxRequest, fee_delegated: bool) -> Result<Vec<u8>, ChannelError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest<'a> {
    key_id: &'a str,
    from: Address,
    to: Address,
    data: String,
    gas_limit: u64,
    fee_delegated: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignResponse {
    raw_tx: String,
}

/// Signer service reached over HTTP (`POST {url}/sign`).
pub struct RemoteSigner {
    client: reqwest::Client,
    url: String,
}

impl RemoteSigner {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChannelError::Other(format!("signer client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TransactionSigner for RemoteSigner {
    async fn sign(&self, tx: &TxRequest, fee_delegated: bool) -> Result<Vec<u8>, ChannelError> {
        let body = SignRequest {
            key_id: &tx.key_id,
            from: tx.from,
            to: tx.to,
            data: encode_hex(&tx.payload),
            gas_limit: tx.gas_limit,
            fee_delegated,
        };

        let resp = self
            .client
            .post(format!("{}/sign", self.url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Other(format!("signer unreachable: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Other(format!("signer returned {status}: {text}")));
        }

        let signed: SignResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::Other(format!("signer response: {e}")))?;
        decode_hex(&signed.raw_tx)
    }
}

/// `0x`-prefixed lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex with or without a `0x` prefix.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, ChannelError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| ChannelError::Other(format!("invalid hex '{s}': {e}")))
}
