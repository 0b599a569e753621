//! Submission channels.
//!
//! A channel takes an unsigned transaction request and returns once the
//! transaction is included, or with a classified error. The pipeline only
//! looks at the error class to decide between retrying, downgrading and
//! aborting.

use async_trait::async_trait;
use orakl_types::Address;

/// An unsigned transaction on behalf of one oracle wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRequest {
    /// Oracle identity that signs the transaction.
    pub from: Address,
    /// Key handle at the signer.
    pub key_id: String,
    pub to: Address,
    pub payload: Vec<u8>,
    pub gas_limit: u64,
}

/// Inclusion proof returned by a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
}

/// Channel error classes.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The external fee delegator is unreachable or refused to co-sign.
    #[error("delegator server issue: {0}")]
    DelegatorServerIssue(String),

    /// A fee-delegated transaction was sent but not executed successfully.
    #[error("transaction failed: {0}")]
    TxTransactionFailed(String),

    /// No receipt appeared within the polling budget.
    #[error("transaction not mined: {0}")]
    TxNotMined(String),

    /// The node answered with an error or a failed receipt.
    #[error("transaction processing response error: {0}")]
    TxProcessingResponseError(String),

    /// The node answered without a result.
    #[error("transaction missing response: {0}")]
    TxMissingResponseError(String),

    #[error("{0}")]
    Other(String),
}

impl ChannelError {
    /// Retryable on the direct-delegation channel.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::TxTransactionFailed(_))
    }

    /// Retryable on the direct channel.
    pub fn is_direct_retryable(&self) -> bool {
        matches!(
            self,
            Self::TxNotMined(_) | Self::TxProcessingResponseError(_) | Self::TxMissingResponseError(_)
        )
    }
}

/// A way of getting a transaction included.
#[async_trait]
pub trait SubmissionChannel: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Sign, send and wait for inclusion of `tx`.
    async fn submit(&self, tx: &TxRequest) -> Result<TxReceipt, ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(ChannelError::TxTransactionFailed("reverted".into()).is_execution_failure());
        assert!(!ChannelError::TxNotMined("x".into()).is_execution_failure());

        assert!(ChannelError::TxNotMined("x".into()).is_direct_retryable());
        assert!(ChannelError::TxProcessingResponseError("x".into()).is_direct_retryable());
        assert!(ChannelError::TxMissingResponseError("x".into()).is_direct_retryable());
        assert!(!ChannelError::TxTransactionFailed("x".into()).is_direct_retryable());
        assert!(!ChannelError::Other("x".into()).is_direct_retryable());
    }
}
