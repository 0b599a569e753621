//! Reporter jobs and the aggregator-bound job identity.
//!
//! Jobs that target an aggregator carry an identity of the form
//! `<roundId>-<oracleAddress>-<nonce>`. The reporter uses the round and
//! oracle parts to drop jobs whose round was already superseded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{Address, RoundId, TypesError, JOB_ID_DELIMITER};

/// A pending transaction to be submitted by a reporter.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Ledger address the transaction is sent to.
    pub to: Address,
    /// Encoded call data.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub payload: Vec<u8>,
    /// Gas budget for the transaction.
    pub gas_limit: u64,
}

/// Parsed identity of an aggregator-bound job.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobId {
    pub round_id: RoundId,
    pub oracle: Address,
    pub nonce: String,
}

impl JobId {
    pub fn new(round_id: RoundId, oracle: Address, nonce: impl Into<String>) -> Self {
        Self {
            round_id,
            oracle,
            nonce: nonce.into(),
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{JOB_ID_DELIMITER}{}{JOB_ID_DELIMITER}{}",
            self.round_id, self.oracle, self.nonce
        )
    }
}

impl FromStr for JobId {
    type Err = TypesError;

    /// Parse `<roundId>-<oracleAddress>-<nonce>`.
    ///
    /// Fewer than three parts, a non-numeric round or a malformed oracle
    /// address is an [`TypesError::UnexpectedJobId`]. Parts after the third
    /// are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(JOB_ID_DELIMITER).collect();
        if parts.len() < 3 {
            return Err(TypesError::UnexpectedJobId(s.to_string()));
        }

        let round_id = parts[0]
            .parse::<RoundId>()
            .map_err(|_| TypesError::UnexpectedJobId(s.to_string()))?;
        let oracle = parts[1]
            .parse::<Address>()
            .map_err(|_| TypesError::UnexpectedJobId(s.to_string()))?;

        Ok(Self {
            round_id,
            oracle,
            nonce: parts[2].to_string(),
        })
    }
}
