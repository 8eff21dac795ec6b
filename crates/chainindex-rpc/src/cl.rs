//! Checkpoint-layer REST client (spec §4.1, §6: milestone count + fetch by
//! sequence id).

use crate::{endpoint::EndpointTable, error::RpcError};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClMilestone {
    pub sequence_id: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub hash: String,
    pub timestamp: u64,
}

#[derive(Debug, Deserialize)]
struct CountEnvelope {
    result: CountBody,
}

#[derive(Debug, Deserialize)]
struct CountBody {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct MilestoneEnvelope {
    result: RawMilestone,
}

#[derive(Debug, Deserialize)]
struct RawMilestone {
    start_block: u64,
    end_block: u64,
    hash: String,
    timestamp: u64,
}

/// A single CL endpoint's raw REST transport, used by [`crate::pool::RpcPool`]
/// once it has already selected which endpoint to talk to.
pub struct ClClient {
    http: reqwest::Client,
    pub(crate) table: EndpointTable,
    timeout: Duration,
}

impl ClClient {
    pub fn new(http: reqwest::Client, table: EndpointTable, timeout: Duration) -> Self {
        Self { http, table, timeout }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, idx: usize, path: &str) -> Result<T, RpcError> {
        let base = self
            .table
            .url(idx)
            .ok_or_else(|| RpcError::PermanentData(format!("no endpoint at index {idx}")))?;
        let url = format!("{}{}", base.trim_end_matches('/'), path);

        let response = tokio::time::timeout(self.timeout, self.http.get(&url).send())
            .await
            .map_err(|_| RpcError::Transient(format!("GET {url} timed out")))?
            .map_err(|e| RpcError::Transient(format!("GET {url} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return if status.is_server_error() {
                Err(RpcError::Transient(format!("GET {url} returned {status}")))
            } else {
                Err(RpcError::PermanentData(format!("GET {url} returned {status}")))
            };
        }

        response
            .json()
            .await
            .map_err(|e| RpcError::PermanentData(format!("GET {url} returned malformed JSON: {e}")))
    }

    /// The CL's current milestone count; the highest available sequence id
    /// is `count` (milestone numbering starts at 1, per spec §9).
    pub async fn latest_milestone_count(&self, idx: usize) -> Result<u64, RpcError> {
        let envelope: CountEnvelope = self.get_json(idx, "/milestone/count").await?;
        Ok(envelope.result.count)
    }

    pub async fn get_milestone(&self, idx: usize, sequence_id: u64) -> Result<ClMilestone, RpcError> {
        let envelope: MilestoneEnvelope =
            self.get_json(idx, &format!("/milestone/{sequence_id}")).await?;
        let raw = envelope.result;
        Ok(ClMilestone {
            sequence_id,
            start_block: raw.start_block,
            end_block: raw.end_block,
            hash: raw.hash,
            timestamp: raw.timestamp,
        })
    }
}
