//! The RPC Pool (spec §4.1): selects an endpoint, executes with a timeout,
//! and on failure makes exactly one fallback attempt against a different
//! endpoint before surfacing the error to the caller.

use crate::{
    cl::{ClClient, ClMilestone},
    el::{ElBlock, ElClient, ElReceipt},
    endpoint::EndpointTable,
    error::RpcError,
    stats,
};
use std::{collections::BTreeMap, time::{Duration, Instant}};

pub struct RpcPool {
    el: ElClient,
    cl: ClClient,
    expected_chain_id: u64,
}

impl RpcPool {
    pub fn new(
        http: reqwest::Client,
        el_endpoints: Vec<String>,
        cl_endpoints: Vec<String>,
        expected_chain_id: u64,
        timeout: Duration,
        max_consecutive_errors: u32,
        cooldown: Duration,
        parallelism: usize,
    ) -> Self {
        let el_table = EndpointTable::new(el_endpoints, max_consecutive_errors, cooldown);
        let cl_table = EndpointTable::new(cl_endpoints, max_consecutive_errors, cooldown);
        Self {
            el: ElClient::new(http.clone(), el_table, timeout, parallelism),
            cl: ClClient::new(http, cl_table, timeout),
            expected_chain_id,
        }
    }

    pub fn el_endpoint_count(&self) -> usize {
        self.el.table.len()
    }

    pub fn cl_endpoint_count(&self) -> usize {
        self.cl.table.len()
    }

    /// Verifies the chain id of an EL endpoint before its first real use.
    /// A mismatch takes the endpoint permanently out of rotation (spec
    /// §4.1: "an endpoint serving the wrong chain must never be used
    /// again without operator intervention").
    async fn ensure_chain_verified(&self, idx: usize) -> Result<(), RpcError> {
        if self.el.table.is_chain_verified(idx) {
            return Ok(());
        }
        let started = Instant::now();
        let chain_id = self.el.chain_id(idx).await?;
        stats::record_call("el", "eth_chainId", started.elapsed());
        if chain_id != self.expected_chain_id {
            let message = format!("expected chain id {}, got {chain_id}", self.expected_chain_id);
            self.el.table.mark_permanently_down(idx, message.clone());
            return Err(RpcError::PermanentData(message));
        }
        self.el.table.mark_chain_verified(idx);
        Ok(())
    }

    /// Runs every configured EL endpoint's chain-id preflight eagerly
    /// (§3 "Startup preflight"), so misconfiguration surfaces at boot
    /// rather than on first worker iteration.
    pub async fn preflight_chain_ids(&self) -> Result<(), RpcError> {
        let mut last_err = None;
        for idx in 0..self.el.table.len() {
            if let Err(err) = self.ensure_chain_verified(idx).await {
                last_err = Some(err);
            }
        }
        if self.el.table.all_down() {
            return Err(last_err.unwrap_or_else(|| RpcError::Exhausted("no EL endpoint passed preflight".to_string())));
        }
        Ok(())
    }

    async fn el_call<T, F, Fut>(&self, method: &'static str, call: F) -> Result<T, RpcError>
    where
        F: Fn(usize) -> Fut,
        Fut: std::future::Future<Output = Result<T, RpcError>>,
    {
        let first = self
            .el
            .table
            .select()
            .ok_or_else(|| RpcError::Exhausted(format!("no healthy EL endpoint for {method}")))?;

        if let Err(err) = self.ensure_chain_verified(first).await {
            stats::record_error("el", method, "permanent");
            return Err(err);
        }

        let started = Instant::now();
        match call(first).await {
            Ok(value) => {
                self.el.table.record_success(first, started.elapsed());
                stats::record_call("el", method, started.elapsed());
                Ok(value)
            }
            Err(RpcError::PermanentData(msg)) => {
                stats::record_error("el", method, "permanent");
                Err(RpcError::PermanentData(msg))
            }
            Err(transient) => {
                self.el.table.record_transient_error(first, transient.to_string());
                stats::record_error("el", method, "transient");

                let Some(fallback) = self.el.table.select_excluding(first) else {
                    return Err(RpcError::Exhausted(format!(
                        "{method} failed on {first} and no fallback endpoint is available: {transient}"
                    )));
                };
                if let Err(err) = self.ensure_chain_verified(fallback).await {
                    return Err(err);
                }

                let started = Instant::now();
                match call(fallback).await {
                    Ok(value) => {
                        self.el.table.record_success(fallback, started.elapsed());
                        stats::record_call("el", method, started.elapsed());
                        Ok(value)
                    }
                    Err(err) => {
                        self.el.table.record_transient_error(fallback, err.to_string());
                        stats::record_error("el", method, "transient");
                        Err(err)
                    }
                }
            }
        }
    }

    pub async fn tip_block_number(&self) -> Result<u64, RpcError> {
        self.el_call("eth_blockNumber", |idx| self.el.block_number(idx)).await
    }

    pub async fn get_block(&self, number: u64) -> Result<ElBlock, RpcError> {
        self.el_call("eth_getBlockByNumber", |idx| self.el.get_block_by_number(idx, number)).await
    }

    pub async fn get_block_receipts(&self, number: u64) -> Result<Vec<ElReceipt>, RpcError> {
        self.el_call("eth_getBlockReceipts", |idx| self.el.get_block_receipts(idx, number)).await
    }

    /// Batched variant used by the backfillers (spec §4.4). Selection
    /// happens once per batch, not per block, matching §4.1's "one
    /// endpoint per logical operation" contract; per-block failures are
    /// reported as gaps in the returned map rather than failing the batch.
    pub async fn get_blocks_with_transactions(&self, numbers: &[u64]) -> Result<BTreeMap<u64, ElBlock>, RpcError> {
        let idx = self
            .el
            .table
            .select()
            .ok_or_else(|| RpcError::Exhausted("no healthy EL endpoint for batch block fetch".to_string()))?;
        self.ensure_chain_verified(idx).await?;
        Ok(self.el.get_blocks_with_transactions(idx, numbers).await)
    }

    pub async fn get_block_receipts_batch(&self, numbers: &[u64]) -> Result<BTreeMap<u64, Vec<ElReceipt>>, RpcError> {
        let idx = self
            .el
            .table
            .select()
            .ok_or_else(|| RpcError::Exhausted("no healthy EL endpoint for batch receipt fetch".to_string()))?;
        self.ensure_chain_verified(idx).await?;
        Ok(self.el.get_block_receipts_batch(idx, numbers).await)
    }

    async fn cl_call<T, F, Fut>(&self, method: &'static str, call: F) -> Result<T, RpcError>
    where
        F: Fn(usize) -> Fut,
        Fut: std::future::Future<Output = Result<T, RpcError>>,
    {
        let first = self
            .cl
            .table
            .select()
            .ok_or_else(|| RpcError::Exhausted(format!("no healthy CL endpoint for {method}")))?;

        let started = Instant::now();
        match call(first).await {
            Ok(value) => {
                self.cl.table.record_success(first, started.elapsed());
                stats::record_call("cl", method, started.elapsed());
                Ok(value)
            }
            Err(RpcError::PermanentData(msg)) => {
                stats::record_error("cl", method, "permanent");
                Err(RpcError::PermanentData(msg))
            }
            Err(transient) => {
                self.cl.table.record_transient_error(first, transient.to_string());
                stats::record_error("cl", method, "transient");

                let Some(fallback) = self.cl.table.select_excluding(first) else {
                    return Err(RpcError::Exhausted(format!(
                        "{method} failed on {first} and no fallback endpoint is available: {transient}"
                    )));
                };

                let started = Instant::now();
                match call(fallback).await {
                    Ok(value) => {
                        self.cl.table.record_success(fallback, started.elapsed());
                        stats::record_call("cl", method, started.elapsed());
                        Ok(value)
                    }
                    Err(err) => {
                        self.cl.table.record_transient_error(fallback, err.to_string());
                        stats::record_error("cl", method, "transient");
                        Err(err)
                    }
                }
            }
        }
    }

    pub async fn latest_milestone_count(&self) -> Result<u64, RpcError> {
        self.cl_call("milestone_count", |idx| self.cl.latest_milestone_count(idx)).await
    }

    pub async fn get_milestone(&self, sequence_id: u64) -> Result<ClMilestone, RpcError> {
        self.cl_call("milestone_get", move |idx| self.cl.get_milestone(idx, sequence_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(el: Vec<&str>, cl: Vec<&str>) -> RpcPool {
        RpcPool::new(
            reqwest::Client::new(),
            el.into_iter().map(str::to_string).collect(),
            cl.into_iter().map(str::to_string).collect(),
            137,
            Duration::from_millis(100),
            3,
            Duration::from_secs(1),
            4,
        )
    }

    #[test]
    fn reports_endpoint_counts() {
        let pool = pool(vec!["a", "b"], vec!["c"]);
        assert_eq!(pool.el_endpoint_count(), 2);
        assert_eq!(pool.cl_endpoint_count(), 1);
    }

    #[tokio::test]
    async fn empty_el_pool_is_exhausted_immediately() {
        let pool = pool(vec![], vec!["c"]);
        let err = pool.tip_block_number().await.unwrap_err();
        assert!(matches!(err, RpcError::Exhausted(_)));
    }

    #[tokio::test]
    async fn empty_cl_pool_is_exhausted_immediately() {
        let pool = pool(vec!["a"], vec![]);
        let err = pool.latest_milestone_count().await.unwrap_err();
        assert!(matches!(err, RpcError::Exhausted(_)));
    }
}
