//! Execution-layer JSON-RPC client (spec §4.1, §6: `eth_chainId`,
//! `eth_blockNumber`, `eth_getBlockByNumber`, `eth_getBlockReceipts`).

use crate::{
    endpoint::EndpointTable,
    error::RpcError,
    hex::{parse_hex_u256, parse_hex_u64},
};
use alloy_primitives::U256;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{collections::BTreeMap, time::Duration};

/// A transaction as embedded in a full (`full_txs=true`) block response.
/// Only the fields `PriorityFeeRecomputer`/block ingest need (spec §4.8,
/// §6) are kept; the rest of the payload is discarded at parse time.
#[derive(Debug, Clone)]
pub struct ElTransaction {
    pub hash: String,
    pub gas_price: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

#[derive(Debug, Clone)]
pub struct ElBlock {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: u64,
    pub base_fee_per_gas: Option<U256>,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub transactions: Vec<ElTransaction>,
}

#[derive(Debug, Clone)]
pub struct ElReceipt {
    pub transaction_hash: String,
    pub effective_gas_price: U256,
    pub gas_used: u64,
}

#[derive(Debug, Deserialize)]
struct RawElTransaction {
    hash: String,
    #[serde(rename = "gasPrice")]
    gas_price: Option<String>,
    #[serde(rename = "maxPriorityFeePerGas")]
    max_priority_fee_per_gas: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawElBlock {
    number: String,
    hash: String,
    #[serde(rename = "parentHash")]
    parent_hash: String,
    timestamp: String,
    #[serde(rename = "baseFeePerGas")]
    base_fee_per_gas: Option<String>,
    #[serde(rename = "gasUsed")]
    gas_used: String,
    #[serde(rename = "gasLimit")]
    gas_limit: String,
    transactions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawElReceipt {
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
    #[serde(rename = "effectiveGasPrice")]
    effective_gas_price: String,
    #[serde(rename = "gasUsed")]
    gas_used: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

fn raw_transaction_to_domain(value: Value) -> Result<ElTransaction, RpcError> {
    // Some endpoints return bare hash strings when `full_txs=false`; we
    // always request `full_txs=true`, but tolerate the degenerate shape
    // rather than erroring the whole block over it.
    if let Value::String(hash) = value {
        return Ok(ElTransaction { hash, gas_price: None, max_priority_fee_per_gas: None });
    }
    let raw: RawElTransaction = serde_json::from_value(value)
        .map_err(|e| RpcError::PermanentData(format!("malformed transaction: {e}")))?;
    Ok(ElTransaction {
        hash: raw.hash,
        gas_price: raw.gas_price.as_deref().map(parse_hex_u256).transpose()?,
        max_priority_fee_per_gas: raw.max_priority_fee_per_gas.as_deref().map(parse_hex_u256).transpose()?,
    })
}

fn raw_block_to_domain(raw: RawElBlock) -> Result<ElBlock, RpcError> {
    let transactions =
        raw.transactions.into_iter().map(raw_transaction_to_domain).collect::<Result<Vec<_>, _>>()?;

    Ok(ElBlock {
        number: parse_hex_u64(&raw.number)?,
        hash: raw.hash,
        parent_hash: raw.parent_hash,
        timestamp: parse_hex_u64(&raw.timestamp)?,
        base_fee_per_gas: raw.base_fee_per_gas.as_deref().map(parse_hex_u256).transpose()?,
        gas_used: parse_hex_u64(&raw.gas_used)?,
        gas_limit: parse_hex_u64(&raw.gas_limit)?,
        transactions,
    })
}

fn raw_receipt_to_domain(raw: RawElReceipt) -> Result<ElReceipt, RpcError> {
    Ok(ElReceipt {
        transaction_hash: raw.transaction_hash,
        effective_gas_price: parse_hex_u256(&raw.effective_gas_price)?,
        gas_used: parse_hex_u64(&raw.gas_used)?,
    })
}

/// A single EL endpoint's raw JSON-RPC transport, used by [`crate::pool::RpcPool`]
/// once it has already selected which endpoint to talk to.
pub struct ElClient {
    http: reqwest::Client,
    pub(crate) table: EndpointTable,
    timeout: Duration,
    parallelism: usize,
}

impl ElClient {
    pub fn new(http: reqwest::Client, table: EndpointTable, timeout: Duration, parallelism: usize) -> Self {
        Self { http, table, timeout, parallelism }
    }

    async fn call_raw(&self, idx: usize, method: &str, params: Value) -> Result<Value, RpcError> {
        let url = self
            .table
            .url(idx)
            .ok_or_else(|| RpcError::PermanentData(format!("no endpoint at index {idx}")))?;
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });

        let response = tokio::time::timeout(self.timeout, self.http.post(&url).json(&body).send())
            .await
            .map_err(|_| RpcError::Transient(format!("{method} timed out against {url}")))?
            .map_err(|e| RpcError::Transient(format!("{method} request to {url} failed: {e}")))?;

        let parsed: JsonRpcResponse<Value> = response
            .json()
            .await
            .map_err(|e| RpcError::Transient(format!("{method} response from {url} not valid JSON: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(RpcError::PermanentData(format!(
                "{method} against {url} returned RPC error {}: {}",
                error.code, error.message
            )));
        }
        parsed
            .result
            .ok_or_else(|| RpcError::PermanentData(format!("{method} against {url} returned no result")))
    }

    pub async fn chain_id(&self, idx: usize) -> Result<u64, RpcError> {
        let value = self.call_raw(idx, "eth_chainId", json!([])).await?;
        let hex = value.as_str().ok_or_else(|| RpcError::PermanentData("eth_chainId result not a string".to_string()))?;
        parse_hex_u64(hex)
    }

    pub async fn block_number(&self, idx: usize) -> Result<u64, RpcError> {
        let value = self.call_raw(idx, "eth_blockNumber", json!([])).await?;
        let hex = value
            .as_str()
            .ok_or_else(|| RpcError::PermanentData("eth_blockNumber result not a string".to_string()))?;
        parse_hex_u64(hex)
    }

    pub async fn get_block_by_number(&self, idx: usize, number: u64) -> Result<ElBlock, RpcError> {
        let value = self
            .call_raw(idx, "eth_getBlockByNumber", json!([format!("0x{number:x}"), true]))
            .await?;
        if value.is_null() {
            return Err(RpcError::PermanentData(format!("block {number} not found upstream")));
        }
        let raw: RawElBlock = serde_json::from_value(value)
            .map_err(|e| RpcError::PermanentData(format!("malformed block {number}: {e}")))?;
        raw_block_to_domain(raw)
    }

    pub async fn get_block_receipts(&self, idx: usize, number: u64) -> Result<Vec<ElReceipt>, RpcError> {
        let value = self
            .call_raw(idx, "eth_getBlockReceipts", json!([format!("0x{number:x}")]))
            .await?;
        let raws: Vec<RawElReceipt> = serde_json::from_value(value)
            .map_err(|e| RpcError::PermanentData(format!("malformed receipts for block {number}: {e}")))?;
        raws.into_iter().map(raw_receipt_to_domain).collect()
    }

    /// Fetches a set of blocks with bounded parallelism. An individual
    /// block's failure is reported as a missing map entry rather than
    /// failing the whole batch, so the caller can make partial progress
    /// (spec §4.4: batch backfill advances on whatever it could fetch).
    pub async fn get_blocks_with_transactions(
        &self,
        idx: usize,
        numbers: &[u64],
    ) -> BTreeMap<u64, ElBlock> {
        stream::iter(numbers.iter().copied())
            .map(|number| async move { (number, self.get_block_by_number(idx, number).await) })
            .buffer_unordered(self.parallelism)
            .filter_map(|(number, result)| async move { result.ok().map(|block| (number, block)) })
            .collect()
            .await
    }

    pub async fn get_block_receipts_batch(
        &self,
        idx: usize,
        numbers: &[u64],
    ) -> BTreeMap<u64, Vec<ElReceipt>> {
        stream::iter(numbers.iter().copied())
            .map(|number| async move { (number, self.get_block_receipts(idx, number).await) })
            .buffer_unordered(self.parallelism)
            .filter_map(|(number, result)| async move { result.ok().map(|receipts| (number, receipts)) })
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(transactions: Vec<Value>) -> RawElBlock {
        RawElBlock {
            number: "0x1".to_string(),
            hash: "0xabc".to_string(),
            parent_hash: "0xdef".to_string(),
            timestamp: "0x5".to_string(),
            base_fee_per_gas: Some("0x3b9aca00".to_string()),
            gas_used: "0x64".to_string(),
            gas_limit: "0x1c9c380".to_string(),
            transactions,
        }
    }

    #[test]
    fn converts_full_transaction_objects() {
        let block = raw_block_to_domain(raw(vec![json!({
            "hash": "0x222",
            "gasPrice": "0x77359400",
            "maxPriorityFeePerGas": "0x3b9aca00"
        })]))
        .unwrap();
        assert_eq!(block.number, 1);
        assert_eq!(block.gas_limit, 30_000_000);
        assert_eq!(block.transactions[0].hash, "0x222");
        assert_eq!(block.transactions[0].max_priority_fee_per_gas, Some(U256::from(1_000_000_000u64)));
        assert_eq!(block.base_fee_per_gas, Some(U256::from(1_000_000_000u64)));
    }

    #[test]
    fn tolerates_bare_hash_transactions() {
        let block = raw_block_to_domain(raw(vec![Value::String("0x111".to_string())])).unwrap();
        assert_eq!(block.transactions[0].hash, "0x111");
        assert!(block.transactions[0].max_priority_fee_per_gas.is_none());
    }

    #[test]
    fn rejects_malformed_transaction_object() {
        let err = raw_block_to_domain(raw(vec![json!({ "gasPrice": "not-hex" })])).unwrap_err();
        assert!(matches!(err, RpcError::PermanentData(_)));
    }
}
