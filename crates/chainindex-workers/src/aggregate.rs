//! Builds a [`Block`] from the raw EL block + receipts (spec §4.2, §4.8,
//! §6): the per-tx priority fee rate is `maxPriorityFeePerGas` if present,
//! else `max(gasPrice - baseFeePerGas, 0)`; the block's
//! `total_priority_fee_gwei` is that rate times the tx's `gasUsed`,
//! summed across transactions. Shared by every worker that writes a
//! fresh block (`TipFollower`, `BlockBackfiller`, `GapFiller`'s
//! `kind=block` path) so the formula only lives in one place.

use alloy_primitives::U256;
use bigdecimal::BigDecimal;
use chainindex_rpc::{wei_to_gwei, ElBlock, ElReceipt};
use chainindex_types::Block;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub fn build_block(el_block: &ElBlock, receipts: &BTreeMap<String, ElReceipt>, previous: Option<&Block>) -> Block {
    let base_fee_per_gas = el_block.base_fee_per_gas;

    let mut total_priority_fee_wei = U256::ZERO;
    let mut total_base_fee_wei = U256::ZERO;
    let mut per_tx_priority_fee_gwei: Vec<BigDecimal> = Vec::new();

    for tx in &el_block.transactions {
        let Some(receipt) = receipts.get(&tx.hash) else { continue };
        let priority_fee_per_gas = priority_fee_rate(tx.max_priority_fee_per_gas, tx.gas_price, base_fee_per_gas);
        let gas_used = U256::from(receipt.gas_used);

        total_priority_fee_wei = total_priority_fee_wei.saturating_add(priority_fee_per_gas.saturating_mul(gas_used));
        if let Some(base) = base_fee_per_gas {
            total_base_fee_wei = total_base_fee_wei.saturating_add(base.saturating_mul(gas_used));
        }
        per_tx_priority_fee_gwei.push(wei_to_gwei(priority_fee_per_gas));
    }

    let (min, max, avg, median) = priority_fee_summary(&per_tx_priority_fee_gwei);

    let block = Block {
        number: el_block.number,
        timestamp: DateTime::<Utc>::from_timestamp(el_block.timestamp as i64, 0).unwrap_or_default(),
        block_hash: el_block.hash.clone(),
        parent_hash: el_block.parent_hash.clone(),
        gas_used: el_block.gas_used,
        gas_limit: el_block.gas_limit,
        base_fee_gwei: base_fee_per_gas.map(wei_to_gwei),
        min_priority_fee_gwei: min,
        max_priority_fee_gwei: max,
        avg_priority_fee_gwei: avg,
        median_priority_fee_gwei: median,
        total_base_fee_gwei: wei_to_gwei(total_base_fee_wei),
        total_priority_fee_gwei: wei_to_gwei(total_priority_fee_wei),
        tx_count: el_block.transactions.len() as u32,
        block_time_sec: None,
        mgas_per_sec: None,
        tps: None,
        finalized: false,
        finalized_at: None,
        milestone_id: None,
        time_to_finality_sec: None,
    };
    block.with_derived_fields(previous)
}

/// Recomputes just the priority-fee aggregates for an already-stored
/// block, for `PriorityFeeRecomputer` (spec §4.8).
pub fn recompute_priority_fee(
    el_block: &ElBlock,
    receipts: &BTreeMap<String, ElReceipt>,
) -> (Option<BigDecimal>, Option<BigDecimal>, Option<BigDecimal>, Option<BigDecimal>, BigDecimal) {
    let base_fee_per_gas = el_block.base_fee_per_gas;
    let mut total_priority_fee_wei = U256::ZERO;
    let mut per_tx = Vec::new();

    for tx in &el_block.transactions {
        let Some(receipt) = receipts.get(&tx.hash) else { continue };
        let priority_fee_per_gas = priority_fee_rate(tx.max_priority_fee_per_gas, tx.gas_price, base_fee_per_gas);
        let gas_used = U256::from(receipt.gas_used);
        total_priority_fee_wei = total_priority_fee_wei.saturating_add(priority_fee_per_gas.saturating_mul(gas_used));
        per_tx.push(wei_to_gwei(priority_fee_per_gas));
    }

    let (min, max, avg, median) = priority_fee_summary(&per_tx);
    (min, max, avg, median, wei_to_gwei(total_priority_fee_wei))
}

fn priority_fee_rate(max_priority_fee_per_gas: Option<U256>, gas_price: Option<U256>, base_fee_per_gas: Option<U256>) -> U256 {
    if let Some(rate) = max_priority_fee_per_gas {
        return rate;
    }
    let gas_price = gas_price.unwrap_or(U256::ZERO);
    let base = base_fee_per_gas.unwrap_or(U256::ZERO);
    gas_price.saturating_sub(base)
}

fn priority_fee_summary(
    values: &[BigDecimal],
) -> (Option<BigDecimal>, Option<BigDecimal>, Option<BigDecimal>, Option<BigDecimal>) {
    if values.is_empty() {
        return (None, None, None, None);
    }
    let mut sorted = values.to_vec();
    sorted.sort();

    let min = sorted.first().cloned();
    let max = sorted.last().cloned();

    let sum = values.iter().fold(BigDecimal::from(0), |acc, v| acc + v);
    let avg = Some(sum / BigDecimal::from(values.len() as u64));

    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1].clone() + sorted[mid].clone()) / BigDecimal::from(2))
    } else {
        Some(sorted[mid].clone())
    };

    (min, max, avg, median)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_transactions_yields_zero_totals_and_null_aggregates() {
        let el_block = ElBlock {
            number: 1,
            hash: "0xabc".to_string(),
            parent_hash: "0xdef".to_string(),
            timestamp: 100,
            base_fee_per_gas: Some(U256::from(1_000_000_000u64)),
            gas_used: 0,
            gas_limit: 30_000_000,
            transactions: Vec::new(),
        };
        let block = build_block(&el_block, &BTreeMap::new(), None);
        assert_eq!(block.tx_count, 0);
        assert_eq!(block.total_priority_fee_gwei, BigDecimal::from(0));
        assert_eq!(block.total_base_fee_gwei, BigDecimal::from(0));
        assert!(block.min_priority_fee_gwei.is_none());
    }

    #[test]
    fn uses_explicit_priority_fee_when_present() {
        use chainindex_rpc::ElTransaction;

        let tx = ElTransaction {
            hash: "0x1".to_string(),
            gas_price: Some(U256::from(50_000_000_000u64)),
            max_priority_fee_per_gas: Some(U256::from(2_000_000_000u64)),
        };
        let el_block = ElBlock {
            number: 1,
            hash: "0xabc".to_string(),
            parent_hash: "0xdef".to_string(),
            timestamp: 100,
            base_fee_per_gas: Some(U256::from(30_000_000_000u64)),
            gas_used: 21_000,
            gas_limit: 30_000_000,
            transactions: vec![tx],
        };
        let mut receipts = BTreeMap::new();
        receipts.insert(
            "0x1".to_string(),
            ElReceipt {
                transaction_hash: "0x1".to_string(),
                effective_gas_price: U256::from(32_000_000_000u64),
                gas_used: 21_000,
            },
        );

        let block = build_block(&el_block, &receipts, None);
        assert_eq!(block.tx_count, 1);
        assert_eq!(block.min_priority_fee_gwei, Some(BigDecimal::from(2)));
        assert_eq!(block.max_priority_fee_gwei, Some(BigDecimal::from(2)));
        // total = 2 gwei/gas * 21000 gas = 42000 gwei
        assert_eq!(block.total_priority_fee_gwei, BigDecimal::from(42_000));
    }

    #[test]
    fn falls_back_to_gas_price_minus_base_fee_when_no_explicit_tip() {
        use chainindex_rpc::ElTransaction;

        let tx = ElTransaction {
            hash: "0x1".to_string(),
            gas_price: Some(U256::from(50_000_000_000u64)),
            max_priority_fee_per_gas: None,
        };
        let el_block = ElBlock {
            number: 1,
            hash: "0xabc".to_string(),
            parent_hash: "0xdef".to_string(),
            timestamp: 100,
            base_fee_per_gas: Some(U256::from(30_000_000_000u64)),
            gas_used: 21_000,
            gas_limit: 30_000_000,
            transactions: vec![tx],
        };
        let mut receipts = BTreeMap::new();
        receipts.insert(
            "0x1".to_string(),
            ElReceipt {
                transaction_hash: "0x1".to_string(),
                effective_gas_price: U256::from(50_000_000_000u64),
                gas_used: 21_000,
            },
        );

        let block = build_block(&el_block, &receipts, None);
        // 50 gwei gas price - 30 gwei base fee = 20 gwei tip
        assert_eq!(block.min_priority_fee_gwei, Some(BigDecimal::from(20)));
    }
}
