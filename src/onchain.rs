// src/onchain.rs
//! Heuristic "on-chain" snapshot derived from a market record.
//!
//! Supply, activity and valuation figures are pure functions of the record.
//! Flow and holder figures are NOT data: they come from a `SimulatedMetrics`
//! implementation and are carried in a separate `simulated` block.

use rand::Rng;
use serde::Serialize;

use crate::types::CoinRecord;

/// Net-flow scores beyond ±this are labelled inflow/outflow.
pub const FLOW_NEUTRAL_BAND: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ActivityTier {
    /// Tier from 24h volume / market cap.
    pub fn from_turnover(turnover: f64) -> Self {
        if turnover < 0.05 {
            ActivityTier::Low
        } else if turnover < 0.2 {
            ActivityTier::Medium
        } else if turnover < 0.5 {
            ActivityTier::High
        } else {
            ActivityTier::VeryHigh
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Inflow,
    Outflow,
    Neutral,
}

impl FlowStatus {
    pub fn from_score(score: i32) -> Self {
        if score > FLOW_NEUTRAL_BAND {
            FlowStatus::Inflow
        } else if score < -FLOW_NEUTRAL_BAND {
            FlowStatus::Outflow
        } else {
            FlowStatus::Neutral
        }
    }
}

/// Source of presentational flow/holder figures.
pub trait SimulatedMetrics: Send + Sync {
    /// Directional flow in `-100..=100`.
    fn net_flow_score(&self, record: &CoinRecord) -> i32;
    fn holder_count(&self, record: &CoinRecord) -> u64;
}

/// Random noise scaled loosely by market cap.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomMetrics;

impl SimulatedMetrics for RandomMetrics {
    fn net_flow_score(&self, _record: &CoinRecord) -> i32 {
        rand::rng().random_range(-100..=100)
    }

    fn holder_count(&self, record: &CoinRecord) -> u64 {
        let base = (record.market_cap.max(0.0) / 1_000.0).sqrt().max(1_000.0);
        let spread: f64 = rand::rng().random_range(0.8..1.2);
        (base * spread).round() as u64
    }
}

/// Deterministic figures for tests and demos.
#[derive(Debug, Clone, Copy)]
pub struct FixedMetrics {
    pub flow: i32,
    pub holders: u64,
}

impl SimulatedMetrics for FixedMetrics {
    fn net_flow_score(&self, _record: &CoinRecord) -> i32 {
        self.flow.clamp(-100, 100)
    }

    fn holder_count(&self, _record: &CoinRecord) -> u64 {
        self.holders
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedFlow {
    pub net_flow_status: FlowStatus,
    pub net_flow_score: i32,
    pub holders: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnChainSnapshot {
    /// Circulating share of the supply cap, 0-100.
    pub unlock_progress: f64,
    pub locked_percent: f64,
    pub activity: ActivityTier,
    /// 0-100, from turnover.
    pub whale_score: u32,
    /// Fully diluted valuation / market cap; 1.0 when unknown.
    pub fdv_gap: f64,
    pub simulated: SimulatedFlow,
}

fn supply_cap(r: &CoinRecord) -> Option<f64> {
    r.max_supply
        .filter(|v| *v > 0.0)
        .or(r.total_supply.filter(|v| *v > 0.0))
}

pub fn unlock_progress(r: &CoinRecord) -> f64 {
    match (r.circulating_supply, supply_cap(r)) {
        (Some(circ), Some(cap)) => (circ / cap * 100.0).clamp(0.0, 100.0),
        _ => 100.0,
    }
}

pub fn turnover(r: &CoinRecord) -> f64 {
    if r.market_cap > 0.0 {
        r.total_volume.max(0.0) / r.market_cap
    } else {
        0.0
    }
}

pub fn fdv_gap(r: &CoinRecord) -> f64 {
    match r.fully_diluted_valuation {
        Some(fdv) if r.market_cap > 0.0 && fdv > 0.0 => fdv / r.market_cap,
        _ => 1.0,
    }
}

pub fn snapshot(record: &CoinRecord, sim: &dyn SimulatedMetrics) -> OnChainSnapshot {
    let unlock = unlock_progress(record);
    let t = turnover(record);
    let score = sim.net_flow_score(record).clamp(-100, 100);
    OnChainSnapshot {
        unlock_progress: unlock,
        locked_percent: 100.0 - unlock,
        activity: ActivityTier::from_turnover(t),
        whale_score: (t * 200.0).clamp(0.0, 100.0).round() as u32,
        fdv_gap: fdv_gap(record),
        simulated: SimulatedFlow {
            net_flow_status: FlowStatus::from_score(score),
            net_flow_score: score,
            holders: sim.holder_count(record),
        },
    }
}
