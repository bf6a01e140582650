//! Arbitrage module for detecting and executing rate spreads.
//!
//! This module handles:
//! - Per-maturity opportunity detection from implied rates
//! - Leg sizing against top-of-book liquidity
//! - Two-leg execution with a single status check

pub mod calculator;
pub mod detector;
pub mod executor;

pub use calculator::{round_half_up, size_proposal, TradeLeg, TradeProposal, UnderlierLeg};
pub use detector::evaluate;
pub use executor::{ExecutionReport, ExecutorStats, ProposalExecutor};
