//! Core domain types and logic.

pub mod ohlcv;
pub mod timeframe;
pub mod indicator;
pub mod signal;
pub mod technical;
pub mod sentiment;
pub mod position;
pub mod strategy;
pub mod universe;
pub mod retry;
pub mod cycle;
pub mod config_validation;
pub mod error;
