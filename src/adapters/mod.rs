//! Concrete adapter implementations for ports.

pub mod alpaca_adapter;
pub mod csv_adapter;
pub mod dry_run_broker;
pub mod file_config_adapter;
pub mod lexicon_sentiment;
pub mod system_clock;
