//! Port traits for the external collaborators the trading core depends on.

pub mod broker_port;
pub mod clock_port;
pub mod config_port;
pub mod data_port;
pub mod sentiment_port;
