//! Domain error types.

/// Top-level error type for sigtrader.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid symbol: {symbol:?}")]
    InvalidSymbol { symbol: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("{operation} unavailable after {attempts} attempts: {reason}")]
    DependencyUnavailable {
        operation: String,
        attempts: u32,
        reason: String,
    },

    #[error("invalid position for {symbol}: {reason}")]
    InvalidPosition { symbol: String, reason: String },

    #[error("market data error: {reason}")]
    MarketData { reason: String },

    /// Data that was delivered but cannot be parsed; re-reading returns the same bytes.
    #[error("malformed data: {reason}")]
    MalformedData { reason: String },

    #[error("broker error: {reason}")]
    Broker { reason: String },

    /// The dependency understood the request and refused it (4xx).
    #[error("{operation} rejected with status {status}: {reason}")]
    RequestRejected {
        operation: String,
        status: u16,
        reason: String,
    },

    #[error("sentiment error: {reason}")]
    Sentiment { reason: String },

    #[error("io error: {reason}")]
    Io { reason: String },
}

impl TraderError {
    /// Whether retrying the same call may succeed.
    ///
    /// Failures reported by a dependency are treated as transient because a
    /// generic failure cannot be told apart from a temporary outage. Errors
    /// caused by our own inputs or configuration are permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TraderError::MarketData { .. }
                | TraderError::Broker { .. }
                | TraderError::Sentiment { .. }
                | TraderError::Io { .. }
        )
    }
}

impl From<std::io::Error> for TraderError {
    fn from(err: std::io::Error) -> Self {
        TraderError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io { .. } => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::DependencyUnavailable { .. }
            | TraderError::MarketData { .. }
            | TraderError::Broker { .. }
            | TraderError::RequestRejected { .. }
            | TraderError::Sentiment { .. } => 3,
            TraderError::InvalidSymbol { .. } => 4,
            TraderError::InsufficientData { .. } | TraderError::MalformedData { .. } => 5,
            TraderError::InvalidPosition { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_errors_are_transient() {
        assert!(TraderError::MarketData { reason: "timeout".into() }.is_transient());
        assert!(TraderError::Broker { reason: "503".into() }.is_transient());
        assert!(TraderError::Io { reason: "reset".into() }.is_transient());
    }

    #[test]
    fn input_errors_are_permanent() {
        assert!(!TraderError::InvalidSymbol { symbol: "$$".into() }.is_transient());
        assert!(
            !TraderError::InvalidPosition {
                symbol: "AAPL".into(),
                reason: "qty".into()
            }
            .is_transient()
        );
        assert!(
            !TraderError::RequestRejected {
                operation: "submit_order".into(),
                status: 422,
                reason: "insufficient buying power".into()
            }
            .is_transient()
        );
        assert!(!TraderError::MalformedData { reason: "bad row".into() }.is_transient());
        assert!(
            !TraderError::ConfigMissing {
                section: "alpaca".into(),
                key: "key_id".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn display_includes_context() {
        let err = TraderError::InsufficientData {
            symbol: "TSLA".into(),
            bars: 12,
            minimum: 21,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for TSLA: have 12 bars, need 21"
        );
    }
}
