//! Tracing subscriber setup.

pub const LOG_ENV: &str = "SIGTRADER_LOG";

/// Log filter: `SIGTRADER_LOG` when set, otherwise `log_level`.
pub fn resolve_filter(log_level: &str, env: &dyn Fn(&str) -> Option<String>) -> String {
    env(LOG_ENV)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| log_level.to_string())
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean. A subscriber installed earlier in the process is kept.
pub fn init_tracing(log_level: &str, log_format: &str) -> Result<(), String> {
    let filter = resolve_filter(log_level, &|name| std::env::var(name).ok());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .map_err(|err| format!("invalid log filter {filter:?}: {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let result = match log_format.trim().to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "text" | "" => builder.try_init(),
        other => return Err(format!("unknown log format {other:?}, expected text or json")),
    };
    if let Err(err) = result {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_config_level() {
        let env = |name: &str| (name == LOG_ENV).then(|| "sigtrader=debug".to_string());
        assert_eq!(resolve_filter("info", &env), "sigtrader=debug");
        assert_eq!(resolve_filter("warn", &|_| None), "warn");
        assert_eq!(resolve_filter("warn", &|_| Some("  ".to_string())), "warn");
    }

    #[test]
    fn second_init_is_harmless() {
        assert!(init_tracing("warn", "text").is_ok());
        assert!(init_tracing("warn", "json").is_ok());
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(init_tracing("info", "xml").is_err());
    }

    #[test]
    fn bad_filter_is_rejected() {
        assert!(init_tracing("sigtrader=loud", "text").is_err());
    }
}
