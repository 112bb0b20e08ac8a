//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::alpaca_adapter::AlpacaAdapter;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::dry_run_broker::DryRunBroker;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::lexicon_sentiment::LexiconScorer;
use crate::adapters::system_clock::ThreadSleeper;
use crate::domain::config_validation::{
    duration_setting, parse_setting, validate_credentials, validate_runtime_config,
    validate_strategy_config, validate_trading_config,
};
use crate::domain::cycle::{CycleConfig, RankingConfig, SentimentFeed, TradingCycle};
use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorParams;
use crate::domain::position::RiskLimits;
use crate::domain::retry::RetryPolicy;
use crate::domain::sentiment::SentimentThresholds;
use crate::domain::strategy::{SentimentSettings, Strategy};
use crate::domain::technical::RsiBand;
use crate::domain::universe::parse_symbols;
use crate::logging;
use crate::ports::broker_port::BrokerPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "sigtrader", about = "Signal-driven trading loop for Alpaca accounts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the trading loop
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Run a single cycle and exit
        #[arg(long, conflicts_with = "cycles")]
        once: bool,
        /// Stop after this many cycles
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        cycles: Option<u64>,
        /// Comma-separated symbols overriding [trading] symbols
        #[arg(long)]
        symbols: Option<String>,
        /// Log orders instead of submitting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file and print the resolved settings
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        /// Validate for a dry run (credentials only needed for Alpaca data)
        #[arg(long)]
        dry_run: bool,
    },
    /// Rank the configured symbols by recent performance, worst first
    Rank {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbols: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            once,
            cycles,
            symbols,
            dry_run,
        } => {
            let max_cycles = if once { Some(1) } else { cycles };
            run_trading(&config, symbols.as_deref(), max_cycles, dry_run)
        }
        Command::Validate { config, dry_run } => run_validate(&config, dry_run),
        Command::Rank { config, symbols } => run_rank(&config, symbols.as_deref()),
    }
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn init_logging(adapter: &dyn ConfigPort) -> Result<(), ExitCode> {
    let level = adapter
        .get_string("logging", "level")
        .unwrap_or_else(|| "info".to_string());
    let format = adapter
        .get_string("logging", "format")
        .unwrap_or_else(|| "text".to_string());
    logging::init_tracing(&level, &format).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(2)
    })
}

fn uses_csv(adapter: &dyn ConfigPort) -> bool {
    adapter
        .get_string("data", "source")
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("csv"))
}

/// Credentials are needed whenever Alpaca is contacted: for market data or
/// for a live broker.
pub fn needs_credentials(adapter: &dyn ConfigPort, dry_run: bool) -> bool {
    !uses_csv(adapter) || !dry_run
}

pub fn validate_all(
    adapter: &dyn ConfigPort,
    dry_run: bool,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<(), TraderError> {
    validate_trading_config(adapter)?;
    validate_strategy_config(adapter)?;
    validate_runtime_config(adapter)?;
    if needs_credentials(adapter, dry_run) {
        validate_credentials(adapter, env)?;
    }
    Ok(())
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Strategy, TraderError> {
    let defaults = Strategy::default();
    let technical_mode = parse_setting(adapter, "strategy", "technical_mode")?
        .unwrap_or(defaults.technical_mode);
    let combine = parse_setting(adapter, "strategy", "combine")?.unwrap_or(defaults.combine);

    Ok(Strategy {
        name: adapter
            .get_string("strategy", "name")
            .unwrap_or_else(|| format!("{technical_mode}")),
        technical_mode,
        indicators: IndicatorParams {
            rsi_period: adapter.get_int("strategy", "rsi_period", 14) as usize,
            short_window: adapter.get_int("strategy", "short_window", 5) as usize,
            long_window: adapter.get_int("strategy", "long_window", 20) as usize,
        },
        rsi_band: RsiBand {
            lower: adapter.get_double("strategy", "rsi_band_lower", 30.0),
            upper: adapter.get_double("strategy", "rsi_band_upper", 45.0),
        },
        risk: RiskLimits {
            stop_loss_pct: adapter.get_double("strategy", "stop_loss", 0.03),
            take_profit_pct: adapter.get_double("strategy", "take_profit", 0.05),
        },
        sentiment: SentimentSettings {
            enabled: adapter.get_bool("sentiment", "enabled", false),
            thresholds: SentimentThresholds {
                noise_floor: adapter.get_double("sentiment", "noise_floor", 0.2),
                threshold: adapter.get_double("sentiment", "threshold", 0.3),
            },
            max_texts: adapter.get_int("sentiment", "max_texts", 20) as usize,
        },
        combine,
        allow_long: adapter.get_bool("strategy", "allow_long", true),
        allow_short: adapter.get_bool("strategy", "allow_short", true),
    })
}

/// Symbols from `--symbols` when given, otherwise `[trading] symbols`.
pub fn resolve_symbols(
    symbols_override: Option<&str>,
    adapter: &dyn ConfigPort,
) -> Result<Vec<String>, TraderError> {
    let (raw, source) = match symbols_override {
        Some(s) => (s.to_string(), "--symbols"),
        None => (
            adapter
                .get_string("trading", "symbols")
                .ok_or_else(|| TraderError::ConfigMissing {
                    section: "trading".into(),
                    key: "symbols".into(),
                })?,
            "symbols",
        ),
    };
    parse_symbols(&raw).map_err(|e| TraderError::ConfigInvalid {
        section: "trading".into(),
        key: source.into(),
        reason: e.to_string(),
    })
}

pub fn build_cycle_config(
    adapter: &dyn ConfigPort,
    symbols_override: Option<&str>,
) -> Result<CycleConfig, TraderError> {
    let defaults = CycleConfig::default();
    let ranking_defaults = RankingConfig::default();

    Ok(CycleConfig {
        symbols: resolve_symbols(symbols_override, adapter)?,
        timeframe: parse_setting(adapter, "trading", "timeframe")?.unwrap_or(defaults.timeframe),
        lookback: adapter.get_int("trading", "lookback", 50).max(1) as usize,
        min_bars: adapter.get_int("trading", "min_bars", 20).max(1) as usize,
        trade_budget: adapter.get_double("trading", "trade_budget", 1000.0),
        time_in_force: parse_setting(adapter, "trading", "time_in_force")?
            .unwrap_or(defaults.time_in_force),
        cycle_interval: duration_setting(adapter, "trading", "cycle_interval_secs", 300.0)?,
        symbol_pause: Duration::from_millis(
            adapter.get_int("trading", "symbol_pause_ms", 500).max(0) as u64,
        ),
        ranking: RankingConfig {
            select: adapter.get_int("ranking", "select", 0).max(0) as usize,
            timeframe: parse_setting(adapter, "ranking", "timeframe")?
                .unwrap_or(ranking_defaults.timeframe),
            lookback: adapter.get_int("ranking", "lookback", 5).max(2) as usize,
            min_bars: adapter.get_int("ranking", "min_bars", 2).max(2) as usize,
        },
        retry: RetryPolicy {
            max_attempts: adapter.get_int("retry", "max_attempts", 5).clamp(1, 100) as u32,
            base_delay: duration_setting(adapter, "retry", "base_delay_secs", 1.0)?,
            step: duration_setting(adapter, "retry", "step_secs", 1.0)?,
            jitter: duration_setting(adapter, "retry", "jitter_secs", 1.0)?,
        },
    })
}

/// Human-readable summary of the resolved settings.
pub fn describe(strategy: &Strategy, cycle: &CycleConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!("Strategy:        {}\n", strategy.name));
    out.push_str(&format!("Technical mode:  {}\n", strategy.technical_mode));
    out.push_str(&format!(
        "Indicators:      RSI({}) SMA({}) SMA({})\n",
        strategy.indicators.rsi_period,
        strategy.indicators.short_window,
        strategy.indicators.long_window
    ));
    out.push_str(&format!(
        "RSI band:        ({}, {})\n",
        strategy.rsi_band.lower, strategy.rsi_band.upper
    ));
    out.push_str(&format!(
        "Risk:            stop-loss {:.1}%, take-profit {:.1}%\n",
        strategy.risk.stop_loss_pct * 100.0,
        strategy.risk.take_profit_pct * 100.0
    ));
    out.push_str(&format!(
        "Sides:           long={} short={}\n",
        strategy.allow_long, strategy.allow_short
    ));
    if strategy.sentiment.enabled {
        out.push_str(&format!(
            "Sentiment:       {} (noise floor {}, threshold {})\n",
            strategy.combine,
            strategy.sentiment.thresholds.noise_floor,
            strategy.sentiment.thresholds.threshold
        ));
    } else {
        out.push_str("Sentiment:       disabled\n");
    }
    out.push_str(&format!("Symbols:         {}\n", cycle.symbols.join(", ")));
    if cycle.ranking.select > 0 {
        out.push_str(&format!(
            "Ranking:         worst {} over {} x {}\n",
            cycle.ranking.select, cycle.ranking.lookback, cycle.ranking.timeframe
        ));
    }
    out.push_str(&format!(
        "Bars:            {} x {} (min {})\n",
        cycle.lookback, cycle.timeframe, cycle.min_bars
    ));
    out.push_str(&format!(
        "Budget:          ${:.2} per entry, {}\n",
        cycle.trade_budget,
        cycle.time_in_force.as_str()
    ));
    out.push_str(&format!(
        "Cadence:         every {}s, {}ms between symbols\n",
        cycle.cycle_interval.as_secs(),
        cycle.symbol_pause.as_millis()
    ));
    out.push_str(&format!(
        "Retry:           {} attempts\n",
        cycle.retry.max_attempts
    ));
    out
}

fn prepare(
    config_path: &PathBuf,
    symbols_override: Option<&str>,
    dry_run: bool,
) -> Result<(FileConfigAdapter, Strategy, CycleConfig), ExitCode> {
    let adapter = load_config(config_path)?;
    let fail = |e: TraderError| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    };
    validate_all(&adapter, dry_run, &process_env).map_err(fail)?;
    let strategy = build_strategy(&adapter).map_err(fail)?;
    let cycle = build_cycle_config(&adapter, symbols_override).map_err(fail)?;
    Ok((adapter, strategy, cycle))
}

fn run_trading(
    config_path: &PathBuf,
    symbols_override: Option<&str>,
    max_cycles: Option<u64>,
    dry_run: bool,
) -> ExitCode {
    // Stage 1: Load and validate config
    let (adapter, strategy, cycle_config) = match prepare(config_path, symbols_override, dry_run) {
        Ok(v) => v,
        Err(code) => return code,
    };
    if let Err(code) = init_logging(&adapter) {
        return code;
    }

    // Stage 2: Build collaborators
    let alpaca = if validate_credentials(&adapter, &process_env).is_ok() {
        match AlpacaAdapter::from_config(&adapter, &process_env) {
            Ok(a) => Some(a),
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        }
    } else {
        None
    };

    let csv = uses_csv(&adapter).then(|| {
        CsvAdapter::new(PathBuf::from(
            adapter.get_string("data", "csv_dir").unwrap_or_default(),
        ))
    });
    let market: &dyn MarketDataPort = match (&csv, &alpaca) {
        (Some(csv), _) => csv,
        (None, Some(alpaca)) => alpaca,
        (None, None) => {
            let err = TraderError::ConfigMissing {
                section: "alpaca".into(),
                key: "key_id".into(),
            };
            eprintln!("error: {err}");
            return (&err).into();
        }
    };

    let dry_broker = DryRunBroker::new(alpaca.as_ref().map(|a| a as &dyn BrokerPort));
    let broker: &dyn BrokerPort = match (&alpaca, dry_run) {
        (Some(alpaca), false) => alpaca,
        _ => &dry_broker,
    };

    let scorer = LexiconScorer::new();
    let sleeper = ThreadSleeper;
    let mut trading = TradingCycle::new(market, broker, &strategy, &cycle_config, &sleeper);
    if strategy.sentiment.enabled {
        match &alpaca {
            Some(alpaca) => {
                trading = trading.with_sentiment(SentimentFeed {
                    scorer: &scorer,
                    source: alpaca,
                });
            }
            None => tracing::warn!("sentiment enabled but no news source configured, ignoring"),
        }
    }

    // Stage 3: Trade
    tracing::info!(
        strategy = %strategy.name,
        symbols = cycle_config.symbols.len(),
        dry_run,
        max_cycles = ?max_cycles,
        "starting trading loop"
    );
    let completed = trading.run(max_cycles);
    tracing::info!(cycles = completed, "trading loop finished");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf, dry_run: bool) -> ExitCode {
    let (_, strategy, cycle_config) = match prepare(config_path, None, dry_run) {
        Ok(v) => v,
        Err(code) => return code,
    };
    print!("{}", describe(&strategy, &cycle_config));
    println!("Config validated successfully");
    ExitCode::SUCCESS
}

fn run_rank(config_path: &PathBuf, symbols_override: Option<&str>) -> ExitCode {
    let (adapter, strategy, mut cycle_config) = match prepare(config_path, symbols_override, true)
    {
        Ok(v) => v,
        Err(code) => return code,
    };
    if let Err(code) = init_logging(&adapter) {
        return code;
    }
    if cycle_config.ranking.select == 0 {
        cycle_config.ranking.select = cycle_config.symbols.len();
    }

    let alpaca;
    let csv;
    let market: &dyn MarketDataPort = if uses_csv(&adapter) {
        csv = CsvAdapter::new(PathBuf::from(
            adapter.get_string("data", "csv_dir").unwrap_or_default(),
        ));
        &csv
    } else {
        alpaca = match AlpacaAdapter::from_config(&adapter, &process_env) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        &alpaca
    };

    let broker = DryRunBroker::new(None);
    let sleeper = ThreadSleeper;
    let trading = TradingCycle::new(market, &broker, &strategy, &cycle_config, &sleeper);
    let ranked = trading.rank_symbols();

    if ranked.is_empty() {
        eprintln!("error: no symbol had enough data to rank");
        return ExitCode::from(5);
    }
    println!(
        "Worst performers over {} x {}:",
        cycle_config.ranking.lookback, cycle_config.ranking.timeframe
    );
    for (i, rank) in ranked.iter().enumerate() {
        println!(
            "  {:>2}. {:<8} {:>+8.2}%",
            i + 1,
            rank.symbol,
            rank.performance_pct * 100.0
        );
    }
    ExitCode::SUCCESS
}
