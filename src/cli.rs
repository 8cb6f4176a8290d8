//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use crate::adapters::csv_adapter::{CsvCandleSource, read_rows};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_sink::JsonLinesSink;
use crate::adapters::log_sink::LogSink;
use crate::domain::calibration::Calibration;
use crate::domain::config_validation::{
    TOKEN_ENV, load_rule_settings, load_watch_config, validate_watch_config,
};
use crate::domain::error::SignalwatchError;
use crate::domain::indicator::{IndicatorRow, IndicatorSet};
use crate::domain::instrument::{Exchange, InstrumentProfile};
use crate::domain::market_clock::{self, Clock, SystemClock};
use crate::domain::normalize::normalize;
use crate::domain::rule_eval::{RuleEngine, RuleSettings};
use crate::domain::scheduler::WatchScheduler;
use crate::domain::signal::Signal;
use crate::ports::candle_source::Credential;
use crate::ports::signal_sink::SignalSink;

/// Indicator rows shown next to an on-demand analysis.
pub const RECENT_ROWS: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "signalwatch", about = "Indicator-driven trade signals for a watch list")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate the rules once against a candle CSV file
    Analyze {
        #[arg(long)]
        candles: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "NSE")]
        exchange: String,
        /// Config file supplying calibration overrides and trend_ema_period
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Show whether an exchange is trading
    MarketStatus {
        #[arg(long, default_value = "NSE")]
        exchange: String,
        /// RFC 3339 instant to check instead of now
        #[arg(long)]
        at: Option<String>,
    },
    /// Validate a watch configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Re-evaluate the watch list on a schedule until interrupted
    Watch {
        #[arg(short, long)]
        config: PathBuf,
        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
        /// Also write every snapshot to stdout as a JSON line
        #[arg(long)]
        json: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Analyze {
            candles,
            symbol,
            exchange,
            config,
            json,
        } => run_analyze(&candles, &symbol, &exchange, config.as_deref(), json),
        Command::MarketStatus { exchange, at } => run_market_status(&exchange, at.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Watch { config, once, json } => run_watch(&config, once, json),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SignalwatchError> {
    FileConfigAdapter::from_file(path).map_err(|e| SignalwatchError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn fail(err: SignalwatchError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

#[derive(Serialize)]
struct Analysis<'a> {
    signal: &'a Signal,
    recent: &'a [IndicatorRow],
}

fn run_analyze(
    candles_path: &Path,
    symbol: &str,
    exchange: &str,
    config_path: Option<&Path>,
    json: bool,
) -> ExitCode {
    let (calibration, settings) = match config_path {
        Some(path) => {
            let result = load_config(path).and_then(|adapter| {
                Ok((
                    Calibration::from_config(&adapter)?,
                    load_rule_settings(&adapter)?,
                ))
            });
            match result {
                Ok(pair) => pair,
                Err(e) => return fail(e),
            }
        }
        None => (Calibration::builtin(), RuleSettings::default()),
    };

    let payload = match read_rows(candles_path, None) {
        Ok(p) => p,
        Err(e) => {
            return fail(SignalwatchError::Io(std::io::Error::other(format!(
                "failed to read {}: {}",
                candles_path.display(),
                e
            ))));
        }
    };
    let candles = normalize(&payload);
    if candles.is_empty() {
        return fail(SignalwatchError::NoData {
            instrument: symbol.to_string(),
        });
    }
    info!(candles = candles.len(), symbol, "analyzing");

    let exchange: Exchange = exchange.parse().unwrap_or(Exchange::Nse);
    let profile = InstrumentProfile::new(symbol, symbol.to_uppercase(), exchange);
    let engine = RuleEngine::new(Arc::new(calibration), settings);
    let signal = engine.evaluate(&candles, &profile);
    let recent = IndicatorSet::compute(&candles, &settings.indicators).recent(&candles, RECENT_ROWS);

    if json {
        let analysis = Analysis {
            signal: &signal,
            recent: &recent,
        };
        match serde_json::to_string_pretty(&analysis) {
            Ok(s) => println!("{s}"),
            Err(e) => return fail(SignalwatchError::Io(e.into())),
        }
    } else {
        print_analysis(&signal, &recent);
    }
    ExitCode::SUCCESS
}

fn print_analysis(signal: &Signal, recent: &[IndicatorRow]) {
    println!("{} {}", signal.symbol, signal.action);
    println!("  {}", signal.reason);
    if signal.is_actionable() {
        println!(
            "  price {}  stop loss {}  target {}  trailing {}",
            signal.price, signal.stop_loss, signal.target, signal.trailing_stop_distance
        );
    }

    println!();
    println!(
        "{:<20} {:>10} {:>8} {:>6} {:>6} {:>6} {:>6} {:>10} {:>10}",
        "time", "close", "atr", "rsi", "%k", "%d", "adx", "ema_fast", "ema_slow"
    );
    for row in recent {
        let time = DateTime::from_timestamp(row.timestamp, 0)
            .map(|t| market_clock::exchange_local_time(t).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| row.timestamp.to_string());
        println!(
            "{:<20} {:>10.2} {:>8} {:>6} {:>6} {:>6} {:>6} {:>10} {:>10}",
            time,
            row.close,
            cell(row.atr, 2),
            cell(row.rsi, 1),
            cell(row.stochastic.map(|s| s.k), 1),
            cell(row.stochastic.map(|s| s.d), 1),
            cell(row.adx, 1),
            cell(row.ema_fast, 2),
            cell(row.ema_slow, 2),
        );
    }
}

fn cell(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

fn run_market_status(exchange: &str, at: Option<&str>) -> ExitCode {
    let now = match at {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => {
                eprintln!("error: invalid --at value {raw:?}: {e}");
                return ExitCode::from(2);
            }
        },
        None => SystemClock.now(),
    };
    let exchange: Exchange = exchange.parse().unwrap_or(Exchange::Nse);
    let status = market_clock::is_open(&exchange, now);
    println!("{}: {}", exchange, status.message);
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };
    if let Err(e) = validate_watch_config(&adapter) {
        return fail(e);
    }

    let loaded = match load_watch_config(&adapter, None) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    eprintln!(
        "OK: {} instruments, poll every {}s, {} day lookback",
        loaded.watchlist.len(),
        loaded.scheduler.poll_interval.as_secs(),
        loaded.scheduler.lookback_days
    );
    for profile in loaded.watchlist.snapshot() {
        eprintln!(
            "  {:<24} {:<12} {:<6} {}",
            profile.instrument_key, profile.symbol, profile.exchange, profile.timeframe
        );
    }
    ExitCode::SUCCESS
}

fn run_watch(config_path: &Path, once: bool, json: bool) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };
    let loaded = match load_watch_config(&adapter, std::env::var(TOKEN_ENV).ok()) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => return fail(SignalwatchError::Io(e)),
    };

    let engine = RuleEngine::new(Arc::new(loaded.calibration), loaded.rules);
    let mut scheduler = WatchScheduler::new(
        CsvCandleSource::new(loaded.data_dir),
        SystemClock,
        engine,
        loaded.watchlist,
        loaded.scheduler,
    )
    .with_sink(Arc::new(LogSink));
    if json {
        let sink: Arc<dyn SignalSink> = Arc::new(JsonLinesSink::new(std::io::stdout()));
        scheduler = scheduler.with_sink(sink);
    }

    match runtime.block_on(watch(&scheduler, loaded.credential, once)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

async fn watch(
    scheduler: &WatchScheduler<CsvCandleSource, SystemClock>,
    credential: Option<Credential>,
    once: bool,
) -> Result<(), SignalwatchError> {
    if once {
        let credential = credential.ok_or(SignalwatchError::MissingCredential)?;
        scheduler.run_once(&credential).await;
        return Ok(());
    }

    scheduler.start(credential)?;
    tokio::signal::ctrl_c().await?;
    info!("interrupt received");
    scheduler.shutdown().await;
    Ok(())
}
