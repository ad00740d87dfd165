use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::fs;
use std::path::PathBuf;

use quantcore::backtester::{Backtester, BacktestSignal};
use quantcore::candle_utils::{group_candles_by_symbol, normalize_symbol};
use quantcore::config::BacktestConfig;
use quantcore::models::{Candle, Series};
use quantcore::signals::{self, analyze_symbols};

#[derive(Parser)]
#[command(name = "quantcore")]
#[command(about = "Quantitative analysis and trade simulation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate trading signals for the symbols in a candle file
    Analyze {
        /// Path to a JSON file containing an array of candles
        data_file: PathBuf,
        /// Restrict the analysis to a single symbol
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Replay one symbol's candles through the backtest engine
    Backtest {
        /// Path to a JSON file containing an array of candles
        data_file: PathBuf,
        /// Symbol to backtest
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value_t = 100_000.0)]
        initial_capital: f64,
        #[arg(long, default_value_t = 0.001)]
        commission: f64,
        #[arg(long, default_value_t = 0.001)]
        slippage: f64,
        #[arg(long, default_value_t = 5)]
        max_positions: usize,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { data_file, symbol } => {
            let candles = load_candles(&data_file)?;
            let mut grouped = group_candles_by_symbol(&candles, None);
            if let Some(raw) = symbol {
                let wanted = normalize_symbol(&raw)
                    .ok_or_else(|| anyhow!("Symbol argument is empty"))?;
                grouped.retain(|key, _| key.eq_ignore_ascii_case(&wanted));
                if grouped.is_empty() {
                    return Err(anyhow!("No candles found for symbol {}", wanted));
                }
            }

            info!("Analyzing {} symbol(s)", grouped.len());
            let signals = analyze_symbols(grouped);
            println!("{}", serde_json::to_string_pretty(&signals)?);
        }
        Commands::Backtest {
            data_file,
            symbol,
            initial_capital,
            commission,
            slippage,
            max_positions,
        } => {
            let candles = load_candles(&data_file)?;
            let wanted =
                normalize_symbol(&symbol).ok_or_else(|| anyhow!("Symbol argument is empty"))?;
            let mut grouped = group_candles_by_symbol(&candles, None);
            let candles = grouped
                .remove(&wanted)
                .ok_or_else(|| anyhow!("No candles found for symbol {}", wanted))?;

            let signal_stream = rolling_signals(&wanted, &candles);
            info!(
                "Backtesting {} over {} candles with {} signals",
                wanted,
                candles.len(),
                signal_stream.len()
            );

            let config = BacktestConfig {
                initial_capital,
                commission_rate: commission,
                slippage_rate: slippage,
                max_positions,
                ..BacktestConfig::default()
            };
            let result = Backtester::new(config).run(&wanted, &candles, &signal_stream);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

fn load_candles(path: &PathBuf) -> Result<Vec<Candle>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read candle file {}", path.display()))?;
    let candles: Vec<Candle> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse candle file {}", path.display()))?;
    if candles.is_empty() {
        return Err(anyhow!("Candle file {} is empty", path.display()));
    }
    Ok(candles)
}

/// Walk the series forward, producing a signal from each prefix that meets
/// the generator's minimum history. HOLD decisions drop out of the stream.
fn rolling_signals(symbol: &str, candles: &[Candle]) -> Vec<BacktestSignal> {
    let mut stream = Vec::new();
    for end in signals::MIN_CANDLES..=candles.len() {
        let series = Series::from_candles(candles[..end].to_vec());
        if let Ok(signal) = signals::generate_signal(symbol, &series) {
            if let Some(replay) = BacktestSignal::from_signal(&signal) {
                stream.push(replay);
            }
        }
    }
    stream
}
