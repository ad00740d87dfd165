use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;

use quantcore::backtester::{BacktestAction, BacktestSignal, Backtester};
use quantcore::config::{BacktestConfig, PortfolioConfig};
use quantcore::models::{Candle, OrderSide, Series, SignalType};
use quantcore::portfolio::PortfolioSimulator;
use quantcore::signals::generate_signal;
use quantcore::store::PortfolioStore;

fn create_date(days_offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(days_offset)
}

/// Deterministic oscillating series with enough range to exercise every
/// indicator without degenerate zero-variance windows.
fn wave_candles(symbol: &str, count: usize) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let phase = i as f64 * 0.35;
            let close = 100.0 + 8.0 * phase.sin() + i as f64 * 0.05;
            Candle {
                symbol: symbol.to_string(),
                date: create_date(i as i64),
                open: close - 0.5,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 10_000.0 + 500.0 * ((i % 7) as f64),
            }
        })
        .collect()
}

#[test]
fn analysis_produces_a_complete_signal() {
    let candles = wave_candles("WAVE", 120);
    let series = Series::from_candles(candles);
    let signal = generate_signal("WAVE", &series).expect("history is sufficient");

    assert_eq!(signal.symbol, "WAVE");
    assert_eq!(signal.reasons.len(), 11);
    assert!((0.0..=100.0).contains(&signal.confidence));
    assert!((0.0..=100.0).contains(&signal.risk.score));
    assert!(signal.entry_price > 0.0);

    match signal.signal_type {
        SignalType::Buy => {
            let target = signal.target_price.expect("buy carries a target");
            let stop = signal.stop_loss.expect("buy carries a stop");
            assert!(stop < signal.entry_price && signal.entry_price < target);
        }
        SignalType::Sell => {
            let target = signal.target_price.expect("sell carries a target");
            let stop = signal.stop_loss.expect("sell carries a stop");
            assert!(target < signal.entry_price && signal.entry_price < stop);
        }
        SignalType::Hold => {
            assert!(signal.target_price.is_none());
            assert!(signal.stop_loss.is_none());
        }
    }
}

#[test]
fn backtest_replays_a_signal_stream_end_to_end() {
    let candles = wave_candles("WAVE", 120);
    let signals = vec![
        BacktestSignal {
            date: create_date(60),
            action: BacktestAction::Buy,
            confidence: 65.0,
            target_price: None,
            stop_loss: None,
        },
        BacktestSignal {
            date: create_date(110),
            action: BacktestAction::Exit,
            confidence: 0.0,
            target_price: None,
            stop_loss: None,
        },
    ];

    let result = Backtester::new(BacktestConfig::default()).run("WAVE", &candles, &signals);

    assert_eq!(result.equity_curve.len(), candles.len() + 1);
    assert_eq!(result.equity_curve[0], 100_000.0);
    assert_eq!(result.dates.len(), candles.len());
    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.metrics.total_trades, 1);

    // Monetary outputs are rounded to cents at the boundary.
    for value in &result.equity_curve {
        assert_eq!(*value, (*value * 100.0).round() / 100.0);
    }
}

#[test]
fn portfolio_store_serializes_access_per_owner() {
    let store = PortfolioStore::new(PortfolioConfig::default());

    {
        let handle = store.get("desk-1");
        let mut account = handle.lock().unwrap();
        account
            .place_market_order("WAVE", OrderSide::Buy, 10.0, 100.0)
            .unwrap();
        let mut prices = HashMap::new();
        prices.insert("WAVE".to_string(), 104.0);
        account.update_positions(&prices);

        let state = account.state();
        let position_value: f64 = state.positions.iter().map(|p| p.market_value).sum();
        assert!((state.equity - (state.cash + position_value)).abs() < 0.02);
    }

    // A second owner sees a pristine account.
    let other = store.get("desk-2");
    assert_eq!(other.lock().unwrap().state().cash, 100_000.0);
}

#[test]
fn signals_flow_into_a_paper_account() {
    let candles = wave_candles("WAVE", 120);
    let series = Series::from_candles(candles);
    let signal = generate_signal("WAVE", &series).expect("history is sufficient");

    let mut account = PortfolioSimulator::new("paper-1", PortfolioConfig::default());
    let shares = 10.0;

    // Regardless of the decision, executing at the signal's entry price
    // keeps the account's books balanced.
    account
        .place_market_order(&signal.symbol, OrderSide::Buy, shares, signal.entry_price)
        .unwrap();
    let mut prices = HashMap::new();
    prices.insert(signal.symbol.clone(), signal.entry_price * 1.02);
    account.update_positions(&prices);
    account
        .place_market_order(
            &signal.symbol,
            OrderSide::Sell,
            shares,
            signal.entry_price * 1.02,
        )
        .unwrap();

    let state = account.state();
    assert!(state.positions.is_empty());
    assert_eq!(state.performance.trade_count, 2);
    // One closed round trip feeds the win/loss statistics.
    assert!(state.performance.win_rate == 100.0 || state.performance.win_rate == 0.0);
    assert_eq!(state.open_orders.len(), 0);
}
