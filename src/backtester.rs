use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BacktestConfig;
use crate::indicators;
use crate::models::{round2, BacktestResult, Candle, OrderSide, Signal, SignalType, Trade};
use crate::performance::PerformanceCalculator;
use crate::sizing::{self, SizingMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BacktestAction {
    Buy,
    Sell,
    Exit,
}

/// One entry in the pre-computed signal stream the backtester replays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestSignal {
    pub date: DateTime<Utc>,
    pub action: BacktestAction,
    pub confidence: f64,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
}

impl BacktestSignal {
    /// Tradable signals map to replay actions; HOLD produces nothing.
    pub fn from_signal(signal: &Signal) -> Option<Self> {
        let action = match signal.signal_type {
            SignalType::Buy => BacktestAction::Buy,
            SignalType::Sell => BacktestAction::Sell,
            SignalType::Hold => return None,
        };
        Some(Self {
            date: signal.date,
            action,
            confidence: signal.confidence,
            target_price: signal.target_price,
            stop_loss: signal.stop_loss,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionDirection {
    Long,
    Short,
}

#[derive(Debug, Clone)]
struct OpenPosition {
    symbol: String,
    direction: PositionDirection,
    shares: f64,
    entry_price: f64,
    entry_commission: f64,
    stop_loss: Option<f64>,
    target_price: Option<f64>,
}

pub struct Backtester {
    config: BacktestConfig,
}

impl Backtester {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Replay a candle series against a signal stream.
    ///
    /// Per candle, in order: open positions are checked for stop/target
    /// breach against the candle's range (stop wins when both could
    /// trigger), due signals are applied, and the mark-to-market equity is
    /// appended. The equity curve is seeded with the initial capital, so
    /// its length is always `candles.len() + 1`.
    pub fn run(
        &self,
        symbol: &str,
        candles: &[Candle],
        signals: &[BacktestSignal],
    ) -> BacktestResult {
        let mut candles = candles.to_vec();
        candles.sort_by(|a, b| a.date.cmp(&b.date));
        let mut signals = signals.to_vec();
        signals.sort_by(|a, b| a.date.cmp(&b.date));

        let mut cash = self.config.initial_capital;
        let mut equity_curve = vec![round2(self.config.initial_capital)];
        let mut dates = Vec::with_capacity(candles.len());
        let mut open_positions: Vec<OpenPosition> = Vec::new();
        let mut trades: Vec<Trade> = Vec::new();
        let mut signal_cursor = 0usize;

        for (index, candle) in candles.iter().enumerate() {
            // (a) protective exits against this candle's range
            let mut still_open = Vec::with_capacity(open_positions.len());
            for position in open_positions.drain(..) {
                match breach_exit_price(&position, candle) {
                    Some(raw_exit) => {
                        self.close_position(&position, raw_exit, candle.date, &mut cash, &mut trades);
                    }
                    None => still_open.push(position),
                }
            }
            open_positions = still_open;

            // (b) signals dated on or before this candle
            while signal_cursor < signals.len() && signals[signal_cursor].date <= candle.date {
                let signal = signals[signal_cursor].clone();
                signal_cursor += 1;
                match signal.action {
                    BacktestAction::Buy => {
                        self.try_open(
                            PositionDirection::Long,
                            &signal,
                            &candles[..=index],
                            &mut cash,
                            &mut open_positions,
                            &mut trades,
                        );
                    }
                    BacktestAction::Sell => {
                        self.try_open(
                            PositionDirection::Short,
                            &signal,
                            &candles[..=index],
                            &mut cash,
                            &mut open_positions,
                            &mut trades,
                        );
                    }
                    BacktestAction::Exit => {
                        for position in open_positions.drain(..) {
                            self.close_position(
                                &position,
                                candle.close,
                                candle.date,
                                &mut cash,
                                &mut trades,
                            );
                        }
                    }
                }
            }

            // (c) mark-to-market equity
            let positions_value: f64 = open_positions
                .iter()
                .map(|p| match p.direction {
                    PositionDirection::Long => p.shares * candle.close,
                    PositionDirection::Short => -(p.shares * candle.close),
                })
                .sum();
            equity_curve.push(round2(cash + positions_value));
            dates.push(candle.date);
        }

        let metrics = PerformanceCalculator::calculate_metrics(
            &trades,
            self.config.initial_capital,
            &equity_curve,
            dates.len(),
        );

        BacktestResult {
            symbol: symbol.to_string(),
            initial_capital: round2(self.config.initial_capital),
            final_equity: *equity_curve.last().expect("curve is seeded"),
            trades,
            equity_curve,
            dates,
            metrics,
        }
    }

    fn try_open(
        &self,
        direction: PositionDirection,
        signal: &BacktestSignal,
        history: &[Candle],
        cash: &mut f64,
        open_positions: &mut Vec<OpenPosition>,
        trades: &mut Vec<Trade>,
    ) {
        // Excess signals are dropped, never queued.
        if open_positions.len() >= self.config.max_positions {
            debug!(
                "Dropping {:?} signal on {}: {} positions already open",
                signal.action,
                signal.date,
                open_positions.len()
            );
            return;
        }

        let candle = history.last().expect("history includes the current candle");
        let raw_price = candle.close;
        if raw_price <= 0.0 {
            return;
        }

        let shares = self.size_entry(signal, history, *cash, raw_price, trades);
        if shares <= 0.0 {
            debug!(
                "Dropping {:?} signal on {}: sizing produced no shares",
                signal.action, signal.date
            );
            return;
        }

        let is_short = direction == PositionDirection::Short;
        let fill_price = self.entry_fill_price(raw_price, is_short);
        let notional = shares * fill_price;
        let commission = notional * self.config.commission_rate;

        // Longs need cash for the purchase; shorts are fully
        // collateralized by cash before the sale proceeds arrive.
        if notional + commission > *cash {
            debug!(
                "Dropping {:?} signal on {}: requires {:.2}, cash {:.2}",
                signal.action,
                signal.date,
                notional + commission,
                cash
            );
            return;
        }

        match direction {
            PositionDirection::Long => *cash -= notional + commission,
            PositionDirection::Short => *cash += notional - commission,
        }

        trades.push(Trade {
            id: Uuid::new_v4().to_string(),
            symbol: candle.symbol.clone(),
            side: if is_short {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            },
            shares,
            price: round2(fill_price),
            commission: round2(commission),
            date: candle.date,
            realized_pnl: None,
        });

        open_positions.push(OpenPosition {
            symbol: candle.symbol.clone(),
            direction,
            shares,
            entry_price: fill_price,
            entry_commission: commission,
            stop_loss: signal.stop_loss,
            target_price: signal.target_price,
        });
    }

    fn size_entry(
        &self,
        signal: &BacktestSignal,
        history: &[Candle],
        cash: f64,
        price: f64,
        trades: &[Trade],
    ) -> f64 {
        let sizing = &self.config.sizing;
        match sizing.method {
            SizingMethod::AtrBased => {
                let highs: Vec<f64> = history.iter().map(|c| c.high).collect();
                let lows: Vec<f64> = history.iter().map(|c| c.low).collect();
                let closes: Vec<f64> = history.iter().map(|c| c.close).collect();
                let atr =
                    indicators::calculate_atr(&highs, &lows, &closes, indicators::ATR_PERIOD).atr;
                if atr > 0.0 {
                    sizing::atr_based_size(
                        cash,
                        sizing.risk_per_trade,
                        price,
                        atr,
                        sizing.atr_multiplier,
                    )
                    .shares
                } else {
                    sizing::fixed_percent_size(cash, sizing.fixed_percent, price).shares
                }
            }
            SizingMethod::ConfidenceBased => {
                sizing::confidence_based_size(
                    cash,
                    sizing.fixed_percent,
                    sizing.max_percent,
                    signal.confidence,
                    price,
                )
                .shares
            }
            SizingMethod::Kelly => match realized_trade_stats(trades) {
                Some((win_rate, ratio)) => {
                    sizing::kelly_size(cash, price, win_rate, ratio, sizing.kelly_fraction).shares
                }
                None => sizing::fixed_percent_size(cash, sizing.fixed_percent, price).shares,
            },
            _ => sizing::fixed_percent_size(cash, sizing.fixed_percent, price).shares,
        }
    }

    fn entry_fill_price(&self, price: f64, is_short: bool) -> f64 {
        // Slippage always works against the trader.
        if is_short {
            price * (1.0 - self.config.slippage_rate)
        } else {
            price * (1.0 + self.config.slippage_rate)
        }
    }

    fn exit_fill_price(&self, price: f64, is_short: bool) -> f64 {
        if is_short {
            price * (1.0 + self.config.slippage_rate)
        } else {
            price * (1.0 - self.config.slippage_rate)
        }
    }

    fn close_position(
        &self,
        position: &OpenPosition,
        raw_price: f64,
        date: DateTime<Utc>,
        cash: &mut f64,
        trades: &mut Vec<Trade>,
    ) {
        let is_short = position.direction == PositionDirection::Short;
        let exit_price = self.exit_fill_price(raw_price, is_short);
        let notional = position.shares * exit_price;
        let commission = notional * self.config.commission_rate;

        let gross = match position.direction {
            PositionDirection::Long => (exit_price - position.entry_price) * position.shares,
            PositionDirection::Short => (position.entry_price - exit_price) * position.shares,
        };
        let realized_pnl = gross - commission - position.entry_commission;

        match position.direction {
            PositionDirection::Long => *cash += notional - commission,
            PositionDirection::Short => *cash -= notional + commission,
        }

        trades.push(Trade {
            id: Uuid::new_v4().to_string(),
            symbol: position.symbol.clone(),
            side: if is_short {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            },
            shares: position.shares,
            price: round2(exit_price),
            commission: round2(commission),
            date,
            realized_pnl: Some(round2(realized_pnl)),
        });
    }
}

/// Stop checked before target: when one candle's range could trigger both,
/// the stop wins.
fn breach_exit_price(position: &OpenPosition, candle: &Candle) -> Option<f64> {
    match position.direction {
        PositionDirection::Long => {
            if let Some(stop) = position.stop_loss {
                if candle.low <= stop {
                    return Some(stop);
                }
            }
            if let Some(target) = position.target_price {
                if candle.high >= target {
                    return Some(target);
                }
            }
            None
        }
        PositionDirection::Short => {
            if let Some(stop) = position.stop_loss {
                if candle.high >= stop {
                    return Some(stop);
                }
            }
            if let Some(target) = position.target_price {
                if candle.low <= target {
                    return Some(target);
                }
            }
            None
        }
    }
}

/// Win rate and average win/loss ratio over the realized fills so far.
/// Kelly sizing needs a minimum sample before it is trusted.
fn realized_trade_stats(trades: &[Trade]) -> Option<(f64, f64)> {
    const MIN_SAMPLE: usize = 5;

    let pnls: Vec<f64> = trades.iter().filter_map(|t| t.realized_pnl).collect();
    if pnls.len() < MIN_SAMPLE {
        return None;
    }

    let wins: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = pnls.iter().copied().filter(|&p| p < 0.0).collect();
    if losses.is_empty() {
        return None;
    }

    let win_rate = wins.len() as f64 / pnls.len() as f64;
    let avg_win = if wins.is_empty() {
        0.0
    } else {
        wins.iter().sum::<f64>() / wins.len() as f64
    };
    let avg_loss = losses.iter().map(|p| p.abs()).sum::<f64>() / losses.len() as f64;
    if avg_loss <= 0.0 {
        return None;
    }

    Some((win_rate, avg_win / avg_loss))
}
