use std::collections::HashMap;

use chrono::Utc;
use log::warn;
use rayon::prelude::*;

use crate::errors::EngineError;
use crate::indicators::{self, MarketCondition, Outlook, TrendDirection, TrendStrength};
use crate::models::{
    round2, Candle, IndicatorSnapshot, Recommendation, RiskLevel, RiskScore, Series, Signal,
    SignalType,
};
use crate::risk::{calculate_risk_score, RISK_PERIOD};

/// Hard minimum history for a full analysis. Below this the generator
/// fails loudly instead of producing a low-information signal.
pub const MIN_CANDLES: usize = 50;

pub const BUY_THRESHOLD: f64 = 40.0;
pub const SELL_THRESHOLD: f64 = -40.0;

const WEIGHT_RSI: f64 = 10.0;
const WEIGHT_MACD: f64 = 15.0;
const WEIGHT_BOLLINGER: f64 = 10.0;
const WEIGHT_ADX: f64 = 15.0;
const WEIGHT_STOCHASTIC: f64 = 10.0;
const WEIGHT_VWAP: f64 = 5.0;
const WEIGHT_SUPER_TREND: f64 = 10.0;
const WEIGHT_ICHIMOKU: f64 = 10.0;
const WEIGHT_PSAR: f64 = 5.0;
const WEIGHT_VOLUME: f64 = 5.0;
const WEIGHT_RISK: f64 = 5.0;

const ATR_STOP_MULTIPLIER: f64 = 2.0;
const ATR_TARGET_MULTIPLIER_LOW_RISK: f64 = 3.0;
const ATR_TARGET_MULTIPLIER: f64 = 2.5;
const SELL_TARGET_PERCENT: f64 = 0.06;
const SELL_STOP_PERCENT: f64 = 0.04;

/// Analyze one symbol's series into a trading signal.
///
/// Errors only on insufficient history; every downstream indicator handles
/// short windows with its own neutral default.
pub fn generate_signal(symbol: &str, series: &Series) -> Result<Signal, EngineError> {
    if series.len() < MIN_CANDLES {
        return Err(EngineError::InsufficientHistory {
            symbol: symbol.to_string(),
            available: series.len(),
            required: MIN_CANDLES,
        });
    }

    let closes = series.closes();
    let highs = series.highs();
    let lows = series.lows();
    let volumes = series.volumes();

    let snapshot = IndicatorSnapshot {
        rsi: indicators::calculate_rsi(closes, indicators::RSI_PERIOD),
        macd: indicators::calculate_macd(
            closes,
            indicators::MACD_FAST,
            indicators::MACD_SLOW,
            indicators::MACD_SIGNAL,
        ),
        bollinger: indicators::calculate_bollinger(
            closes,
            indicators::BOLLINGER_PERIOD,
            indicators::BOLLINGER_STD_DEV,
        ),
        adx: indicators::calculate_adx(highs, lows, closes, indicators::ADX_PERIOD),
        atr: indicators::calculate_atr(highs, lows, closes, indicators::ATR_PERIOD),
        stochastic: indicators::calculate_stochastic(
            highs,
            lows,
            closes,
            indicators::STOCHASTIC_K,
            indicators::STOCHASTIC_D,
        ),
        vwap: indicators::calculate_vwap(highs, lows, closes, volumes),
        super_trend: indicators::calculate_super_trend(
            highs,
            lows,
            closes,
            indicators::SUPER_TREND_PERIOD,
            indicators::SUPER_TREND_MULTIPLIER,
        ),
        ichimoku: indicators::calculate_ichimoku(highs, lows, closes),
        psar: indicators::calculate_psar(
            highs,
            lows,
            indicators::PSAR_ACCELERATION,
            indicators::PSAR_MAX_ACCELERATION,
        ),
        volume_ratio: indicators::calculate_volume_ratio(volumes, RISK_PERIOD),
    };

    let risk = calculate_risk_score(closes, volumes, RISK_PERIOD);
    let entry_price = closes[closes.len() - 1];
    let last_change = entry_price - closes[closes.len() - 2];

    let (score, reasons) = score_snapshot(&snapshot, &risk, entry_price, last_change);

    let signal_type = if score > BUY_THRESHOLD {
        SignalType::Buy
    } else if score < SELL_THRESHOLD {
        SignalType::Sell
    } else {
        SignalType::Hold
    };
    let confidence = round2(score.abs().min(100.0));

    let (target_price, stop_loss, risk_reward) = match signal_type {
        SignalType::Buy => buy_levels(entry_price, snapshot.atr.atr, risk.level),
        SignalType::Sell => sell_levels(entry_price),
        SignalType::Hold => (None, None, None),
    };

    let recommendation = build_recommendation(signal_type, confidence, risk.level, snapshot.adx.adx);

    Ok(Signal {
        symbol: symbol.to_string(),
        signal_type,
        confidence,
        entry_price: round2(entry_price),
        target_price,
        stop_loss,
        risk_reward,
        reasons,
        risk,
        indicators: snapshot,
        recommendation,
        date: series.last_date().unwrap_or_else(Utc::now),
    })
}

/// Run the full analysis per symbol in parallel. Symbols with insufficient
/// history are logged and skipped, not fatal to the sweep.
pub fn analyze_symbols(candles_by_symbol: HashMap<String, Vec<Candle>>) -> Vec<Signal> {
    let mut signals: Vec<Signal> = candles_by_symbol
        .into_par_iter()
        .filter_map(|(symbol, candles)| {
            let series = Series::from_candles(candles);
            match generate_signal(&symbol, &series) {
                Ok(signal) => Some(signal),
                Err(error) => {
                    warn!("Skipping {}: {}", symbol, error);
                    None
                }
            }
        })
        .collect();
    signals.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    signals
}

fn push_factor(score: &mut f64, reasons: &mut Vec<String>, contribution: f64, reason: String) {
    *score += contribution;
    reasons.push(reason);
}

/// Weighted sum of directional votes, one reason per factor in fixed
/// evaluation order. The result lands in roughly [-100, 100].
fn score_snapshot(
    snapshot: &IndicatorSnapshot,
    risk: &RiskScore,
    price: f64,
    last_change: f64,
) -> (f64, Vec<String>) {
    let mut score = 0.0;
    let mut reasons = Vec::with_capacity(11);

    // RSI
    let rsi = snapshot.rsi;
    let (vote, reason) = if rsi < 30.0 {
        (1.0, format!("RSI oversold at {:.2}", rsi))
    } else if rsi < 45.0 {
        (0.5, format!("RSI leaning bullish at {:.2}", rsi))
    } else if rsi > 70.0 {
        (-1.0, format!("RSI overbought at {:.2}", rsi))
    } else if rsi > 55.0 {
        (-0.5, format!("RSI leaning bearish at {:.2}", rsi))
    } else {
        (0.0, format!("RSI neutral at {:.2}", rsi))
    };
    push_factor(&mut score, &mut reasons, vote * WEIGHT_RSI, reason);

    // MACD
    let macd = &snapshot.macd;
    let (vote, reason) = if macd.histogram > 0.0 {
        let strength = if macd.macd > 0.0 { 1.0 } else { 0.6 };
        (
            strength,
            format!("MACD bullish crossover (histogram {:.2})", macd.histogram),
        )
    } else if macd.histogram < 0.0 {
        let strength = if macd.macd < 0.0 { 1.0 } else { 0.6 };
        (
            -strength,
            format!("MACD bearish crossover (histogram {:.2})", macd.histogram),
        )
    } else {
        (0.0, "MACD flat".to_string())
    };
    push_factor(&mut score, &mut reasons, vote * WEIGHT_MACD, reason);

    // Bollinger bands
    let bb = &snapshot.bollinger;
    let (vote, reason) = if bb.percent_b <= 0.0 {
        (
            1.0,
            format!("Price below lower Bollinger band (%B {:.3})", bb.percent_b),
        )
    } else if bb.percent_b < 0.2 {
        (
            0.7,
            format!("Price near lower Bollinger band (%B {:.3})", bb.percent_b),
        )
    } else if bb.percent_b >= 1.0 {
        (
            -1.0,
            format!("Price above upper Bollinger band (%B {:.3})", bb.percent_b),
        )
    } else if bb.percent_b > 0.8 {
        (
            -0.7,
            format!("Price near upper Bollinger band (%B {:.3})", bb.percent_b),
        )
    } else {
        (
            0.0,
            format!("Price inside Bollinger bands (%B {:.3})", bb.percent_b),
        )
    };
    push_factor(&mut score, &mut reasons, vote * WEIGHT_BOLLINGER, reason);

    // ADX
    let adx = &snapshot.adx;
    let (vote, reason) = if adx.trend_strength == TrendStrength::Weak {
        (0.0, format!("ADX {:.2} shows no meaningful trend", adx.adx))
    } else {
        let direction = if adx.plus_di > adx.minus_di { 1.0 } else { -1.0 };
        let strength = (adx.adx / 50.0).min(1.0);
        let label = if direction > 0.0 { "uptrend" } else { "downtrend" };
        (
            direction * strength,
            format!(
                "ADX {:.2} confirms {} (+DI {:.2}, -DI {:.2})",
                adx.adx, label, adx.plus_di, adx.minus_di
            ),
        )
    };
    push_factor(&mut score, &mut reasons, vote * WEIGHT_ADX, reason);

    // Stochastic
    let stoch = &snapshot.stochastic;
    let (vote, reason) = match stoch.condition {
        MarketCondition::Oversold => (
            1.0,
            format!("Stochastic oversold (%K {:.2}, %D {:.2})", stoch.k, stoch.d),
        ),
        MarketCondition::Overbought => (
            -1.0,
            format!(
                "Stochastic overbought (%K {:.2}, %D {:.2})",
                stoch.k, stoch.d
            ),
        ),
        MarketCondition::Neutral => (
            0.0,
            format!("Stochastic neutral (%K {:.2}, %D {:.2})", stoch.k, stoch.d),
        ),
    };
    push_factor(&mut score, &mut reasons, vote * WEIGHT_STOCHASTIC, reason);

    // VWAP
    let vwap = snapshot.vwap.value;
    let (vote, reason) = if vwap > 0.0 && price != vwap {
        let deviation = (price - vwap) / vwap * 100.0;
        let strength = (deviation.abs() / 2.0).min(1.0);
        if deviation > 0.0 {
            (
                strength,
                format!("Price {:.2}% above VWAP {:.2}", deviation, vwap),
            )
        } else {
            (
                -strength,
                format!("Price {:.2}% below VWAP {:.2}", deviation.abs(), vwap),
            )
        }
    } else {
        (0.0, format!("Price at VWAP {:.2}", vwap))
    };
    push_factor(&mut score, &mut reasons, vote * WEIGHT_VWAP, reason);

    // SuperTrend
    let (vote, reason) = match snapshot.super_trend.direction {
        TrendDirection::Up => (
            1.0,
            format!("SuperTrend uptrend (stop {:.2})", snapshot.super_trend.value),
        ),
        TrendDirection::Down => (
            -1.0,
            format!(
                "SuperTrend downtrend (stop {:.2})",
                snapshot.super_trend.value
            ),
        ),
    };
    push_factor(&mut score, &mut reasons, vote * WEIGHT_SUPER_TREND, reason);

    // Ichimoku
    let (vote, reason) = match snapshot.ichimoku.outlook {
        Outlook::Bullish => (
            1.0,
            "Price above Ichimoku cloud with Tenkan over Kijun".to_string(),
        ),
        Outlook::Bearish => (
            -1.0,
            "Price below Ichimoku cloud with Tenkan under Kijun".to_string(),
        ),
        Outlook::Neutral => (0.0, "Price inside Ichimoku cloud".to_string()),
    };
    push_factor(&mut score, &mut reasons, vote * WEIGHT_ICHIMOKU, reason);

    // Parabolic SAR
    let (vote, reason) = match snapshot.psar.trend {
        TrendDirection::Up => (
            0.8,
            format!("Parabolic SAR below price at {:.2}", snapshot.psar.sar),
        ),
        TrendDirection::Down => (
            -0.8,
            format!("Parabolic SAR above price at {:.2}", snapshot.psar.sar),
        ),
    };
    push_factor(&mut score, &mut reasons, vote * WEIGHT_PSAR, reason);

    // Volume
    let volume_ratio = snapshot.volume_ratio;
    let (vote, reason) = if volume_ratio > 1.2 && last_change != 0.0 {
        let direction = if last_change > 0.0 { 1.0 } else { -1.0 };
        let strength = (volume_ratio - 1.0).min(1.0);
        let label = if direction > 0.0 { "advance" } else { "decline" };
        (
            direction * strength,
            format!("Volume {:.2}x average confirms {}", volume_ratio, label),
        )
    } else {
        (
            0.0,
            format!("Volume {:.2}x average, no confirmation", volume_ratio),
        )
    };
    push_factor(&mut score, &mut reasons, vote * WEIGHT_VOLUME, reason);

    // Risk adjustment: dampens the running score toward zero, never flips it.
    let (adjustment, reason) = if score != 0.0 {
        (
            -score.signum() * (risk.score / 100.0) * WEIGHT_RISK,
            format!(
                "Risk {} ({:.2}) dampens confidence",
                risk.level.as_str(),
                risk.score
            ),
        )
    } else {
        (
            0.0,
            format!("Risk {} ({:.2})", risk.level.as_str(), risk.score),
        )
    };
    push_factor(&mut score, &mut reasons, adjustment, reason);

    (score, reasons)
}

/// ATR-based levels for a long entry. The target multiplier tightens from
/// 3x to 2.5x ATR whenever risk is anything but LOW.
fn buy_levels(
    entry_price: f64,
    atr: f64,
    risk_level: RiskLevel,
) -> (Option<f64>, Option<f64>, Option<f64>) {
    if atr <= 0.0 {
        // Flat tape: fall back to the fixed percentages so a BUY always
        // carries actionable levels.
        let target = round2(entry_price * (1.0 + SELL_TARGET_PERCENT));
        let stop = round2(entry_price * (1.0 - SELL_STOP_PERCENT));
        let risk_reward = round2(SELL_TARGET_PERCENT / SELL_STOP_PERCENT);
        return (Some(target), Some(stop), Some(risk_reward));
    }

    let stop = round2(entry_price - ATR_STOP_MULTIPLIER * atr);
    let target_multiplier = if risk_level == RiskLevel::Low {
        ATR_TARGET_MULTIPLIER_LOW_RISK
    } else {
        ATR_TARGET_MULTIPLIER
    };
    let target = round2(entry_price + target_multiplier * atr);

    let potential_loss = entry_price - stop;
    let risk_reward = if potential_loss > 0.0 {
        round2((target - entry_price) / potential_loss)
    } else {
        0.0
    };

    (Some(target), Some(stop), Some(risk_reward))
}

/// Fixed-percentage levels for a short entry. Intentionally asymmetric
/// with the ATR-based BUY path.
fn sell_levels(entry_price: f64) -> (Option<f64>, Option<f64>, Option<f64>) {
    let target = round2(entry_price * (1.0 - SELL_TARGET_PERCENT));
    let stop = round2(entry_price * (1.0 + SELL_STOP_PERCENT));
    let risk_reward = round2(SELL_TARGET_PERCENT / SELL_STOP_PERCENT);
    (Some(target), Some(stop), Some(risk_reward))
}

/// Fixed decision table over (signal type, confidence magnitude, risk
/// level, ADX). Pure function of its four inputs.
pub fn build_recommendation(
    signal_type: SignalType,
    confidence: f64,
    risk_level: RiskLevel,
    adx: f64,
) -> Recommendation {
    match signal_type {
        SignalType::Buy if confidence >= 70.0 => Recommendation {
            strategy: "Strong Buy".to_string(),
            description: if adx >= 30.0 {
                "Momentum entry backed by a strong trend".to_string()
            } else {
                "Momentum entry; trend still developing".to_string()
            },
            position_size: match risk_level {
                RiskLevel::Low => "large".to_string(),
                RiskLevel::Medium => "moderate".to_string(),
                RiskLevel::High => "small".to_string(),
                RiskLevel::Extreme => "minimal".to_string(),
            },
            holding_period: "2-4 weeks".to_string(),
        },
        SignalType::Buy => Recommendation {
            strategy: "Accumulate".to_string(),
            description: "Scale in on weakness; conviction is moderate".to_string(),
            position_size: match risk_level {
                RiskLevel::Low => "moderate".to_string(),
                RiskLevel::Medium => "small".to_string(),
                RiskLevel::High | RiskLevel::Extreme => "minimal".to_string(),
            },
            holding_period: "1-3 weeks".to_string(),
        },
        SignalType::Sell if confidence >= 70.0 => Recommendation {
            strategy: "Strong Sell".to_string(),
            description: "Exit longs; momentum is firmly negative".to_string(),
            position_size: "exit full position".to_string(),
            holding_period: "immediate".to_string(),
        },
        SignalType::Sell => Recommendation {
            strategy: "Reduce".to_string(),
            description: "Trim exposure into strength".to_string(),
            position_size: "reduce by half".to_string(),
            holding_period: "within 1 week".to_string(),
        },
        SignalType::Hold => {
            if adx >= 30.0 {
                Recommendation {
                    strategy: "Wait".to_string(),
                    description: "Strong trend but mixed signals; wait for a cleaner setup"
                        .to_string(),
                    position_size: "none".to_string(),
                    holding_period: "n/a".to_string(),
                }
            } else {
                Recommendation {
                    strategy: "Range-Bound".to_string(),
                    description: "No directional edge; stay flat".to_string(),
                    position_size: "none".to_string(),
                    holding_period: "n/a".to_string(),
                }
            }
        }
    }
}
