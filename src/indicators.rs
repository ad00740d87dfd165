use serde::{Deserialize, Serialize};

use crate::models::{round2, round3};

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD_DEV: f64 = 2.0;
pub const ADX_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const STOCHASTIC_K: usize = 14;
pub const STOCHASTIC_D: usize = 3;
pub const SUPER_TREND_PERIOD: usize = 10;
pub const SUPER_TREND_MULTIPLIER: f64 = 3.0;
pub const PSAR_ACCELERATION: f64 = 0.02;
pub const PSAR_MAX_ACCELERATION: f64 = 0.2;

pub fn calculate_sma(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    if period <= 1 || values.len() < period {
        return values.to_vec();
    }

    let mut sma_values = Vec::with_capacity(values.len());
    for _ in 0..period - 1 {
        sma_values.push(values[0]);
    }

    let mut window_sum: f64 = values[..period].iter().sum();
    sma_values.push(window_sum / period as f64);
    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        sma_values.push(window_sum / period as f64);
    }

    sma_values
}

pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    // Seeded with the first value, no warm-up discard.
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema_values = Vec::with_capacity(values.len());
    ema_values.push(values[0]);

    for i in 1..values.len() {
        let ema = (values[i] * multiplier) + (ema_values[i - 1] * (1.0 - multiplier));
        ema_values.push(ema);
    }

    ema_values
}

/// Relative Strength Index with Wilder's smoothing.
///
/// Returns a neutral 50 when fewer than `period + 1` closes are supplied,
/// and 100 when the smoothed average loss is exactly zero. A constant
/// series lands on the zero-loss path; there is no division by zero.
pub fn calculate_rsi(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return 50.0;
    }

    let mut sum_gain = 0.0f64;
    let mut sum_loss = 0.0f64;
    for i in 1..=period {
        let delta = closes[i] - closes[i - 1];
        if delta >= 0.0 {
            sum_gain += delta;
        } else {
            sum_loss += -delta;
        }
    }

    let mut avg_gain = sum_gain / period as f64;
    let mut avg_loss = sum_loss / period as f64;

    for i in (period + 1)..closes.len() {
        let delta = closes[i] - closes[i - 1];
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { -delta } else { 0.0 };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    round2(100.0 - 100.0 / (1.0 + rs))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacdResult {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdResult {
    fn zero() -> Self {
        Self {
            macd: 0.0,
            signal: 0.0,
            histogram: 0.0,
        }
    }
}

pub fn calculate_macd(
    closes: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> MacdResult {
    if closes.len() < slow_period {
        return MacdResult::zero();
    }

    let fast_ema = calculate_ema(closes, fast_period);
    let slow_ema = calculate_ema(closes, slow_period);

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(fast, slow)| fast - slow)
        .collect();
    let signal_line = calculate_ema(&macd_line, signal_period);

    let macd = *macd_line.last().expect("macd line is non-empty");
    let signal = *signal_line.last().expect("signal line is non-empty");

    MacdResult {
        macd: round2(macd),
        signal: round2(signal),
        histogram: round2(macd - signal),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub percent_b: f64,
    pub bandwidth: f64,
}

pub fn calculate_bollinger(closes: &[f64], period: usize, std_dev: f64) -> BollingerResult {
    if period == 0 || closes.len() < period {
        return BollingerResult {
            upper: 0.0,
            middle: 0.0,
            lower: 0.0,
            percent_b: 0.5,
            bandwidth: 0.0,
        };
    }

    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / period as f64;
    let standard_deviation = variance.sqrt();

    let upper = mean + std_dev * standard_deviation;
    let lower = mean - std_dev * standard_deviation;
    let price = *closes.last().expect("window is non-empty");

    let percent_b = if upper - lower > 0.0 {
        (price - lower) / (upper - lower)
    } else {
        0.5
    };
    let bandwidth = if mean != 0.0 {
        (upper - lower) / mean * 100.0
    } else {
        0.0
    };

    BollingerResult {
        upper: round2(upper),
        middle: round2(mean),
        lower: round2(lower),
        percent_b: round3(percent_b),
        bandwidth: round2(bandwidth),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl TrendStrength {
    pub fn from_adx(adx: f64) -> Self {
        if adx < 20.0 {
            TrendStrength::Weak
        } else if adx < 30.0 {
            TrendStrength::Moderate
        } else if adx < 50.0 {
            TrendStrength::Strong
        } else {
            TrendStrength::VeryStrong
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdxResult {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub trend_strength: TrendStrength,
}

impl AdxResult {
    fn neutral() -> Self {
        Self {
            adx: 0.0,
            plus_di: 0.0,
            minus_di: 0.0,
            trend_strength: TrendStrength::Weak,
        }
    }
}

/// Classic Wilder directional movement. Smoothed +DM/-DM are normalized by
/// the smoothed True Range into the DI pair, and ADX is the Wilder average
/// of the resulting DX series.
pub fn calculate_adx(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> AdxResult {
    let n = closes.len();
    if period == 0 || n < 2 * period + 1 {
        return AdxResult::neutral();
    }

    let mut tr_values = Vec::with_capacity(n - 1);
    let mut dm_plus_values = Vec::with_capacity(n - 1);
    let mut dm_minus_values = Vec::with_capacity(n - 1);

    for i in 1..n {
        let tr = (highs[i] - lows[i])
            .max((highs[i] - closes[i - 1]).abs())
            .max((lows[i] - closes[i - 1]).abs());
        tr_values.push(tr);

        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];

        dm_plus_values.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        dm_minus_values.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
    }

    // Wilder smoothing: seed with the first `period` sums, then
    // smoothed = prev - prev/period + current.
    let mut smooth_tr: f64 = tr_values[..period].iter().sum();
    let mut smooth_dm_plus: f64 = dm_plus_values[..period].iter().sum();
    let mut smooth_dm_minus: f64 = dm_minus_values[..period].iter().sum();

    let mut dx_values = Vec::new();
    let mut plus_di = 0.0;
    let mut minus_di = 0.0;

    for i in period - 1..tr_values.len() {
        if i >= period {
            smooth_tr = smooth_tr - smooth_tr / period as f64 + tr_values[i];
            smooth_dm_plus = smooth_dm_plus - smooth_dm_plus / period as f64 + dm_plus_values[i];
            smooth_dm_minus = smooth_dm_minus - smooth_dm_minus / period as f64 + dm_minus_values[i];
        }

        plus_di = if smooth_tr > 0.0 {
            smooth_dm_plus / smooth_tr * 100.0
        } else {
            0.0
        };
        minus_di = if smooth_tr > 0.0 {
            smooth_dm_minus / smooth_tr * 100.0
        } else {
            0.0
        };

        let di_sum = plus_di + minus_di;
        dx_values.push(if di_sum > 0.0 {
            (plus_di - minus_di).abs() / di_sum * 100.0
        } else {
            0.0
        });
    }

    let mut adx = dx_values[..period].iter().sum::<f64>() / period as f64;
    for &dx in &dx_values[period..] {
        adx = (adx * (period as f64 - 1.0) + dx) / period as f64;
    }

    AdxResult {
        adx: round2(adx),
        plus_di: round2(plus_di),
        minus_di: round2(minus_di),
        trend_strength: TrendStrength::from_adx(adx),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtrResult {
    pub atr: f64,
    pub atr_percent: f64,
}

/// Wilder-smoothed Average True Range. Returns zeros when fewer than
/// `period + 1` candles are supplied.
pub fn calculate_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> AtrResult {
    let n = closes.len();
    if period == 0 || n < period + 1 {
        return AtrResult {
            atr: 0.0,
            atr_percent: 0.0,
        };
    }

    let mut atr = 0.0f64;
    let mut tr_sum = 0.0f64;
    for i in 1..n {
        let tr = (highs[i] - lows[i])
            .max((highs[i] - closes[i - 1]).abs())
            .max((lows[i] - closes[i - 1]).abs());
        if i <= period {
            tr_sum += tr;
            if i == period {
                atr = tr_sum / period as f64;
            }
        } else {
            atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
        }
    }

    let last_close = closes[n - 1];
    let atr_percent = if last_close > 0.0 {
        atr / last_close * 100.0
    } else {
        0.0
    };

    AtrResult {
        atr: round2(atr),
        atr_percent: round2(atr_percent),
    }
}

/// ATR-based protective stop: below the entry for longs, above for shorts.
pub fn atr_stop_loss(entry_price: f64, atr: f64, multiplier: f64, is_short: bool) -> f64 {
    if is_short {
        round2(entry_price + multiplier * atr)
    } else {
        round2(entry_price - multiplier * atr)
    }
}

/// Shares such that a stop `multiplier * atr` away risks `risk_amount`.
pub fn atr_share_size(risk_amount: f64, atr: f64, multiplier: f64) -> f64 {
    let stop_distance = atr * multiplier;
    if stop_distance <= 0.0 || risk_amount <= 0.0 {
        return 0.0;
    }
    (risk_amount / stop_distance).floor()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketCondition {
    Overbought,
    Oversold,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StochasticResult {
    pub k: f64,
    pub d: f64,
    pub condition: MarketCondition,
}

pub fn calculate_stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> StochasticResult {
    let n = closes.len();
    if k_period == 0 || d_period == 0 || n < k_period {
        return StochasticResult {
            k: 50.0,
            d: 50.0,
            condition: MarketCondition::Neutral,
        };
    }

    let mut k_values = Vec::new();
    for i in k_period - 1..n {
        let window_start = i + 1 - k_period;
        let highest = highs[window_start..=i]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let lowest = lows[window_start..=i]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let k = if highest - lowest > 0.0 {
            (closes[i] - lowest) / (highest - lowest) * 100.0
        } else {
            50.0
        };
        k_values.push(k);
    }

    let k = *k_values.last().expect("k series is non-empty");
    let d_window = d_period.min(k_values.len());
    let d = k_values[k_values.len() - d_window..].iter().sum::<f64>() / d_window as f64;

    let condition = if k > 80.0 && d > 80.0 {
        MarketCondition::Overbought
    } else if k < 20.0 && d < 20.0 {
        MarketCondition::Oversold
    } else {
        MarketCondition::Neutral
    };

    StochasticResult {
        k: round2(k),
        d: round2(d),
        condition,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VwapResult {
    pub value: f64,
}

/// Volume-weighted average price over the whole supplied window. Callers
/// control the anchor by slicing their input.
pub fn calculate_vwap(highs: &[f64], lows: &[f64], closes: &[f64], volumes: &[f64]) -> VwapResult {
    let n = closes.len();
    if n == 0 {
        return VwapResult { value: 0.0 };
    }

    let mut cumulative_pv = 0.0;
    let mut cumulative_volume = 0.0;
    for i in 0..n {
        let typical_price = (highs[i] + lows[i] + closes[i]) / 3.0;
        cumulative_pv += typical_price * volumes[i];
        cumulative_volume += volumes[i];
    }

    let value = if cumulative_volume > 0.0 {
        cumulative_pv / cumulative_volume
    } else {
        (highs[n - 1] + lows[n - 1] + closes[n - 1]) / 3.0
    };

    VwapResult {
        value: round2(value),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperTrendResult {
    pub value: f64,
    pub direction: TrendDirection,
}

pub fn calculate_super_trend(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
    multiplier: f64,
) -> SuperTrendResult {
    let n = closes.len();
    if period == 0 || n < period + 1 {
        return SuperTrendResult {
            value: 0.0,
            direction: TrendDirection::Up,
        };
    }

    // Running Wilder ATR aligned to candle indices.
    let mut atr = 0.0f64;
    let mut tr_sum = 0.0f64;
    let mut value = 0.0f64;
    let mut direction = 1i32;
    let mut have_bands = false;

    for i in 1..n {
        let tr = (highs[i] - lows[i])
            .max((highs[i] - closes[i - 1]).abs())
            .max((lows[i] - closes[i - 1]).abs());
        if i <= period {
            tr_sum += tr;
            if i == period {
                atr = tr_sum / period as f64;
            } else {
                continue;
            }
        } else {
            atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
        }

        let median_price = (highs[i] + lows[i]) / 2.0;
        let mut upper_band = median_price + multiplier * atr;
        let mut lower_band = median_price - multiplier * atr;

        if have_bands {
            if direction == 1 {
                lower_band = lower_band.max(value);
            } else {
                upper_band = upper_band.min(value);
            }

            if direction == 1 && closes[i] < value {
                direction = -1;
                value = upper_band;
            } else if direction == -1 && closes[i] > value {
                direction = 1;
                value = lower_band;
            } else {
                value = if direction == 1 { lower_band } else { upper_band };
            }
        } else {
            direction = 1;
            value = lower_band;
            have_bands = true;
        }
    }

    SuperTrendResult {
        value: round2(value),
        direction: if direction == 1 {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IchimokuResult {
    pub tenkan: f64,
    pub kijun: f64,
    pub senkou_a: f64,
    pub senkou_b: f64,
    pub chikou: f64,
    pub outlook: Outlook,
}

fn midpoint_of_range(highs: &[f64], lows: &[f64], window: usize) -> f64 {
    let start = highs.len() - window;
    let highest = highs[start..].iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lowest = lows[start..].iter().copied().fold(f64::INFINITY, f64::min);
    (highest + lowest) / 2.0
}

/// Standard 9/26/52 Ichimoku. Requires at least 52 candles; shorter input
/// yields the all-zero neutral result.
pub fn calculate_ichimoku(highs: &[f64], lows: &[f64], closes: &[f64]) -> IchimokuResult {
    let n = closes.len();
    if n < 52 {
        return IchimokuResult {
            tenkan: 0.0,
            kijun: 0.0,
            senkou_a: 0.0,
            senkou_b: 0.0,
            chikou: 0.0,
            outlook: Outlook::Neutral,
        };
    }

    let tenkan = midpoint_of_range(highs, lows, 9);
    let kijun = midpoint_of_range(highs, lows, 26);
    let senkou_a = (tenkan + kijun) / 2.0;
    let senkou_b = midpoint_of_range(highs, lows, 52);
    let price = closes[n - 1];

    let outlook = if price > senkou_a && price > senkou_b && tenkan > kijun {
        Outlook::Bullish
    } else if price < senkou_a && price < senkou_b && tenkan < kijun {
        Outlook::Bearish
    } else {
        Outlook::Neutral
    };

    IchimokuResult {
        tenkan: round2(tenkan),
        kijun: round2(kijun),
        senkou_a: round2(senkou_a),
        senkou_b: round2(senkou_b),
        chikou: round2(price),
        outlook,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PsarResult {
    pub sar: f64,
    pub trend: TrendDirection,
}

/// Classic Parabolic SAR: extreme-point/acceleration-factor recurrence with
/// reversal when the stop is breached by the current candle's range.
pub fn calculate_psar(highs: &[f64], lows: &[f64], acceleration: f64, max_acceleration: f64) -> PsarResult {
    let n = highs.len();
    if n < 2 {
        return PsarResult {
            sar: 0.0,
            trend: TrendDirection::Up,
        };
    }

    let mut is_up = highs[1] >= highs[0];
    let mut sar = if is_up { lows[0] } else { highs[0] };
    let mut extreme = if is_up { highs[0] } else { lows[0] };
    let mut af = acceleration;

    for i in 1..n {
        sar += af * (extreme - sar);

        if is_up {
            // Never place the stop above the prior two lows.
            sar = sar.min(lows[i - 1]);
            if i >= 2 {
                sar = sar.min(lows[i - 2]);
            }
            if lows[i] < sar {
                is_up = false;
                sar = extreme;
                extreme = lows[i];
                af = acceleration;
            } else if highs[i] > extreme {
                extreme = highs[i];
                af = (af + acceleration).min(max_acceleration);
            }
        } else {
            sar = sar.max(highs[i - 1]);
            if i >= 2 {
                sar = sar.max(highs[i - 2]);
            }
            if highs[i] > sar {
                is_up = true;
                sar = extreme;
                extreme = highs[i];
                af = acceleration;
            } else if lows[i] < extreme {
                extreme = lows[i];
                af = (af + acceleration).min(max_acceleration);
            }
        }
    }

    PsarResult {
        sar: round2(sar),
        trend: if is_up {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        },
    }
}

/// Current volume relative to the trailing `period` average (current candle
/// excluded). Returns 1.0 when there is not enough history for a contrast.
pub fn calculate_volume_ratio(volumes: &[f64], period: usize) -> f64 {
    let n = volumes.len();
    if period == 0 || n < period + 1 {
        return 1.0;
    }

    let avg = volumes[n - 1 - period..n - 1].iter().sum::<f64>() / period as f64;
    if avg <= 0.0 {
        return 1.0;
    }
    round2(volumes[n - 1] / avg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(start: f64, step: f64, len: usize) -> Vec<f64> {
        (0..len).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn rsi_neutral_on_short_series() {
        assert_eq!(calculate_rsi(&[100.0, 101.0, 102.0], 14), 50.0);
    }

    #[test]
    fn rsi_returns_100_when_losses_are_zero() {
        // Constant series: zero gains AND zero losses takes the zero-loss
        // path, by contract, rather than a naive neutral 50.
        let flat = vec![100.0; 30];
        assert_eq!(calculate_rsi(&flat, 14), 100.0);

        let rising = ramp(100.0, 1.0, 30);
        assert_eq!(calculate_rsi(&rising, 14), 100.0);
    }

    #[test]
    fn rsi_stays_within_bounds() {
        let mut prices = ramp(100.0, 1.0, 20);
        prices.extend(ramp(120.0, -2.0, 20));
        let rsi = calculate_rsi(&prices, 14);
        assert!((0.0..=100.0).contains(&rsi), "rsi out of range: {rsi}");
        assert!(rsi < 50.0, "falling series should read below neutral");
    }

    #[test]
    fn macd_zero_below_slow_period() {
        let prices = ramp(10.0, 0.1, 20);
        let result = calculate_macd(&prices, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        assert_eq!(result.macd, 0.0);
        assert_eq!(result.signal, 0.0);
        assert_eq!(result.histogram, 0.0);
    }

    #[test]
    fn macd_histogram_matches_line_difference() {
        let mut prices = ramp(100.0, 0.5, 40);
        prices.extend(ramp(120.0, -0.7, 30));
        let result = calculate_macd(&prices, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        assert_abs_diff_eq!(
            result.histogram,
            result.macd - result.signal,
            epsilon = 0.011
        );
    }

    #[test]
    fn bollinger_neutral_on_short_series() {
        let result = calculate_bollinger(&[10.0, 11.0], BOLLINGER_PERIOD, BOLLINGER_STD_DEV);
        assert_eq!(result.middle, 0.0);
        assert_eq!(result.percent_b, 0.5);
    }

    #[test]
    fn bollinger_collapsed_bands_report_midpoint() {
        let flat = vec![50.0; 25];
        let result = calculate_bollinger(&flat, BOLLINGER_PERIOD, BOLLINGER_STD_DEV);
        assert_eq!(result.upper, 50.0);
        assert_eq!(result.lower, 50.0);
        assert_eq!(result.percent_b, 0.5);
        assert_eq!(result.bandwidth, 0.0);
    }

    #[test]
    fn bollinger_bands_bracket_the_mean() {
        let prices: Vec<f64> = (0..40)
            .map(|i| 100.0 + if i % 2 == 0 { 2.0 } else { -2.0 })
            .collect();
        let result = calculate_bollinger(&prices, BOLLINGER_PERIOD, BOLLINGER_STD_DEV);
        assert!(result.upper > result.middle);
        assert!(result.lower < result.middle);
        assert_abs_diff_eq!(result.middle, 100.0, epsilon = 0.01);
    }

    #[test]
    fn adx_neutral_on_short_series() {
        let result = calculate_adx(&[1.0, 2.0], &[0.5, 1.5], &[0.8, 1.8], ADX_PERIOD);
        assert_eq!(result.adx, 0.0);
        assert_eq!(result.trend_strength, TrendStrength::Weak);
    }

    #[test]
    fn adx_detects_a_persistent_uptrend() {
        let highs = ramp(101.0, 1.0, 40);
        let lows = ramp(99.0, 1.0, 40);
        let closes = ramp(100.0, 1.0, 40);
        let result = calculate_adx(&highs, &lows, &closes, ADX_PERIOD);
        assert!(result.plus_di > result.minus_di);
        assert!(result.adx > 50.0, "one-way trend should read very strong");
        assert_eq!(result.trend_strength, TrendStrength::VeryStrong);
    }

    #[test]
    fn trend_strength_buckets() {
        assert_eq!(TrendStrength::from_adx(10.0), TrendStrength::Weak);
        assert_eq!(TrendStrength::from_adx(25.0), TrendStrength::Moderate);
        assert_eq!(TrendStrength::from_adx(40.0), TrendStrength::Strong);
        assert_eq!(TrendStrength::from_adx(55.0), TrendStrength::VeryStrong);
    }

    #[test]
    fn atr_on_constant_range_candles() {
        let n = 30;
        let highs = vec![102.0; n];
        let lows = vec![98.0; n];
        let closes = vec![100.0; n];
        let result = calculate_atr(&highs, &lows, &closes, ATR_PERIOD);
        assert_abs_diff_eq!(result.atr, 4.0, epsilon = 0.01);
        assert_abs_diff_eq!(result.atr_percent, 4.0, epsilon = 0.01);
    }

    #[test]
    fn atr_helpers_respect_direction_and_risk() {
        assert_eq!(atr_stop_loss(1000.0, 20.0, 2.0, false), 960.0);
        assert_eq!(atr_stop_loss(1000.0, 20.0, 2.0, true), 1040.0);
        assert_eq!(atr_share_size(1000.0, 20.0, 2.0), 25.0);
        assert_eq!(atr_share_size(1000.0, 0.0, 2.0), 0.0);
    }

    #[test]
    fn stochastic_flags_overbought_at_the_top_of_the_range() {
        let highs = ramp(101.0, 1.0, 30);
        let lows = ramp(99.0, 1.0, 30);
        let closes = ramp(100.9, 1.0, 30);
        let result = calculate_stochastic(&highs, &lows, &closes, STOCHASTIC_K, STOCHASTIC_D);
        assert!(result.k > 80.0);
        assert_eq!(result.condition, MarketCondition::Overbought);
    }

    #[test]
    fn stochastic_neutral_on_flat_range() {
        let result = calculate_stochastic(&[10.0; 20], &[10.0; 20], &[10.0; 20], 14, 3);
        assert_eq!(result.k, 50.0);
        assert_eq!(result.condition, MarketCondition::Neutral);
    }

    #[test]
    fn vwap_weights_by_volume() {
        // Typical prices 10 and 20 with volumes 1 and 3 → 17.5.
        let highs = vec![10.0, 20.0];
        let lows = vec![10.0, 20.0];
        let closes = vec![10.0, 20.0];
        let volumes = vec![1.0, 3.0];
        let result = calculate_vwap(&highs, &lows, &closes, &volumes);
        assert_abs_diff_eq!(result.value, 17.5, epsilon = 0.001);
    }

    #[test]
    fn vwap_zero_volume_falls_back_to_typical_price() {
        let result = calculate_vwap(&[12.0], &[8.0], &[10.0], &[0.0]);
        assert_abs_diff_eq!(result.value, 10.0, epsilon = 0.001);
    }

    #[test]
    fn super_trend_follows_a_rally() {
        let highs = ramp(101.0, 1.0, 40);
        let lows = ramp(99.0, 1.0, 40);
        let closes = ramp(100.0, 1.0, 40);
        let result =
            calculate_super_trend(&highs, &lows, &closes, SUPER_TREND_PERIOD, SUPER_TREND_MULTIPLIER);
        assert_eq!(result.direction, TrendDirection::Up);
        assert!(result.value < *closes.last().unwrap());
    }

    #[test]
    fn super_trend_flips_down_on_a_collapse() {
        let mut highs = ramp(101.0, 1.0, 30);
        let mut lows = ramp(99.0, 1.0, 30);
        let mut closes = ramp(100.0, 1.0, 30);
        highs.extend(ramp(90.0, -3.0, 10));
        lows.extend(ramp(88.0, -3.0, 10));
        closes.extend(ramp(89.0, -3.0, 10));
        let result =
            calculate_super_trend(&highs, &lows, &closes, SUPER_TREND_PERIOD, SUPER_TREND_MULTIPLIER);
        assert_eq!(result.direction, TrendDirection::Down);
    }

    #[test]
    fn ichimoku_neutral_below_52_candles() {
        let highs = ramp(101.0, 1.0, 51);
        let lows = ramp(99.0, 1.0, 51);
        let closes = ramp(100.0, 1.0, 51);
        let result = calculate_ichimoku(&highs, &lows, &closes);
        assert_eq!(result.tenkan, 0.0);
        assert_eq!(result.outlook, Outlook::Neutral);
    }

    #[test]
    fn ichimoku_reads_bullish_in_a_steady_advance() {
        let highs = ramp(101.0, 1.0, 60);
        let lows = ramp(99.0, 1.0, 60);
        let closes = ramp(100.0, 1.0, 60);
        let result = calculate_ichimoku(&highs, &lows, &closes);
        assert_eq!(result.outlook, Outlook::Bullish);
        assert!(result.tenkan > result.kijun);
    }

    #[test]
    fn psar_tracks_trend_direction() {
        let highs = ramp(101.0, 1.0, 30);
        let lows = ramp(99.0, 1.0, 30);
        let up = calculate_psar(&highs, &lows, PSAR_ACCELERATION, PSAR_MAX_ACCELERATION);
        assert_eq!(up.trend, TrendDirection::Up);
        assert!(up.sar < *lows.last().unwrap());

        let falling_highs = ramp(101.0, -1.0, 30);
        let falling_lows = ramp(99.0, -1.0, 30);
        let down = calculate_psar(&falling_highs, &falling_lows, PSAR_ACCELERATION, PSAR_MAX_ACCELERATION);
        assert_eq!(down.trend, TrendDirection::Down);
    }

    #[test]
    fn volume_ratio_contrasts_current_against_average() {
        let mut volumes = vec![1_000.0; 20];
        volumes.push(2_000.0);
        assert_abs_diff_eq!(calculate_volume_ratio(&volumes, 20), 2.0, epsilon = 0.001);
        assert_eq!(calculate_volume_ratio(&[1_000.0; 5], 20), 1.0);
    }
}
