use serde::{Deserialize, Serialize};

use crate::models::round2;

pub const DEFAULT_KELLY_FRACTION: f64 = 0.25;
pub const DEFAULT_ATR_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_HEAT_CEILING: f64 = 10.0;

const MIN_ALLOCATION_PERCENT: f64 = 0.5;
const MAX_ALLOCATION_PERCENT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMethod {
    FixedDollar,
    FixedPercent,
    Kelly,
    AtrBased,
    VolatilityAdjusted,
    RiskParity,
    ConfidenceBased,
}

impl SizingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizingMethod::FixedDollar => "fixed_dollar",
            SizingMethod::FixedPercent => "fixed_percent",
            SizingMethod::Kelly => "kelly",
            SizingMethod::AtrBased => "atr_based",
            SizingMethod::VolatilityAdjusted => "volatility_adjusted",
            SizingMethod::RiskParity => "risk_parity",
            SizingMethod::ConfidenceBased => "confidence_based",
        }
    }
}

/// The `confidence` field carries a method-specific figure: the clamped
/// Kelly fraction (as a percent) for Kelly, the risk percent for ATR
/// sizing, the resolved allocation percent for the scaled methods, and
/// 100 for the fixed methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSizeResult {
    pub shares: f64,
    pub dollar_amount: f64,
    pub risk_amount: f64,
    pub method: SizingMethod,
    pub confidence: f64,
}

fn sized(method: SizingMethod, shares: f64, price: f64, risk_amount: f64, confidence: f64) -> PositionSizeResult {
    PositionSizeResult {
        shares,
        dollar_amount: round2(shares * price),
        risk_amount: round2(risk_amount),
        method,
        confidence: round2(confidence),
    }
}

pub fn fixed_dollar_size(dollar_amount: f64, price: f64) -> PositionSizeResult {
    let shares = if price > 0.0 && dollar_amount > 0.0 {
        (dollar_amount / price).floor()
    } else {
        0.0
    };
    sized(SizingMethod::FixedDollar, shares, price, shares * price, 100.0)
}

pub fn fixed_percent_size(account_size: f64, percent: f64, price: f64) -> PositionSizeResult {
    let dollar_amount = account_size.max(0.0) * percent.max(0.0) / 100.0;
    let shares = if price > 0.0 {
        (dollar_amount / price).floor()
    } else {
        0.0
    };
    sized(SizingMethod::FixedPercent, shares, price, shares * price, 100.0)
}

/// Fractional Kelly. The raw fraction `(b*p - q) / b` is clamped into
/// [0, 0.5] before the fractional multiplier is applied. Raw Kelly is
/// never traded directly.
pub fn kelly_size(
    account_size: f64,
    price: f64,
    win_rate: f64,
    avg_win_loss_ratio: f64,
    fraction: f64,
) -> PositionSizeResult {
    let p = win_rate.clamp(0.0, 1.0);
    let q = 1.0 - p;
    let b = avg_win_loss_ratio;

    let raw = if b > 0.0 { (b * p - q) / b } else { 0.0 };
    let clamped = raw.clamp(0.0, 0.5);
    let applied = clamped * fraction.max(0.0);

    let dollar_amount = account_size.max(0.0) * applied;
    let shares = if price > 0.0 {
        (dollar_amount / price).floor()
    } else {
        0.0
    };
    sized(
        SizingMethod::Kelly,
        shares,
        price,
        shares * price,
        clamped * 100.0,
    )
}

/// Risk a fixed percent of the account against an ATR-multiple stop.
pub fn atr_based_size(
    account_size: f64,
    risk_percent: f64,
    price: f64,
    atr: f64,
    multiplier: f64,
) -> PositionSizeResult {
    let risk_amount = account_size.max(0.0) * risk_percent.max(0.0) / 100.0;
    let stop_distance = atr * multiplier;
    let mut shares = if stop_distance > 0.0 && risk_amount > 0.0 {
        (risk_amount / stop_distance).floor()
    } else {
        0.0
    };
    // The stop-distance formula can demand more notional than the account
    // holds when ATR is tiny; cap at what the account can actually buy.
    if price > 0.0 {
        shares = shares.min((account_size.max(0.0) / price).floor());
    }
    sized(SizingMethod::AtrBased, shares, price, risk_amount, risk_percent)
}

/// Scale a base allocation by target/current volatility, clamped to
/// [0.5%, 50%] of the account.
pub fn volatility_adjusted_size(
    account_size: f64,
    base_percent: f64,
    target_volatility: f64,
    current_volatility: f64,
    price: f64,
) -> PositionSizeResult {
    let scaled_percent = if current_volatility > 0.0 && target_volatility > 0.0 {
        (base_percent * target_volatility / current_volatility)
            .clamp(MIN_ALLOCATION_PERCENT, MAX_ALLOCATION_PERCENT)
    } else {
        base_percent.clamp(MIN_ALLOCATION_PERCENT, MAX_ALLOCATION_PERCENT)
    };

    let dollar_amount = account_size.max(0.0) * scaled_percent / 100.0;
    let shares = if price > 0.0 {
        (dollar_amount / price).floor()
    } else {
        0.0
    };
    sized(
        SizingMethod::VolatilityAdjusted,
        shares,
        price,
        shares * price,
        scaled_percent,
    )
}

/// Allocate inversely to the symbol's volatility relative to the
/// portfolio's, split across the current position count.
pub fn risk_parity_size(
    account_size: f64,
    symbol_volatility: f64,
    portfolio_volatility: f64,
    position_count: usize,
    price: f64,
) -> PositionSizeResult {
    if symbol_volatility <= 0.0 || portfolio_volatility <= 0.0 || position_count == 0 {
        return sized(SizingMethod::RiskParity, 0.0, price, 0.0, 0.0);
    }

    let fraction = ((portfolio_volatility / symbol_volatility) / position_count as f64)
        .clamp(MIN_ALLOCATION_PERCENT / 100.0, MAX_ALLOCATION_PERCENT / 100.0);
    let dollar_amount = account_size.max(0.0) * fraction;
    let shares = if price > 0.0 {
        (dollar_amount / price).floor()
    } else {
        0.0
    };
    sized(
        SizingMethod::RiskParity,
        shares,
        price,
        shares * price,
        fraction * 100.0,
    )
}

/// Linear interpolation between a base and max allocation percent by
/// signal confidence (0-100).
pub fn confidence_based_size(
    account_size: f64,
    base_percent: f64,
    max_percent: f64,
    confidence: f64,
    price: f64,
) -> PositionSizeResult {
    let conf = confidence.clamp(0.0, 100.0);
    let percent = base_percent + (max_percent - base_percent).max(0.0) * conf / 100.0;
    let dollar_amount = account_size.max(0.0) * percent.max(0.0) / 100.0;
    let shares = if price > 0.0 {
        (dollar_amount / price).floor()
    } else {
        0.0
    };
    sized(
        SizingMethod::ConfidenceBased,
        shares,
        price,
        shares * price,
        percent,
    )
}

/// Inputs for the conservative combined sizing pass. Optional fields gate
/// which methods participate.
#[derive(Debug, Clone, Default)]
pub struct OptimalSizeParams {
    pub account_size: f64,
    pub price: f64,
    pub base_percent: f64,
    pub risk_percent: Option<f64>,
    pub atr: Option<f64>,
    pub win_rate: Option<f64>,
    pub avg_win_loss_ratio: Option<f64>,
    pub target_volatility: Option<f64>,
    pub current_volatility: Option<f64>,
    pub portfolio_volatility: Option<f64>,
    pub position_count: Option<usize>,
    pub signal_confidence: Option<f64>,
    pub max_percent: Option<f64>,
}

/// Run every sizing method whose parameters are present and keep the
/// smallest share count. Picking the minimum across available methods is
/// the safety policy, not a tie-break.
pub fn calculate_optimal_size(params: &OptimalSizeParams) -> PositionSizeResult {
    let mut candidates = vec![fixed_percent_size(
        params.account_size,
        params.base_percent,
        params.price,
    )];

    if let (Some(win_rate), Some(ratio)) = (params.win_rate, params.avg_win_loss_ratio) {
        candidates.push(kelly_size(
            params.account_size,
            params.price,
            win_rate,
            ratio,
            DEFAULT_KELLY_FRACTION,
        ));
    }

    if let (Some(risk_percent), Some(atr)) = (params.risk_percent, params.atr) {
        candidates.push(atr_based_size(
            params.account_size,
            risk_percent,
            params.price,
            atr,
            DEFAULT_ATR_MULTIPLIER,
        ));
    }

    if let (Some(target), Some(current)) = (params.target_volatility, params.current_volatility) {
        candidates.push(volatility_adjusted_size(
            params.account_size,
            params.base_percent,
            target,
            current,
            params.price,
        ));
    }

    if let (Some(portfolio_vol), Some(current), Some(count)) = (
        params.portfolio_volatility,
        params.current_volatility,
        params.position_count,
    ) {
        candidates.push(risk_parity_size(
            params.account_size,
            current,
            portfolio_vol,
            count,
            params.price,
        ));
    }

    if let Some(confidence) = params.signal_confidence {
        let max_percent = params.max_percent.unwrap_or(params.base_percent * 2.0);
        candidates.push(confidence_based_size(
            params.account_size,
            params.base_percent,
            max_percent,
            confidence,
            params.price,
        ));
    }

    candidates
        .into_iter()
        .min_by(|a, b| {
            a.shares
                .partial_cmp(&b.shares)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("at least the fixed-percent candidate exists")
}

/// Aggregate risk committed across open positions. A new position is
/// rejected when the combined heat would exceed the ceiling.
pub fn portfolio_heat_allows(
    existing_risk_percents: &[f64],
    new_risk_percent: f64,
    ceiling_percent: f64,
) -> bool {
    let total: f64 = existing_risk_percents.iter().sum::<f64>() + new_risk_percent;
    total <= ceiling_percent + 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fixed_sizing_floors_share_counts() {
        let result = fixed_dollar_size(1_050.0, 100.0);
        assert_eq!(result.shares, 10.0);
        assert_eq!(result.dollar_amount, 1_000.0);

        let result = fixed_percent_size(100_000.0, 10.0, 333.0);
        assert_eq!(result.shares, 30.0);
    }

    #[test]
    fn kelly_fraction_is_clamped_for_degenerate_inputs() {
        // Certain loss: raw fraction is negative, clamps to zero.
        let losing = kelly_size(100_000.0, 100.0, 0.0, 2.0, DEFAULT_KELLY_FRACTION);
        assert_eq!(losing.shares, 0.0);
        assert_eq!(losing.confidence, 0.0);

        // Certain win: raw fraction is 1.0, clamps to 0.5 before the
        // fractional multiplier.
        let winning = kelly_size(100_000.0, 100.0, 1.0, 2.0, DEFAULT_KELLY_FRACTION);
        assert_eq!(winning.confidence, 50.0);
        assert_abs_diff_eq!(winning.dollar_amount, 12_500.0, epsilon = 100.0);
    }

    #[test]
    fn kelly_applies_the_fractional_multiplier() {
        // p=0.6, b=2 → raw 0.4, quarter-Kelly 0.1 → $10k at $100 → 100 shares.
        let result = kelly_size(100_000.0, 100.0, 0.6, 2.0, DEFAULT_KELLY_FRACTION);
        assert_eq!(result.shares, 100.0);
        assert_abs_diff_eq!(result.confidence, 40.0, epsilon = 0.01);
    }

    #[test]
    fn atr_sizing_derives_shares_from_risk_budget() {
        // 1% of 100k = 1000 risk; stop distance 2*20=40 → 25 shares.
        let result = atr_based_size(100_000.0, 1.0, 100.0, 20.0, DEFAULT_ATR_MULTIPLIER);
        assert_eq!(result.shares, 25.0);
        assert_eq!(result.risk_amount, 1_000.0);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn atr_sizing_caps_at_account_notional() {
        let result = atr_based_size(10_000.0, 10.0, 100.0, 0.01, DEFAULT_ATR_MULTIPLIER);
        assert!(result.shares * 100.0 <= 10_000.0);
    }

    #[test]
    fn volatility_adjustment_clamps_the_allocation() {
        let calm = volatility_adjusted_size(100_000.0, 10.0, 15.0, 1.0, 100.0);
        assert_eq!(calm.confidence, 50.0);

        let wild = volatility_adjusted_size(100_000.0, 10.0, 15.0, 500.0, 100.0);
        assert_eq!(wild.confidence, 0.5);
    }

    #[test]
    fn risk_parity_splits_by_position_count() {
        let result = risk_parity_size(100_000.0, 20.0, 10.0, 5, 100.0);
        // (10/20)/5 = 10% of the account.
        assert_eq!(result.shares, 100.0);
        let empty = risk_parity_size(100_000.0, 0.0, 10.0, 5, 100.0);
        assert_eq!(empty.shares, 0.0);
    }

    #[test]
    fn confidence_sizing_interpolates_linearly() {
        let low = confidence_based_size(100_000.0, 5.0, 25.0, 0.0, 100.0);
        assert_eq!(low.confidence, 5.0);
        let high = confidence_based_size(100_000.0, 5.0, 25.0, 100.0, 100.0);
        assert_eq!(high.confidence, 25.0);
        let mid = confidence_based_size(100_000.0, 5.0, 25.0, 50.0, 100.0);
        assert_eq!(mid.confidence, 15.0);
    }

    #[test]
    fn optimal_size_is_the_minimum_of_available_methods() {
        let params = OptimalSizeParams {
            account_size: 100_000.0,
            price: 100.0,
            base_percent: 10.0,
            risk_percent: Some(1.0),
            atr: Some(20.0),
            win_rate: Some(0.6),
            avg_win_loss_ratio: Some(2.0),
            signal_confidence: Some(80.0),
            ..Default::default()
        };

        let optimal = calculate_optimal_size(&params);
        let individual = [
            fixed_percent_size(100_000.0, 10.0, 100.0),
            kelly_size(100_000.0, 100.0, 0.6, 2.0, DEFAULT_KELLY_FRACTION),
            atr_based_size(100_000.0, 1.0, 100.0, 20.0, DEFAULT_ATR_MULTIPLIER),
            confidence_based_size(100_000.0, 10.0, 20.0, 80.0, 100.0),
        ];
        for candidate in &individual {
            assert!(
                optimal.shares <= candidate.shares,
                "optimal {} exceeded {} from {:?}",
                optimal.shares,
                candidate.shares,
                candidate.method
            );
        }
        // The ATR budget is the most conservative of the four here.
        assert_eq!(optimal.shares, 25.0);
        assert_eq!(optimal.method, SizingMethod::AtrBased);
    }

    #[test]
    fn portfolio_heat_rejects_over_the_ceiling() {
        assert!(portfolio_heat_allows(&[2.0, 3.0], 4.0, DEFAULT_HEAT_CEILING));
        assert!(portfolio_heat_allows(&[2.0, 3.0], 5.0, DEFAULT_HEAT_CEILING));
        assert!(!portfolio_heat_allows(&[2.0, 3.0], 5.1, DEFAULT_HEAT_CEILING));
        assert!(portfolio_heat_allows(&[], 10.0, DEFAULT_HEAT_CEILING));
    }
}
