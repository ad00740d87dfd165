use crate::indicators::calculate_volume_ratio;
use crate::models::{round2, RiskBreakdown, RiskLevel, RiskScore};

pub const RISK_PERIOD: usize = 20;

const VOLATILITY_WEIGHT: f64 = 40.0;
const VOLUME_WEIGHT: f64 = 30.0;
const PRICE_WEIGHT: f64 = 30.0;

/// Composite risk over a trailing window: volatility, volume anomaly and
/// deviation from the moving average, each capped at its weight, summed and
/// capped at 100. Short series get a deliberately conservative MEDIUM/50
/// default with a zeroed breakdown rather than an error.
pub fn calculate_risk_score(closes: &[f64], volumes: &[f64], period: usize) -> RiskScore {
    let n = closes.len();
    if period == 0 || n < period || volumes.len() < n {
        return default_risk_score();
    }

    let window = &closes[n - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let volatility = if mean > 0.0 {
        std_dev / mean * 100.0
    } else {
        0.0
    };
    let volatility_risk = (volatility * 4.0).min(VOLATILITY_WEIGHT);

    let volume_ratio = calculate_volume_ratio(volumes, period);
    let volume_risk = ((volume_ratio - 1.0).abs() * 30.0).min(VOLUME_WEIGHT);

    let price = closes[n - 1];
    let price_deviation = if mean > 0.0 {
        (price - mean).abs() / mean * 100.0
    } else {
        0.0
    };
    let price_risk = (price_deviation * 3.0).min(PRICE_WEIGHT);

    let score = (volatility_risk + volume_risk + price_risk).min(100.0);

    RiskScore {
        score: round2(score),
        level: RiskLevel::from_score(score),
        volatility: round2(volatility),
        volume_ratio: round2(volume_ratio),
        price_deviation: round2(price_deviation),
        breakdown: RiskBreakdown {
            volatility_risk: round2(volatility_risk),
            volume_risk: round2(volume_risk),
            price_risk: round2(price_risk),
        },
    }
}

pub fn default_risk_score() -> RiskScore {
    RiskScore {
        score: 50.0,
        level: RiskLevel::Medium,
        volatility: 0.0,
        volume_ratio: 0.0,
        price_deviation: 0.0,
        breakdown: RiskBreakdown {
            volatility_risk: 0.0,
            volume_risk: 0.0,
            price_risk: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn short_series_returns_the_medium_default() {
        let score = calculate_risk_score(&[100.0; 5], &[1_000.0; 5], RISK_PERIOD);
        assert_eq!(score.score, 50.0);
        assert_eq!(score.level, RiskLevel::Medium);
        assert_eq!(score.breakdown.volatility_risk, 0.0);
    }

    #[test]
    fn flat_series_scores_near_zero() {
        let closes = vec![100.0; 30];
        let volumes = vec![1_000.0; 30];
        let score = calculate_risk_score(&closes, &volumes, RISK_PERIOD);
        assert_eq!(score.breakdown.volatility_risk, 0.0);
        assert_eq!(score.breakdown.volume_risk, 0.0);
        assert_eq!(score.breakdown.price_risk, 0.0);
        assert!(score.score < 1.0);
        assert_eq!(score.level, RiskLevel::Low);
    }

    #[test]
    fn volume_spike_raises_the_volume_component() {
        let closes = vec![100.0; 30];
        let mut volumes = vec![1_000.0; 29];
        volumes.push(3_000.0);
        let score = calculate_risk_score(&closes, &volumes, RISK_PERIOD);
        assert_abs_diff_eq!(score.volume_ratio, 3.0, epsilon = 0.001);
        assert_eq!(score.breakdown.volume_risk, 30.0);
    }

    #[test]
    fn wild_swings_cap_at_extreme() {
        let closes: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 50.0 } else { 150.0 })
            .collect();
        let mut volumes = vec![1_000.0; 39];
        volumes.push(10_000.0);
        let score = calculate_risk_score(&closes, &volumes, RISK_PERIOD);
        assert_eq!(score.breakdown.volatility_risk, 40.0);
        assert_eq!(score.score.min(100.0), score.score);
        assert_eq!(score.level, RiskLevel::Extreme);
    }
}
