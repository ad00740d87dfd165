use std::collections::HashMap;

use crate::param_utils::{get_param, get_param_clamped, get_rounded_param, get_usize_param_min};
use crate::sizing::SizingMethod;

/// How the backtester sizes entries.
#[derive(Debug, Clone)]
pub struct SizingConfig {
    pub method: SizingMethod,
    pub fixed_percent: f64,
    pub risk_per_trade: f64,
    pub atr_multiplier: f64,
    pub kelly_fraction: f64,
    pub max_percent: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            method: SizingMethod::FixedPercent,
            fixed_percent: 10.0,
            risk_per_trade: 1.0,
            atr_multiplier: 2.0,
            kelly_fraction: 0.25,
            max_percent: 20.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub commission_rate: f64,
    pub slippage_rate: f64,
    pub max_positions: usize,
    pub sizing: SizingConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            commission_rate: 0.001,
            slippage_rate: 0.001,
            max_positions: 5,
            sizing: SizingConfig::default(),
        }
    }
}

impl BacktestConfig {
    /// Build a config from a camelCase parameter map, the form external
    /// callers submit. Unknown keys are ignored; missing keys default.
    pub fn from_parameters(parameters: &HashMap<String, f64>) -> Self {
        let method = match get_rounded_param(parameters, "sizingMode", 0) {
            1 => SizingMethod::AtrBased,
            2 => SizingMethod::ConfidenceBased,
            3 => SizingMethod::Kelly,
            _ => SizingMethod::FixedPercent,
        };

        Self {
            initial_capital: get_param(parameters, "initialCapital", 100_000.0),
            commission_rate: get_param_clamped(parameters, "commissionRate", 0.001, 0.0, 0.1),
            slippage_rate: get_param_clamped(parameters, "slippageRate", 0.001, 0.0, 0.1),
            max_positions: get_usize_param_min(parameters, "maxPositions", 5, 1),
            sizing: SizingConfig {
                method,
                fixed_percent: get_param_clamped(parameters, "tradeSizePercent", 10.0, 0.1, 100.0),
                risk_per_trade: get_param_clamped(parameters, "riskPerTrade", 1.0, 0.01, 100.0),
                atr_multiplier: get_param_clamped(parameters, "atrMultiplier", 2.0, 0.1, 20.0),
                kelly_fraction: get_param_clamped(parameters, "kellyFraction", 0.25, 0.01, 1.0),
                max_percent: get_param_clamped(parameters, "maxTradeSizePercent", 20.0, 0.1, 100.0),
            },
        }
    }
}

/// Commission and slippage for the live paper-trading account.
#[derive(Debug, Clone)]
pub struct PortfolioConfig {
    pub initial_cash: f64,
    pub commission_rate: f64,
    pub slippage_rate: f64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            initial_cash: 100_000.0,
            commission_rate: 0.001,
            slippage_rate: 0.001,
        }
    }
}
