use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::indicators::{
    AdxResult, AtrResult, BollingerResult, IchimokuResult, MacdResult, PsarResult,
    StochasticResult, SuperTrendResult, VwapResult,
};

/// Round a monetary figure or percentage to 2 decimal places. This rounding
/// is part of the public contract, not cosmetics: every numeric field that
/// crosses the API boundary goes through it at the point of computation.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// Round a ratio expressed as a fraction (e.g. Bollinger %B) to 3 decimals.
pub fn round3(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub date: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A chronological candle sequence plus the derived parallel arrays the
/// indicator functions consume. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct Series {
    candles: Vec<Candle>,
    closes: Vec<f64>,
    highs: Vec<f64>,
    lows: Vec<f64>,
    volumes: Vec<f64>,
}

impl Series {
    pub fn from_candles(mut candles: Vec<Candle>) -> Self {
        candles.sort_by(|a, b| a.date.cmp(&b.date));
        let closes = candles.iter().map(|c| c.close).collect();
        let highs = candles.iter().map(|c| c.high).collect();
        let lows = candles.iter().map(|c| c.low).collect();
        let volumes = candles.iter().map(|c| c.volume).collect();
        Self {
            candles,
            closes,
            highs,
            lows,
            volumes,
        }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn highs(&self) -> &[f64] {
        &self.highs
    }

    pub fn lows(&self) -> &[f64] {
        &self.lows
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }

    pub fn last_date(&self) -> Option<DateTime<Utc>> {
        self.candles.last().map(|c| c.date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
            SignalType::Hold => "HOLD",
        }
    }
}

impl FromStr for SignalType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(SignalType::Buy),
            "SELL" => Ok(SignalType::Sell),
            "HOLD" => Ok(SignalType::Hold),
            other => Err(anyhow!("Unknown signal type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Extreme => "EXTREME",
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            RiskLevel::Low
        } else if score < 60.0 {
            RiskLevel::Medium
        } else if score < 80.0 {
            RiskLevel::High
        } else {
            RiskLevel::Extreme
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskBreakdown {
    pub volatility_risk: f64,
    pub volume_risk: f64,
    pub price_risk: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScore {
    pub score: f64,
    pub level: RiskLevel,
    pub volatility: f64,
    pub volume_ratio: f64,
    pub price_deviation: f64,
    pub breakdown: RiskBreakdown,
}

/// Current values of every indicator the signal generator consults,
/// embedded in each Signal so downstream consumers can render the inputs
/// that produced the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub macd: MacdResult,
    pub bollinger: BollingerResult,
    pub adx: AdxResult,
    pub atr: AtrResult,
    pub stochastic: StochasticResult,
    pub vwap: VwapResult,
    pub super_trend: SuperTrendResult,
    pub ichimoku: IchimokuResult,
    pub psar: PsarResult,
    pub volume_ratio: f64,
}

/// Qualitative companion to the numeric signal, derived from
/// (type, confidence, risk level, ADX) via a fixed decision table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub strategy: String,
    pub description: String,
    pub position_size: String,
    pub holding_period: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub symbol: String,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub confidence: f64,
    pub entry_price: f64,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub risk_reward: Option<f64>,
    pub reasons: Vec<String>,
    pub risk: RiskScore,
    pub indicators: IndicatorSnapshot,
    pub recommendation: Recommendation,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl FromStr for OrderSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(anyhow!("Unknown order side '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
}

/// A single order's lifecycle: created pending (limit/stop) or immediately
/// filled (market), then exactly one transition to filled or cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub shares: f64,
    pub price: Option<f64>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    pub fill_price: Option<f64>,
}

/// Per-symbol aggregate of an account's holdings. Created on the first buy
/// fill, deleted when shares reach zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    pub shares: f64,
    pub avg_price: f64,
    pub cost_basis: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
}

/// Immutable record of one executed fill. Exit fills carry the realized
/// P&L of the shares they closed; entry fills leave it unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub shares: f64,
    pub price: f64,
    pub commission: f64,
    pub date: DateTime<Utc>,
    pub realized_pnl: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub total_return: f64,
    pub total_return_percent: f64,
    pub day_return: f64,
    pub day_return_percent: f64,
    pub commissions_paid: f64,
    pub trade_count: i32,
    pub win_rate: f64,
    pub profit_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioState {
    pub owner_id: String,
    pub cash: f64,
    pub equity: f64,
    pub positions: Vec<Position>,
    pub open_orders: Vec<Order>,
    pub trade_history: Vec<Trade>,
    pub performance: PerformanceSnapshot,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestMetrics {
    pub total_trades: i32,
    pub winning_trades: i32,
    pub losing_trades: i32,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub avg_win_loss_ratio: f64,
    pub longest_win_streak: i32,
    pub longest_loss_streak: i32,
    pub total_return: f64,
    pub total_return_percent: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub max_drawdown_percent: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub expectancy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub symbol: String,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
    pub dates: Vec<DateTime<Utc>>,
    pub metrics: BacktestMetrics,
}
