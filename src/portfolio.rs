use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::config::PortfolioConfig;
use crate::errors::EngineError;
use crate::models::{
    round2, Order, OrderSide, OrderStatus, OrderType, PerformanceSnapshot, PortfolioState,
    Position, Trade,
};

const SHARE_EPSILON: f64 = 1e-9;

/// One mutable virtual account. The simulator itself does no locking;
/// the owning store serializes access per owner key.
pub struct PortfolioSimulator {
    owner_id: String,
    config: PortfolioConfig,
    cash: f64,
    positions: HashMap<String, Position>,
    open_orders: Vec<Order>,
    trade_history: Vec<Trade>,
    commissions_paid: f64,
    day_open_equity: f64,
}

impl PortfolioSimulator {
    pub fn new(owner_id: &str, config: PortfolioConfig) -> Self {
        let initial_cash = config.initial_cash;
        Self {
            owner_id: owner_id.to_string(),
            config,
            cash: initial_cash,
            positions: HashMap::new(),
            open_orders: Vec::new(),
            trade_history: Vec::new(),
            commissions_paid: 0.0,
            day_open_equity: initial_cash,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Cash plus the mark-to-market value of every position.
    pub fn equity(&self) -> f64 {
        self.cash
            + self
                .positions
                .values()
                .map(|p| p.market_value)
                .sum::<f64>()
    }

    /// Reset the day-return anchor to the current equity.
    pub fn mark_day_open(&mut self) {
        self.day_open_equity = self.equity();
    }

    /// Fill immediately at the slippage-adjusted price. Fails, rather than
    /// clamping, when a buy cannot be funded or a sell exceeds the held
    /// shares.
    pub fn place_market_order(
        &mut self,
        symbol: &str,
        side: OrderSide,
        shares: f64,
        price: f64,
    ) -> Result<Order, EngineError> {
        validate_order_inputs(shares, price)?;

        let fill_price = self.slippage_adjusted(price, side);
        let commission = shares * fill_price * self.config.commission_rate;

        match side {
            OrderSide::Buy => {
                let cost = shares * fill_price + commission;
                if cost > self.cash {
                    return Err(EngineError::InsufficientFunds {
                        required: cost,
                        available: self.cash,
                    });
                }
            }
            OrderSide::Sell => {
                let held = self.positions.get(symbol).map(|p| p.shares).unwrap_or(0.0);
                if held + SHARE_EPSILON < shares {
                    return Err(EngineError::InsufficientShares {
                        symbol: symbol.to_string(),
                        requested: shares,
                        held,
                    });
                }
            }
        }

        let now = Utc::now();
        self.apply_fill(symbol, side, shares, fill_price, commission, now);

        let order = Order {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            shares,
            price: None,
            status: OrderStatus::Filled,
            created_at: now,
            filled_at: Some(now),
            fill_price: Some(round2(fill_price)),
        };
        info!(
            "{}: market {} {} {} filled at {:.2}",
            self.owner_id,
            side.as_str(),
            shares,
            symbol,
            fill_price
        );
        Ok(order)
    }

    pub fn place_limit_order(
        &mut self,
        symbol: &str,
        side: OrderSide,
        shares: f64,
        limit_price: f64,
    ) -> Result<Order, EngineError> {
        self.queue_order(symbol, side, shares, limit_price, OrderType::Limit)
    }

    pub fn place_stop_order(
        &mut self,
        symbol: &str,
        side: OrderSide,
        shares: f64,
        stop_price: f64,
    ) -> Result<Order, EngineError> {
        self.queue_order(symbol, side, shares, stop_price, OrderType::Stop)
    }

    fn queue_order(
        &mut self,
        symbol: &str,
        side: OrderSide,
        shares: f64,
        trigger_price: f64,
        order_type: OrderType,
    ) -> Result<Order, EngineError> {
        validate_order_inputs(shares, trigger_price)?;

        let order = Order {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            order_type,
            shares,
            price: Some(trigger_price),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            filled_at: None,
            fill_price: None,
        };
        self.open_orders.push(order.clone());
        Ok(order)
    }

    /// Cancel a pending order. Unknown ids (including already-terminal
    /// orders) are an error.
    pub fn cancel_order(&mut self, order_id: &str) -> Result<Order, EngineError> {
        let index = self
            .open_orders
            .iter()
            .position(|o| o.id == order_id)
            .ok_or_else(|| EngineError::UnknownOrder(order_id.to_string()))?;
        let mut order = self.open_orders.remove(index);
        order.status = OrderStatus::Cancelled;
        Ok(order)
    }

    /// Refresh every position's mark-to-market fields, then fill any
    /// pending order whose trigger condition is met by the supplied
    /// prices. Filled and cancelled orders leave the open list.
    pub fn update_positions(&mut self, current_prices: &HashMap<String, f64>) {
        for position in self.positions.values_mut() {
            if let Some(&price) = current_prices.get(&position.symbol) {
                position.current_price = round2(price);
                position.market_value = round2(position.shares * price);
                position.unrealized_pnl = round2(position.shares * (price - position.avg_price));
                position.unrealized_pnl_percent = if position.avg_price > 0.0 {
                    round2((price - position.avg_price) / position.avg_price * 100.0)
                } else {
                    0.0
                };
            }
        }

        let pending = std::mem::take(&mut self.open_orders);
        for order in pending {
            let Some(&price) = current_prices.get(&order.symbol) else {
                self.open_orders.push(order);
                continue;
            };
            let trigger = order.price.expect("pending orders carry a trigger price");

            let triggered = match (order.order_type, order.side) {
                (OrderType::Limit, OrderSide::Buy) => price <= trigger,
                (OrderType::Limit, OrderSide::Sell) => price >= trigger,
                (OrderType::Stop, OrderSide::Buy) => price >= trigger,
                (OrderType::Stop, OrderSide::Sell) => price <= trigger,
                (OrderType::Market, _) => false,
            };
            if !triggered {
                self.open_orders.push(order);
                continue;
            }

            // Resting limit orders fill at the prevailing price; triggered
            // stops become market orders and pay slippage.
            let fill_price = match order.order_type {
                OrderType::Stop => self.slippage_adjusted(price, order.side),
                _ => price,
            };
            let commission = order.shares * fill_price * self.config.commission_rate;

            // Conditions can stop holding by fill time; a triggered order
            // that no longer validates is cancelled, not clamped.
            let valid = match order.side {
                OrderSide::Buy => order.shares * fill_price + commission <= self.cash,
                OrderSide::Sell => {
                    let held = self
                        .positions
                        .get(&order.symbol)
                        .map(|p| p.shares)
                        .unwrap_or(0.0);
                    held + SHARE_EPSILON >= order.shares
                }
            };
            if !valid {
                warn!(
                    "{}: cancelling triggered {} {} order for {}: validation failed at fill time",
                    self.owner_id,
                    order.order_type.as_str(),
                    order.side.as_str(),
                    order.symbol
                );
                continue;
            }

            let now = Utc::now();
            self.apply_fill(
                &order.symbol,
                order.side,
                order.shares,
                fill_price,
                commission,
                now,
            );
            info!(
                "{}: {} {} {} {} filled at {:.2}",
                self.owner_id,
                order.order_type.as_str(),
                order.side.as_str(),
                order.shares,
                order.symbol,
                fill_price
            );
        }
    }

    fn slippage_adjusted(&self, price: f64, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => price * (1.0 + self.config.slippage_rate),
            OrderSide::Sell => price * (1.0 - self.config.slippage_rate),
        }
    }

    /// Apply one fill to cash, the position book and the trade history.
    /// Buys average into an existing position; sells reduce shares and
    /// cost basis proportionally and delete the position at zero.
    fn apply_fill(
        &mut self,
        symbol: &str,
        side: OrderSide,
        shares: f64,
        price: f64,
        commission: f64,
        date: DateTime<Utc>,
    ) {
        self.commissions_paid += commission;
        let realized_pnl = match side {
            OrderSide::Buy => {
                self.cash -= shares * price + commission;
                let position = self
                    .positions
                    .entry(symbol.to_string())
                    .or_insert_with(|| Position {
                        symbol: symbol.to_string(),
                        shares: 0.0,
                        avg_price: 0.0,
                        cost_basis: 0.0,
                        current_price: round2(price),
                        market_value: 0.0,
                        unrealized_pnl: 0.0,
                        unrealized_pnl_percent: 0.0,
                    });
                position.cost_basis += shares * price;
                position.shares += shares;
                position.avg_price = round2(position.cost_basis / position.shares);
                position.current_price = round2(price);
                position.market_value = round2(position.shares * price);
                position.unrealized_pnl =
                    round2(position.shares * (price - position.cost_basis / position.shares));
                None
            }
            OrderSide::Sell => {
                self.cash += shares * price - commission;
                let mut realized = None;
                if let Some(position) = self.positions.get_mut(symbol) {
                    let avg = if position.shares > 0.0 {
                        position.cost_basis / position.shares
                    } else {
                        0.0
                    };
                    realized = Some(round2((price - avg) * shares - commission));
                    position.cost_basis -= avg * shares;
                    position.shares -= shares;
                    if position.shares <= SHARE_EPSILON {
                        self.positions.remove(symbol);
                    } else {
                        position.current_price = round2(price);
                        position.market_value = round2(position.shares * price);
                        position.unrealized_pnl = round2(position.shares * (price - avg));
                        position.unrealized_pnl_percent = if avg > 0.0 {
                            round2((price - avg) / avg * 100.0)
                        } else {
                            0.0
                        };
                    }
                }
                realized
            }
        };

        self.trade_history.push(Trade {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            shares,
            price: round2(price),
            commission: round2(commission),
            date,
            realized_pnl,
        });
    }

    /// Win rate and profit factor are computed over closed round trips
    /// only: per symbol, a round trip closes when cumulative sold shares
    /// match cumulative bought shares. Open positions never count.
    fn closed_round_trip_pnls(&self) -> Vec<f64> {
        #[derive(Default)]
        struct Accumulator {
            bought: f64,
            sold: f64,
            pnl: f64,
        }

        let mut by_symbol: HashMap<&str, Accumulator> = HashMap::new();
        let mut round_trips = Vec::new();

        for trade in &self.trade_history {
            let acc = by_symbol.entry(trade.symbol.as_str()).or_default();
            match trade.side {
                OrderSide::Buy => acc.bought += trade.shares,
                OrderSide::Sell => {
                    acc.sold += trade.shares;
                    acc.pnl += trade.realized_pnl.unwrap_or(0.0);
                }
            }
            if acc.bought > 0.0 && (acc.bought - acc.sold).abs() <= SHARE_EPSILON {
                round_trips.push(acc.pnl);
                *acc = Accumulator::default();
            }
        }

        round_trips
    }

    pub fn performance(&self) -> PerformanceSnapshot {
        let equity = self.equity();
        let initial = self.config.initial_cash;
        let total_return = equity - initial;
        let day_return = equity - self.day_open_equity;

        let round_trips = self.closed_round_trip_pnls();
        let wins = round_trips.iter().filter(|&&p| p > 0.0).count();
        let win_rate = if round_trips.is_empty() {
            0.0
        } else {
            wins as f64 / round_trips.len() as f64 * 100.0
        };
        let gross_profit: f64 = round_trips.iter().filter(|&&p| p > 0.0).sum();
        let gross_loss: f64 = round_trips
            .iter()
            .filter(|&&p| p < 0.0)
            .map(|p| p.abs())
            .sum();
        let profit_factor = gross_profit / if gross_loss > 0.0 { gross_loss } else { 1.0 };

        PerformanceSnapshot {
            total_return: round2(total_return),
            total_return_percent: if initial > 0.0 {
                round2(total_return / initial * 100.0)
            } else {
                0.0
            },
            day_return: round2(day_return),
            day_return_percent: if self.day_open_equity > 0.0 {
                round2(day_return / self.day_open_equity * 100.0)
            } else {
                0.0
            },
            commissions_paid: round2(self.commissions_paid),
            trade_count: self.trade_history.len() as i32,
            win_rate: round2(win_rate),
            profit_factor: round2(profit_factor),
        }
    }

    pub fn state(&self) -> PortfolioState {
        let mut positions: Vec<Position> = self.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        PortfolioState {
            owner_id: self.owner_id.clone(),
            cash: round2(self.cash),
            equity: round2(self.equity()),
            positions,
            open_orders: self.open_orders.clone(),
            trade_history: self.trade_history.clone(),
            performance: self.performance(),
            updated_at: Utc::now(),
        }
    }
}

fn validate_order_inputs(shares: f64, price: f64) -> Result<(), EngineError> {
    if !shares.is_finite() || shares <= 0.0 {
        return Err(EngineError::InvalidParameter {
            name: "shares".to_string(),
            message: format!("must be a positive number, got {}", shares),
        });
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(EngineError::InvalidParameter {
            name: "price".to_string(),
            message: format!("must be a positive number, got {}", price),
        });
    }
    Ok(())
}
