use statrs::statistics::Statistics;

use crate::models::{round2, BacktestMetrics, Trade};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Compute the full metric block from a trade ledger and its equity
    /// curve. Only fills carrying realized P&L (exit legs) count as trades
    /// for win/loss statistics.
    pub fn calculate_metrics(
        trades: &[Trade],
        initial_capital: f64,
        equity_curve: &[f64],
        date_count: usize,
    ) -> BacktestMetrics {
        let pnls: Vec<f64> = trades.iter().filter_map(|t| t.realized_pnl).collect();
        let total_trades = pnls.len() as i32;

        let winning: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
        let losing: Vec<f64> = pnls.iter().copied().filter(|&p| p < 0.0).collect();
        let winning_trades = winning.len() as i32;
        let losing_trades = losing.len() as i32;

        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };

        let gross_profit: f64 = winning.iter().sum();
        let gross_loss: f64 = losing.iter().map(|p| p.abs()).sum();
        let profit_factor = gross_profit / if gross_loss > 0.0 { gross_loss } else { 1.0 };

        let avg_win = Self::average(&winning);
        let avg_loss = Self::average(&losing);
        let avg_win_loss_ratio = if avg_loss.abs() > 0.0 {
            avg_win / avg_loss.abs()
        } else {
            avg_win
        };

        let (longest_win_streak, longest_loss_streak) = Self::streaks(&pnls);

        let final_equity = equity_curve
            .last()
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(initial_capital);
        let total_return = final_equity - initial_capital;
        let total_return_percent = if initial_capital > 0.0 {
            total_return / initial_capital * 100.0
        } else {
            0.0
        };

        let cagr = Self::calculate_cagr(initial_capital, final_equity, date_count);
        let (max_drawdown, max_drawdown_percent) = Self::max_drawdown(equity_curve);

        let returns = Self::step_returns(equity_curve);
        let sharpe_ratio = Self::sharpe(&returns);
        let sortino_ratio = Self::sortino(&returns);
        let calmar_ratio = if max_drawdown_percent > 0.0 {
            cagr / max_drawdown_percent
        } else {
            0.0
        };

        let expectancy = if total_trades > 0 {
            total_return / total_trades as f64
        } else {
            0.0
        };

        BacktestMetrics {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate: round2(win_rate),
            profit_factor: round2(profit_factor),
            avg_win: round2(avg_win),
            avg_loss: round2(avg_loss),
            avg_win_loss_ratio: round2(avg_win_loss_ratio),
            longest_win_streak,
            longest_loss_streak,
            total_return: round2(total_return),
            total_return_percent: round2(total_return_percent),
            cagr: round2(cagr),
            max_drawdown: round2(max_drawdown),
            max_drawdown_percent: round2(max_drawdown_percent),
            sharpe_ratio: round2(sharpe_ratio),
            sortino_ratio: round2(sortino_ratio),
            calmar_ratio: round2(calmar_ratio),
            expectancy: round2(expectancy),
        }
    }

    fn average(values: &[f64]) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for value in values.iter().copied() {
            if value.is_finite() {
                sum += value;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    fn streaks(pnls: &[f64]) -> (i32, i32) {
        let mut longest_win = 0i32;
        let mut longest_loss = 0i32;
        let mut current_win = 0i32;
        let mut current_loss = 0i32;

        for &pnl in pnls {
            if pnl > 0.0 {
                current_win += 1;
                current_loss = 0;
            } else if pnl < 0.0 {
                current_loss += 1;
                current_win = 0;
            } else {
                current_win = 0;
                current_loss = 0;
            }
            longest_win = longest_win.max(current_win);
            longest_loss = longest_loss.max(current_loss);
        }

        (longest_win, longest_loss)
    }

    /// CAGR as a percent, with the year count taken from the trading-day
    /// axis: `date_count / 252`.
    fn calculate_cagr(initial_capital: f64, final_equity: f64, date_count: usize) -> f64 {
        if initial_capital <= 0.0 || final_equity <= 0.0 || date_count == 0 {
            return 0.0;
        }
        let years = date_count as f64 / TRADING_DAYS_PER_YEAR;
        if years <= 0.0 {
            return 0.0;
        }
        ((final_equity / initial_capital).powf(1.0 / years) - 1.0) * 100.0
    }

    fn max_drawdown(equity_curve: &[f64]) -> (f64, f64) {
        if equity_curve.is_empty() {
            return (0.0, 0.0);
        }

        let mut max_drawdown = 0.0;
        let mut max_drawdown_percent = 0.0;
        let mut peak = equity_curve[0];

        for &value in equity_curve {
            if value > peak {
                peak = value;
            } else {
                let drawdown = peak - value;
                let drawdown_percent = if peak > 0.0 {
                    drawdown / peak * 100.0
                } else {
                    0.0
                };
                if drawdown > max_drawdown {
                    max_drawdown = drawdown;
                }
                if drawdown_percent > max_drawdown_percent {
                    max_drawdown_percent = drawdown_percent;
                }
            }
        }

        (max_drawdown, max_drawdown_percent)
    }

    fn step_returns(equity_curve: &[f64]) -> Vec<f64> {
        equity_curve
            .windows(2)
            .map(|window| {
                if window[0] > 0.0 {
                    (window[1] - window[0]) / window[0]
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn sharpe(returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        let mean = returns.to_vec().mean();
        let std_dev = returns.to_vec().std_dev();
        if std_dev == 0.0 || !std_dev.is_finite() {
            return 0.0;
        }
        mean / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
    }

    fn sortino(returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        let negative: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
        if negative.len() < 2 {
            return 0.0;
        }
        let mean = returns.to_vec().mean();
        let downside_dev = negative.std_dev();
        if downside_dev == 0.0 || !downside_dev.is_finite() {
            return 0.0;
        }
        mean / downside_dev * TRADING_DAYS_PER_YEAR.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderSide;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn exit_trade(pnl: f64, day: i64) -> Trade {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Trade {
            id: format!("t{day}"),
            symbol: "TEST".to_string(),
            side: OrderSide::Sell,
            shares: 10.0,
            price: 100.0,
            commission: 1.0,
            date: base + Duration::days(day),
            realized_pnl: Some(pnl),
        }
    }

    fn entry_trade(day: i64) -> Trade {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Trade {
            id: format!("e{day}"),
            symbol: "TEST".to_string(),
            side: OrderSide::Buy,
            shares: 10.0,
            price: 100.0,
            commission: 1.0,
            date: base + Duration::days(day),
            realized_pnl: None,
        }
    }

    #[test]
    fn entry_legs_do_not_count_as_trades() {
        let trades = vec![entry_trade(0), exit_trade(100.0, 1), entry_trade(2)];
        let metrics =
            PerformanceCalculator::calculate_metrics(&trades, 10_000.0, &[10_000.0, 10_100.0], 2);
        assert_eq!(metrics.total_trades, 1);
        assert_eq!(metrics.winning_trades, 1);
        assert_eq!(metrics.win_rate, 100.0);
    }

    #[test]
    fn profit_factor_and_averages() {
        let trades = vec![
            exit_trade(200.0, 0),
            exit_trade(100.0, 1),
            exit_trade(-100.0, 2),
        ];
        let metrics = PerformanceCalculator::calculate_metrics(
            &trades,
            10_000.0,
            &[10_000.0, 10_200.0, 10_300.0, 10_200.0],
            3,
        );
        assert_eq!(metrics.profit_factor, 3.0);
        assert_eq!(metrics.avg_win, 150.0);
        assert_eq!(metrics.avg_loss, -100.0);
        assert_abs_diff_eq!(metrics.avg_win_loss_ratio, 1.5, epsilon = 0.001);
        assert_eq!(metrics.longest_win_streak, 2);
        assert_eq!(metrics.longest_loss_streak, 1);
        assert_abs_diff_eq!(metrics.expectancy, 200.0 / 3.0, epsilon = 0.01);
    }

    #[test]
    fn drawdown_is_peak_to_trough() {
        let curve = vec![100.0, 120.0, 90.0, 110.0, 80.0];
        let (dd, dd_pct) = PerformanceCalculator::max_drawdown(&curve);
        assert_eq!(dd, 40.0);
        assert_abs_diff_eq!(dd_pct, 40.0 / 120.0 * 100.0, epsilon = 0.001);
    }

    #[test]
    fn cagr_uses_the_trading_day_axis() {
        // 252 dates = one year; 21% gain → 21% CAGR.
        let metrics = PerformanceCalculator::calculate_metrics(
            &[],
            100_000.0,
            &[100_000.0, 121_000.0],
            252,
        );
        assert_abs_diff_eq!(metrics.cagr, 21.0, epsilon = 0.01);
    }

    #[test]
    fn flat_curve_produces_zero_ratios() {
        let curve = vec![100_000.0; 10];
        let metrics = PerformanceCalculator::calculate_metrics(&[], 100_000.0, &curve, 10);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.sortino_ratio, 0.0);
        assert_eq!(metrics.calmar_ratio, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
    }

    #[test]
    fn sharpe_is_positive_for_a_steady_climb() {
        let curve: Vec<f64> = (0..100)
            .map(|i| 100_000.0 * (1.0_f64 + 0.001).powi(i))
            .collect();
        let returns = PerformanceCalculator::step_returns(&curve);
        assert!(PerformanceCalculator::sharpe(&returns) >= 0.0);
        let metrics = PerformanceCalculator::calculate_metrics(&[], 100_000.0, &curve, 100);
        assert!(metrics.total_return > 0.0);
    }
}
