use thiserror::Error;

/// Failures that must propagate to the caller. Data insufficiency in the
/// indicator and risk paths never produces one of these; those paths
/// return documented neutral defaults instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient history for {symbol}: {available} candles available, {required} required")]
    InsufficientHistory {
        symbol: String,
        available: usize,
        required: usize,
    },

    #[error("insufficient funds: order requires {required:.2} but only {available:.2} cash is available")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient shares of {symbol}: tried to sell {requested} but only {held} held")]
    InsufficientShares {
        symbol: String,
        requested: f64,
        held: f64,
    },

    #[error("unknown order id {0}")]
    UnknownOrder(String),

    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: String, message: String },
}
