use std::collections::HashMap;

use crate::models::Candle;

/// Groups candles keyed by symbol, sorted chronologically within each
/// bucket, optionally restricted to a known symbol set.
pub fn group_candles_by_symbol(
    candles: &[Candle],
    symbols: Option<&[String]>,
) -> HashMap<String, Vec<Candle>> {
    let mut grouped: HashMap<String, Vec<Candle>> = if let Some(list) = symbols {
        list.iter()
            .map(|symbol| (symbol.clone(), Vec::new()))
            .collect()
    } else {
        HashMap::new()
    };
    let restrict_to_known = symbols.is_some();

    for candle in candles {
        if let Some(bucket) = grouped.get_mut(&candle.symbol) {
            bucket.push(candle.clone());
            continue;
        }
        if !restrict_to_known {
            grouped
                .entry(candle.symbol.clone())
                .or_default()
                .push(candle.clone());
        }
    }

    grouped.retain(|_, values| !values.is_empty());
    for values in grouped.values_mut() {
        values.sort_by(|a, b| a.date.cmp(&b.date));
    }

    grouped
}

/// Normalizes a symbol string by trimming whitespace and uppercasing.
pub fn normalize_symbol(value: &str) -> Option<String> {
    let normalized = value.trim().to_uppercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
