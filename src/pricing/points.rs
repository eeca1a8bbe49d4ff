use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::models::decimal_from_json;

/// A parsed price point.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub value: Decimal,
    /// `None` when the point carried no parseable timestamp.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Pull the point list out of a historical-price payload. Accepted shapes:
///
/// - `{"data": {"prices": [...]}}`
/// - `{"data": [...]}`
/// - `{"prices": [...]}`
///
/// Anything else yields no points.
pub fn extract_price_points(payload: &Value) -> &[Value] {
    let data = payload.get("data");

    if let Some(prices) = data.and_then(|d| d.get("prices")).and_then(Value::as_array) {
        return prices;
    }
    if let Some(list) = data.and_then(Value::as_array) {
        return list;
    }
    if let Some(prices) = payload.get("prices").and_then(Value::as_array) {
        return prices;
    }
    &[]
}

/// Parse raw points; entries without a usable `value` are dropped.
pub fn parse_points(raw: &[Value]) -> Vec<PricePoint> {
    raw.iter()
        .filter_map(|p| {
            let value = p.get("value").and_then(decimal_from_json)?;
            let timestamp = p
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|dt| dt.with_timezone(&Utc));
            Some(PricePoint { value, timestamp })
        })
        .collect()
}

/// The authoritative point of `date`: the one with the latest timestamp
/// inside the day. Untimestamped points rank below every timestamped one;
/// points stamped on another day are ignored.
pub fn latest_in_day(points: &[PricePoint], date: NaiveDate) -> Option<&PricePoint> {
    points
        .iter()
        .filter(|p| p.timestamp.map_or(true, |ts| ts.date_naive() == date))
        .max_by_key(|p| p.timestamp)
}
