//! Exchange ticker data model.
//!
//! The exchange publishes prices as JSON strings (`"9121.76"`). Each of the six
//! price fields is parsed independently: a malformed field only removes that
//! field from the [`TickerSnapshot`], it never invalidates the whole ticker.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// Ordered set of tradable symbols discovered in one collection cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolSet(Vec<String>);

impl SymbolSet {
    /// Create a symbol set, keeping the given order.
    pub fn new(symbols: Vec<String>) -> Self {
        Self(symbols)
    }

    /// Decode the body of the symbol-list endpoint (a JSON array of strings).
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let symbols: Vec<String> = serde_json::from_slice(body)?;
        Ok(Self(symbols))
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over symbols in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Keep only the symbols matching the predicate, preserving order.
    ///
    /// Returns the number of symbols removed.
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) -> usize {
        let before = self.0.len();
        self.0.retain(|s| keep(s));
        before - self.0.len()
    }

    /// Drop repeated symbols, keeping the first occurrence of each.
    ///
    /// Returns the removed duplicates in the order they were seen.
    pub fn dedup(&mut self) -> Vec<String> {
        let mut seen = HashSet::with_capacity(self.0.len());
        let mut duplicates = Vec::new();
        self.0.retain(|s| {
            if seen.insert(s.clone()) {
                true
            } else {
                duplicates.push(s.clone());
                false
            }
        });
        duplicates
    }
}

impl<'a> IntoIterator for &'a SymbolSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<String> for SymbolSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One of the six price fields of a ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Bid,
    Ask,
}

impl PriceField {
    /// All fields in emission order.
    pub const ALL: [PriceField; 6] = [
        PriceField::Open,
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
        PriceField::Bid,
        PriceField::Ask,
    ];

    /// JSON field name in the ticker response.
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Bid => "bid",
            PriceField::Ask => "ask",
        }
    }
}

impl std::fmt::Display for PriceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw ticker response as returned by the exchange.
///
/// Fields are kept as raw JSON values so that one malformed field cannot
/// fail deserialization of the others. The `changes` array is not read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TickerResponse {
    /// Exchange-formatted symbol (e.g. "BTCUSD"); informational only, never parsed.
    #[serde(default)]
    pub symbol: Option<Value>,
    #[serde(default)]
    pub open: Option<Value>,
    #[serde(default)]
    pub high: Option<Value>,
    #[serde(default)]
    pub low: Option<Value>,
    #[serde(default)]
    pub close: Option<Value>,
    #[serde(default)]
    pub bid: Option<Value>,
    #[serde(default)]
    pub ask: Option<Value>,
}

impl TickerResponse {
    /// Decode the body of the ticker endpoint.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Raw value of a price field, if present.
    pub fn field(&self, field: PriceField) -> Option<&Value> {
        match field {
            PriceField::Open => self.open.as_ref(),
            PriceField::High => self.high.as_ref(),
            PriceField::Low => self.low.as_ref(),
            PriceField::Close => self.close.as_ref(),
            PriceField::Bid => self.bid.as_ref(),
            PriceField::Ask => self.ask.as_ref(),
        }
    }
}

/// Why a price field did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRejection {
    /// Field absent or `null`.
    Missing,
    /// Field present but not a decimal number; holds the raw text.
    Malformed(String),
}

impl std::fmt::Display for FieldRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldRejection::Missing => write!(f, "missing"),
            FieldRejection::Malformed(raw) => write!(f, "malformed value {:?}", raw),
        }
    }
}

/// Parse a raw price value.
///
/// Strings use standard `f64` parsing, JSON numbers are taken as-is. No range
/// checks: zero and negative prices are returned unchanged.
pub fn parse_price(raw: Option<&Value>) -> std::result::Result<f64, FieldRejection> {
    match raw {
        None | Some(Value::Null) => Err(FieldRejection::Missing),
        Some(Value::String(s)) => s
            .parse::<f64>()
            .map_err(|_| FieldRejection::Malformed(s.clone())),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| FieldRejection::Malformed(n.to_string())),
        Some(other) => Err(FieldRejection::Malformed(other.to_string())),
    }
}

/// Parsed prices of one symbol; each field independently optional.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickerSnapshot {
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

impl TickerSnapshot {
    /// Parse all six fields of a response.
    ///
    /// Returns the snapshot along with the fields that were rejected.
    pub fn parse(response: &TickerResponse) -> (Self, Vec<(PriceField, FieldRejection)>) {
        let mut snapshot = Self::default();
        let mut rejected = Vec::new();

        for field in PriceField::ALL {
            match parse_price(response.field(field)) {
                Ok(value) => *snapshot.slot_mut(field) = Some(value),
                Err(rejection) => rejected.push((field, rejection)),
            }
        }

        (snapshot, rejected)
    }

    /// Value of a single field.
    pub fn get(&self, field: PriceField) -> Option<f64> {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::Bid => self.bid,
            PriceField::Ask => self.ask,
        }
    }

    /// Successfully parsed fields, in emission order.
    pub fn prices(&self) -> impl Iterator<Item = (PriceField, f64)> + '_ {
        PriceField::ALL
            .into_iter()
            .filter_map(|field| self.get(field).map(|value| (field, value)))
    }

    fn slot_mut(&mut self, field: PriceField) -> &mut Option<f64> {
        match field {
            PriceField::Open => &mut self.open,
            PriceField::High => &mut self.high,
            PriceField::Low => &mut self.low,
            PriceField::Close => &mut self.close,
            PriceField::Bid => &mut self.bid,
            PriceField::Ask => &mut self.ask,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BTCUSD: &str = r#"{
        "symbol": "BTCUSD",
        "open": "9121.76",
        "high": "9440.66",
        "low": "9106.51",
        "close": "9347.66",
        "changes": ["9365.1", "9386.16", "9373.41"],
        "bid": "9345.70",
        "ask": "9347.67"
    }"#;

    #[test]
    fn test_symbol_set_from_json() {
        let set = SymbolSet::from_json(br#"["btcusd","ethbtc","ethusd"]"#).unwrap();

        assert_eq!(set.len(), 3);
        let symbols: Vec<&str> = set.iter().map(String::as_str).collect();
        assert_eq!(symbols, vec!["btcusd", "ethbtc", "ethusd"]);
    }

    #[test]
    fn test_symbol_set_empty() {
        let set = SymbolSet::from_json(b"[]").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_symbol_set_wrong_shape() {
        assert!(SymbolSet::from_json(br#"{"symbols": ["btcusd"]}"#).is_err());
        assert!(SymbolSet::from_json(b"[1, 2]").is_err());
        assert!(SymbolSet::from_json(b"not json").is_err());
    }

    #[test]
    fn test_symbol_set_retain() {
        let mut set: SymbolSet = ["btcusd", "ethbtc", "ethusd"]
            .into_iter()
            .map(String::from)
            .collect();

        let removed = set.retain(|s| s.ends_with("usd"));

        assert_eq!(removed, 1);
        assert_eq!(set, SymbolSet::new(vec!["btcusd".into(), "ethusd".into()]));
    }

    #[test]
    fn test_symbol_set_dedup_keeps_first() {
        let mut set = SymbolSet::from_json(br#"["btcusd","ethusd","btcusd","zecusd","ethusd"]"#)
            .unwrap();

        let duplicates = set.dedup();

        assert_eq!(duplicates, vec!["btcusd".to_string(), "ethusd".to_string()]);
        let symbols: Vec<&str> = set.iter().map(String::as_str).collect();
        assert_eq!(symbols, vec!["btcusd", "ethusd", "zecusd"]);
        assert!(set.dedup().is_empty());
    }

    #[test]
    fn test_parse_full_ticker() {
        let response = TickerResponse::from_json(BTCUSD.as_bytes()).unwrap();
        let (snapshot, rejected) = TickerSnapshot::parse(&response);

        assert!(rejected.is_empty());
        assert_eq!(snapshot.prices().count(), 6);
        assert!((snapshot.open.unwrap() - 9121.76).abs() < 1e-9);
        assert!((snapshot.high.unwrap() - 9440.66).abs() < 1e-9);
        assert!((snapshot.low.unwrap() - 9106.51).abs() < 1e-9);
        assert!((snapshot.close.unwrap() - 9347.66).abs() < 1e-9);
        assert!((snapshot.bid.unwrap() - 9345.70).abs() < 1e-9);
        assert!((snapshot.ask.unwrap() - 9347.67).abs() < 1e-9);
    }

    #[test]
    fn test_parse_malformed_field_is_isolated() {
        let body = BTCUSD.replace("\"9345.70\"", "\"n/a\"");
        let response = TickerResponse::from_json(body.as_bytes()).unwrap();
        let (snapshot, rejected) = TickerSnapshot::parse(&response);

        assert_eq!(snapshot.bid, None);
        assert_eq!(snapshot.prices().count(), 5);
        assert_eq!(
            rejected,
            vec![(PriceField::Bid, FieldRejection::Malformed("n/a".into()))]
        );
    }

    #[test]
    fn test_odd_symbol_field_keeps_prices() {
        let body = br#"{"symbol": 123, "open": "1", "high": "2", "low": "3",
            "close": "4", "bid": "5", "ask": "6"}"#;
        let response = TickerResponse::from_json(body).unwrap();
        let (snapshot, rejected) = TickerSnapshot::parse(&response);

        assert!(rejected.is_empty());
        assert_eq!(snapshot.prices().count(), 6);
        assert_eq!(snapshot.ask, Some(6.0));
    }

    #[test]
    fn test_parse_missing_and_null_fields() {
        let response =
            TickerResponse::from_json(br#"{"open": "1.5", "high": null}"#).unwrap();
        let (snapshot, rejected) = TickerSnapshot::parse(&response);

        assert_eq!(snapshot.open, Some(1.5));
        assert_eq!(rejected.len(), 5);
        assert!(rejected.iter().all(|(_, r)| *r == FieldRejection::Missing));
    }

    #[test]
    fn test_parse_price_variants() {
        assert_eq!(parse_price(Some(&Value::from("0"))), Ok(0.0));
        assert_eq!(parse_price(Some(&Value::from("-3.25"))), Ok(-3.25));
        assert_eq!(parse_price(Some(&Value::from(42.5))), Ok(42.5));
        assert_eq!(parse_price(None), Err(FieldRejection::Missing));
        assert_eq!(
            parse_price(Some(&Value::from(""))),
            Err(FieldRejection::Malformed(String::new()))
        );
        assert!(matches!(
            parse_price(Some(&Value::Bool(true))),
            Err(FieldRejection::Malformed(_))
        ));
    }

    #[test]
    fn test_prices_order() {
        let snapshot = TickerSnapshot {
            open: Some(1.0),
            close: Some(4.0),
            ask: Some(6.0),
            ..Default::default()
        };

        let fields: Vec<PriceField> = snapshot.prices().map(|(f, _)| f).collect();
        assert_eq!(
            fields,
            vec![PriceField::Open, PriceField::Close, PriceField::Ask]
        );
    }

    #[test]
    fn test_field_rejection_display() {
        assert_eq!(FieldRejection::Missing.to_string(), "missing");
        assert_eq!(
            FieldRejection::Malformed("x".into()).to_string(),
            "malformed value \"x\""
        );
    }
}
