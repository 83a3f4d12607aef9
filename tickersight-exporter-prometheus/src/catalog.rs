//! Fixed catalog of the metrics this exporter publishes.
//!
//! The catalog is built once at startup and shared with the collector. It is
//! the `Describe` side of the exporter: the set of metric families never
//! changes at runtime, only their samples do.

use tickersight_common::PriceField;

/// Label carrying the exchange symbol on every price metric.
pub const CURRENCY_LABEL: &str = "currency";

/// Identity of a published metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Whether symbol discovery succeeded in the current cycle.
    Up,
    /// A per-symbol price gauge.
    Price(PriceField),
}

impl MetricKind {
    /// All kinds in describe order.
    pub const ALL: [MetricKind; 7] = [
        MetricKind::Up,
        MetricKind::Price(PriceField::Open),
        MetricKind::Price(PriceField::High),
        MetricKind::Price(PriceField::Low),
        MetricKind::Price(PriceField::Close),
        MetricKind::Price(PriceField::Bid),
        MetricKind::Price(PriceField::Ask),
    ];
}

/// Descriptor of one gauge family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub kind: MetricKind,
    /// Name without the namespace prefix.
    pub name: &'static str,
    pub help: &'static str,
    /// Label names, in order.
    pub labels: &'static [&'static str],
}

impl MetricDescriptor {
    fn for_kind(kind: MetricKind) -> Self {
        let (name, help, labels): (_, _, &'static [&'static str]) = match kind {
            MetricKind::Up => ("up", "Was the last query successful.", &[]),
            MetricKind::Price(PriceField::Open) => (
                "opening_price",
                "Open price from 24 hours ago (per Currency).",
                &[CURRENCY_LABEL],
            ),
            MetricKind::Price(PriceField::High) => (
                "high_price",
                "High price from 24 hours ago (per Currency).",
                &[CURRENCY_LABEL],
            ),
            MetricKind::Price(PriceField::Low) => (
                "low_price",
                "Low price from 24 hours ago (per Currency).",
                &[CURRENCY_LABEL],
            ),
            MetricKind::Price(PriceField::Close) => (
                "close_price",
                "Close price (most recent trade) (per Currency).",
                &[CURRENCY_LABEL],
            ),
            MetricKind::Price(PriceField::Bid) => (
                "bid_price",
                "Current best bid (per Currency).",
                &[CURRENCY_LABEL],
            ),
            MetricKind::Price(PriceField::Ask) => (
                "ask_price",
                "Current best offer (per Currency).",
                &[CURRENCY_LABEL],
            ),
        };

        Self {
            kind,
            name,
            help,
            labels,
        }
    }
}

/// The process-lifetime set of metric descriptors.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    namespace: String,
    descriptors: Vec<MetricDescriptor>,
}

impl MetricCatalog {
    /// Build the catalog for the given namespace (metric name prefix).
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            descriptors: MetricKind::ALL
                .into_iter()
                .map(MetricDescriptor::for_kind)
                .collect(),
        }
    }

    /// Metric name prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Enumerate all descriptors, `up` first.
    pub fn describe(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.descriptors.iter()
    }

    /// Look up the descriptor of a kind.
    pub fn get(&self, kind: MetricKind) -> &MetricDescriptor {
        // Built from MetricKind::ALL, so every kind is present.
        self.descriptors
            .iter()
            .find(|d| d.kind == kind)
            .unwrap_or(&self.descriptors[0])
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::new("crypto")
    }
}
