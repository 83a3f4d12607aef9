//! Mapping from collection cycles to Prometheus metric families.
//!
//! Each scrape builds a throwaway [`Registry`] holding one [`ScrapeSnapshot`],
//! so nothing from a previous cycle can leak into the output. Families are
//! written in catalog order; inside a family, samples keep discovery order.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use prometheus_client::collector::Collector;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::counter::ConstCounter;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;

use crate::catalog::MetricCatalog;
use crate::collector::{CollectorStats, CycleReport, MetricSample};

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// The samples of one cycle plus the exporter's own counters.
#[derive(Debug)]
pub struct ScrapeSnapshot {
    catalog: Arc<MetricCatalog>,
    samples: Vec<MetricSample>,
    stats: CollectorStats,
}

impl ScrapeSnapshot {
    /// Take the samples out of a cycle report.
    pub fn new(catalog: Arc<MetricCatalog>, report: CycleReport, stats: CollectorStats) -> Self {
        Self {
            catalog,
            samples: report.samples,
            stats,
        }
    }

    fn encode_cycle(&self, encoder: &mut DescriptorEncoder) -> Result<(), std::fmt::Error> {
        for descriptor in self.catalog.describe() {
            let family: Vec<&MetricSample> = self
                .samples
                .iter()
                .filter(|s| s.kind == descriptor.kind)
                .collect();
            if family.is_empty() {
                continue;
            }

            let mut metric_encoder = encoder.encode_descriptor(
                descriptor.name,
                descriptor.help,
                None,
                MetricType::Gauge,
            )?;

            match descriptor.labels.first() {
                // Unlabeled families (`up`) carry exactly one sample per cycle.
                None => {
                    if let Some(sample) = family.last() {
                        ConstGauge::new(sample.value).encode(metric_encoder)?;
                    }
                }
                Some(label) => {
                    for sample in family {
                        let symbol =
                            escape_label_value(sample.symbol.as_deref().unwrap_or_default());
                        ConstGauge::new(sample.value).encode(
                            metric_encoder.encode_family(&[(*label, symbol.as_str())])?,
                        )?;
                    }
                }
            }
        }

        Ok(())
    }

    fn encode_stats(&self, encoder: &mut DescriptorEncoder) -> Result<(), std::fmt::Error> {
        let counters = [
            (
                "exporter_cycles",
                "Collection cycles run.",
                self.stats.cycles,
            ),
            (
                "exporter_cycles_failed",
                "Collection cycles whose symbol discovery failed.",
                self.stats.cycles_failed,
            ),
            (
                "exporter_ticker_failures",
                "Ticker fetches that failed.",
                self.stats.ticker_failures,
            ),
            (
                "exporter_field_parse_failures",
                "Price fields omitted because they were missing or malformed.",
                self.stats.field_parse_failures,
            ),
        ];

        for (name, help, value) in counters {
            let metric_encoder = encoder.encode_descriptor(name, help, None, MetricType::Counter)?;
            ConstCounter::new(value).encode(metric_encoder)?;
        }

        let metric_encoder = encoder.encode_descriptor(
            "exporter_last_cycle_duration_seconds",
            "Duration of the most recent collection cycle.",
            None,
            MetricType::Gauge,
        )?;
        ConstGauge::new(self.stats.last_cycle_duration.as_secs_f64()).encode(metric_encoder)?;

        Ok(())
    }
}

impl Collector for ScrapeSnapshot {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), std::fmt::Error> {
        self.encode_cycle(&mut encoder)?;
        self.encode_stats(&mut encoder)
    }
}

/// Render a snapshot in OpenMetrics text format.
pub fn render(
    snapshot: ScrapeSnapshot,
    default_labels: &HashMap<String, String>,
) -> Result<String, std::fmt::Error> {
    // Sorted for stable output.
    let labels: BTreeMap<&String, &String> = default_labels.iter().collect();
    let labels = labels
        .into_iter()
        .map(|(k, v)| (Cow::Owned(k.clone()), Cow::Owned(escape_label_value(v))));

    let mut registry =
        Registry::with_prefix_and_labels(snapshot.catalog.namespace().to_string(), labels);
    registry.register_collector(Box::new(snapshot));

    let mut buffer = String::new();
    encode(&mut buffer, &registry)?;
    Ok(buffer)
}

/// Escape a label value for the text exposition (the encoder writes it verbatim).
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}
