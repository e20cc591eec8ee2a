// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Capturing logs and metrics in unit tests.

use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::{
    InMemoryMetricExporter, SdkMeterProvider,
    data::{AggregatedMetrics, Metric, MetricData, ResourceMetrics, ScopeMetrics},
};
use tracing_subscriber::fmt::MakeWriter;

/// An in-memory meter provider whose exported attributes can be inspected.
#[derive(Debug)]
pub(crate) struct MetricTester {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl MetricTester {
    pub(crate) fn new() -> Self {
        let exporter = InMemoryMetricExporter::default();
        Self {
            provider: SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build(),
            exporter,
        }
    }

    pub(crate) fn meter_provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    pub(crate) fn assert_attributes_contain(&self, expected: &[KeyValue]) {
        self.provider.force_flush().expect("flush failed");
        let collected: Vec<KeyValue> = self
            .exporter
            .get_finished_metrics()
            .expect("metrics unavailable")
            .iter()
            .flat_map(ResourceMetrics::scope_metrics)
            .flat_map(ScopeMetrics::metrics)
            .flat_map(attributes_of)
            .collect();

        for attribute in expected {
            assert!(
                collected.contains(attribute),
                "attribute {attribute:?} not found in {collected:?}"
            );
        }
    }

    /// Sums the `cache.event.count` points carrying `attribute`, as of the latest export.
    pub(crate) fn event_count(&self, attribute: &KeyValue) -> u64 {
        self.provider.force_flush().expect("flush failed");
        let exported = self.exporter.get_finished_metrics().expect("metrics unavailable");
        let Some(latest) = exported.last() else {
            return 0;
        };

        latest
            .scope_metrics()
            .flat_map(ScopeMetrics::metrics)
            .filter(|metric| metric.name() == "cache.event.count")
            .map(|metric| match metric.data() {
                AggregatedMetrics::U64(MetricData::Sum(sum)) => sum
                    .data_points()
                    .filter(|point| point.attributes().any(|a| a == attribute))
                    .map(|point| point.value())
                    .sum(),
                _ => 0,
            })
            .sum()
    }
}

fn attributes_of(metric: &Metric) -> Vec<KeyValue> {
    macro_rules! points {
        ($data:expr) => {
            match $data {
                MetricData::Gauge(d) => d.data_points().flat_map(|p| p.attributes().cloned()).collect(),
                MetricData::Sum(d) => d.data_points().flat_map(|p| p.attributes().cloned()).collect(),
                MetricData::Histogram(d) => d.data_points().flat_map(|p| p.attributes().cloned()).collect(),
                MetricData::ExponentialHistogram(d) => d.data_points().flat_map(|p| p.attributes().cloned()).collect(),
            }
        };
    }

    match metric.data() {
        AggregatedMetrics::F64(data) => points!(data),
        AggregatedMetrics::U64(data) => points!(data),
        AggregatedMetrics::I64(data) => points!(data),
    }
}

/// Collects formatted `tracing` output into a shared buffer.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().expect("poisoned")).into_owned()
    }

    pub(crate) fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(output.contains(expected), "log output does not contain '{expected}':\n{output}");
    }

    /// A subscriber writing into this capture, for use with `set_default`.
    pub(crate) fn subscriber(&self) -> impl tracing::Subscriber {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter(Arc::clone(&self.buffer))
    }
}

pub(crate) struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
