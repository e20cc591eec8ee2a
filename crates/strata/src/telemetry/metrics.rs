// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! OpenTelemetry instruments for cache operations.

use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Gauge, Histogram, MeterProvider},
};

const SCOPE_NAME: &str = "strata";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

/// The instruments every cache records into.
#[derive(Clone, Debug)]
pub(crate) struct Instruments {
    events: Counter<u64>,
    duration: Histogram<f64>,
    size: Gauge<u64>,
}

impl Instruments {
    pub(crate) fn new(provider: &dyn MeterProvider) -> Self {
        let meter = provider.meter_with_scope(
            InstrumentationScope::builder(SCOPE_NAME)
                .with_version(env!("CARGO_PKG_VERSION"))
                .with_schema_url(SCHEMA_URL)
                .build(),
        );

        Self {
            events: meter
                .u64_counter("cache.event.count")
                .with_description("Cache events")
                .with_unit("{event}")
                .build(),
            duration: meter
                .f64_histogram("cache.operation.duration")
                .with_description("Cache operation duration")
                .with_unit("s")
                .build(),
            size: meter
                .u64_gauge("cache.size")
                .with_description("Number of entries in the cache")
                .with_unit("{entry}")
                .build(),
        }
    }

    pub(crate) fn record_event(&self, attributes: &[KeyValue], seconds: Option<f64>) {
        self.events.add(1, attributes);
        if let Some(seconds) = seconds {
            self.duration.record(seconds, attributes);
        }
    }

    pub(crate) fn record_size(&self, attributes: &[KeyValue], size: u64) {
        self.size.record(size, attributes);
    }
}
