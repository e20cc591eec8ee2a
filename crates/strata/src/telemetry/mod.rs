// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-operation cache telemetry.
//!
//! With the `logs` feature every cache operation can emit a structured
//! `tracing` event, and with the `metrics` feature it records OpenTelemetry
//! instruments. Both are opt-in per cache through the builder.

use std::{sync::Arc, time::Duration};

use tracing::Level;

pub(crate) mod attributes;
pub(crate) mod timing;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Get,
    Insert,
    Invalidate,
    Clear,
    ScopedGet,
    ScopedSet,
}

impl CacheOperation {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Insert => "cache.insert",
            Self::Invalidate => "cache.invalidate",
            Self::Clear => "cache.clear",
            Self::ScopedGet => "cache.scoped_get",
            Self::ScopedSet => "cache.scoped_set",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Skipped,
    Inserted,
    Invalidated,
    Cleared,
    Error,
}

impl CacheActivity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Skipped => "cache.skipped",
            Self::Inserted => "cache.inserted",
            Self::Invalidated => "cache.invalidated",
            Self::Cleared => "cache.cleared",
            Self::Error => "cache.error",
        }
    }

    pub(crate) fn level(self) -> Level {
        match self {
            Self::Hit | Self::Miss | Self::Skipped => Level::DEBUG,
            Self::Inserted | Self::Invalidated | Self::Cleared => Level::INFO,
            Self::Error => Level::ERROR,
        }
    }
}

#[derive(Debug)]
struct CacheTelemetryInner {
    logging_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    instruments: Option<metrics::Instruments>,
}

/// Records cache operations as logs and metrics.
///
/// The default value records nothing.
#[derive(Clone, Debug, Default)]
pub(crate) struct CacheTelemetry {
    inner: Option<Arc<CacheTelemetryInner>>,
}

impl CacheTelemetry {
    pub(crate) fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub(crate) fn record(&self, cache_name: &str, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        let Some(inner) = &self.inner else {
            return;
        };

        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &inner.instruments {
            use opentelemetry::KeyValue;

            let attributes = [
                KeyValue::new(attributes::CACHE_NAME, cache_name.to_owned()),
                KeyValue::new(attributes::CACHE_OPERATION_NAME, operation.as_str()),
                KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str()),
            ];
            instruments.record_event(&attributes, duration.map(|d| d.as_secs_f64()));
        }

        if inner.logging_enabled {
            Self::emit(cache_name, operation, activity, duration);
        }
    }

    #[cfg_attr(
        not(any(feature = "metrics", test)),
        expect(unused_variables, reason = "sizes are only recorded as metrics")
    )]
    pub(crate) fn record_size(&self, cache_name: &str, size: u64) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = self.inner.as_ref().and_then(|inner| inner.instruments.as_ref()) {
            let attributes = [opentelemetry::KeyValue::new(attributes::CACHE_NAME, cache_name.to_owned())];
            instruments.record_size(&attributes, size);
        }
    }

    fn emit(cache_name: &str, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        let op = operation.as_str();
        let act = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());

        // Field names must match the constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = act,
                    cache.duration_ns = ?duration_ns,
                    "cache.event"
                )
            };
        }

        let level = activity.level();
        if level == Level::ERROR {
            emit_event!(error);
        } else if level == Level::INFO {
            emit_event!(info);
        } else {
            emit_event!(debug);
        }
    }
}

/// Collects telemetry settings while a cache is being built.
#[derive(Clone, Debug, Default)]
pub(crate) struct TelemetryConfig {
    logs_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    instruments: Option<metrics::Instruments>,
}

impl TelemetryConfig {
    #[cfg(any(feature = "logs", test))]
    pub(crate) fn with_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn with_metrics(self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        Self {
            instruments: Some(metrics::Instruments::new(provider)),
            ..self
        }
    }

    pub(crate) fn build(self) -> CacheTelemetry {
        #[cfg(any(feature = "metrics", test))]
        let enabled = self.logs_enabled || self.instruments.is_some();
        #[cfg(not(any(feature = "metrics", test)))]
        let enabled = self.logs_enabled;

        CacheTelemetry {
            inner: enabled.then(|| {
                Arc::new(CacheTelemetryInner {
                    logging_enabled: self.logs_enabled,
                    #[cfg(any(feature = "metrics", test))]
                    instruments: self.instruments,
                })
            }),
        }
    }
}
