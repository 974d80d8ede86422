//! In-process request metrics rendered in the Prometheus text format.
//!
//! Two families are tracked, both labelled by `code`, `method`, `cache` and
//! `contenttype`:
//!
//! - `http_requests_total`: request counter
//! - `http_durations_seconds`: summary of request durations (`_sum` and `_count`)

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Label set identifying one series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestLabels {
    /// HTTP status code
    pub code: u16,

    /// Request method
    pub method: String,

    /// `hit`, `miss`, or empty when the response did not come from the cache
    pub cache: String,

    /// Response content type without parameters
    pub content_type: String,
}

impl RequestLabels {
    pub fn new(
        code: u16,
        method: impl Into<String>,
        cache: impl Into<String>,
        content_type: &str,
    ) -> Self {
        Self {
            code,
            method: method.into(),
            cache: cache.into(),
            content_type: content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Series {
    count: u64,
    duration_sum: f64,
}

/// Thread-safe request metrics registry.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    series: Mutex<BTreeMap<RequestLabels, Series>>,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed request.
    pub fn record(&self, labels: RequestLabels, duration: Duration) {
        let mut series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = series.entry(labels).or_default();
        entry.count += 1;
        entry.duration_sum += duration.as_secs_f64();
    }

    /// Number of requests recorded for `labels`.
    pub fn request_count(&self, labels: &RequestLabels) -> u64 {
        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        series.get(labels).map_or(0, |s| s.count)
    }

    /// Render all series in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();

        out.push_str("# HELP http_requests_total Count of all HTTP requests\n");
        out.push_str("# TYPE http_requests_total counter\n");
        for (labels, s) in series.iter() {
            let _ = writeln!(out, "http_requests_total{} {}", format_labels(labels), s.count);
        }

        out.push_str("# HELP http_durations_seconds HTTP request latency distributions\n");
        out.push_str("# TYPE http_durations_seconds summary\n");
        for (labels, s) in series.iter() {
            let labels = format_labels(labels);
            let _ = writeln!(out, "http_durations_seconds_sum{} {}", labels, s.duration_sum);
            let _ = writeln!(out, "http_durations_seconds_count{} {}", labels, s.count);
        }

        out
    }
}

fn format_labels(labels: &RequestLabels) -> String {
    format!(
        "{{code=\"{}\",method=\"{}\",cache=\"{}\",contenttype=\"{}\"}}",
        labels.code,
        escape_label(&labels.method),
        escape_label(&labels.cache),
        escape_label(&labels.content_type)
    )
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

// =============================================================================
// Tests
// =============================================================================
