//! OpenMetrics text exposition.
//!
//! Output is deterministic: keys come out of the store already ordered by
//! (metric name, label name), label values in lexicographic order.
//!
//! ```text
//! # TYPE hits counter
//! # HELP hits A counter of the hits.
//! hits_total{code="200"} 5
//! # TYPE req_seconds summary
//! # UNIT req_seconds seconds
//! # HELP req_seconds A summary of the req.
//! req_seconds_count{path="/a"} 2
//! req_seconds_sum{path="/a"} 2.300
//! # TYPE req_total_seconds histogram
//! # UNIT req_total_seconds seconds
//! # HELP req_total_seconds A histogram of the req.
//! req_total_seconds_bucket{le="0.5"} 1
//! req_total_seconds_bucket{le="+Inf"} 2
//! req_total_seconds_sum 2.300
//! req_total_seconds_count 2
//! # EOF
//! ```

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::bucket::Boundaries;
use crate::registry::{MetricKey, MetricSet};

/// Content type for the text rendered here.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Escape `\`, `"` and newlines per the text format quoting rule.
pub fn escape(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Sample value with three decimals; non-finite values use the text-format
/// spellings `+Inf`, `-Inf` and `NaN`.
pub fn format_sum(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        format!("{v:.3}")
    }
}

pub(crate) fn render(boundaries: &Boundaries, sets: &BTreeMap<MetricKey, MetricSet>) -> String {
    let mut out = String::with_capacity(4096);
    for (key, set) in sets {
        let name = escape(&key.name);
        let label = escape(&key.label);
        let words = name.replace('_', " ");

        if !set.counters.is_empty() {
            write_counters(&mut out, &name, &label, &words, set);
        }
        if !set.duration_counts.is_empty() {
            write_summary(&mut out, &name, &label, &words, set);
            write_histogram(&mut out, &name, &words, boundaries, set);
        }
    }
    out.push_str("# EOF\n");
    out
}

fn write_counters(out: &mut String, name: &str, label: &str, words: &str, set: &MetricSet) {
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "# HELP {name} A counter of the {words}.");
    for (value, count) in &set.counters {
        let _ = writeln!(out, "{name}_total{{{label}=\"{}\"}} {count}", escape(value));
    }
}

fn write_summary(out: &mut String, name: &str, label: &str, words: &str, set: &MetricSet) {
    let _ = writeln!(out, "# TYPE {name}_seconds summary");
    let _ = writeln!(out, "# UNIT {name}_seconds seconds");
    let _ = writeln!(out, "# HELP {name}_seconds A summary of the {words}.");
    for (value, count) in &set.duration_counts {
        let value_esc = escape(value);
        let sum = set.duration_sums.get(value).copied().unwrap_or(0.0);
        let _ = writeln!(out, "{name}_seconds_count{{{label}=\"{value_esc}\"}} {count}");
        let _ = writeln!(out, "{name}_seconds_sum{{{label}=\"{value_esc}\"}} {}", format_sum(sum));
    }
}

// Aggregated across label values; `+Inf` is the total observation count.
fn write_histogram(out: &mut String, name: &str, words: &str, boundaries: &Boundaries, set: &MetricSet) {
    let count = set.total_count();
    let sum = set.total_sum();

    let _ = writeln!(out, "# TYPE {name}_total_seconds histogram");
    let _ = writeln!(out, "# UNIT {name}_total_seconds seconds");
    let _ = writeln!(out, "# HELP {name}_total_seconds A histogram of the {words}.");
    for b in boundaries.iter() {
        let _ = writeln!(
            out,
            "{name}_total_seconds_bucket{{le=\"{}\"}} {}",
            escape(&b.name),
            set.bucket_total(&b.name)
        );
    }
    let _ = writeln!(out, "{name}_total_seconds_bucket{{le=\"+Inf\"}} {count}");
    let _ = writeln!(out, "{name}_total_seconds_sum {}", format_sum(sum));
    let _ = writeln!(out, "{name}_total_seconds_count {count}");
}
