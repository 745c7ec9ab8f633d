//! Histogram boundaries and the cumulative bucketer.
//!
//! Boundaries are kept ascending and finite. `+Inf` is never stored: the
//! exposition encoder derives it from the observation count.

use std::sync::Arc;

use crate::error::{Result, TallyError};

/// Default latency buckets, in seconds.
pub const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// One histogram bucket upper bound.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketBoundary {
    /// Canonical text form of `value`, used as the `le` label and bucket key.
    pub name: String,
    pub value: f64,
}

impl BucketBoundary {
    pub fn new(value: f64) -> Self {
        Self { name: format_boundary(value), value }
    }
}

/// Immutable ascending boundary list, shared by every metric set of a registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundaries(Arc<[BucketBoundary]>);

impl Boundaries {
    /// Build from arbitrary values: sorted ascending, duplicates removed.
    pub fn new(values: &[f64]) -> Result<Self> {
        if let Some(&bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(TallyError::InvalidBoundary(bad));
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        sorted.dedup();
        Ok(Self::from_sorted(sorted))
    }

    fn from_sorted(values: impl IntoIterator<Item = f64>) -> Self {
        Self(values.into_iter().map(BucketBoundary::new).collect())
    }

    /// Wrap boundaries that were already validated (snapshot decoding).
    pub(crate) fn from_validated(list: Vec<BucketBoundary>) -> Self {
        Self(list.into())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BucketBoundary> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.0.iter().any(|b| b.name == name)
    }

    /// Every boundary whose bucket an observation of `value` falls into
    /// (`b.value >= value`, inclusive "le").
    ///
    /// Scans from the largest boundary down and stops at the first one below
    /// `value`. Values above every finite boundary match nothing; they only
    /// show up in the `+Inf` total.
    pub fn matching(&self, value: f64) -> impl Iterator<Item = &BucketBoundary> + '_ {
        self.0.iter().rev().take_while(move |b| b.value >= value)
    }
}

impl Default for Boundaries {
    fn default() -> Self {
        Self::from_sorted(DEFAULT_BUCKETS)
    }
}

/// Shortest text form of a boundary, `%g` style: plain decimal when the
/// decimal exponent is in `[-4, 6)`, scientific (`1e+06`, `2.5e-05`) otherwise.
pub fn format_boundary(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let sci = format!("{value:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return value.to_string();
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return value.to_string();
    };
    if (-4..6).contains(&exp) {
        return value.to_string();
    }
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
}
