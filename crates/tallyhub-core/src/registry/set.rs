use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter;

use crate::bucket::Boundaries;

/// Registry key: one metric name paired with its single label dimension.
///
/// Ordered by the bytes of `name|label`, so `req_a|x` sorts before `req|x`.
/// Exposition walks keys in this order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricKey {
    pub name: String,
    pub label: String,
}

impl MetricKey {
    pub fn new(name: &str, label: &str) -> Self {
        Self { name: name.to_owned(), label: label.to_owned() }
    }

    fn combined(&self) -> impl Iterator<Item = u8> + '_ {
        self.name.bytes().chain(iter::once(b'|')).chain(self.label.bytes())
    }
}

impl Ord for MetricKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Names containing '|' can collide on the combined bytes; the field
        // comparison keeps distinct keys distinct.
        self.combined()
            .cmp(other.combined())
            .then_with(|| (&self.name, &self.label).cmp(&(&other.name, &other.label)))
    }
}

impl PartialOrd for MetricKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Accumulators for one `MetricKey`, keyed by label value.
///
/// Counters and the duration trio are independent: a key fed only through
/// `inc_counter` has empty duration maps and vice versa.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    pub counters: BTreeMap<String, u64>,
    pub duration_counts: BTreeMap<String, u64>,
    pub duration_sums: BTreeMap<String, f64>,
    /// label value -> boundary name -> cumulative count
    pub bucket_counts: BTreeMap<String, BTreeMap<String, u64>>,
}

impl MetricSet {
    pub(crate) fn add_counter(&mut self, label_value: &str, delta: u64) {
        let c = self.counters.entry(label_value.to_owned()).or_default();
        *c = c.saturating_add(delta);
    }

    pub(crate) fn add_observation(&mut self, boundaries: &Boundaries, label_value: &str, seconds: f64) {
        let c = self.duration_counts.entry(label_value.to_owned()).or_default();
        *c = c.saturating_add(1);
        *self.duration_sums.entry(label_value.to_owned()).or_default() += seconds;

        let mut matched = boundaries.matching(seconds).peekable();
        if matched.peek().is_none() {
            return;
        }
        let buckets = self.bucket_counts.entry(label_value.to_owned()).or_default();
        for b in matched {
            let n = buckets.entry(b.name.clone()).or_default();
            *n = n.saturating_add(1);
        }
    }

    /// Fold `other` into `self` entrywise. Bucket counts for boundary names
    /// outside `boundaries` are discarded; returns how many were.
    pub(crate) fn absorb(&mut self, other: MetricSet, boundaries: &Boundaries) -> usize {
        for (v, n) in other.counters {
            let c = self.counters.entry(v).or_default();
            *c = c.saturating_add(n);
        }
        for (v, n) in other.duration_counts {
            let c = self.duration_counts.entry(v).or_default();
            *c = c.saturating_add(n);
        }
        for (v, s) in other.duration_sums {
            *self.duration_sums.entry(v).or_default() += s;
        }

        let mut dropped = 0;
        for (v, incoming) in other.bucket_counts {
            let mut known = incoming
                .into_iter()
                .filter(|(name, _)| {
                    let keep = boundaries.contains_name(name);
                    if !keep {
                        dropped += 1;
                    }
                    keep
                })
                .peekable();
            if known.peek().is_none() {
                continue;
            }
            let buckets = self.bucket_counts.entry(v).or_default();
            for (name, n) in known {
                let c = buckets.entry(name).or_default();
                *c = c.saturating_add(n);
            }
        }
        dropped
    }

    /// Count recorded for `label_value` in the bucket named `boundary`.
    pub fn bucket_count(&self, label_value: &str, boundary: &str) -> u64 {
        self.bucket_counts
            .get(label_value)
            .and_then(|b| b.get(boundary))
            .copied()
            .unwrap_or(0)
    }

    /// Bucket count for `boundary` summed over every label value.
    pub fn bucket_total(&self, boundary: &str) -> u64 {
        self.bucket_counts
            .values()
            .filter_map(|b| b.get(boundary))
            .fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    pub fn total_count(&self) -> u64 {
        self.duration_counts.values().fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    pub fn total_sum(&self) -> f64 {
        self.duration_sums.values().sum()
    }
}
