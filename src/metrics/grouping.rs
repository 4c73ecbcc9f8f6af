use std::collections::HashMap;
use std::hash::Hash;

use super::types::{
    AggregateBucket, CategorizedClient, Dimension, NOT_AVAILABLE, PairBucket, PairKey, SortBy,
};

/// Insertion-ordered accumulator: buckets come out in first-seen key order.
struct Accumulator<K> {
    index: HashMap<K, usize>,
    buckets: Vec<AggregateBucket<K>>,
}

impl<K: Clone + Eq + Hash> Accumulator<K> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            buckets: Vec::new(),
        }
    }

    fn add(&mut self, key: K, closed: bool) {
        let idx = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                self.buckets.push(AggregateBucket::empty(key.clone()));
                self.index.insert(key, self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };
        self.buckets[idx].record(closed);
    }

    fn finish(self) -> Vec<AggregateBucket<K>> {
        self.buckets
    }
}

/// Group clients by one dimension. Multi-valued dimensions fan out, so the
/// bucket counts of `SolutionPart`/`UsefulAddons` may sum past `clients.len()`.
pub fn group<'a, I>(clients: I, dim: Dimension) -> Vec<AggregateBucket>
where
    I: IntoIterator<Item = &'a CategorizedClient>,
{
    let mut acc = Accumulator::new();
    for client in clients {
        for value in dim.values(client) {
            acc.add(value.to_string(), client.record.closed);
        }
    }
    acc.finish()
}

/// Group clients by an (outer, inner) pair, one bucket per observed pair.
pub fn group_pair<'a, I>(clients: I, outer: Dimension, inner: Dimension) -> Vec<PairBucket>
where
    I: IntoIterator<Item = &'a CategorizedClient>,
{
    let mut acc = Accumulator::new();
    for client in clients {
        let inner_values = inner.values(client);
        for o in outer.values(client) {
            for i in &inner_values {
                acc.add(
                    PairKey {
                        outer: o.to_string(),
                        inner: i.to_string(),
                    },
                    client.record.closed,
                );
            }
        }
    }
    acc.finish()
}

/// Re-key buckets onto a canonical category list: canonical order, zero
/// buckets for unobserved categories, observed values outside the list dropped.
pub fn complete(buckets: &[AggregateBucket], canonical: &[&str]) -> Vec<AggregateBucket> {
    canonical
        .iter()
        .map(|&label| {
            buckets
                .iter()
                .find(|b| b.key == label)
                .cloned()
                .unwrap_or_else(|| AggregateBucket::empty(label.to_string()))
        })
        .collect()
}

/// Inner buckets of `group_pair` for a single outer value, keyed by inner value.
pub fn slice_outer(pairs: &[PairBucket], outer: &str) -> Vec<AggregateBucket> {
    pairs
        .iter()
        .filter(|p| p.key.outer == outer)
        .map(|p| AggregateBucket::from_counts(p.key.inner.clone(), p.count, p.closed_count))
        .collect()
}

/// Integration needs exclude the "N/A" bucket whenever a real need exists.
/// No closed filter is applied here; the backend scopes this metric to
/// non-closed clients before categorizing.
pub fn integration_needs<'a, I>(clients: I) -> Vec<AggregateBucket>
where
    I: IntoIterator<Item = &'a CategorizedClient>,
{
    let buckets = group(clients, Dimension::IntegrationNeeds);
    if buckets.iter().any(|b| b.key != NOT_AVAILABLE) {
        buckets.into_iter().filter(|b| b.key != NOT_AVAILABLE).collect()
    } else {
        buckets
    }
}

/// Stable descending sort: equal keys keep their first-seen order.
pub fn sort_buckets<K>(buckets: &mut [AggregateBucket<K>], sort_by: SortBy) {
    match sort_by {
        SortBy::Conversion => buckets.sort_by(|a, b| {
            b.conversion_rate
                .partial_cmp(&a.conversion_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        SortBy::Total => buckets.sort_by(|a, b| b.count.cmp(&a.count)),
    }
}

/// Mean of bucket conversion rates, 0 for an empty set.
pub fn average_conversion<K>(buckets: &[AggregateBucket<K>]) -> f64 {
    if buckets.is_empty() {
        return 0.0;
    }
    buckets.iter().map(|b| b.conversion_rate).sum::<f64>() / buckets.len() as f64
}
