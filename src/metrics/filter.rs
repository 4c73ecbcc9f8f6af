use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::grouping::{self, complete, group, group_pair, slice_outer, sort_buckets};
use super::types::{AggregateBucket, CategorizedClient, Dimension, MonthKey, SortBy};

/// Categorical selection. The exact sentinel `"all"` or an empty string means
/// no filtering; any other spelling is a real value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(v) => v == value,
        }
    }

    pub fn as_value(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Only(v) => Some(v),
        }
    }
}

impl FromStr for Selection {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "all" {
            Ok(Self::All)
        } else {
            Ok(Self::Only(s.to_string()))
        }
    }
}

impl From<Option<String>> for Selection {
    fn from(value: Option<String>) -> Self {
        value
            .map(|v| v.parse().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(v) => f.write_str(v),
        }
    }
}

impl Serialize for Selection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.into())
    }
}

/// Case-insensitive substring match; an empty needle matches everything.
pub fn text_matches(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Filter and ordering state for one aggregation query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryOptions {
    pub month: Option<MonthKey>,
    pub vendor: Selection,
    pub industry: Selection,
    pub min_count: usize,
    pub search_text: String,
    /// `None` keeps first-seen (or canonical) order.
    pub sort_by: Option<SortBy>,
    pub limit: Option<usize>,
}

impl QueryOptions {
    pub fn for_month(month: Option<MonthKey>) -> Self {
        Self {
            month,
            ..Self::default()
        }
    }

    /// Record-level predicates: month, vendor and industry selection.
    pub fn admits(&self, client: &CategorizedClient) -> bool {
        let in_month = match self.month {
            None => true,
            Some(m) => client.record.date.is_some_and(|d| m.contains(d)),
        };
        in_month
            && self.vendor.matches(&client.record.vendor)
            && self.industry.matches(&client.categories.industry)
    }

    /// Bucket-level predicates: minimum count and key search.
    pub fn keeps(&self, bucket: &AggregateBucket) -> bool {
        bucket.count >= self.min_count && text_matches(&bucket.key, &self.search_text)
    }

    fn order(&self, buckets: &mut Vec<AggregateBucket>) {
        if let Some(sort_by) = self.sort_by {
            sort_buckets(buckets, sort_by);
        }
        if let Some(limit) = self.limit {
            buckets.truncate(limit);
        }
    }
}

/// Clients admitted by the record-level predicates of `options`.
pub fn select<'a>(
    clients: &'a [CategorizedClient],
    options: &QueryOptions,
) -> Vec<&'a CategorizedClient> {
    clients.iter().filter(|c| options.admits(c)).collect()
}

/// Record filters → group → bucket filters → ordering.
pub fn query(
    clients: &[CategorizedClient],
    dim: Dimension,
    options: &QueryOptions,
) -> Vec<AggregateBucket> {
    let selected = select(clients, options);
    let grouped = if dim == Dimension::IntegrationNeeds {
        grouping::integration_needs(selected)
    } else {
        group(selected, dim)
    };
    let mut buckets: Vec<AggregateBucket> =
        grouped.into_iter().filter(|b| options.keeps(b)).collect();
    options.order(&mut buckets);
    buckets
}

/// Per-vendor breakdown along `dim`.
///
/// Dimensions with a canonical list come back complete and in canonical
/// order (categories filtered out by `min_count`/`search_text` show as zero).
/// Others are sorted by `sort_by` and truncated to `limit`. Selecting
/// `all` vendors yields an empty result.
pub fn vendor_breakdown(
    clients: &[CategorizedClient],
    dim: Dimension,
    options: &QueryOptions,
) -> Vec<AggregateBucket> {
    let Some(vendor) = options.vendor.as_value() else {
        return Vec::new();
    };
    let record_scope = QueryOptions {
        vendor: Selection::All,
        ..options.clone()
    };
    let pairs = group_pair(select(clients, &record_scope), Dimension::Vendor, dim);
    let kept: Vec<AggregateBucket> = slice_outer(&pairs, vendor)
        .into_iter()
        .filter(|b| options.keeps(b))
        .collect();

    match dim.canonical() {
        Some(canonical) => complete(&kept, canonical),
        None => {
            let mut buckets = kept;
            options.order(&mut buckets);
            buckets
        }
    }
}

/// Filters for the client list view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientFilter {
    /// Matches name, email or vendor.
    pub search: String,
    pub name: String,
    pub email: String,
    pub industry: Selection,
    pub vendor: Selection,
    pub month: Option<MonthKey>,
}

impl ClientFilter {
    pub fn matches(&self, client: &CategorizedClient) -> bool {
        let r = &client.record;
        let matches_search = self.search.trim().is_empty()
            || text_matches(&r.name, &self.search)
            || text_matches(&r.email, &self.search)
            || text_matches(&r.vendor, &self.search);
        let in_month = match self.month {
            None => true,
            Some(m) => r.date.is_some_and(|d| m.contains(d)),
        };
        matches_search
            && text_matches(&r.name, &self.name)
            && text_matches(&r.email, &self.email)
            && self.industry.matches(&client.categories.industry)
            && self.vendor.matches(&r.vendor)
            && in_month
    }

    pub fn apply<'a>(&self, clients: &'a [CategorizedClient]) -> Vec<&'a CategorizedClient> {
        clients.iter().filter(|c| self.matches(c)).collect()
    }
}

/// Sorted distinct values for the list view's selectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Facets {
    pub industries: Vec<String>,
    pub vendors: Vec<String>,
}

pub fn facets(clients: &[CategorizedClient]) -> Facets {
    let industries: BTreeSet<&str> = clients
        .iter()
        .map(|c| c.categories.industry.as_str())
        .collect();
    let vendors: BTreeSet<&str> = clients.iter().map(|c| c.record.vendor.as_str()).collect();
    Facets {
        industries: industries.into_iter().map(String::from).collect(),
        vendors: vendors.into_iter().map(String::from).collect(),
    }
}
