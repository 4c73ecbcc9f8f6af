use serde::{Deserialize, Serialize};

use super::catalog;
use super::filter::{QueryOptions, select};
use super::grouping::{complete, group, group_pair, integration_needs, sort_buckets};
use super::timeseries::year_series;
use super::types::{
    AggregateBucket, CategorizedClient, Dimension, MonthBucket, PairBucket, SortBy,
    conversion_rate,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Overview {
    pub total_clients: usize,
    pub closed_deals: usize,
    pub conversion_rate: f64,
    #[serde(alias = "averageInteractionVolume")]
    pub average_estimated_volume: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorSummary {
    #[serde(alias = "vendedor")]
    pub vendor: String,
    pub total_clients: usize,
    pub closed_deals: usize,
    pub conversion_rate: f64,
}

impl From<AggregateBucket> for VendorSummary {
    fn from(b: AggregateBucket) -> Self {
        Self {
            vendor: b.key,
            total_clients: b.count,
            closed_deals: b.closed_count,
            conversion_rate: b.conversion_rate,
        }
    }
}

pub fn overview<'a, I>(clients: I) -> Overview
where
    I: IntoIterator<Item = &'a CategorizedClient>,
{
    let (mut total, mut closed, mut volume) = (0usize, 0usize, 0u64);
    for c in clients {
        total += 1;
        if c.record.closed {
            closed += 1;
        }
        volume = volume.saturating_add(c.categories.estimated_volume);
    }
    Overview {
        total_clients: total,
        closed_deals: closed,
        conversion_rate: conversion_rate(closed, total),
        average_estimated_volume: if total == 0 {
            0.0
        } else {
            volume as f64 / total as f64
        },
    }
}

/// One summary per vendor, in first-seen order.
pub fn vendor_summaries<'a, I>(clients: I) -> Vec<VendorSummary>
where
    I: IntoIterator<Item = &'a CategorizedClient>,
{
    group(clients, Dimension::Vendor)
        .into_iter()
        .map(VendorSummary::from)
        .collect()
}

/// Discovery channels that are leaking or were never used.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryGaps {
    /// Channels with clients but zero closed deals.
    pub without_closes: Vec<AggregateBucket>,
    /// Canonical channels with no clients at all.
    pub without_clients: Vec<String>,
    pub lost_clients: usize,
}

pub fn discovery_gaps(channels: &[AggregateBucket]) -> DiscoveryGaps {
    let without_closes: Vec<AggregateBucket> = channels
        .iter()
        .filter(|b| b.count > 0 && b.closed_count == 0)
        .cloned()
        .collect();
    let without_clients = catalog::DISCOVERY_CHANNELS
        .iter()
        .filter(|&&ch| !channels.iter().any(|b| b.key == ch && b.count > 0))
        .map(|ch| ch.to_string())
        .collect();
    let lost_clients = without_closes.iter().map(|b| b.count).sum();
    DiscoveryGaps {
        without_closes,
        without_clients,
        lost_clients,
    }
}

/// Every dashboard aggregate, computed from one set of options.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsBundle {
    pub overview: Overview,
    pub by_vendor: Vec<VendorSummary>,
    pub by_industry: Vec<AggregateBucket>,
    pub by_discovery_channel: Vec<AggregateBucket>,
    pub by_vendor_industry: Vec<PairBucket>,
    pub by_vendor_pain_point: Vec<PairBucket>,
    pub by_vendor_volume: Vec<PairBucket>,
    pub by_integration_needs: Vec<AggregateBucket>,
    pub by_pain_point: Vec<AggregateBucket>,
    pub by_volume: Vec<AggregateBucket>,
    pub by_solution_part: Vec<AggregateBucket>,
    pub by_useful_addons: Vec<AggregateBucket>,
    pub discovery_gaps: DiscoveryGaps,
    pub time_series: Vec<MonthBucket>,
}

/// Build the full bundle. `options` scopes the records (month, vendor,
/// industry); the time series covers all of `target_year`. The open
/// single-dimension lists (industries, channels, pain points) also honour
/// `min_count`, `search_text` and `limit`. Discovery gaps are computed
/// before that trimming.
pub fn build_bundle(
    clients: &[CategorizedClient],
    options: &QueryOptions,
    target_year: i32,
) -> MetricsBundle {
    let scoped = select(clients, options);
    let scoped = scoped.as_slice();
    let it = || scoped.iter().copied();

    let mut by_industry = group(it(), Dimension::Industry);
    sort_buckets(&mut by_industry, options.sort_by.unwrap_or(SortBy::Conversion));

    let mut by_discovery_channel = group(it(), Dimension::DiscoveryChannel);
    sort_buckets(&mut by_discovery_channel, SortBy::Total);

    let mut by_pain_point = group(it(), Dimension::PainPoint);
    sort_buckets(&mut by_pain_point, SortBy::Total);

    let mut by_vendor = vendor_summaries(it());
    by_vendor.sort_by(|a, b| {
        b.conversion_rate
            .partial_cmp(&a.conversion_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let discovery_gaps = discovery_gaps(&by_discovery_channel);
    let by_industry = trim_open_list(by_industry, options);
    let by_discovery_channel = trim_open_list(by_discovery_channel, options);
    let by_pain_point = trim_open_list(by_pain_point, options);

    MetricsBundle {
        overview: overview(it()),
        by_vendor,
        by_industry,
        by_vendor_industry: group_pair(it(), Dimension::Vendor, Dimension::Industry),
        by_vendor_pain_point: group_pair(it(), Dimension::Vendor, Dimension::PainPoint),
        by_vendor_volume: group_pair(it(), Dimension::Vendor, Dimension::VolumeRange),
        by_integration_needs: integration_needs(it()),
        by_pain_point,
        by_volume: complete(&group(it(), Dimension::VolumeRange), catalog::VOLUME_RANGES),
        by_solution_part: complete(
            &group(it(), Dimension::SolutionPart),
            catalog::SOLUTION_PARTS,
        ),
        by_useful_addons: complete(
            &group(it(), Dimension::UsefulAddons),
            catalog::USEFUL_ADDONS,
        ),
        by_discovery_channel,
        discovery_gaps,
        time_series: year_series(it(), target_year),
    }
}

fn trim_open_list(buckets: Vec<AggregateBucket>, options: &QueryOptions) -> Vec<AggregateBucket> {
    let mut kept: Vec<AggregateBucket> = buckets.into_iter().filter(|b| options.keeps(b)).collect();
    if let Some(limit) = options.limit {
        kept.truncate(limit);
    }
    kept
}
