use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::catalog;
use crate::error::{Error, Result};

/// Sentinel for a single-valued category the backend could not determine.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub name: String,
    pub email: String,
    pub phone: String,
    /// `None` when the source date could not be parsed.
    pub date: Option<NaiveDate>,
    pub raw_date: String,
    pub vendor: String,
    pub closed: bool,
    pub transcript: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAssignment {
    pub industry: String,
    pub niche_industry: String,
    pub company_size: String,
    pub pain_point: String,
    pub pain_point_description: String,
    pub discovery_channel: String,
    pub niche_discovery_channel: String,
    pub urgency: String,
    pub budget_indicator: String,
    pub estimated_volume: u64,
    pub integration_needs: String,
    pub solution_part: Vec<String>,
    pub useful_addons: Vec<String>,
}

impl Default for CategoryAssignment {
    fn default() -> Self {
        Self {
            industry: NOT_AVAILABLE.into(),
            niche_industry: NOT_AVAILABLE.into(),
            company_size: NOT_AVAILABLE.into(),
            pain_point: NOT_AVAILABLE.into(),
            pain_point_description: NOT_AVAILABLE.into(),
            discovery_channel: NOT_AVAILABLE.into(),
            niche_discovery_channel: NOT_AVAILABLE.into(),
            urgency: NOT_AVAILABLE.into(),
            budget_indicator: NOT_AVAILABLE.into(),
            estimated_volume: 0,
            integration_needs: NOT_AVAILABLE.into(),
            solution_part: Vec::new(),
            useful_addons: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedClient {
    #[serde(flatten)]
    pub record: ClientRecord,
    pub categories: CategoryAssignment,
}

impl CategorizedClient {
    pub fn month(&self) -> Option<MonthKey> {
        self.record.date.map(MonthKey::from_date)
    }

    pub fn volume_range(&self) -> VolumeRange {
        VolumeRange::from_volume(self.categories.estimated_volume)
    }
}

// -- Volume ranges --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VolumeRange {
    UpTo50,
    UpTo100,
    UpTo200,
    UpTo500,
    Over500,
}

impl VolumeRange {
    pub const ALL: [VolumeRange; 5] = [
        Self::UpTo50,
        Self::UpTo100,
        Self::UpTo200,
        Self::UpTo500,
        Self::Over500,
    ];

    pub fn from_volume(volume: u64) -> Self {
        match volume {
            0..=50 => Self::UpTo50,
            51..=100 => Self::UpTo100,
            101..=200 => Self::UpTo200,
            201..=500 => Self::UpTo500,
            _ => Self::Over500,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::UpTo50 => "0-50",
            Self::UpTo100 => "51-100",
            Self::UpTo200 => "101-200",
            Self::UpTo500 => "201-500",
            Self::Over500 => "500+",
        }
    }
}

impl fmt::Display for VolumeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for VolumeRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

// -- Month keys --

/// Calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::invalid_input(format!("month out of range: {month}")));
        }
        if !(0..=9999).contains(&year) {
            return Err(Error::invalid_input(format!("year out of range: {year}")));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Every month from `start` to `end`, both inclusive. Empty when `end < start`.
    pub fn range(start: Self, end: Self) -> Vec<Self> {
        let mut months = Vec::new();
        let mut current = start;
        while current <= end {
            months.push(current);
            current = current.succ();
        }
        months
    }

    /// January through December of `year`.
    pub fn year_months(year: i32) -> Vec<Self> {
        (1..=12).map(|month| Self { year, month }).collect()
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| Error::invalid_input(format!("expected YYYY-MM, got {s:?}")))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(Error::invalid_input(format!("expected YYYY-MM, got {s:?}")));
        }
        let year: i32 = year
            .parse()
            .map_err(|_| Error::invalid_input(format!("bad year in {s:?}")))?;
        let month: u32 = month
            .parse()
            .map_err(|_| Error::invalid_input(format!("bad month in {s:?}")))?;
        Self::new(year, month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// -- Aggregates --

/// `closed / total * 100`, or 0 when `total` is 0.
pub fn conversion_rate(closed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        closed as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateBucket<K = String> {
    pub key: K,
    pub count: usize,
    pub closed_count: usize,
    pub conversion_rate: f64,
}

impl<K> AggregateBucket<K> {
    pub fn empty(key: K) -> Self {
        Self {
            key,
            count: 0,
            closed_count: 0,
            conversion_rate: 0.0,
        }
    }

    pub fn from_counts(key: K, count: usize, closed_count: usize) -> Self {
        let closed_count = closed_count.min(count);
        Self {
            key,
            count,
            closed_count,
            conversion_rate: conversion_rate(closed_count, count),
        }
    }

    pub fn record(&mut self, closed: bool) {
        self.count += 1;
        if closed {
            self.closed_count += 1;
        }
        self.conversion_rate = conversion_rate(self.closed_count, self.count);
    }
}

/// Key of a two-dimension bucket, e.g. (vendor, industry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairKey {
    pub outer: String,
    pub inner: String,
}

pub type PairBucket = AggregateBucket<PairKey>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBucket {
    pub month: MonthKey,
    pub total_clients: usize,
    pub closed_deals: usize,
    pub not_closed_deals: usize,
    pub conversion_rate: f64,
}

impl MonthBucket {
    pub fn new(month: MonthKey, total_clients: usize, closed_deals: usize) -> Self {
        Self {
            month,
            total_clients,
            closed_deals,
            not_closed_deals: total_clients.saturating_sub(closed_deals),
            conversion_rate: conversion_rate(closed_deals, total_clients),
        }
    }
}

// -- Dimensions --

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Vendor,
    Industry,
    NicheIndustry,
    CompanySize,
    PainPoint,
    DiscoveryChannel,
    NicheDiscoveryChannel,
    Urgency,
    BudgetIndicator,
    IntegrationNeeds,
    VolumeRange,
    SolutionPart,
    UsefulAddons,
}

impl Dimension {
    /// Values `client` contributes to this dimension. Solution parts and
    /// add-ons fan out: a record counts once per label it carries.
    pub fn values(self, client: &CategorizedClient) -> Vec<&str> {
        let c = &client.categories;
        match self {
            Self::Vendor => vec![client.record.vendor.as_str()],
            Self::Industry => vec![c.industry.as_str()],
            Self::NicheIndustry => vec![c.niche_industry.as_str()],
            Self::CompanySize => vec![c.company_size.as_str()],
            Self::PainPoint => vec![c.pain_point.as_str()],
            Self::DiscoveryChannel => vec![c.discovery_channel.as_str()],
            Self::NicheDiscoveryChannel => vec![c.niche_discovery_channel.as_str()],
            Self::Urgency => vec![c.urgency.as_str()],
            Self::BudgetIndicator => vec![c.budget_indicator.as_str()],
            Self::IntegrationNeeds => vec![c.integration_needs.as_str()],
            Self::VolumeRange => vec![client.volume_range().label()],
            Self::SolutionPart => c.solution_part.iter().map(String::as_str).collect(),
            Self::UsefulAddons => c.useful_addons.iter().map(String::as_str).collect(),
        }
    }

    /// Product-defined category list guaranteeing a complete chart axis.
    pub fn canonical(self) -> Option<&'static [&'static str]> {
        match self {
            Self::PainPoint => Some(catalog::PAIN_POINTS),
            Self::DiscoveryChannel => Some(catalog::DISCOVERY_CHANNELS),
            Self::VolumeRange => Some(catalog::VOLUME_RANGES),
            Self::SolutionPart => Some(catalog::SOLUTION_PARTS),
            Self::UsefulAddons => Some(catalog::USEFUL_ADDONS),
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vendor => "vendor",
            Self::Industry => "industry",
            Self::NicheIndustry => "nicheIndustry",
            Self::CompanySize => "companySize",
            Self::PainPoint => "painPoint",
            Self::DiscoveryChannel => "discoveryChannel",
            Self::NicheDiscoveryChannel => "nicheDiscoveryChannel",
            Self::Urgency => "urgency",
            Self::BudgetIndicator => "budgetIndicator",
            Self::IntegrationNeeds => "integrationNeeds",
            Self::VolumeRange => "volumeRange",
            Self::SolutionPart => "solutionPart",
            Self::UsefulAddons => "usefulAddons",
        };
        f.write_str(name)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Descending conversion rate.
    #[default]
    Conversion,
    /// Descending client count.
    Total,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_boundaries() {
        assert_eq!(VolumeRange::from_volume(0).label(), "0-50");
        assert_eq!(VolumeRange::from_volume(50).label(), "0-50");
        assert_eq!(VolumeRange::from_volume(51).label(), "51-100");
        assert_eq!(VolumeRange::from_volume(100).label(), "51-100");
        assert_eq!(VolumeRange::from_volume(101).label(), "101-200");
        assert_eq!(VolumeRange::from_volume(200).label(), "101-200");
        assert_eq!(VolumeRange::from_volume(201).label(), "201-500");
        assert_eq!(VolumeRange::from_volume(500).label(), "201-500");
        assert_eq!(VolumeRange::from_volume(501).label(), "500+");
    }

    #[test]
    fn month_key_parses_and_displays() {
        let key: MonthKey = "2024-03".parse().unwrap();
        assert_eq!(key.year(), 2024);
        assert_eq!(key.month(), 3);
        assert_eq!(key.to_string(), "2024-03");
    }

    #[test]
    fn month_key_rejects_garbage() {
        assert!("2024-13".parse::<MonthKey>().is_err());
        assert!("2024-3".parse::<MonthKey>().is_err());
        assert!("march".parse::<MonthKey>().is_err());
        assert!("".parse::<MonthKey>().is_err());
    }

    #[test]
    fn month_range_crosses_year_boundary() {
        let start: MonthKey = "2023-11".parse().unwrap();
        let end: MonthKey = "2024-02".parse().unwrap();
        let months: Vec<String> = MonthKey::range(start, end)
            .into_iter()
            .map(|m| m.to_string())
            .collect();
        assert_eq!(months, ["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert!(MonthKey::range(end, start).is_empty());
    }

    #[test]
    fn conversion_rate_never_nan() {
        assert_eq!(conversion_rate(0, 0), 0.0);
        assert!((conversion_rate(1, 3) - 33.333).abs() < 0.01);
        assert_eq!(conversion_rate(4, 4), 100.0);
    }

    #[test]
    fn bucket_counts_clamp_closed_to_total() {
        let b = AggregateBucket::from_counts("x".to_string(), 2, 5);
        assert_eq!(b.closed_count, 2);
        assert_eq!(b.conversion_rate, 100.0);
    }

    #[test]
    fn month_bucket_derives_not_closed() {
        let b = MonthBucket::new("2024-05".parse().unwrap(), 10, 4);
        assert_eq!(b.not_closed_deals, 6);
        assert!((b.conversion_rate - 40.0).abs() < f64::EPSILON);
    }
}
