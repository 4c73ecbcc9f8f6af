use crate::error::{Error, Result};
use crate::metrics::types::{AggregateBucket, CategorizedClient, PairBucket};
use crate::metrics::{MetricsBundle, QueryOptions, average_conversion};
use askama::Template;
use chrono::Utc;

#[derive(Template)]
#[template(path = "dashboard_report.html")]
struct DashboardReport {
    generated_at: String,
    scope: String,
    total_clients: usize,
    closed_deals: usize,
    conversion_fmt: String,
    volume_fmt: String,
    months: Vec<MonthRow>,
    vendors: Vec<VendorRow>,
    sections: Vec<Section>,
    leaking_channels: Vec<BucketRow>,
    unused_channels: Vec<String>,
    lost_clients: usize,
    clients: Vec<ClientRow>,
}

#[allow(dead_code)] // fields used by Askama template
struct MonthRow {
    label: String,
    total: usize,
    closed: usize,
    not_closed: usize,
    rate_fmt: String,
    bar_pct: u32,
}

#[allow(dead_code)] // fields used by Askama template
struct VendorRow {
    vendor: String,
    total: usize,
    closed: usize,
    rate_fmt: String,
    rate_class: String,
}

#[allow(dead_code)] // fields used by Askama template
struct Section {
    title: String,
    rows: Vec<BucketRow>,
    average_fmt: String,
}

#[allow(dead_code)] // fields used by Askama template
struct BucketRow {
    label: String,
    count: usize,
    closed: usize,
    rate_fmt: String,
    rate_class: String,
    bar_pct: u32,
}

#[allow(dead_code)] // fields used by Askama template
struct ClientRow {
    name: String,
    email: String,
    vendor: String,
    industry: String,
    date: String,
    closed: bool,
}

fn rate_class(rate: f64) -> String {
    if rate >= 50.0 {
        "text-green-400".into()
    } else if rate >= 25.0 {
        "text-yellow-400".into()
    } else {
        "text-red-400".into()
    }
}

fn bar_pct(count: usize, max: usize) -> u32 {
    if max == 0 {
        0
    } else {
        ((count as f64 / max as f64) * 100.0).round() as u32
    }
}

fn bucket_rows(buckets: &[AggregateBucket]) -> Vec<BucketRow> {
    let max = buckets.iter().map(|b| b.count).max().unwrap_or(0);
    buckets
        .iter()
        .map(|b| BucketRow {
            label: b.key.clone(),
            count: b.count,
            closed: b.closed_count,
            rate_fmt: format!("{:.1}%", b.conversion_rate),
            rate_class: rate_class(b.conversion_rate),
            bar_pct: bar_pct(b.count, max),
        })
        .collect()
}

fn pair_rows(pairs: &[PairBucket]) -> Vec<BucketRow> {
    let flat: Vec<AggregateBucket> = pairs
        .iter()
        .map(|p| {
            AggregateBucket::from_counts(
                format!("{} / {}", p.key.outer, p.key.inner),
                p.count,
                p.closed_count,
            )
        })
        .collect();
    bucket_rows(&flat)
}

fn section(title: &str, buckets: &[AggregateBucket]) -> Section {
    Section {
        title: title.to_string(),
        rows: bucket_rows(buckets),
        average_fmt: format!("{:.1}%", average_conversion(buckets)),
    }
}

fn pair_section(title: &str, pairs: &[PairBucket]) -> Section {
    Section {
        title: title.to_string(),
        rows: pair_rows(pairs),
        average_fmt: format!("{:.1}%", average_conversion(pairs)),
    }
}

fn scope_label(options: &QueryOptions) -> String {
    let month = options
        .month
        .map(|m| m.to_string())
        .unwrap_or_else(|| "all months".into());
    let mut parts = vec![month];
    if let Some(v) = options.vendor.as_value() {
        parts.push(format!("vendor {v}"));
    }
    if let Some(i) = options.industry.as_value() {
        parts.push(format!("industry {i}"));
    }
    parts.join(" · ")
}

/// Render the dashboard as a standalone HTML page. Every section with no
/// rows shows an explicit empty state.
pub fn render_dashboard(
    bundle: &MetricsBundle,
    clients: &[&CategorizedClient],
    options: &QueryOptions,
) -> Result<String> {
    let max_month = bundle
        .time_series
        .iter()
        .map(|m| m.total_clients)
        .max()
        .unwrap_or(0);
    let months = bundle
        .time_series
        .iter()
        .map(|m| MonthRow {
            label: m.month.to_string(),
            total: m.total_clients,
            closed: m.closed_deals,
            not_closed: m.not_closed_deals,
            rate_fmt: format!("{:.1}%", m.conversion_rate),
            bar_pct: bar_pct(m.total_clients, max_month),
        })
        .collect();

    let vendors = bundle
        .by_vendor
        .iter()
        .map(|v| VendorRow {
            vendor: v.vendor.clone(),
            total: v.total_clients,
            closed: v.closed_deals,
            rate_fmt: format!("{:.1}%", v.conversion_rate),
            rate_class: rate_class(v.conversion_rate),
        })
        .collect();

    let sections = vec![
        section("Industries", &bundle.by_industry),
        section("Discovery channels", &bundle.by_discovery_channel),
        section("Pain points", &bundle.by_pain_point),
        section("Interaction volume", &bundle.by_volume),
        section("Integration needs", &bundle.by_integration_needs),
        section("Solution parts", &bundle.by_solution_part),
        section("Useful add-ons", &bundle.by_useful_addons),
        pair_section("Vendor × industry", &bundle.by_vendor_industry),
        pair_section("Vendor × pain point", &bundle.by_vendor_pain_point),
        pair_section("Vendor × volume", &bundle.by_vendor_volume),
    ];

    let clients = clients
        .iter()
        .map(|c| ClientRow {
            name: c.record.name.clone(),
            email: c.record.email.clone(),
            vendor: c.record.vendor.clone(),
            industry: c.categories.industry.clone(),
            date: c
                .record
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| c.record.raw_date.clone()),
            closed: c.record.closed,
        })
        .collect();

    let report = DashboardReport {
        generated_at: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
        scope: scope_label(options),
        total_clients: bundle.overview.total_clients,
        closed_deals: bundle.overview.closed_deals,
        conversion_fmt: format!("{:.1}%", bundle.overview.conversion_rate),
        volume_fmt: format!("{:.0}", bundle.overview.average_estimated_volume),
        months,
        vendors,
        sections,
        leaking_channels: bucket_rows(&bundle.discovery_gaps.without_closes),
        unused_channels: bundle.discovery_gaps.without_clients.clone(),
        lost_clients: bundle.discovery_gaps.lost_clients,
        clients,
    };

    report
        .render()
        .map_err(|e| Error::Template(format!("dashboard render: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_scale_to_largest_row() {
        assert_eq!(bar_pct(5, 10), 50);
        assert_eq!(bar_pct(0, 0), 0);
        assert_eq!(bar_pct(3, 3), 100);
    }

    #[test]
    fn scope_lists_active_filters() {
        let mut options = QueryOptions::for_month(Some("2024-03".parse().unwrap()));
        options.vendor = "Ana".parse().unwrap();
        assert_eq!(scope_label(&options), "2024-03 · vendor Ana");
        assert_eq!(scope_label(&QueryOptions::default()), "all months");
    }

    #[test]
    fn pair_rows_join_keys() {
        let pairs = vec![PairBucket::from_counts(
            crate::metrics::PairKey {
                outer: "Ana".into(),
                inner: "Retail".into(),
            },
            4,
            1,
        )];
        let rows = pair_rows(&pairs);
        assert_eq!(rows[0].label, "Ana / Retail");
        assert_eq!(rows[0].rate_fmt, "25.0%");
        assert_eq!(rows[0].rate_class, "text-yellow-400");
        assert_eq!(pair_section("x", &pairs).average_fmt, "25.0%");
    }
}
