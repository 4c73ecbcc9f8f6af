use std::collections::HashMap;

use super::types::{CategorizedClient, MonthBucket, MonthKey};

/// Monthly closed/not-closed series over `months`, in the given order.
///
/// Months without data produce zero buckets so the series has no gaps.
/// Undated records and records outside `months` are ignored.
pub fn monthly_series<'a, I>(clients: I, months: &[MonthKey]) -> Vec<MonthBucket>
where
    I: IntoIterator<Item = &'a CategorizedClient>,
{
    let mut tallies: HashMap<MonthKey, (usize, usize)> = HashMap::new();
    for client in clients {
        let Some(month) = client.month() else {
            continue;
        };
        let entry = tallies.entry(month).or_insert((0, 0));
        entry.0 += 1;
        if client.record.closed {
            entry.1 += 1;
        }
    }

    months
        .iter()
        .map(|&m| {
            let (total, closed) = tallies.get(&m).copied().unwrap_or((0, 0));
            MonthBucket::new(m, total, closed)
        })
        .collect()
}

/// All twelve months of `year`.
pub fn year_series<'a, I>(clients: I, year: i32) -> Vec<MonthBucket>
where
    I: IntoIterator<Item = &'a CategorizedClient>,
{
    monthly_series(clients, &MonthKey::year_months(year))
}

/// From the earliest to the latest dated month present. Empty when no record is dated.
pub fn observed_series(clients: &[CategorizedClient]) -> Vec<MonthBucket> {
    let months = clients.iter().filter_map(CategorizedClient::month);
    let (Some(first), Some(last)) = (months.clone().min(), months.max()) else {
        return Vec::new();
    };
    monthly_series(clients, &MonthKey::range(first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::{CategoryAssignment, ClientRecord};
    use chrono::NaiveDate;

    fn dated(date: Option<(i32, u32, u32)>, closed: bool) -> CategorizedClient {
        CategorizedClient {
            record: ClientRecord {
                name: String::new(),
                email: String::new(),
                phone: String::new(),
                date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
                raw_date: String::new(),
                vendor: "Ana".into(),
                closed,
                transcript: String::new(),
            },
            categories: CategoryAssignment::default(),
        }
    }

    #[test]
    fn year_series_fills_gaps() {
        let clients = vec![
            dated(Some((2024, 3, 1)), true),
            dated(Some((2024, 3, 9)), false),
            dated(Some((2024, 8, 30)), true),
        ];
        let series = year_series(&clients, 2024);
        assert_eq!(series.len(), 12);
        assert_eq!(series[2].total_clients, 2);
        assert_eq!(series[2].closed_deals, 1);
        assert_eq!(series[2].not_closed_deals, 1);
        assert!((series[2].conversion_rate - 50.0).abs() < f64::EPSILON);
        assert_eq!(series[7].total_clients, 1);
        let empty = series.iter().filter(|b| b.total_clients == 0).count();
        assert_eq!(empty, 10);
        assert!(series.iter().all(|b| b.conversion_rate.is_finite()));
    }

    #[test]
    fn other_years_and_undated_records_are_skipped() {
        let clients = vec![
            dated(Some((2023, 3, 1)), true),
            dated(None, true),
            dated(Some((2024, 1, 1)), false),
        ];
        let series = year_series(&clients, 2024);
        assert_eq!(series.iter().map(|b| b.total_clients).sum::<usize>(), 1);
    }

    #[test]
    fn observed_series_spans_data() {
        let clients = vec![
            dated(Some((2023, 11, 5)), true),
            dated(Some((2024, 2, 1)), false),
        ];
        let series = observed_series(&clients);
        let months: Vec<String> = series.iter().map(|b| b.month.to_string()).collect();
        assert_eq!(months, ["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert!(observed_series(&[dated(None, false)]).is_empty());
    }
}
