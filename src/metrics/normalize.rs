use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{CategorizedClient, CategoryAssignment, ClientRecord, NOT_AVAILABLE};
use crate::error::{Error, Result};

/// A categorized client as it arrives from the backend. Any field may be
/// missing, null, or of an unexpected JSON type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClient {
    #[serde(default, alias = "nombre")]
    pub name: Option<Value>,
    #[serde(default, alias = "correo")]
    pub email: Option<Value>,
    #[serde(default, alias = "telefono")]
    pub phone: Option<Value>,
    #[serde(default, alias = "fecha")]
    pub date: Option<Value>,
    #[serde(default, alias = "vendedor")]
    pub vendor: Option<Value>,
    #[serde(default)]
    pub closed: Option<Value>,
    #[serde(default, alias = "transcripcion")]
    pub transcript: Option<Value>,
    /// Kept untyped so a mistyped categories field costs only the categories.
    #[serde(default)]
    pub categories: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCategories {
    #[serde(default)]
    pub industry: Option<Value>,
    #[serde(default)]
    pub niche_industry: Option<Value>,
    #[serde(default)]
    pub company_size: Option<Value>,
    #[serde(default)]
    pub pain_point: Option<Value>,
    #[serde(default)]
    pub pain_point_description: Option<Value>,
    #[serde(default)]
    pub discovery_channel: Option<Value>,
    #[serde(default)]
    pub niche_discovery_channel: Option<Value>,
    #[serde(default)]
    pub urgency: Option<Value>,
    #[serde(default)]
    pub budget_indicator: Option<Value>,
    #[serde(default)]
    pub estimated_volume: Option<Value>,
    #[serde(default)]
    pub integration_needs: Option<Value>,
    #[serde(default)]
    pub solution_part: Option<Value>,
    #[serde(default)]
    pub useful_addons: Option<Value>,
}

/// Output of a normalization pass. Records with an unparsable date stay in
/// `clients` (with `date: None`) and are also reported in `issues`.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub clients: Vec<CategorizedClient>,
    pub issues: Vec<Error>,
}

impl NormalizedBatch {
    pub fn dated_count(&self) -> usize {
        self.clients.iter().filter(|c| c.record.date.is_some()).count()
    }
}

pub fn normalize(raw: &[RawClient]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for (index, record) in raw.iter().enumerate() {
        let (client, issues) = normalize_one(index, record);
        batch.clients.push(client);
        for issue in issues {
            warn!(index, error = %issue, "malformed client field");
            batch.issues.push(issue);
        }
    }
    debug!(
        clients = batch.clients.len(),
        issues = batch.issues.len(),
        "normalized client records"
    );
    batch
}

/// Normalize untyped JSON records. Only entries that are not JSON objects are
/// dropped (and reported); mistyped fields inside an object are coerced.
pub fn normalize_values(values: &[Value]) -> NormalizedBatch {
    let mut raw = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();
    for (index, value) in values.iter().enumerate() {
        match serde_json::from_value::<RawClient>(value.clone()) {
            Ok(r) => raw.push(r),
            Err(e) => {
                warn!(index, "dropping non-object client record: {e}");
                rejected.push(Error::malformed(index, "record", e.to_string()));
            }
        }
    }
    let mut batch = normalize(&raw);
    rejected.append(&mut batch.issues);
    batch.issues = rejected;
    batch
}

/// Parse a JSON document holding categorized clients. Accepts a bare array,
/// a `{ "data": ... }` envelope, or an advanced-metrics payload with a
/// `categorizedClients` list.
pub fn parse_client_document(json: &str) -> Result<Vec<Value>> {
    let doc: Value =
        serde_json::from_str(json).map_err(|e| Error::parse(format!("client JSON: {e}")))?;
    extract_client_list(doc)
}

fn extract_client_list(doc: Value) -> Result<Vec<Value>> {
    match doc {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            if let Some(data) = map.remove("data") {
                return extract_client_list(data);
            }
            match map.remove("categorizedClients") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(Error::parse(
                    "expected an array of clients, a data envelope, or categorizedClients",
                )),
            }
        }
        _ => Err(Error::parse("expected an array of clients")),
    }
}

fn normalize_one(index: usize, raw: &RawClient) -> (CategorizedClient, Vec<Error>) {
    let mut issues = Vec::new();
    let raw_date = text(raw.date.as_ref()).unwrap_or_default();
    let date = match parse_date(&raw_date) {
        Ok(d) => Some(d),
        Err(reason) => {
            issues.push(Error::malformed(index, "date", reason));
            None
        }
    };

    let record = ClientRecord {
        name: text(raw.name.as_ref()).unwrap_or_default(),
        email: text(raw.email.as_ref()).unwrap_or_default(),
        phone: text(raw.phone.as_ref()).unwrap_or_default(),
        date,
        raw_date,
        vendor: category(raw.vendor.as_ref()),
        closed: truthy(raw.closed.as_ref()),
        transcript: text(raw.transcript.as_ref()).unwrap_or_default(),
    };

    let categories = match &raw.categories {
        None | Some(Value::Null) => CategoryAssignment::default(),
        Some(value @ Value::Object(_)) => {
            match serde_json::from_value::<RawCategories>(value.clone()) {
                Ok(cats) => normalize_categories(&cats),
                Err(e) => {
                    issues.push(Error::malformed(index, "categories", e.to_string()));
                    CategoryAssignment::default()
                }
            }
        }
        Some(other) => {
            issues.push(Error::malformed(
                index,
                "categories",
                format!("expected an object, got {other}"),
            ));
            CategoryAssignment::default()
        }
    };

    (CategorizedClient { record, categories }, issues)
}

fn normalize_categories(raw: &RawCategories) -> CategoryAssignment {
    CategoryAssignment {
        industry: category(raw.industry.as_ref()),
        niche_industry: category(raw.niche_industry.as_ref()),
        company_size: category(raw.company_size.as_ref()),
        pain_point: category(raw.pain_point.as_ref()),
        pain_point_description: category(raw.pain_point_description.as_ref()),
        discovery_channel: category(raw.discovery_channel.as_ref()),
        niche_discovery_channel: category(raw.niche_discovery_channel.as_ref()),
        urgency: category(raw.urgency.as_ref()),
        budget_indicator: category(raw.budget_indicator.as_ref()),
        estimated_volume: volume(raw.estimated_volume.as_ref()),
        integration_needs: category(raw.integration_needs.as_ref()),
        solution_part: labels(raw.solution_part.as_ref()),
        useful_addons: labels(raw.useful_addons.as_ref()),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| text(Some(v)))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Object(_) => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn category(value: Option<&Value>) -> String {
    text(value).unwrap_or_else(|| NOT_AVAILABLE.into())
}

fn labels(value: Option<&Value>) -> Vec<String> {
    let candidates: Vec<String> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| text(Some(v))).collect(),
        Some(v @ (Value::String(_) | Value::Number(_))) => text(Some(v)).into_iter().collect(),
        _ => Vec::new(),
    };
    let mut out: Vec<String> = Vec::with_capacity(candidates.len());
    for label in candidates {
        if label != NOT_AVAILABLE && !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "si" | "sí" | "closed"
        ),
        _ => false,
    }
}

fn volume(value: Option<&Value>) -> u64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() && f > 0.0 => f.floor() as u64,
        _ => 0,
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse the date formats the backend has been seen to emit.
pub fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("missing date".into());
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Ok(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    Err(format!("unrecognized date {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::grouping::group;
    use crate::metrics::types::Dimension;
    use serde_json::json;

    fn raw(value: Value) -> RawClient {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn missing_categories_default_to_sentinel() {
        let batch = normalize(&[raw(json!({
            "name": "Ana Pérez",
            "date": "2024-03-10",
            "vendor": "Luis",
            "closed": 1
        }))]);
        let c = &batch.clients[0];
        assert_eq!(c.categories.industry, NOT_AVAILABLE);
        assert_eq!(c.categories.integration_needs, NOT_AVAILABLE);
        assert!(c.categories.solution_part.is_empty());
        assert!(c.categories.useful_addons.is_empty());
        assert_eq!(c.categories.estimated_volume, 0);
        assert!(batch.issues.is_empty());
    }

    #[test]
    fn null_and_empty_fields_become_sentinel() {
        let batch = normalize(&[raw(json!({
            "date": "2024-03-10",
            "categories": { "industry": null, "painPoint": "  ", "urgency": "Alta" }
        }))]);
        let c = &batch.clients[0].categories;
        assert_eq!(c.industry, NOT_AVAILABLE);
        assert_eq!(c.pain_point, NOT_AVAILABLE);
        assert_eq!(c.urgency, "Alta");
    }

    #[test]
    fn single_string_label_is_wrapped() {
        let batch = normalize(&[raw(json!({
            "date": "2024-03-10",
            "categories": { "solutionPart": "Vambe AI", "usefulAddons": ["NPS con IA", "NPS con IA"] }
        }))]);
        let c = &batch.clients[0].categories;
        assert_eq!(c.solution_part, vec!["Vambe AI".to_string()]);
        assert_eq!(c.useful_addons, vec!["NPS con IA".to_string()]);
    }

    #[test]
    fn spanish_field_names_are_accepted() {
        let batch = normalize(&[raw(json!({
            "nombre": "Carla",
            "correo": "carla@example.com",
            "telefono": "+56 9 1234",
            "fecha": "2024-08-01",
            "vendedor": "Ana",
            "closed": 0,
            "transcripcion": "hola"
        }))]);
        let r = &batch.clients[0].record;
        assert_eq!(r.name, "Carla");
        assert_eq!(r.email, "carla@example.com");
        assert_eq!(r.vendor, "Ana");
        assert_eq!(r.transcript, "hola");
        assert!(!r.closed);
    }

    #[test]
    fn closed_accepts_truthy_forms() {
        for (v, expected) in [
            (json!(1), true),
            (json!(0), false),
            (json!(true), true),
            (json!(false), false),
            (json!("1"), true),
            (json!("0"), false),
            (json!("true"), true),
            (json!(null), false),
        ] {
            assert_eq!(truthy(Some(&v)), expected, "input {v}");
        }
        assert!(!truthy(None));
    }

    #[test]
    fn unparsable_date_is_reported_but_record_kept() {
        let batch = normalize(&[
            raw(json!({ "date": "not a date", "vendor": "Ana" })),
            raw(json!({ "date": "2024-02-29", "vendor": "Ana" })),
        ]);
        assert_eq!(batch.clients.len(), 2);
        assert_eq!(batch.dated_count(), 1);
        assert_eq!(batch.issues.len(), 1);
        assert!(matches!(
            &batch.issues[0],
            Error::MalformedRecord { index: 0, field, .. } if field == "date"
        ));
        assert!(batch.clients[0].record.date.is_none());
        assert_eq!(batch.clients[0].record.raw_date, "not a date");
    }

    #[test]
    fn date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        for s in [
            "2024-03-05",
            "2024/03/05",
            "05/03/2024",
            "2024-03-05 10:00:00",
            "2024-03-05T10:00:00",
            "2024-03-05T10:00:00.123Z",
        ] {
            assert_eq!(parse_date(s), Ok(expected), "format {s}");
        }
        assert!(parse_date("").is_err());
        assert!(parse_date("2024-13-01").is_err());
    }

    #[test]
    fn volume_coercion() {
        assert_eq!(volume(Some(&json!(120))), 120);
        assert_eq!(volume(Some(&json!("75"))), 75);
        assert_eq!(volume(Some(&json!(99.9))), 99);
        assert_eq!(volume(Some(&json!(-4))), 0);
        assert_eq!(volume(Some(&json!("lots"))), 0);
        assert_eq!(volume(None), 0);
    }

    #[test]
    fn non_object_values_are_rejected_individually() {
        let values = vec![json!({ "date": "2024-01-01" }), json!(42)];
        let batch = normalize_values(&values);
        assert_eq!(batch.clients.len(), 1);
        assert_eq!(batch.issues.len(), 1);
    }

    #[test]
    fn mistyped_categories_keep_the_record() {
        let values = vec![
            json!({ "date": "2024-01-01", "vendor": "Ana", "categories": { "industry": "Retail" } }),
            json!({ "date": "2024-01-02", "vendor": "Ana", "categories": "N/A" }),
            json!({ "date": "2024-01-03", "vendor": "Luis", "categories": [] }),
        ];
        let batch = normalize_values(&values);
        assert_eq!(batch.clients.len(), 3);
        assert_eq!(batch.clients[1].categories, CategoryAssignment::default());
        assert_eq!(batch.clients[2].categories.industry, NOT_AVAILABLE);
        assert_eq!(batch.issues.len(), 2);
        assert!(batch.issues.iter().all(|e| matches!(
            e,
            Error::MalformedRecord { field, .. } if field == "categories"
        )));

        let vendors = group(&batch.clients, Dimension::Vendor);
        assert_eq!(vendors.iter().map(|b| b.count).sum::<usize>(), 3);
    }

    #[test]
    fn client_document_shapes() {
        assert_eq!(parse_client_document("[{}]").unwrap().len(), 1);
        assert_eq!(parse_client_document(r#"{"data": [{}, {}]}"#).unwrap().len(), 2);
        assert_eq!(
            parse_client_document(r#"{"data": {"metrics": {}, "categorizedClients": [{}]}}"#)
                .unwrap()
                .len(),
            1
        );
        assert!(parse_client_document(r#"{"clients": []}"#).is_err());
        assert!(parse_client_document("not json").is_err());
    }

    #[test]
    fn input_is_left_untouched() {
        let input = vec![raw(json!({ "date": "2024-01-01", "closed": "1" }))];
        let _ = normalize(&input);
        assert_eq!(input[0].closed, Some(json!("1")));
        assert!(input[0].categories.is_none());
    }
}
