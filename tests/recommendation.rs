use std::sync::Mutex;
use vambe_metrics::error::{Error, Result};
use vambe_metrics::metrics::normalize::parse_client_document;
use vambe_metrics::metrics::{CategorizedClient, normalize_values};
use vambe_metrics::recommend::{IndustryClassifier, KeywordClassifier, Recommendation, recommend};

/// Answers a fixed industry and records what it was asked.
struct FixedClassifier {
    industry: &'static str,
    seen: Mutex<Vec<String>>,
}

impl FixedClassifier {
    fn new(industry: &'static str) -> Self {
        Self {
            industry,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl IndustryClassifier for FixedClassifier {
    async fn classify(&self, _description: &str, known: &[String]) -> Result<String> {
        self.seen.lock().unwrap().extend(known.iter().cloned());
        Ok(self.industry.to_string())
    }
}

struct FailingClassifier;

impl IndustryClassifier for FailingClassifier {
    async fn classify(&self, _description: &str, _known: &[String]) -> Result<String> {
        Err(Error::classification("model answered N/A"))
    }
}

fn history(rows: &[(&str, &str, bool)]) -> Vec<CategorizedClient> {
    let values: Vec<serde_json::Value> = rows
        .iter()
        .map(|(vendor, industry, closed)| {
            serde_json::json!({
                "name": format!("{vendor} lead"),
                "date": "2024-05-01",
                "vendor": vendor,
                "closed": closed,
                "categories": { "industry": industry }
            })
        })
        .collect();
    normalize_values(&values).clients
}

#[tokio::test]
async fn higher_conversion_ranks_first() {
    let clients = history(&[
        ("Ana", "Retail", true),
        ("Ana", "Retail", true),
        ("Ana", "Retail", false),
        ("Luis", "Retail", true),
        ("Marta", "Salud", true),
    ]);
    let classifier = FixedClassifier::new("Retail");
    let rec = recommend(&classifier, "Cadena de tiendas de ropa", &clients)
        .await
        .unwrap();

    assert_eq!(rec.industry, "Retail");
    let ranked: Vec<(&str, usize, usize)> = rec
        .vendors
        .iter()
        .map(|v| (v.vendor.as_str(), v.total_clients, v.closed_deals))
        .collect();
    assert_eq!(ranked, vec![("Luis", 1, 1), ("Ana", 3, 2)]);
    assert!((rec.vendors[0].conversion_rate - 100.0).abs() < f64::EPSILON);
    assert!((rec.vendors[1].conversion_rate - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(rec.best().map(|v| v.vendor.as_str()), Some("Luis"));

    let seen = classifier.seen.lock().unwrap().clone();
    assert_eq!(seen, vec!["Retail", "Salud"]);
}

#[tokio::test]
async fn unseen_industry_is_an_empty_ranking_not_an_error() {
    let clients = history(&[("Ana", "Retail", true)]);
    let rec = recommend(&FixedClassifier::new("Minería"), "Empresa minera", &clients)
        .await
        .unwrap();
    assert_eq!(rec.industry, "Minería");
    assert!(rec.vendors.is_empty());
    assert!(rec.best().is_none());
}

#[tokio::test]
async fn classifier_failure_propagates() {
    let clients = history(&[("Ana", "Retail", true)]);
    let err = recommend(&FailingClassifier, "???", &clients)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Classification(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn keyword_classifier_against_fixture() {
    let values = parse_client_document(include_str!("fixtures/clients.json")).unwrap();
    let clients = normalize_values(&values).clients;
    let rec = recommend(
        &KeywordClassifier,
        "Somos una cadena de retail con 12 locales",
        &clients,
    )
    .await
    .unwrap();
    assert_eq!(rec.industry, "Retail");
    let order: Vec<&str> = rec.vendors.iter().map(|v| v.vendor.as_str()).collect();
    assert_eq!(order, vec!["Luis", "Marta", "Ana"]);
}

#[test]
fn remote_payload_deserializes_with_backend_names() {
    let rec: Recommendation = serde_json::from_str(
        r#"{
            "industry": "Retail",
            "vendors": [
                {"vendedor": "Luis", "totalClients": 1, "closedDeals": 1, "conversionRate": 100.0}
            ]
        }"#,
    )
    .unwrap();
    assert_eq!(rec.vendors[0].vendor, "Luis");
    assert_eq!(rec.vendors[0].closed_deals, 1);
}
