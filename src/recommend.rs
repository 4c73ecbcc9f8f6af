//! Vendor recommendation for a prospective client.
//!
//! An [`IndustryClassifier`] maps a free-text description to one industry;
//! vendors are then ranked by their historical conversion within it.

use crate::error::{Error, Result};
use crate::llm::LlmClient;
use crate::metrics::types::{CategorizedClient, Dimension, NOT_AVAILABLE};
use crate::metrics::{VendorSummary, group};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recommendation {
    pub industry: String,
    pub vendors: Vec<VendorSummary>,
}

impl Recommendation {
    pub fn best(&self) -> Option<&VendorSummary> {
        self.vendors.first()
    }
}

#[allow(async_fn_in_trait)]
pub trait IndustryClassifier {
    /// Pick one industry for `description`. `known_industries` lists the labels
    /// already present in the client history, in sorted order.
    async fn classify(&self, description: &str, known_industries: &[String]) -> Result<String>;
}

const CLASSIFY_PROMPT: &str = "You classify prospective B2B clients of a conversational \
sales platform by industry. Reply with JSON only: {\"industry\": \"<label>\"}. \
Prefer one of the known industries when it fits; otherwise give a short new label. \
If the description gives no hint of an industry, reply {\"industry\": \"N/A\"}.";

#[derive(Deserialize)]
struct IndustryAnswer {
    #[serde(default)]
    industry: String,
}

pub struct LlmClassifier {
    llm: LlmClient,
}

impl LlmClassifier {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

impl IndustryClassifier for LlmClassifier {
    async fn classify(&self, description: &str, known_industries: &[String]) -> Result<String> {
        let known = if known_industries.is_empty() {
            "(none yet)".to_string()
        } else {
            known_industries.join(", ")
        };
        let user = format!("Known industries: {known}\n\nClient description:\n{description}");
        let answer: IndustryAnswer = self.llm.ask_json(CLASSIFY_PROMPT, &user).await?;
        let industry = answer.industry.trim();
        if industry.is_empty() || industry.eq_ignore_ascii_case(NOT_AVAILABLE) {
            return Err(Error::classification(format!(
                "model {} returned no industry",
                self.llm.model()
            )));
        }
        debug!(industry, "LLM classification");
        Ok(industry.to_string())
    }
}

/// Offline classifier: the longest known industry label that occurs in the
/// description (case-insensitive).
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl IndustryClassifier for KeywordClassifier {
    async fn classify(&self, description: &str, known_industries: &[String]) -> Result<String> {
        let haystack = description.to_lowercase();
        known_industries
            .iter()
            .filter(|label| {
                let label = label.trim();
                !label.is_empty()
                    && label != NOT_AVAILABLE
                    && haystack.contains(&label.to_lowercase())
            })
            .max_by_key(|label| label.trim().chars().count())
            .cloned()
            .ok_or_else(|| Error::classification("no known industry mentioned in the description"))
    }
}

/// Distinct industry labels in the history, `N/A` excluded.
pub fn known_industries(clients: &[CategorizedClient]) -> Vec<String> {
    clients
        .iter()
        .map(|c| c.categories.industry.trim())
        .filter(|i| !i.is_empty() && *i != NOT_AVAILABLE)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}

/// Vendors that handled `industry`, best conversion first. Ties go to more
/// closed deals, then first-seen order.
pub fn rank_vendors(clients: &[CategorizedClient], industry: &str) -> Vec<VendorSummary> {
    let wanted = industry.trim();
    let matching = clients
        .iter()
        .filter(|c| c.categories.industry.trim().eq_ignore_ascii_case(wanted));
    let mut vendors: Vec<VendorSummary> = group(matching, Dimension::Vendor)
        .into_iter()
        .map(VendorSummary::from)
        .collect();
    vendors.sort_by(|a, b| {
        b.conversion_rate
            .partial_cmp(&a.conversion_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.closed_deals.cmp(&a.closed_deals))
    });
    vendors
}

pub async fn recommend<C: IndustryClassifier>(
    classifier: &C,
    description: &str,
    clients: &[CategorizedClient],
) -> Result<Recommendation> {
    let description = description.trim();
    if description.is_empty() {
        return Err(Error::invalid_input("client description is empty"));
    }
    let known = known_industries(clients);
    let industry = classifier.classify(description, &known).await?;
    let vendors = rank_vendors(clients, &industry);
    info!(
        industry = %industry,
        vendors = vendors.len(),
        best = vendors.first().map(|v| v.vendor.as_str()).unwrap_or("-"),
        "recommendation ready"
    );
    Ok(Recommendation { industry, vendors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::{CategoryAssignment, ClientRecord};

    fn client(vendor: &str, industry: &str, closed: bool) -> CategorizedClient {
        CategorizedClient {
            record: ClientRecord {
                name: "x".into(),
                email: String::new(),
                phone: String::new(),
                date: None,
                raw_date: String::new(),
                vendor: vendor.into(),
                closed,
                transcript: String::new(),
            },
            categories: CategoryAssignment {
                industry: industry.into(),
                ..Default::default()
            },
        }
    }

    fn history() -> Vec<CategorizedClient> {
        vec![
            client("Ana", "Retail", true),
            client("Ana", "Retail", true),
            client("Ana", "Retail", false),
            client("Luis", "Retail", true),
            client("Marta", "Salud", true),
        ]
    }

    #[test]
    fn ranks_by_conversion_within_industry() {
        let ranked = rank_vendors(&history(), "retail");
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].vendor, "Luis");
        assert!((ranked[0].conversion_rate - 100.0).abs() < f64::EPSILON);
        assert_eq!(ranked[1].vendor, "Ana");
        assert_eq!(ranked[1].total_clients, 3);
        assert_eq!(ranked[1].closed_deals, 2);
    }

    #[test]
    fn conversion_ties_prefer_more_closes() {
        let clients = vec![
            client("Luis", "Retail", true),
            client("Ana", "Retail", true),
            client("Ana", "Retail", true),
        ];
        let ranked = rank_vendors(&clients, "Retail");
        assert_eq!(ranked[0].vendor, "Ana");
    }

    #[test]
    fn known_industries_skip_missing_labels() {
        let mut clients = history();
        clients.push(client("Ana", NOT_AVAILABLE, false));
        assert_eq!(known_industries(&clients), vec!["Retail", "Salud"]);
    }

    #[tokio::test]
    async fn keyword_classifier_prefers_longest_label() {
        let known = vec!["Retail".to_string(), "Retail de lujo".to_string()];
        let got = KeywordClassifier
            .classify("Cadena de RETAIL DE LUJO en Santiago", &known)
            .await
            .unwrap();
        assert_eq!(got, "Retail de lujo");
    }

    #[tokio::test]
    async fn keyword_classifier_fails_without_match() {
        let err = KeywordClassifier
            .classify("a bakery", &["Retail".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Classification(_)));
    }

    #[tokio::test]
    async fn empty_description_is_rejected() {
        let err = recommend(&KeywordClassifier, "   ", &history())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
