use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use tenderlens_domain::{Criterion, CriteriaAnalysisResult};

#[derive(Debug, Deserialize)]
struct CriteriaResponse {
	criteria_analysis: Vec<CriteriaAnalysisResult>,
	#[serde(default)]
	#[allow(dead_code)]
	location: Option<String>,
}

/// Runs the retrieval-augmented criteria engine against one tender's indexed
/// content. Callers pass one criterion at a time when they need to stop on a
/// disqualifying failure.
pub async fn analyze(
	cfg: &tenderlens_config::ServiceProviderConfig,
	tender_index_id: Uuid,
	criteria: &[Criterion],
) -> Result<Vec<CriteriaAnalysisResult>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"tender_index_id": tender_index_id,
		"criteria": criteria,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_criteria_response(json)
}

fn parse_criteria_response(json: Value) -> Result<Vec<CriteriaAnalysisResult>> {
	let response: CriteriaResponse = serde_json::from_value(json)
		.map_err(|err| eyre::eyre!("Criteria response has an unexpected shape: {err}."))?;

	Ok(response.criteria_analysis)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tenderlens_domain::Confidence;

	#[test]
	fn criteria_outcomes_parse_with_citations() {
		let json = serde_json::json!({
			"criteria_analysis": [
				{
					"criteria": "Budget",
					"analysis": {
						"summary": "Budget of 2M fits the declared range.",
						"confidence": "HIGH",
						"criteria_met": true
					},
					"weight": 5,
					"is_disqualifying": true,
					"citations": ["Section 3: estimated value 2 000 000."]
				}
			],
			"location": "eu-west"
		});
		let outcomes = parse_criteria_response(json).unwrap();

		assert_eq!(outcomes.len(), 1);
		assert_eq!(outcomes[0].criteria, "Budget");
		assert_eq!(outcomes[0].analysis.confidence, Confidence::High);
		assert!(outcomes[0].analysis.criteria_met);
		assert_eq!(outcomes[0].citations.len(), 1);
	}

	#[test]
	fn missing_analysis_block_is_an_error() {
		let json = serde_json::json!({
			"criteria_analysis": [{ "criteria": "Budget", "weight": 5 }]
		});

		assert!(parse_criteria_response(json).is_err());
	}
}
