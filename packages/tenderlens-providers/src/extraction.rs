use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

use tenderlens_domain::{ExtractionReport, TenderCandidate};

/// Asks the extraction service to fetch a tender's detail page and documents
/// and return their text. A failed report is a normal outcome, not an error;
/// errors are reserved for transport problems.
pub async fn extract_files(
	cfg: &tenderlens_config::ServiceProviderConfig,
	candidate: &TenderCandidate,
) -> Result<ExtractionReport> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"tender_id": candidate.id,
		"source": candidate.source,
		"name": candidate.name,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_extraction_report(json)
}

fn parse_extraction_report(json: Value) -> Result<ExtractionReport> {
	let report: ExtractionReport = serde_json::from_value(json)
		.map_err(|err| eyre::eyre!("Extraction report has an unexpected shape: {err}."))?;

	Ok(report)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tenderlens_domain::ExtractionStatus;

	#[test]
	fn report_parses_with_files_and_description() {
		let json = serde_json::json!({
			"status": "ok",
			"description": "Resurfacing of municipal roads.",
			"files": [
				{ "filename": "notice.pdf", "text": "Full notice text." },
				{ "filename": "boq.xlsx", "text": "Bill of quantities." }
			]
		});
		let report = parse_extraction_report(json).unwrap();

		assert_eq!(report.status, ExtractionStatus::Ok);
		assert_eq!(report.files.len(), 2);
		assert!(report.description.is_some());
	}

	#[test]
	fn failed_report_carries_the_reason() {
		let json = serde_json::json!({ "status": "failed", "reason": "Portal timeout." });
		let report = parse_extraction_report(json).unwrap();

		assert_eq!(report.status, ExtractionStatus::Failed);
		assert_eq!(report.reason.as_deref(), Some("Portal timeout."));
		assert!(report.files.is_empty());
	}

	#[test]
	fn unknown_status_is_an_error() {
		assert!(parse_extraction_report(serde_json::json!({ "status": "maybe" })).is_err());
	}
}
