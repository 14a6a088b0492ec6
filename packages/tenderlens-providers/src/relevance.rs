use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

use tenderlens_domain::{BatchVerdict, DescriptionVerdict, TenderCandidate};

const MAX_ATTEMPTS: usize = 3;

/// Classifies one batch of candidates for relevance against a company
/// profile. The model answers with a JSON object listing matched ids and
/// rejected ids with reasons.
pub async fn classify_batch(
	cfg: &tenderlens_config::LlmProviderConfig,
	company_description: &str,
	candidates: &[TenderCandidate],
) -> Result<BatchVerdict> {
	let listing = candidates
		.iter()
		.map(|candidate| {
			serde_json::json!({
				"id": candidate.id,
				"name": candidate.name,
				"organization": candidate.organization,
				"location": candidate.location,
			})
		})
		.collect::<Vec<_>>();
	let messages = vec![
		serde_json::json!({
			"role": "system",
			"content": "You screen procurement tenders for relevance to a company. \
Answer with JSON: {\"matches\": [id], \"rejected\": [{\"id\": id, \"reason\": text}]}. \
Every input id must appear in exactly one list.",
		}),
		serde_json::json!({
			"role": "user",
			"content": format!(
				"Company profile:\n{company_description}\n\nTenders:\n{}",
				Value::Array(listing),
			),
		}),
	];
	let json = chat_json(cfg, &messages).await?;

	parse_batch_verdict(json)
}

/// Second-pass filter comparing a tender's own description against the
/// company profile.
pub async fn filter_description(
	cfg: &tenderlens_config::LlmProviderConfig,
	company_description: &str,
	description: &str,
) -> Result<DescriptionVerdict> {
	let messages = vec![
		serde_json::json!({
			"role": "system",
			"content": "You judge whether a tender description fits a company profile. \
Answer with JSON: {\"relevant\": bool, \"reason\": text}.",
		}),
		serde_json::json!({
			"role": "user",
			"content": format!(
				"Company profile:\n{company_description}\n\nTender description:\n{description}",
			),
		}),
	];
	let json = chat_json(cfg, &messages).await?;

	parse_description_verdict(json)
}

async fn chat_json(cfg: &tenderlens_config::LlmProviderConfig, messages: &[Value]) -> Result<Value> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);

	for _ in 0..MAX_ATTEMPTS {
		let body = serde_json::json!({
			"model": cfg.model,
			"temperature": cfg.temperature,
			"messages": messages,
		});
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		if let Ok(parsed) = extract_content_json(json) {
			return Ok(parsed);
		}
	}

	Err(eyre::eyre!("Classifier response is not valid JSON."))
}

fn extract_content_json(json: Value) -> Result<Value> {
	if let Some(content) = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
	{
		let parsed: Value = serde_json::from_str(content)
			.map_err(|_| eyre::eyre!("Classifier content is not valid JSON."))?;

		return Ok(parsed);
	}

	if json.is_object() {
		return Ok(json);
	}

	Err(eyre::eyre!("Classifier response is missing JSON content."))
}

fn parse_batch_verdict(json: Value) -> Result<BatchVerdict> {
	serde_json::from_value(normalize_batch_shape(json))
		.map_err(|err| eyre::eyre!("Batch verdict has an unexpected shape: {err}."))
}

/// Accepts both the documented `matches` key and the `matched` variant some
/// models produce.
fn normalize_batch_shape(mut json: Value) -> Value {
	if let Some(object) = json.as_object_mut() {
		if let Some(matches) = object.remove("matches") {
			object.insert("matched".to_string(), matches);
		}

		object.entry("matched").or_insert_with(|| Value::Array(Vec::new()));
		object.entry("rejected").or_insert_with(|| Value::Array(Vec::new()));
	}

	json
}

fn parse_description_verdict(json: Value) -> Result<DescriptionVerdict> {
	serde_json::from_value(json)
		.map_err(|err| eyre::eyre!("Description verdict has an unexpected shape: {err}."))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn batch_verdict_parses_both_key_spellings() {
		for key in ["matches", "matched"] {
			let json = serde_json::json!({
				key: ["t-1", "t-2"],
				"rejected": [{ "id": "t-3", "reason": "Wrong industry." }],
			});
			let verdict = parse_batch_verdict(json).unwrap();

			assert_eq!(verdict.matched, vec!["t-1".to_string(), "t-2".to_string()]);
			assert_eq!(verdict.rejected.len(), 1);
			assert_eq!(verdict.rejected[0].reason, "Wrong industry.");
		}
	}

	#[test]
	fn missing_lists_default_to_empty() {
		let verdict = parse_batch_verdict(serde_json::json!({})).unwrap();

		assert!(verdict.matched.is_empty());
		assert!(verdict.rejected.is_empty());
	}

	#[test]
	fn content_json_is_unwrapped_from_chat_choices() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "{\"relevant\": false, \"reason\": \"No overlap.\"}" } }
			]
		});
		let verdict = parse_description_verdict(extract_content_json(json).unwrap()).unwrap();

		assert!(!verdict.relevant);
		assert_eq!(verdict.reason, "No overlap.");
	}

	#[test]
	fn non_json_content_is_an_error() {
		let json = serde_json::json!({
			"choices": [{ "message": { "content": "not json" } }]
		});

		assert!(extract_content_json(json).is_err());
	}
}
