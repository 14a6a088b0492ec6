use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

pub async fn send(
	cfg: &tenderlens_config::EmailProviderConfig,
	to: &str,
	subject: &str,
	html: &str,
) -> Result<()> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = build_payload(&cfg.from_address, to, subject, html);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;

	if !res.status().is_success() {
		let status = res.status();
		let body = res.text().await.unwrap_or_default();

		return Err(eyre::eyre!("Mail API returned {status}: {body}"));
	}

	Ok(())
}

fn build_payload(from: &str, to: &str, subject: &str, html: &str) -> Value {
	serde_json::json!({
		"from": from,
		"to": [to],
		"subject": subject,
		"html": html,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn payload_addresses_a_single_recipient() {
		let payload =
			build_payload("alerts@example.com", "buyer@example.com", "New tenders", "<p>3 found</p>");

		assert_eq!(payload["from"], "alerts@example.com");
		assert_eq!(payload["to"], serde_json::json!(["buyer@example.com"]));
		assert_eq!(payload["subject"], "New tenders");
	}
}
