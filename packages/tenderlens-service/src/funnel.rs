use std::{cmp::Ordering, collections::HashSet, sync::Arc};

use time::{Duration, OffsetDateTime};
use tokio::{sync::Semaphore, task::JoinSet};
use uuid::Uuid;

use tenderlens_config::Config;
use tenderlens_domain::{
	AnalysisSnapshot, AnalysisTask, Criterion, CriteriaAnalysisResult, ExtractionStatus,
	FilterStage, FilteredTender, FunnelStats, ResultStatus, SearchRecord, TenderAnalysisResult,
	TenderCandidate, disqualified_by, normalize_criteria, passages::split_passages, weighted_score,
};

use crate::{Error, Providers, Result, ResultStore, SearchQuery, TenderIndex, ordering};

/// The five-stage relevance funnel, executed once per claimed task.
///
/// Stages run strictly in order; inside a stage, per-item work fans out under
/// a bounded semaphore and is fully accumulated before the next stage starts.
/// A single item's failure degrades to a filtered-out record; only
/// orchestration and store errors abort the task.
pub struct Funnel {
	cfg: Arc<Config>,
	store: Arc<dyn ResultStore>,
	index: Arc<dyn TenderIndex>,
	providers: Providers,
}

struct ExtractedTender {
	candidate: TenderCandidate,
	index_id: Uuid,
	description: Option<String>,
}

struct QualifiedTender {
	extracted: ExtractedTender,
	outcomes: Vec<CriteriaAnalysisResult>,
	score: Option<f32>,
}

enum ExtractOutcome {
	Ready(Box<ExtractedTender>),
	Dropped(Box<FilteredTender>),
}

enum CriteriaOutcome {
	Qualified(Box<QualifiedTender>),
	Dropped(Box<FilteredTender>),
}

enum DescriptionOutcome {
	Kept(Box<QualifiedTender>),
	Dropped(Box<FilteredTender>),
}

/// Stable per-tender key for the content index, so re-runs overwrite instead
/// of duplicating.
pub fn tender_index_id(analysis_id: Uuid, tender_id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{analysis_id}:{tender_id}").as_bytes())
}

impl Funnel {
	pub fn new(
		cfg: Arc<Config>,
		store: Arc<dyn ResultStore>,
		index: Arc<dyn TenderIndex>,
		providers: Providers,
	) -> Self {
		Self { cfg, store, index, providers }
	}

	pub async fn run(&self, task: &AnalysisTask) -> Result<FunnelStats> {
		let snapshot = &task.snapshot;
		let mut stats = FunnelStats::default();

		tracing::info!(
			task_id = %task.task_id,
			analysis_id = %snapshot.analysis_id,
			target_date = %task.target_date,
			"Starting analysis funnel."
		);

		let candidates = self.search_stage(task).await?;

		stats.search_candidates = candidates.len() as u32;

		if candidates.is_empty() {
			tracing::info!(task_id = %task.task_id, "No candidates for target date.");

			return Ok(stats);
		}

		let (matched, dropped) = self.relevance_stage(snapshot, candidates).await?;

		stats.relevance_matched = matched.len() as u32;
		stats.relevance_filtered = dropped.len() as u32;
		self.store.insert_filtered(&dropped).await?;

		if matched.is_empty() {
			return Ok(stats);
		}

		let (extracted, dropped) = self.extraction_stage(snapshot, matched).await?;

		stats.extraction_succeeded = extracted.len() as u32;
		stats.extraction_failed = dropped.len() as u32;
		self.store.insert_filtered(&dropped).await?;

		if extracted.is_empty() {
			return Ok(stats);
		}

		let (qualified, dropped) = self.criteria_stage(snapshot, extracted).await?;

		stats.criteria_qualified = qualified.len() as u32;
		stats.disqualified = dropped.len() as u32;
		self.store.insert_filtered(&dropped).await?;

		if qualified.is_empty() {
			return Ok(stats);
		}

		let (survivors, dropped) = self.description_stage(snapshot, qualified).await?;

		stats.description_filtered = dropped.len() as u32;
		self.store.insert_filtered(&dropped).await?;
		stats.persisted = self.persist_stage(snapshot, survivors).await?;

		tracing::info!(
			task_id = %task.task_id,
			candidates = stats.search_candidates,
			persisted = stats.persisted,
			"Funnel finished."
		);

		Ok(stats)
	}

	/// Stage 1: hybrid search over the pre-built listing index, plus the
	/// append-only search record.
	async fn search_stage(&self, task: &AnalysisTask) -> Result<Vec<TenderCandidate>> {
		let snapshot = &task.snapshot;
		let query = SearchQuery {
			phrase: snapshot.search_phrase.clone(),
			sources: snapshot.sources.clone(),
			target_date: task.target_date,
			top_k: self.cfg.funnel.top_k,
			score_threshold: self.cfg.funnel.score_threshold,
		};
		let candidates = self.index.search(&query).await?;
		let record = SearchRecord {
			search_id: Uuid::new_v4(),
			analysis_id: snapshot.analysis_id,
			target_date: task.target_date,
			phrase: snapshot.search_phrase.clone(),
			candidates: candidates.clone(),
			created_at: OffsetDateTime::now_utc(),
		};
		let search_id = self.store.save_search(&record).await?;

		tracing::info!(
			search_id = %search_id,
			candidates = candidates.len(),
			"Search stage finished."
		);

		Ok(candidates)
	}

	/// Stage 2: batched AI relevance pre-filter. Batches run concurrently
	/// under the LLM semaphore; an errored batch counts as zero matches.
	async fn relevance_stage(
		&self,
		snapshot: &AnalysisSnapshot,
		candidates: Vec<TenderCandidate>,
	) -> Result<(Vec<TenderCandidate>, Vec<FilteredTender>)> {
		let analysis_id = snapshot.analysis_id;
		let batch_size = self.cfg.funnel.batch_size.max(1) as usize;
		let semaphore = Arc::new(Semaphore::new(self.cfg.funnel.max_concurrent_llm.max(1) as usize));
		let mut set = JoinSet::new();

		for chunk in candidates.chunks(batch_size) {
			let batch = chunk.to_vec();
			let cfg = self.cfg.clone();
			let provider = self.providers.relevance.clone();
			let company = snapshot.company_description.clone();
			let semaphore = semaphore.clone();

			set.spawn(async move {
				let permit = semaphore.acquire_owned().await;

				if permit.is_err() {
					return (batch, Err(color_eyre::eyre::eyre!("Concurrency limiter closed.")));
				}

				let verdict =
					provider.classify_batch(&cfg.providers.relevance, &company, &batch).await;

				(batch, verdict)
			});
		}

		let mut matched = Vec::new();
		let mut dropped = Vec::new();

		while let Some(joined) = set.join_next().await {
			let (batch, verdict) =
				joined.map_err(|err| Error::Provider { message: err.to_string() })?;

			match verdict {
				Ok(verdict) => {
					let matched_ids: HashSet<&str> =
						verdict.matched.iter().map(String::as_str).collect();

					for candidate in batch {
						if matched_ids.contains(candidate.id.as_str()) {
							matched.push(candidate);

							continue;
						}

						let reason = verdict
							.rejected
							.iter()
							.find(|rejected| rejected.id == candidate.id)
							.map(|rejected| rejected.reason.clone())
							.unwrap_or_else(|| "Not selected as relevant.".to_string());

						dropped.push(filtered_record(
							analysis_id,
							&candidate,
							FilterStage::AiInitialFilter,
							reason,
						));
					}
				},
				Err(err) => {
					tracing::warn!(error = %err, batch = batch.len(), "Relevance batch failed.");

					for candidate in batch {
						dropped.push(filtered_record(
							analysis_id,
							&candidate,
							FilterStage::AiInitialFilter,
							format!("Relevance batch failed: {err}."),
						));
					}
				},
			}
		}

		tracing::info!(matched = matched.len(), dropped = dropped.len(), "Relevance stage finished.");

		Ok((matched, dropped))
	}

	/// Stage 3: fetch each surviving tender's page and documents and index
	/// the extracted text under a stable per-tender key.
	async fn extraction_stage(
		&self,
		snapshot: &AnalysisSnapshot,
		matched: Vec<TenderCandidate>,
	) -> Result<(Vec<ExtractedTender>, Vec<FilteredTender>)> {
		let analysis_id = snapshot.analysis_id;
		let max_chars = self.cfg.funnel.passage_max_chars as usize;
		let semaphore =
			Arc::new(Semaphore::new(self.cfg.funnel.max_concurrent_extractions.max(1) as usize));
		let mut set = JoinSet::new();

		for candidate in matched {
			let cfg = self.cfg.clone();
			let providers = self.providers.clone();
			let index = self.index.clone();
			let semaphore = semaphore.clone();

			set.spawn(async move {
				let permit = semaphore.acquire_owned().await;

				if permit.is_err() {
					return ExtractOutcome::Dropped(Box::new(filtered_record(
						analysis_id,
						&candidate,
						FilterStage::FileExtraction,
						"Concurrency limiter closed.".to_string(),
					)));
				}

				extract_one(analysis_id, candidate, &cfg, &providers, index.as_ref(), max_chars)
					.await
			});
		}

		let mut extracted = Vec::new();
		let mut dropped = Vec::new();

		while let Some(joined) = set.join_next().await {
			match joined.map_err(|err| Error::Provider { message: err.to_string() })? {
				ExtractOutcome::Ready(tender) => extracted.push(*tender),
				ExtractOutcome::Dropped(record) => dropped.push(*record),
			}
		}

		tracing::info!(
			extracted = extracted.len(),
			dropped = dropped.len(),
			"Extraction stage finished."
		);

		Ok((extracted, dropped))
	}

	/// Stage 4: criteria evaluated strictly in profile order, one call per
	/// criterion, stopping at the first disqualifying failure.
	async fn criteria_stage(
		&self,
		snapshot: &AnalysisSnapshot,
		extracted: Vec<ExtractedTender>,
	) -> Result<(Vec<QualifiedTender>, Vec<FilteredTender>)> {
		let analysis_id = snapshot.analysis_id;
		let criteria = Arc::new(normalize_criteria(snapshot.criteria.clone()));
		let semaphore = Arc::new(Semaphore::new(self.cfg.funnel.max_concurrent_llm.max(1) as usize));
		let mut set = JoinSet::new();

		for tender in extracted {
			let cfg = self.cfg.clone();
			let provider = self.providers.criteria.clone();
			let criteria = criteria.clone();
			let semaphore = semaphore.clone();

			set.spawn(async move {
				let permit = semaphore.acquire_owned().await;

				if permit.is_err() {
					return CriteriaOutcome::Dropped(Box::new(filtered_record(
						analysis_id,
						&tender.candidate,
						FilterStage::CriteriaNotMet,
						"Concurrency limiter closed.".to_string(),
					)));
				}

				analyze_one(analysis_id, tender, &cfg, provider.as_ref(), &criteria).await
			});
		}

		let mut qualified = Vec::new();
		let mut dropped = Vec::new();

		while let Some(joined) = set.join_next().await {
			match joined.map_err(|err| Error::Provider { message: err.to_string() })? {
				CriteriaOutcome::Qualified(tender) => qualified.push(*tender),
				CriteriaOutcome::Dropped(record) => dropped.push(*record),
			}
		}

		tracing::info!(
			qualified = qualified.len(),
			dropped = dropped.len(),
			"Criteria stage finished."
		);

		Ok((qualified, dropped))
	}

	/// Stage 5a: second AI pass over the tender's own description.
	async fn description_stage(
		&self,
		snapshot: &AnalysisSnapshot,
		qualified: Vec<QualifiedTender>,
	) -> Result<(Vec<QualifiedTender>, Vec<FilteredTender>)> {
		let analysis_id = snapshot.analysis_id;
		let semaphore = Arc::new(Semaphore::new(self.cfg.funnel.max_concurrent_llm.max(1) as usize));
		let mut set = JoinSet::new();

		for tender in qualified {
			let cfg = self.cfg.clone();
			let provider = self.providers.relevance.clone();
			let company = snapshot.company_description.clone();
			let semaphore = semaphore.clone();

			set.spawn(async move {
				let permit = semaphore.acquire_owned().await;

				if permit.is_err() {
					return DescriptionOutcome::Dropped(Box::new(filtered_record(
						analysis_id,
						&tender.extracted.candidate,
						FilterStage::AiDescriptionFilter,
						"Concurrency limiter closed.".to_string(),
					)));
				}

				let description = tender_description(&tender.extracted);
				let verdict = provider
					.filter_description(&cfg.providers.relevance, &company, &description)
					.await;

				match verdict {
					Ok(verdict) if verdict.relevant => DescriptionOutcome::Kept(Box::new(tender)),
					Ok(verdict) => {
						let reason = if verdict.reason.is_empty() {
							"Description does not match the company profile.".to_string()
						} else {
							verdict.reason
						};

						DescriptionOutcome::Dropped(Box::new(filtered_record(
							analysis_id,
							&tender.extracted.candidate,
							FilterStage::AiDescriptionFilter,
							reason,
						)))
					},
					Err(err) => DescriptionOutcome::Dropped(Box::new(filtered_record(
						analysis_id,
						&tender.extracted.candidate,
						FilterStage::AiDescriptionFilter,
						format!("Description filter failed: {err}."),
					))),
				}
			});
		}

		let mut kept = Vec::new();
		let mut dropped = Vec::new();

		while let Some(joined) = set.join_next().await {
			match joined.map_err(|err| Error::Provider { message: err.to_string() })? {
				DescriptionOutcome::Kept(tender) => kept.push(*tender),
				DescriptionOutcome::Dropped(record) => dropped.push(*record),
			}
		}

		tracing::info!(kept = kept.len(), dropped = dropped.len(), "Description stage finished.");

		Ok((kept, dropped))
	}

	/// Stage 5b: persist survivors best-first and hand out order numbers.
	async fn persist_stage(
		&self,
		snapshot: &AnalysisSnapshot,
		mut survivors: Vec<QualifiedTender>,
	) -> Result<u32> {
		survivors.sort_by(|a, b| {
			b.score
				.unwrap_or(-1.0)
				.partial_cmp(&a.score.unwrap_or(-1.0))
				.unwrap_or(Ordering::Equal)
		});

		let base = OffsetDateTime::now_utc();

		for (position, tender) in survivors.iter().enumerate() {
			let candidate = &tender.extracted.candidate;
			let result = TenderAnalysisResult {
				id: Uuid::new_v4(),
				analysis_id: snapshot.analysis_id,
				user_id: snapshot.assigned_users.first().cloned(),
				tender_url: candidate.id.clone(),
				tender_metadata: serde_json::json!({
					"name": candidate.name,
					"organization": candidate.organization,
					"location": candidate.location,
					"source": candidate.source,
					"search_score": candidate.score,
					"description": tender.extracted.description,
				}),
				tender_score: tender.score,
				criteria_analysis: tender.outcomes.clone(),
				status: ResultStatus::Inactive,
				order_number: None,
				// Per-row microsecond offsets keep creation order total on
				// coarse clocks, so ranking survives the order-number pass.
				created_at: base + Duration::microseconds(position as i64),
				opened_at: None,
			};

			self.store.upsert_result(&result).await?;
		}

		ordering::assign_order_numbers(self.store.as_ref(), snapshot.analysis_id).await?;

		Ok(survivors.len() as u32)
	}
}

async fn extract_one(
	analysis_id: Uuid,
	candidate: TenderCandidate,
	cfg: &Config,
	providers: &Providers,
	index: &dyn TenderIndex,
	max_chars: usize,
) -> ExtractOutcome {
	let report =
		match providers.extraction.extract_files(&cfg.providers.extraction, &candidate).await {
			Ok(report) => report,
			Err(err) => {
				tracing::warn!(tender_id = %candidate.id, error = %err, "Extraction call failed.");

				return ExtractOutcome::Dropped(Box::new(filtered_record(
					analysis_id,
					&candidate,
					FilterStage::FileExtraction,
					format!("Extraction failed: {err}."),
				)));
			},
		};

	if report.status == ExtractionStatus::Failed {
		let reason =
			report.reason.unwrap_or_else(|| "Extraction reported failure.".to_string());

		return ExtractOutcome::Dropped(Box::new(filtered_record(
			analysis_id,
			&candidate,
			FilterStage::FileExtraction,
			reason,
		)));
	}

	let mut texts: Vec<String> =
		report.files.iter().flat_map(|file| split_passages(&file.text, max_chars)).collect();

	if let Some(description) = &report.description {
		texts.extend(split_passages(description, max_chars));
	}
	if texts.is_empty() {
		return ExtractOutcome::Dropped(Box::new(filtered_record(
			analysis_id,
			&candidate,
			FilterStage::FileExtraction,
			"No extractable content.".to_string(),
		)));
	}

	let index_id = tender_index_id(analysis_id, &candidate.id);

	match index.upsert_documents(index_id, &candidate, &texts).await {
		Ok(count) => {
			tracing::debug!(tender_id = %candidate.id, passages = count, "Indexed tender content.");

			ExtractOutcome::Ready(Box::new(ExtractedTender {
				candidate,
				index_id,
				description: report.description,
			}))
		},
		Err(err) => {
			tracing::warn!(tender_id = %candidate.id, error = %err, "Indexing extracted content failed.");

			ExtractOutcome::Dropped(Box::new(filtered_record(
				analysis_id,
				&candidate,
				FilterStage::FileExtraction,
				format!("Indexing extracted content failed: {err}."),
			)))
		},
	}
}

async fn analyze_one(
	analysis_id: Uuid,
	tender: ExtractedTender,
	cfg: &Config,
	provider: &dyn crate::CriteriaProvider,
	criteria: &[Criterion],
) -> CriteriaOutcome {
	let mut outcomes = Vec::with_capacity(criteria.len());

	for criterion in criteria {
		let analyzed = provider
			.analyze(&cfg.providers.criteria, tender.index_id, std::slice::from_ref(criterion))
			.await;
		let outcome = match analyzed {
			Ok(list) => list.into_iter().next(),
			Err(err) => {
				tracing::warn!(
					tender_id = %tender.candidate.id,
					criterion = %criterion.name,
					error = %err,
					"Criteria analysis failed."
				);

				return CriteriaOutcome::Dropped(Box::new(filtered_record(
					analysis_id,
					&tender.candidate,
					FilterStage::CriteriaNotMet,
					format!("Criteria analysis failed: {err}."),
				)));
			},
		};
		let Some(mut outcome) = outcome else {
			return CriteriaOutcome::Dropped(Box::new(filtered_record(
				analysis_id,
				&tender.candidate,
				FilterStage::CriteriaNotMet,
				format!("Criteria engine returned no outcome for {:?}.", criterion.name),
			)));
		};

		// The profile's weights and flags are authoritative over whatever the
		// engine echoes back.
		outcome.criteria = criterion.name.clone();
		outcome.weight = criterion.weight;
		outcome.is_disqualifying = criterion.is_disqualifying;
		outcome.exclude_from_score = criterion.exclude_from_score;

		let disqualified = disqualified_by(&outcome);

		outcomes.push(outcome);

		if disqualified {
			// Short-circuit: later criteria are never evaluated for this
			// tender, and no result row is written for it.
			return CriteriaOutcome::Dropped(Box::new(filtered_record(
				analysis_id,
				&tender.candidate,
				FilterStage::CriteriaNotMet,
				format!("Disqualifying criterion {:?} not met.", criterion.name),
			)));
		}
	}

	let score = weighted_score(&outcomes);

	CriteriaOutcome::Qualified(Box::new(QualifiedTender { extracted: tender, outcomes, score }))
}

fn tender_description(extracted: &ExtractedTender) -> String {
	extracted.description.clone().unwrap_or_else(|| {
		format!("{} ({})", extracted.candidate.name, extracted.candidate.organization)
	})
}

fn filtered_record(
	analysis_id: Uuid,
	candidate: &TenderCandidate,
	filter_stage: FilterStage,
	filter_reason: String,
) -> FilteredTender {
	FilteredTender {
		tender_id: candidate.id.clone(),
		analysis_id,
		filter_stage,
		filter_reason,
		filter_timestamp: OffsetDateTime::now_utc(),
		original_match: serde_json::to_value(candidate).unwrap_or(serde_json::Value::Null),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tender_index_ids_are_stable_per_analysis_and_tender() {
		let analysis_id = Uuid::new_v4();
		let a = tender_index_id(analysis_id, "https://tenders.example/1");
		let b = tender_index_id(analysis_id, "https://tenders.example/1");
		let c = tender_index_id(analysis_id, "https://tenders.example/2");

		assert_eq!(a, b);
		assert_ne!(a, c);
	}
}
