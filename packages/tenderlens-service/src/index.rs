use std::{collections::{HashMap, HashSet}, sync::Arc};

use qdrant_client::{
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Document, Filter,
		Fusion, Modifier, PointStruct, PrefetchQueryBuilder, Query, QueryPointsBuilder,
		ScoredPoint, SparseVectorParamsBuilder, SparseVectorsConfigBuilder, UpsertPointsBuilder,
		Value, Vector, VectorParamsBuilder, VectorsConfigBuilder, value::Kind,
	},
};
use uuid::Uuid;

use tenderlens_config::EmbeddingProviderConfig;
use tenderlens_domain::{TenderCandidate, time_serde};
use tenderlens_storage::qdrant::{BM25_MODEL, BM25_VECTOR_NAME, DENSE_VECTOR_NAME, QdrantStore};

use crate::{BoxFuture, EmbeddingProvider, Error, Result, SearchQuery, TenderIndex};

/// Qdrant-backed tender index: dense + BM25 fusion search over the listing
/// collection, and per-tender document upserts into the content collection
/// the criteria engine retrieves against.
pub struct QdrantTenderIndex {
	store: QdrantStore,
	embedding_cfg: EmbeddingProviderConfig,
	embedding: Arc<dyn EmbeddingProvider>,
}
impl QdrantTenderIndex {
	pub fn new(
		store: QdrantStore,
		embedding_cfg: EmbeddingProviderConfig,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Self {
		Self { store, embedding_cfg, embedding }
	}

	/// Creates the content collection when missing. The listing collection is
	/// owned by the external indexing pipeline and is never created here.
	pub async fn ensure_content_collection(&self) -> Result<()> {
		if self
			.store
			.client
			.collection_exists(self.store.content_collection.clone())
			.await?
		{
			return Ok(());
		}

		let mut vectors_config = VectorsConfigBuilder::default();

		vectors_config.add_named_vector_params(
			DENSE_VECTOR_NAME,
			VectorParamsBuilder::new(u64::from(self.store.vector_dim), Distance::Cosine),
		);

		let mut sparse_config = SparseVectorsConfigBuilder::default();

		sparse_config.add_named_vector_params(
			BM25_VECTOR_NAME,
			SparseVectorParamsBuilder::default().modifier(Modifier::Idf as i32),
		);

		let create = CreateCollectionBuilder::new(self.store.content_collection.clone())
			.vectors_config(vectors_config)
			.sparse_vectors_config(sparse_config);

		self.store.client.create_collection(create).await?;

		Ok(())
	}

	async fn run_search(&self, query: &SearchQuery) -> Result<Vec<TenderCandidate>> {
		let vectors =
			self.embedding.embed(&self.embedding_cfg, std::slice::from_ref(&query.phrase)).await?;
		let vector = vectors.into_iter().next().ok_or_else(|| Error::Provider {
			message: "Embedding provider returned no vectors.".to_string(),
		})?;

		if vector.len() != self.store.vector_dim as usize {
			return Err(Error::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		let date = time_serde::date::format(query.target_date);
		let mut conditions = vec![Condition::matches("initiation_date", date)];

		if !query.sources.is_empty() {
			conditions.push(Condition::matches("source", query.sources.clone()));
		}

		let filter = Filter::must(conditions);
		let dense_prefetch = PrefetchQueryBuilder::default()
			.query(Query::new_nearest(vector))
			.using(DENSE_VECTOR_NAME)
			.filter(filter.clone())
			.limit(u64::from(query.top_k));
		let bm25_prefetch = PrefetchQueryBuilder::default()
			.query(Query::new_nearest(Document::new(query.phrase.clone(), BM25_MODEL)))
			.using(BM25_VECTOR_NAME)
			.filter(filter)
			.limit(u64::from(query.top_k));
		let search = QueryPointsBuilder::new(self.store.collection.clone())
			.add_prefetch(dense_prefetch)
			.add_prefetch(bm25_prefetch)
			.with_payload(true)
			.query(Fusion::Rrf)
			.limit(u64::from(query.top_k));
		let response = self.store.client.query(search).await?;

		Ok(collect_candidates(&response.result, query.score_threshold))
	}

	async fn run_upsert(
		&self,
		tender_index_id: Uuid,
		candidate: &TenderCandidate,
		passages: &[String],
	) -> Result<usize> {
		if passages.is_empty() {
			return Ok(0);
		}

		// Replace any previous content for this tender, so re-runs never
		// accumulate stale chunks.
		let filter =
			Filter::must([Condition::matches("tender_index_id", tender_index_id.to_string())]);
		let delete = DeletePointsBuilder::new(self.store.content_collection.clone())
			.points(filter)
			.wait(true);

		if let Err(err) = self.store.client.delete_points(delete).await {
			if !is_not_found_error(&err) {
				return Err(err.into());
			}
		}

		let vectors = self.embedding.embed(&self.embedding_cfg, passages).await?;

		if vectors.len() != passages.len() {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned {} vectors for {} passages.",
					vectors.len(),
					passages.len()
				),
			});
		}

		let mut points = Vec::with_capacity(passages.len());

		for (index, (passage, vector)) in passages.iter().zip(vectors.iter()).enumerate() {
			if vector.len() != self.store.vector_dim as usize {
				return Err(Error::Provider {
					message: "Embedding vector dimension mismatch.".to_string(),
				});
			}

			let mut payload_map = HashMap::new();

			payload_map
				.insert("tender_index_id".to_string(), Value::from(tender_index_id.to_string()));
			payload_map.insert("tender_id".to_string(), Value::from(candidate.id.clone()));
			payload_map.insert("source".to_string(), Value::from(candidate.source.clone()));
			payload_map.insert("chunk_index".to_string(), Value::from(index as i64));
			payload_map.insert("text".to_string(), Value::from(passage.clone()));

			let payload = Payload::from(payload_map);
			let mut vector_map = HashMap::new();

			vector_map.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(vector.to_vec()));
			vector_map.insert(
				BM25_VECTOR_NAME.to_string(),
				Vector::from(Document::new(passage.clone(), BM25_MODEL)),
			);

			let point_id =
				Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{tender_index_id}:{index}").as_bytes());

			points.push(PointStruct::new(point_id.to_string(), vector_map, payload));
		}

		let count = points.len();
		let upsert =
			UpsertPointsBuilder::new(self.store.content_collection.clone(), points).wait(true);

		self.store.client.upsert_points(upsert).await?;

		Ok(count)
	}
}
impl TenderIndex for QdrantTenderIndex {
	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, Result<Vec<TenderCandidate>>> {
		Box::pin(self.run_search(query))
	}

	fn upsert_documents<'a>(
		&'a self,
		tender_index_id: Uuid,
		candidate: &'a TenderCandidate,
		passages: &'a [String],
	) -> BoxFuture<'a, Result<usize>> {
		Box::pin(self.run_upsert(tender_index_id, candidate, passages))
	}
}

/// Fused hits come back best-first; the first point wins when a tender
/// surfaces through more than one listing chunk.
fn collect_candidates(points: &[ScoredPoint], score_threshold: f32) -> Vec<TenderCandidate> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for point in points {
		if point.score < score_threshold {
			continue;
		}

		let Some(tender_id) = payload_str(&point.payload, "tender_id") else {
			tracing::warn!("Search hit is missing tender_id.");

			continue;
		};

		if !seen.insert(tender_id.clone()) {
			continue;
		}

		out.push(TenderCandidate {
			id: tender_id,
			name: payload_str(&point.payload, "name").unwrap_or_default(),
			organization: payload_str(&point.payload, "organization").unwrap_or_default(),
			location: payload_str(&point.payload, "location").unwrap_or_default(),
			source: payload_str(&point.payload, "source").unwrap_or_default(),
			score: point.score,
		});
	}

	out
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match payload.get(key)?.kind.as_ref()? {
		Kind::StringValue(value) => Some(value.clone()),
		_ => None,
	}
}

fn is_not_found_error(err: &qdrant_client::QdrantError) -> bool {
	let message = err.to_string().to_lowercase();

	(message.contains("not found") || message.contains("404")) && message.contains("point")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn point(tender_id: &str, name: &str, score: f32) -> ScoredPoint {
		let mut payload = HashMap::new();

		payload.insert("tender_id".to_string(), Value::from(tender_id.to_string()));
		payload.insert("name".to_string(), Value::from(name.to_string()));
		payload.insert("organization".to_string(), Value::from("City of Example".to_string()));
		payload.insert("location".to_string(), Value::from("Example".to_string()));
		payload.insert("source".to_string(), Value::from("portal-a".to_string()));

		ScoredPoint { payload, score, ..Default::default() }
	}

	#[test]
	fn candidates_deduplicate_on_tender_id_keeping_the_best_hit() {
		let points =
			[point("t-1", "Road works", 0.9), point("t-1", "Road works", 0.5), point("t-2", "Rail", 0.7)];
		let candidates = collect_candidates(&points, 0.0);

		assert_eq!(candidates.len(), 2);
		assert_eq!(candidates[0].id, "t-1");
		assert!((candidates[0].score - 0.9).abs() < f32::EPSILON);
	}

	#[test]
	fn threshold_drops_weak_hits() {
		let points = [point("t-1", "Road works", 0.9), point("t-2", "Rail", 0.2)];
		let candidates = collect_candidates(&points, 0.5);

		assert_eq!(candidates.len(), 1);
		assert_eq!(candidates[0].id, "t-1");
	}

	#[test]
	fn hits_without_tender_id_are_skipped() {
		let mut broken = point("t-1", "Road works", 0.9);

		broken.payload.remove("tender_id");

		assert!(collect_candidates(&[broken], 0.0).is_empty());
	}
}
