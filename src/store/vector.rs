use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::models::{ChunkMetadata, VectorRecord};

/// Chroma caps neither batch size nor payload, but large adds time out;
/// matches the ingestion batch used against hosted instances.
const ADD_BATCH_SIZE: usize = 100;

/// Optional exact-match constraints applied at query time
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub speaker: Option<String>,
    pub meeting_date: Option<String>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.speaker.is_none() && self.meeting_date.is_none()
    }

    /// Chroma `where` document, `None` when unconstrained
    fn to_where(&self) -> Option<serde_json::Value> {
        let mut clauses = Vec::new();
        if let Some(speaker) = &self.speaker {
            clauses.push(json!({"speaker": {"$eq": speaker}}));
        }
        if let Some(date) = &self.meeting_date {
            clauses.push(json!({"meeting_date": {"$eq": date}}));
        }
        match clauses.len() {
            0 => None,
            1 => Some(clauses.into_iter().next().unwrap()),
            _ => Some(json!({"$and": clauses})),
        }
    }
}

/// One nearest-neighbor match
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk_id: String,
    /// Cosine distance in [0, 2]
    pub distance: f32,
    pub document: String,
    pub metadata: ChunkMetadata,
}

/// Embedded-chunk storage. Production talks to Chroma over HTTP; tests use
/// an in-process brute-force index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Remove every chunk previously stored for a meeting
    async fn delete_meeting(&self, meeting_id: &str) -> Result<()>;

    /// Store records with their embeddings, positionally matched
    async fn add(&self, records: &[VectorRecord], embeddings: &[Vec<f32>]) -> Result<()>;

    /// Nearest neighbors of `embedding`, optionally filtered by metadata
    async fn search(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<VectorHit>>;
}

/// HTTP client for a Chroma collection, created with cosine distance
pub struct ChromaClient {
    client: reqwest::Client,
    base_url: String,
    collection_id: String,
}

impl ChromaClient {
    /// Connect to a Chroma server and get or create the named collection
    pub async fn connect(base_url: &str, collection_name: &str) -> Result<Self> {
        let client = reqwest::Client::new();
        let base_url = base_url.trim_end_matches('/').to_string();

        let response = client
            .post(format!("{}/api/v1/collections", base_url))
            .json(&json!({
                "name": collection_name,
                "metadata": {"hnsw:space": "cosine"},
                "get_or_create": true,
            }))
            .send()
            .await
            .context("Failed to reach Chroma server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Chroma collection request failed ({}): {}",
                status,
                body
            ));
        }

        let collection: CollectionResponse = response
            .json()
            .await
            .context("Failed to parse Chroma collection response")?;

        info!(
            "Using Chroma collection '{}' ({})",
            collection_name, collection.id
        );
        Ok(Self {
            client,
            base_url,
            collection_id: collection.id,
        })
    }

    fn collection_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{}",
            self.base_url, self.collection_id, endpoint
        )
    }

    async fn post_expect_success(&self, endpoint: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.collection_url(endpoint))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Chroma {} request failed", endpoint))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Chroma {} failed ({}): {}", endpoint, status, text));
        }
        Ok(response)
    }
}

#[async_trait]
impl VectorStore for ChromaClient {
    async fn delete_meeting(&self, meeting_id: &str) -> Result<()> {
        self.post_expect_success(
            "delete",
            json!({"where": {"source_meeting_id": {"$eq": meeting_id}}}),
        )
        .await?;
        Ok(())
    }

    async fn add(&self, records: &[VectorRecord], embeddings: &[Vec<f32>]) -> Result<()> {
        if records.len() != embeddings.len() {
            return Err(anyhow!(
                "Record/embedding count mismatch: {} vs {}",
                records.len(),
                embeddings.len()
            ));
        }

        for (records, embeddings) in records
            .chunks(ADD_BATCH_SIZE)
            .zip(embeddings.chunks(ADD_BATCH_SIZE))
        {
            let ids: Vec<&str> = records.iter().map(|r| r.chunk_id.as_str()).collect();
            let documents: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
            let metadatas: Vec<&ChunkMetadata> = records.iter().map(|r| &r.metadata).collect();

            self.post_expect_success(
                "add",
                json!({
                    "ids": ids,
                    "embeddings": embeddings,
                    "documents": documents,
                    "metadatas": metadatas,
                }),
            )
            .await?;
        }
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<VectorHit>> {
        let mut body = json!({
            "query_embeddings": [embedding],
            "n_results": n_results,
            "include": ["metadatas", "documents", "distances"],
        });
        if let Some(where_doc) = filter.to_where() {
            body["where"] = where_doc;
        }

        let response = self.post_expect_success("query", body).await?;
        let result: QueryResponse = response
            .json()
            .await
            .context("Failed to parse Chroma query response")?;

        // One query embedding, so only the first inner list matters
        let ids = result.ids.into_iter().next().unwrap_or_default();
        let distances = result.distances.into_iter().next().unwrap_or_default();
        let documents = result.documents.into_iter().next().unwrap_or_default();
        let metadatas = result.metadatas.into_iter().next().unwrap_or_default();

        let mut hits = Vec::with_capacity(ids.len());
        for (((chunk_id, distance), document), metadata) in ids
            .into_iter()
            .zip(distances)
            .zip(documents)
            .zip(metadatas)
        {
            hits.push(VectorHit {
                chunk_id,
                distance,
                document,
                metadata,
            });
        }
        Ok(hits)
    }
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Serialize, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    distances: Vec<Vec<f32>>,
    documents: Vec<Vec<String>>,
    metadatas: Vec<Vec<ChunkMetadata>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_where_documents() {
        let empty = MetadataFilter::default();
        assert!(empty.to_where().is_none());

        let speaker_only = MetadataFilter {
            speaker: Some("김영옥 의원".to_string()),
            meeting_date: None,
        };
        assert_eq!(
            speaker_only.to_where().unwrap(),
            json!({"speaker": {"$eq": "김영옥 의원"}})
        );

        let both = MetadataFilter {
            speaker: Some("김영옥 의원".to_string()),
            meeting_date: Some("2024.09.10".to_string()),
        };
        let doc = both.to_where().unwrap();
        assert_eq!(doc["$and"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_query_response_shape() {
        let raw = r#"{
            "ids": [["m1_chunk_0001"]],
            "distances": [[0.18]],
            "documents": [["상정합니다."]],
            "metadatas": [[{
                "meeting_title": "본회의",
                "meeting_date": "2024.09.10",
                "meeting_url": "https://example.com",
                "speaker": "의장",
                "agenda": "안건",
                "agenda_id": "m1_agenda_001",
                "chunk_index": 1,
                "source_meeting_id": "m1"
            }]]
        }"#;
        let parsed: QueryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.ids[0][0], "m1_chunk_0001");
        assert_eq!(parsed.metadatas[0][0].agenda_id, "m1_agenda_001");
    }
}
