use crate::db::Db;
use crate::embeddings::Embedder;
use crate::error::{RagQueryError, Result};
use crate::retrieval::{Document, Retriever};
use async_trait::async_trait;
use rusqlite::params;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Vector-similarity retriever over the SQLite `documents` table.
///
/// Embeds the query, scores every stored embedding by cosine similarity and
/// returns the `k` best rows. The table is populated by an external indexer
/// (or [`store_document`]).
pub struct SqliteRetriever {
    db: Db,
    embedder: Arc<dyn Embedder>,
}

impl SqliteRetriever {
    pub fn new(db: Db, embedder: Arc<dyn Embedder>) -> Self {
        Self { db, embedder }
    }
}

#[async_trait]
impl Retriever for SqliteRetriever {
    async fn get_relevant_documents(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embed_start = std::time::Instant::now();
        let query_vec = self.embedder.embed_query(query).await?;
        log::debug!("Vector search: query embedding took {:?}", embed_start.elapsed());

        if query_vec.is_empty() {
            return Err(RagQueryError::Embedding("Empty query embedding".to_string()));
        }

        let rows = self
            .db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT doc_id, page_content, metadata_json, embedding
                    FROM documents
                    WHERE embedding IS NOT NULL
                    ORDER BY rowid
                    "#,
                )?;
                let mut rows = stmt.query([])?;
                let mut results = Vec::new();
                while let Some(row) = rows.next()? {
                    results.push((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ));
                }
                Ok(results)
            })
            .await?;

        let mut scored: Vec<(f32, String, Option<String>)> = Vec::new();
        for (doc_id, page_content, metadata_json, blob) in rows {
            let embedding = match parse_embedding(&blob) {
                Some(e) if e.len() == query_vec.len() => e,
                Some(e) => {
                    log::debug!(
                        "Skipping {}: embedding has {} dimensions, query has {}",
                        doc_id,
                        e.len(),
                        query_vec.len()
                    );
                    continue;
                }
                None => {
                    log::warn!("Skipping {}: malformed embedding blob", doc_id);
                    continue;
                }
            };
            scored.push((cosine_similarity(&query_vec, &embedding), page_content, metadata_json));
        }

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let documents = scored
            .into_iter()
            .take(k)
            .map(|(_, page_content, metadata_json)| Document {
                page_content,
                metadata: parse_metadata(metadata_json.as_deref()),
            })
            .collect();

        Ok(documents)
    }
}

/// Insert or replace a document and its embedding
///
/// # Arguments
///
/// * `db` - Vector store to write to
/// * `doc_id` - Primary key; an existing row with this id is replaced
/// * `document` - Text and metadata returned verbatim by later searches
/// * `embedding` - Stored as a little-endian f32 BLOB
pub async fn store_document(
    db: &Db,
    doc_id: &str,
    document: &Document,
    embedding: &[f32],
) -> Result<()> {
    let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
    let metadata_json = serde_json::to_string(&document.metadata)?;
    let doc_id = doc_id.to_string();
    let page_content = document.page_content.clone();

    db.with_connection(move |conn| {
        conn.execute(
            "INSERT OR REPLACE INTO documents (doc_id, page_content, metadata_json, embedding) \
             VALUES (?1, ?2, ?3, ?4)",
            params![doc_id, page_content, metadata_json, bytes],
        )?;
        Ok(())
    })
    .await
}

/// Stored metadata is normally a JSON object; anything else is kept under `value`
fn parse_metadata(raw: Option<&str>) -> Map<String, Value> {
    match raw.map(serde_json::from_str::<Value>) {
        None => Map::new(),
        Some(Ok(Value::Object(map))) => map,
        Some(Ok(Value::Null)) => Map::new(),
        Some(Ok(other)) => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
        Some(Err(e)) => {
            log::warn!("Ignoring unparseable document metadata: {}", e);
            Map::new()
        }
    }
}

/// Parse a little-endian f32 BLOB
fn parse_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }

    blob.chunks_exact(4)
        .map(|bytes| bytes.try_into().ok().map(f32::from_le_bytes))
        .collect()
}

/// Cosine similarity of two equal-length vectors; 0.0 if either has zero magnitude
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
