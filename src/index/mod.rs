//! Vector index abstraction over the two course collections.
//!
//! The index holds a *catalog* collection (one record per course, used for
//! fuzzy course-name resolution) and a *content* collection (one record per
//! chunk, used for passage retrieval). Embedding generation happens at the
//! caller; the index only stores and compares vectors.

mod memory;
mod sqlite;

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

use crate::config::Settings;
use crate::document::{Course, CourseChunk};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Minimum cosine similarity for a catalog match to count as a resolution.
/// Below this, a fuzzy course name is treated as "no course found".
pub const RESOLVE_MIN_SCORE: f32 = 0.3;

/// A catalog record: one per course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRecord {
    /// The course metadata, including its lesson list and links.
    pub course: Course,
    /// Embedding of the course title.
    pub embedding: Vec<f32>,
    /// When the course was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl CourseRecord {
    /// Create a catalog record for a course.
    pub fn new(course: Course, embedding: Vec<f32>) -> Self {
        Self {
            course,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A content record: one per chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique record ID.
    pub id: Uuid,
    /// Chunk text including any contextual prefix.
    pub content: String,
    /// Title of the owning course.
    pub course_title: String,
    /// Lesson number, if the chunk belongs to a lesson.
    pub lesson_number: Option<u32>,
    /// Position within the course.
    pub chunk_index: usize,
    /// Embedding of the chunk text.
    pub embedding: Vec<f32>,
    /// When the chunk was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl ChunkRecord {
    /// Create a content record from a parsed chunk and its embedding.
    pub fn new(chunk: CourseChunk, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: chunk.content,
            course_title: chunk.course_title,
            lesson_number: chunk.lesson_number,
            chunk_index: chunk.chunk_index,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// Optional narrowing of a content query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkFilter {
    /// Restrict to an exact (already resolved) course title.
    pub course_title: Option<String>,
    /// Restrict to a lesson number.
    pub lesson_number: Option<u32>,
}

impl ChunkFilter {
    /// Check whether a record passes the filter.
    pub fn matches(&self, record: &ChunkRecord) -> bool {
        if let Some(title) = &self.course_title {
            if &record.course_title != title {
                return false;
            }
        }
        if let Some(number) = self.lesson_number {
            if record.lesson_number != Some(number) {
                return false;
            }
        }
        true
    }
}

/// A content query match.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    /// Matched chunk text.
    pub content: String,
    /// Title of the owning course.
    pub course_title: String,
    /// Lesson number, if any.
    pub lesson_number: Option<u32>,
    /// Position within the course.
    pub chunk_index: usize,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Trait for course index implementations.
#[async_trait]
pub trait CourseIndex: Send + Sync {
    /// Add or replace a course in the catalog collection.
    async fn upsert_course(&self, record: &CourseRecord) -> Result<()>;

    /// Bulk add chunk records to the content collection.
    async fn upsert_chunks(&self, records: &[ChunkRecord]) -> Result<usize>;

    /// Resolve a fuzzy course name to the best-matching stored title.
    ///
    /// Returns None when the catalog is empty or the closest title scores
    /// below [`RESOLVE_MIN_SCORE`].
    async fn resolve_course_name(&self, query_embedding: &[f32]) -> Result<Option<String>>;

    /// Look up a catalog record by exact title.
    async fn get_course(&self, title: &str) -> Result<Option<CourseRecord>>;

    /// All stored course titles.
    async fn course_titles(&self) -> Result<Vec<String>>;

    /// Number of courses in the catalog.
    async fn course_count(&self) -> Result<usize>;

    /// Nearest-neighbor retrieval over the content collection.
    ///
    /// Results are ordered by descending similarity; ties break by ascending
    /// `chunk_index` for determinism. An empty collection yields an empty
    /// result, not an error.
    async fn query_chunks(
        &self,
        query_embedding: &[f32],
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<ChunkHit>>;

    /// Number of chunks in the content collection.
    async fn chunk_count(&self) -> Result<usize>;
}

/// Open the index backend selected by configuration.
pub fn open_index(settings: &Settings) -> Result<Arc<dyn CourseIndex>> {
    match settings.vector_store.provider.as_str() {
        "memory" => Ok(Arc::new(MemoryIndex::new())),
        _ => Ok(Arc::new(SqliteIndex::new(&settings.sqlite_path())?)),
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Rank scored hits: similarity descending, ties by chunk position.
pub(crate) fn rank_hits(hits: &mut Vec<ChunkHit>, limit: usize) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk_index.cmp(&b.chunk_index))
    });
    hits.truncate(limit);
}
