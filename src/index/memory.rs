//! In-memory course index implementation.
//!
//! Useful for testing and small corpora.

use super::{
    cosine_similarity, rank_hits, ChunkFilter, ChunkHit, ChunkRecord, CourseIndex, CourseRecord,
    RESOLVE_MIN_SCORE,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory course index.
pub struct MemoryIndex {
    catalog: RwLock<HashMap<String, CourseRecord>>,
    content: RwLock<HashMap<Uuid, ChunkRecord>>,
}

impl MemoryIndex {
    /// Create a new in-memory index with empty collections.
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(HashMap::new()),
            content: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CourseIndex for MemoryIndex {
    async fn upsert_course(&self, record: &CourseRecord) -> Result<()> {
        let mut catalog = self.catalog.write().unwrap();
        catalog.insert(record.course.title.clone(), record.clone());
        Ok(())
    }

    async fn upsert_chunks(&self, records: &[ChunkRecord]) -> Result<usize> {
        let mut content = self.content.write().unwrap();
        for record in records {
            content.insert(record.id, record.clone());
        }
        Ok(records.len())
    }

    async fn resolve_course_name(&self, query_embedding: &[f32]) -> Result<Option<String>> {
        let catalog = self.catalog.read().unwrap();

        let best = catalog
            .values()
            .map(|record| {
                (
                    record.course.title.clone(),
                    cosine_similarity(query_embedding, &record.embedding),
                )
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(best.filter(|(_, score)| *score >= RESOLVE_MIN_SCORE).map(|(title, _)| title))
    }

    async fn get_course(&self, title: &str) -> Result<Option<CourseRecord>> {
        let catalog = self.catalog.read().unwrap();
        Ok(catalog.get(title).cloned())
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let catalog = self.catalog.read().unwrap();
        let mut titles: Vec<String> = catalog.keys().cloned().collect();
        titles.sort();
        Ok(titles)
    }

    async fn course_count(&self) -> Result<usize> {
        let catalog = self.catalog.read().unwrap();
        Ok(catalog.len())
    }

    async fn query_chunks(
        &self,
        query_embedding: &[f32],
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<ChunkHit>> {
        let content = self.content.read().unwrap();

        let mut hits: Vec<ChunkHit> = content
            .values()
            .filter(|record| filter.matches(record))
            .map(|record| ChunkHit {
                content: record.content.clone(),
                course_title: record.course_title.clone(),
                lesson_number: record.lesson_number,
                chunk_index: record.chunk_index,
                score: cosine_similarity(query_embedding, &record.embedding),
            })
            .collect();

        rank_hits(&mut hits, limit);
        Ok(hits)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let content = self.content.read().unwrap();
        Ok(content.len())
    }
}
