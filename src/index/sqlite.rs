//! SQLite-based course index implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! For large corpora, consider the sqlite-vec extension or a dedicated
//! vector database.

use super::{
    cosine_similarity, rank_hits, ChunkFilter, ChunkHit, ChunkRecord, CourseIndex, CourseRecord,
    RESOLVE_MIN_SCORE,
};
use crate::document::Course;
use crate::error::{PensumError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS courses (
    title TEXT PRIMARY KEY,
    link TEXT,
    instructor TEXT,
    lessons_json TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    course_title TEXT NOT NULL,
    lesson_number INTEGER,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_course_title ON chunks(course_title);
"#;

/// SQLite-based course index.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Create a new SQLite index at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite course index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PensumError::VectorIndex(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_course_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CourseRecord> {
        let title: String = row.get(0)?;
        let link: Option<String> = row.get(1)?;
        let instructor: Option<String> = row.get(2)?;
        let lessons_json: String = row.get(3)?;
        let embedding_bytes: Vec<u8> = row.get(4)?;
        let indexed_at_str: String = row.get(5)?;

        Ok(CourseRecord {
            course: Course {
                title,
                link,
                instructor,
                lessons: serde_json::from_str(&lessons_json).unwrap_or_default(),
            },
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[async_trait]
impl CourseIndex for SqliteIndex {
    #[instrument(skip(self, record), fields(title = %record.course.title))]
    async fn upsert_course(&self, record: &CourseRecord) -> Result<()> {
        let conn = self.lock()?;

        let lessons_json = serde_json::to_string(&record.course.lessons)?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO courses (title, link, instructor, lessons_json, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.course.title,
                record.course.link,
                record.course.instructor,
                lessons_json,
                Self::embedding_to_bytes(&record.embedding),
                record.indexed_at.to_rfc3339(),
            ],
        )?;

        debug!("Upserted course {}", record.course.title);
        Ok(())
    }

    #[instrument(skip(self, records))]
    async fn upsert_chunks(&self, records: &[ChunkRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for record in records {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO chunks
                (id, course_title, lesson_number, chunk_index, content, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    record.id.to_string(),
                    record.course_title,
                    record.lesson_number,
                    record.chunk_index as i64,
                    record.content,
                    Self::embedding_to_bytes(&record.embedding),
                    record.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} chunks", records.len());
        Ok(records.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn resolve_course_name(&self, query_embedding: &[f32]) -> Result<Option<String>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT title, embedding FROM courses")?;
        let rows = stmt.query_map([], |row| {
            let title: String = row.get(0)?;
            let embedding_bytes: Vec<u8> = row.get(1)?;
            Ok((title, Self::bytes_to_embedding(&embedding_bytes)))
        })?;

        let best = rows
            .filter_map(|r| r.ok())
            .map(|(title, embedding)| (title, cosine_similarity(query_embedding, &embedding)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(best
            .filter(|(_, score)| *score >= RESOLVE_MIN_SCORE)
            .map(|(title, _)| title))
    }

    #[instrument(skip(self))]
    async fn get_course(&self, title: &str) -> Result<Option<CourseRecord>> {
        let conn = self.lock()?;

        let record = conn.query_row(
            "SELECT title, link, instructor, lessons_json, embedding, indexed_at FROM courses WHERE title = ?1",
            params![title],
            Self::row_to_course_record,
        );

        match record {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT title FROM courses ORDER BY title")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn course_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    #[instrument(skip(self, query_embedding))]
    async fn query_chunks(
        &self,
        query_embedding: &[f32],
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<ChunkHit>> {
        let conn = self.lock()?;

        // Metadata filtering happens in SQL; similarity ranking in Rust.
        let mut sql = String::from(
            "SELECT content, course_title, lesson_number, chunk_index, embedding FROM chunks",
        );
        let mut clauses = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(title) = &filter.course_title {
            clauses.push(format!("course_title = ?{}", args.len() + 1));
            args.push(Box::new(title.clone()));
        }
        if let Some(number) = filter.lesson_number {
            clauses.push(format!("lesson_number = ?{}", args.len() + 1));
            args.push(Box::new(number));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut stmt = conn.prepare(&sql)?;
        let params_slice: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(params_slice.as_slice(), |row| {
            let content: String = row.get(0)?;
            let course_title: String = row.get(1)?;
            let lesson_number: Option<u32> = row.get(2)?;
            let chunk_index: i64 = row.get(3)?;
            let embedding_bytes: Vec<u8> = row.get(4)?;
            Ok((
                content,
                course_title,
                lesson_number,
                chunk_index as usize,
                Self::bytes_to_embedding(&embedding_bytes),
            ))
        })?;

        let mut hits: Vec<ChunkHit> = rows
            .filter_map(|r| r.ok())
            .map(
                |(content, course_title, lesson_number, chunk_index, embedding)| ChunkHit {
                    content,
                    course_title,
                    lesson_number,
                    chunk_index,
                    score: cosine_similarity(query_embedding, &embedding),
                },
            )
            .collect();

        rank_hits(&mut hits, limit);
        debug!("Found {} matching chunks", hits.len());
        Ok(hits)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Course, CourseChunk, Lesson};

    fn sample_course() -> Course {
        Course {
            title: "Test Course".to_string(),
            link: Some("https://example.com/course".to_string()),
            instructor: Some("Ada".to_string()),
            lessons: vec![Lesson {
                number: 0,
                title: "Basics".to_string(),
                link: Some("https://example.com/lesson0".to_string()),
            }],
        }
    }

    fn sample_chunk(index: usize, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord::new(
            CourseChunk {
                content: format!("chunk {}", index),
                course_title: "Test Course".to_string(),
                lesson_number: Some(0),
                chunk_index: index,
            },
            embedding,
        )
    }

    #[tokio::test]
    async fn test_course_round_trip() {
        let index = SqliteIndex::in_memory().unwrap();

        index
            .upsert_course(&CourseRecord::new(sample_course(), vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let record = index.get_course("Test Course").await.unwrap().unwrap();
        assert_eq!(record.course.title, "Test Course");
        assert_eq!(record.course.lessons.len(), 1);
        assert_eq!(
            record.course.lessons[0].link.as_deref(),
            Some("https://example.com/lesson0")
        );
        assert_eq!(record.embedding, vec![1.0, 0.0, 0.0]);

        assert_eq!(index.course_count().await.unwrap(), 1);
        assert_eq!(index.course_titles().await.unwrap(), vec!["Test Course"]);
        assert!(index.get_course("Missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chunk_query_and_filters() {
        let index = SqliteIndex::in_memory().unwrap();

        index
            .upsert_chunks(&[
                sample_chunk(0, vec![1.0, 0.0]),
                sample_chunk(1, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        assert_eq!(index.chunk_count().await.unwrap(), 2);

        let hits = index
            .query_chunks(&[1.0, 0.0], &ChunkFilter::default(), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_index, 0);
        assert!((hits[0].score - 1.0).abs() < 0.001);

        let filter = ChunkFilter {
            course_title: Some("Other Course".to_string()),
            lesson_number: None,
        };
        let hits = index.query_chunks(&[1.0, 0.0], &filter, 10).await.unwrap();
        assert!(hits.is_empty());

        let filter = ChunkFilter {
            course_title: Some("Test Course".to_string()),
            lesson_number: Some(0),
        };
        let hits = index.query_chunks(&[1.0, 0.0], &filter, 1).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_resolution_threshold() {
        let index = SqliteIndex::in_memory().unwrap();
        assert_eq!(
            index.resolve_course_name(&[1.0, 0.0]).await.unwrap(),
            None
        );

        index
            .upsert_course(&CourseRecord::new(sample_course(), vec![1.0, 0.0]))
            .await
            .unwrap();

        assert_eq!(
            index
                .resolve_course_name(&[1.0, 0.0])
                .await
                .unwrap()
                .as_deref(),
            Some("Test Course")
        );
        assert_eq!(
            index.resolve_course_name(&[-1.0, 0.0]).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_persistence_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let index = SqliteIndex::new(&path).unwrap();
            index
                .upsert_course(&CourseRecord::new(sample_course(), vec![1.0]))
                .await
                .unwrap();
        }

        let index = SqliteIndex::new(&path).unwrap();
        assert_eq!(index.course_count().await.unwrap(), 1);
    }
}
