//! Document ingestion pipeline.
//!
//! Coordinates parsing, embedding, and indexing of course documents.
//! Ingestion is idempotent per course title: a title already present in the
//! catalog is skipped entirely, and a malformed document is logged and
//! skipped without aborting the batch.

use crate::document::DocumentParser;
use crate::embedding::Embedder;
use crate::error::{PensumError, Result};
use crate::index::{ChunkRecord, CourseIndex, CourseRecord};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The ingestion pipeline.
pub struct Ingestor {
    parser: DocumentParser,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn CourseIndex>,
}

/// Outcome of ingesting one document.
#[derive(Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The course was parsed, embedded, and indexed.
    Added { title: String, chunks: usize },
    /// The course title already exists in the catalog.
    Skipped { title: String },
}

/// Summary of a folder ingestion run.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Courses newly added to the catalog.
    pub courses_added: usize,
    /// Chunks added to the content collection.
    pub chunks_added: usize,
    /// Documents skipped because their title was already present.
    pub skipped: usize,
    /// Documents that failed to parse.
    pub failed: usize,
}

impl Ingestor {
    /// Create an ingestor with the given components.
    pub fn new(
        parser: DocumentParser,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn CourseIndex>,
    ) -> Self {
        Self {
            parser,
            embedder,
            index,
        }
    }

    /// Ingest a single raw document.
    ///
    /// Returns [`IngestOutcome::Skipped`] when the course title is already
    /// present in the catalog: the document is neither re-chunked nor
    /// re-embedded.
    pub async fn ingest_document(&self, raw: &str) -> Result<IngestOutcome> {
        let (course, chunks) = self.parser.parse(raw)?;

        if self.index.get_course(&course.title).await?.is_some() {
            info!("Course '{}' already indexed, skipping", course.title);
            return Ok(IngestOutcome::Skipped {
                title: course.title,
            });
        }

        let title = course.title.clone();

        // Embed chunk texts in one batch, then the title for the catalog.
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        let title_embedding = self.embedder.embed(&title).await?;

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| ChunkRecord::new(chunk, embedding))
            .collect();

        self.index
            .upsert_course(&CourseRecord::new(course, title_embedding))
            .await?;
        let added = self.index.upsert_chunks(&records).await?;

        info!("Indexed course '{}' with {} chunks", title, added);
        Ok(IngestOutcome::Added {
            title,
            chunks: added,
        })
    }

    /// Ingest every `.txt` document in a folder.
    ///
    /// Parse failures are logged and counted but never abort the batch.
    #[instrument(skip(self))]
    pub async fn ingest_folder(&self, dir: &Path) -> Result<IngestReport> {
        if !dir.is_dir() {
            return Err(PensumError::InvalidInput(format!(
                "Not a directory: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("txt"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut report = IngestReport::default();

        for path in paths {
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    report.failed += 1;
                    continue;
                }
            };

            match self.ingest_document(&raw).await {
                Ok(IngestOutcome::Added { chunks, .. }) => {
                    report.courses_added += 1;
                    report.chunks_added += chunks;
                }
                Ok(IngestOutcome::Skipped { .. }) => {
                    report.skipped += 1;
                }
                Err(PensumError::DocumentParse(e)) => {
                    warn!("Skipping malformed document {}: {}", path.display(), e);
                    report.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Ingestion complete: {} added, {} skipped, {} failed",
            report.courses_added, report.skipped, report.failed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::HashEmbedder;
    use crate::index::MemoryIndex;
    use std::io::Write;

    const DOC: &str = "\
Course Title: Intro to X
Course Link: https://example.com/x

Lesson 0: Basics
Widgets are small parts used in assembly.
";

    fn ingestor(index: Arc<MemoryIndex>) -> Ingestor {
        Ingestor::new(
            DocumentParser::with_chunking(800, 100),
            Arc::new(HashEmbedder::new()),
            index,
        )
    }

    #[tokio::test]
    async fn test_ingest_document_adds_course_and_chunks() {
        let index = Arc::new(MemoryIndex::new());
        let ingestor = ingestor(index.clone());

        let outcome = ingestor.ingest_document(DOC).await.unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Added {
                title: "Intro to X".to_string(),
                chunks: 1
            }
        );

        assert_eq!(index.course_count().await.unwrap(), 1);
        assert_eq!(index.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reingest_is_a_no_op() {
        let index = Arc::new(MemoryIndex::new());
        let ingestor = ingestor(index.clone());

        ingestor.ingest_document(DOC).await.unwrap();
        let courses = index.course_count().await.unwrap();
        let chunks = index.chunk_count().await.unwrap();

        let outcome = ingestor.ingest_document(DOC).await.unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Skipped {
                title: "Intro to X".to_string()
            }
        );
        assert_eq!(index.course_count().await.unwrap(), courses);
        assert_eq!(index.chunk_count().await.unwrap(), chunks);
    }

    #[tokio::test]
    async fn test_folder_batch_continues_past_malformed_documents() {
        let dir = tempfile::tempdir().unwrap();

        let mut good = std::fs::File::create(dir.path().join("a_good.txt")).unwrap();
        good.write_all(DOC.as_bytes()).unwrap();

        let mut bad = std::fs::File::create(dir.path().join("b_bad.txt")).unwrap();
        bad.write_all(b"No header here at all.\n").unwrap();

        // Non-txt files are ignored.
        std::fs::File::create(dir.path().join("notes.md")).unwrap();

        let index = Arc::new(MemoryIndex::new());
        let report = ingestor(index.clone())
            .ingest_folder(dir.path())
            .await
            .unwrap();

        assert_eq!(report.courses_added, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(index.course_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_folder_skips_already_indexed_titles() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("course.txt")).unwrap();
        f.write_all(DOC.as_bytes()).unwrap();

        let index = Arc::new(MemoryIndex::new());
        let ingestor = ingestor(index.clone());

        let first = ingestor.ingest_folder(dir.path()).await.unwrap();
        assert_eq!(first.courses_added, 1);

        let second = ingestor.ingest_folder(dir.path()).await.unwrap();
        assert_eq!(second.courses_added, 0);
        assert_eq!(second.skipped, 1);
    }
}
