//! Course document parsing.
//!
//! Turns raw course text into a [`Course`] record plus a sequence of
//! retrievable [`CourseChunk`]s. Parsing is a pure transformation; reading
//! files and writing to the index belong to the ingestion pipeline.
//!
//! Expected document shape:
//!
//! ```text
//! Course Title: Intro to Widgets
//! Course Link: https://example.com/widgets
//! Course Instructor: Ada Lovelace
//!
//! Lesson 0: Basics
//! Lesson Link: https://example.com/widgets/lesson0
//! Widgets are small parts used in assembly.
//! ...
//! ```

mod splitter;

pub use splitter::split_text;

use crate::config::ChunkingSettings;
use crate::error::{PensumError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A course as declared by a document's header block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Course title. Unique identifier within the catalog.
    pub title: String,
    /// Link to the course page.
    pub link: Option<String>,
    /// Instructor name.
    pub instructor: Option<String>,
    /// Lesson summaries, ordered by lesson number.
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Find a lesson by number.
    pub fn lesson(&self, number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.number == number)
    }
}

/// A lesson summary attached to its parent course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Lesson number. Non-negative, not required to be contiguous.
    pub number: u32,
    /// Lesson title.
    pub title: String,
    /// Link to the lesson page.
    pub link: Option<String>,
}

/// A retrievable unit of course text with its scoping metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    /// Chunk text, including any contextual prefix.
    pub content: String,
    /// Title of the course this chunk belongs to.
    pub course_title: String,
    /// Lesson the chunk came from. None for text preceding any lesson
    /// heading.
    pub lesson_number: Option<u32>,
    /// Position within the course, sequential across all lessons.
    pub chunk_index: usize,
}

/// Parser for structured course documents.
pub struct DocumentParser {
    chunk_size: usize,
    chunk_overlap: usize,
    lesson_heading: Regex,
}

impl DocumentParser {
    /// Create a parser with the given chunking settings.
    pub fn new(chunking: &ChunkingSettings) -> Self {
        Self::with_chunking(chunking.chunk_size, chunking.chunk_overlap)
    }

    /// Create a parser with explicit chunk size and overlap (in characters).
    pub fn with_chunking(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            lesson_heading: Regex::new(r"(?i)^lesson\s+(\d+):\s*(.*)$")
                .expect("lesson heading pattern is valid"),
        }
    }

    /// Parse a raw course document into its course record and chunks.
    ///
    /// Fails with a parse error when the mandatory `Course Title:` header is
    /// absent. The ingestion pipeline treats that as skip-and-continue for
    /// the batch.
    pub fn parse(&self, raw: &str) -> Result<(Course, Vec<CourseChunk>)> {
        let mut course = Course {
            title: String::new(),
            link: None,
            instructor: None,
            lessons: Vec::new(),
        };

        // The preamble section holds any body text before the first lesson
        // heading; it carries no lesson number.
        let mut sections = vec![Section {
            lesson_number: None,
            body: Vec::new(),
        }];
        let mut in_header = true;

        for line in raw.lines() {
            let trimmed = line.trim();

            if let Some(caps) = self.lesson_heading.captures(trimmed) {
                in_header = false;
                let number: u32 = caps[1].parse().unwrap_or(0);
                course.lessons.push(Lesson {
                    number,
                    title: caps[2].trim().to_string(),
                    link: None,
                });
                sections.push(Section {
                    lesson_number: Some(number),
                    body: Vec::new(),
                });
                continue;
            }

            // Header fields may appear anywhere before the first lesson.
            if in_header {
                if let Some(value) = strip_field(trimmed, "Course Title:") {
                    course.title = value;
                    continue;
                }
                if let Some(value) = strip_field(trimmed, "Course Link:") {
                    course.link = Some(value).filter(|v| !v.is_empty());
                    continue;
                }
                if let Some(value) = strip_field(trimmed, "Course Instructor:") {
                    course.instructor = Some(value).filter(|v| !v.is_empty());
                    continue;
                }
            }

            // A lesson link line directly under a heading annotates the
            // lesson rather than joining its body text.
            if let Some(link) = strip_field(trimmed, "Lesson Link:") {
                if let Some(lesson) = course.lessons.last_mut() {
                    if lesson.link.is_none()
                        && sections.last().map(|s| s.lesson_number) == Some(Some(lesson.number))
                    {
                        lesson.link = Some(link).filter(|v| !v.is_empty());
                        continue;
                    }
                }
            }

            sections
                .last_mut()
                .expect("sections is never empty")
                .body
                .push(line.to_string());
        }

        if course.title.is_empty() {
            return Err(PensumError::DocumentParse(
                "missing 'Course Title:' header".to_string(),
            ));
        }

        course.lessons.sort_by_key(|l| l.number);

        let mut chunks = Vec::new();
        for section in &sections {
            self.chunk_section(&course.title, section, &mut chunks);
        }

        Ok((course, chunks))
    }

    /// Chunk one section's body, prefixing the first chunk of each lesson
    /// with a contextual header so isolated retrieval still identifies its
    /// source.
    fn chunk_section(&self, course_title: &str, section: &Section, out: &mut Vec<CourseChunk>) {
        let body = section.body.join("\n");
        let pieces = split_text(&body, self.chunk_size, self.chunk_overlap);

        for (i, piece) in pieces.into_iter().enumerate() {
            let content = match (i, section.lesson_number) {
                (0, Some(number)) => {
                    format!("Course {} Lesson {} content: {}", course_title, number, piece)
                }
                _ => piece,
            };

            out.push(CourseChunk {
                content,
                course_title: course_title.to_string(),
                lesson_number: section.lesson_number,
                chunk_index: out.len(),
            });
        }
    }
}

/// One lesson's (or the preamble's) body lines.
struct Section {
    lesson_number: Option<u32>,
    body: Vec<String>,
}

/// Case-insensitive `Key: value` field extraction.
fn strip_field(line: &str, key: &str) -> Option<String> {
    let prefix = line.get(..key.len())?;
    if prefix.eq_ignore_ascii_case(key) {
        Some(line[key.len()..].trim().to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Course Title: Intro to Widgets
Course Link: https://example.com/widgets
Course Instructor: Ada Lovelace

Lesson 0: Basics
Lesson Link: https://example.com/widgets/lesson0
Widgets are small parts used in assembly. They come in many shapes.

Lesson 2: Advanced Topics
Advanced widgets require careful calibration before use.
";

    fn parser() -> DocumentParser {
        DocumentParser::with_chunking(800, 100)
    }

    #[test]
    fn test_parse_header_fields() {
        let (course, _) = parser().parse(SAMPLE).unwrap();
        assert_eq!(course.title, "Intro to Widgets");
        assert_eq!(course.link.as_deref(), Some("https://example.com/widgets"));
        assert_eq!(course.instructor.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_parse_lessons() {
        let (course, _) = parser().parse(SAMPLE).unwrap();
        assert_eq!(course.lessons.len(), 2);
        assert_eq!(course.lessons[0].number, 0);
        assert_eq!(course.lessons[0].title, "Basics");
        assert_eq!(
            course.lessons[0].link.as_deref(),
            Some("https://example.com/widgets/lesson0")
        );
        // Lesson numbers need not be contiguous.
        assert_eq!(course.lessons[1].number, 2);
        assert_eq!(course.lessons[1].link, None);
    }

    #[test]
    fn test_missing_title_is_fatal() {
        let result = parser().parse("Course Instructor: Nobody\n\nLesson 1: Lost\ntext\n");
        assert!(matches!(result, Err(PensumError::DocumentParse(_))));
    }

    #[test]
    fn test_chunks_carry_metadata_and_prefix() {
        let (_, chunks) = parser().parse(SAMPLE).unwrap();
        assert_eq!(chunks.len(), 2);

        assert_eq!(chunks[0].lesson_number, Some(0));
        assert!(chunks[0]
            .content
            .starts_with("Course Intro to Widgets Lesson 0 content:"));
        assert!(chunks[0].content.contains("Widgets are small parts"));

        assert_eq!(chunks[1].lesson_number, Some(2));
        assert!(chunks[1]
            .content
            .starts_with("Course Intro to Widgets Lesson 2 content:"));
    }

    #[test]
    fn test_chunk_index_is_sequential_across_lessons() {
        let body = "Sentence one here. ".repeat(120);
        let doc = format!(
            "Course Title: Big Course\n\nLesson 1: One\n{}\n\nLesson 2: Two\n{}\n",
            body, body
        );
        let (_, chunks) = parser().parse(&doc).unwrap();
        assert!(chunks.len() > 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
        }
    }

    #[test]
    fn test_preamble_text_has_no_lesson_number() {
        let doc = "Course Title: Preamble Course\n\nA welcome paragraph before any lesson.\n\nLesson 1: Start\nLesson body text.\n";
        let (_, chunks) = parser().parse(doc).unwrap();
        assert_eq!(chunks[0].lesson_number, None);
        assert!(chunks[0].content.contains("welcome paragraph"));
        assert_eq!(chunks[1].lesson_number, Some(1));
    }

    #[test]
    fn test_document_without_lessons() {
        let doc = "Course Title: Flat Course\nJust one paragraph of content.\n";
        let (course, chunks) = parser().parse(doc).unwrap();
        assert!(course.lessons.is_empty());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].lesson_number, None);
    }

    #[test]
    fn test_lesson_link_only_binds_directly_under_heading() {
        // A "Lesson Link:" appearing mid-body after the lesson already has a
        // link stays in the body text.
        let doc = "Course Title: C\n\nLesson 1: A\nLesson Link: https://a\nbody\nLesson Link: https://b\n";
        let (course, chunks) = parser().parse(doc).unwrap();
        assert_eq!(course.lessons[0].link.as_deref(), Some("https://a"));
        assert!(chunks[0].content.contains("https://b"));
    }
}
