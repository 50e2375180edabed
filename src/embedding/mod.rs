//! Embedding generation for semantic search and course-name resolution.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic embedder for tests: a normalized bag-of-words hash,
    //! so identical texts embed identically and texts sharing words score
    //! higher than unrelated ones.

    use super::Embedder;
    use crate::error::Result;
    use async_trait::async_trait;

    pub struct HashEmbedder {
        dims: usize,
    }

    impl HashEmbedder {
        pub fn new() -> Self {
            Self { dims: 64 }
        }

        fn embed_sync(&self, text: &str) -> Vec<f32> {
            let mut v = vec![0.0_f32; self.dims];
            for token in text
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
            {
                let bucket: usize = token.bytes().map(usize::from).sum();
                v[bucket % self.dims] += 1.0;
            }
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut v {
                    *x /= norm;
                }
            }
            v
        }
    }

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self.embed_sync(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }
}
