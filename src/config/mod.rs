//! Configuration management for Pensum.

mod settings;

pub use settings::{
    ChunkingSettings, EmbeddingSettings, GeneralSettings, RagSettings, Settings,
    VectorStoreSettings,
};
