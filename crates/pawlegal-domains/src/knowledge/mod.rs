pub mod weaviate;

pub use weaviate::{KnowledgeBaseClient, KnowledgeCollection};
