pub mod azure;
pub mod ollama;

pub use azure::AzureOpenAiBackend;
pub use ollama::OllamaBackend;
