pub mod knowledge;
pub mod legal;
pub mod tools;

pub use tools::AssistantTools;
