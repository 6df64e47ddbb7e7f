pub mod animallaw;

pub use animallaw::LegalDatabaseClient;
