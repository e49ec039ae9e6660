/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
/// Vote module storage and retrieval operations.
pub mod vote_store;
