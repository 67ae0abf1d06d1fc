/// Room history persistence and its backends.
pub mod history;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
