// Client abstractions module - the database collaborator the engine is handed

pub mod database;

pub use database::{mongodb::MongoIndexStore, DatabaseError, IndexStore};
