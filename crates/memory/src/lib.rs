pub mod persistence;
pub mod store;

pub use persistence::{FilePersistence, MemoryError, Persistence};
pub use store::MemoryStore;
