pub mod error;
pub mod gateway;
pub mod memory;
pub mod postgres;

pub use error::{Result, StorageError};
pub use gateway::{StorageGateway, StorageTransaction, with_transaction};
pub use memory::{InMemoryStorage, InMemoryTransaction};
pub use postgres::{PostgresStorage, PostgresTransaction};
