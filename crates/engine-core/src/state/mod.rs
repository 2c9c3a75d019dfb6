use crate::error::StateStoreError;
use async_trait::async_trait;

pub use models::Checkpoint;

mod models;
pub mod sled_store;

/// Durable home of the offset token between runs.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_checkpoint(&self, cp: &Checkpoint) -> Result<(), StateStoreError>;
    async fn load_checkpoint(&self, source: &str) -> Result<Option<Checkpoint>, StateStoreError>;
    /// Returns whether a checkpoint existed.
    async fn delete_checkpoint(&self, source: &str) -> Result<bool, StateStoreError>;
    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>, StateStoreError>;
}
