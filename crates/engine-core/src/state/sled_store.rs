use crate::{
    error::StateStoreError,
    state::{StateStore, models::Checkpoint},
};
use async_trait::async_trait;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;
use tracing::debug;

const CHECKPOINT_PREFIX: &str = "chk:";

pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|source| StateStoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { db })
    }

    #[inline]
    fn chk_key(source: &str) -> String {
        format!("{CHECKPOINT_PREFIX}{source}")
    }
}

#[async_trait]
impl StateStore for SledStateStore {
    async fn save_checkpoint(&self, cp: &Checkpoint) -> Result<(), StateStoreError> {
        let key = Self::chk_key(&cp.source);
        let new_bytes = bincode::serialize(cp)?;

        // Check-then-set has to be atomic so two runners sharing a store
        // cannot move a checkpoint backwards.
        let result = self.db.transaction::<_, _, StateStoreError>(|tx_db| {
            if let Some(existing_bytes) = tx_db.get(&key)? {
                let existing: Checkpoint = bincode::deserialize(&existing_bytes)
                    .map_err(|e| ConflictableTransactionError::Abort(e.into()))?;

                if existing.sequence > cp.sequence {
                    debug!(
                        source = %cp.source,
                        stored = existing.sequence,
                        incoming = cp.sequence,
                        "Ignoring stale checkpoint"
                    );
                    return Ok(());
                }
            }

            tx_db.insert(key.as_bytes(), new_bytes.as_slice())?;
            Ok(())
        });

        match result {
            Ok(()) => {}
            Err(TransactionError::Abort(e)) => {
                return Err(StateStoreError::SaveCheckpoint {
                    source_name: cp.source.clone(),
                    reason: e.to_string(),
                });
            }
            Err(TransactionError::Storage(e)) => return Err(e.into()),
        }

        self.db.flush_async().await?;
        Ok(())
    }

    async fn load_checkpoint(&self, source: &str) -> Result<Option<Checkpoint>, StateStoreError> {
        match self.db.get(Self::chk_key(source))? {
            Some(bytes) => bincode::deserialize(&bytes).map(Some).map_err(|e| {
                StateStoreError::LoadCheckpoint {
                    source_name: source.to_string(),
                    reason: e.to_string(),
                }
            }),
            None => Ok(None),
        }
    }

    async fn delete_checkpoint(&self, source: &str) -> Result<bool, StateStoreError> {
        let removed = self.db.remove(Self::chk_key(source))?.is_some();
        self.db.flush_async().await?;
        Ok(removed)
    }

    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>, StateStoreError> {
        let mut checkpoints = Vec::new();
        for item in self.db.scan_prefix(CHECKPOINT_PREFIX) {
            let (_key, value) = item?;
            checkpoints.push(bincode::deserialize(&value)?);
        }
        Ok(checkpoints)
    }
}
