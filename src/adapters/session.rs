use crate::adapters::storage::is_not_found;
use crate::domain::model::CarrierSession;
use crate::domain::ports::{SessionCache, Storage};
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Process-local session cache. Lost on restart.
#[derive(Debug, Default)]
pub struct MemorySessionCache {
    session: RwLock<Option<CarrierSession>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn get(&self) -> Option<CarrierSession> {
        let session = self.session.read().await;
        session.as_ref().filter(|s| s.is_valid()).cloned()
    }

    async fn refresh(&self, session: CarrierSession) -> Result<()> {
        *self.session.write().await = Some(session);
        Ok(())
    }

    async fn invalidate(&self) -> Result<()> {
        *self.session.write().await = None;
        Ok(())
    }
}

/// Session cache persisted through `Storage`, so short-lived CLI runs reuse one login.
/// The stored `expires_at` is the TTL.
pub struct StorageSessionCache<S: Storage> {
    storage: S,
    file_name: String,
    memory: MemorySessionCache,
}

impl<S: Storage> StorageSessionCache<S> {
    pub fn new(storage: S, file_name: impl Into<String>) -> Self {
        Self {
            storage,
            file_name: file_name.into(),
            memory: MemorySessionCache::new(),
        }
    }

    async fn load(&self) -> Option<CarrierSession> {
        match self.storage.read_file(&self.file_name).await {
            Ok(bytes) if bytes.is_empty() => None,
            Ok(bytes) => match serde_json::from_slice::<CarrierSession>(&bytes) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!("⚠️ Ignoring unreadable session cache: {}", e);
                    None
                }
            },
            Err(e) if is_not_found(&e) => None,
            Err(e) => {
                tracing::warn!("⚠️ Session cache read failed: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl<S: Storage> SessionCache for StorageSessionCache<S> {
    async fn get(&self) -> Option<CarrierSession> {
        if let Some(session) = self.memory.get().await {
            return Some(session);
        }

        let session = self.load().await.filter(CarrierSession::is_valid)?;
        self.memory.refresh(session.clone()).await.ok()?;
        Some(session)
    }

    async fn refresh(&self, session: CarrierSession) -> Result<()> {
        let bytes = serde_json::to_vec(&session)?;
        self.storage.write_file(&self.file_name, &bytes).await?;
        self.memory.refresh(session).await
    }

    async fn invalidate(&self) -> Result<()> {
        self.memory.invalidate().await?;
        self.storage.write_file(&self.file_name, b"").await
    }
}
