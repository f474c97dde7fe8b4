//! Live batch sessions, keyed by batch id

use super::BatchSession;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<BatchSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<BatchSession>) {
        self.sessions
            .write()
            .await
            .insert(session.batch_id(), session);
    }

    pub async fn get(&self, batch_id: Uuid) -> Option<Arc<BatchSession>> {
        self.sessions.read().await.get(&batch_id).cloned()
    }

    pub async fn remove(&self, batch_id: Uuid) -> Option<Arc<BatchSession>> {
        self.sessions.write().await.remove(&batch_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
