//! In-memory reference implementation of the persister traits.
//!
//! Backed by `tokio::sync::RwLock` maps keyed by UUID. Suitable for
//! tests and single-node deployments; production deployments implement
//! the persister traits over their own storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;
use veridian_core::flow::SettingsFlow;
use veridian_core::identity::Identity;
use veridian_core::session::Session;
use veridian_core::types::Timestamp;
use veridian_courier::{Message, MessageStatus};

use crate::error::StoreError;
use crate::{CourierPersister, FlowPersister, IdentityPersister, SessionPersister, Versioned};

#[derive(Default)]
pub struct MemoryStore {
    identities: RwLock<HashMap<Uuid, Versioned<Identity>>>,
    flows: RwLock<HashMap<Uuid, Versioned<SettingsFlow>>>,
    /// Sessions keyed by their opaque token.
    sessions: RwLock<HashMap<String, Session>>,
    messages: RwLock<Vec<Message>>,
}

#[async_trait]
impl IdentityPersister for MemoryStore {
    async fn create_identity(&self, identity: Identity) -> Result<(), StoreError> {
        self.identities.write().await.insert(
            identity.id,
            Versioned {
                record: identity,
                version: 1,
            },
        );
        Ok(())
    }

    async fn get_identity(&self, id: Uuid) -> Result<Versioned<Identity>, StoreError> {
        self.identities
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "identity",
                id,
            })
    }

    async fn update_identity(
        &self,
        identity: &Identity,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut identities = self.identities.write().await;
        let slot = identities
            .get_mut(&identity.id)
            .ok_or(StoreError::NotFound {
                entity: "identity",
                id: identity.id,
            })?;
        if slot.version != expected_version {
            return Err(StoreError::Conflict { entity: "identity" });
        }
        slot.record = identity.clone();
        slot.version += 1;
        Ok(slot.version)
    }
}

#[async_trait]
impl FlowPersister for MemoryStore {
    async fn create_flow(&self, flow: SettingsFlow) -> Result<(), StoreError> {
        self.flows.write().await.insert(
            flow.id,
            Versioned {
                record: flow,
                version: 1,
            },
        );
        Ok(())
    }

    async fn get_flow(
        &self,
        id: Uuid,
        now: Timestamp,
    ) -> Result<Versioned<SettingsFlow>, StoreError> {
        let flows = self.flows.read().await;
        let versioned = flows.get(&id).ok_or(StoreError::NotFound {
            entity: "settings flow",
            id,
        })?;
        if versioned.record.is_expired_at(now) {
            return Err(StoreError::Expired {
                entity: "settings flow",
                id,
            });
        }
        Ok(versioned.clone())
    }

    async fn update_flow(
        &self,
        flow: &SettingsFlow,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut flows = self.flows.write().await;
        let slot = flows.get_mut(&flow.id).ok_or(StoreError::NotFound {
            entity: "settings flow",
            id: flow.id,
        })?;
        if slot.version != expected_version {
            return Err(StoreError::Conflict { entity: "flow" });
        }
        slot.record = flow.clone();
        slot.version += 1;
        Ok(slot.version)
    }
}

#[async_trait]
impl SessionPersister for MemoryStore {
    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session);
        Ok(())
    }

    async fn get_session_by_token(
        &self,
        token: &str,
        now: Timestamp,
    ) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(token)
            .filter(|s| s.is_valid_at(now))
            .cloned())
    }
}

#[async_trait]
impl CourierPersister for MemoryStore {
    async fn enqueue_message(&self, message: Message) -> Result<(), StoreError> {
        tracing::debug!(recipient = %message.recipient, subject = %message.subject, "Courier message queued");
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn latest_queued_message(&self) -> Result<Option<Message>, StoreError> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .rev()
            .find(|m| m.status == MessageStatus::Queued)
            .cloned())
    }

    async fn next_queued_message(&self) -> Result<Option<Message>, StoreError> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .find(|m| m.status == MessageStatus::Queued)
            .cloned())
    }

    async fn set_message_status(&self, id: Uuid, status: MessageStatus) -> Result<(), StoreError> {
        let mut messages = self.messages.write().await;
        let message = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(StoreError::NotFound {
                entity: "courier message",
                id,
            })?;
        message.status = status;
        Ok(())
    }
}
