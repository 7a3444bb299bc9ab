//! Veridian persistence layer.
//!
//! The engine never talks to a database directly; all shared state
//! lives behind the persister traits defined here. Records are keyed
//! by UUID and carry an optimistic version counter: concurrent updates
//! to the same flow or identity are serialized by a conditional write,
//! and the losing writer observes [`StoreError::Conflict`].
//!
//! [`MemoryStore`] is the reference implementation; deployments plug in
//! their own persisters through the [`Persisters`] bundle.

pub mod error;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;
use veridian_core::identity::Identity;
use veridian_core::flow::SettingsFlow;
use veridian_core::session::Session;
use veridian_core::types::Timestamp;
use veridian_courier::{Message, MessageStatus};

pub use error::StoreError;
pub use memory::MemoryStore;

/// A record together with its optimistic version.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

#[async_trait]
pub trait IdentityPersister: Send + Sync {
    async fn create_identity(&self, identity: Identity) -> Result<(), StoreError>;

    async fn get_identity(&self, id: Uuid) -> Result<Versioned<Identity>, StoreError>;

    /// Conditional whole-record overwrite. Fails with `Conflict` when
    /// the stored version differs from `expected_version`; returns the
    /// new version on success.
    async fn update_identity(
        &self,
        identity: &Identity,
        expected_version: u64,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait FlowPersister: Send + Sync {
    async fn create_flow(&self, flow: SettingsFlow) -> Result<(), StoreError>;

    /// Fetch a flow. Fails with `Expired` when `now` is past the
    /// flow's `expires_at`, `NotFound` when no such record exists.
    async fn get_flow(&self, id: Uuid, now: Timestamp)
        -> Result<Versioned<SettingsFlow>, StoreError>;

    /// Conditional whole-record overwrite, as for identities.
    async fn update_flow(
        &self,
        flow: &SettingsFlow,
        expected_version: u64,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait SessionPersister: Send + Sync {
    async fn create_session(&self, session: Session) -> Result<(), StoreError>;

    /// Resolve a session by its opaque token. Inactive or expired
    /// sessions do not resolve.
    async fn get_session_by_token(
        &self,
        token: &str,
        now: Timestamp,
    ) -> Result<Option<Session>, StoreError>;
}

#[async_trait]
pub trait CourierPersister: Send + Sync {
    async fn enqueue_message(&self, message: Message) -> Result<(), StoreError>;

    /// The newest entry still in `queued` state.
    async fn latest_queued_message(&self) -> Result<Option<Message>, StoreError>;

    /// The oldest entry still in `queued` state (drain order).
    async fn next_queued_message(&self) -> Result<Option<Message>, StoreError>;

    async fn set_message_status(&self, id: Uuid, status: MessageStatus) -> Result<(), StoreError>;
}

/// The bundle of persisters the API layer is wired with.
#[derive(Clone)]
pub struct Persisters {
    pub identities: Arc<dyn IdentityPersister>,
    pub flows: Arc<dyn FlowPersister>,
    pub sessions: Arc<dyn SessionPersister>,
    pub courier: Arc<dyn CourierPersister>,
}

impl Persisters {
    /// All four persisters backed by a single shared [`MemoryStore`].
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            identities: store.clone(),
            flows: store.clone(),
            sessions: store.clone(),
            courier: store,
        }
    }
}
