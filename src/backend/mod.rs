//! External collaborators consumed by the status source and paywall.
//!
//! Nothing here is implemented for real: the auth provider, the relational
//! record store and the in-app purchase provider live outside this crate.
//! Only the narrow interfaces matter. [`memory`] holds in-process
//! implementations used by tests and by `matchgate replay`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::status::{AccountType, ApplicationStatus};

pub mod memory;

pub use memory::{Fixture, MemoryIdentityProvider, MemoryPaymentProvider, MemoryRecordStore};

/// The authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: String,
    pub identity_id: String,
    pub status: ApplicationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub identity_id: String,
    /// Community affiliation. `None` means the member never answered.
    #[serde(default)]
    pub affiliation: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub id: String,
    pub profile_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub identity_id: String,
    pub active: bool,
}

/// A purchasable package listed by the payment provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offering {
    pub package_id: String,
    pub title: String,
    pub price: String,
}

/// Collaborator failures
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// Identity/session provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Currently signed-in identity, if any.
    async fn current_identity(&self) -> Result<Option<Identity>, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;
}

/// Read-mostly relational record store.
///
/// Every lookup is a point query keyed by a foreign key and returns at most
/// one row or a count. `mark_subscribed` is the only write and is reserved
/// for the testing-mode payment bypass.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_application(
        &self,
        kind: AccountType,
        identity_id: &str,
    ) -> Result<Option<ApplicationRecord>, BackendError>;

    async fn find_profile(
        &self,
        kind: AccountType,
        identity_id: &str,
    ) -> Result<Option<ProfileRecord>, BackendError>;

    async fn count_references(&self, profile_id: &str) -> Result<usize, BackendError>;

    async fn has_active_subscription(&self, identity_id: &str) -> Result<bool, BackendError>;

    async fn mark_subscribed(&self, identity_id: &str) -> Result<(), BackendError>;
}

/// In-app purchase provider. Results are entitlement flags.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn offerings(&self) -> Result<Vec<Offering>, BackendError>;

    async fn purchase(&self, package_id: &str) -> Result<bool, BackendError>;

    async fn restore(&self) -> Result<bool, BackendError>;
}
