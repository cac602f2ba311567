//! In-process collaborators backed by a JSON fixture.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::{
    ApplicationRecord, BackendError, Identity, IdentityProvider, Offering, PaymentProvider,
    ProfileRecord, RecordStore, ReferenceRecord, SubscriptionRecord,
};
use crate::status::AccountType;

/// Seed data for the in-memory backend.
///
/// ```json
/// {
///   "identity": { "id": "u1" },
///   "type_a_applications": [{ "id": "a1", "identity_id": "u1", "status": "approved" }],
///   "type_a_profiles": [{ "id": "p1", "identity_id": "u1", "affiliation": false }],
///   "references": [{ "id": "r1", "profile_id": "p1" }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub identity: Option<Identity>,
    pub type_a_applications: Vec<ApplicationRecord>,
    pub type_b_applications: Vec<ApplicationRecord>,
    pub type_a_profiles: Vec<ProfileRecord>,
    pub type_b_profiles: Vec<ProfileRecord>,
    pub references: Vec<ReferenceRecord>,
    pub subscriptions: Vec<SubscriptionRecord>,
    pub offerings: Vec<Offering>,
}

impl Fixture {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Record store over fixture tables.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Fixture>,
    outage: Mutex<Option<String>>,
    queries: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            tables: RwLock::new(fixture),
            outage: Mutex::new(None),
            queries: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent query fail until `recover` is called.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.outage.lock() = Some(reason.into());
    }

    pub fn recover(&self) {
        *self.outage.lock() = None;
    }

    /// Apply an out-of-band change, e.g. an admin approving an application.
    pub fn update(&self, f: impl FnOnce(&mut Fixture)) {
        f(&mut self.tables.write());
    }

    /// Number of queries served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), BackendError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match self.outage.lock().as_ref() {
            Some(reason) => Err(BackendError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_application(
        &self,
        kind: AccountType,
        identity_id: &str,
    ) -> Result<Option<ApplicationRecord>, BackendError> {
        self.check()?;
        let tables = self.tables.read();
        let rows = match kind {
            AccountType::TypeA => &tables.type_a_applications,
            AccountType::TypeB => &tables.type_b_applications,
            AccountType::None => return Ok(None),
        };
        Ok(rows.iter().find(|r| r.identity_id == identity_id).cloned())
    }

    async fn find_profile(
        &self,
        kind: AccountType,
        identity_id: &str,
    ) -> Result<Option<ProfileRecord>, BackendError> {
        self.check()?;
        let tables = self.tables.read();
        let rows = match kind {
            AccountType::TypeA => &tables.type_a_profiles,
            AccountType::TypeB => &tables.type_b_profiles,
            AccountType::None => return Ok(None),
        };
        Ok(rows.iter().find(|r| r.identity_id == identity_id).cloned())
    }

    async fn count_references(&self, profile_id: &str) -> Result<usize, BackendError> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .references
            .iter()
            .filter(|r| r.profile_id == profile_id)
            .count())
    }

    async fn has_active_subscription(&self, identity_id: &str) -> Result<bool, BackendError> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .subscriptions
            .iter()
            .any(|s| s.identity_id == identity_id && s.active))
    }

    async fn mark_subscribed(&self, identity_id: &str) -> Result<(), BackendError> {
        self.check()?;
        let mut tables = self.tables.write();
        match tables
            .subscriptions
            .iter_mut()
            .find(|s| s.identity_id == identity_id)
        {
            Some(existing) => existing.active = true,
            None => tables.subscriptions.push(SubscriptionRecord {
                identity_id: identity_id.to_string(),
                active: true,
            }),
        }
        Ok(())
    }
}

/// Session provider holding at most one signed-in identity.
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    current: Mutex<Option<Identity>>,
    sign_outs: AtomicUsize,
}

impl MemoryIdentityProvider {
    pub fn new(identity: Option<Identity>) -> Self {
        Self {
            current: Mutex::new(identity),
            sign_outs: AtomicUsize::new(0),
        }
    }

    pub fn sign_in(&self, identity: Identity) {
        *self.current.lock() = Some(identity);
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn current_identity(&self) -> Result<Option<Identity>, BackendError> {
        Ok(self.current.lock().clone())
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        *self.current.lock() = None;
        Ok(())
    }
}

/// Payment provider whose purchases land in a [`MemoryRecordStore`].
pub struct MemoryPaymentProvider {
    offerings: Vec<Offering>,
    store: Arc<MemoryRecordStore>,
    identity: Arc<MemoryIdentityProvider>,
    grant: AtomicBool,
}

impl MemoryPaymentProvider {
    pub fn new(
        offerings: Vec<Offering>,
        store: Arc<MemoryRecordStore>,
        identity: Arc<MemoryIdentityProvider>,
    ) -> Self {
        Self {
            offerings,
            store,
            identity,
            grant: AtomicBool::new(true),
        }
    }

    /// Simulate a declined or cancelled purchase.
    pub fn decline_purchases(&self) {
        self.grant.store(false, Ordering::SeqCst);
    }

    async fn current_id(&self) -> Result<String, BackendError> {
        self.identity
            .current_identity()
            .await?
            .map(|i| i.id)
            .ok_or_else(|| BackendError::Query("no signed-in customer".into()))
    }
}

#[async_trait]
impl PaymentProvider for MemoryPaymentProvider {
    async fn offerings(&self) -> Result<Vec<Offering>, BackendError> {
        Ok(self.offerings.clone())
    }

    async fn purchase(&self, package_id: &str) -> Result<bool, BackendError> {
        if !self.offerings.iter().any(|o| o.package_id == package_id) {
            return Err(BackendError::Query(format!("unknown package {}", package_id)));
        }
        if !self.grant.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let id = self.current_id().await?;
        self.store.mark_subscribed(&id).await?;
        Ok(true)
    }

    async fn restore(&self) -> Result<bool, BackendError> {
        let id = self.current_id().await?;
        self.store.has_active_subscription(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ApplicationStatus;

    fn fixture() -> Fixture {
        Fixture::from_json(
            r#"{
                "identity": { "id": "u1" },
                "type_b_applications": [
                    { "id": "b1", "identity_id": "u1", "status": "pending" }
                ],
                "type_b_profiles": [{ "id": "p1", "identity_id": "u1" }],
                "references": [
                    { "id": "r1", "profile_id": "p1" },
                    { "id": "r2", "profile_id": "p1" },
                    { "id": "r3", "profile_id": "p2" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_lookups_are_scoped_by_type() {
        let store = MemoryRecordStore::new(fixture());
        assert!(store
            .find_application(AccountType::TypeA, "u1")
            .await
            .unwrap()
            .is_none());
        let app = store
            .find_application(AccountType::TypeB, "u1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(app.status, ApplicationStatus::Pending);
        assert_eq!(store.count_references("p1").await.unwrap(), 2);
        assert_eq!(store.query_count(), 3);
    }

    #[tokio::test]
    async fn test_outage_fails_queries() {
        let store = MemoryRecordStore::new(fixture());
        store.fail_with("connection reset");
        let err = store.count_references("p1").await.unwrap_err();
        assert_eq!(err, BackendError::Unavailable("connection reset".into()));
        store.recover();
        assert!(store.count_references("p1").await.is_ok());
    }

    #[tokio::test]
    async fn test_mark_subscribed_upserts() {
        let store = MemoryRecordStore::new(fixture());
        assert!(!store.has_active_subscription("u1").await.unwrap());
        store.mark_subscribed("u1").await.unwrap();
        store.mark_subscribed("u1").await.unwrap();
        assert!(store.has_active_subscription("u1").await.unwrap());
        store.update(|t| assert_eq!(t.subscriptions.len(), 1));
    }

    #[tokio::test]
    async fn test_purchase_records_subscription() {
        let store = Arc::new(MemoryRecordStore::new(fixture()));
        let identity = Arc::new(MemoryIdentityProvider::new(Some(Identity::new("u1"))));
        let offering = Offering {
            package_id: "monthly".into(),
            title: "Monthly".into(),
            price: "$9.99".into(),
        };
        let payments = MemoryPaymentProvider::new(vec![offering], store.clone(), identity);

        assert!(payments.purchase("yearly").await.is_err());
        assert!(payments.purchase("monthly").await.unwrap());
        assert!(store.has_active_subscription("u1").await.unwrap());
        assert!(payments.restore().await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_out_clears_identity() {
        let provider = MemoryIdentityProvider::new(Some(Identity::new("u1")));
        provider.sign_out().await.unwrap();
        assert!(provider.current_identity().await.unwrap().is_none());
        assert_eq!(provider.sign_out_count(), 1);
    }
}
