//! Payment screen orchestration.
//!
//! Wraps the purchase provider so that every entitlement change invalidates
//! the status query, which in turn re-triggers the navigation guard.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{BackendError, IdentityProvider, Offering, PaymentProvider, RecordStore};
use crate::status::{StatusError, StatusQuery, UserStatus};

/// Result of a purchase, restore or bypass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOutcome {
    pub entitled: bool,
    /// Fresh snapshot, present when `entitled` is true.
    pub status: Option<UserStatus>,
}

#[derive(Debug, Error)]
pub enum PaywallError {
    #[error("No offerings available")]
    NoOffering,

    #[error("Unknown package: {0}")]
    UnknownPackage(String),

    #[error("Testing bypass is disabled")]
    BypassDisabled,

    #[error("Payment backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Status refresh failed: {0}")]
    Status(#[from] StatusError),
}

pub struct Paywall {
    provider: Arc<dyn PaymentProvider>,
    store: Arc<dyn RecordStore>,
    identity: Arc<dyn IdentityProvider>,
    query: Arc<StatusQuery>,
    testing_bypass: bool,
}

impl Paywall {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        store: Arc<dyn RecordStore>,
        identity: Arc<dyn IdentityProvider>,
        query: Arc<StatusQuery>,
    ) -> Self {
        Self {
            provider,
            store,
            identity,
            query,
            testing_bypass: false,
        }
    }

    pub fn with_testing_bypass(mut self, enabled: bool) -> Self {
        self.testing_bypass = enabled;
        self
    }

    pub async fn offerings(&self) -> Result<Vec<Offering>, PaywallError> {
        let offerings = self.provider.offerings().await?;
        if offerings.is_empty() {
            return Err(PaywallError::NoOffering);
        }
        Ok(offerings)
    }

    /// Subscriber record flag for the signed-in identity.
    pub async fn subscription_active(&self) -> Result<bool, PaywallError> {
        let id = self.identity_id().await?;
        Ok(self.store.has_active_subscription(&id).await?)
    }

    pub async fn purchase(&self, package_id: &str) -> Result<PurchaseOutcome, PaywallError> {
        let offerings = self.offerings().await?;
        if !offerings.iter().any(|o| o.package_id == package_id) {
            return Err(PaywallError::UnknownPackage(package_id.to_string()));
        }
        let entitled = self.provider.purchase(package_id).await?;
        tracing::info!(package = package_id, entitled, "Purchase completed");
        self.settle(entitled).await
    }

    pub async fn restore(&self) -> Result<PurchaseOutcome, PaywallError> {
        let entitled = self.provider.restore().await?;
        tracing::info!(entitled, "Restore completed");
        self.settle(entitled).await
    }

    /// Mark the signed-in identity as subscribed without a purchase.
    /// Only available when the testing bypass is enabled.
    pub async fn testing_bypass(&self) -> Result<PurchaseOutcome, PaywallError> {
        if !self.testing_bypass {
            return Err(PaywallError::BypassDisabled);
        }
        let id = self.identity_id().await?;
        self.store.mark_subscribed(&id).await?;
        tracing::warn!(identity = %id, "Subscription granted by testing bypass");
        self.settle(true).await
    }

    async fn settle(&self, entitled: bool) -> Result<PurchaseOutcome, PaywallError> {
        if !entitled {
            return Ok(PurchaseOutcome {
                entitled,
                status: None,
            });
        }
        let status = self.query.invalidate_and_refetch().await?;
        Ok(PurchaseOutcome {
            entitled,
            status: Some(status),
        })
    }

    async fn identity_id(&self) -> Result<String, PaywallError> {
        match self.identity.current_identity().await? {
            Some(identity) => Ok(identity.id),
            None => Err(StatusError::NoIdentity.into()),
        }
    }
}
