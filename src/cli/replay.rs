//! Fixture replay: wires the in-memory backend, the status query and a
//! mounted navigation guard, then reports every navigation the guard made.

use std::sync::Arc;
use std::time::Duration;

use super::config::GateConfig;
use super::output::ReplayReport;
use crate::backend::{
    Fixture, Identity, MemoryIdentityProvider, MemoryPaymentProvider, MemoryRecordStore,
};
use crate::guard::{NavigationGuard, WatchNavigator};
use crate::paywall::Paywall;
use crate::route::RouteLocation;
use crate::status::{StatusQuery, StatusSource};

/// Replay inputs
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Identity to sign in; falls back to the fixture's identity
    pub identity: Option<String>,
    pub start: RouteLocation,
    /// Package to purchase once the first redirect settled
    pub purchase: Option<String>,
}

pub async fn run_replay(
    fixture: Fixture,
    options: ReplayOptions,
    config: &GateConfig,
) -> anyhow::Result<ReplayReport> {
    let identity = options
        .identity
        .map(Identity::new)
        .or_else(|| fixture.identity.clone());
    let identity_id = identity.as_ref().map(|i| i.id.clone());

    let store = Arc::new(MemoryRecordStore::new(fixture.clone()));
    let sessions = Arc::new(MemoryIdentityProvider::new(identity));
    let source =
        StatusSource::new(store.clone()).with_payment_check(config.status.payment_check);
    let query = Arc::new(
        StatusQuery::new(source, sessions.clone())
            .with_stale_after(config.stale_after())
            .with_capacity(config.status.cache_capacity),
    );
    let navigator = Arc::new(WatchNavigator::new(options.start.clone()));

    let handle = NavigationGuard::new(navigator.clone(), sessions.clone())
        .with_cooldown(config.redirect_cooldown())
        .with_status_query(query.clone())
        .mount(query.subscribe(), navigator.subscribe());

    let mut error = query.ensure_fresh().await.err().map(|e| e.to_string());
    settle(config).await;

    if let (Some(package), None) = (options.purchase.as_deref(), error.as_ref()) {
        let payments = Arc::new(MemoryPaymentProvider::new(
            fixture.offerings.clone(),
            store.clone(),
            sessions.clone(),
        ));
        let paywall = Paywall::new(payments, store.clone(), sessions.clone(), query.clone())
            .with_testing_bypass(config.paywall.testing_bypass);
        match paywall.purchase(package).await {
            Ok(outcome) => tracing::info!(entitled = outcome.entitled, "Replay purchase done"),
            Err(e) => error = Some(e.to_string()),
        }
        settle(config).await;
    }

    handle.unmount().await;

    Ok(ReplayReport {
        identity: identity_id,
        start: options.start.to_string(),
        navigations: navigator.history(),
        final_location: navigator.location().to_string(),
        status: query.state().data,
        error,
    })
}

/// Give the guard time to apply a redirect and leave its cooldown.
async fn settle(config: &GateConfig) {
    tokio::time::sleep(config.redirect_cooldown() * 3 + Duration::from_millis(10)).await;
}
