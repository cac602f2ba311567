//! Effectful shell around [`decide`].
//!
//! The shell applies each decision at most once:
//! - A redirect moves the guard into [`GuardPhase::RedirectInFlight`].
//!   Further redirects are suppressed until the cooldown task returns the
//!   guard to [`GuardPhase::Idle`], giving the location update time to land.
//! - A fetch error signs the identity out once and returns to the welcome
//!   screen. Re-evaluating the same failed fetch is a no-op; a later fetch
//!   that fails again signs out again.
//!
//! [`NavigationGuard::mount`] runs the guard against a status receiver and a
//! location receiver. Unmounting cancels the loop and any pending cooldown,
//! so later status completions have no effect.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::decision::{decide, Decision};
use crate::backend::IdentityProvider;
use crate::route::RouteLocation;
use crate::screen::Screen;
use crate::status::{QueryState, StatusQuery};

/// Default redirect cooldown.
pub const DEFAULT_REDIRECT_COOLDOWN: Duration = Duration::from_millis(100);

/// Imperative navigation supplied by the embedding app.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Replace the current location with `screen`.
    async fn replace(&self, screen: Screen);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    Idle,
    RedirectInFlight { target: Screen, generation: u64 },
}

/// Result of one guard evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "screen", rename_all = "kebab-case")]
pub enum Outcome {
    Loading,
    NoOp,
    Redirected(Screen),
    SignedOut,
    /// A redirect was wanted but another one is still settling.
    Suppressed(Screen),
}

struct Shared {
    phase: Mutex<GuardPhase>,
    settled: Notify,
}

pub struct NavigationGuard {
    navigator: Arc<dyn Navigator>,
    identity: Arc<dyn IdentityProvider>,
    query: Option<Arc<StatusQuery>>,
    cooldown: Duration,
    shared: Arc<Shared>,
    generation: u64,
    /// Query generation the last forced sign-out was issued for
    signed_out_for: Option<u64>,
    lifetime: CancellationToken,
}

impl NavigationGuard {
    pub fn new(navigator: Arc<dyn Navigator>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            navigator,
            identity,
            query: None,
            cooldown: DEFAULT_REDIRECT_COOLDOWN,
            shared: Arc::new(Shared {
                phase: Mutex::new(GuardPhase::Idle),
                settled: Notify::new(),
            }),
            generation: 0,
            signed_out_for: None,
            lifetime: CancellationToken::new(),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Clear this query's cache whenever the guard forces a sign-out.
    pub fn with_status_query(mut self, query: Arc<StatusQuery>) -> Self {
        self.query = Some(query);
        self
    }

    pub fn phase(&self) -> GuardPhase {
        *self.shared.phase.lock()
    }

    /// Evaluate once and apply the resulting decision.
    pub async fn evaluate(&mut self, state: &QueryState, location: &RouteLocation) -> Outcome {
        match decide(state, location) {
            Decision::Loading => Outcome::Loading,
            Decision::Stay => {
                if state.data.is_some() {
                    self.signed_out_for = None;
                }
                Outcome::NoOp
            }
            Decision::SignOut => {
                if self.signed_out_for == Some(state.generation) {
                    return Outcome::NoOp;
                }
                if self.in_flight().is_some() {
                    tracing::debug!("Sign-out redirect suppressed during cooldown");
                    return Outcome::Suppressed(Screen::Welcome);
                }
                self.signed_out_for = Some(state.generation);
                if let Some(error) = &state.error {
                    tracing::warn!("Status unavailable, forcing sign-out: {}", error);
                }
                if let Err(e) = self.identity.sign_out().await {
                    tracing::warn!("Sign-out failed: {}", e);
                }
                if let Some(query) = &self.query {
                    query.clear();
                }
                self.navigate(Screen::Welcome).await;
                Outcome::SignedOut
            }
            Decision::Redirect(target) => {
                self.signed_out_for = None;
                if let Some(pending) = self.in_flight() {
                    tracing::debug!(
                        "Redirect to {} suppressed while {} settles",
                        target,
                        pending
                    );
                    return Outcome::Suppressed(target);
                }
                tracing::info!("Redirecting {} -> {}", location, target.path());
                self.navigate(target).await;
                Outcome::Redirected(target)
            }
        }
    }

    /// Run the guard until the returned handle is unmounted or dropped, or
    /// either channel closes.
    pub fn mount(
        self,
        mut status: watch::Receiver<QueryState>,
        mut location: watch::Receiver<RouteLocation>,
    ) -> GuardHandle {
        let lifetime = self.lifetime.clone();
        let shared = self.shared.clone();
        let mut guard = self;

        let task = tokio::spawn({
            let lifetime = lifetime.clone();
            let shared = shared.clone();
            async move {
                loop {
                    let state = status.borrow_and_update().clone();
                    let current = location.borrow_and_update().clone();
                    let outcome = guard.evaluate(&state, &current).await;
                    tracing::trace!(?outcome, location = %current, "Guard evaluated");

                    tokio::select! {
                        _ = lifetime.cancelled() => break,
                        changed = status.changed() => if changed.is_err() { break },
                        changed = location.changed() => if changed.is_err() { break },
                        _ = shared.settled.notified() => {}
                    }
                }
                tracing::debug!("Navigation guard unmounted");
            }
        });

        GuardHandle {
            lifetime,
            shared,
            task: Some(task),
        }
    }

    fn in_flight(&self) -> Option<Screen> {
        match *self.shared.phase.lock() {
            GuardPhase::RedirectInFlight { target, .. } => Some(target),
            GuardPhase::Idle => None,
        }
    }

    async fn navigate(&mut self, target: Screen) {
        self.generation += 1;
        let generation = self.generation;
        *self.shared.phase.lock() = GuardPhase::RedirectInFlight { target, generation };

        self.navigator.replace(target).await;

        let shared = self.shared.clone();
        let cooldown = self.cooldown;
        let cancel = self.lifetime.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(cooldown) => {
                    let mut phase = shared.phase.lock();
                    if *phase == (GuardPhase::RedirectInFlight { target, generation }) {
                        *phase = GuardPhase::Idle;
                        drop(phase);
                        shared.settled.notify_one();
                    }
                }
            }
        });
    }
}

impl Drop for NavigationGuard {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

/// Handle to a mounted guard.
pub struct GuardHandle {
    lifetime: CancellationToken,
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl GuardHandle {
    pub fn phase(&self) -> GuardPhase {
        *self.shared.phase.lock()
    }

    pub fn is_mounted(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the guard and wait for its loop to exit.
    pub async fn unmount(mut self) {
        self.lifetime.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Navigation guard task failed: {}", e);
            }
        }
    }
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

/// Navigator that owns the location channel, standing in for the host
/// navigation framework. Every `replace` is logged and published.
pub struct WatchNavigator {
    location: watch::Sender<RouteLocation>,
    history: Mutex<Vec<Screen>>,
}

impl WatchNavigator {
    pub fn new(initial: RouteLocation) -> Self {
        let (location, _rx) = watch::channel(initial);
        Self {
            location,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RouteLocation> {
        self.location.subscribe()
    }

    pub fn location(&self) -> RouteLocation {
        self.location.borrow().clone()
    }

    /// Move without going through the guard, e.g. a user tapping a link.
    pub fn visit(&self, location: RouteLocation) {
        self.location.send_replace(location);
    }

    pub fn history(&self) -> Vec<Screen> {
        self.history.lock().clone()
    }
}

#[async_trait]
impl Navigator for WatchNavigator {
    async fn replace(&self, screen: Screen) {
        self.history.lock().push(screen);
        self.location.send_replace(RouteLocation::of(screen));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        BackendError, Fixture, Identity, MemoryIdentityProvider, MemoryRecordStore,
    };
    use crate::status::{AccountType, ApplicationStatus, StatusError, StatusSource, UserStatus};

    fn approved(has_profile: bool, paid: bool, affiliation: bool, references: bool) -> QueryState {
        QueryState::ready(UserStatus::new(
            ApplicationStatus::Approved,
            AccountType::TypeA,
            has_profile,
            paid,
            affiliation,
            references,
        ))
    }

    fn rejected() -> QueryState {
        QueryState::ready(UserStatus::new(
            ApplicationStatus::Rejected,
            AccountType::TypeB,
            false,
            true,
            false,
            false,
        ))
    }

    fn guard() -> (
        NavigationGuard,
        Arc<WatchNavigator>,
        Arc<MemoryIdentityProvider>,
    ) {
        let navigator = Arc::new(WatchNavigator::new(RouteLocation::of(Screen::MainApp)));
        let identity = Arc::new(MemoryIdentityProvider::new(Some(Identity::new("u1"))));
        let guard = NavigationGuard::new(navigator.clone(), identity.clone());
        (guard, navigator, identity)
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_then_noop_at_target() {
        let (mut guard, navigator, _) = guard();
        let state = approved(false, false, false, false);

        let outcome = guard.evaluate(&state, &navigator.location()).await;
        assert_eq!(outcome, Outcome::Redirected(Screen::Approved));
        assert_eq!(navigator.location(), RouteLocation::of(Screen::Approved));

        let outcome = guard.evaluate(&state, &navigator.location()).await;
        assert_eq!(outcome, Outcome::NoOp);
        assert_eq!(navigator.history(), vec![Screen::Approved]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_redirect_suppressed_within_cooldown() {
        let (mut guard, navigator, _) = guard();
        let at_tabs = RouteLocation::of(Screen::MainApp);

        let first = guard.evaluate(&approved(false, false, false, false), &at_tabs).await;
        assert_eq!(first, Outcome::Redirected(Screen::Approved));
        assert!(matches!(guard.phase(), GuardPhase::RedirectInFlight { .. }));

        let second = guard.evaluate(&rejected(), &at_tabs).await;
        assert_eq!(second, Outcome::Suppressed(Screen::Rejected));
        assert_eq!(navigator.history(), vec![Screen::Approved]);

        tokio::time::sleep(DEFAULT_REDIRECT_COOLDOWN + Duration::from_millis(1)).await;
        assert_eq!(guard.phase(), GuardPhase::Idle);

        let third = guard.evaluate(&rejected(), &at_tabs).await;
        assert_eq!(third, Outcome::Redirected(Screen::Rejected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_signs_out_once() {
        let (mut guard, navigator, identity) = guard();
        let state = QueryState::failed(StatusError::NoApplication("u1".into()));

        let outcome = guard.evaluate(&state, &navigator.location()).await;
        assert_eq!(outcome, Outcome::SignedOut);
        assert_eq!(identity.sign_out_count(), 1);
        assert_eq!(navigator.history(), vec![Screen::Welcome]);

        tokio::time::sleep(DEFAULT_REDIRECT_COOLDOWN * 2).await;
        let again = guard.evaluate(&state, &navigator.location()).await;
        assert_eq!(again, Outcome::NoOp);
        assert_eq!(identity.sign_out_count(), 1);
        assert_eq!(navigator.history(), vec![Screen::Welcome]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_failed_fetch_signs_out_again() {
        let (mut guard, navigator, identity) = guard();
        let first = QueryState {
            generation: 1,
            ..QueryState::failed(StatusError::NoApplication("u1".into()))
        };
        let second = QueryState {
            generation: 2,
            ..first.clone()
        };

        assert_eq!(
            guard.evaluate(&first, &navigator.location()).await,
            Outcome::SignedOut
        );
        tokio::time::sleep(DEFAULT_REDIRECT_COOLDOWN * 2).await;
        assert_eq!(
            guard.evaluate(&second, &navigator.location()).await,
            Outcome::SignedOut
        );
        assert_eq!(identity.sign_out_count(), 2);
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        SignOut,
        Replace(Screen),
    }

    /// Navigator and identity provider sharing one call log.
    #[derive(Default)]
    struct CallLog {
        calls: Mutex<Vec<Call>>,
    }

    impl CallLog {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Navigator for CallLog {
        async fn replace(&self, screen: Screen) {
            self.calls.lock().push(Call::Replace(screen));
        }
    }

    #[async_trait]
    impl IdentityProvider for CallLog {
        async fn current_identity(&self) -> Result<Option<Identity>, BackendError> {
            Ok(Some(Identity::new("u1")))
        }

        async fn sign_out(&self) -> Result<(), BackendError> {
            self.calls.lock().push(Call::SignOut);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_precedes_welcome_redirect() {
        let log = Arc::new(CallLog::default());
        let mut guard = NavigationGuard::new(log.clone(), log.clone());
        let state = QueryState::failed(StatusError::Backend(BackendError::Unavailable(
            "offline".into(),
        )));

        let outcome = guard
            .evaluate(&state, &RouteLocation::of(Screen::Payment))
            .await;
        assert_eq!(outcome, Outcome::SignedOut);
        assert_eq!(log.calls(), vec![Call::SignOut, Call::Replace(Screen::Welcome)]);
    }

    #[tokio::test]
    async fn test_loading_does_nothing() {
        let (mut guard, navigator, identity) = guard();
        let outcome = guard
            .evaluate(&QueryState::default(), &navigator.location())
            .await;
        assert_eq!(outcome, Outcome::Loading);
        assert!(navigator.history().is_empty());
        assert_eq!(identity.sign_out_count(), 0);
        assert_eq!(guard.phase(), GuardPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_guard_cancels_cooldown() {
        let (mut guard, navigator, _) = guard();
        guard.evaluate(&rejected(), &navigator.location()).await;
        let shared = guard.shared.clone();
        drop(guard);

        tokio::time::sleep(DEFAULT_REDIRECT_COOLDOWN * 2).await;
        assert!(matches!(
            *shared.phase.lock(),
            GuardPhase::RedirectInFlight { .. }
        ));
    }

    fn backend() -> (Arc<MemoryRecordStore>, Arc<MemoryIdentityProvider>) {
        let fixture = Fixture::from_json(
            r#"{
                "type_a_applications": [
                    { "id": "a1", "identity_id": "u1", "status": "pending" }
                ]
            }"#,
        )
        .unwrap();
        (
            Arc::new(MemoryRecordStore::new(fixture)),
            Arc::new(MemoryIdentityProvider::new(Some(Identity::new("u1")))),
        )
    }

    async fn wait_for_location(rx: &mut watch::Receiver<RouteLocation>, screen: Screen) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|l| l.is_leaf(screen)))
            .await
            .expect("timed out waiting for location")
            .expect("location channel closed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mounted_guard_follows_status_changes() {
        let (store, identity) = backend();
        let query = Arc::new(StatusQuery::new(
            StatusSource::new(store.clone()),
            identity.clone(),
        ));
        let navigator = Arc::new(WatchNavigator::new(RouteLocation::of(Screen::MainApp)));
        let mut location = navigator.subscribe();

        let handle = NavigationGuard::new(navigator.clone(), identity.clone())
            .with_status_query(query.clone())
            .mount(query.subscribe(), navigator.subscribe());
        assert!(handle.is_mounted());

        query.ensure_fresh().await.unwrap();
        wait_for_location(&mut location, Screen::Pending).await;

        store.update(|t| t.type_a_applications[0].status = ApplicationStatus::Approved);
        query.invalidate_and_refetch().await.unwrap();
        wait_for_location(&mut location, Screen::Approved).await;

        assert_eq!(navigator.history(), vec![Screen::Pending, Screen::Approved]);
        handle.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mounted_guard_retries_after_cooldown() {
        let (store, identity) = backend();
        let query = Arc::new(StatusQuery::new(
            StatusSource::new(store.clone()),
            identity.clone(),
        ));
        let navigator = Arc::new(WatchNavigator::new(RouteLocation::of(Screen::MainApp)));
        let mut location = navigator.subscribe();
        let handle = NavigationGuard::new(navigator.clone(), identity.clone())
            .mount(query.subscribe(), navigator.subscribe());

        query.ensure_fresh().await.unwrap();
        wait_for_location(&mut location, Screen::Pending).await;

        // User wanders off while the first redirect is still settling.
        navigator.visit(RouteLocation::parse("/(tabs)/matches"));
        wait_for_location(&mut location, Screen::Pending).await;

        assert_eq!(navigator.history(), vec![Screen::Pending, Screen::Pending]);
        handle.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mounted_guard_signs_out_on_error() {
        let (store, identity) = backend();
        store.fail_with("offline");
        let query = Arc::new(StatusQuery::new(
            StatusSource::new(store.clone()),
            identity.clone(),
        ));
        let navigator = Arc::new(WatchNavigator::new(RouteLocation::of(Screen::Payment)));
        let mut location = navigator.subscribe();
        let handle = NavigationGuard::new(navigator.clone(), identity.clone())
            .with_status_query(query.clone())
            .mount(query.subscribe(), navigator.subscribe());

        let err = query.ensure_fresh().await.unwrap_err();
        assert!(matches!(err, StatusError::Backend(BackendError::Unavailable(_))));
        wait_for_location(&mut location, Screen::Welcome).await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(identity.sign_out_count(), 1);
        assert_eq!(navigator.history(), vec![Screen::Welcome]);
        handle.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mounted_guard_signs_out_after_each_sign_in() {
        let store = Arc::new(MemoryRecordStore::new(Fixture::default()));
        let identity = Arc::new(MemoryIdentityProvider::new(Some(Identity::new("ghost"))));
        let query = Arc::new(StatusQuery::new(
            StatusSource::new(store),
            identity.clone(),
        ));
        let navigator = Arc::new(WatchNavigator::new(RouteLocation::of(Screen::MainApp)));
        let handle = NavigationGuard::new(navigator.clone(), identity.clone())
            .with_status_query(query.clone())
            .mount(query.subscribe(), navigator.subscribe());

        assert!(query.ensure_fresh().await.is_err());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(identity.sign_out_count(), 1);

        identity.sign_in(Identity::new("ghost"));
        navigator.visit(RouteLocation::of(Screen::MainApp));
        assert!(query.ensure_fresh().await.is_err());
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(identity.sign_out_count(), 2);
        assert_eq!(navigator.history(), vec![Screen::Welcome, Screen::Welcome]);
        assert_eq!(navigator.location(), RouteLocation::of(Screen::Welcome));
        handle.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmounted_guard_ignores_updates() {
        let (store, identity) = backend();
        let query = Arc::new(StatusQuery::new(StatusSource::new(store), identity.clone()));
        let navigator = Arc::new(WatchNavigator::new(RouteLocation::of(Screen::MainApp)));
        let handle = NavigationGuard::new(navigator.clone(), identity)
            .mount(query.subscribe(), navigator.subscribe());

        handle.unmount().await;
        query.ensure_fresh().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(navigator.history().is_empty());
    }
}
