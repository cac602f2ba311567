//! matchgate - membership status routing guard
//!
//! Decides which screen a member of an application-reviewed matchmaking
//! app must be on, from a status snapshot fetched from the backend, and
//! applies that decision as a single `replace` navigation.
//!
//! ## Features
//!
//! - **Status query**: per-identity cache with a 5 minute freshness window,
//!   explicit invalidation and stale-while-revalidate
//! - **Decision table**: pure, ordered, exhaustively matched
//! - **Guard shell**: one redirect in flight at a time, cooldown, forced
//!   sign-out on fetch errors
//! - **Paywall**: purchase/restore that invalidate the status query
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use matchgate::{
//!     Fixture, MemoryIdentityProvider, MemoryRecordStore, NavigationGuard, RouteLocation,
//!     Screen, StatusQuery, StatusSource, WatchNavigator,
//! };
//!
//! # async fn run() {
//! let store = Arc::new(MemoryRecordStore::new(Fixture::default()));
//! let sessions = Arc::new(MemoryIdentityProvider::new(None));
//! let query = Arc::new(StatusQuery::new(StatusSource::new(store), sessions.clone()));
//! let navigator = Arc::new(WatchNavigator::new(RouteLocation::of(Screen::MainApp)));
//!
//! let guard = NavigationGuard::new(navigator.clone(), sessions)
//!     .with_status_query(query.clone())
//!     .mount(query.subscribe(), navigator.subscribe());
//! let _ = query.ensure_fresh().await;
//! guard.unmount().await;
//! # }
//! ```

pub mod backend;
pub mod cli;
pub mod guard;
pub mod paywall;
pub mod route;
pub mod screen;
pub mod status;

// Re-exports for convenience
pub use backend::{
    BackendError, Fixture, Identity, IdentityProvider, MemoryIdentityProvider,
    MemoryPaymentProvider, MemoryRecordStore, Offering, PaymentProvider, RecordStore,
};
pub use guard::{
    decide, decide_for_status, Decision, GuardHandle, GuardPhase, NavigationGuard, Navigator,
    Outcome, Stage, WatchNavigator, DEFAULT_REDIRECT_COOLDOWN,
};
pub use paywall::{Paywall, PaywallError, PurchaseOutcome};
pub use route::RouteLocation;
pub use screen::{Area, Screen};
pub use status::{
    AccountType, ApplicationStatus, PaymentCheck, QueryState, StatusError, StatusQuery,
    StatusSource, UserStatus,
};
