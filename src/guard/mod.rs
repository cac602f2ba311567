//! Navigation guard
//!
//! Decides, from the status snapshot and the current location, which screen
//! the member must be on, and redirects otherwise.
//!
//! ## Module Structure
//!
//! - `decision`: pure decision table (`decide`, `Stage`)
//! - `shell`: redirect serialization, forced sign-out, mount lifecycle

pub mod decision;
pub mod shell;

pub use decision::{decide, decide_for_status, Decision, Stage};
pub use shell::{
    GuardHandle, GuardPhase, NavigationGuard, Navigator, Outcome, WatchNavigator,
    DEFAULT_REDIRECT_COOLDOWN,
};
