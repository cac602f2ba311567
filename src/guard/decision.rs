//! Pure routing decision: `(status query state, location) -> Decision`.
//!
//! Rules are evaluated top to bottom and the first match wins. The ordering
//! is the contract:
//!
//! 1. fetch error            -> sign out, back to the welcome screen
//! 2. loading / no snapshot  -> show a spinner, no navigation
//! 3. rejected               -> rejected screen
//! 4. pending                -> pending screen
//! 5. approved, by [`Stage`] -> approved / onboarding / main app
//!
//! Every rule is a no-op when the location already satisfies it, so
//! deciding twice for the same input never produces a second redirect.

use serde::Serialize;

use crate::route::RouteLocation;
use crate::screen::{Area, Screen};
use crate::status::{ApplicationStatus, QueryState, UserStatus};

/// What the guard should do for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "target", rename_all = "kebab-case")]
pub enum Decision {
    /// Status could not be fetched; sign out and go to the welcome screen.
    SignOut,
    /// Status not available yet.
    Loading,
    /// Current location is allowed.
    Stay,
    /// Replace the current location.
    Redirect(Screen),
}

impl Decision {
    pub fn target(&self) -> Option<Screen> {
        match self {
            Decision::Redirect(screen) => Some(*screen),
            Decision::SignOut => Some(Screen::Welcome),
            Decision::Loading | Decision::Stay => None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::SignOut => write!(f, "sign out -> {}", Screen::Welcome.path()),
            Decision::Loading => write!(f, "loading"),
            Decision::Stay => write!(f, "stay"),
            Decision::Redirect(screen) => write!(f, "redirect -> {}", screen.path()),
        }
    }
}

/// Conceptual position of a member in the review/payment/onboarding flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Rejected,
    Pending,
    ApprovedNoProfileUnpaid,
    ApprovedNoProfilePaid,
    ApprovedProfileUnpaid,
    OnboardingAffiliation,
    OnboardingReferences,
    MainApp,
}

impl Stage {
    pub fn of(status: &UserStatus) -> Self {
        match status.application_status {
            ApplicationStatus::Rejected => Stage::Rejected,
            ApplicationStatus::Pending => Stage::Pending,
            ApplicationStatus::Approved => match (status.has_profile, status.paid) {
                (false, false) => Stage::ApprovedNoProfileUnpaid,
                (false, true) => Stage::ApprovedNoProfilePaid,
                (true, false) => Stage::ApprovedProfileUnpaid,
                (true, true) if status.onboarding_completed() => Stage::MainApp,
                (true, true) if !status.has_affiliation => Stage::OnboardingAffiliation,
                (true, true) => Stage::OnboardingReferences,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Rejected => "rejected",
            Stage::Pending => "pending",
            Stage::ApprovedNoProfileUnpaid => "approved-no-profile-unpaid",
            Stage::ApprovedNoProfilePaid => "approved-no-profile-paid",
            Stage::ApprovedProfileUnpaid => "approved-profile-unpaid",
            Stage::OnboardingAffiliation => "onboarding-affiliation",
            Stage::OnboardingReferences => "onboarding-references",
            Stage::MainApp => "main-app",
        }
    }
}

/// Screens a member who has left the review/payment flow is pulled out of.
const PRE_APP_SCREENS: [Screen; 4] = [
    Screen::Pending,
    Screen::Rejected,
    Screen::Approved,
    Screen::Payment,
];

const NO_PROFILE_UNPAID_SCREENS: [Screen; 2] = [Screen::Approved, Screen::Payment];

const NO_PROFILE_PAID_SCREENS: [Screen; 4] = [
    Screen::Approved,
    Screen::ProfileSetup,
    Screen::Affiliation,
    Screen::References,
];

const ONBOARDING_SCREENS: [Screen; 2] = [Screen::Affiliation, Screen::References];

/// Decide where the member must be.
pub fn decide(state: &QueryState, location: &RouteLocation) -> Decision {
    if state.is_error() {
        return Decision::SignOut;
    }
    match &state.data {
        Some(status) => decide_for_status(status, location),
        None => Decision::Loading,
    }
}

/// Rules 3 onwards, for a settled snapshot.
pub fn decide_for_status(status: &UserStatus, location: &RouteLocation) -> Decision {
    let in_onboarding = location.in_area(Area::Onboarding);

    match Stage::of(status) {
        Stage::Rejected => redirect_unless_at(Screen::Rejected, location),
        Stage::Pending => redirect_unless_at(Screen::Pending, location),
        Stage::ApprovedProfileUnpaid => redirect_unless_at(Screen::Approved, location),
        Stage::OnboardingAffiliation | Stage::OnboardingReferences
            if in_onboarding || location.leaf_in(&ONBOARDING_SCREENS) =>
        {
            Decision::Stay
        }
        Stage::OnboardingAffiliation => Decision::Redirect(Screen::Affiliation),
        Stage::OnboardingReferences => Decision::Redirect(Screen::References),
        Stage::MainApp => {
            if in_onboarding || location.leaf_in(&PRE_APP_SCREENS) {
                Decision::Redirect(Screen::MainApp)
            } else {
                Decision::Stay
            }
        }
        Stage::ApprovedNoProfileUnpaid => {
            if location.leaf_in(&NO_PROFILE_UNPAID_SCREENS) {
                Decision::Stay
            } else {
                Decision::Redirect(Screen::Approved)
            }
        }
        Stage::ApprovedNoProfilePaid => {
            if in_onboarding || location.leaf_in(&NO_PROFILE_PAID_SCREENS) {
                Decision::Stay
            } else {
                Decision::Redirect(Screen::Approved)
            }
        }
    }
}

fn redirect_unless_at(target: Screen, location: &RouteLocation) -> Decision {
    if location.is_leaf(target) {
        Decision::Stay
    } else {
        Decision::Redirect(target)
    }
}
