//! Screen catalog for status routing.
//!
//! This module is the single source of truth for the destinations the
//! navigation guard may target and for the route vocabulary it parses.
//! Every screen maps to exactly one concrete path, and every leaf segment
//! the guard inspects maps back to exactly one screen.

use serde::{Deserialize, Serialize};

/// Top-level route groups (first path segment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Area {
    /// Signed-out entry flow
    Public,
    /// Signed-in review and payment flow
    Auth,
    /// Post-payment onboarding steps
    Onboarding,
    /// Main application tabs
    Tabs,
}

impl Area {
    pub const ALL: [Area; 4] = [Area::Public, Area::Auth, Area::Onboarding, Area::Tabs];

    pub fn as_segment(&self) -> &'static str {
        match self {
            Area::Public => "(public)",
            Area::Auth => "(auth)",
            Area::Onboarding => "(onboarding)",
            Area::Tabs => "(tabs)",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_segment() == segment)
    }
}

/// Every destination the guard can redirect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Screen {
    Welcome,
    Pending,
    Rejected,
    Approved,
    Payment,
    ProfileSetup,
    Affiliation,
    References,
    MainApp,
}

impl Screen {
    pub const ALL: [Screen; 9] = [
        Screen::Welcome,
        Screen::Pending,
        Screen::Rejected,
        Screen::Approved,
        Screen::Payment,
        Screen::ProfileSetup,
        Screen::Affiliation,
        Screen::References,
        Screen::MainApp,
    ];

    /// Area the screen lives under.
    pub fn area(&self) -> Area {
        match self {
            Screen::Welcome => Area::Public,
            Screen::Pending
            | Screen::Rejected
            | Screen::Approved
            | Screen::Payment
            | Screen::ProfileSetup => Area::Auth,
            Screen::Affiliation | Screen::References => Area::Onboarding,
            Screen::MainApp => Area::Tabs,
        }
    }

    /// Leaf segment naming the screen. `MainApp` is the tab root and has none.
    pub fn leaf_segment(&self) -> Option<&'static str> {
        match self {
            Screen::Welcome => Some("welcome"),
            Screen::Pending => Some("pending"),
            Screen::Rejected => Some("rejected"),
            Screen::Approved => Some("approved"),
            Screen::Payment => Some("payment"),
            Screen::ProfileSetup => Some("profile-setup"),
            Screen::Affiliation => Some("affiliation"),
            Screen::References => Some("references"),
            Screen::MainApp => None,
        }
    }

    /// Concrete path used for a `replace` navigation.
    pub fn path(&self) -> String {
        match self.leaf_segment() {
            Some(leaf) => format!("/{}/{}", self.area().as_segment(), leaf),
            None => format!("/{}", self.area().as_segment()),
        }
    }

    pub fn from_leaf(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.leaf_segment() == Some(segment))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Welcome => "welcome",
            Screen::Pending => "pending",
            Screen::Rejected => "rejected",
            Screen::Approved => "approved",
            Screen::Payment => "payment",
            Screen::ProfileSetup => "profile-setup",
            Screen::Affiliation => "affiliation",
            Screen::References => "references",
            Screen::MainApp => "main-app",
        }
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
