//! Membership status snapshot and the source that normalizes it.
//!
//! A [`UserStatus`] is produced wholesale on every fetch and never mutated
//! locally. Anything that changes the underlying records must invalidate
//! the [`StatusQuery`] cache before the guard can observe it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendError, Identity, RecordStore};

pub mod query;

pub use query::{QueryState, StatusQuery};

/// Outcome of the external review process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 3] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            _ => Err(format!("Unknown application status: {}", s)),
        }
    }
}

/// Which of the two parallel applicant tables the identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    TypeA,
    TypeB,
    /// Only seen on error paths.
    None,
}

impl AccountType {
    /// Probe order when resolving an identity. First match wins.
    pub const PROBE_ORDER: [AccountType; 2] = [AccountType::TypeA, AccountType::TypeB];
}

/// Normalized status snapshot consumed by the navigation guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StatusFields")]
pub struct UserStatus {
    pub application_status: ApplicationStatus,
    pub has_profile: bool,
    pub paid: bool,
    pub account_type: AccountType,
    onboarding_completed: bool,
    pub has_affiliation: bool,
    pub has_references: bool,
}

impl UserStatus {
    pub fn new(
        application_status: ApplicationStatus,
        account_type: AccountType,
        has_profile: bool,
        paid: bool,
        has_affiliation: bool,
        has_references: bool,
    ) -> Self {
        Self {
            application_status,
            has_profile,
            paid,
            account_type,
            onboarding_completed: has_affiliation && has_references,
            has_affiliation,
            has_references,
        }
    }

    /// Both onboarding steps are done. Derived, never set independently.
    pub fn onboarding_completed(&self) -> bool {
        self.onboarding_completed
    }
}

/// Input fields of a serialized snapshot. `onboardingCompleted` is
/// recomputed rather than trusted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusFields {
    application_status: ApplicationStatus,
    has_profile: bool,
    paid: bool,
    account_type: AccountType,
    has_affiliation: bool,
    has_references: bool,
}

impl From<StatusFields> for UserStatus {
    fn from(f: StatusFields) -> Self {
        UserStatus::new(
            f.application_status,
            f.account_type,
            f.has_profile,
            f.paid,
            f.has_affiliation,
            f.has_references,
        )
    }
}

/// How the `paid` flag is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentCheck {
    /// Placeholder: every identity is reported as paid.
    #[default]
    AssumePaid,
    /// Read the subscriber record's active flag.
    Subscription,
}

impl std::str::FromStr for PaymentCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "assume-paid" | "assume_paid" | "stub" => Ok(PaymentCheck::AssumePaid),
            "subscription" => Ok(PaymentCheck::Subscription),
            _ => Err(format!("Unknown payment check: {}", s)),
        }
    }
}

impl std::fmt::Display for PaymentCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentCheck::AssumePaid => write!(f, "assume-paid"),
            PaymentCheck::Subscription => write!(f, "subscription"),
        }
    }
}

/// Status fetch errors. Every variant forces a sign-out in the guard.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("No signed-in identity")]
    NoIdentity,

    #[error("No application found for identity {0}")]
    NoApplication(String),

    #[error("Status lookup failed: {0}")]
    Backend(#[from] BackendError),
}

/// Builds [`UserStatus`] snapshots from the record store.
pub struct StatusSource {
    store: Arc<dyn RecordStore>,
    payment_check: PaymentCheck,
}

impl StatusSource {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            payment_check: PaymentCheck::default(),
        }
    }

    pub fn with_payment_check(mut self, payment_check: PaymentCheck) -> Self {
        self.payment_check = payment_check;
        self
    }

    pub fn payment_check(&self) -> PaymentCheck {
        self.payment_check
    }

    pub async fn fetch(&self, identity: &Identity) -> Result<UserStatus, StatusError> {
        let mut found = None;
        for kind in AccountType::PROBE_ORDER {
            if let Some(app) = self.store.find_application(kind, &identity.id).await? {
                found = Some((kind, app));
                break;
            }
        }
        let (account_type, application) =
            found.ok_or_else(|| StatusError::NoApplication(identity.id.clone()))?;

        let profile = self.store.find_profile(account_type, &identity.id).await?;
        let (has_profile, has_affiliation, has_references) = match profile {
            Some(profile) => {
                let references = self.store.count_references(&profile.id).await?;
                (true, profile.affiliation.is_some(), references > 0)
            }
            None => (false, false, false),
        };

        let paid = match self.payment_check {
            PaymentCheck::AssumePaid => true,
            PaymentCheck::Subscription => {
                self.store.has_active_subscription(&identity.id).await?
            }
        };

        let status = UserStatus::new(
            application.status,
            account_type,
            has_profile,
            paid,
            has_affiliation,
            has_references,
        );
        tracing::debug!(
            identity = %identity.id,
            application = status.application_status.as_str(),
            has_profile,
            paid,
            onboarding_completed = status.onboarding_completed(),
            "Fetched user status"
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Fixture, MemoryRecordStore};

    fn source(json: &str) -> StatusSource {
        let store = MemoryRecordStore::new(Fixture::from_json(json).unwrap());
        StatusSource::new(Arc::new(store))
    }

    #[test]
    fn test_onboarding_completed_truth_table() {
        for affiliation in [false, true] {
            for references in [false, true] {
                let status = UserStatus::new(
                    ApplicationStatus::Approved,
                    AccountType::TypeA,
                    true,
                    true,
                    affiliation,
                    references,
                );
                assert_eq!(status.onboarding_completed(), affiliation && references);
            }
        }
    }

    #[test]
    fn test_serializes_camel_case() {
        let status = UserStatus::new(
            ApplicationStatus::Pending,
            AccountType::TypeB,
            false,
            true,
            false,
            false,
        );
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["applicationStatus"], "pending");
        assert_eq!(json["accountType"], "type_b");
        assert_eq!(json["onboardingCompleted"], false);
    }

    #[test]
    fn test_deserialize_recomputes_onboarding() {
        let status: UserStatus = serde_json::from_str(
            r#"{
                "applicationStatus": "approved",
                "hasProfile": true,
                "paid": true,
                "accountType": "type_a",
                "onboardingCompleted": true,
                "hasAffiliation": true,
                "hasReferences": false
            }"#,
        )
        .unwrap();
        assert!(!status.onboarding_completed());
    }

    #[tokio::test]
    async fn test_type_a_wins_when_both_exist() {
        let source = source(
            r#"{
                "type_a_applications": [{ "id": "a", "identity_id": "u1", "status": "rejected" }],
                "type_b_applications": [{ "id": "b", "identity_id": "u1", "status": "approved" }]
            }"#,
        );
        let status = source.fetch(&Identity::new("u1")).await.unwrap();
        assert_eq!(status.account_type, AccountType::TypeA);
        assert_eq!(status.application_status, ApplicationStatus::Rejected);
        assert!(!status.has_profile);
    }

    #[tokio::test]
    async fn test_explicit_false_affiliation_counts_as_set() {
        let source = source(
            r#"{
                "type_b_applications": [{ "id": "b", "identity_id": "u1", "status": "approved" }],
                "type_b_profiles": [{ "id": "p1", "identity_id": "u1", "affiliation": false }],
                "references": [{ "id": "r1", "profile_id": "p1" }]
            }"#,
        );
        let status = source.fetch(&Identity::new("u1")).await.unwrap();
        assert_eq!(status.account_type, AccountType::TypeB);
        assert!(status.has_profile);
        assert!(status.has_affiliation);
        assert!(status.has_references);
        assert!(status.onboarding_completed());
    }

    #[tokio::test]
    async fn test_unset_affiliation_and_no_references() {
        let source = source(
            r#"{
                "type_a_applications": [{ "id": "a", "identity_id": "u1", "status": "approved" }],
                "type_a_profiles": [{ "id": "p1", "identity_id": "u1" }]
            }"#,
        );
        let status = source.fetch(&Identity::new("u1")).await.unwrap();
        assert!(!status.has_affiliation);
        assert!(!status.has_references);
        assert!(!status.onboarding_completed());
    }

    #[tokio::test]
    async fn test_missing_application_is_an_error() {
        let source = source("{}");
        let err = source.fetch(&Identity::new("ghost")).await.unwrap_err();
        assert_eq!(err, StatusError::NoApplication("ghost".into()));
    }

    #[tokio::test]
    async fn test_payment_check_policies() {
        let json = r#"{
            "type_a_applications": [{ "id": "a", "identity_id": "u1", "status": "approved" }],
            "subscriptions": [{ "identity_id": "u1", "active": false }]
        }"#;
        let assumed = source(json).fetch(&Identity::new("u1")).await.unwrap();
        assert!(assumed.paid);

        let checked = source(json)
            .with_payment_check(PaymentCheck::Subscription)
            .fetch(&Identity::new("u1"))
            .await
            .unwrap();
        assert!(!checked.paid);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let store = Arc::new(MemoryRecordStore::new(Fixture::default()));
        store.fail_with("timeout");
        let source = StatusSource::new(store);
        let err = source.fetch(&Identity::new("u1")).await.unwrap_err();
        assert!(matches!(err, StatusError::Backend(BackendError::Unavailable(_))));
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!(
            "Approved".parse::<ApplicationStatus>(),
            Ok(ApplicationStatus::Approved)
        );
        assert!("maybe".parse::<ApplicationStatus>().is_err());
        assert_eq!(
            "subscription".parse::<PaymentCheck>(),
            Ok(PaymentCheck::Subscription)
        );
        assert_eq!(PaymentCheck::AssumePaid.to_string(), "assume-paid");
    }
}
