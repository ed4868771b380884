//! In-memory user directory used for sign-in and as the default profile source.
use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::json;

use crate::services::authorize::context::{Claim, ROLE_CLAIM_TYPE, Subject};
use crate::services::authorize::profile::{ProfileError, ProfileResolver};

#[derive(Debug, Clone)]
pub struct TestUser {
    pub subject_id: String,
    pub username: String,
    password: String,
    pub claims: Vec<Claim>,
}

impl TestUser {
    pub fn new(
        subject_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        claims: Vec<Claim>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            username: username.into(),
            password: password.into(),
            claims,
        }
    }

    pub fn display_name(&self) -> &str {
        self.claims
            .iter()
            .find(|c| c.claim_type == "name")
            .map(|c| c.value.as_str())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestUserStore {
    users: Vec<TestUser>,
}

impl TestUserStore {
    pub fn new(users: Vec<TestUser>) -> Self {
        Self { users }
    }

    /// alice holds the `mvc.par` role; bob does not.
    pub fn seeded() -> Self {
        let address = json!({
            "street_address": "One Hacker Way",
            "locality": "Heidelberg",
            "postal_code": "69118",
            "country": "Germany"
        })
        .to_string();

        Self::new(vec![
            TestUser::new(
                "1",
                "alice",
                "alice",
                vec![
                    Claim::new(ROLE_CLAIM_TYPE, "mvc.par_BasicAccess"),
                    Claim::new("name", "Alice User"),
                    Claim::new("given_name", "Alice"),
                    Claim::new("family_name", "User"),
                    Claim::new("email", "alice.user@domain.com"),
                    Claim::new("email_verified", "true"),
                    Claim::new("address", address.clone()),
                ],
            ),
            TestUser::new(
                "2",
                "bob",
                "bob",
                vec![
                    Claim::new("name", "Bob User"),
                    Claim::new("given_name", "Bob"),
                    Claim::new("family_name", "User"),
                    Claim::new("email", "bob.user@domain.com"),
                    Claim::new("email_verified", "true"),
                    Claim::new("address", address),
                ],
            ),
        ])
    }

    pub fn find_by_subject(&self, subject_id: &str) -> Option<&TestUser> {
        self.users.iter().find(|u| u.subject_id == subject_id)
    }

    /// Returns the user when both the username and the password match.
    pub fn validate_credentials(&self, username: &str, password: &str) -> Option<&TestUser> {
        self.users
            .iter()
            .find(|u| u.username == username)
            .filter(|u| u.password == password)
    }
}

#[async_trait]
impl ProfileResolver for TestUserStore {
    async fn resolve(
        &self,
        subject: &Subject,
        requested_claim_types: &BTreeSet<String>,
    ) -> Result<Vec<Claim>, ProfileError> {
        let Some(user) = self.find_by_subject(subject.id()) else {
            tracing::debug!(subject_id = %subject.id(), "no user for subject, issuing no claims");
            return Ok(Vec::new());
        };

        Ok(user
            .claims
            .iter()
            .filter(|c| requested_claim_types.contains(&c.claim_type))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn role_only() -> BTreeSet<String> {
        BTreeSet::from(["role".to_string()])
    }

    #[test]
    fn credentials_must_match_exactly() {
        let store = TestUserStore::seeded();

        assert_eq!(
            store.validate_credentials("alice", "alice").map(|u| u.subject_id.as_str()),
            Some("1")
        );
        assert!(store.validate_credentials("alice", "bob").is_none());
        assert!(store.validate_credentials("carol", "carol").is_none());
    }

    #[test]
    fn display_name_prefers_the_name_claim() {
        let store = TestUserStore::seeded();
        assert_eq!(store.find_by_subject("1").unwrap().display_name(), "Alice User");

        let bare = TestUser::new("9", "nobody", "pw", Vec::new());
        assert_eq!(bare.display_name(), "nobody");
    }

    #[tokio::test]
    async fn resolve_filters_to_requested_types() {
        let store = TestUserStore::seeded();
        let subject = Subject::new("1", Utc::now(), "sid");

        let claims = store.resolve(&subject, &role_only()).await.unwrap();

        assert_eq!(claims, vec![Claim::new("role", "mvc.par_BasicAccess")]);
    }

    #[tokio::test]
    async fn resolve_returns_nothing_for_users_without_the_type() {
        let store = TestUserStore::seeded();
        let bob = Subject::new("2", Utc::now(), "sid");

        assert!(store.resolve(&bob, &role_only()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolve_returns_nothing_for_unknown_subjects() {
        let store = TestUserStore::seeded();
        let ghost = Subject::new("404", Utc::now(), "sid");

        assert!(store.resolve(&ghost, &role_only()).await.unwrap().is_empty());
    }
}
