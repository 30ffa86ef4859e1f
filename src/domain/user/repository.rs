//! User repository trait

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::entity::{NewUser, User, UserChanges, UserId};
use crate::domain::DomainError;

/// Repository trait for user storage
///
/// Implementations must enforce email uniqueness themselves: `create` and
/// `update` fail with `DomainError::DuplicateEmail` when another record
/// already holds the email, even if the caller checked beforehand.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Get a user by their ID
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    /// Get a user by their email address
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    /// Create a new user; the store assigns the ID
    async fn create(&self, user: NewUser) -> Result<User, DomainError>;

    /// Apply `changes` to the stored user as one atomic step
    ///
    /// Fails with `NotFound` for an unknown id, and with
    /// `InvalidCredentials` when `expected_password_hash` no longer matches.
    async fn update(&self, id: &UserId, changes: UserChanges) -> Result<User, DomainError>;

    /// Count stored users
    async fn count(&self) -> Result<usize, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User::new(
            UserId::generate(),
            NewUser {
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                password_hash: "hash".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_mock_find_by_email() {
        let user = sample_user();
        let expected_id = user.id();

        let mut mock = MockUserRepository::new();
        mock.expect_find_by_email()
            .withf(|email| email == "ana@example.com")
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let found = mock.find_by_email("ana@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id()), Some(expected_id));
    }

    #[tokio::test]
    async fn test_mock_storage_failure() {
        let mut mock = MockUserRepository::new();
        mock.expect_count()
            .returning(|| Err(DomainError::storage("connection refused")));

        let result = mock.count().await;
        assert!(matches!(result, Err(DomainError::Storage { .. })));
    }
}
