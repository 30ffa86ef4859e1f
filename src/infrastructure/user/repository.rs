//! In-memory user repository implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::user::{NewUser, User, UserChanges, UserId, UserRepository};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct UserTable {
    users: HashMap<UserId, User>,
    /// Index for email -> user ID lookup
    email_index: HashMap<String, UserId>,
}

/// In-memory implementation of UserRepository
///
/// Both maps live behind one lock so the uniqueness check and the insert
/// happen atomically.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    table: Arc<RwLock<UserTable>>,
}

impl InMemoryUserRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let table = self.table.read().await;
        Ok(table.users.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let table = self.table.read().await;

        Ok(table
            .email_index
            .get(email)
            .and_then(|id| table.users.get(id))
            .cloned())
    }

    async fn create(&self, fields: NewUser) -> Result<User, DomainError> {
        let mut table = self.table.write().await;

        if table.email_index.contains_key(&fields.email) {
            return Err(DomainError::duplicate_email(fields.email));
        }

        let user = User::new(UserId::generate(), fields);

        table.email_index.insert(user.email().to_string(), user.id());
        table.users.insert(user.id(), user.clone());

        Ok(user)
    }

    async fn update(&self, id: &UserId, changes: UserChanges) -> Result<User, DomainError> {
        let mut table = self.table.write().await;
        let UserTable { users, email_index } = &mut *table;

        let user = users
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", id)))?;

        if let Some(expected) = &changes.expected_password_hash {
            if user.password_hash() != expected {
                return Err(DomainError::InvalidCredentials);
            }
        }

        // Move the index entry when the email changes
        if let Some(email) = changes.email.as_deref().filter(|email| *email != user.email()) {
            if email_index.contains_key(email) {
                return Err(DomainError::duplicate_email(email));
            }

            email_index.remove(user.email());
            email_index.insert(email.to_string(), *id);
        }

        changes.apply_to(user);

        Ok(user.clone())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let table = self.table.read().await;
        Ok(table.users.len())
    }
}
