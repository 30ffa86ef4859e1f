//! Application state for shared services

use std::sync::Arc;

use crate::domain::user::UserRepository;
use crate::domain::{AccountView, DomainError, UserId};
use crate::infrastructure::auth::JwtService;
use crate::infrastructure::user::{
    AccountService, CreateAccountRequest, PasswordHasher, UpdateAccountRequest,
};

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub account_service: Arc<dyn AccountServiceTrait>,
    pub jwt_service: Arc<JwtService>,
}

/// Trait for account service operations
#[async_trait::async_trait]
pub trait AccountServiceTrait: Send + Sync {
    async fn create(&self, request: CreateAccountRequest) -> Result<AccountView, DomainError>;
    async fn update(
        &self,
        id: &UserId,
        request: UpdateAccountRequest,
    ) -> Result<AccountView, DomainError>;
    async fn count(&self) -> Result<usize, DomainError>;
}

#[async_trait::async_trait]
impl<R, H> AccountServiceTrait for AccountService<R, H>
where
    R: UserRepository + 'static,
    H: PasswordHasher + 'static,
{
    async fn create(&self, request: CreateAccountRequest) -> Result<AccountView, DomainError> {
        AccountService::create(self, request).await
    }

    async fn update(
        &self,
        id: &UserId,
        request: UpdateAccountRequest,
    ) -> Result<AccountView, DomainError> {
        AccountService::update(self, id, request).await
    }

    async fn count(&self) -> Result<usize, DomainError> {
        AccountService::count(self).await
    }
}

impl AppState {
    pub fn new(account_service: Arc<dyn AccountServiceTrait>, jwt_service: Arc<JwtService>) -> Self {
        Self {
            account_service,
            jwt_service,
        }
    }
}
