//! Account service: creation and update of user accounts

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::user::{
    validate_email, validate_name, validate_password, validate_password_change, AccountView,
    NewUser, UserChanges, UserId, UserRepository, UserValidationError,
};
use crate::domain::DomainError;

use super::password::PasswordHasher;

/// Payload for creating an account
///
/// Every field is optional at the type level so that a missing or
/// mistyped field is reported as a validation error instead of a body
/// parsing failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "RawCreateAccountRequest")]
pub struct CreateAccountRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// First field whose JSON value was an array or object
    #[serde(skip)]
    non_text_field: Option<&'static str>,
}

#[derive(Deserialize)]
struct RawCreateAccountRequest {
    name: Option<Value>,
    email: Option<Value>,
    password: Option<Value>,
}

impl From<RawCreateAccountRequest> for CreateAccountRequest {
    fn from(raw: RawCreateAccountRequest) -> Self {
        let mut non_text_field = None;

        Self {
            name: text_field("name", raw.name, &mut non_text_field),
            email: text_field("email", raw.email, &mut non_text_field),
            password: text_field("password", raw.password, &mut non_text_field),
            non_text_field,
        }
    }
}

/// Fields of a create payload that passed validation
#[derive(Debug)]
struct CheckedAccount {
    name: String,
    email: String,
    password: String,
}

impl CreateAccountRequest {
    fn validate(self) -> Result<CheckedAccount, UserValidationError> {
        if let Some(field) = self.non_text_field {
            return Err(UserValidationError::NotText(field));
        }

        let name = self.name.ok_or(UserValidationError::MissingField("name"))?;
        validate_name(&name)?;

        let email = self.email.ok_or(UserValidationError::MissingField("email"))?;
        validate_email(&email)?;

        let password = self
            .password
            .ok_or(UserValidationError::MissingField("password"))?;
        validate_password("password", &password)?;

        Ok(CheckedAccount {
            name,
            email,
            password,
        })
    }
}

/// Payload for updating the caller's own account
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "RawUpdateAccountRequest")]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub old_password: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    #[serde(skip)]
    non_text_field: Option<&'static str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUpdateAccountRequest {
    name: Option<Value>,
    email: Option<Value>,
    old_password: Option<Value>,
    password: Option<Value>,
    confirm_password: Option<Value>,
}

impl From<RawUpdateAccountRequest> for UpdateAccountRequest {
    fn from(raw: RawUpdateAccountRequest) -> Self {
        let mut non_text_field = None;

        Self {
            name: text_field("name", raw.name, &mut non_text_field),
            email: text_field("email", raw.email, &mut non_text_field),
            old_password: text_field("oldPassword", raw.old_password, &mut non_text_field),
            password: text_field("password", raw.password, &mut non_text_field),
            confirm_password: text_field(
                "confirmPassword",
                raw.confirm_password,
                &mut non_text_field,
            ),
            non_text_field,
        }
    }
}

impl UpdateAccountRequest {
    fn validate(&self) -> Result<(), UserValidationError> {
        if let Some(field) = self.non_text_field {
            return Err(UserValidationError::NotText(field));
        }

        if let Some(name) = &self.name {
            validate_name(name)?;
        }

        if let Some(email) = &self.email {
            validate_email(email)?;
        }

        validate_password_change(
            self.old_password.as_deref(),
            self.password.as_deref(),
            self.confirm_password.as_deref(),
        )
    }
}

/// Read a loosely typed JSON field as text
///
/// Numbers and booleans are taken as their text form. Arrays and objects
/// yield `None` and record the first offending field in `non_text`.
fn text_field(
    field: &'static str,
    value: Option<Value>,
    non_text: &mut Option<&'static str>,
) -> Option<String> {
    match value? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => {
            non_text.get_or_insert(field);
            None
        }
    }
}

/// Account service for creating and updating users
#[derive(Debug)]
pub struct AccountService<R: UserRepository, H: PasswordHasher> {
    repository: Arc<R>,
    hasher: Arc<H>,
}

impl<R: UserRepository, H: PasswordHasher> AccountService<R, H> {
    /// Create a new account service
    pub fn new(repository: Arc<R>, hasher: Arc<H>) -> Self {
        Self { repository, hasher }
    }

    /// Create a new account
    ///
    /// Fails with a validation error before touching the store, and with
    /// `DuplicateEmail` when the email is already registered.
    pub async fn create(&self, request: CreateAccountRequest) -> Result<AccountView, DomainError> {
        let account = request.validate()?;

        if self.repository.find_by_email(&account.email).await?.is_some() {
            debug!("Rejected account creation: email already registered");
            return Err(DomainError::duplicate_email(account.email));
        }

        let password_hash = self.hasher.hash(&account.password)?;

        let user = self
            .repository
            .create(NewUser {
                name: account.name,
                email: account.email,
                password_hash,
            })
            .await?;

        info!(user_id = %user.id(), "Account created");

        Ok(AccountView::from(&user))
    }

    /// Update the account identified by `id`
    ///
    /// All checks run before the single store write, so a rejected update
    /// leaves the record untouched.
    pub async fn update(
        &self,
        id: &UserId,
        request: UpdateAccountRequest,
    ) -> Result<AccountView, DomainError> {
        request.validate()?;

        let user = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", id)))?;

        let UpdateAccountRequest {
            name,
            email,
            old_password,
            password,
            ..
        } = request;

        if let Some(email) = email.as_deref().filter(|email| *email != user.email()) {
            let holder = self.repository.find_by_email(email).await?;

            if holder.is_some_and(|holder| holder.id() != user.id()) {
                debug!(user_id = %id, "Rejected account update: email already registered");
                return Err(DomainError::duplicate_email(email));
            }
        }

        let expected_password_hash = match old_password.as_deref() {
            Some(old_password) => {
                if !self.hasher.verify(old_password, user.password_hash()) {
                    warn!(user_id = %id, "Rejected account update: old password does not match");
                    return Err(DomainError::InvalidCredentials);
                }

                Some(user.password_hash().to_string())
            }
            // TODO: decide whether a password change must always present oldPassword
            None if password.is_some() => {
                warn!(user_id = %id, "Password changed without oldPassword");
                None
            }
            None => None,
        };

        let password_hash = password
            .as_deref()
            .map(|password| self.hasher.hash(password))
            .transpose()?;

        // The store applies the patch atomically and re-checks the verified hash
        let user = self
            .repository
            .update(
                id,
                UserChanges {
                    name,
                    email,
                    password_hash,
                    expected_password_hash,
                },
            )
            .await
            .inspect_err(|err| {
                if matches!(err, DomainError::InvalidCredentials) {
                    warn!(user_id = %id, "Rejected account update: password changed concurrently");
                }
            })?;

        info!(user_id = %user.id(), "Account updated");

        Ok(AccountView::from(&user))
    }

    /// Count stored accounts; used as a store liveness check
    pub async fn count(&self) -> Result<usize, DomainError> {
        self.repository.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::{MockUserRepository, User};
    use crate::infrastructure::user::password::Argon2Hasher;
    use crate::infrastructure::user::repository::InMemoryUserRepository;

    fn create_service() -> (
        AccountService<InMemoryUserRepository, Argon2Hasher>,
        Arc<InMemoryUserRepository>,
    ) {
        let repository = Arc::new(InMemoryUserRepository::new());
        let hasher = Arc::new(Argon2Hasher::with_params(8, 1, 1).unwrap());
        (AccountService::new(repository.clone(), hasher), repository)
    }

    fn create_request(name: &str, email: &str, password: &str) -> CreateAccountRequest {
        CreateAccountRequest {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            ..Default::default()
        }
    }

    fn assert_validation_error(result: Result<AccountView, DomainError>, expected_field: &str) {
        match result {
            Err(DomainError::Validation { field, .. }) => {
                assert_eq!(field.as_deref(), Some(expected_field))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_account_round_trip() {
        let (service, repository) = create_service();

        let view = service
            .create(create_request("A", "a@x.com", "secret1"))
            .await
            .unwrap();

        assert_eq!(view.name, "A");
        assert_eq!(view.email, "a@x.com");

        let stored = repository.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(stored.id(), view.id);
        assert_eq!(stored.name(), "A");
        assert_ne!(stored.password_hash(), "secret1");
    }

    #[tokio::test]
    async fn test_create_duplicate_email() {
        let (service, repository) = create_service();

        service
            .create(create_request("A", "a@x.com", "secret1"))
            .await
            .unwrap();

        let result = service
            .create(create_request("Other", "a@x.com", "secret2"))
            .await;

        assert!(matches!(result, Err(DomainError::DuplicateEmail { .. })));
        assert_eq!(repository.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_validation_never_touches_store() {
        // A mock without expectations panics on any call
        let service = AccountService::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(Argon2Hasher::with_params(8, 1, 1).unwrap()),
        );

        let cases = [
            (CreateAccountRequest::default(), "name"),
            (create_request("", "a@x.com", "secret1"), "name"),
            (
                CreateAccountRequest {
                    email: None,
                    ..create_request("A", "a@x.com", "secret1")
                },
                "email",
            ),
            (create_request("A", "not-an-email", "secret1"), "email"),
            (create_request("A", "a@x.com", "12345"), "password"),
            (
                CreateAccountRequest {
                    password: None,
                    ..create_request("A", "a@x.com", "secret1")
                },
                "password",
            ),
        ];

        for (request, field) in cases {
            assert_validation_error(service.create(request).await, field);
        }
    }

    #[tokio::test]
    async fn test_update_validation_never_touches_store() {
        let service = AccountService::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(Argon2Hasher::with_params(8, 1, 1).unwrap()),
        );
        let id = UserId::generate();

        let mismatch = UpdateAccountRequest {
            password: Some("newpass1".to_string()),
            confirm_password: Some("different".to_string()),
            ..Default::default()
        };
        assert_validation_error(service.update(&id, mismatch).await, "confirmPassword");

        let old_without_new = UpdateAccountRequest {
            old_password: Some("secret1".to_string()),
            ..Default::default()
        };
        assert_validation_error(service.update(&id, old_without_new).await, "password");

        let bad_email = UpdateAccountRequest {
            email: Some("nope".to_string()),
            ..Default::default()
        };
        assert_validation_error(service.update(&id, bad_email).await, "email");
    }

    #[tokio::test]
    async fn test_update_name_only_keeps_password_hash() {
        let (service, repository) = create_service();
        let view = service
            .create(create_request("A", "a@x.com", "secret1"))
            .await
            .unwrap();
        let before = repository.find_by_id(&view.id).await.unwrap().unwrap();

        let updated = service
            .update(
                &view.id,
                UpdateAccountRequest {
                    name: Some("B".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "B");
        assert_eq!(updated.email, "a@x.com");

        let after = repository.find_by_id(&view.id).await.unwrap().unwrap();
        assert_eq!(after.password_hash(), before.password_hash());
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let (service, _) = create_service();

        let result = service
            .update(&UserId::generate(), UpdateAccountRequest::default())
            .await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_email_taken_by_other_user() {
        let (service, _) = create_service();
        service
            .create(create_request("A", "a@x.com", "secret1"))
            .await
            .unwrap();
        let other = service
            .create(create_request("B", "b@x.com", "secret1"))
            .await
            .unwrap();

        let result = service
            .update(
                &other.id,
                UpdateAccountRequest {
                    email: Some("a@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(DomainError::DuplicateEmail { .. })));
    }

    #[tokio::test]
    async fn test_update_same_email_is_not_a_conflict() {
        let (service, _) = create_service();
        let view = service
            .create(create_request("A", "a@x.com", "secret1"))
            .await
            .unwrap();

        let updated = service
            .update(
                &view.id,
                UpdateAccountRequest {
                    email: Some("a@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_update_email() {
        let (service, repository) = create_service();
        let view = service
            .create(create_request("A", "a@x.com", "secret1"))
            .await
            .unwrap();

        let updated = service
            .update(
                &view.id,
                UpdateAccountRequest {
                    email: Some("new@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.email, "new@x.com");
        assert!(repository.find_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_wrong_old_password_changes_nothing() {
        let (service, repository) = create_service();
        let view = service
            .create(create_request("A", "a@x.com", "secret1"))
            .await
            .unwrap();
        let before = repository.find_by_id(&view.id).await.unwrap().unwrap();

        let result = service
            .update(
                &view.id,
                UpdateAccountRequest {
                    name: Some("B".to_string()),
                    email: Some("b@x.com".to_string()),
                    old_password: Some("wrong-secret".to_string()),
                    password: Some("newpass1".to_string()),
                    confirm_password: Some("newpass1".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(DomainError::InvalidCredentials)));

        let after = repository.find_by_id(&view.id).await.unwrap().unwrap();
        assert_eq!(after.name(), "A");
        assert_eq!(after.email(), "a@x.com");
        assert_eq!(after.password_hash(), before.password_hash());
    }

    #[tokio::test]
    async fn test_update_password_with_old_password() {
        let (service, repository) = create_service();
        let hasher = Argon2Hasher::with_params(8, 1, 1).unwrap();
        let view = service
            .create(create_request("A", "a@x.com", "secret1"))
            .await
            .unwrap();

        service
            .update(
                &view.id,
                UpdateAccountRequest {
                    old_password: Some("secret1".to_string()),
                    password: Some("newpass1".to_string()),
                    confirm_password: Some("newpass1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = repository.find_by_id(&view.id).await.unwrap().unwrap();
        assert!(hasher.verify("newpass1", stored.password_hash()));
        assert!(!hasher.verify("secret1", stored.password_hash()));
    }

    #[tokio::test]
    async fn test_update_password_without_old_password_is_accepted() {
        let (service, repository) = create_service();
        let hasher = Argon2Hasher::with_params(8, 1, 1).unwrap();
        let view = service
            .create(create_request("A", "a@x.com", "secret1"))
            .await
            .unwrap();

        service
            .update(
                &view.id,
                UpdateAccountRequest {
                    password: Some("newpass1".to_string()),
                    confirm_password: Some("newpass1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = repository.find_by_id(&view.id).await.unwrap().unwrap();
        assert!(hasher.verify("newpass1", stored.password_hash()));
    }

    #[tokio::test]
    async fn test_update_request_deserializes_camel_case() {
        let request: UpdateAccountRequest = serde_json::from_str(
            r#"{"oldPassword":"secret1","password":"newpass1","confirmPassword":"newpass1"}"#,
        )
        .unwrap();

        assert_eq!(request.old_password.as_deref(), Some("secret1"));
        assert_eq!(request.confirm_password.as_deref(), Some("newpass1"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_coerces_scalars_to_text() {
        let request: CreateAccountRequest =
            serde_json::from_str(r#"{"name":"A","email":"a@x.com","password":123456}"#).unwrap();

        assert_eq!(request.password.as_deref(), Some("123456"));
        assert!(request.validate().is_ok());
    }

    #[tokio::test]
    async fn test_create_rejects_array_field() {
        let (service, repository) = create_service();
        let request: CreateAccountRequest =
            serde_json::from_str(r#"{"name":["A"],"email":"a@x.com","password":"secret1"}"#)
                .unwrap();

        assert_validation_error(service.create(request).await, "name");
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[test]
    fn test_update_rejects_object_field() {
        let request: UpdateAccountRequest =
            serde_json::from_str(r#"{"oldPassword":{"v":"x"},"password":"newpass1"}"#).unwrap();

        assert!(matches!(
            request.validate(),
            Err(UserValidationError::NotText("oldPassword"))
        ));
    }

    /// Store whose reads rendezvous before either caller writes, and whose
    /// name-only writes land late
    struct InterleavedRepository {
        inner: InMemoryUserRepository,
        reads: tokio::sync::Barrier,
    }

    #[async_trait::async_trait]
    impl UserRepository for InterleavedRepository {
        async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
            let user = self.inner.find_by_id(id).await?;
            self.reads.wait().await;
            Ok(user)
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
            self.inner.find_by_email(email).await
        }

        async fn create(&self, user: NewUser) -> Result<User, DomainError> {
            self.inner.create(user).await
        }

        async fn update(&self, id: &UserId, changes: UserChanges) -> Result<User, DomainError> {
            if changes.password_hash.is_none() {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            self.inner.update(id, changes).await
        }

        async fn count(&self) -> Result<usize, DomainError> {
            self.inner.count().await
        }
    }

    #[tokio::test]
    async fn test_overlapping_updates_keep_both_changes() {
        let inner = InMemoryUserRepository::new();
        let hasher = Arc::new(Argon2Hasher::with_params(8, 1, 1).unwrap());
        let seeded = inner
            .create(NewUser {
                name: "A".to_string(),
                email: "a@x.com".to_string(),
                password_hash: hasher.hash("secret1").unwrap(),
            })
            .await
            .unwrap();
        let repository = Arc::new(InterleavedRepository {
            inner,
            reads: tokio::sync::Barrier::new(2),
        });
        let service = AccountService::new(repository.clone(), hasher.clone());
        let id = seeded.id();

        let (renamed, repassworded) = tokio::join!(
            service.update(
                &id,
                UpdateAccountRequest {
                    name: Some("B".to_string()),
                    ..Default::default()
                },
            ),
            service.update(
                &id,
                UpdateAccountRequest {
                    old_password: Some("secret1".to_string()),
                    password: Some("newpass1".to_string()),
                    confirm_password: Some("newpass1".to_string()),
                    ..Default::default()
                },
            ),
        );
        renamed.unwrap();
        repassworded.unwrap();

        let stored = repository.inner.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.name(), "B");
        assert!(hasher.verify("newpass1", stored.password_hash()));
        assert!(!hasher.verify("secret1", stored.password_hash()));
    }
}
