//! User domain
//!
//! This module provides domain types and traits for user accounts,
//! including the user entity, payload validation, and the repository trait.

mod entity;
mod repository;
mod validation;

pub use entity::{AccountView, NewUser, User, UserChanges, UserId};
pub use repository::UserRepository;
pub use validation::{
    validate_email, validate_name, validate_password, validate_password_change,
    UserValidationError, MIN_PASSWORD_LENGTH,
};

#[cfg(test)]
pub use repository::MockUserRepository;
