//! Authentication infrastructure module
//!
//! This module validates the JWT bearer tokens that identify the caller.

mod jwt;

pub use jwt::{JwtClaims, JwtConfig, JwtService};
