//! Authentication module for logingate.
//!
//! This module provides credential hashing, input validation and
//! session state.

pub mod password;
mod session;
pub mod validation;

pub use password::{Argon2Hasher, LegacySha256Hasher, PasswordError, PasswordHasher, SchemeHasher};
pub use session::{LimitResult, LoginLimiter, LoginOutcome, SessionError, SessionRegistry};
pub use validation::ValidationError;
