//! logingate - player authentication core for multiplayer game servers.
//!
//! Accounts, credential hashing, persistence and session state, with
//! blocking work kept off the main simulation thread.

pub mod admin;
pub mod auth;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod executor;
pub mod logging;

pub use admin::{AccountQuery, AdminError, AdminService, AltAccounts, LastLogin};
pub use auth::{
    Argon2Hasher, LegacySha256Hasher, LoginOutcome, PasswordError, PasswordHasher, SchemeHasher,
    SessionError, SessionRegistry, ValidationError,
};
pub use config::Config;
pub use db::{Account, AccountCodec, AccountSnapshot, AccountStore, Database, TimestampMode};
pub use error::{GateError, Result};
pub use executor::{contexts, MainQueue, Worker};
