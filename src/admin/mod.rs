//! Administration module for logingate.
//!
//! Operator commands name an account either by identifier or by player
//! name. The argument is classified once into an [`AccountQuery`] and the
//! store is then called with the matching lookup.

mod account;

pub use account::{
    generate_password, AdminService, AltAccounts, LastLogin, GENERATED_PASSWORD_LENGTH,
};

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::auth::validation::is_valid_player_name;
use crate::GateError;

/// Admin-related errors.
#[derive(Error, Debug)]
pub enum AdminError {
    /// The argument is neither an identifier nor a valid player name.
    #[error("invalid account: {0}")]
    InvalidAccount(String),

    /// General logingate error.
    #[error(transparent)]
    Gate(#[from] GateError),
}

/// An account reference given by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccountQuery {
    /// Stable identifier.
    ByIdentifier(Uuid),
    /// Exact player name.
    ByName(String),
}

impl AccountQuery {
    /// Classify a command argument.
    ///
    /// A UUID becomes [`AccountQuery::ByIdentifier`], a valid player name
    /// becomes [`AccountQuery::ByName`].
    pub fn classify(input: &str) -> Result<Self, AdminError> {
        let input = input.trim();
        if let Ok(id) = Uuid::parse_str(input) {
            return Ok(AccountQuery::ByIdentifier(id));
        }
        if is_valid_player_name(input) {
            return Ok(AccountQuery::ByName(input.to_string()));
        }
        Err(AdminError::InvalidAccount(input.to_string()))
    }
}

impl fmt::Display for AccountQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountQuery::ByIdentifier(id) => write!(f, "{id}"),
            AccountQuery::ByName(name) => f.write_str(name),
        }
    }
}
