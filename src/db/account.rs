//! Account model for logingate.
//!
//! An [`Account`] is shared between the storage workers and the
//! simulation thread, so every mutable field lives behind one mutex owned
//! by the account itself. Callers never see the lock; each method takes
//! it for exactly one read or one update.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::validation::validate_email;
use crate::auth::{PasswordError, PasswordHasher, ValidationError};
use crate::datetime;

/// Mutable part of an account.
#[derive(Debug, Clone)]
struct AccountState {
    password_hash: String,
    last_address: Option<IpAddr>,
    email: Option<String>,
    logged_in: bool,
    last_login: DateTime<Utc>,
}

/// Consistent copy of every field of an account, taken under one lock.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    /// Stable identifier.
    pub id: Uuid,
    /// Player name at the last observed login.
    pub username: String,
    /// Opaque credential hash.
    pub password_hash: String,
    /// Last address used to authenticate.
    pub last_address: Option<IpAddr>,
    /// Last login time.
    pub last_login: DateTime<Utc>,
    /// Optional contact address.
    pub email: Option<String>,
    /// Whether a session is currently active.
    pub logged_in: bool,
}

impl fmt::Debug for AccountSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSnapshot")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("last_address", &self.last_address)
            .field("last_login", &self.last_login)
            .field("email", &self.email)
            .field("logged_in", &self.logged_in)
            .finish_non_exhaustive()
    }
}

/// Account entity for one player identity.
pub struct Account {
    id: Uuid,
    username: String,
    state: Mutex<AccountState>,
}

/// Treat an empty contact address as absent.
fn normalize_email(email: Option<String>) -> Option<String> {
    email.filter(|e| !e.is_empty())
}

impl Account {
    /// Create a fresh account for a newly registering player.
    ///
    /// `password_hash` must already be the hasher's output. The last login
    /// is set to now and no session is active.
    pub fn new(
        id: Uuid,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        last_address: Option<IpAddr>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            state: Mutex::new(AccountState {
                password_hash: password_hash.into(),
                last_address,
                email: None,
                logged_in: false,
                last_login: datetime::now(),
            }),
        }
    }

    /// Rebuild an account from persisted fields.
    ///
    /// The session flag is always reset: a stored session means nothing
    /// after a restart.
    pub fn restore(
        id: Uuid,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        last_address: Option<IpAddr>,
        last_login: DateTime<Utc>,
        email: Option<String>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            state: Mutex::new(AccountState {
                password_hash: password_hash.into(),
                last_address,
                email: normalize_email(email),
                logged_in: false,
                last_login,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, AccountState> {
        // Every critical section is a plain assignment, so the data is
        // consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stable identifier of this account.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Player name at the last observed login.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Check a plaintext password against the stored hash.
    ///
    /// Returns `Ok(false)` for a wrong password. Errors mean the hash could
    /// not be checked at all and must not be reported as a wrong password.
    pub fn check_password(
        &self,
        hasher: &dyn PasswordHasher,
        plaintext: &str,
    ) -> Result<bool, PasswordError> {
        // Verification is slow; do not hold the lock while it runs.
        let stored = self.state().password_hash.clone();
        hasher.verify(&stored, plaintext)
    }

    /// Replace the stored credential hash.
    pub fn set_password_hash(&self, password_hash: impl Into<String>) {
        self.state().password_hash = password_hash.into();
    }

    pub(crate) fn password_hash(&self) -> String {
        self.state().password_hash.clone()
    }

    /// Last address used to authenticate.
    pub fn last_address(&self) -> Option<IpAddr> {
        self.state().last_address
    }

    /// Set the last address used to authenticate.
    pub fn set_last_address(&self, address: Option<IpAddr>) {
        self.state().last_address = address;
    }

    /// Contact address, never `Some("")`.
    pub fn email(&self) -> Option<String> {
        self.state().email.clone()
    }

    /// Set the contact address; an empty string clears it.
    ///
    /// A malformed address is rejected and the stored one is kept.
    pub fn set_email(&self, email: Option<String>) -> Result<(), ValidationError> {
        let email = normalize_email(email);
        if let Some(e) = &email {
            validate_email(e)?;
        }
        self.state().email = email;
        Ok(())
    }

    /// Last login time.
    pub fn last_login(&self) -> DateTime<Utc> {
        self.state().last_login
    }

    /// Whether a session is currently active for this account.
    pub fn is_logged_in(&self) -> bool {
        self.state().logged_in
    }

    /// Set the session flag.
    ///
    /// Setting it to `true` refreshes the last login time in the same
    /// critical section. Setting it to `false` leaves the time untouched.
    pub fn set_logged_in(&self, logged_in: bool) {
        let mut state = self.state();
        if logged_in {
            state.last_login = datetime::now();
        }
        state.logged_in = logged_in;
    }

    /// Copy every field under a single lock acquisition.
    pub fn snapshot(&self) -> AccountSnapshot {
        let state = self.state();
        AccountSnapshot {
            id: self.id,
            username: self.username.clone(),
            password_hash: state.password_hash.clone(),
            last_address: state.last_address,
            last_login: state.last_login,
            email: state.email.clone(),
            logged_in: state.logged_in,
        }
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Account {}

impl Hash for Account {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("last_address", &state.last_address)
            .field("email", &state.email)
            .field("logged_in", &state.logged_in)
            .field("last_login", &state.last_login)
            .finish_non_exhaustive()
    }
}
