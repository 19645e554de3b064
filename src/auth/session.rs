//! Session state for logingate.
//!
//! [`SessionRegistry`] is the authority on which identities are currently
//! authenticated. Gameplay code asks it on every protected action, so its
//! read path takes a shared lock only.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::password::{PasswordError, PasswordHasher};
use crate::config::SessionConfig;
use crate::db::Account;

/// Session-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Identity is locked due to too many failed attempts.
    #[error("account locked for {0} seconds")]
    AccountLocked(u64),

    /// No account is attached for this identity.
    #[error("identity is not online")]
    NotOnline,

    /// The stored hash could not be checked.
    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Result of a login attempt rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitResult {
    /// Login attempt is allowed.
    Allowed,
    /// Identity is locked for the specified duration.
    Locked(Duration),
}

/// Failed and in-flight attempts for one identity.
#[derive(Debug, Default)]
struct Attempts {
    failures: Vec<Instant>,
    in_flight: u32,
}

/// Login attempt rate limiter.
///
/// Tracks failed login attempts per identity and enforces lockout
/// after too many failures. An attempt whose password is still being
/// checked counts against the limit until it is settled.
#[derive(Debug)]
pub struct LoginLimiter {
    /// Attempts per identity.
    attempts: HashMap<Uuid, Attempts>,
    /// Maximum attempts before lockout, at least 1.
    max_attempts: u32,
    /// Lockout duration, also the window failures are counted in.
    lockout: Duration,
}

impl LoginLimiter {
    /// Create a limiter from the `[session]` configuration section.
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_limits(config.max_attempts, Duration::from_secs(config.lockout_secs))
    }

    /// Create a limiter with explicit limits.
    ///
    /// A `max_attempts` of 0 is treated as 1.
    pub fn with_limits(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            attempts: HashMap::new(),
            max_attempts: max_attempts.max(1),
            lockout,
        }
    }

    /// Check if a login attempt is allowed for the given identity.
    pub fn check(&mut self, id: Uuid) -> LimitResult {
        let now = Instant::now();
        let (max_attempts, lockout) = (self.max_attempts as usize, self.lockout);
        let Some(entry) = self.attempts.get_mut(&id) else {
            return LimitResult::Allowed;
        };

        entry.failures.retain(|t| now.duration_since(*t) < lockout);

        if entry.failures.len() + entry.in_flight as usize >= max_attempts {
            let remaining = match entry.failures.first() {
                Some(oldest) => lockout.saturating_sub(now.duration_since(*oldest)),
                None => lockout,
            };
            return LimitResult::Locked(remaining);
        }

        LimitResult::Allowed
    }

    /// Check and, if allowed, reserve an attempt in one step.
    ///
    /// Every allowed reservation must be settled with
    /// [`record_failure`](Self::record_failure), [`clear`](Self::clear) or
    /// [`release`](Self::release).
    pub fn check_and_reserve(&mut self, id: Uuid) -> LimitResult {
        let result = self.check(id);
        if result == LimitResult::Allowed {
            self.attempts.entry(id).or_default().in_flight += 1;
        }
        result
    }

    /// Record a failed login attempt, settling one reservation if held.
    pub fn record_failure(&mut self, id: Uuid) {
        let now = Instant::now();
        let lockout = self.lockout;
        let entry = self.attempts.entry(id).or_default();

        entry.in_flight = entry.in_flight.saturating_sub(1);
        entry.failures.retain(|t| now.duration_since(*t) < lockout);
        entry.failures.push(now);

        debug!(
            account_id = %id,
            attempt_count = entry.failures.len(),
            "Recorded failed login attempt"
        );
    }

    /// Settle a reservation without counting it as a failure.
    pub fn release(&mut self, id: Uuid) {
        if let Some(entry) = self.attempts.get_mut(&id) {
            entry.in_flight = entry.in_flight.saturating_sub(1);
            if entry.in_flight == 0 && entry.failures.is_empty() {
                self.attempts.remove(&id);
            }
        }
    }

    /// Clear failed attempts for an identity (call on successful login).
    ///
    /// Settles one reservation; other attempts still in flight keep theirs.
    pub fn clear(&mut self, id: Uuid) {
        if let Some(entry) = self.attempts.get_mut(&id) {
            entry.failures.clear();
        }
        self.release(id);
    }

    /// Get the number of failed attempts for an identity.
    pub fn attempt_count(&mut self, id: Uuid) -> usize {
        let now = Instant::now();
        let lockout = self.lockout;
        match self.attempts.get_mut(&id) {
            Some(entry) => {
                entry.failures.retain(|t| now.duration_since(*t) < lockout);
                entry.failures.len()
            }
            None => 0,
        }
    }

    /// Clean up expired entries to prevent memory growth.
    pub fn cleanup(&mut self) {
        let now = Instant::now();
        let lockout = self.lockout;
        self.attempts.retain(|_, entry| {
            entry.failures.retain(|t| now.duration_since(*t) < lockout);
            !entry.failures.is_empty() || entry.in_flight > 0
        });
    }
}

/// A successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// The authenticated account.
    pub account: Arc<Account>,
    /// The stored hash uses an older scheme and should be replaced with
    /// the password just verified.
    pub needs_rehash: bool,
}

/// Registry of accounts attached to the running server.
///
/// An account is attached when its player connects, and is authenticated
/// once [`SessionRegistry::login`] succeeds.
#[derive(Debug)]
pub struct SessionRegistry {
    online: RwLock<HashMap<Uuid, Arc<Account>>>,
    limiter: Mutex<LoginLimiter>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_limiter(LoginLimiter::new(config))
    }

    /// Create an empty registry using the given limiter.
    pub fn with_limiter(limiter: LoginLimiter) -> Self {
        Self {
            online: RwLock::new(HashMap::new()),
            limiter: Mutex::new(limiter),
        }
    }

    fn limiter(&self) -> MutexGuard<'_, LoginLimiter> {
        self.limiter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a loaded account, replacing any previous one for the same
    /// identity. The replaced account is returned with its session cleared.
    pub fn attach(&self, account: Arc<Account>) -> Option<Arc<Account>> {
        let id = account.id();
        let previous = self
            .online
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, account);

        if let Some(ref old) = previous {
            old.set_logged_in(false);
        }
        debug!(account_id = %id, "Account attached");
        previous
    }

    /// Detach an identity, clearing its session flag.
    pub fn detach(&self, id: Uuid) -> Option<Arc<Account>> {
        let account = self
            .online
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        if let Some(ref account) = account {
            account.set_logged_in(false);
            debug!(account_id = %id, "Account detached");
        }
        account
    }

    /// The attached account for an identity.
    pub fn get(&self, id: Uuid) -> Option<Arc<Account>> {
        self.online
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Whether an identity is attached and authenticated.
    pub fn is_authenticated(&self, id: Uuid) -> bool {
        self.get(id).is_some_and(|account| account.is_logged_in())
    }

    /// Number of authenticated identities.
    pub fn authenticated_count(&self) -> usize {
        self.online
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|account| account.is_logged_in())
            .count()
    }

    /// Authenticate an attached identity.
    ///
    /// Password verification is slow, so this belongs on a worker thread.
    /// On success the session flag is set, which also refreshes the last
    /// login time, and the address is recorded. Hash failures are returned
    /// as [`SessionError::Password`] and do not count as failed attempts.
    pub fn login(
        &self,
        id: Uuid,
        password: &str,
        hasher: &dyn PasswordHasher,
        address: Option<IpAddr>,
    ) -> Result<LoginOutcome, SessionError> {
        let account = self.get(id).ok_or(SessionError::NotOnline)?;

        let limit = self.limiter().check_and_reserve(id);
        if let LimitResult::Locked(remaining) = limit {
            warn!(
                account_id = %id,
                remaining_secs = remaining.as_secs(),
                "Login attempt blocked: account locked"
            );
            return Err(SessionError::AccountLocked(remaining.as_secs()));
        }

        match account.check_password(hasher, password) {
            Ok(true) => self.limiter().clear(id),
            Ok(false) => {
                self.limiter().record_failure(id);
                warn!(
                    account_id = %id,
                    username = %account.username(),
                    "Login failed: invalid password"
                );
                return Err(SessionError::InvalidCredentials);
            }
            Err(e) => {
                self.limiter().release(id);
                return Err(e.into());
            }
        }

        account.set_last_address(address);
        account.set_logged_in(true);

        let needs_rehash = hasher.needs_rehash(&account.password_hash());
        info!(account_id = %id, username = %account.username(), "Login successful");

        Ok(LoginOutcome {
            account,
            needs_rehash,
        })
    }

    /// End an identity's session while keeping the account attached.
    pub fn logout(&self, id: Uuid) -> Result<(), SessionError> {
        let account = self.get(id).ok_or(SessionError::NotOnline)?;
        account.set_logged_in(false);
        info!(account_id = %id, username = %account.username(), "Logged out");
        Ok(())
    }

    /// Drop expired failed-attempt records.
    pub fn cleanup(&self) {
        self.limiter().cleanup();
    }
}
