//! Account management for administrators.
//!
//! Every command runs its store calls on the worker context and delivers
//! the reply on the main context:
//! - Unregister an account
//! - List the accounts seen on an address
//! - List alternate accounts sharing an account's last address
//! - Show an account's last login
//! - Reset a password to a generated one

use std::net::IpAddr;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::DisplayConfig;
use crate::datetime::format_utc_datetime;
use crate::db::{Account, AccountStore};
use crate::executor::Worker;

use super::{AccountQuery, AdminError};

/// Length of generated passwords.
pub const GENERATED_PASSWORD_LENGTH: usize = 12;

/// Characters used for password generation.
const PASSWORD_CHARS: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a random password.
///
/// The password contains alphanumeric characters (excluding ambiguous ones like 0, O, 1, l, I).
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..PASSWORD_CHARS.len());
            PASSWORD_CHARS[idx] as char
        })
        .collect()
}

/// Accounts sharing an address with a given account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltAccounts {
    /// The account does not exist.
    NotFound,
    /// The account has no recorded address.
    NoAddress,
    /// Names of every account on that address, sorted.
    Accounts(Vec<String>),
}

/// Last login of an account, rendered for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastLogin {
    /// Player name.
    pub username: String,
    /// Formatted time in the requested timezone.
    pub formatted: String,
}

/// Admin service for account management.
#[derive(Debug, Clone)]
pub struct AdminService {
    store: AccountStore,
    timezone: String,
    last_login_format: String,
}

impl AdminService {
    /// Create a new AdminService.
    pub fn new(store: AccountStore, display: &DisplayConfig) -> Self {
        Self {
            store,
            timezone: display.timezone.clone(),
            last_login_format: display.last_login_format.clone(),
        }
    }

    async fn find(&self, query: &AccountQuery) -> crate::Result<Option<Account>> {
        match query {
            AccountQuery::ByIdentifier(id) => self.store.load_by_identifier(*id).await,
            AccountQuery::ByName(name) => self.store.load_by_name(name).await,
        }
    }

    async fn remove(&self, query: &AccountQuery) -> Result<bool, AdminError> {
        let removed = match query {
            AccountQuery::ByIdentifier(id) => self.store.delete_by_identifier(*id).await?,
            AccountQuery::ByName(name) => self.store.delete_by_name(name).await?,
        };
        if removed {
            info!(account = %query, "Account unregistered by admin");
        }
        Ok(removed)
    }

    async fn names_on_address(&self, address: IpAddr) -> Result<Vec<String>, AdminError> {
        let mut names: Vec<String> = self
            .store
            .load_all_by_address(address)
            .await?
            .iter()
            .map(|account| account.username().to_string())
            .collect();
        names.sort_unstable();
        Ok(names)
    }

    async fn find_alts(&self, query: &AccountQuery) -> Result<AltAccounts, AdminError> {
        let Some(account) = self.find(query).await? else {
            return Ok(AltAccounts::NotFound);
        };
        let Some(address) = account.last_address() else {
            return Ok(AltAccounts::NoAddress);
        };
        Ok(AltAccounts::Accounts(self.names_on_address(address).await?))
    }

    async fn find_last_login(
        &self,
        query: &AccountQuery,
        timezone: Option<&str>,
    ) -> Result<Option<LastLogin>, AdminError> {
        let timezone = timezone.unwrap_or(self.timezone.as_str());
        Ok(self.find(query).await?.map(|account| LastLogin {
            username: account.username().to_string(),
            formatted: format_utc_datetime(
                &account.last_login(),
                timezone,
                &self.last_login_format,
            ),
        }))
    }

    async fn assign_password(&self, query: &AccountQuery) -> Result<Option<String>, AdminError> {
        let Some(account) = self.find(query).await? else {
            return Ok(None);
        };

        let password = generate_password(GENERATED_PASSWORD_LENGTH);
        self.store.update_password(&account, &password).await?;
        info!(account_id = %account.id(), "Password reset by admin");
        Ok(Some(password))
    }

    /// Delete an account. Replies whether one was removed.
    pub fn unregister<C>(
        &self,
        worker: &Worker,
        query: AccountQuery,
        reply: C,
    ) -> JoinHandle<()>
    where
        C: FnOnce(Result<bool, AdminError>) + Send + 'static,
    {
        let service = self.clone();
        worker.submit(async move { service.remove(&query).await }, reply)
    }

    /// Names of every account last seen on an address, sorted.
    pub fn accounts_on_address<C>(
        &self,
        worker: &Worker,
        address: IpAddr,
        reply: C,
    ) -> JoinHandle<()>
    where
        C: FnOnce(Result<Vec<String>, AdminError>) + Send + 'static,
    {
        let service = self.clone();
        worker.submit(async move { service.names_on_address(address).await }, reply)
    }

    /// Every account sharing the queried account's last address.
    pub fn alt_accounts<C>(
        &self,
        worker: &Worker,
        query: AccountQuery,
        reply: C,
    ) -> JoinHandle<()>
    where
        C: FnOnce(Result<AltAccounts, AdminError>) + Send + 'static,
    {
        let service = self.clone();
        worker.submit(async move { service.find_alts(&query).await }, reply)
    }

    /// Last login of an account, rendered in `timezone` or, when that is
    /// `None`, in the configured display timezone.
    pub fn last_login<C>(
        &self,
        worker: &Worker,
        query: AccountQuery,
        timezone: Option<&str>,
        reply: C,
    ) -> JoinHandle<()>
    where
        C: FnOnce(Result<Option<LastLogin>, AdminError>) + Send + 'static,
    {
        let service = self.clone();
        let timezone = timezone.map(str::to_string);
        worker.submit(
            async move { service.find_last_login(&query, timezone.as_deref()).await },
            reply,
        )
    }

    /// Replace an account's password with a generated one.
    ///
    /// Replies with the new plaintext for out-of-band delivery, or `None`
    /// if the account does not exist.
    pub fn reset_password<C>(
        &self,
        worker: &Worker,
        query: AccountQuery,
        reply: C,
    ) -> JoinHandle<()>
    where
        C: FnOnce(Result<Option<String>, AdminError>) + Send + 'static,
    {
        let service = self.clone();
        worker.submit(async move { service.assign_password(&query).await }, reply)
    }
}
