//! Account repository for logingate.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use sqlx::query::Query;
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use super::account::Account;
use super::codec::{encode_address, encode_id, AccountCodec, AccountRow, StoredTimestamp};
use super::{Database, DbBackend, DbPool, DbRow, TimestampMode};
use crate::auth::validation::{validate_password, validate_player_name};
use crate::auth::{PasswordError, PasswordHasher};
use crate::{GateError, Result};

type DbArguments<'q> = <DbBackend as sqlx::Database>::Arguments<'q>;

const SELECT_ACCOUNT: &str =
    "SELECT id, username, password, last_address, last_login, email FROM accounts";

const INSERT_ACCOUNT: &str =
    "INSERT INTO accounts (id, username, password, last_address, last_login, email)
     VALUES ($1, $2, $3, $4, $5, $6)";

const UPSERT_ACCOUNT: &str =
    "INSERT INTO accounts (id, username, password, last_address, last_login, email)
     VALUES ($1, $2, $3, $4, $5, $6)
     ON CONFLICT (id) DO UPDATE SET
         username = excluded.username,
         password = excluded.password,
         last_address = excluded.last_address,
         last_login = excluded.last_login,
         email = excluded.email";

/// Bind every column of a row, in table order.
fn bind_row<'q>(
    query: Query<'q, DbBackend, DbArguments<'q>>,
    row: AccountRow,
) -> Query<'q, DbBackend, DbArguments<'q>> {
    let query = query
        .bind(row.id)
        .bind(row.username)
        .bind(row.password_hash)
        .bind(row.last_address);
    let query = match row.last_login {
        StoredTimestamp::Native(dt) => query.bind(dt),
        StoredTimestamp::Text(s) => query.bind(s),
    };
    query.bind(row.email)
}

/// Map a write failure, turning unique-constraint violations into
/// [`GateError::DuplicateAccount`].
fn write_error(err: sqlx::Error, username: &str) -> GateError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return GateError::DuplicateAccount(username.to_string());
        }
    }
    GateError::Database(err.to_string())
}

/// Persistence and lookup for accounts.
///
/// Every method issues one logical statement and is `async`, so it can
/// only be driven from a worker context.
#[derive(Clone)]
pub struct AccountStore {
    pool: DbPool,
    codec: AccountCodec,
    hasher: Arc<dyn PasswordHasher>,
}

impl AccountStore {
    /// Create a store over an open database.
    pub fn new(db: &Database, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            pool: db.pool().clone(),
            codec: AccountCodec::new(db.timestamp_mode()),
            hasher,
        }
    }

    /// The hasher new credentials are hashed with.
    pub fn hasher(&self) -> &Arc<dyn PasswordHasher> {
        &self.hasher
    }

    /// The row codec bound to this deployment's timestamp mode.
    pub fn codec(&self) -> AccountCodec {
        self.codec
    }

    fn read_row(&self, row: &DbRow) -> Result<AccountRow> {
        let last_login = match self.codec.mode() {
            TimestampMode::Native => StoredTimestamp::Native(row.try_get("last_login")?),
            TimestampMode::Text => StoredTimestamp::Text(row.try_get("last_login")?),
        };

        Ok(AccountRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password")?,
            last_address: row
                .try_get::<Option<Vec<u8>>, _>("last_address")?
                .unwrap_or_default(),
            last_login,
            email: row.try_get("email")?,
        })
    }

    fn decode(&self, row: &DbRow) -> Result<Account> {
        self.codec.decode(self.read_row(row)?)
    }

    /// Hash on the blocking pool; Argon2 takes tens of milliseconds.
    async fn hash_password(&self, plaintext: &str) -> Result<String> {
        let hasher = Arc::clone(&self.hasher);
        let plaintext = plaintext.to_string();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| PasswordError::HashBackend(format!("hashing task failed: {e}")))??;
        Ok(hash)
    }

    /// Register a new account.
    ///
    /// The password is hashed before anything is written. Fails with
    /// [`GateError::DuplicateAccount`] when the identifier or the name is
    /// already taken; the table's constraints decide, not a pre-check.
    pub async fn create_account(
        &self,
        id: Uuid,
        username: &str,
        password: &str,
        address: Option<IpAddr>,
    ) -> Result<Account> {
        validate_player_name(username)?;
        validate_password(password)?;

        let hash = self.hash_password(password).await?;
        let account = Account::new(id, username, hash, address);

        bind_row(sqlx::query(INSERT_ACCOUNT), self.codec.encode(&account))
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, username))?;

        info!(account_id = %id, username = %username, "Account created");
        Ok(account)
    }

    /// Look up an account by identifier.
    pub async fn load_by_identifier(&self, id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query(&format!("{SELECT_ACCOUNT} WHERE id = $1"))
            .bind(encode_id(id).to_vec())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(|r| self.decode(r)).transpose()
    }

    /// Look up an account by its exact stored name.
    pub async fn load_by_name(&self, username: &str) -> Result<Option<Account>> {
        let row = sqlx::query(&format!("{SELECT_ACCOUNT} WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(|r| self.decode(r)).transpose()
    }

    /// Every account whose last login came from `address`.
    pub async fn load_all_by_address(&self, address: IpAddr) -> Result<HashSet<Account>> {
        let rows = sqlx::query(&format!("{SELECT_ACCOUNT} WHERE last_address = $1"))
            .bind(encode_address(Some(address)))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|r| self.decode(r)).collect()
    }

    /// Write the full current field set of an account.
    ///
    /// Inserts the row if it does not exist yet. A name already used by
    /// a different identifier fails with [`GateError::DuplicateAccount`].
    pub async fn save(&self, account: &Account) -> Result<()> {
        self.write_row(self.codec.encode(account)).await?;

        debug!(account_id = %account.id(), "Account saved");
        Ok(())
    }

    async fn write_row(&self, row: AccountRow) -> Result<()> {
        let username = row.username.clone();

        bind_row(sqlx::query(UPSERT_ACCOUNT), row)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, &username))?;
        Ok(())
    }

    /// Replace an account's password and persist it.
    ///
    /// The in-memory hash changes only after the new row is written, so a
    /// failed write leaves the old password in effect.
    pub async fn update_password(&self, account: &Account, password: &str) -> Result<()> {
        validate_password(password)?;

        let hash = self.hash_password(password).await?;
        let mut row = self.codec.encode(account);
        row.password_hash = hash.clone();
        self.write_row(row).await?;
        account.set_password_hash(hash);

        info!(account_id = %account.id(), "Password updated");
        Ok(())
    }

    /// Delete an account by identifier.
    ///
    /// Returns whether a row was removed; a missing account is not an error.
    pub async fn delete_by_identifier(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(encode_id(id).to_vec())
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(account_id = %id, "Account deleted");
        }
        Ok(deleted)
    }

    /// Delete an account by name.
    ///
    /// Returns whether a row was removed; a missing account is not an error.
    pub async fn delete_by_name(&self, username: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(username = %username, "Account deleted");
        }
        Ok(deleted)
    }

    /// Count all accounts.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

impl std::fmt::Debug for AccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountStore")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
