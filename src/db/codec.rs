//! Conversion between persisted account rows and [`Account`] values.
//!
//! The functions here are pure: the repository reads a row into an
//! [`AccountRow`] and hands it over, and writes whatever [`AccountCodec::encode`]
//! produced.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::account::Account;
use super::TimestampMode;
use crate::datetime::{format_sql_timestamp, parse_sql_timestamp};
use crate::{GateError, Result};

/// Length of an encoded identifier.
pub const ID_LENGTH: usize = 16;

/// Persisted form of the `last_login` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredTimestamp {
    /// Native temporal column.
    Native(DateTime<Utc>),
    /// `yyyy-MM-dd HH:mm:ss` text, UTC.
    Text(String),
}

/// One row of the `accounts` table.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountRow {
    /// Identifier, 16 bytes.
    pub id: Vec<u8>,
    /// Player name.
    pub username: String,
    /// Credential hash.
    pub password_hash: String,
    /// Raw address bytes, empty when absent.
    pub last_address: Vec<u8>,
    /// Last login time.
    pub last_login: StoredTimestamp,
    /// Contact address, possibly empty.
    pub email: Option<String>,
}

impl std::fmt::Debug for AccountRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRow")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("last_address", &self.last_address)
            .field("last_login", &self.last_login)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Encode an identifier as its high 64 bits then its low 64 bits, big-endian.
pub fn encode_id(id: Uuid) -> [u8; ID_LENGTH] {
    let (hi, lo) = id.as_u64_pair();
    let mut bytes = [0u8; ID_LENGTH];
    bytes[..8].copy_from_slice(&hi.to_be_bytes());
    bytes[8..].copy_from_slice(&lo.to_be_bytes());
    bytes
}

/// Decode an identifier written by [`encode_id`].
pub fn decode_id(bytes: &[u8]) -> Result<Uuid> {
    let bytes: [u8; ID_LENGTH] = bytes.try_into().map_err(|_| {
        GateError::CorruptRecord(format!(
            "identifier must be {ID_LENGTH} bytes, got {}",
            bytes.len()
        ))
    })?;

    let mut hi = [0u8; 8];
    let mut lo = [0u8; 8];
    hi.copy_from_slice(&bytes[..8]);
    lo.copy_from_slice(&bytes[8..]);
    Ok(Uuid::from_u64_pair(
        u64::from_be_bytes(hi),
        u64::from_be_bytes(lo),
    ))
}

/// Encode an address as its raw octets, or nothing when absent.
pub fn encode_address(address: Option<IpAddr>) -> Vec<u8> {
    match address {
        Some(IpAddr::V4(v4)) => v4.octets().to_vec(),
        Some(IpAddr::V6(v6)) => v6.octets().to_vec(),
        None => Vec::new(),
    }
}

/// Decode raw address octets.
///
/// Anything that is not exactly 4 or 16 bytes yields `None`; a bad audit
/// field never prevents an account from loading.
pub fn decode_address(bytes: &[u8]) -> Option<IpAddr> {
    if let Ok(v4) = <[u8; 4]>::try_from(bytes) {
        return Some(IpAddr::V4(Ipv4Addr::from(v4)));
    }
    if let Ok(v6) = <[u8; 16]>::try_from(bytes) {
        return Some(IpAddr::V6(Ipv6Addr::from(v6)));
    }
    if !bytes.is_empty() {
        info!(len = bytes.len(), "Ignoring stored address with invalid length");
    }
    None
}

/// Row codec bound to one deployment's timestamp mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountCodec {
    mode: TimestampMode,
}

impl AccountCodec {
    /// Create a codec for the given timestamp mode.
    pub fn new(mode: TimestampMode) -> Self {
        Self { mode }
    }

    /// The timestamp mode this codec writes.
    pub fn mode(&self) -> TimestampMode {
        self.mode
    }

    /// Encode a timestamp for the `last_login` column.
    pub fn encode_timestamp(&self, dt: DateTime<Utc>) -> StoredTimestamp {
        match self.mode {
            TimestampMode::Native => StoredTimestamp::Native(dt),
            TimestampMode::Text => StoredTimestamp::Text(format_sql_timestamp(&dt)),
        }
    }

    /// Decode a `last_login` column value.
    ///
    /// The value must have the representation of this codec's mode.
    pub fn decode_timestamp(&self, stored: &StoredTimestamp) -> Result<DateTime<Utc>> {
        match (self.mode, stored) {
            (TimestampMode::Native, StoredTimestamp::Native(dt)) => Ok(*dt),
            (TimestampMode::Text, StoredTimestamp::Text(s)) => parse_sql_timestamp(s),
            (mode, stored) => Err(GateError::CorruptRecord(format!(
                "last_login stored as {stored:?} in a {mode:?} deployment"
            ))),
        }
    }

    /// Encode an account into a row, reading every field under one lock.
    pub fn encode(&self, account: &Account) -> AccountRow {
        let snapshot = account.snapshot();
        AccountRow {
            id: encode_id(snapshot.id).to_vec(),
            username: snapshot.username,
            password_hash: snapshot.password_hash,
            last_address: encode_address(snapshot.last_address),
            last_login: self.encode_timestamp(snapshot.last_login),
            email: snapshot.email,
        }
    }

    /// Decode a row into an account with no active session.
    pub fn decode(&self, row: AccountRow) -> Result<Account> {
        let id = decode_id(&row.id)?;
        let last_login = self.decode_timestamp(&row.last_login)?;
        let last_address = decode_address(&row.last_address);

        Ok(Account::restore(
            id,
            row.username,
            row.password_hash,
            last_address,
            last_login,
            row.email,
        ))
    }
}
