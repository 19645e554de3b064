//! Database schema and migrations for logingate.
//!
//! Migrations are applied in order when the database is opened; the
//! `schema_version` table records which ones have run.

/// Schema version bookkeeping table.
#[cfg(feature = "sqlite")]
pub const SCHEMA_VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// Schema version bookkeeping table.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub const SCHEMA_VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    version     BIGINT PRIMARY KEY,
    applied_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

/// Database migrations.
#[cfg(feature = "sqlite")]
pub const MIGRATIONS: &[&str] = &[
    // v1: accounts table
    r#"
CREATE TABLE accounts (
    id            BLOB PRIMARY KEY NOT NULL,              -- 16 bytes, high half first
    username      TEXT NOT NULL UNIQUE,
    password      TEXT NOT NULL,                          -- opaque hasher output
    last_address  BLOB NOT NULL DEFAULT x'',              -- 4 or 16 raw bytes, empty if unknown
    last_login    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    email         TEXT
);

CREATE INDEX idx_accounts_last_address ON accounts(last_address);
"#,
];

/// Database migrations.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub const MIGRATIONS: &[&str] = &[
    // v1: accounts table
    r#"
CREATE TABLE accounts (
    id            BYTEA PRIMARY KEY NOT NULL,
    username      TEXT NOT NULL UNIQUE,
    password      TEXT NOT NULL,
    last_address  BYTEA NOT NULL DEFAULT ''::bytea,
    last_login    TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    email         TEXT
);

CREATE INDEX idx_accounts_last_address ON accounts(last_address);
"#,
];
