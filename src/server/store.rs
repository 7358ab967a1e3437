//! SQLite storage for sealed envelopes.
//!
//! Rows are keyed by `(owner, secret_type, secret_name)`.  A save replaces
//! the whole row, so concurrent writers to one key resolve as last writer
//! wins.  Nothing here can read envelope contents.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::auth::OwnerId;
use crate::crypto::EncryptedEnvelope;
use crate::errors::{Result, VaultSyncError};
use crate::transport::RemoteRecord;
use crate::vault::SecretType;

/// Thread-safe envelope storage.
#[derive(Clone)]
pub struct EnvelopeStore {
    conn: Arc<Mutex<Connection>>,
}

impl EnvelopeStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS envelopes (
                owner       TEXT NOT NULL,
                secret_type TEXT NOT NULL,
                secret_name TEXT NOT NULL,
                ciphertext  BLOB NOT NULL,
                wrapped_key BLOB NOT NULL,
                sealed_at   TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (owner, secret_type, secret_name)
            );",
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VaultSyncError::Storage(format!("lock poisoned: {e}")))
    }

    /// Insert or fully replace the envelope; returns the committed record.
    pub fn save(&self, owner: &OwnerId, envelope: &EncryptedEnvelope) -> Result<RemoteRecord> {
        let updated_at = Utc::now();
        self.conn()?.execute(
            "INSERT INTO envelopes
                (owner, secret_type, secret_name, ciphertext, wrapped_key, sealed_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(owner, secret_type, secret_name) DO UPDATE SET
                ciphertext = excluded.ciphertext,
                wrapped_key = excluded.wrapped_key,
                sealed_at = excluded.sealed_at,
                updated_at = excluded.updated_at",
            params![
                owner.as_str(),
                envelope.secret_type.as_str(),
                envelope.secret_name,
                envelope.ciphertext,
                envelope.wrapped_key,
                envelope.timestamp.to_rfc3339(),
                updated_at.to_rfc3339(),
            ],
        )?;

        Ok(RemoteRecord {
            secret_owner: owner.to_string(),
            secret_name: envelope.secret_name.clone(),
            secret_type: envelope.secret_type,
            ciphertext: envelope.ciphertext.clone(),
            wrapped_key: envelope.wrapped_key.clone(),
            timestamp: envelope.timestamp,
            updated_at,
        })
    }

    pub fn get(
        &self,
        owner: &OwnerId,
        secret_type: SecretType,
        name: &str,
    ) -> Result<Option<RemoteRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT secret_name, ciphertext, wrapped_key, sealed_at, updated_at
                 FROM envelopes
                 WHERE owner = ?1 AND secret_type = ?2 AND secret_name = ?3",
                params![owner.as_str(), secret_type.as_str(), name],
                read_row,
            )
            .optional()?;

        row.map(|raw| raw.into_record(owner, secret_type)).transpose()
    }

    /// All envelopes of one type for `owner`, ordered by name.
    pub fn list(&self, owner: &OwnerId, secret_type: SecretType) -> Result<Vec<RemoteRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT secret_name, ciphertext, wrapped_key, sealed_at, updated_at
             FROM envelopes
             WHERE owner = ?1 AND secret_type = ?2
             ORDER BY secret_name",
        )?;
        let rows = stmt.query_map(params![owner.as_str(), secret_type.as_str()], read_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record(owner, secret_type)?);
        }
        Ok(records)
    }

    /// Returns `false` if there was nothing to delete.
    pub fn delete(&self, owner: &OwnerId, secret_type: SecretType, name: &str) -> Result<bool> {
        let removed = self.conn()?.execute(
            "DELETE FROM envelopes WHERE owner = ?1 AND secret_type = ?2 AND secret_name = ?3",
            params![owner.as_str(), secret_type.as_str(), name],
        )?;
        Ok(removed > 0)
    }
}

struct RawRow {
    name: String,
    ciphertext: Vec<u8>,
    wrapped_key: Vec<u8>,
    sealed_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        name: row.get(0)?,
        ciphertext: row.get(1)?,
        wrapped_key: row.get(2)?,
        sealed_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl RawRow {
    fn into_record(self, owner: &OwnerId, secret_type: SecretType) -> Result<RemoteRecord> {
        Ok(RemoteRecord {
            secret_owner: owner.to_string(),
            secret_name: self.name,
            secret_type,
            ciphertext: self.ciphertext,
            wrapped_key: self.wrapped_key,
            timestamp: parse_timestamp(&self.sealed_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| VaultSyncError::Storage(format!("bad timestamp '{raw}': {e}")))
}
