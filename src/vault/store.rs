//! Local secret vault backed by SQLite.
//!
//! One vault file per owner, at `<data_dir>/secrets.db`.  Rows are keyed
//! by `(secret_type, secret_name)`; each write replaces the whole row.
//! The `content` column holds the secret sealed under the owner key, the
//! same envelope format the remote stores, so payloads and metadata are
//! never on disk in clear.  The sync engine only talks to it through the
//! `LocalCache` trait.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::secret::{Secret, SecretMetadata, SecretType};
use crate::crypto::{open_content, seal, EncryptedEnvelope, OwnerKeyPair};
use crate::errors::{Result, VaultSyncError};

/// What the sync engine needs from the local side.
pub trait LocalCache {
    /// All local secrets of one type, ordered by name.
    fn list_by_type(&self, secret_type: SecretType) -> Result<Vec<Secret>>;

    /// One secret, or `SecretNotFound`.
    fn get_by_name(&self, secret_type: SecretType, name: &str) -> Result<Secret>;

    /// Replace (or insert) a secret with a version obtained from the remote.
    fn upsert_from_remote(&self, secret: &Secret) -> Result<()>;
}

/// SQLite-backed local vault.
pub struct SecretStore {
    conn: Connection,
    path: Option<PathBuf>,
    keys: OwnerKeyPair,
}

impl SecretStore {
    /// File name of the vault database inside the data directory.
    pub const FILE_NAME: &'static str = "secrets.db";

    /// Open (or create) the vault at `<data_dir>/secrets.db`.
    pub fn open(data_dir: &Path, keys: OwnerKeyPair) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(Self::FILE_NAME);
        let conn = Connection::open(&path)?;

        // Set restrictive permissions on the vault database (owner-only).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        let store = Self {
            conn,
            path: Some(path),
            keys,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// A throwaway vault, used by tests and dry runs.
    pub fn in_memory(keys: OwnerKeyPair) -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
            keys,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS secrets (
                secret_type TEXT NOT NULL,
                secret_name TEXT NOT NULL,
                content     TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (secret_type, secret_name)
            );",
        )?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Add or edit a secret locally; stamps `updated_at` with the current time.
    ///
    /// Returns `true` if a secret with that name already existed.
    pub fn put(&self, secret: &Secret) -> Result<bool> {
        secret.validate()?;
        let existed = self.exists(secret.secret_type(), &secret.name)?;
        let mut stamped = secret.clone();
        stamped.updated_at = Utc::now();
        self.write(&stamped)?;
        Ok(existed)
    }

    /// Remove a secret.  Returns `false` if it did not exist.
    pub fn delete(&self, secret_type: SecretType, name: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM secrets WHERE secret_type = ?1 AND secret_name = ?2",
            params![secret_type.as_str(), name],
        )?;
        Ok(removed > 0)
    }

    pub fn exists(&self, secret_type: SecretType, name: &str) -> Result<bool> {
        let found: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM secrets WHERE secret_type = ?1 AND secret_name = ?2)",
            params![secret_type.as_str(), name],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    /// Listing rows for display, optionally filtered by type.
    pub fn list_metadata(&self, secret_type: Option<SecretType>) -> Result<Vec<SecretMetadata>> {
        let mut stmt = self.conn.prepare(
            "SELECT secret_type, secret_name, updated_at FROM secrets
             WHERE ?1 IS NULL OR secret_type = ?1
             ORDER BY secret_type, secret_name",
        )?;

        let rows = stmt.query_map(params![secret_type.map(|t| t.as_str())], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (kind, name, updated_at) = row?;
            out.push(SecretMetadata {
                name,
                secret_type: kind.parse()?,
                updated_at: parse_timestamp(&updated_at)?,
            });
        }
        Ok(out)
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM secrets", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    fn write(&self, secret: &Secret) -> Result<()> {
        let sealed = seal(
            &self.keys.public,
            &secret.name,
            secret.secret_type(),
            &secret.content(),
        )?;
        let content = serde_json::to_string(&sealed)?;
        self.conn.execute(
            "INSERT INTO secrets (secret_type, secret_name, content, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(secret_type, secret_name) DO UPDATE SET
                content = excluded.content,
                updated_at = excluded.updated_at",
            params![
                secret.secret_type().as_str(),
                secret.name,
                content,
                secret.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl LocalCache for SecretStore {
    fn list_by_type(&self, secret_type: SecretType) -> Result<Vec<Secret>> {
        let mut stmt = self.conn.prepare(
            "SELECT secret_name, content, updated_at FROM secrets
             WHERE secret_type = ?1 ORDER BY secret_name",
        )?;
        let rows = stmt.query_map(params![secret_type.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut secrets = Vec::new();
        for row in rows {
            let (name, content, updated_at) = row?;
            secrets.push(self.decode_row(secret_type, name, &content, &updated_at)?);
        }
        Ok(secrets)
    }

    fn get_by_name(&self, secret_type: SecretType, name: &str) -> Result<Secret> {
        let row = self
            .conn
            .query_row(
                "SELECT content, updated_at FROM secrets
                 WHERE secret_type = ?1 AND secret_name = ?2",
                params![secret_type.as_str(), name],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            Some((content, updated_at)) => {
                self.decode_row(secret_type, name.to_string(), &content, &updated_at)
            }
            None => Err(VaultSyncError::SecretNotFound {
                secret_type,
                name: name.to_string(),
            }),
        }
    }

    fn upsert_from_remote(&self, secret: &Secret) -> Result<()> {
        secret.validate()?;
        self.write(secret)
    }
}

impl SecretStore {
    /// Open a row's sealed content, checking it belongs to the row's slot.
    fn decode_row(
        &self,
        secret_type: SecretType,
        name: String,
        content: &str,
        updated_at: &str,
    ) -> Result<Secret> {
        let sealed: EncryptedEnvelope = serde_json::from_str(content)
            .map_err(|e| VaultSyncError::Storage(format!("unreadable row '{name}': {e}")))?;
        if sealed.secret_type != secret_type || sealed.secret_name != name {
            return Err(VaultSyncError::IntegrityFailed(format!(
                "row {secret_type}/{name} holds {}/{}",
                sealed.secret_type, sealed.secret_name
            )));
        }
        let content = open_content(&self.keys.private, &sealed)?;
        Ok(Secret::from_content(name, content, parse_timestamp(updated_at)?))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| VaultSyncError::Storage(format!("bad timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keypair::MIN_KEY_BITS;
    use crate::vault::secret::{SecretPayload, TextNote};
    use std::sync::OnceLock;
    use tempfile::TempDir;

    fn keys() -> OwnerKeyPair {
        static KEYS: OnceLock<OwnerKeyPair> = OnceLock::new();
        KEYS.get_or_init(|| OwnerKeyPair::generate(MIN_KEY_BITS).unwrap())
            .clone()
    }

    fn note(name: &str, content: &str) -> Secret {
        Secret::new(
            name,
            SecretPayload::Text(TextNote {
                content: content.into(),
            }),
        )
    }

    #[test]
    fn open_creates_database() {
        let dir = TempDir::new().unwrap();
        let store = SecretStore::open(dir.path(), keys()).unwrap();
        assert!(dir.path().join(SecretStore::FILE_NAME).exists());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn put_reports_whether_secret_existed() {
        let store = SecretStore::in_memory(keys()).unwrap();
        assert!(!store.put(&note("a", "1")).unwrap());
        assert!(store.put(&note("a", "2")).unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn put_rejects_invalid_secret() {
        let store = SecretStore::in_memory(keys()).unwrap();
        assert!(store.put(&note("", "x")).is_err());
        assert!(store.put(&note("a", "")).is_err());
    }

    #[test]
    fn list_metadata_filters_by_type() {
        let store = SecretStore::in_memory(keys()).unwrap();
        store.put(&note("a", "1")).unwrap();
        assert_eq!(store.list_metadata(Some(SecretType::Text)).unwrap().len(), 1);
        assert!(store
            .list_metadata(Some(SecretType::Binary))
            .unwrap()
            .is_empty());
        assert_eq!(store.list_metadata(None).unwrap().len(), 1);
    }

    #[test]
    fn upsert_from_remote_keeps_remote_timestamp() {
        let store = SecretStore::in_memory(keys()).unwrap();
        let mut remote = note("a", "remote");
        remote.updated_at = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        store.upsert_from_remote(&remote).unwrap();

        let loaded = store.get_by_name(SecretType::Text, "a").unwrap();
        assert_eq!(loaded, remote);
    }

    #[cfg(unix)]
    #[test]
    fn database_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let _store = SecretStore::open(dir.path(), keys()).unwrap();
        let perms = std::fs::metadata(dir.path().join(SecretStore::FILE_NAME))
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }

    #[test]
    fn content_is_sealed_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = SecretStore::open(dir.path(), keys()).unwrap();
        store.put(&note("pin", "correct horse battery")).unwrap();
        drop(store);

        let raw = std::fs::read(dir.path().join(SecretStore::FILE_NAME)).unwrap();
        assert!(!raw
            .windows(b"correct horse".len())
            .any(|w| w == b"correct horse"));

        let store = SecretStore::open(dir.path(), keys()).unwrap();
        let loaded = store.get_by_name(SecretType::Text, "pin").unwrap();
        assert_eq!(loaded.payload, note("pin", "correct horse battery").payload);
    }

    #[test]
    fn other_key_cannot_read_the_vault() {
        let dir = TempDir::new().unwrap();
        SecretStore::open(dir.path(), keys())
            .unwrap()
            .put(&note("pin", "1234"))
            .unwrap();

        let stranger = OwnerKeyPair::generate(MIN_KEY_BITS).unwrap();
        let store = SecretStore::open(dir.path(), stranger).unwrap();
        let err = store.get_by_name(SecretType::Text, "pin").unwrap_err();
        assert!(matches!(err, VaultSyncError::IntegrityFailed(_)));
        // Listing names needs no key.
        assert_eq!(store.list_metadata(None).unwrap().len(), 1);
    }

    #[test]
    fn row_swapped_between_names_is_rejected() {
        let store = SecretStore::in_memory(keys()).unwrap();
        store.put(&note("a", "for a")).unwrap();
        store.put(&note("b", "for b")).unwrap();
        store
            .conn
            .execute(
                "UPDATE secrets SET content = (SELECT content FROM secrets WHERE secret_name = 'a')
                 WHERE secret_name = 'b'",
                [],
            )
            .unwrap();

        let err = store.get_by_name(SecretType::Text, "b").unwrap_err();
        assert!(matches!(err, VaultSyncError::IntegrityFailed(_)));
    }
}
