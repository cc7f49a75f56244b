//! Token record storage and expiry

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Seconds shaved off `expires_in` so a token is renewed before the API
/// starts rejecting it.
pub const EXPIRY_MARGIN_SECS: i64 = 30;

/// Persisted OAuth token record.
///
/// Every field is optional on disk: a hand-edited or truncated file still
/// loads, it just reports as invalid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Lifetime in seconds, as issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Client the record was issued to; required for refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Unix seconds when the access token was obtained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obtained_at: Option<i64>,
}

impl TokenRecord {
    /// A record is usable only with an access token and both timing fields.
    pub fn is_valid(&self) -> bool {
        self.access_token.is_some() && self.expires_in.is_some() && self.obtained_at.is_some()
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        match (&self.access_token, self.expires_in, self.obtained_at) {
            (Some(_), Some(expires_in), Some(obtained_at)) => {
                now - obtained_at >= expires_in - EXPIRY_MARGIN_SECS
            }
            _ => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    /// Unix seconds at which the record stops being used, if known.
    pub fn expires_at(&self) -> Option<i64> {
        Some(self.obtained_at? + self.expires_in?)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some()
    }
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Storage backend for the single token record.
pub trait TokenStore {
    fn load(&self) -> Result<Option<TokenRecord>>;
    fn save(&self, record: &TokenRecord) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Flat JSON file next to the config.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    /// A missing or unreadable file means "no record", matching a fresh install.
    fn load(&self) -> Result<Option<TokenRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).context("Failed to read token file")?;
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable token file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    fn save(&self, record: &TokenRecord) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create data directory")?;
        }
        let content = serde_json::to_string_pretty(record).context("Failed to serialize tokens")?;
        fs::write(&self.path, content).context("Failed to write token file")?;

        // Token file holds credentials
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, perms).context("Failed to set token file permissions")?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to remove token file")?;
        }
        Ok(())
    }
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
    inner: std::sync::Arc<std::sync::Mutex<Option<TokenRecord>>>,
}

#[cfg(test)]
impl MemoryTokenStore {
    pub fn with(record: TokenRecord) -> Self {
        let store = Self::default();
        *store.inner.lock().unwrap() = Some(record);
        store
    }

    pub fn current(&self) -> Option<TokenRecord> {
        self.inner.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenRecord>> {
        Ok(self.current())
    }

    fn save(&self, record: &TokenRecord) -> Result<()> {
        *self.inner.lock().unwrap() = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.inner.lock().unwrap() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn record(obtained_at: i64, expires_in: i64) -> TokenRecord {
        TokenRecord {
            access_token: Some("at".into()),
            expires_in: Some(expires_in),
            obtained_at: Some(obtained_at),
            ..Default::default()
        }
    }

    #[test]
    fn test_expiry_margin() {
        let r = record(1_000, 3600);
        assert!(!r.is_expired_at(1_000));
        assert!(!r.is_expired_at(1_000 + 3569));
        assert!(r.is_expired_at(1_000 + 3570));
        assert!(r.is_expired_at(1_000 + 7200));
    }

    #[test]
    fn test_incomplete_record_is_invalid_and_expired() {
        let mut r = record(1_000, 3600);
        r.obtained_at = None;
        assert!(!r.is_valid());
        assert!(r.is_expired_at(1_000));
        assert!(TokenRecord::default().is_expired_at(0));
        assert!(record(0, 1).is_valid());
    }

    #[test]
    fn test_file_store_roundtrip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("tokens.json"));
        assert!(store.load().unwrap().is_none());

        let mut r = record(42, 3600);
        r.refresh_token = Some("rt".into());
        r.client_id = Some("cid".into());
        store.save(&r).unwrap();
        assert_eq!(store.load().unwrap(), Some(r));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_file_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, "{not json").unwrap();
        assert!(FileTokenStore::new(&path).load().unwrap().is_none());
    }

    #[test]
    fn test_extra_provider_fields_are_ignored() {
        let json = r#"{"access_token":"a","token_type":"Bearer","expires_in":3600,
            "obtained_at":5,"client_id":"c","unknown":1}"#;
        let r: TokenRecord = serde_json::from_str(json).unwrap();
        assert!(r.is_valid());
        assert!(!r.can_refresh());
        assert_eq!(r.expires_at(), Some(3605));
    }
}
