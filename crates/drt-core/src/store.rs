//! File-backed key-value store used to cache the access token between runs.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{errors::Error, Result};

pub const STORE_FILE: &str = "store.json";
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// A flat JSON object on disk. No locking and no expiry: one process at a time.
#[derive(Clone, Debug)]
pub struct KvStore {
    path: PathBuf,
}

impl KvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store rooted in a directory, using the conventional file name.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_all()?;
        map.insert(key.to_string(), value.to_string());
        self.write_all(&map)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_all()?;
        if map.remove(key).is_some() {
            self.write_all(&map)?;
        }
        Ok(())
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_all(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// The single cached access token.
#[derive(Clone, Debug)]
pub struct TokenStore {
    kv: KvStore,
}

impl TokenStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(KvStore::in_dir(dir))
    }

    pub fn get(&self) -> Result<Option<String>> {
        let token = self.kv.get(ACCESS_TOKEN_KEY).map_err(|e| self.failure(e))?;
        Ok(token.filter(|t| !t.is_empty()))
    }

    pub fn set(&self, token: &str) -> Result<()> {
        self.kv
            .set(ACCESS_TOKEN_KEY, token)
            .map_err(|e| self.failure(e))
    }

    pub fn clear(&self) -> Result<()> {
        self.kv.remove(ACCESS_TOKEN_KEY).map_err(|e| self.failure(e))
    }

    pub fn path(&self) -> &Path {
        self.kv.path()
    }

    // Store failures are fatal to the prober; keep the path in the message.
    fn failure(&self, e: Error) -> Error {
        Error::Store {
            path: self.path().display().to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn tmp_dir(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        std::env::temp_dir().join(format!("{prefix}-{pid}-{ts}"))
    }

    #[test]
    fn missing_file_reads_as_absent() {
        let store = TokenStore::in_dir(&tmp_dir("drt-store-missing"));
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn set_overwrites_single_token() {
        let dir = tmp_dir("drt-store-set");
        let store = TokenStore::in_dir(&dir);
        store.set("first").unwrap();
        store.set("second").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("second"));

        let raw = fs::read_to_string(dir.join(STORE_FILE)).unwrap();
        let map: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[ACCESS_TOKEN_KEY], "second");

        // A fresh handle sees the persisted value.
        assert_eq!(
            TokenStore::in_dir(&dir).get().unwrap().as_deref(),
            Some("second")
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn clear_removes_token_but_keeps_other_keys() {
        let dir = tmp_dir("drt-store-clear");
        let kv = KvStore::in_dir(&dir);
        kv.set("other", "value").unwrap();
        let store = TokenStore::new(kv.clone());
        store.set("tok").unwrap();
        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
        assert_eq!(kv.get("other").unwrap().as_deref(), Some("value"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tmp_dir("drt-store-corrupt");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(STORE_FILE), "{not json").unwrap();
        assert!(matches!(KvStore::in_dir(&dir).get("x"), Err(Error::Json(_))));
        let err = TokenStore::in_dir(&dir).get().unwrap_err();
        assert!(err.is_fatal());
        match err {
            Error::Store { path, .. } => assert!(path.ends_with(STORE_FILE)),
            other => panic!("unexpected: {other:?}"),
        }
        let _ = fs::remove_dir_all(dir);
    }
}
