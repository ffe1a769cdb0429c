//! KeyValueStore trait - pluggable durable primitive storage
//!
//! The heartbeat record must survive process death and device reboot, so the
//! production backend is sled. Everything above this layer only sees typed
//! single-key reads and writes:
//! - `SledStore`: durable, flushed on every write
//! - `InMemoryStore`: for tests and ephemeral runs

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("corrupt value for key '{key}': {reason}")]
    Corrupt { key: String, reason: String },
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Synchronous single-key storage of primitive values.
///
/// Every write is atomic for its key. Multi-key updates are not transactional;
/// callers order their writes so a partial update is always safe to read.
pub trait KeyValueStore: Send + Sync {
    fn get_i64(&self, key: &str) -> Result<Option<i64>, StorageError>;
    fn put_i64(&self, key: &str, value: i64) -> Result<(), StorageError>;

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError>;
    fn put_bool(&self, key: &str, value: bool) -> Result<(), StorageError>;

    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn put_string(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Atomically add one to an integer (missing counts as 0). Returns the new value.
    fn increment(&self, key: &str) -> Result<i64, StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

// ============================================================================
// Sled backend
// ============================================================================

/// Durable store backed by a sled database.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        tracing::info!(path = ?path_ref, "Heartbeat store opened");
        Ok(Self { db })
    }

    fn read(&self, key: &str) -> Result<Option<sled::IVec>, StorageError> {
        Ok(self.db.get(key.as_bytes())?)
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.db.insert(key.as_bytes(), value)?;
        // The next reader may be a fresh process after a kill, so flush now.
        self.db.flush()?;
        Ok(())
    }
}

fn decode_i64(key: &str, bytes: &[u8]) -> Result<i64, StorageError> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| StorageError::Corrupt {
        key: key.to_string(),
        reason: format!("expected 8 bytes, found {}", bytes.len()),
    })?;
    Ok(i64::from_be_bytes(arr))
}

impl KeyValueStore for SledStore {
    fn get_i64(&self, key: &str) -> Result<Option<i64>, StorageError> {
        self.read(key)?.map(|v| decode_i64(key, &v)).transpose()
    }

    fn put_i64(&self, key: &str, value: i64) -> Result<(), StorageError> {
        self.write(key, &value.to_be_bytes())
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
        match self.read(key)? {
            None => Ok(None),
            Some(v) if v.as_ref() == [1] => Ok(Some(true)),
            Some(v) if v.as_ref() == [0] => Ok(Some(false)),
            Some(v) => Err(StorageError::Corrupt {
                key: key.to_string(),
                reason: format!("invalid bool encoding {:?}", v.as_ref()),
            }),
        }
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.write(key, &[u8::from(value)])
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.read(key)?
            .map(|v| {
                String::from_utf8(v.to_vec()).map_err(|e| StorageError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    fn put_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write(key, value.as_bytes())
    }

    fn increment(&self, key: &str) -> Result<i64, StorageError> {
        let updated = self.db.update_and_fetch(key.as_bytes(), |old| {
            let current = old
                .and_then(|b| <[u8; 8]>::try_from(b).ok())
                .map_or(0, i64::from_be_bytes);
            Some(current.saturating_add(1).to_be_bytes().to_vec())
        })?;
        self.db.flush()?;
        updated.map_or(Ok(0), |v| decode_i64(key, &v))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.db.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Bool(bool),
    Text(String),
}

/// In-memory store for tests and ephemeral runs.
///
/// Thread-safe via `RwLock`. Not durable: data is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: RwLock<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let map = self.values.read().map_err(|_| StorageError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut map = self.values.write().map_err(|_| StorageError::Poisoned)?;
        map.insert(key.to_string(), value);
        Ok(())
    }

    fn type_mismatch(key: &str, expected: &str) -> StorageError {
        StorageError::Corrupt {
            key: key.to_string(),
            reason: format!("stored value is not {expected}"),
        }
    }
}

impl KeyValueStore for InMemoryStore {
    fn get_i64(&self, key: &str) -> Result<Option<i64>, StorageError> {
        match self.get(key)? {
            None => Ok(None),
            Some(Value::Int(v)) => Ok(Some(v)),
            Some(_) => Err(Self::type_mismatch(key, "an integer")),
        }
    }

    fn put_i64(&self, key: &str, value: i64) -> Result<(), StorageError> {
        self.set(key, Value::Int(value))
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
        match self.get(key)? {
            None => Ok(None),
            Some(Value::Bool(v)) => Ok(Some(v)),
            Some(_) => Err(Self::type_mismatch(key, "a bool")),
        }
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.set(key, Value::Bool(value))
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.get(key)? {
            None => Ok(None),
            Some(Value::Text(v)) => Ok(Some(v)),
            Some(_) => Err(Self::type_mismatch(key, "a string")),
        }
    }

    fn put_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.set(key, Value::Text(value.to_string()))
    }

    fn increment(&self, key: &str) -> Result<i64, StorageError> {
        let mut map = self.values.write().map_err(|_| StorageError::Poisoned)?;
        let next = match map.get(key) {
            None => 1,
            Some(Value::Int(v)) => v.saturating_add(1),
            Some(_) => return Err(Self::type_mismatch(key, "an integer")),
        };
        map.insert(key.to_string(), Value::Int(next));
        Ok(next)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.values.write().map_err(|_| StorageError::Poisoned)?;
        map.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}
