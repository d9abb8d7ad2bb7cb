//! The key-value primitives the engine runs on, and an in-process store.
//!
//! [KvBackend] is the whole contract with the outside world: scalar get/set,
//! field maps ("hashes"), unordered sets, an atomic counter and an atomic
//! multi-operation batch. Connection handling lives with whoever implements it.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::trace;

/// Failure reported by a backend handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend could not be reached, or dropped the connection mid-call.
    #[error("connection error: {0}")]
    Connection(String),

    /// The key holds a different kind of value than the operation expects.
    #[error("WRONGTYPE operation against key {key:?} holding the wrong kind of value")]
    WrongType {
        /// Offending key.
        key: String,
    },

    /// INCR on a scalar that does not hold an integer.
    #[error("value at key {key:?} is not an integer")]
    NotAnInteger {
        /// Offending key.
        key: String,
    },

    /// Any other backend-specific failure.
    #[error("backend error: {0}")]
    Other(String),
}

/// Result alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// One write inside an [KvBackend::atomic] batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Set a scalar.
    Set { key: String, value: String },
    /// Delete a key of any kind.
    Del { key: String },
    /// Merge fields into a field map, creating it if needed.
    HSet {
        key: String,
        fields: HashMap<String, String>,
    },
    /// Add a member to a set.
    SAdd { key: String, member: String },
    /// Remove a member from a set.
    SRem { key: String, member: String },
}

impl BatchOp {
    /// Key this operation writes to.
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. }
            | Self::Del { key }
            | Self::HSet { key, .. }
            | Self::SAdd { key, .. }
            | Self::SRem { key, .. } => key,
        }
    }
}

/// A live handle to a key-value store.
///
/// Every call blocks until the store answers. Absent keys read as empty: `get`
/// returns `None`, `hgetall` an empty map, `smembers` an empty list.
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &str) -> BackendResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> BackendResult<()>;

    /// Deletes `key`, returning whether it existed.
    fn del(&self, key: &str) -> BackendResult<bool>;

    fn exists(&self, key: &str) -> BackendResult<bool>;

    fn hgetall(&self, key: &str) -> BackendResult<HashMap<String, String>>;

    /// Merges `fields` into the field map at `key`.
    fn hset(&self, key: &str, fields: &HashMap<String, String>) -> BackendResult<()>;

    /// Adds `member`, returning whether it was newly inserted.
    fn sadd(&self, key: &str, member: &str) -> BackendResult<bool>;

    /// Removes `member`, returning whether it was present.
    fn srem(&self, key: &str, member: &str) -> BackendResult<bool>;

    /// Lists set members in no particular order.
    fn smembers(&self, key: &str) -> BackendResult<Vec<String>>;

    /// Atomically increments the integer at `key` (absent counts as 0) and
    /// returns the new value.
    fn incr(&self, key: &str) -> BackendResult<i64>;

    /// Applies every op or none of them.
    fn atomic(&self, ops: Vec<BatchOp>) -> BackendResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Scalar(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}

type Keyspace = HashMap<String, Entry>;

/// In-process [KvBackend] with Redis-like semantics.
///
/// Emptied hashes and sets disappear, and a batch that fails part-way is
/// rolled back before the error is returned.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<Keyspace>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every key currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn hash_mut<'a>(data: &'a mut Keyspace, key: &str) -> BackendResult<&'a mut HashMap<String, String>> {
        match data
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()))
        {
            Entry::Hash(fields) => Ok(fields),
            _ => Err(wrong_type(key)),
        }
    }

    fn set_mut<'a>(data: &'a mut Keyspace, key: &str) -> BackendResult<&'a mut HashSet<String>> {
        match data
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(HashSet::new()))
        {
            Entry::Set(members) => Ok(members),
            _ => Err(wrong_type(key)),
        }
    }

    fn apply_set(data: &mut Keyspace, key: &str, value: &str) {
        data.insert(key.to_string(), Entry::Scalar(value.to_string()));
    }

    fn apply_hset(
        data: &mut Keyspace,
        key: &str,
        fields: &HashMap<String, String>,
    ) -> BackendResult<()> {
        if fields.is_empty() {
            return match data.get(key) {
                None | Some(Entry::Hash(_)) => Ok(()),
                Some(_) => Err(wrong_type(key)),
            };
        }
        let hash = Self::hash_mut(data, key)?;
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    fn apply_sadd(data: &mut Keyspace, key: &str, member: &str) -> BackendResult<bool> {
        Ok(Self::set_mut(data, key)?.insert(member.to_string()))
    }

    fn apply_srem(data: &mut Keyspace, key: &str, member: &str) -> BackendResult<bool> {
        let removed = match data.get_mut(key) {
            None => return Ok(false),
            Some(Entry::Set(members)) => members.remove(member),
            Some(_) => return Err(wrong_type(key)),
        };
        if matches!(data.get(key), Some(Entry::Set(members)) if members.is_empty()) {
            data.remove(key);
        }
        Ok(removed)
    }

    fn apply(data: &mut Keyspace, op: &BatchOp) -> BackendResult<()> {
        match op {
            BatchOp::Set { key, value } => Self::apply_set(data, key, value),
            BatchOp::Del { key } => {
                data.remove(key);
            }
            BatchOp::HSet { key, fields } => Self::apply_hset(data, key, fields)?,
            BatchOp::SAdd { key, member } => {
                Self::apply_sadd(data, key, member)?;
            }
            BatchOp::SRem { key, member } => {
                Self::apply_srem(data, key, member)?;
            }
        }
        Ok(())
    }
}

fn wrong_type(key: &str) -> BackendError {
    BackendError::WrongType {
        key: key.to_string(),
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        match self.data.lock().get(key) {
            None => Ok(None),
            Some(Entry::Scalar(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        Self::apply_set(&mut self.data.lock(), key, value);
        Ok(())
    }

    fn del(&self, key: &str) -> BackendResult<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }

    fn exists(&self, key: &str) -> BackendResult<bool> {
        Ok(self.data.lock().contains_key(key))
    }

    fn hgetall(&self, key: &str) -> BackendResult<HashMap<String, String>> {
        match self.data.lock().get(key) {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(fields)) => Ok(fields.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn hset(&self, key: &str, fields: &HashMap<String, String>) -> BackendResult<()> {
        Self::apply_hset(&mut self.data.lock(), key, fields)
    }

    fn sadd(&self, key: &str, member: &str) -> BackendResult<bool> {
        Self::apply_sadd(&mut self.data.lock(), key, member)
    }

    fn srem(&self, key: &str, member: &str) -> BackendResult<bool> {
        Self::apply_srem(&mut self.data.lock(), key, member)
    }

    fn smembers(&self, key: &str) -> BackendResult<Vec<String>> {
        match self.data.lock().get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn incr(&self, key: &str) -> BackendResult<i64> {
        let mut data = self.data.lock();
        let current = match data.get(key) {
            None => 0,
            Some(Entry::Scalar(value)) => {
                value
                    .parse::<i64>()
                    .map_err(|_| BackendError::NotAnInteger {
                        key: key.to_string(),
                    })?
            }
            Some(_) => return Err(wrong_type(key)),
        };
        let next = current.checked_add(1).ok_or_else(|| BackendError::NotAnInteger {
            key: key.to_string(),
        })?;
        Self::apply_set(&mut data, key, &next.to_string());
        Ok(next)
    }

    fn atomic(&self, ops: Vec<BatchOp>) -> BackendResult<()> {
        let mut data = self.data.lock();
        // Original entry of every key touched so far, restored if any op fails.
        let mut undo: Vec<(String, Option<Entry>)> = Vec::new();

        for op in &ops {
            let key = op.key();
            if !undo.iter().any(|(saved, _)| saved == key) {
                undo.push((key.to_string(), data.get(key).cloned()));
            }
            if let Err(err) = Self::apply(&mut data, op) {
                for (key, previous) in undo {
                    match previous {
                        Some(entry) => data.insert(key, entry),
                        None => data.remove(&key),
                    };
                }
                return Err(err);
            }
        }

        trace!(ops = ops.len(), "applied atomic batch");
        Ok(())
    }
}
