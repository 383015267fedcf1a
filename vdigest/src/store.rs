//! Digest persistence and the editor payload cache.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Digest, DigestId};

/// Key-addressed storage of digest records.
///
/// `save` must be all-or-nothing: after a failed save the previous record is
/// still what `load` returns.
pub trait DigestStore: Send + Sync {
    fn load(&self, id: &DigestId) -> Result<Option<Digest>>;
    fn save(&self, digest: &Digest) -> Result<()>;
}

/// One JSON file per digest, replaced atomically through a temp file.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::PersistenceFailure(format!("cannot create store dir {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &DigestId) -> Result<PathBuf> {
        let name = id.as_str();
        let safe = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(Error::PersistenceFailure(format!("invalid digest id: {name:?}")));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }
}

impl DigestStore for FileStore {
    fn load(&self, id: &DigestId) -> Result<Option<Digest>> {
        let path = self.path_for(id)?;
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::PersistenceFailure(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| Error::PersistenceFailure(format!("corrupt record {}: {e}", path.display())))
    }

    fn save(&self, digest: &Digest) -> Result<()> {
        let path = self.path_for(&digest.id)?;
        let json = serde_json::to_vec_pretty(digest)
            .map_err(|e| Error::PersistenceFailure(format!("cannot encode digest: {e}")))?;

        // Write to a temp file first, then rename over the old record.
        let tmp_path = path.with_extension("json.part");
        let write = std::fs::write(&tmp_path, &json).and_then(|()| std::fs::rename(&tmp_path, &path));
        if let Err(e) = write {
            std::fs::remove_file(&tmp_path).ok();
            return Err(Error::PersistenceFailure(format!(
                "cannot write {}: {e}",
                path.display()
            )));
        }
        debug!(id = %digest.id, state = %digest.state, "digest saved");
        Ok(())
    }
}

/// In-process store, mostly for tests and embedding.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<DigestId, Digest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DigestStore for MemoryStore {
    fn load(&self, id: &DigestId) -> Result<Option<Digest>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(id).cloned())
    }

    fn save(&self, digest: &Digest) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(digest.id.clone(), digest.clone());
        Ok(())
    }
}

/// Bounded cache of serialized editor payloads.
///
/// Entries are evicted oldest-first once `capacity` is exceeded, and must be
/// invalidated on every successful write of the underlying record. There is
/// no time-based expiry.
pub struct PayloadCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<DigestId, Arc<str>>,
    order: VecDeque<DigestId>,
}

impl PayloadCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn get(&self, id: &DigestId) -> Option<Arc<str>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.get(id).cloned()
    }

    pub fn put(&self, id: &DigestId, payload: Arc<str>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.entries.insert(id.clone(), payload).is_none() {
            inner.order.push_back(id.clone());
        }
        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
    }

    pub fn invalidate(&self, id: &DigestId) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.entries.remove(id).is_some() {
            inner.order.retain(|k| k != id);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DigestState, VideoId};

    fn digest() -> Digest {
        Digest::new(VideoId::parse("abc123").unwrap(), Some("Talk".into()))
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("digests")).unwrap();
        let mut d = digest();
        assert_eq!(store.load(&d.id).unwrap(), None);

        store.save(&d).unwrap();
        d.state = DigestState::Ready;
        store.save(&d).unwrap();

        let loaded = store.load(&d.id).unwrap().unwrap();
        assert_eq!(loaded.state, DigestState::Ready);
        assert_eq!(loaded.title.as_deref(), Some("Talk"));
        assert!(!store.dir().join(format!("{}.json.part", d.id)).exists());
    }

    #[test]
    fn test_file_store_rejects_path_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let err = store.load(&DigestId::from("../etc/passwd")).unwrap_err();
        assert!(matches!(err, Error::PersistenceFailure(_)));
    }

    #[test]
    fn test_file_store_corrupt_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let err = store.load(&DigestId::from("bad")).unwrap_err();
        assert!(matches!(err, Error::PersistenceFailure(_)));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        let d = digest();
        store.save(&d).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(&d.id).unwrap(), Some(d.clone()));
        assert_eq!(store.load(&DigestId::from("other")).unwrap(), None);
    }

    #[test]
    fn test_cache_put_get_invalidate() {
        let cache = PayloadCache::new(4);
        let id = DigestId::from("a");
        cache.put(&id, Arc::from("{}"));
        assert_eq!(cache.get(&id).as_deref(), Some("{}"));
        cache.invalidate(&id);
        assert!(cache.get(&id).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let cache = PayloadCache::new(2);
        for key in ["a", "b", "c"] {
            cache.put(&DigestId::from(key), Arc::from(key));
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&DigestId::from("a")).is_none());
        assert!(cache.get(&DigestId::from("c")).is_some());
    }

    #[test]
    fn test_cache_replace_does_not_duplicate_order() {
        let cache = PayloadCache::new(2);
        let a = DigestId::from("a");
        cache.put(&a, Arc::from("1"));
        cache.put(&a, Arc::from("2"));
        cache.put(&DigestId::from("b"), Arc::from("3"));
        assert_eq!(cache.get(&a).as_deref(), Some("2"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_zero_capacity_disabled() {
        let cache = PayloadCache::new(0);
        cache.put(&DigestId::from("a"), Arc::from("x"));
        assert!(cache.is_empty());
    }
}
