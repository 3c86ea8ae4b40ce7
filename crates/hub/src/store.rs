use std::collections::HashMap;
use std::path::PathBuf;

/// BufferStore persists observation buffer backups as opaque blobs
/// keyed by absolute observation path. The hub restores a blob when an
/// observation is created, rewrites it as the buffer changes, and
/// purges obsolete blobs when an update window closes.
pub trait BufferStore {
    fn load(&mut self, key: &str) -> Option<Vec<u8>>;
    fn save(&mut self, key: &str, blob: &[u8]);
    fn delete(&mut self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// In-memory store; backups do not survive the process.
#[derive(Default)]
pub struct MemoryBufferStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl BufferStore for MemoryBufferStore {
    fn load(&mut self, key: &str) -> Option<Vec<u8>> {
        self.blobs.get(key).cloned()
    }

    fn save(&mut self, key: &str, blob: &[u8]) {
        self.blobs.insert(key.to_string(), blob.to_vec());
    }

    fn delete(&mut self, key: &str) {
        self.blobs.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.blobs.keys().cloned().collect()
    }
}

/// Directory-backed store: one file per observation. Path segments
/// cannot contain `.`, so `/obs/trend/a` maps injectively onto the
/// file name `obs.trend.a`.
pub struct DirBufferStore {
    dir: PathBuf,
}

impl DirBufferStore {
    pub fn new(dir: impl Into<PathBuf>) -> DirBufferStore {
        DirBufferStore { dir: dir.into() }
    }

    fn file_of(&self, key: &str) -> PathBuf {
        self.dir.join(key.trim_start_matches('/').replace('/', "."))
    }
}

impl BufferStore for DirBufferStore {
    fn load(&mut self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.file_of(key)).ok()
    }

    fn save(&mut self, key: &str, blob: &[u8]) {
        if let Err(err) = std::fs::write(self.file_of(key), blob) {
            tracing::warn!(key, %err, "failed to write buffer backup");
        }
    }

    fn delete(&mut self, key: &str) {
        let _ = std::fs::remove_file(self.file_of(key));
    }

    fn keys(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .map(|name| format!("/{}", name.replace('.', "/")))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryBufferStore::default();
        assert_eq!(store.load("/obs/x"), None);
        store.save("/obs/x", b"blob");
        assert_eq!(store.load("/obs/x"), Some(b"blob".to_vec()));
        assert_eq!(store.keys(), vec!["/obs/x".to_string()]);
        store.delete("/obs/x");
        assert_eq!(store.load("/obs/x"), None);
    }

    #[test]
    fn test_dir_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirBufferStore::new(dir.path());

        store.save("/obs/trend", b"blob");
        assert_eq!(store.load("/obs/trend"), Some(b"blob".to_vec()));
        assert_eq!(store.keys(), vec!["/obs/trend".to_string()]);
        assert!(dir.path().join("obs.trend").exists());

        store.delete("/obs/trend");
        assert_eq!(store.load("/obs/trend"), None);
        assert!(store.keys().is_empty());
    }
}
