use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use super::KvStore;

const STORE_FILE: &str = "store.json";

/// Durable key-value store backed by a single JSON object file.
///
/// The file is loaded wholesale at construction and rewritten on every
/// mutation (write-through). If the substrate becomes unusable the store
/// degrades to memory-only: reads keep serving the loaded map, writes stop
/// reaching disk, and nothing propagates to callers.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
    available: AtomicBool,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let path = dir.join(STORE_FILE);

        if let Err(e) = fs::create_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "store directory unavailable, falling back to memory-only");
            return Self {
                path,
                entries: Mutex::new(HashMap::new()),
                available: AtomicBool::new(false),
            };
        }

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<HashMap<String, String>>(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "store file corrupt, starting empty");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            entries: Mutex::new(entries),
            available: AtomicBool::new(true),
        }
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        if !self.available.load(Ordering::Relaxed) {
            return;
        }

        let serialized = match serde_json::to_string(entries) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to serialize store contents");
                return;
            }
        };

        // Write to a sibling temp file and rename so a crash mid-write
        // never leaves a truncated store behind.
        let tmp = self.path.with_extension("json.tmp");
        let result = fs::write(&tmp, serialized).and_then(|_| fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "store write failed, continuing memory-only");
            self.available.store(false, Ordering::Relaxed);
        }
    }
}

impl KvStore for FileStore {
    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("store lock poisoned").get(key).cloned()
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().expect("store lock poisoned").keys().cloned().collect()
    }
}
