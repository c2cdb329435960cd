use std::collections::HashMap;
use std::sync::Mutex;

use super::KvStore;

/// In-memory store for tests and execution contexts without persistent
/// storage. Contents die with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("store lock poisoned").get(key).cloned()
    }

    fn remove(&self, key: &str) {
        self.entries.lock().expect("store lock poisoned").remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().expect("store lock poisoned").keys().cloned().collect()
    }
}
