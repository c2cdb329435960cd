mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Durable, synchronous, string-keyed storage substrate.
///
/// Storage unavailability is absorbed at this layer: a missing or broken
/// substrate reads as absent and writes become no-ops. Callers above treat
/// that as a cache miss, never as a fatal error.
pub trait KvStore: Send + Sync {
    fn set(&self, key: &str, value: &str);
    fn get(&self, key: &str) -> Option<String>;
    fn remove(&self, key: &str);
    /// All currently stored keys, for prefix scanning.
    fn keys(&self) -> Vec<String>;
}
