use std::{
	collections::HashMap,
	sync::{Arc, RwLock}
};
use crate::keyspace::Key;

pub type Value = Vec<u8>;

pub trait KvStore {
	fn get(&self, key: &Key) -> Option<Value>;
	fn set(&self, key: Key, value: Value);
	fn del(&self, key: &Key);
	fn keys(&self) -> Vec<Key>;
}

/// Thread-safe in-memory store, keyed by ring identifier.
/// The internal lock is independent of any node state.
#[derive(Clone)]
pub struct MemoryStore {
	data: Arc<RwLock<HashMap<Key, Value>>>
}

impl MemoryStore {
	pub fn new() -> Self {
		MemoryStore {
			data: Arc::new(RwLock::new(HashMap::new()))
		}
	}
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl KvStore for MemoryStore {
	fn get(&self, key: &Key) -> Option<Value> {
		let data = self.data.read().unwrap();
		data.get(key).cloned()
	}

	fn set(&self, key: Key, value: Value) {
		let mut data = self.data.write().unwrap();
		data.insert(key, value);
	}

	/// Removing a missing key is a no-op.
	fn del(&self, key: &Key) {
		let mut data = self.data.write().unwrap();
		data.remove(key);
	}

	/// Snapshot of the stored identifiers, in no particular order.
	fn keys(&self) -> Vec<Key> {
		let data = self.data.read().unwrap();
		data.keys().copied().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::keyspace::generate;
	use std::{thread, time::Duration};

	#[test]
	fn test_memory_store() {
		let store = MemoryStore::new();
		let key = generate(b"hello");
		let val = b"world".to_vec();

		store.set(key, val.clone());
		assert_eq!(store.get(&key), Some(val));

		let keys = store.keys();
		assert_eq!(keys, vec![key]);

		store.del(&key);
		assert_eq!(store.get(&key), None);
		// deleting again is a no-op
		store.del(&key);
		assert!(store.keys().is_empty());
	}

	#[test]
	fn test_memory_store_thread_safety() {
		let store = MemoryStore::new();
		let key = generate(b"key");

		let mut handles = Vec::new();
		for j in 0..3u64 {
			let store = store.clone();
			handles.push(thread::spawn(move || {
				thread::sleep(Duration::from_millis(j * 10));
				store.set(key, format!("val-{}", j).into_bytes());
			}));
		}
		for h in handles {
			h.join().unwrap();
		}

		assert_eq!(store.get(&key), Some(b"val-2".to_vec()));
	}
}
