use super::recover;
use std::{
	collections::HashMap,
	sync::{Arc, RwLock},
};

/// A process-wide table of named implementations (chunk generators, light processors, entity kinds).
///
/// Entries are populated at startup and read by every world afterwards,
/// so reads hand out a clone of the [`Arc`] and never hold the lock longer than a lookup.
pub struct Registry<T: ?Sized> {
	entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> Default for Registry<T> {
	fn default() -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
		}
	}
}

impl<T: ?Sized> Registry<T> {
	/// Registers `value` under `id`, returning whatever was previously registered there.
	pub fn register_it(&self, id: impl Into<String>, value: Arc<T>) -> Option<Arc<T>> {
		recover(self.entries.write()).insert(id.into(), value)
	}

	pub fn unregister_it(&self, id: &str) -> Option<Arc<T>> {
		recover(self.entries.write()).remove(id)
	}

	pub fn get_it(&self, id: &str) -> Option<Arc<T>> {
		recover(self.entries.read()).get(id).cloned()
	}

	pub fn contains(&self, id: &str) -> bool {
		recover(self.entries.read()).contains_key(id)
	}

	pub fn ids(&self) -> Vec<String> {
		let mut ids = recover(self.entries.read())
			.keys()
			.cloned()
			.collect::<Vec<_>>();
		ids.sort();
		ids
	}
}
