mod data_file;
pub use data_file::*;

mod registry;
pub use registry::*;

mod thread;
pub use thread::*;

#[cfg(test)]
mod scratch;
#[cfg(test)]
pub(crate) use scratch::*;

/// Recovers the guard of a poisoned lock.
/// A panic on another thread must not take the whole world down with it,
/// so the data behind the lock is used as-is.
pub(crate) fn recover<G>(result: std::sync::LockResult<G>) -> G {
	match result {
		Ok(guard) => guard,
		Err(poisoned) => poisoned.into_inner(),
	}
}
