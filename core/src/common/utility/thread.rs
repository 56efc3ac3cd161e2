use std::{
	sync::{Arc, Weak},
	thread::JoinHandle,
};

/// Keeps a worker thread alive.
/// The thread polls [`is_alive`](ThreadHandle::is_alive) on its [`Weak`] copy
/// and exits once the handle is dropped; dropping also joins the thread.
pub struct ThreadHandle {
	handle: Option<Arc<()>>,
	join_handle: Option<JoinHandle<()>>,
}

impl ThreadHandle {
	pub fn new(handle: Arc<()>, join_handle: JoinHandle<()>) -> Self {
		Self {
			handle: Some(handle),
			join_handle: Some(join_handle),
		}
	}

	/// Creates the liveness token for a thread about to be spawned.
	pub fn token() -> (Arc<()>, Weak<()>) {
		let handle = Arc::new(());
		let weak = Arc::downgrade(&handle);
		(handle, weak)
	}

	pub fn is_alive(weak: &Weak<()>) -> bool {
		weak.strong_count() > 0
	}

	pub fn stop(mut self) {
		self.stop_and_join();
	}

	fn stop_and_join(&mut self) {
		let _ = self.handle.take();
		if let Some(join_handle) = self.join_handle.take() {
			// The last owner of a world can be its own worker thread; joining itself would never return.
			if join_handle.thread().id() == std::thread::current().id() {
				return;
			}
			if join_handle.join().is_err() {
				log::error!("Worker thread panicked before it could be joined");
			}
		}
	}
}

impl Drop for ThreadHandle {
	fn drop(&mut self) {
		self.stop_and_join();
	}
}

/// Spawns a named thread, logging any error or panic the body produces.
pub fn spawn_thread<F>(name: &'static str, body: F) -> std::io::Result<JoinHandle<()>>
where
	F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
	std::thread::Builder::new()
		.name(name.to_owned())
		.spawn(move || {
			let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(body));
			match result {
				Ok(Ok(())) => {}
				Ok(Err(error)) => log::error!(target: name, "{:?}", error),
				Err(_) => log::error!(target: name, "Thread panicked"),
			}
		})
}

#[cfg(test)]
mod thread {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[test]
	fn dropping_handle_stops_thread() {
		let iterations = Arc::new(AtomicUsize::new(0));
		let (handle, weak) = ThreadHandle::token();
		let thread_iterations = iterations.clone();
		let join_handle = spawn_thread("test-loop", move || {
			while ThreadHandle::is_alive(&weak) {
				thread_iterations.fetch_add(1, Ordering::SeqCst);
				std::thread::sleep(std::time::Duration::from_millis(1));
			}
			Ok(())
		})
		.unwrap();
		let thread_handle = ThreadHandle::new(handle, join_handle);
		std::thread::sleep(std::time::Duration::from_millis(10));
		thread_handle.stop();
		let after_stop = iterations.load(Ordering::SeqCst);
		std::thread::sleep(std::time::Duration::from_millis(10));
		assert_eq!(iterations.load(Ordering::SeqCst), after_stop);
	}
}
