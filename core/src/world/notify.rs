use crate::{
	common::utility::{spawn_thread, ThreadHandle},
	entity::{dispatch, EntityId, WorldEvent, WorldProcessor},
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::{sync::Arc, time::Duration};

/// The log category for delivering world events.
static LOG: &'static str = "world-notify";

pub(super) type Targets = Vec<(EntityId, Arc<dyn WorldProcessor>)>;

enum Message {
	Deliver { event: Arc<WorldEvent>, targets: Targets },
	Flush(Sender<()>),
}

/// Delivers the events of one world on a dedicated thread, in the order they were sent.
pub(super) struct Notifier {
	sender: Sender<Message>,
	_thread: ThreadHandle,
}

impl Notifier {
	pub fn start() -> std::io::Result<Self> {
		let (sender, receiver) = crossbeam_channel::unbounded();
		let (handle, weak) = ThreadHandle::token();
		let join_handle = spawn_thread(LOG, move || {
			while ThreadHandle::is_alive(&weak) {
				match receiver.recv_timeout(Duration::from_millis(10)) {
					Ok(message) => Self::process(message),
					Err(RecvTimeoutError::Timeout) => {}
					Err(RecvTimeoutError::Disconnected) => break,
				}
			}
			// anything still queued when the world goes away is delivered before the thread exits
			Self::drain(&receiver);
			Ok(())
		})?;
		Ok(Self {
			sender,
			_thread: ThreadHandle::new(handle, join_handle),
		})
	}

	fn drain(receiver: &Receiver<Message>) {
		while let Ok(message) = receiver.try_recv() {
			Self::process(message);
		}
	}

	fn process(message: Message) {
		match message {
			Message::Deliver { event, targets } => {
				profiling::scope!("deliver", event.name());
				for (receiver, processor) in targets.into_iter() {
					let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
						dispatch(processor.as_ref(), receiver, &event)
					}));
					match result {
						Ok(Ok(())) => {}
						Ok(Err(error)) => log::error!(
							target: LOG,
							"Entity {} failed to process {}: {:?}",
							receiver,
							event.name(),
							error
						),
						Err(_) => log::error!(
							target: LOG,
							"Entity {} panicked while processing {}",
							receiver,
							event.name()
						),
					}
				}
			}
			Message::Flush(done) => {
				let _ = done.send(());
			}
		}
	}

	pub fn send(&self, event: WorldEvent, targets: Targets) {
		if targets.is_empty() {
			return;
		}
		let message = Message::Deliver {
			event: Arc::new(event),
			targets,
		};
		if self.sender.send(message).is_err() {
			log::warn!(target: LOG, "Dropping event, the notification thread has stopped");
		}
	}

	/// Blocks until every event sent before this call has been delivered.
	pub fn flush(&self) {
		let (done, wait) = crossbeam_channel::bounded(1);
		if self.sender.send(Message::Flush(done)).is_ok() {
			let _ = wait.recv();
		}
	}
}
