use crate::common::utility::recover;
use std::{
	collections::BTreeMap,
	sync::{Condvar, Mutex, MutexGuard},
};

/// Keeps every chunk generated by one generator in step at the generator's blocking stages.
///
/// Each generating task joins as a participant with the stage its chunk is at, and reports every stage
/// it is about to process through [`wait`](Participant::wait). A task may process a stage at or past a
/// boundary only once every participant has reached that boundary, including tasks which joined late.
/// The participant furthest behind is never held back, so the group always makes progress.
/// Tasks which leave (finished, paused or failed) stop holding anyone back.
pub struct StageBarrier {
	boundaries: Vec<u8>,
	locked: Vec<u8>,
	state: Mutex<State>,
	wake: Condvar,
	stage_lock: Mutex<()>,
}

#[derive(Default, Debug)]
struct State {
	next_id: u64,
	/// The stage each participant last reported.
	stages: BTreeMap<u64, u8>,
}

/// Membership in a [`StageBarrier`]. Dropping it leaves the barrier.
pub struct Participant<'barrier> {
	barrier: &'barrier StageBarrier,
	id: u64,
}

impl<'barrier> Drop for Participant<'barrier> {
	fn drop(&mut self) {
		self.barrier.leave(self.id);
	}
}

impl<'barrier> Participant<'barrier> {
	/// Blocks until a chunk at `stage` is allowed to process it.
	pub fn wait(&self, stage: u8) {
		self.barrier.wait(self.id, stage);
	}
}

impl StageBarrier {
	pub fn new(blocking_stages: &[u8], locked_stages: &[u8]) -> Self {
		let mut boundaries = blocking_stages.to_vec();
		boundaries.sort();
		boundaries.dedup();
		Self {
			boundaries,
			locked: locked_stages.to_vec(),
			state: Mutex::new(State::default()),
			wake: Condvar::new(),
			stage_lock: Mutex::new(()),
		}
	}

	/// Joins with a chunk currently at `stage`.
	pub fn join(&self, stage: u8) -> Participant<'_> {
		let mut state = recover(self.state.lock());
		let id = state.next_id;
		state.next_id += 1;
		state.stages.insert(id, stage);
		Participant { barrier: self, id }
	}

	pub fn participants(&self) -> usize {
		recover(self.state.lock()).stages.len()
	}

	/// The stage of the participant furthest behind, if anyone is generating.
	pub fn lowest_stage(&self) -> Option<u8> {
		recover(self.state.lock()).stages.values().min().cloned()
	}

	/// The last boundary at or before `stage`.
	fn boundary_for(&self, stage: u8) -> Option<u8> {
		self.boundaries.iter().rev().find(|boundary| **boundary <= stage).cloned()
	}

	fn wait(&self, id: u64, stage: u8) {
		let mut state = recover(self.state.lock());
		state.stages.insert(id, stage);
		// reporting progress may release anyone waiting on this participant
		self.wake.notify_all();

		let boundary = match self.boundary_for(stage) {
			Some(boundary) => boundary,
			None => return,
		};
		while state.stages.values().any(|other| *other < boundary) {
			state = recover(self.wake.wait(state));
		}
	}

	fn leave(&self, id: u64) {
		let mut state = recover(self.state.lock());
		state.stages.remove(&id);
		self.wake.notify_all();
	}

	/// Serializes work at the generator's locked stages. Returns None for every other stage.
	pub fn lock_stage(&self, stage: u8) -> Option<MutexGuard<'_, ()>> {
		if self.locked.contains(&stage) {
			Some(recover(self.stage_lock.lock()))
		} else {
			None
		}
	}
}
