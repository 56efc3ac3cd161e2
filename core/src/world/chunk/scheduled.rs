use crate::world::{point::LocalPoint, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The number of priority bands. Priorities range from `0` (first) down to `-(BANDS - 1)` (last).
pub const BANDS: usize = 4;

/// A scheduled tick as it is stored in a chunk file.
/// The due tick is kept relative to the tick the chunk was saved at, so queues survive downtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTick {
	pub priority: i8,
	pub remaining: u64,
	pub x: u8,
	pub y: i64,
	pub z: u8,
}

/// Queue of block positions waiting for a tick, split into priority bands.
/// Within a band entries are drained by due tick, then by insertion order.
#[derive(Clone, Debug, Default)]
pub struct TickQueue {
	bands: [BTreeMap<(u64, u64), LocalPoint>; BANDS],
	next_sequence: u64,
}

fn band_of(priority: i32) -> Result<usize, Error> {
	if priority > 0 || priority <= -(BANDS as i32) {
		return Err(Error::InvalidTickPriority(priority));
	}
	Ok((-priority) as usize)
}

impl TickQueue {
	pub fn push(&mut self, point: LocalPoint, due: u64, priority: i32) -> Result<(), Error> {
		let band = band_of(priority)?;
		let sequence = self.next_sequence;
		self.next_sequence += 1;
		self.bands[band].insert((due, sequence), point);
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.bands.iter().map(|band| band.len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.bands.iter().all(|band| band.is_empty())
	}

	pub fn clear(&mut self) {
		self.bands.iter_mut().for_each(|band| band.clear());
	}

	/// Removes every entry whose due tick is at or before `now`, highest priority band first.
	pub fn drain_due(&mut self, now: u64) -> Vec<LocalPoint> {
		let mut due = Vec::new();
		for band in self.bands.iter_mut() {
			let later = band.split_off(&(now + 1, 0));
			let ready = std::mem::replace(band, later);
			due.extend(ready.into_values());
		}
		due
	}

	/// The due tick of every entry, in drain order. Mostly useful for inspection.
	pub fn due_ticks(&self) -> Vec<(i32, u64, LocalPoint)> {
		let mut entries = Vec::with_capacity(self.len());
		for (band, entries_in_band) in self.bands.iter().enumerate() {
			for ((due, _), point) in entries_in_band.iter() {
				entries.push((-(band as i32), *due, *point));
			}
		}
		entries
	}

	pub(crate) fn to_saved(&self, now: u64) -> Vec<SavedTick> {
		self.due_ticks()
			.into_iter()
			.map(|(priority, due, point)| SavedTick {
				priority: priority as i8,
				remaining: due.saturating_sub(now),
				x: point.x,
				y: point.y,
				z: point.z,
			})
			.collect()
	}

	/// Rebuilds a queue from its stored form, re-basing every entry on `now`.
	/// Entries with an out-of-range priority or local position are dropped.
	pub(crate) fn from_saved(saved: &[SavedTick], now: u64) -> Self {
		let mut queue = Self::default();
		for tick in saved.iter() {
			if tick.x >= 16 || tick.z >= 16 {
				continue;
			}
			let point = LocalPoint::new(tick.x, tick.y, tick.z);
			if queue
				.push(point, now.saturating_add(tick.remaining), tick.priority as i32)
				.is_err()
			{
				log::warn!(target: "world", "Dropping saved tick with priority {}", tick.priority);
			}
		}
		queue
	}
}
