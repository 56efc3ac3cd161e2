use super::{
	chunk::{ArcLockChunk, TickOutcome, BORDER, COMPLETE, MAX_LEVEL},
	point::{fmt_chunk, ChunkCoord},
	settings::DAY_LENGTH,
	world::{State, LOG},
	World,
};
use crate::{block::Lookup, common::utility::recover, entity::EntityId};

impl World {
	/// Advances the world by one tick.
	///
	/// Tickets age and decide every chunk's load level; chunks are requested (lowest level first),
	/// waiting entities are placed, chunks nothing reaches anymore are unloaded once the configured
	/// delay passes, and every chunk whose level allows it runs its scheduled and random block ticks.
	/// Block behaviors and entity kinds are called last, after the world lock is released.
	#[profiling::function]
	pub fn tick(&self) {
		let _ticking = recover(self.tick_lock.lock());
		let lookup = Lookup::get();

		let (now, outcomes) = {
			let mut state = self.lock_state();
			self.update_levels(&mut state);
			self.request_leveled_chunks(&mut state);
			self.place_pending_entities(&mut state);
			self.unload_idle_chunks(&mut state);
			let now = state.data.tick;
			let outcomes = self.tick_chunks(&state, now, &lookup);
			self.advance_time(&mut state);
			(now, outcomes)
		};

		for outcome in outcomes.into_iter() {
			self.run_outcome(outcome, &lookup);
		}

		let interval = self.config().autosave_interval;
		if interval > 0 && now > 0 && now % interval == 0 {
			self.autosave();
		}
	}

	/// Ages every ticket, then recomputes and applies load levels.
	fn update_levels(&self, state: &mut State) {
		let entities = &state.entities;
		let expired = state.tickets.age(|id: EntityId| {
			entities
				.get(&id)
				.map(|attached| (attached.region.center, attached.region.radius))
		});
		if !expired.is_empty() {
			log::debug!(target: LOG, "{} tickets expired in world {:?}", expired.len(), self.id());
		}

		state.levels = state.tickets.compute_levels();
		let now = state.data.tick;
		let State {
			chunks,
			levels,
			ticketless,
			unload_pending,
			loading,
			..
		} = state;
		for (coordinate, arc_chunk) in chunks.iter() {
			let level = levels.get(coordinate).cloned().unwrap_or(MAX_LEVEL + 1);
			// a chunk still generating receives its level when the request finishes
			if !loading.contains_key(coordinate) {
				recover(arc_chunk.write()).set_load_level(level);
			}
			if level <= MAX_LEVEL {
				ticketless.remove(coordinate);
				unload_pending.remove(coordinate);
			} else {
				ticketless.entry(*coordinate).or_insert(now);
			}
		}
	}

	/// The generator stage a chunk at `level` must reach.
	fn target_stage(&self, level: u8) -> u8 {
		match level <= BORDER {
			true => COMPLETE,
			false => self.generator.generator.resume_level_for(level - BORDER),
		}
	}

	/// Requests the chunks tickets reach which are missing or not generated far enough,
	/// up to the configured number per tick.
	fn request_leveled_chunks(&self, state: &mut State) {
		let mut wanted = state
			.levels
			.iter()
			.filter(|(coordinate, _)| !state.loading.contains_key(*coordinate))
			.filter_map(|(coordinate, level)| {
				let target = self.target_stage(*level);
				let needed = match state.settled_chunk(coordinate) {
					Some(arc_chunk) => {
						let stage = recover(arc_chunk.read()).generator_stage();
						stage != COMPLETE && stage < target
					}
					None => true,
				};
				needed.then(|| (*level, *coordinate, target))
			})
			.collect::<Vec<_>>();
		wanted.sort_by_key(|(level, coordinate, _)| (*level, coordinate.x, coordinate.y));
		wanted.truncate(self.config().chunk_requests_per_tick);

		for (level, coordinate, target) in wanted.into_iter() {
			log::trace!(
				target: LOG,
				"Chunk {} at level {} needs stage {}",
				fmt_chunk(&coordinate),
				level,
				target
			);
			let _ = self.request_chunk_locked(state, coordinate, target, false);
		}
	}

	/// Saves and evicts the chunks no ticket has reached for the configured delay.
	fn unload_idle_chunks(&self, state: &mut State) {
		let now = state.data.tick;
		let delay = self.config().unload_delay;
		let idle = state
			.ticketless
			.iter()
			.filter(|(_, since)| now.saturating_sub(**since) >= delay)
			.map(|(coordinate, _)| *coordinate)
			.filter(|coordinate| !state.loading.contains_key(coordinate))
			.filter(|coordinate| !state.saving.contains_key(coordinate))
			.collect::<Vec<ChunkCoord>>();
		for coordinate in idle.into_iter() {
			log::trace!(target: LOG, "Unloading idle chunk {}", fmt_chunk(&coordinate));
			let _ = self.save_chunk_locked(state, coordinate, true);
		}
	}

	fn tick_chunks(&self, state: &State, now: u64, lookup: &Lookup) -> Vec<TickOutcome> {
		let speed = state.data.game_rules.random_tick_speed;
		let mut rng = recover(self.rng.lock());
		let mut coordinates = state.chunks.keys().cloned().collect::<Vec<_>>();
		// a stable order keeps random ticks reproducible for a given seed
		coordinates.sort_by_key(|coordinate| (coordinate.x, coordinate.y));
		coordinates
			.iter()
			.filter_map(|coordinate| state.settled_chunk(coordinate))
			.map(|arc_chunk: &ArcLockChunk| recover(arc_chunk.write()).tick(now, speed, &mut *rng, lookup))
			.filter(|outcome| !outcome.is_empty())
			.collect()
	}

	fn advance_time(&self, state: &mut State) {
		let data = &mut state.data;
		data.tick += 1;
		if data.game_rules.do_daylight_cycle {
			data.day_time = (data.day_time + 1) % DAY_LENGTH;
		}
		if data.weather.remaining > 0 {
			data.weather.remaining -= 1;
			if data.weather.remaining == 0 {
				data.weather.raining = false;
				data.weather.thundering = false;
			}
		}
	}

	/// Hands the collected ticks to block behaviors and entity kinds. No lock is held.
	fn run_outcome(&self, outcome: TickOutcome, lookup: &Lookup) {
		let behavior_of = |id| lookup.properties(id).and_then(|properties| properties.behavior()).cloned();
		for (point, id) in outcome.block_ticks.into_iter() {
			if let Some(behavior) = behavior_of(id) {
				self.guarded("scheduled tick", || behavior.on_scheduled_tick(self, point, id));
			}
		}
		for (point, id) in outcome.liquid_ticks.into_iter() {
			if let Some(behavior) = behavior_of(id) {
				self.guarded("liquid tick", || behavior.on_liquid_tick(self, point, id));
			}
		}
		for (point, id) in outcome.random_ticks.into_iter() {
			if let Some(behavior) = behavior_of(id) {
				self.guarded("random tick", || behavior.on_random_tick(self, point, id));
			}
		}
		for entity in outcome.entities.into_iter() {
			let kind = recover(entity.read()).kind().clone();
			self.guarded("entity tick", || kind.tick(&entity, self));
		}
	}

	/// Runs a callback, logging (and surviving) any panic it raises.
	fn guarded<F: FnOnce()>(&self, what: &str, callback: F) {
		if std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)).is_err() {
			log::error!(target: LOG, "Panicked during {} in world {:?}", what, self.id());
		}
	}

	/// Writes the world data and starts saving every resident chunk without waiting for them.
	fn autosave(&self) {
		log::info!(target: LOG, "Autosaving world {:?}", self.id());
		if let Err(error) = self.save_data() {
			log::error!(target: LOG, "Failed to save world {:?}: {:?}", self.id(), error);
		}
		let _ = self.save_chunks(self.resident_chunks(), false);
	}
}

/// Blocks until the world has no chunk operation in flight, or the timeout passes.
#[cfg(test)]
pub(crate) fn settle(world: &World, timeout: std::time::Duration) -> bool {
	let start = std::time::Instant::now();
	while world.has_operations_in_flight() {
		if start.elapsed() > timeout {
			return false;
		}
		std::thread::sleep(std::time::Duration::from_millis(5));
	}
	true
}

#[cfg(test)]
mod tick {
	use super::*;
	use crate::{
		common::utility::ScratchDir,
		entity::{ArcLockEntity, Entity, Kind},
		world::{
			chunk::{Chunk, Ticket},
			new_entity,
			point::chunk,
			testing::{flat_data, open, runtime},
		},
	};
	use nalgebra::Point3;
	use std::{
		sync::{
			atomic::{AtomicUsize, Ordering},
			Arc,
		},
		time::Duration,
	};

	const SETTLE: Duration = Duration::from_secs(10);

	#[test]
	fn time_advances() {
		let rt = runtime();
		let dir = ScratchDir::new("tick-time");
		let world = open(&dir, &rt, flat_data());
		world.tick();
		world.tick();
		assert_eq!(world.tick_count(), 2);
		assert_eq!(world.day_time(), 2);

		world.edit_data(|data| {
			data.game_rules.do_daylight_cycle = false;
			data.day_time = DAY_LENGTH - 1;
			data.weather.raining = true;
			data.weather.remaining = 1;
		});
		world.tick();
		assert_eq!(world.tick_count(), 3);
		assert_eq!(world.day_time(), DAY_LENGTH - 1);
		assert!(!world.data().weather.raining);
	}

	#[test]
	fn tickets_load_and_idle_chunks_unload() {
		let rt = runtime();
		let dir = ScratchDir::new("tick-tickets");
		let world = open(&dir, &rt, flat_data());
		let coordinate = chunk(10, 10);
		let ticket = world.add_ticket(Ticket::new(coordinate, 0, MAX_LEVEL));

		world.tick();
		assert_eq!(world.load_level(&coordinate), Some(MAX_LEVEL));
		assert!(settle(&world, SETTLE));
		assert!(world.is_resident(&coordinate));
		assert!(world.is_resident(&chunk(0, 0)));

		assert!(world.remove_ticket(ticket));
		world.tick();
		assert_eq!(world.load_level(&coordinate), None);
		assert!(settle(&world, SETTLE));
		assert!(!world.is_resident(&coordinate));
		assert!(Chunk::create_path_for(world.root(), &coordinate).exists());
		// still held by the spawn ticket
		assert!(world.is_resident(&chunk(0, 0)));
	}

	#[test]
	fn spawn_ticket_is_permanent() {
		let rt = runtime();
		let dir = ScratchDir::new("tick-spawn");
		let world = open(&dir, &rt, flat_data());
		assert_eq!(world.ticket_count(), 1);
		for id in 0..4 {
			assert!(!world.remove_ticket(id));
		}
		assert_eq!(world.ticket_count(), 1);
	}

	static TICKS: AtomicUsize = AtomicUsize::new(0);

	struct Counter;
	impl Kind for Counter {
		fn id(&self) -> &str {
			"test:counter"
		}

		fn is_saveable(&self) -> bool {
			false
		}

		fn tick(&self, entity: &ArcLockEntity, _world: &World) {
			TICKS.fetch_add(1, Ordering::SeqCst);
			entity.write().unwrap().position.y += 1.0;
		}
	}

	#[test]
	fn entities_tick_in_entity_ticking_chunks() {
		let rt = runtime();
		let dir = ScratchDir::new("tick-entities");
		let world = open(&dir, &rt, flat_data());
		let coordinate = chunk(-3, 2);
		// keeps the chunk resident without ticking it
		world.add_ticket(Ticket::new(coordinate, 0, 40));
		world.request_chunk_data_sync(coordinate).unwrap();

		let entity = new_entity(Entity::new(Arc::new(Counter)).with_position(Point3::new(-40.0, 70.0, 40.0)));
		world.register_entity(&entity).unwrap();

		// placed, but the chunk is only at the lowest level
		world.tick();
		assert_eq!(world.pending_entity_count(), 0);
		assert_eq!(TICKS.load(Ordering::SeqCst), 0);

		world.add_ticket(Ticket::new(coordinate, 0, 31));
		world.tick();
		assert_eq!(TICKS.load(Ordering::SeqCst), 1);
		assert_eq!(entity.read().unwrap().position.y, 71.0);
	}
}
