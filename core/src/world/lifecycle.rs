use super::{
	chunk::{ArcLockChunk, Chunk, Source, COMPLETE, MAX_LEVEL},
	point::{fmt_chunk, BlockPoint, ChunkCoord},
	world::State,
	World,
};
use crate::{
	block::Lookup,
	common::utility::recover,
	entity::{Entity, WorldEvent},
};
use futures::future::{BoxFuture, FutureExt, Shared};
use nalgebra::Point3;
use std::sync::{Arc, RwLock};

/// The log category for loading, generating and saving chunks.
static LOG: &'static str = "chunk-lifecycle";

/// Resolves to the chunk once it is resident, or None if it could be neither loaded nor generated.
pub type ChunkFuture = Shared<BoxFuture<'static, Option<ArcLockChunk>>>;
/// Resolves to whether the chunk was written to disk.
pub type SaveFuture = Shared<BoxFuture<'static, bool>>;

fn ready<T: Clone + Send + 'static>(value: T) -> Shared<BoxFuture<'static, T>> {
	futures::future::ready(value).boxed().shared()
}

impl World {
	/// Loads the chunk from disk, or generates it, in the background.
	///
	/// Every request for a coordinate made while an operation on it is in flight
	/// receives the same future. A resident chunk which is complete resolves immediately.
	pub fn request_chunk_data(&self, coordinate: ChunkCoord) -> ChunkFuture {
		let mut state = self.lock_state();
		self.request_chunk_locked(&mut state, coordinate, COMPLETE, false)
	}

	/// Blocks the calling thread until the chunk is resident.
	/// Must not be called from inside an async task of the world's runtime.
	pub fn request_chunk_data_sync(&self, coordinate: ChunkCoord) -> Option<ArcLockChunk> {
		futures::executor::block_on(self.request_chunk_data(coordinate))
	}

	/// Resolves to the chunk once it is resident and complete.
	/// A chunk whose in-flight request only asked for partial generation is requested again.
	pub(super) async fn complete_chunk(&self, coordinate: ChunkCoord) -> Option<ArcLockChunk> {
		for _ in 0..2 {
			let chunk = self.request_chunk_data(coordinate).await?;
			if recover(chunk.read()).is_complete() {
				return Some(chunk);
			}
		}
		None
	}

	/// Starts (or joins) the operation bringing `coordinate` to at least the generator stage `target`.
	pub(super) fn request_chunk_locked(
		&self,
		state: &mut State,
		coordinate: ChunkCoord,
		target: u8,
		regenerate: bool,
	) -> ChunkFuture {
		state.unload_pending.remove(&coordinate);
		if let Some(future) = state.loading.get(&coordinate) {
			return future.clone();
		}

		let existing = state.chunks.get(&coordinate).cloned();
		if let Some(arc_chunk) = existing.as_ref() {
			let stage = recover(arc_chunk.read()).generator_stage();
			if !regenerate && (stage == COMPLETE || stage >= target) {
				return ready(Some(arc_chunk.clone()));
			}
		}

		let world = match self.arc() {
			Some(world) => world,
			None => return ready(None),
		};

		log::trace!(
			target: LOG,
			"Requesting chunk {} up to stage {}",
			fmt_chunk(&coordinate),
			target
		);
		let task = self.runtime().spawn_blocking(move || {
			let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
				world.produce_chunk(coordinate, existing, target, regenerate)
			}));
			let chunk = match result {
				Ok(chunk) => chunk,
				Err(_) => {
					log::error!(target: LOG, "Panicked while producing chunk {}", fmt_chunk(&coordinate));
					None
				}
			};
			world.finish_request(coordinate, chunk)
		});
		let future = async move {
			match task.await {
				Ok(chunk) => chunk,
				Err(error) => {
					log::error!(target: LOG, "Chunk task failed: {}", error);
					None
				}
			}
		}
		.boxed()
		.shared();
		state.loading.insert(coordinate, future.clone());
		future
	}

	/// Runs on the blocking pool with no world lock held.
	#[profiling::function]
	fn produce_chunk(
		&self,
		coordinate: ChunkCoord,
		existing: Option<ArcLockChunk>,
		target: u8,
		regenerate: bool,
	) -> Option<ArcLockChunk> {
		let now = self.tick_count();
		let arc_chunk = match existing {
			Some(arc_chunk) => {
				if regenerate {
					let snapshot = self.initial_snapshot(coordinate)?;
					let mut chunk = recover(arc_chunk.write());
					chunk.reset_for_generation();
					if !chunk.load(Source::Snapshot(&snapshot), now) {
						return None;
					}
				}
				arc_chunk
			}
			None => {
				let mut chunk = Chunk::new(coordinate, *self.layout());
				let path = Chunk::create_path_for(self.root(), &coordinate);
				if regenerate || !chunk.load(Source::Path(&path), now) {
					let snapshot = self.initial_snapshot(coordinate)?;
					if !chunk.load(Source::Snapshot(&snapshot), now) {
						log::error!(
							target: LOG,
							"Generator produced an unreadable snapshot for chunk {}",
							fmt_chunk(&coordinate)
						);
						return None;
					}
				}
				Arc::new(RwLock::new(chunk))
			}
		};

		let was_complete = recover(arc_chunk.read()).is_complete();
		if !was_complete {
			self.generate(&arc_chunk, target);
		}

		let lookup = Lookup::get();
		let mut chunk = recover(arc_chunk.write());
		if chunk.is_complete() {
			if !was_complete {
				chunk.update_height_map(&lookup);
			}
			for idx in 0..chunk.sub_chunk_count() {
				if chunk.sub_chunk(idx).need_to_recalculate_light() {
					self.light.process_sub_chunk(self, &mut chunk, idx);
				}
			}
		}
		drop(chunk);
		Some(arc_chunk)
	}

	fn initial_snapshot(&self, coordinate: ChunkCoord) -> Option<Vec<u8>> {
		match self.generator.generator.generate_chunk(self, coordinate) {
			Ok(snapshot) => Some(snapshot),
			Err(error) => {
				log::error!(
					target: LOG,
					"Failed to generate chunk {}: {:?}",
					fmt_chunk(&coordinate),
					error
				);
				None
			}
		}
	}

	/// Advances generation until the chunk is complete or reaches `target`,
	/// keeping in step with every other chunk of the same generator.
	fn generate(&self, arc_chunk: &ArcLockChunk, target: u8) {
		let stage = {
			let mut chunk = recover(arc_chunk.write());
			chunk.set_resume_gen_level(target);
			chunk.generator_stage()
		};
		let barrier = &self.generator.barrier;
		let participant = barrier.join(stage);
		loop {
			let (coordinate, stage) = {
				let chunk = recover(arc_chunk.read());
				(*chunk.coordinate(), chunk.generator_stage())
			};
			if stage == COMPLETE || stage >= target {
				break;
			}

			participant.wait(stage);
			let _stage_lock = barrier.lock_stage(stage);
			let mut chunk = recover(arc_chunk.write());
			if let Err(error) = self.generator.generator.process_chunk(self, &mut chunk, stage) {
				log::error!(
					target: LOG,
					"Generation of chunk {} failed at stage {}: {:?}",
					fmt_chunk(&coordinate),
					stage,
					error
				);
				break;
			}
			if chunk.generator_stage() <= stage {
				log::error!(
					target: LOG,
					"Generator did not advance chunk {} past stage {}",
					fmt_chunk(&coordinate),
					stage
				);
				break;
			}
		}
		drop(participant);
	}

	/// Makes the produced chunk resident. Runs inside the chunk task, before its future resolves.
	fn finish_request(&self, coordinate: ChunkCoord, chunk: Option<ArcLockChunk>) -> Option<ArcLockChunk> {
		let mut state = self.lock_state();
		state.loading.remove(&coordinate);
		if let Some(departed) = state.departed.remove(&coordinate) {
			if let Some(resident) = state.chunks.get(&coordinate) {
				let mut resident = recover(resident.write());
				for id in departed.into_iter() {
					resident.remove_entity(id);
				}
			}
		}
		let arc_chunk = chunk?;

		let level = state
			.levels
			.get(&coordinate)
			.cloned()
			.unwrap_or(MAX_LEVEL + 1);
		let (saved_entities, complete) = {
			let mut chunk = recover(arc_chunk.write());
			chunk.set_load_level(level);
			(chunk.take_pending_entities(), chunk.is_complete())
		};
		let newly_resident = state.chunks.insert(coordinate, arc_chunk.clone()).is_none();
		if level > MAX_LEVEL {
			let now = state.data.tick;
			state.ticketless.entry(coordinate).or_insert(now);
		}

		for saved in saved_entities.into_iter() {
			if let Some(entity) = Entity::from_save_data(saved) {
				if let Err(error) = self.attach_locked(&mut state, Arc::new(RwLock::new(entity)), Some(&arc_chunk)) {
					log::warn!(target: LOG, "Skipping saved entity in chunk {}: {}", fmt_chunk(&coordinate), error);
				}
			}
		}

		if complete && !newly_resident {
			self.notify(&state, WorldEvent::LightChanged { chunk: coordinate });
		}
		log::trace!(target: LOG, "Chunk {} is resident at level {}", fmt_chunk(&coordinate), level);
		Some(arc_chunk)
	}

	/// Writes the resident chunk to disk in the background, evicting it afterwards when `unload` is set.
	///
	/// Requests made while a save of the same coordinate is in flight receive the same future
	/// (and never evict). Eviction is skipped if the save failed, or if the chunk was requested
	/// or changed while the save was in flight.
	pub fn save_chunk(&self, coordinate: ChunkCoord, unload: bool) -> SaveFuture {
		let mut state = self.lock_state();
		self.save_chunk_locked(&mut state, coordinate, unload)
	}

	pub(super) fn save_chunk_locked(&self, state: &mut State, coordinate: ChunkCoord, unload: bool) -> SaveFuture {
		if let Some(future) = state.saving.get(&coordinate) {
			return future.clone();
		}
		let arc_chunk = match state.chunks.get(&coordinate) {
			Some(arc_chunk) => arc_chunk.clone(),
			None => return ready(false),
		};
		let world = match self.arc() {
			Some(world) => world,
			None => return ready(false),
		};
		if unload {
			state.unload_pending.insert(coordinate);
		}

		let path = Chunk::create_path_for(self.root(), &coordinate);
		let compression = self.config().compression;
		let now = state.data.tick;
		let task = self.runtime().spawn_blocking(move || {
			let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
				recover(arc_chunk.read()).save(&path, compression, now)
			}));
			let saved = match result {
				Ok(saved) => saved,
				Err(_) => {
					log::error!(target: LOG, "Panicked while saving chunk {}", fmt_chunk(&coordinate));
					false
				}
			};
			world.finish_save(coordinate, saved);
			saved
		});
		let future = async move { task.await.unwrap_or(false) }.boxed().shared();
		state.saving.insert(coordinate, future.clone());
		future
	}

	fn finish_save(&self, coordinate: ChunkCoord, saved: bool) {
		let mut state = self.lock_state();
		state.saving.remove(&coordinate);
		let evict = state.unload_pending.remove(&coordinate) && saved && !state.loading.contains_key(&coordinate);
		if evict {
			self.evict_locked(&mut state, coordinate);
		}
	}

	/// Drops a resident chunk along with every entity placed in it.
	fn evict_locked(&self, state: &mut State, coordinate: ChunkCoord) {
		let arc_chunk = match state.chunks.remove(&coordinate) {
			Some(arc_chunk) => arc_chunk,
			None => return,
		};
		state.ticketless.remove(&coordinate);
		let resident_entities = recover(arc_chunk.read())
			.entities()
			.map(|(id, _)| *id)
			.collect::<Vec<_>>();
		for id in resident_entities.into_iter() {
			let _ = self.detach_locked(state, id);
		}
		log::debug!(target: LOG, "Unloaded chunk {}", fmt_chunk(&coordinate));
	}

	/// Saves every listed chunk, returning one future per coordinate.
	pub fn save_chunks<I>(&self, coordinates: I, unload: bool) -> Vec<SaveFuture>
	where
		I: IntoIterator<Item = ChunkCoord>,
	{
		let mut state = self.lock_state();
		coordinates
			.into_iter()
			.map(|coordinate| self.save_chunk_locked(&mut state, coordinate, unload))
			.collect()
	}

	/// Saves every listed chunk and blocks until all are written. True if every save succeeded.
	/// Must not be called from inside an async task of the world's runtime.
	pub fn await_save_chunks<I>(&self, coordinates: I, unload: bool) -> bool
	where
		I: IntoIterator<Item = ChunkCoord>,
	{
		let futures = self.save_chunks(coordinates, unload);
		futures::executor::block_on(futures::future::join_all(futures))
			.into_iter()
			.all(|saved| saved)
	}

	/// Writes the world data and every resident chunk, blocking until done.
	#[profiling::function]
	pub fn save(&self) -> bool {
		let data_saved = match self.save_data() {
			Ok(()) => true,
			Err(error) => {
				log::error!(target: LOG, "Failed to save world {:?}: {:?}", self.id(), error);
				false
			}
		};
		let chunks_saved = self.await_save_chunks(self.resident_chunks(), false);
		data_saved && chunks_saved
	}

	/// Saves the chunk and then evicts it.
	pub fn unload_chunk(&self, coordinate: ChunkCoord) -> SaveFuture {
		self.save_chunk(coordinate, true)
	}

	pub fn unload_chunk_at(&self, point: Point3<i64>) -> SaveFuture {
		self.unload_chunk(*BlockPoint::from_global(point).chunk())
	}

	pub fn save_chunk_at(&self, point: Point3<i64>, unload: bool) -> SaveFuture {
		self.save_chunk(*BlockPoint::from_global(point).chunk(), unload)
	}

	/// Discards the chunk's terrain and generates it anew. Entities in the chunk are kept.
	pub fn regenerate_chunk(&self, coordinate: ChunkCoord) -> ChunkFuture {
		let mut state = self.lock_state();
		log::info!(target: LOG, "Regenerating chunk {}", fmt_chunk(&coordinate));
		self.request_chunk_locked(&mut state, coordinate, COMPLETE, true)
	}

	pub fn regenerate_chunk_at(&self, point: Point3<i64>) -> ChunkFuture {
		self.regenerate_chunk(*BlockPoint::from_global(point).chunk())
	}

	/// Throws away and recomputes the light of a resident, complete chunk. False if there is no such chunk.
	pub fn reset_light(&self, coordinate: ChunkCoord) -> bool {
		let mut state = self.lock_state();
		let arc_chunk = match state.settled_chunk(&coordinate) {
			Some(arc_chunk) => arc_chunk.clone(),
			None => return false,
		};
		{
			let mut chunk = recover(arc_chunk.write());
			if !chunk.is_complete() {
				return false;
			}
			chunk.reset_light();
			self.light.process_chunk(self, &mut chunk);
		}
		state.unload_pending.remove(&coordinate);
		self.notify(&state, WorldEvent::LightChanged { chunk: coordinate });
		true
	}

	pub fn reset_light_at(&self, point: Point3<i64>) -> bool {
		self.reset_light(*BlockPoint::from_global(point).chunk())
	}
}

#[cfg(test)]
mod lifecycle {
	use crate::{
		block::vanilla,
		common::utility::ScratchDir,
		config::Config,
		entity::{Entity, Marker},
		world::{
			new_entity,
			chunk::{Chunk, Compression, HeightMapKind, COMPLETE},
			point::{chunk, ChunkCoord, LocalPoint},
			register_generator,
			testing::{hold_blocking_pool, open, runtime, single_blocking_runtime},
			ChunkGenerator, SetMode, World, WorldData,
		},
	};
	use futures::FutureExt;
	use nalgebra::Point3;
	use std::{
		sync::{
			atomic::{AtomicBool, AtomicUsize, Ordering},
			mpsc, Arc, Barrier,
		},
		time::{Duration, Instant},
	};

	/// Counts snapshots and holds every chunk at stage 0 until `gate` releases.
	struct Counting {
		snapshots: AtomicUsize,
		gate: Option<Arc<Barrier>>,
	}

	impl ChunkGenerator for Counting {
		fn generate_chunk(&self, world: &World, coordinate: ChunkCoord) -> anyhow::Result<Vec<u8>> {
			self.snapshots.fetch_add(1, Ordering::SeqCst);
			Chunk::new(coordinate, *world.layout()).encode(Compression::Raw, 0)
		}

		fn process_chunk(&self, _world: &World, chunk: &mut Chunk, stage: u8) -> anyhow::Result<()> {
			if stage == 0 {
				if let Some(gate) = self.gate.as_ref() {
					gate.wait();
				}
				let lookup = crate::block::Lookup::get();
				chunk.gen_set_block(&lookup, &LocalPoint::new(0, 0, 0), vanilla::STONE.into());
				chunk.set_generator_stage(1);
			} else {
				chunk.set_generator_stage(COMPLETE);
			}
			Ok(())
		}

		fn blocking_stages(&self) -> &[u8] {
			&[1]
		}
	}

	fn data_with(generator: &str) -> WorldData {
		WorldData {
			generator: generator.to_owned(),
			light_processor: "none".to_owned(),
			..WorldData::from_config(&Config::default())
		}
	}

	#[test]
	fn concurrent_requests_share_one_operation() {
		let generator = Arc::new(Counting {
			snapshots: AtomicUsize::new(0),
			gate: None,
		});
		register_generator("test:counting", generator.clone());
		let rt = runtime();
		let dir = ScratchDir::new("lifecycle-dedup");
		let world = open(&dir, &rt, data_with("test:counting"));

		let futures = (0..8)
			.map(|_| world.request_chunk_data(chunk(5, 5)))
			.collect::<Vec<_>>();
		let chunks = rt.block_on(futures::future::join_all(futures));
		assert_eq!(generator.snapshots.load(Ordering::SeqCst), 1);
		let first = chunks[0].clone().unwrap();
		for chunk in chunks.iter() {
			assert!(Arc::ptr_eq(chunk.as_ref().unwrap(), &first));
		}
		assert!(first.read().unwrap().is_complete());
		assert!(!world.has_operations_in_flight());

		// a resident chunk resolves without another operation
		let again = world.request_chunk_data_sync(chunk(5, 5)).unwrap();
		assert!(Arc::ptr_eq(&again, &first));
		assert_eq!(generator.snapshots.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn chunks_wait_for_each_other_at_blocking_stages() {
		let gate = Arc::new(Barrier::new(3));
		register_generator(
			"test:gated",
			Arc::new(Counting {
				snapshots: AtomicUsize::new(0),
				gate: Some(gate.clone()),
			}),
		);
		let rt = runtime();
		let dir = ScratchDir::new("lifecycle-barrier");
		let world = open(&dir, &rt, data_with("test:gated"));

		// all three tasks must be inside stage 0 at once for any of them to finish
		let futures = vec![
			world.request_chunk_data(chunk(0, 3)),
			world.request_chunk_data(chunk(1, 3)),
			world.request_chunk_data(chunk(2, 3)),
		];
		let chunks = rt.block_on(futures::future::join_all(futures));
		for chunk in chunks.into_iter() {
			assert!(chunk.unwrap().read().unwrap().is_complete());
		}
		assert_eq!(world.generator.barrier.participants(), 0);
	}

	#[test]
	fn save_unload_and_reload() {
		let rt = runtime();
		let dir = ScratchDir::new("lifecycle-unload");
		let world = open(&dir, &rt, data_with("flat"));
		let coordinate = chunk(-2, 4);
		world.request_chunk_data_sync(coordinate).unwrap();

		let point = Point3::new(-20, 40, 70);
		assert!(world.set_block(point, vanilla::GLASS.into(), SetMode::Replace).is_some());

		assert!(rt.block_on(world.unload_chunk(coordinate)));
		assert!(!world.is_resident(&coordinate));
		assert!(Chunk::create_path_for(world.root(), &coordinate).exists());

		// a failed read would regenerate the chunk and lose the glass
		let chunk = world.request_chunk_data_sync(coordinate).unwrap();
		assert_eq!(
			chunk.read().unwrap().get_block_id(&LocalPoint::new(12, 40, 6)),
			vanilla::GLASS
		);
		assert_eq!(chunk.read().unwrap().height(HeightMapKind::WorldSurface, 12, 6), 41);
	}

	#[test]
	fn request_during_save_cancels_eviction() {
		let rt = runtime();
		let dir = ScratchDir::new("lifecycle-cancel");
		let world = open(&dir, &rt, data_with("flat"));
		let coordinate = chunk(3, 3);
		world.request_chunk_data_sync(coordinate).unwrap();

		// the save cannot finish while the state lock is held
		let save = {
			let mut state = world.lock_state();
			let save = world.save_chunk_locked(&mut state, coordinate, true);
			world.request_chunk_locked(&mut state, coordinate, COMPLETE, false);
			save
		};
		assert!(rt.block_on(save));
		assert!(world.is_resident(&coordinate));
	}

	#[test]
	fn concurrent_saves_share_one_write() {
		let rt = single_blocking_runtime();
		let dir = ScratchDir::new("lifecycle-save-dedup");
		let world = open(&dir, &rt, data_with("flat"));
		let coordinate = chunk(1, 2);
		world.request_chunk_data_sync(coordinate).unwrap();

		let release = hold_blocking_pool(&rt);
		let first = world.save_chunk(coordinate, false);
		let second = world.save_chunk(coordinate, false);
		assert!(first.ptr_eq(&second));
		assert_eq!(world.lock_state().saving.len(), 1);
		release.send(()).unwrap();

		assert!(rt.block_on(first.clone()));
		assert!(rt.block_on(second));
		assert!(world.lock_state().saving.is_empty());
		// once written, the next save is a new operation
		assert!(!world.save_chunk(coordinate, false).ptr_eq(&first));
	}

	#[test]
	fn block_change_during_save_cancels_eviction() {
		let rt = single_blocking_runtime();
		let dir = ScratchDir::new("lifecycle-save-change");
		let world = open(&dir, &rt, data_with("flat"));
		let coordinate = chunk(-1, -3);
		world.request_chunk_data_sync(coordinate).unwrap();

		let release = hold_blocking_pool(&rt);
		let saver = {
			let world = world.clone();
			std::thread::spawn(move || world.await_save_chunks(vec![coordinate], true))
		};
		let start = Instant::now();
		while !world.lock_state().unload_pending.contains(&coordinate) {
			assert!(start.elapsed() < Duration::from_secs(10));
			std::thread::sleep(Duration::from_millis(1));
		}

		let point = Point3::new(-10, 40, -40);
		assert!(world.set_block(point, vanilla::GLASS.into(), SetMode::Replace).is_some());
		release.send(()).unwrap();

		assert!(saver.join().unwrap());
		assert!(world.is_resident(&coordinate));
		assert_eq!(world.get_block(point).unwrap().id(), vanilla::GLASS);
	}

	/// Reads a neighbor through the world while resuming `watched` past stage 1.
	struct Reaching {
		watched: ChunkCoord,
		resuming: AtomicBool,
	}

	impl ChunkGenerator for Reaching {
		fn generate_chunk(&self, world: &World, coordinate: ChunkCoord) -> anyhow::Result<Vec<u8>> {
			Chunk::new(coordinate, *world.layout()).encode(Compression::Raw, 0)
		}

		fn process_chunk(&self, world: &World, chunk: &mut Chunk, stage: u8) -> anyhow::Result<()> {
			if stage == 0 {
				chunk.set_generator_stage(1);
				return Ok(());
			}
			if *chunk.coordinate() == self.watched {
				self.resuming.store(true, Ordering::SeqCst);
				std::thread::sleep(Duration::from_millis(100));
			}
			let neighbor = *chunk.coordinate() + nalgebra::Vector2::new(1, 0);
			let _ = world.get_chunk(&neighbor);
			chunk.set_generator_stage(COMPLETE);
			Ok(())
		}
	}

	#[test]
	fn tick_runs_while_a_generator_reads_the_world() {
		let coordinate = chunk(7, 7);
		let generator = Arc::new(Reaching {
			watched: coordinate,
			resuming: AtomicBool::new(false),
		});
		register_generator("test:reaching", generator.clone());
		let rt = runtime();
		let dir = ScratchDir::new("lifecycle-reaching");
		let world = open(&dir, &rt, data_with("test:reaching"));

		let partial = {
			let mut state = world.lock_state();
			world.request_chunk_locked(&mut state, coordinate, 1, false)
		};
		let partial = rt.block_on(partial).unwrap();
		assert_eq!(partial.read().unwrap().generator_stage(), 1);

		let complete = world.request_chunk_data(coordinate);
		let start = Instant::now();
		while !generator.resuming.load(Ordering::SeqCst) {
			assert!(start.elapsed() < Duration::from_secs(10));
			std::thread::sleep(Duration::from_millis(1));
		}

		let (ticked, has_ticked) = mpsc::channel();
		{
			let world = world.clone();
			std::thread::spawn(move || {
				world.tick();
				let _ = ticked.send(());
			});
		}
		assert!(has_ticked.recv_timeout(Duration::from_secs(5)).is_ok());
		let chunk = rt.block_on(complete).unwrap();
		assert!(Arc::ptr_eq(&chunk, &partial));
		assert!(chunk.read().unwrap().is_complete());
	}

	#[test]
	fn entities_leaving_a_generating_chunk_are_removed_afterwards() {
		let rt = runtime();
		let dir = ScratchDir::new("lifecycle-departed");
		let world = open(&dir, &rt, data_with("flat"));
		let coordinate = chunk(0, 0);
		let arc_chunk = world.request_chunk_data_sync(coordinate).unwrap();
		let entity = new_entity(Entity::new(Arc::new(Marker)).with_position(Point3::new(4.0, 70.0, 4.0)));
		let id = world.register_entity(&entity).unwrap();
		world.tick();
		assert!(arc_chunk.read().unwrap().get_entity(id).is_some());

		// as if the chunk were being regenerated
		world
			.lock_state()
			.loading
			.insert(coordinate, futures::future::pending().boxed().shared());
		world.unregister_entity_id(id).unwrap();
		assert!(arc_chunk.read().unwrap().get_entity(id).is_some());

		world.finish_request(coordinate, Some(arc_chunk.clone()));
		assert!(arc_chunk.read().unwrap().get_entity(id).is_none());
		assert!(!world.has_operations_in_flight());
	}

	#[test]
	fn saving_a_missing_chunk_fails() {
		let rt = runtime();
		let dir = ScratchDir::new("lifecycle-missing");
		let world = open(&dir, &rt, data_with("flat"));
		assert!(!rt.block_on(world.save_chunk(chunk(9, 9), false)));
	}

	#[test]
	fn regenerate_restores_terrain() {
		let rt = runtime();
		let dir = ScratchDir::new("lifecycle-regenerate");
		let world = open(&dir, &rt, data_with("flat"));
		let coordinate = chunk(0, 0);
		world.request_chunk_data_sync(coordinate).unwrap();
		let point = Point3::new(4, 6, 4);
		world.set_block(point, vanilla::AIR.into(), SetMode::Replace);
		assert_eq!(world.get_block(point).unwrap().id(), vanilla::AIR);

		let chunk = rt.block_on(world.regenerate_chunk(coordinate)).unwrap();
		assert!(chunk.read().unwrap().is_complete());
		assert_eq!(world.get_block(point).unwrap().id(), vanilla::GRASS);
	}

	#[test]
	fn reset_light_recomputes() {
		let rt = runtime();
		let dir = ScratchDir::new("lifecycle-light");
		let world = open(
			&dir,
			&rt,
			WorldData {
				light_processor: "sky".to_owned(),
				..data_with("flat")
			},
		);
		let coordinate = chunk(0, 1);
		let arc_chunk = world.request_chunk_data_sync(coordinate).unwrap();
		assert!(!arc_chunk.read().unwrap().needs_light());
		assert!(world.reset_light(coordinate));
		assert!(!arc_chunk.read().unwrap().needs_light());
		assert_eq!(arc_chunk.read().unwrap().sub_chunk(15).sky_light(0, 0, 0), 15);
		assert!(!world.reset_light(chunk(40, 40)));
	}
}
