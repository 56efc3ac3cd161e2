use super::{
	level::{Level, MAX_LEVEL},
	sub_chunk::{self, BiomeId, SubChunk},
	HeightMapKind, HeightMaps, TickQueue,
};
use crate::{
	block::{Block, BlockId, Lookup, AIR},
	entity::{ArcLockEntity, EntityId, EntitySaveData},
	world::{
		point::{ChunkCoord, LocalPoint, DIAMETER},
		Error,
	},
};
use nalgebra::Point3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	sync::{Arc, RwLock},
};

pub type ArcLockChunk = Arc<RwLock<Chunk>>;

/// The generator stage of a chunk which is fully generated.
pub const COMPLETE: u8 = 255;

/// The vertical extent of every chunk in a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
	/// The number of sub-chunks stacked in a column.
	pub vertical_count: usize,
	/// The sub-chunk index of the lowest sub-chunk. `-4` puts the bottom of the world at y = -64.
	pub y_offset: i64,
}

impl Default for Layout {
	fn default() -> Self {
		Self {
			vertical_count: 16,
			y_offset: 0,
		}
	}
}

impl Layout {
	pub fn min_y(&self) -> i64 {
		self.y_offset * DIAMETER
	}

	/// One above the highest block in the column.
	pub fn max_y(&self) -> i64 {
		self.min_y() + self.vertical_count as i64 * DIAMETER
	}

	pub fn contains_y(&self, y: i64) -> bool {
		y >= self.min_y() && y < self.max_y()
	}
}

/// The positions whose tick came due during [`Chunk::tick`].
/// Callbacks are invoked by the world once the chunk lock has been released.
#[derive(Default)]
pub struct TickOutcome {
	pub block_ticks: Vec<(Point3<i64>, BlockId)>,
	pub liquid_ticks: Vec<(Point3<i64>, BlockId)>,
	pub random_ticks: Vec<(Point3<i64>, BlockId)>,
	pub entities: Vec<ArcLockEntity>,
}

impl TickOutcome {
	pub fn is_empty(&self) -> bool {
		self.block_ticks.is_empty()
			&& self.liquid_ticks.is_empty()
			&& self.random_ticks.is_empty()
			&& self.entities.is_empty()
	}
}

/// One column of the world: a vertical stack of [`SubChunk`]s plus everything simulated in it.
pub struct Chunk {
	pub(super) coordinate: ChunkCoord,
	pub(super) layout: Layout,
	pub(super) sub_chunks: Vec<SubChunk>,
	pub(super) height_maps: HeightMaps,
	pub(super) block_ticks: TickQueue,
	pub(super) liquid_ticks: TickQueue,
	pub(super) generator_stage: u8,
	pub(super) resume_gen_level: u8,
	load_level: u8,
	entities: HashMap<EntityId, ArcLockEntity>,
	/// Entities read from disk which the world has not attached yet.
	pub(super) pending_entities: Vec<EntitySaveData>,
}

impl std::fmt::Debug for Chunk {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Chunk")
			.field("coordinate", &self.coordinate)
			.field("generator_stage", &self.generator_stage)
			.field("load_level", &self.load_level)
			.field("entities", &self.entities.len())
			.finish()
	}
}

impl Chunk {
	/// An empty, ungenerated column.
	pub fn new(coordinate: ChunkCoord, layout: Layout) -> Self {
		Self {
			coordinate,
			layout,
			sub_chunks: (0..layout.vertical_count)
				.map(|_| SubChunk::default())
				.collect(),
			height_maps: HeightMaps::new(layout.min_y()),
			block_ticks: TickQueue::default(),
			liquid_ticks: TickQueue::default(),
			generator_stage: 0,
			resume_gen_level: COMPLETE,
			load_level: MAX_LEVEL + 1,
			entities: HashMap::new(),
			pending_entities: Vec::new(),
		}
	}

	pub fn create_path_for(world_root: &Path, coordinate: &ChunkCoord) -> PathBuf {
		let mut path = world_root.to_owned();
		path.push("chunks");
		path.push(format!("{}.{}.chunk", coordinate.x, coordinate.y));
		path
	}

	pub fn coordinate(&self) -> &ChunkCoord {
		&self.coordinate
	}

	pub fn layout(&self) -> &Layout {
		&self.layout
	}

	pub fn generator_stage(&self) -> u8 {
		self.generator_stage
	}

	pub fn set_generator_stage(&mut self, stage: u8) {
		self.generator_stage = stage;
	}

	pub fn is_complete(&self) -> bool {
		self.generator_stage == COMPLETE
	}

	/// The stage at which generation pauses until a closer ticket asks for more.
	pub fn resume_gen_level(&self) -> u8 {
		self.resume_gen_level
	}

	pub fn set_resume_gen_level(&mut self, stage: u8) {
		self.resume_gen_level = stage;
	}

	pub fn load_level(&self) -> u8 {
		self.load_level
	}

	pub fn level(&self) -> Level {
		Level::from_load_level(self.load_level)
	}

	pub(crate) fn set_load_level(&mut self, level: u8) {
		self.load_level = level;
	}

	pub fn sub_chunk_count(&self) -> usize {
		self.sub_chunks.len()
	}

	/// Panics if `idx` is outside the world's vertical layout.
	pub fn sub_chunk(&self, idx: usize) -> &SubChunk {
		&self.sub_chunks[idx]
	}

	/// Panics if `idx` is outside the world's vertical layout.
	pub fn sub_chunk_mut(&mut self, idx: usize) -> &mut SubChunk {
		&mut self.sub_chunks[idx]
	}

	/// The sub-chunk index and in-sub-chunk y of a global y.
	/// Panics if `y` is outside the world's vertical layout.
	fn locate(&self, y: i64) -> (usize, usize) {
		assert!(
			self.layout.contains_y(y),
			"y {} is outside of chunk <{}, {}> ({}..{})",
			y,
			self.coordinate.x,
			self.coordinate.y,
			self.layout.min_y(),
			self.layout.max_y()
		);
		let relative = y - self.layout.min_y();
		(
			(relative / DIAMETER) as usize,
			(relative % DIAMETER) as usize,
		)
	}

	pub fn global_point(&self, local: &LocalPoint) -> Point3<i64> {
		Point3::new(
			self.coordinate.x * DIAMETER + local.x as i64,
			local.y,
			self.coordinate.y * DIAMETER + local.z as i64,
		)
	}

	pub fn get_block(&self, local: &LocalPoint) -> Block {
		let (idx, y) = self.locate(local.y);
		self.sub_chunks[idx].get_block(local.x as usize, y, local.z as usize)
	}

	pub fn get_block_id(&self, local: &LocalPoint) -> BlockId {
		let (idx, y) = self.locate(local.y);
		self.sub_chunks[idx].get_block_id(local.x as usize, y, local.z as usize)
	}

	/// Writes a block and keeps the height maps current. Returns the replaced block.
	pub fn set_block(&mut self, lookup: &Lookup, local: &LocalPoint, block: Block) -> Block {
		self.set_block_with(lookup, local, block, |_| {})
	}

	/// Places a block and hands the chunk to `changed` before the column's height maps are updated.
	pub fn set_block_with<F>(&mut self, lookup: &Lookup, local: &LocalPoint, block: Block, changed: F) -> Block
	where
		F: FnOnce(&mut Self),
	{
		let (idx, y) = self.locate(local.y);
		let previous = self.sub_chunks[idx].set_block(lookup, local.x as usize, y, local.z as usize, block);
		changed(self);
		self.update_height_map_on(lookup, local);
		previous
	}

	pub fn remove_block(&mut self, lookup: &Lookup, local: &LocalPoint) -> Block {
		self.set_block(lookup, local, Block::Simple(AIR))
	}

	pub fn get_biome(&self, local: &LocalPoint) -> BiomeId {
		let (idx, y) = self.locate(local.y);
		self.sub_chunks[idx].get_biome(local.x as usize, y, local.z as usize)
	}

	pub fn set_biome(&mut self, local: &LocalPoint, biome: BiomeId) -> BiomeId {
		let (idx, y) = self.locate(local.y);
		self.sub_chunks[idx].set_biome(local.x as usize, y, local.z as usize, biome)
	}

	/// Sets a block while the chunk is still being generated.
	/// No height map, light, notification or tick bookkeeping happens.
	pub fn gen_set_block(&mut self, lookup: &Lookup, local: &LocalPoint, block: Block) -> Block {
		let (idx, y) = self.locate(local.y);
		self.sub_chunks[idx].set_block(lookup, local.x as usize, y, local.z as usize, block)
	}

	pub fn gen_get_block(&self, local: &LocalPoint) -> Block {
		self.get_block(local)
	}

	pub fn gen_remove_block(&mut self, lookup: &Lookup, local: &LocalPoint) -> Block {
		self.gen_set_block(lookup, local, Block::Simple(AIR))
	}

	pub fn height(&self, kind: HeightMapKind, x: u8, z: u8) -> i64 {
		self.height_maps.get(kind, x as usize, z as usize)
	}

	pub fn height_maps(&self) -> &HeightMaps {
		&self.height_maps
	}

	fn highest_matching(&self, lookup: &Lookup, kind: HeightMapKind, x: usize, z: usize, below: i64) -> i64 {
		let mut y = below - 1;
		while y >= self.layout.min_y() {
			let (idx, local_y) = self.locate(y);
			let sub_chunk = &self.sub_chunks[idx];
			if sub_chunk.is_empty() {
				// skip straight to the top of the sub-chunk below
				y -= local_y as i64 + 1;
				continue;
			}
			if kind.matches(lookup, sub_chunk.get_block_id(x, local_y, z)) {
				return y + 1;
			}
			y -= 1;
		}
		self.layout.min_y()
	}

	/// Recomputes all four height maps for every column.
	#[profiling::function]
	pub fn update_height_map(&mut self, lookup: &Lookup) {
		self.height_maps.reset();
		let max_y = self.layout.max_y();
		for x in 0..16 {
			for z in 0..16 {
				for kind in HeightMapKind::ALL.iter() {
					let height = self.highest_matching(lookup, *kind, x, z, max_y);
					self.height_maps.set(*kind, x, z, height);
				}
			}
		}
	}

	/// Updates the height maps of one column after the block at `local` changed.
	pub fn update_height_map_on(&mut self, lookup: &Lookup, local: &LocalPoint) {
		let (x, z) = (local.x as usize, local.z as usize);
		let id = self.get_block_id(local);
		for kind in HeightMapKind::ALL.iter() {
			let current = self.height_maps.get(*kind, x, z);
			if kind.matches(lookup, id) {
				if local.y + 1 > current {
					self.height_maps.set(*kind, x, z, local.y + 1);
				}
			} else if local.y + 1 == current {
				let height = self.highest_matching(lookup, *kind, x, z, local.y);
				self.height_maps.set(*kind, x, z, height);
			}
		}
	}

	/// Schedules a block tick at `due`. Priority must be in `-3..=0`; lower runs later within a tick.
	pub fn query_for_tick(&mut self, local: LocalPoint, due: u64, priority: i32) -> Result<(), Error> {
		self.block_ticks.push(local, due, priority)
	}

	pub fn query_for_liquid_tick(&mut self, local: LocalPoint, due: u64, priority: i32) -> Result<(), Error> {
		self.liquid_ticks.push(local, due, priority)
	}

	pub fn block_ticks(&self) -> &TickQueue {
		&self.block_ticks
	}

	pub fn liquid_ticks(&self) -> &TickQueue {
		&self.liquid_ticks
	}

	/// Collects everything which should tick at `now`.
	/// Nothing is collected unless the chunk is complete and its load level ticks blocks;
	/// entities are only included when the level ticks entities too.
	#[profiling::function]
	pub fn tick<R: Rng>(&mut self, now: u64, random_tick_speed: u32, rng: &mut R, lookup: &Lookup) -> TickOutcome {
		let mut outcome = TickOutcome::default();
		let level = self.level();
		if !self.is_complete() || !level.ticks_blocks() {
			return outcome;
		}

		for local in self.block_ticks.drain_due(now).into_iter() {
			if !self.layout.contains_y(local.y) {
				continue;
			}
			let id = self.get_block_id(&local);
			outcome.block_ticks.push((self.global_point(&local), id));
		}
		for local in self.liquid_ticks.drain_due(now).into_iter() {
			if !self.layout.contains_y(local.y) {
				continue;
			}
			let id = self.get_block_id(&local);
			outcome.liquid_ticks.push((self.global_point(&local), id));
		}

		if level.ticks_entities() {
			outcome.entities = self.entities.values().cloned().collect();
		}

		for (idx, sub_chunk) in self.sub_chunks.iter().enumerate() {
			if !sub_chunk.has_tickable_blocks() {
				continue;
			}
			let base_y = self.layout.min_y() + idx as i64 * DIAMETER;
			for _ in 0..random_tick_speed {
				let x = rng.gen_range(0..sub_chunk::SIZE);
				let y = rng.gen_range(0..sub_chunk::SIZE);
				let z = rng.gen_range(0..sub_chunk::SIZE);
				let id = sub_chunk.get_block_id(x, y, z);
				if lookup.is_random_tickable(id) {
					let local = LocalPoint::new(x as u8, base_y + y as i64, z as u8);
					outcome.random_ticks.push((self.global_point(&local), id));
				}
			}
		}

		outcome
	}

	pub fn needs_light(&self) -> bool {
		self.sub_chunks
			.iter()
			.any(|sub_chunk| sub_chunk.need_to_recalculate_light())
	}

	/// Drops all light so the next light pass recomputes it.
	pub fn reset_light(&mut self) {
		self.sub_chunks
			.iter_mut()
			.for_each(|sub_chunk| sub_chunk.clear_light());
	}

	/// Wipes the column back to an ungenerated state. Entities are untouched.
	pub fn reset_for_generation(&mut self) {
		self.sub_chunks = (0..self.layout.vertical_count)
			.map(|_| SubChunk::default())
			.collect();
		self.height_maps = HeightMaps::new(self.layout.min_y());
		self.block_ticks.clear();
		self.liquid_ticks.clear();
		self.generator_stage = 0;
		self.resume_gen_level = COMPLETE;
	}

	pub fn entity_count(&self) -> usize {
		self.entities.len()
	}

	pub fn entities(&self) -> impl Iterator<Item = (&EntityId, &ArcLockEntity)> {
		self.entities.iter()
	}

	pub fn get_entity(&self, id: EntityId) -> Option<&ArcLockEntity> {
		self.entities.get(&id)
	}

	pub(crate) fn insert_entity(&mut self, id: EntityId, entity: ArcLockEntity) {
		self.entities.insert(id, entity);
	}

	pub(crate) fn remove_entity(&mut self, id: EntityId) -> Option<ArcLockEntity> {
		self.entities.remove(&id)
	}

	pub(crate) fn take_pending_entities(&mut self) -> Vec<EntitySaveData> {
		std::mem::take(&mut self.pending_entities)
	}

	pub fn pending_entity_count(&self) -> usize {
		self.pending_entities.len()
	}
}
