use crate::block::{Block, BlockEntity, BlockId, Lookup, AIR};
use std::{collections::HashMap, sync::Arc};

pub type BiomeId = u16;

/// Blocks along each axis of a sub-chunk.
pub const SIZE: usize = 16;
pub const VOLUME: usize = SIZE * SIZE * SIZE;
/// Biomes are stored at a quarter of the block resolution (4x4x4 cells per sub-chunk).
pub const BIOME_SIZE: usize = 4;
pub const BIOME_VOLUME: usize = BIOME_SIZE * BIOME_SIZE * BIOME_SIZE;
pub const MAX_LIGHT: u8 = 15;

/// One 16x16x16 slice of a [`Chunk`](super::Chunk).
///
/// Block storage is only allocated once a non-air block is placed,
/// so the empty sky above the terrain costs nothing but the biome table.
#[derive(Clone, Debug)]
pub struct SubChunk {
	blocks: Option<Box<[BlockId]>>,
	biomes: Box<[BiomeId]>,
	/// Block light in the high nibble, sky light in the low nibble.
	light: Option<Box<[u8]>>,
	block_entities: HashMap<u16, Arc<BlockEntity>>,
	non_air_blocks: u16,
	tickable_blocks: u16,
	need_to_recalculate_light: bool,
}

impl Default for SubChunk {
	fn default() -> Self {
		Self {
			blocks: None,
			biomes: vec![0; BIOME_VOLUME].into_boxed_slice(),
			light: None,
			block_entities: HashMap::new(),
			non_air_blocks: 0,
			tickable_blocks: 0,
			need_to_recalculate_light: true,
		}
	}
}

/// The flat index of a local block coordinate.
/// Panics if any coordinate is outside of `0..16`.
pub fn index(x: usize, y: usize, z: usize) -> usize {
	assert!(
		x < SIZE && y < SIZE && z < SIZE,
		"sub-chunk coordinate <{}, {}, {}> is out of range",
		x,
		y,
		z
	);
	(y * SIZE + z) * SIZE + x
}

/// Inverse of [`index`].
pub fn coordinate_of(index: usize) -> (usize, usize, usize) {
	(index % SIZE, index / (SIZE * SIZE), (index / SIZE) % SIZE)
}

fn biome_index(x: usize, y: usize, z: usize) -> usize {
	assert!(x < SIZE && y < SIZE && z < SIZE);
	let (x, y, z) = (x / BIOME_SIZE, y / BIOME_SIZE, z / BIOME_SIZE);
	(y * BIOME_SIZE + z) * BIOME_SIZE + x
}

impl SubChunk {
	/// Assembles a sub-chunk from its stored parts.
	/// Lengths must already be validated by the caller; counters are rebuilt from the block table.
	pub(crate) fn from_parts(
		blocks: Option<Vec<BlockId>>,
		biomes: Option<Vec<BiomeId>>,
		light: Option<Vec<u8>>,
		block_entities: HashMap<u16, BlockEntity>,
		lookup: &Lookup,
	) -> Self {
		let mut sub_chunk = Self {
			blocks: blocks.map(|blocks| blocks.into_boxed_slice()),
			biomes: biomes
				.unwrap_or_else(|| vec![0; BIOME_VOLUME])
				.into_boxed_slice(),
			need_to_recalculate_light: light.is_none(),
			light: light.map(|light| light.into_boxed_slice()),
			block_entities: block_entities
				.into_iter()
				.map(|(idx, entity)| (idx, Arc::new(entity)))
				.collect(),
			non_air_blocks: 0,
			tickable_blocks: 0,
		};
		sub_chunk.recount(lookup);
		sub_chunk
	}

	fn recount(&mut self, lookup: &Lookup) {
		self.non_air_blocks = 0;
		self.tickable_blocks = 0;
		if let Some(blocks) = &self.blocks {
			for &id in blocks.iter() {
				if id != AIR {
					self.non_air_blocks += 1;
				}
				if lookup.is_random_tickable(id) {
					self.tickable_blocks += 1;
				}
			}
		}
		if self.non_air_blocks == 0 {
			self.blocks = None;
		}
	}

	pub fn get_block_id(&self, x: usize, y: usize, z: usize) -> BlockId {
		let idx = index(x, y, z);
		match &self.blocks {
			Some(blocks) => blocks[idx],
			None => AIR,
		}
	}

	pub fn get_block(&self, x: usize, y: usize, z: usize) -> Block {
		let idx = index(x, y, z);
		let id = match &self.blocks {
			Some(blocks) => blocks[idx],
			None => AIR,
		};
		match self.block_entities.get(&(idx as u16)) {
			Some(entity) => Block::Extended(id, entity.clone()),
			None => Block::Simple(id),
		}
	}

	/// Writes a block, returning the block that was replaced.
	pub fn set_block(&mut self, lookup: &Lookup, x: usize, y: usize, z: usize, block: Block) -> Block {
		let idx = index(x, y, z);
		let new_id = block.id();
		let previous_entity = self.block_entities.remove(&(idx as u16));
		if let Block::Extended(_, entity) = block {
			self.block_entities.insert(idx as u16, entity);
		}

		if self.blocks.is_none() {
			if new_id == AIR {
				return match previous_entity {
					Some(entity) => Block::Extended(AIR, entity),
					None => Block::Simple(AIR),
				};
			}
			self.blocks = Some(vec![AIR; VOLUME].into_boxed_slice());
		}
		let previous_id = match self.blocks.as_mut() {
			Some(blocks) => std::mem::replace(&mut blocks[idx], new_id),
			None => AIR,
		};

		if previous_id != AIR {
			self.non_air_blocks -= 1;
		}
		if new_id != AIR {
			self.non_air_blocks += 1;
		}
		// a block may have become random-tickable after it was counted
		if lookup.is_random_tickable(previous_id) {
			self.tickable_blocks = self.tickable_blocks.saturating_sub(1);
		}
		if lookup.is_random_tickable(new_id) {
			self.tickable_blocks += 1;
		}
		if self.non_air_blocks == 0 {
			self.blocks = None;
		}
		if self.light.is_none() {
			self.need_to_recalculate_light = true;
		}

		match previous_entity {
			Some(entity) => Block::Extended(previous_id, entity),
			None => Block::Simple(previous_id),
		}
	}

	pub fn has_tickable_blocks(&self) -> bool {
		self.tickable_blocks > 0
	}

	pub fn is_empty(&self) -> bool {
		self.non_air_blocks == 0
	}

	pub fn get_biome(&self, x: usize, y: usize, z: usize) -> BiomeId {
		self.biomes[biome_index(x, y, z)]
	}

	/// Writes the biome of the 4x4x4 cell containing the local coordinate, returning the previous biome.
	pub fn set_biome(&mut self, x: usize, y: usize, z: usize, biome: BiomeId) -> BiomeId {
		std::mem::replace(&mut self.biomes[biome_index(x, y, z)], biome)
	}

	pub fn fill_biome(&mut self, biome: BiomeId) {
		self.biomes.iter_mut().for_each(|cell| *cell = biome);
	}

	pub fn has_light(&self) -> bool {
		self.light.is_some()
	}

	pub fn need_to_recalculate_light(&self) -> bool {
		self.need_to_recalculate_light
	}

	pub fn mark_light_dirty(&mut self) {
		self.need_to_recalculate_light = true;
	}

	/// Called by light processors once this sub-chunk's light reflects its blocks.
	pub fn mark_light_valid(&mut self) {
		if self.light.is_none() {
			self.light = Some(vec![0; VOLUME].into_boxed_slice());
		}
		self.need_to_recalculate_light = false;
	}

	pub fn clear_light(&mut self) {
		self.light = None;
		self.need_to_recalculate_light = true;
	}

	pub fn block_light(&self, x: usize, y: usize, z: usize) -> u8 {
		match &self.light {
			Some(light) => light[index(x, y, z)] >> 4,
			None => 0,
		}
	}

	pub fn sky_light(&self, x: usize, y: usize, z: usize) -> u8 {
		match &self.light {
			Some(light) => light[index(x, y, z)] & 0x0F,
			None => 0,
		}
	}

	pub fn set_light(&mut self, x: usize, y: usize, z: usize, block_light: u8, sky_light: u8) {
		let idx = index(x, y, z);
		let light = self
			.light
			.get_or_insert_with(|| vec![0; VOLUME].into_boxed_slice());
		light[idx] = (block_light.min(MAX_LIGHT) << 4) | sky_light.min(MAX_LIGHT);
	}

	pub(crate) fn raw_blocks(&self) -> Option<&[BlockId]> {
		self.blocks.as_deref()
	}

	pub(crate) fn raw_biomes(&self) -> &[BiomeId] {
		&self.biomes
	}

	pub(crate) fn raw_light(&self) -> Option<&[u8]> {
		self.light.as_deref()
	}

	pub fn block_entities(&self) -> impl Iterator<Item = (u16, &Arc<BlockEntity>)> {
		self.block_entities
			.iter()
			.map(|(idx, entity)| (*idx, entity))
	}
}
