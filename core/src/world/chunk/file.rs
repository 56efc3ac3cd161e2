//! The on-disk chunk format.
//!
//! A chunk file starts with a compression token (`zstd` or `raw`) and a newline.
//! The rest of the file (compressed when the token says so) is one format-version byte
//! followed by a MessagePack record with named sections.

use super::{
	sub_chunk::{self, BiomeId, SubChunk},
	Chunk, HeightMaps, SavedTick, TickQueue, COMPLETE,
};
use crate::{
	block::{BlockEntity, BlockId, Lookup},
	entity::EntitySaveData,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
	borrow::Cow,
	collections::{BTreeMap, HashMap},
	path::Path,
};

/// The log category for reading and writing chunk files.
static LOG: &'static str = "chunk-file";

pub const FORMAT_VERSION: u8 = 1;

/// Light is stored as one nibble per block, two blocks per byte.
const PACKED_LIGHT_LEN: usize = sub_chunk::VOLUME / 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
	Zstd,
	Raw,
}

impl Default for Compression {
	fn default() -> Self {
		Self::Zstd
	}
}

impl Compression {
	pub fn token(&self) -> &'static str {
		match self {
			Self::Zstd => "zstd",
			Self::Raw => "raw",
		}
	}

	pub fn from_token(token: &str) -> Option<Self> {
		match token {
			"zstd" => Some(Self::Zstd),
			"raw" => Some(Self::Raw),
			_ => None,
		}
	}
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
	#[error("chunk file does not exist")]
	Missing,
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("unknown compression token {0:?}")]
	UnknownMode(String),
	#[error("failed to decompress chunk data: {0}")]
	Decompress(std::io::Error),
	#[error("chunk data has no format version")]
	Empty,
	#[error("unsupported chunk format version {0}")]
	Version(u8),
	#[error(transparent)]
	Decode(#[from] rmp_serde::decode::Error),
	#[error("malformed chunk section: {0}")]
	Shape(String),
}

/// Where [`Chunk::load`] reads from.
pub enum Source<'a> {
	Path(&'a Path),
	/// An in-memory chunk file, such as the initial snapshot produced by a generator.
	Snapshot(&'a [u8]),
}

#[derive(Serialize, Deserialize, Default)]
struct SubChunkRecord {
	#[serde(default)]
	blocks: Vec<BlockId>,
	#[serde(default)]
	block_light: Vec<u8>,
	#[serde(default)]
	sky_light: Vec<u8>,
	#[serde(default)]
	block_entities: BTreeMap<u16, BlockEntity>,
	#[serde(default)]
	biomes: Vec<BiomeId>,
}

#[derive(Serialize, Deserialize, Default)]
struct QueriedForTick {
	#[serde(default)]
	blocks: Vec<SavedTick>,
	#[serde(default)]
	liquids: Vec<SavedTick>,
}

#[derive(Serialize, Deserialize, Default)]
struct ChunkRecord {
	sub_chunks: Vec<SubChunkRecord>,
	#[serde(default)]
	entities: Vec<EntitySaveData>,
	#[serde(default)]
	queried_for_tick: QueriedForTick,
	#[serde(default)]
	height_maps: BTreeMap<String, Vec<i64>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	generator_stage: Option<u8>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	resume_gen_level: Option<u8>,
}

fn pack_light(light: &[u8], shift: u8) -> Vec<u8> {
	light
		.chunks(2)
		.map(|pair| ((pair[0] >> shift) & 0x0F) | (((pair[1] >> shift) & 0x0F) << 4))
		.collect()
}

/// Combines the stored block and sky light back into one byte per block.
/// Returns None (light must be recalculated) if either half is missing or the wrong size.
fn unpack_light(block_light: &[u8], sky_light: &[u8]) -> Option<Vec<u8>> {
	if block_light.len() != PACKED_LIGHT_LEN || sky_light.len() != PACKED_LIGHT_LEN {
		return None;
	}
	let mut light = Vec::with_capacity(sub_chunk::VOLUME);
	for (block, sky) in block_light.iter().zip(sky_light.iter()) {
		light.push(((block & 0x0F) << 4) | (sky & 0x0F));
		light.push((block & 0xF0) | (sky >> 4));
	}
	Some(light)
}

impl SubChunkRecord {
	fn from_sub_chunk(sub_chunk: &SubChunk) -> Self {
		let (block_light, sky_light) = match sub_chunk.raw_light() {
			Some(light) if !sub_chunk.need_to_recalculate_light() => {
				(pack_light(light, 4), pack_light(light, 0))
			}
			_ => (Vec::new(), Vec::new()),
		};
		Self {
			blocks: sub_chunk
				.raw_blocks()
				.map(|blocks| blocks.to_vec())
				.unwrap_or_default(),
			block_light,
			sky_light,
			block_entities: sub_chunk
				.block_entities()
				.map(|(idx, entity)| (idx, (**entity).clone()))
				.collect(),
			biomes: sub_chunk.raw_biomes().to_vec(),
		}
	}

	fn into_sub_chunk(self, idx: usize, lookup: &Lookup) -> Result<SubChunk, LoadError> {
		let blocks = match self.blocks.len() {
			0 => None,
			sub_chunk::VOLUME => Some(self.blocks),
			len => {
				return Err(LoadError::Shape(format!(
					"sub-chunk {} has {} blocks",
					idx, len
				)))
			}
		};
		let biomes = match self.biomes.len() {
			0 => None,
			sub_chunk::BIOME_VOLUME => Some(self.biomes),
			len => {
				return Err(LoadError::Shape(format!(
					"sub-chunk {} has {} biomes",
					idx, len
				)))
			}
		};
		if let Some(key) = self
			.block_entities
			.keys()
			.find(|key| **key as usize >= sub_chunk::VOLUME)
		{
			return Err(LoadError::Shape(format!(
				"sub-chunk {} has a block entity at index {}",
				idx, key
			)));
		}
		let light = unpack_light(&self.block_light, &self.sky_light);
		Ok(SubChunk::from_parts(
			blocks,
			biomes,
			light,
			self.block_entities.into_iter().collect::<HashMap<_, _>>(),
			lookup,
		))
	}
}

fn decode_bytes(bytes: &[u8]) -> Result<ChunkRecord, LoadError> {
	let newline = bytes
		.iter()
		.position(|byte| *byte == b'\n')
		.ok_or_else(|| LoadError::UnknownMode(String::new()))?;
	let token = String::from_utf8_lossy(&bytes[..newline]);
	let mode = Compression::from_token(token.trim())
		.ok_or_else(|| LoadError::UnknownMode(token.to_string()))?;
	let rest = &bytes[newline + 1..];
	let body: Cow<[u8]> = match mode {
		Compression::Zstd => Cow::Owned(zstd::decode_all(rest).map_err(LoadError::Decompress)?),
		Compression::Raw => Cow::Borrowed(rest),
	};
	let (version, record) = body.split_first().ok_or(LoadError::Empty)?;
	if *version != FORMAT_VERSION {
		return Err(LoadError::Version(*version));
	}
	Ok(rmp_serde::from_slice(record)?)
}

impl Chunk {
	/// Serializes the chunk into the chunk file format.
	/// Scheduled ticks are stored relative to `now`.
	pub fn encode(&self, compression: Compression, now: u64) -> anyhow::Result<Vec<u8>> {
		let mut entities = self.pending_entities.clone();
		for (_id, entity) in self.entities() {
			let entity = crate::common::utility::recover(entity.read());
			if entity.kind().is_saveable() {
				entities.push(entity.to_save_data());
			}
		}

		let record = ChunkRecord {
			sub_chunks: self
				.sub_chunks
				.iter()
				.map(SubChunkRecord::from_sub_chunk)
				.collect(),
			entities,
			queried_for_tick: QueriedForTick {
				blocks: self.block_ticks.to_saved(now),
				liquids: self.liquid_ticks.to_saved(now),
			},
			height_maps: self.height_maps.to_named(),
			generator_stage: match self.generator_stage {
				COMPLETE => None,
				stage => Some(stage),
			},
			resume_gen_level: match self.resume_gen_level {
				COMPLETE => None,
				stage => Some(stage),
			},
		};

		let mut body = vec![FORMAT_VERSION];
		body.extend(rmp_serde::to_vec_named(&record).context("failed to encode chunk")?);

		let mut bytes = format!("{}\n", compression.token()).into_bytes();
		match compression {
			Compression::Zstd => {
				bytes.extend(zstd::encode_all(&body[..], 3).context("failed to compress chunk")?)
			}
			Compression::Raw => bytes.extend(body),
		}
		Ok(bytes)
	}

	/// Writes the chunk to `path` (via a temporary file), returning false on any failure.
	#[profiling::function]
	pub fn save(&self, path: &Path, compression: Compression, now: u64) -> bool {
		match self.try_save(path, compression, now) {
			Ok(()) => true,
			Err(error) => {
				log::error!(
					target: LOG,
					"Failed to save chunk <{}, {}>: {:?}",
					self.coordinate.x,
					self.coordinate.y,
					error
				);
				false
			}
		}
	}

	fn try_save(&self, path: &Path, compression: Compression, now: u64) -> anyhow::Result<()> {
		let bytes = self.encode(compression, now)?;
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let tmp_path = path.with_extension("chunk.tmp");
		std::fs::write(&tmp_path, bytes)
			.with_context(|| format!("failed to write {}", tmp_path.display()))?;
		std::fs::rename(&tmp_path, path)
			.with_context(|| format!("failed to replace {}", path.display()))?;
		Ok(())
	}

	/// Replaces the chunk's contents with those read from `source`.
	///
	/// Missing light is not an error: the affected sub-chunks are flagged for recalculation.
	/// A missing generator stage means the chunk is complete.
	/// On any failure the chunk is left untouched and false is returned.
	#[profiling::function]
	pub fn load(&mut self, source: Source, now: u64) -> bool {
		match self.try_load(source, now) {
			Ok(()) => true,
			Err(LoadError::Missing) => false,
			Err(error) => {
				log::warn!(
					target: LOG,
					"Discarding unreadable chunk <{}, {}>: {}",
					self.coordinate.x,
					self.coordinate.y,
					error
				);
				false
			}
		}
	}

	pub(crate) fn try_load(&mut self, source: Source, now: u64) -> Result<(), LoadError> {
		let record = match source {
			Source::Path(path) => {
				let bytes = match std::fs::read(path) {
					Ok(bytes) => bytes,
					Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
						return Err(LoadError::Missing)
					}
					Err(error) => return Err(error.into()),
				};
				decode_bytes(&bytes)?
			}
			Source::Snapshot(bytes) => decode_bytes(bytes)?,
		};

		if record.sub_chunks.len() != self.layout.vertical_count {
			return Err(LoadError::Shape(format!(
				"expected {} sub-chunks, found {}",
				self.layout.vertical_count,
				record.sub_chunks.len()
			)));
		}

		let lookup = Lookup::get();
		let mut sub_chunks = Vec::with_capacity(record.sub_chunks.len());
		for (idx, sub_chunk) in record.sub_chunks.into_iter().enumerate() {
			sub_chunks.push(sub_chunk.into_sub_chunk(idx, &lookup)?);
		}

		self.sub_chunks = sub_chunks;
		self.block_ticks = TickQueue::from_saved(&record.queried_for_tick.blocks, now);
		self.liquid_ticks = TickQueue::from_saved(&record.queried_for_tick.liquids, now);
		self.generator_stage = record.generator_stage.unwrap_or(COMPLETE);
		self.resume_gen_level = record.resume_gen_level.unwrap_or(COMPLETE);
		self.pending_entities = record.entities;
		match HeightMaps::from_named(self.layout.min_y(), &record.height_maps) {
			Some(height_maps) => self.height_maps = height_maps,
			None => self.update_height_map(&lookup),
		}
		Ok(())
	}
}

#[cfg(test)]
mod file {
	use super::*;
	use crate::{
		block::{vanilla, Block},
		common::utility::ScratchDir,
		entity::{Entity, Marker},
		world::{
			chunk::{HeightMapKind, Layout},
			point::{chunk, LocalPoint},
		},
	};
	use nalgebra::Point3;
	use std::sync::{Arc, RwLock};

	fn populated() -> Chunk {
		let lookup = Lookup::get();
		let mut chunk = Chunk::new(chunk(2, -7), Layout::default());
		chunk.set_generator_stage(COMPLETE);
		chunk.set_block(&lookup, &LocalPoint::new(0, 70, 15), vanilla::STONE.into());
		chunk.set_block(&lookup, &LocalPoint::new(3, 5, 3), vanilla::GRASS.into());
		chunk.set_block(
			&lookup,
			&LocalPoint::new(8, 64, 8),
			Block::with_entity(
				vanilla::OAK_LOG,
				BlockEntity::new("vanilla:sign", serde_json::json!({ "text": "hello" })),
			),
		);
		chunk.set_biome(&LocalPoint::new(4, 0, 4), 7);
		chunk.sub_chunk_mut(0).mark_light_valid();
		chunk.sub_chunk_mut(0).set_light(1, 2, 3, 12, 9);
		chunk.query_for_tick(LocalPoint::new(3, 5, 3), 110, 0).unwrap();
		chunk.query_for_liquid_tick(LocalPoint::new(1, 6, 1), 103, -1).unwrap();
		let entity = Entity::new(Arc::new(Marker)).with_position(Point3::new(40.0, 71.0, -100.0));
		chunk.insert_entity(0, Arc::new(RwLock::new(entity)));
		chunk
	}

	#[test]
	fn save_then_load_round_trip() {
		let dir = ScratchDir::new("chunk-round-trip");
		let path = Chunk::create_path_for(dir.path(), &chunk(2, -7));
		let original = populated();
		assert!(original.save(&path, Compression::Zstd, 100));

		let mut loaded = Chunk::new(chunk(2, -7), Layout::default());
		assert!(loaded.load(Source::Path(&path), 1000));

		for (idx, sub_chunk) in original.sub_chunks.iter().enumerate() {
			assert_eq!(sub_chunk.raw_blocks(), loaded.sub_chunk(idx).raw_blocks());
			assert_eq!(sub_chunk.raw_biomes(), loaded.sub_chunk(idx).raw_biomes());
		}
		assert_eq!(
			loaded.get_block(&LocalPoint::new(8, 64, 8)).entity().map(|e| e.kind.clone()),
			Some("vanilla:sign".to_owned())
		);
		assert!(loaded.sub_chunk(0).has_tickable_blocks());
		assert_eq!(loaded.get_biome(&LocalPoint::new(5, 1, 5)), 7);
		assert_eq!(
			loaded.height(HeightMapKind::MotionBlocking, 0, 15),
			original.height(HeightMapKind::MotionBlocking, 0, 15)
		);
		assert!(loaded.is_complete());

		// ticks keep their remaining time across the gap in tick counters
		let block_ticks = loaded.block_ticks().due_ticks();
		assert_eq!(block_ticks, vec![(0, 1010, LocalPoint::new(3, 5, 3))]);
		let liquid_ticks = loaded.liquid_ticks().due_ticks();
		assert_eq!(liquid_ticks, vec![(-1, 1003, LocalPoint::new(1, 6, 1))]);

		assert_eq!(loaded.pending_entity_count(), 1);
		assert_eq!(loaded.entity_count(), 0);
	}

	#[test]
	fn light_survives_only_when_valid() {
		let original = populated();
		let bytes = original.encode(Compression::Raw, 0).unwrap();
		let mut loaded = Chunk::new(chunk(2, -7), Layout::default());
		assert!(loaded.load(Source::Snapshot(&bytes), 0));

		assert!(!loaded.sub_chunk(0).need_to_recalculate_light());
		assert_eq!(loaded.sub_chunk(0).block_light(1, 2, 3), 12);
		assert_eq!(loaded.sub_chunk(0).sky_light(1, 2, 3), 9);
		// sub-chunk 4 was never lit, so it comes back flagged for recalculation
		assert!(loaded.sub_chunk(4).need_to_recalculate_light());
		assert!(loaded.needs_light());
	}

	#[test]
	fn missing_light_section_requests_recalculation() {
		let mut record = ChunkRecord::default();
		for _ in 0..16 {
			record.sub_chunks.push(SubChunkRecord {
				blocks: vec![vanilla::STONE; sub_chunk::VOLUME],
				block_light: vec![0; 100],
				..Default::default()
			});
		}
		let mut body = vec![FORMAT_VERSION];
		body.extend(rmp_serde::to_vec_named(&record).unwrap());
		let mut bytes = b"raw\n".to_vec();
		bytes.extend(body);

		let mut loaded = Chunk::new(chunk(0, 0), Layout::default());
		assert!(loaded.load(Source::Snapshot(&bytes), 0));
		assert!(loaded.sub_chunk(3).need_to_recalculate_light());
		assert!(loaded.is_complete());
		// height maps were absent, so they were rebuilt from the blocks
		assert_eq!(loaded.height(HeightMapKind::WorldSurface, 9, 9), 256);
	}

	#[test]
	fn wrong_shapes_fail_without_partial_state() {
		let lookup = Lookup::get();
		let mut target = Chunk::new(chunk(0, 0), Layout::default());
		target.set_generator_stage(COMPLETE);
		target.set_block(&lookup, &LocalPoint::new(1, 1, 1), vanilla::DIRT.into());

		let mut record = ChunkRecord::default();
		for _ in 0..16 {
			record.sub_chunks.push(SubChunkRecord::default());
		}
		record.sub_chunks[2].blocks = vec![vanilla::STONE; 17];
		let mut bytes = vec![b'r', b'a', b'w', b'\n', FORMAT_VERSION];
		bytes.extend(rmp_serde::to_vec_named(&record).unwrap());
		assert!(matches!(
			target.try_load(Source::Snapshot(&bytes), 0),
			Err(LoadError::Shape(_))
		));
		assert_eq!(target.get_block_id(&LocalPoint::new(1, 1, 1)), vanilla::DIRT);

		record.sub_chunks[2].blocks.clear();
		record.sub_chunks.pop();
		let mut bytes = vec![b'r', b'a', b'w', b'\n', FORMAT_VERSION];
		bytes.extend(rmp_serde::to_vec_named(&record).unwrap());
		assert!(!target.load(Source::Snapshot(&bytes), 0));
		assert_eq!(target.get_block_id(&LocalPoint::new(1, 1, 1)), vanilla::DIRT);
	}

	#[test]
	fn bad_headers() {
		let mut target = Chunk::new(chunk(0, 0), Layout::default());
		assert!(matches!(
			target.try_load(Source::Snapshot(b"gzip\n\x01"), 0),
			Err(LoadError::UnknownMode(_))
		));
		assert!(matches!(
			target.try_load(Source::Snapshot(b"raw\n"), 0),
			Err(LoadError::Empty)
		));
		assert!(matches!(
			target.try_load(Source::Snapshot(b"raw\n\x09"), 0),
			Err(LoadError::Version(9))
		));
		assert!(matches!(
			target.try_load(Source::Snapshot(b"zstd\nnot zstd"), 0),
			Err(LoadError::Decompress(_))
		));
	}

	#[test]
	fn missing_file_is_quietly_absent() {
		let dir = ScratchDir::new("chunk-missing");
		let path = Chunk::create_path_for(dir.path(), &chunk(9, 9));
		let mut target = Chunk::new(chunk(9, 9), Layout::default());
		assert!(matches!(
			target.try_load(Source::Path(&path), 0),
			Err(LoadError::Missing)
		));
		assert!(!target.load(Source::Path(&path), 0));
	}

	#[test]
	fn partial_generation_is_persisted() {
		let mut original = Chunk::new(chunk(0, 0), Layout::default());
		original.set_generator_stage(1);
		original.set_resume_gen_level(1);
		let bytes = original.encode(Compression::Zstd, 0).unwrap();
		let mut loaded = Chunk::new(chunk(0, 0), Layout::default());
		assert!(loaded.load(Source::Snapshot(&bytes), 0));
		assert_eq!(loaded.generator_stage(), 1);
		assert_eq!(loaded.resume_gen_level(), 1);
		assert!(!loaded.is_complete());
	}
}
