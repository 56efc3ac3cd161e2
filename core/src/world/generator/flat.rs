use crate::{
	block::{self, vanilla, BlockId},
	world::{
		chunk::{Chunk, Compression, COMPLETE},
		point::{ChunkCoord, LocalPoint},
		ChunkGenerator, World,
	},
};
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Stage 0 lays the configured layers, stage 1 decorates the surface.
const LAYERS: u8 = 0;
const DECORATE: u8 = 1;

/// A superflat world: the same layers of blocks in every column,
/// with the odd tree on top.
#[derive(Default)]
pub struct Flat {
	/// Blocks keyed by their height above the bottom of the world.
	layers: BTreeMap<i64, BlockId>,
	biome: u16,
}

impl Flat {
	pub const ID: &'static str = "flat";

	pub fn classic() -> Self {
		let mut cfg = Self::default();
		cfg.biome = 1;

		cfg.insert(0, "vanilla:bedrock");

		cfg.insert(1, "vanilla:stone");
		cfg.insert(2, "vanilla:stone");
		cfg.insert(3, "vanilla:stone");

		cfg.insert(4, "vanilla:dirt");
		cfg.insert(5, "vanilla:dirt");

		cfg.insert(6, "vanilla:grass");

		cfg
	}

	/// Sets the block at `height` above the bottom of the world. Unknown block names are ignored.
	pub fn insert(&mut self, height: i64, name: &str) {
		let id = match block::Lookup::lookup_value(name) {
			Some(id) => id,
			None => return,
		};
		self.layers.insert(height, id);
	}

	fn surface(&self) -> Option<i64> {
		self.layers.keys().last().cloned()
	}

	fn lay(&self, chunk: &mut Chunk) {
		let lookup = block::Lookup::get();
		let min_y = chunk.layout().min_y();
		for (height, block_id) in self.layers.iter() {
			let y = min_y + height;
			if !chunk.layout().contains_y(y) {
				continue;
			}
			for x in 0..16 {
				for z in 0..16 {
					chunk.gen_set_block(&lookup, &LocalPoint::new(x, y, z), (*block_id).into());
				}
			}
		}
	}

	/// Plants at most one small tree per chunk, chosen from the world seed.
	fn decorate(&self, world: &World, chunk: &mut Chunk) {
		let surface = match self.surface() {
			Some(height) => chunk.layout().min_y() + height,
			None => return,
		};
		let coordinate = *chunk.coordinate();
		let seed = world
			.seed()
			.wrapping_add((coordinate.x as u64).wrapping_mul(341873128712))
			.wrapping_add((coordinate.y as u64).wrapping_mul(132897987541));
		let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
		if !rng.gen_bool(0.25) {
			return;
		}

		let lookup = block::Lookup::get();
		let (x, z) = (rng.gen_range(2..14u8), rng.gen_range(2..14u8));
		let trunk_height = rng.gen_range(3..6i64);
		if !chunk.layout().contains_y(surface + trunk_height + 1) {
			return;
		}
		for dy in 1..=trunk_height {
			chunk.gen_set_block(&lookup, &LocalPoint::new(x, surface + dy, z), vanilla::OAK_LOG.into());
		}
		let crown = surface + trunk_height + 1;
		for lx in x - 1..=x + 1 {
			for lz in z - 1..=z + 1 {
				chunk.gen_set_block(&lookup, &LocalPoint::new(lx, crown, lz), vanilla::OAK_LEAVES.into());
			}
		}
	}
}

impl ChunkGenerator for Flat {
	fn generate_chunk(&self, world: &World, coordinate: ChunkCoord) -> anyhow::Result<Vec<u8>> {
		let mut chunk = Chunk::new(coordinate, *world.layout());
		for idx in 0..chunk.sub_chunk_count() {
			chunk.sub_chunk_mut(idx).fill_biome(self.biome);
		}
		chunk.encode(Compression::Raw, 0)
	}

	fn process_chunk(&self, world: &World, chunk: &mut Chunk, stage: u8) -> anyhow::Result<()> {
		match stage {
			LAYERS => {
				self.lay(chunk);
				chunk.set_generator_stage(DECORATE);
			}
			DECORATE => {
				self.decorate(world, chunk);
				chunk.set_generator_stage(COMPLETE);
			}
			_ => chunk.set_generator_stage(COMPLETE),
		}
		Ok(())
	}

	fn blocking_stages(&self) -> &[u8] {
		&[DECORATE]
	}

	fn locked_stages(&self) -> &[u8] {
		&[DECORATE]
	}

	fn resume_level_for(&self, distance: u8) -> u8 {
		match distance {
			0 => COMPLETE,
			_ => DECORATE,
		}
	}
}
