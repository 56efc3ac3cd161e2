use crate::{
	block::Lookup,
	world::{
		chunk::{sub_chunk, Chunk},
		point::{local_coordinate, DIAMETER},
		ChunkLightProcessor, World,
	},
};
use nalgebra::Point3;

/// Straight-down sky light and self-emitted block light, without any spreading.
/// Every block above the highest opaque block of its column gets full sky light.
pub struct Sky;

impl Sky {
	pub const ID: &'static str = "sky";

	/// The y of the first block above the highest opaque block of the column.
	fn open_sky_from(lookup: &Lookup, chunk: &Chunk, x: usize, z: usize) -> i64 {
		let min_y = chunk.layout().min_y();
		for idx in (0..chunk.sub_chunk_count()).rev() {
			let sub_chunk = chunk.sub_chunk(idx);
			if sub_chunk.is_empty() {
				continue;
			}
			for y in (0..sub_chunk::SIZE).rev() {
				let opaque = lookup
					.properties(sub_chunk.get_block_id(x, y, z))
					.map(|properties| properties.is_opaque())
					.unwrap_or(false);
				if opaque {
					return min_y + (idx as i64) * DIAMETER + y as i64 + 1;
				}
			}
		}
		min_y
	}

	fn light_column(lookup: &Lookup, chunk: &mut Chunk, x: usize, z: usize, only: Option<usize>) {
		let open_from = Self::open_sky_from(lookup, chunk, x, z);
		let min_y = chunk.layout().min_y();
		for idx in 0..chunk.sub_chunk_count() {
			if only.map(|only| only != idx).unwrap_or(false) {
				continue;
			}
			let base_y = min_y + (idx as i64) * DIAMETER;
			let sub_chunk = chunk.sub_chunk_mut(idx);
			for y in 0..sub_chunk::SIZE {
				let sky = if base_y + y as i64 >= open_from {
					sub_chunk::MAX_LIGHT
				} else {
					0
				};
				let emitted = lookup.light_emission(sub_chunk.get_block_id(x, y, z));
				sub_chunk.set_light(x, y, z, emitted, sky);
			}
		}
	}
}

impl ChunkLightProcessor for Sky {
	#[profiling::function]
	fn process_chunk(&self, _world: &World, chunk: &mut Chunk) {
		let lookup = Lookup::get();
		for x in 0..sub_chunk::SIZE {
			for z in 0..sub_chunk::SIZE {
				Self::light_column(&lookup, chunk, x, z, None);
			}
		}
		for idx in 0..chunk.sub_chunk_count() {
			chunk.sub_chunk_mut(idx).mark_light_valid();
		}
	}

	fn process_sub_chunk(&self, _world: &World, chunk: &mut Chunk, idx: usize) {
		let lookup = Lookup::get();
		for x in 0..sub_chunk::SIZE {
			for z in 0..sub_chunk::SIZE {
				Self::light_column(&lookup, chunk, x, z, Some(idx));
			}
		}
		chunk.sub_chunk_mut(idx).mark_light_valid();
	}

	fn block_changed(&self, _world: &World, chunk: &mut Chunk, point: Point3<i64>) {
		let lookup = Lookup::get();
		let (x, z) = (local_coordinate(point.x) as usize, local_coordinate(point.z) as usize);
		Self::light_column(&lookup, chunk, x, z, None);
	}
}

/// Leaves every block unlit.
pub struct Disabled;

impl Disabled {
	pub const ID: &'static str = "none";
}

impl ChunkLightProcessor for Disabled {
	fn process_sub_chunk(&self, _world: &World, chunk: &mut Chunk, idx: usize) {
		chunk.sub_chunk_mut(idx).mark_light_valid();
	}

	fn block_changed(&self, _world: &World, _chunk: &mut Chunk, _point: Point3<i64>) {}
}
