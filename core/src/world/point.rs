use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// The number of blocks along the x and z (and sub-chunk y) axis of a chunk.
pub const DIAMETER: i64 = 16;

/// The coordinate of a chunk column.
/// `x` is the chunk's x coordinate, and `y` is the chunk's **z** coordinate.
pub type ChunkCoord = Point2<i64>;

/// Builds a [`ChunkCoord`] from column coordinates.
pub fn chunk(x: i64, z: i64) -> ChunkCoord {
	Point2::new(x, z)
}

/// The chunk a global block coordinate lives in (floor division, so `-1` is in chunk `-1`).
pub fn chunk_coordinate(global: i64) -> i64 {
	global.div_euclid(DIAMETER)
}

/// The offset of a global block coordinate within its chunk, always in `0..16`.
pub fn local_coordinate(global: i64) -> u8 {
	global.rem_euclid(DIAMETER) as u8
}

/// The chunk column an entity at `position` stands in.
pub fn chunk_of_position(position: &Point3<f64>) -> ChunkCoord {
	chunk(
		chunk_coordinate(position.x.floor() as i64),
		chunk_coordinate(position.z.floor() as i64),
	)
}

/// The ring (chebyshev) distance between two chunk columns.
pub fn ring_distance(a: &ChunkCoord, b: &ChunkCoord) -> u64 {
	let offset = b - a;
	offset.x.unsigned_abs().max(offset.y.unsigned_abs())
}

pub fn fmt_chunk(coordinate: &ChunkCoord) -> String {
	format!("<{}, {}>", coordinate.x, coordinate.y)
}

/// A block position inside a chunk column.
/// `x` and `z` are in `0..16`, `y` stays a global height.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct LocalPoint {
	pub x: u8,
	pub y: i64,
	pub z: u8,
}

impl LocalPoint {
	pub fn new(x: u8, y: i64, z: u8) -> Self {
		debug_assert!((x as i64) < DIAMETER && (z as i64) < DIAMETER);
		Self { x, y, z }
	}
}

/// A global block coordinate split into its chunk and the offset within that chunk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BlockPoint {
	chunk: ChunkCoord,
	offset: LocalPoint,
}

impl BlockPoint {
	/// Creates a point from a chunk and an offset which may lie outside of that chunk,
	/// shifting the chunk until the offset is in range.
	pub fn new(chunk: ChunkCoord, x: i64, y: i64, z: i64) -> Self {
		let mut point = Self {
			chunk,
			offset: LocalPoint { x: 0, y, z: 0 },
		};
		point.align(x, z);
		point
	}

	pub fn from_global(point: Point3<i64>) -> Self {
		Self::new(chunk(0, 0), point.x, point.y, point.z)
	}

	fn align(&mut self, x: i64, z: i64) {
		self.chunk.x += chunk_coordinate(x);
		self.chunk.y += chunk_coordinate(z);
		self.offset.x = local_coordinate(x);
		self.offset.z = local_coordinate(z);
	}

	pub fn chunk(&self) -> &ChunkCoord {
		&self.chunk
	}

	pub fn offset(&self) -> &LocalPoint {
		&self.offset
	}

	pub fn global(&self) -> Point3<i64> {
		Point3::new(
			self.chunk.x * DIAMETER + self.offset.x as i64,
			self.offset.y,
			self.chunk.y * DIAMETER + self.offset.z as i64,
		)
	}
}

impl std::fmt::Display for BlockPoint {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let global = self.global();
		write!(f, "<{}, {}, {}>", global.x, global.y, global.z)
	}
}

#[cfg(test)]
mod point {
	use super::*;

	#[test]
	fn round_trip_all_offsets_near_origin() {
		for global in -100i64..=100 {
			let chunk = chunk_coordinate(global);
			let local = local_coordinate(global) as i64;
			assert!((0..DIAMETER).contains(&local));
			assert_eq!(chunk * DIAMETER + local, global);
		}
	}

	#[test]
	fn negative_one_is_last_block_of_previous_chunk() {
		assert_eq!(chunk_coordinate(-1), -1);
		assert_eq!(local_coordinate(-1), 15);
		assert_eq!(chunk_coordinate(-16), -1);
		assert_eq!(local_coordinate(-16), 0);
		assert_eq!(chunk_coordinate(-17), -2);
		assert_eq!(local_coordinate(-17), 15);
	}

	#[test]
	fn scenario_point() {
		let point = BlockPoint::from_global(Point3::new(16, 70, -1));
		assert_eq!(*point.chunk(), chunk(1, -1));
		assert_eq!(*point.offset(), LocalPoint::new(0, 70, 15));
		assert_eq!(point.global(), Point3::new(16, 70, -1));
	}

	#[test]
	fn no_change() {
		let point = BlockPoint::new(chunk(0, 0), 1, 2, 3);
		assert_eq!(*point.chunk(), chunk(0, 0));
		assert_eq!(*point.offset(), LocalPoint::new(1, 2, 3));
	}

	#[test]
	fn over_positive() {
		let point = BlockPoint::new(chunk(0, 0), 17, 19, 16);
		assert_eq!(*point.chunk(), chunk(1, 1));
		assert_eq!(*point.offset(), LocalPoint::new(1, 19, 0));
	}

	#[test]
	fn under_negative() {
		let point = BlockPoint::new(chunk(2, 2), -1, -5, -33);
		assert_eq!(*point.chunk(), chunk(1, -1));
		assert_eq!(*point.offset(), LocalPoint::new(15, -5, 15));
	}

	#[test]
	fn entity_position_chunk() {
		assert_eq!(
			chunk_of_position(&Point3::new(-0.5, 64.0, 15.99)),
			chunk(-1, 0)
		);
		assert_eq!(chunk_of_position(&Point3::new(32.0, 0.0, -16.0)), chunk(2, -1));
	}

	#[test]
	fn ring_distances() {
		assert_eq!(ring_distance(&chunk(0, 0), &chunk(0, 0)), 0);
		assert_eq!(ring_distance(&chunk(0, 0), &chunk(3, -1)), 3);
		assert_eq!(ring_distance(&chunk(-2, 5), &chunk(1, 1)), 4);
	}
}
