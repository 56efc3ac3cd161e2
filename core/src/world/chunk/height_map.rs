use crate::block::{BlockId, Lookup, AIR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The number of columns in a chunk (16 x 16).
pub const COLUMNS: usize = 256;

/// The criteria a height map tracks.
/// Each map stores, per column, one above the y of the highest block matching its criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HeightMapKind {
	/// Any block that blocks motion, or any liquid.
	MotionBlocking,
	/// Same as [`MotionBlocking`](HeightMapKind::MotionBlocking), but leaves are ignored.
	MotionBlockingNoLeaves,
	/// Only blocks which block motion; liquids are ignored.
	OceanFloor,
	/// Any non-air block.
	WorldSurface,
}

impl HeightMapKind {
	pub const ALL: [HeightMapKind; 4] = [
		Self::MotionBlocking,
		Self::MotionBlockingNoLeaves,
		Self::OceanFloor,
		Self::WorldSurface,
	];

	pub fn name(&self) -> &'static str {
		match self {
			Self::MotionBlocking => "motion_blocking",
			Self::MotionBlockingNoLeaves => "motion_blocking_no_leaves",
			Self::OceanFloor => "ocean_floor",
			Self::WorldSurface => "world_surface",
		}
	}

	pub fn from_name(name: &str) -> Option<Self> {
		Self::ALL.iter().find(|kind| kind.name() == name).cloned()
	}

	fn index(&self) -> usize {
		match self {
			Self::MotionBlocking => 0,
			Self::MotionBlockingNoLeaves => 1,
			Self::OceanFloor => 2,
			Self::WorldSurface => 3,
		}
	}

	/// Returns true if the block counts toward this height map.
	pub fn matches(&self, lookup: &Lookup, id: BlockId) -> bool {
		if id == AIR {
			return false;
		}
		let properties = match lookup.properties(id) {
			Some(properties) => properties,
			// Unknown blocks are treated as plain solid blocks.
			None => return true,
		};
		match self {
			Self::MotionBlocking => properties.is_motion_blocking() || properties.is_liquid(),
			Self::MotionBlockingNoLeaves => {
				(properties.is_motion_blocking() || properties.is_liquid()) && !properties.is_leaves()
			}
			Self::OceanFloor => properties.is_motion_blocking(),
			Self::WorldSurface => true,
		}
	}
}

/// The four height maps of a chunk.
/// Heights are global y values; an empty column has the height of the chunk's lowest y.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightMaps {
	min_y: i64,
	maps: [Vec<i64>; 4],
}

fn column(x: usize, z: usize) -> usize {
	assert!(x < 16 && z < 16, "column <{}, {}> is out of range", x, z);
	z * 16 + x
}

impl HeightMaps {
	pub fn new(min_y: i64) -> Self {
		Self {
			min_y,
			maps: [
				vec![min_y; COLUMNS],
				vec![min_y; COLUMNS],
				vec![min_y; COLUMNS],
				vec![min_y; COLUMNS],
			],
		}
	}

	pub fn min_y(&self) -> i64 {
		self.min_y
	}

	pub fn get(&self, kind: HeightMapKind, x: usize, z: usize) -> i64 {
		self.maps[kind.index()][column(x, z)]
	}

	pub fn set(&mut self, kind: HeightMapKind, x: usize, z: usize, height: i64) {
		self.maps[kind.index()][column(x, z)] = height;
	}

	pub fn reset(&mut self) {
		for map in self.maps.iter_mut() {
			map.iter_mut().for_each(|height| *height = self.min_y);
		}
	}

	pub(crate) fn to_named(&self) -> BTreeMap<String, Vec<i64>> {
		HeightMapKind::ALL
			.iter()
			.map(|kind| (kind.name().to_owned(), self.maps[kind.index()].clone()))
			.collect()
	}

	/// Rebuilds the maps from their stored form.
	/// Returns None if any map is missing or has the wrong number of columns.
	pub(crate) fn from_named(min_y: i64, named: &BTreeMap<String, Vec<i64>>) -> Option<Self> {
		let mut maps = Self::new(min_y);
		for kind in HeightMapKind::ALL.iter() {
			let stored = named.get(kind.name())?;
			if stored.len() != COLUMNS {
				return None;
			}
			maps.maps[kind.index()] = stored.clone();
		}
		Some(maps)
	}
}

#[cfg(test)]
mod height_map {
	use super::*;
	use crate::block::vanilla;

	#[test]
	fn classification() {
		let lookup = Lookup::get();
		use HeightMapKind::*;
		assert!(MotionBlocking.matches(&lookup, vanilla::STONE));
		assert!(MotionBlocking.matches(&lookup, vanilla::WATER));
		assert!(MotionBlocking.matches(&lookup, vanilla::OAK_LEAVES));
		assert!(!MotionBlocking.matches(&lookup, vanilla::TORCH));

		assert!(!MotionBlockingNoLeaves.matches(&lookup, vanilla::OAK_LEAVES));
		assert!(MotionBlockingNoLeaves.matches(&lookup, vanilla::WATER));

		assert!(!OceanFloor.matches(&lookup, vanilla::WATER));
		assert!(OceanFloor.matches(&lookup, vanilla::SAND));

		assert!(WorldSurface.matches(&lookup, vanilla::TORCH));
		assert!(!WorldSurface.matches(&lookup, vanilla::AIR));
	}

	#[test]
	fn names_round_trip() {
		for kind in HeightMapKind::ALL.iter() {
			assert_eq!(HeightMapKind::from_name(kind.name()), Some(*kind));
		}
		assert_eq!(HeightMapKind::from_name("light_blocking"), None);
	}

	#[test]
	fn named_requires_every_map() {
		let mut maps = HeightMaps::new(0);
		maps.set(HeightMapKind::OceanFloor, 3, 4, 61);
		let mut named = maps.to_named();
		assert_eq!(HeightMaps::from_named(0, &named), Some(maps));
		named.remove("world_surface");
		assert_eq!(HeightMaps::from_named(0, &named), None);
	}
}
