use super::{
	chunk::{BiomeId, Chunk, HeightMapKind},
	point::{BlockPoint, LocalPoint},
	World,
};
use crate::{
	block::{Block, Lookup, AIR},
	common::utility::recover,
	entity::WorldEvent,
};
use nalgebra::Point3;

/// How a block change was made. Passed on to everyone notified of the change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetMode {
	/// Overwrites whatever was there.
	Replace,
	/// Overwrites whatever was there, as if it had been broken.
	Destroy,
	/// Only places into air, and never schedules a tick for the new block.
	Keep,
}

/// A region of blocks (or entity positions) for the ranged world operations. Both shapes include their edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bounds {
	Cubic { min: Point3<i64>, max: Point3<i64> },
	Spherical { center: Point3<i64>, radius: i64 },
}

impl Bounds {
	/// The box spanning both corners, in any order.
	pub fn cubic(a: Point3<i64>, b: Point3<i64>) -> Self {
		Self::Cubic {
			min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
			max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
		}
	}

	pub fn spherical(center: Point3<i64>, radius: i64) -> Self {
		Self::Spherical {
			center,
			radius: radius.abs(),
		}
	}

	fn extents(&self) -> (Point3<i64>, Point3<i64>) {
		match self {
			Self::Cubic { min, max } => (*min, *max),
			Self::Spherical { center, radius } => (
				center - nalgebra::Vector3::repeat(*radius),
				center + nalgebra::Vector3::repeat(*radius),
			),
		}
	}

	pub fn contains(&self, point: &Point3<i64>) -> bool {
		match self {
			Self::Cubic { min, max } => {
				(min.x..=max.x).contains(&point.x)
					&& (min.y..=max.y).contains(&point.y)
					&& (min.z..=max.z).contains(&point.z)
			}
			Self::Spherical { center, radius } => {
				let offset = point - center;
				offset.dot(&offset) <= radius * radius
			}
		}
	}

	/// Whether the block containing `position` is inside the bounds.
	pub fn contains_position(&self, position: &Point3<f64>) -> bool {
		self.contains(&position.map(|value| value.floor() as i64))
	}

	/// Every block in the bounds, ordered by x, then y, then z.
	pub fn points(&self) -> Vec<Point3<i64>> {
		let (min, max) = self.extents();
		let mut points = Vec::new();
		for x in min.x..=max.x {
			for y in min.y..=max.y {
				for z in min.z..=max.z {
					let point = Point3::new(x, y, z);
					if self.contains(&point) {
						points.push(point);
					}
				}
			}
		}
		points
	}
}

impl World {
	/// Runs `read` on the chunk containing `point`, if it is resident and complete.
	fn read_complete<T, F>(&self, point: &Point3<i64>, read: F) -> Option<T>
	where
		F: FnOnce(&Chunk, &LocalPoint) -> T,
	{
		if !self.layout().contains_y(point.y) {
			return None;
		}
		let block_point = BlockPoint::from_global(*point);
		let arc_chunk = self.get_chunk(block_point.chunk())?;
		let chunk = recover(arc_chunk.read());
		if !chunk.is_complete() {
			return None;
		}
		Some(read(&chunk, block_point.offset()))
	}

	/// The block at `point`. None if its chunk is not resident and complete, or `y` is outside the world.
	pub fn get_block(&self, point: Point3<i64>) -> Option<Block> {
		self.read_complete(&point, |chunk, local| chunk.get_block(local))
	}

	/// Places a block, returning the block it replaced.
	///
	/// Nothing happens (and None is returned) if the chunk is not resident and complete,
	/// if `y` is outside the world, or if `mode` is [`Keep`](SetMode::Keep) and the block is not air.
	/// The light processor sees the change before anyone is notified of it.
	#[profiling::function]
	pub fn set_block(&self, point: Point3<i64>, block: Block, mode: SetMode) -> Option<Block> {
		if !self.layout().contains_y(point.y) {
			return None;
		}
		let block_point = BlockPoint::from_global(point);
		let local = *block_point.offset();

		let mut state = self.lock_state();
		let arc_chunk = state.settled_chunk(block_point.chunk())?.clone();
		let now = state.data.tick;
		let lookup = Lookup::get();
		let previous = {
			let mut chunk = recover(arc_chunk.write());
			if !chunk.is_complete() {
				return None;
			}
			if mode == SetMode::Keep && !chunk.get_block(&local).is_air() {
				return None;
			}
			let previous = chunk.set_block_with(&lookup, &local, block.clone(), |chunk| {
				self.light.block_changed(self, chunk, point)
			});
			if mode != SetMode::Keep {
				let spread_interval = lookup
					.properties(block.id())
					.and_then(|properties| properties.liquid_spread_interval());
				let scheduled = match spread_interval {
					Some(interval) => chunk.query_for_liquid_tick(local, now + interval, 0),
					None => chunk.query_for_tick(local, now, 0),
				};
				if let Err(error) = scheduled {
					log::error!(target: super::world::LOG, "Failed to schedule tick at {}: {}", point, error);
				}
			}
			previous
		};

		state.unload_pending.remove(block_point.chunk());
		self.notify(
			&state,
			WorldEvent::BlockChanged {
				point,
				previous: previous.clone(),
				block,
				mode,
			},
		);
		Some(previous)
	}

	pub fn remove_block(&self, point: Point3<i64>) -> Option<Block> {
		self.set_block(point, Block::Simple(AIR), SetMode::Destroy)
	}

	/// Places `block` at every point of `bounds`, returning how many blocks were placed.
	pub fn set_block_range(&self, bounds: &Bounds, block: Block, mode: SetMode) -> usize {
		bounds
			.points()
			.into_iter()
			.filter(|point| self.set_block(*point, block.clone(), mode).is_some())
			.count()
	}

	/// The block at `point`, loading or generating its chunk first if needed.
	pub async fn query_block(&self, point: Point3<i64>) -> Option<Block> {
		if !self.layout().contains_y(point.y) {
			return None;
		}
		let block_point = BlockPoint::from_global(point);
		let arc_chunk = self.complete_chunk(*block_point.chunk()).await?;
		let chunk = recover(arc_chunk.read());
		Some(chunk.get_block(block_point.offset()))
	}

	/// [`set_block`](World::set_block), loading or generating the chunk first if needed.
	pub async fn set_block_async(&self, point: Point3<i64>, block: Block, mode: SetMode) -> Option<Block> {
		if !self.layout().contains_y(point.y) {
			return None;
		}
		let block_point = BlockPoint::from_global(point);
		self.complete_chunk(*block_point.chunk()).await?;
		self.set_block(point, block, mode)
	}

	pub fn get_biome(&self, point: Point3<i64>) -> Option<BiomeId> {
		self.read_complete(&point, |chunk, local| chunk.get_biome(local))
	}

	/// Changes the biome of the 4x4x4 cell containing `point`, returning the previous biome.
	pub fn set_biome(&self, point: Point3<i64>, biome: BiomeId) -> Option<BiomeId> {
		if !self.layout().contains_y(point.y) {
			return None;
		}
		let block_point = BlockPoint::from_global(point);
		let mut state = self.lock_state();
		let arc_chunk = state.settled_chunk(block_point.chunk())?.clone();
		let previous = {
			let mut chunk = recover(arc_chunk.write());
			if !chunk.is_complete() {
				return None;
			}
			chunk.set_biome(block_point.offset(), biome)
		};
		state.unload_pending.remove(block_point.chunk());
		self.notify(
			&state,
			WorldEvent::BiomeChanged {
				point,
				previous,
				biome,
			},
		);
		Some(previous)
	}

	/// Sets the biome at every point of `bounds`, returning how many points were changed.
	pub fn set_biome_range(&self, bounds: &Bounds, biome: BiomeId) -> usize {
		bounds
			.points()
			.into_iter()
			.filter(|point| self.set_biome(*point, biome).is_some())
			.count()
	}

	/// One above the highest block of the column matching `kind`.
	pub fn height(&self, kind: HeightMapKind, x: i64, z: i64) -> Option<i64> {
		let point = Point3::new(x, self.layout().min_y(), z);
		self.read_complete(&point, |chunk, local| chunk.height(kind, local.x, local.z))
	}
}

#[cfg(test)]
mod blocks {
	use super::*;
	use crate::{
		block::{vanilla, BlockId},
		common::utility::ScratchDir,
		entity::{Entity, EntityId, Marker, WorldProcessor},
		world::{
			point::{chunk, LocalPoint},
			testing::{flat_data, open, runtime},
		},
	};
	use std::sync::{Arc, Mutex, RwLock};

	#[derive(Default)]
	struct Recorder(Mutex<Vec<(EntityId, Point3<i64>, BlockId)>>);

	impl WorldProcessor for Recorder {
		fn on_block_changed(
			&self,
			receiver: EntityId,
			point: &Point3<i64>,
			_previous: &Block,
			block: &Block,
			_mode: SetMode,
		) -> anyhow::Result<()> {
			self.0.lock().unwrap().push((receiver, *point, block.id()));
			Ok(())
		}
	}

	#[test]
	fn bounds_shapes() {
		let cube = Bounds::cubic(Point3::new(2, 0, 2), Point3::new(0, 1, 0));
		assert_eq!(cube.points().len(), 18);
		assert!(cube.contains(&Point3::new(1, 1, 2)));
		assert!(cube.contains_position(&Point3::new(2.9, 1.5, 0.1)));
		assert!(!cube.contains_position(&Point3::new(3.0, 1.0, 0.0)));

		let sphere = Bounds::spherical(Point3::new(0, 0, 0), 1);
		assert_eq!(sphere.points().len(), 7);
		assert!(!sphere.contains(&Point3::new(1, 1, 0)));
	}

	#[test]
	fn scenario_block_change_reaches_overlapping_entity() {
		let rt = runtime();
		let dir = ScratchDir::new("blocks-scenario");
		let world = open(&dir, &rt, flat_data());
		world.request_chunk_data_sync(chunk(1, -1)).unwrap();

		let near = Arc::new(Recorder::default());
		let far = Arc::new(Recorder::default());
		let near_entity = Arc::new(RwLock::new(
			Entity::new(Arc::new(Marker))
				.with_position(Point3::new(40.0, 70.0, 10.0))
				.with_processor(near.clone()),
		));
		let far_entity = Arc::new(RwLock::new(
			Entity::new(Arc::new(Marker))
				.with_position(Point3::new(400.0, 70.0, 400.0))
				.with_processor(far.clone()),
		));
		let near_id = world.register_entity(&near_entity).unwrap();
		world.register_entity(&far_entity).unwrap();

		let point = Point3::new(16, 70, -1);
		let previous = world.set_block(point, vanilla::STONE.into(), SetMode::Replace);
		assert_eq!(previous, Some(Block::Simple(vanilla::AIR)));

		let arc_chunk = world.get_chunk(&chunk(1, -1)).unwrap();
		{
			let chunk = arc_chunk.read().unwrap();
			assert_eq!(chunk.get_block_id(&LocalPoint::new(0, 70, 15)), vanilla::STONE);
			assert_eq!(chunk.height(HeightMapKind::MotionBlocking, 0, 15), 71);
			assert_eq!(chunk.block_ticks().len(), 1);
		}
		assert_eq!(world.height(HeightMapKind::MotionBlocking, 16, -1), Some(71));

		world.flush_notifications();
		assert_eq!(*near.0.lock().unwrap(), vec![(near_id, point, vanilla::STONE)]);
		assert!(far.0.lock().unwrap().is_empty());
	}

	#[test]
	fn keep_only_fills_air_and_schedules_nothing() {
		let rt = runtime();
		let dir = ScratchDir::new("blocks-keep");
		let world = open(&dir, &rt, flat_data());
		world.request_chunk_data_sync(chunk(0, 0)).unwrap();

		// the flat surface is grass at y 6
		assert!(world.set_block(Point3::new(1, 6, 1), vanilla::SAND.into(), SetMode::Keep).is_none());
		assert_eq!(world.get_block(Point3::new(1, 6, 1)).unwrap().id(), vanilla::GRASS);

		assert!(world.set_block(Point3::new(1, 30, 1), vanilla::SAND.into(), SetMode::Keep).is_some());
		let arc_chunk = world.get_chunk(&chunk(0, 0)).unwrap();
		assert!(arc_chunk.read().unwrap().block_ticks().is_empty());
	}

	#[test]
	fn liquids_schedule_liquid_ticks() {
		let rt = runtime();
		let dir = ScratchDir::new("blocks-liquid");
		let world = open(&dir, &rt, flat_data());
		world.request_chunk_data_sync(chunk(0, 0)).unwrap();
		world.set_block(Point3::new(3, 20, 3), vanilla::WATER.into(), SetMode::Replace);

		let arc_chunk = world.get_chunk(&chunk(0, 0)).unwrap();
		let chunk = arc_chunk.read().unwrap();
		assert!(chunk.block_ticks().is_empty());
		let due = chunk.liquid_ticks().due_ticks();
		assert_eq!(due, vec![(0, 5, LocalPoint::new(3, 20, 3))]);
	}

	#[test]
	fn missing_chunks_and_bad_heights_are_ignored() {
		let rt = runtime();
		let dir = ScratchDir::new("blocks-missing");
		let world = open(&dir, &rt, flat_data());
		assert!(world.get_block(Point3::new(0, 10, 0)).is_none());
		assert!(world.set_block(Point3::new(0, 10, 0), vanilla::STONE.into(), SetMode::Replace).is_none());

		world.request_chunk_data_sync(chunk(0, 0)).unwrap();
		assert!(world.get_block(Point3::new(0, 256, 0)).is_none());
		assert!(world.set_block(Point3::new(0, -1, 0), vanilla::STONE.into(), SetMode::Replace).is_none());
	}

	#[test]
	fn async_operations_load_the_chunk() {
		let rt = runtime();
		let dir = ScratchDir::new("blocks-async");
		let world = open(&dir, &rt, flat_data());
		let point = Point3::new(-33, 2, 47);
		assert_eq!(rt.block_on(world.query_block(point)).unwrap().id(), vanilla::STONE);

		let previous = rt.block_on(world.set_block_async(Point3::new(100, 50, 100), vanilla::DIRT.into(), SetMode::Replace));
		assert_eq!(previous.unwrap().id(), vanilla::AIR);
		assert_eq!(world.get_block(Point3::new(100, 50, 100)).unwrap().id(), vanilla::DIRT);
	}

	#[test]
	fn ranges() {
		let rt = runtime();
		let dir = ScratchDir::new("blocks-range");
		let world = open(&dir, &rt, flat_data());
		world.request_chunk_data_sync(chunk(0, 0)).unwrap();
		let bounds = Bounds::cubic(Point3::new(0, 100, 0), Point3::new(3, 101, 3));
		assert_eq!(world.set_block_range(&bounds, vanilla::GLASS.into(), SetMode::Replace), 32);
		assert_eq!(world.set_biome_range(&bounds, 7), 32);
		assert_eq!(world.get_biome(Point3::new(2, 100, 2)), Some(7));
		// the range spans chunk (-1, 0), which is not resident
		let straddling = Bounds::cubic(Point3::new(-2, 100, 0), Point3::new(1, 100, 0));
		assert_eq!(world.set_block_range(&straddling, vanilla::STONE.into(), SetMode::Replace), 2);
	}
}
