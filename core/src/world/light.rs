use super::{chunk::Chunk, World};
use crate::{common::utility::Registry, entity::Entity};
use nalgebra::Point3;
use std::sync::{Arc, OnceLock};

mod sky;
pub use sky::*;

/// Computes the light of chunks.
///
/// Every method is handed the chunk it works on already locked for writing.
/// Implementations must not call back into the [`World`] for chunk data or mutations:
/// the world's own lock may be held by the caller.
pub trait ChunkLightProcessor: Send + Sync {
	/// Lights every sub-chunk of the chunk.
	fn process_chunk(&self, world: &World, chunk: &mut Chunk) {
		for idx in 0..chunk.sub_chunk_count() {
			self.process_sub_chunk(world, chunk, idx);
		}
	}

	fn process_sub_chunk(&self, world: &World, chunk: &mut Chunk, idx: usize);

	/// Called after the block at the global `point` (inside `chunk`) changed.
	fn block_changed(&self, world: &World, chunk: &mut Chunk, point: Point3<i64>);

	/// Called when a light-emitting entity moves (or turns, see
	/// [`enable_entity_light_source_updates_include_rot`](ChunkLightProcessor::enable_entity_light_source_updates_include_rot)).
	fn process_entity_light_source(&self, _world: &World, _entity: &Entity, _position: Point3<f64>) {}

	/// Whether the world should call [`process_entity_light_source`](ChunkLightProcessor::process_entity_light_source) at all.
	fn enable_entity_light_source_updates(&self) -> bool {
		false
	}

	fn enable_entity_light_source_updates_include_rot(&self) -> bool {
		false
	}
}

/// The process-wide light processors, by id. `sky` and `none` are always available.
pub fn light_processors() -> &'static Registry<dyn ChunkLightProcessor> {
	static PROCESSORS: OnceLock<Registry<dyn ChunkLightProcessor>> = OnceLock::new();
	PROCESSORS.get_or_init(|| {
		let registry = Registry::<dyn ChunkLightProcessor>::default();
		registry.register_it(Sky::ID, Arc::new(Sky));
		registry.register_it(Disabled::ID, Arc::new(Disabled));
		registry
	})
}
