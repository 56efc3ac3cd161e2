use super::{
	chunk::{Chunk, StageBarrier, COMPLETE},
	point::ChunkCoord,
	World,
};
use crate::common::utility::Registry;
use std::sync::{Arc, OnceLock};

mod flat;
pub use flat::*;

/// Produces the terrain of new chunks.
///
/// A chunk starts as the snapshot returned by [`generate_chunk`](ChunkGenerator::generate_chunk),
/// then [`process_chunk`](ChunkGenerator::process_chunk) is called repeatedly, each call advancing
/// the chunk's generator stage, until the stage reaches [`COMPLETE`] or the chunk's resume level.
///
/// Every chunk generating against one generator waits for all the others at each of its
/// [`blocking_stages`](ChunkGenerator::blocking_stages), so work at such a stage
/// can rely on neighboring chunks having reached it.
pub trait ChunkGenerator: Send + Sync {
	/// The initial contents of a chunk, in the chunk file format.
	fn generate_chunk(&self, world: &World, coordinate: ChunkCoord) -> anyhow::Result<Vec<u8>>;

	/// Performs the work of `stage` and advances the chunk's generator stage.
	/// Called without any world lock held; only the chunk being generated is locked,
	/// so other chunks may be read through the world (never this one).
	fn process_chunk(&self, world: &World, chunk: &mut Chunk, stage: u8) -> anyhow::Result<()>;

	fn blocking_stages(&self) -> &[u8] {
		&[]
	}

	/// Stages whose work is serialized across all chunks of this generator.
	fn locked_stages(&self) -> &[u8] {
		&[]
	}

	/// The stage generation may pause at for a chunk `distance` levels beyond the border band.
	fn resume_level_for(&self, _distance: u8) -> u8 {
		COMPLETE
	}
}

/// A generator together with the barrier shared by every chunk it generates.
pub struct Registered {
	pub generator: Arc<dyn ChunkGenerator>,
	pub barrier: StageBarrier,
}

impl Registered {
	pub fn new(generator: Arc<dyn ChunkGenerator>) -> Self {
		let barrier = StageBarrier::new(generator.blocking_stages(), generator.locked_stages());
		Self { generator, barrier }
	}
}

/// The process-wide chunk generators, by id. `flat` is always available.
pub fn generators() -> &'static Registry<Registered> {
	static GENERATORS: OnceLock<Registry<Registered>> = OnceLock::new();
	GENERATORS.get_or_init(|| {
		let registry = Registry::default();
		registry.register_it(Flat::ID, Arc::new(Registered::new(Arc::new(Flat::classic()))));
		registry
	})
}

/// Registers a generator under `id`, replacing (and returning) any previous generator of that id.
pub fn register_generator(id: impl Into<String>, generator: Arc<dyn ChunkGenerator>) -> Option<Arc<Registered>> {
	generators().register_it(id, Arc::new(Registered::new(generator)))
}
