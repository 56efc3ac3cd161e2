use crate::{common::utility::recover, world::World};
use nalgebra::Point3;
use std::{
	collections::HashMap,
	sync::{Arc, OnceLock, RwLock},
};

pub type BlockId = u16;

/// The id every chunk is filled with before anything is placed.
pub const AIR: BlockId = 0;

/// Ids of the blocks registered by [`Lookup::vanilla`], in registration order.
pub mod vanilla {
	use super::BlockId;
	pub const AIR: BlockId = 0;
	pub const BEDROCK: BlockId = 1;
	pub const STONE: BlockId = 2;
	pub const DIRT: BlockId = 3;
	pub const GRASS: BlockId = 4;
	pub const WATER: BlockId = 5;
	pub const LAVA: BlockId = 6;
	pub const OAK_LEAVES: BlockId = 7;
	pub const GLASS: BlockId = 8;
	pub const SAND: BlockId = 9;
	pub const TORCH: BlockId = 10;
	pub const OAK_LOG: BlockId = 11;
}

/// Callbacks a block type can provide for the world tick.
/// They run with no world, chunk or entity lock held, so they are free to call back into the [`World`].
pub trait Behavior: Send + Sync {
	fn on_scheduled_tick(&self, _world: &World, _point: Point3<i64>, _block: BlockId) {}
	fn on_liquid_tick(&self, _world: &World, _point: Point3<i64>, _block: BlockId) {}
	fn on_random_tick(&self, _world: &World, _point: Point3<i64>, _block: BlockId) {}
}

/// Everything the core needs to know about a block type.
#[derive(Clone)]
pub struct Properties {
	name: String,
	motion_blocking: bool,
	opaque: bool,
	leaves: bool,
	liquid_spread_interval: Option<u64>,
	random_ticks: bool,
	light_emission: u8,
	behavior: Option<Arc<dyn Behavior>>,
}

impl std::fmt::Debug for Properties {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Properties")
			.field("name", &self.name)
			.field("motion_blocking", &self.motion_blocking)
			.field("opaque", &self.opaque)
			.field("leaves", &self.leaves)
			.field("liquid_spread_interval", &self.liquid_spread_interval)
			.field("random_ticks", &self.random_ticks)
			.field("light_emission", &self.light_emission)
			.field("behavior", &self.behavior.is_some())
			.finish()
	}
}

impl Properties {
	/// A non-solid, see-through block (air, flowers, torches).
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			motion_blocking: false,
			opaque: false,
			leaves: false,
			liquid_spread_interval: None,
			random_ticks: false,
			light_emission: 0,
			behavior: None,
		}
	}

	/// Blocks movement and light.
	pub fn solid(mut self) -> Self {
		self.motion_blocking = true;
		self.opaque = true;
		self
	}

	/// Blocks movement but lets light through (glass).
	pub fn transparent(mut self) -> Self {
		self.motion_blocking = true;
		self.opaque = false;
		self
	}

	pub fn leaves(mut self) -> Self {
		self.motion_blocking = true;
		self.leaves = true;
		self
	}

	/// Marks the block as a liquid which re-ticks every `spread_interval` ticks after being placed.
	pub fn liquid(mut self, spread_interval: u64) -> Self {
		self.liquid_spread_interval = Some(spread_interval);
		self
	}

	pub fn random_ticks(mut self) -> Self {
		self.random_ticks = true;
		self
	}

	pub fn emits_light(mut self, level: u8) -> Self {
		self.light_emission = level.min(15);
		self
	}

	pub fn with_behavior(mut self, behavior: Arc<dyn Behavior>) -> Self {
		self.behavior = Some(behavior);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn is_motion_blocking(&self) -> bool {
		self.motion_blocking
	}

	pub fn is_opaque(&self) -> bool {
		self.opaque
	}

	pub fn is_leaves(&self) -> bool {
		self.leaves
	}

	pub fn is_liquid(&self) -> bool {
		self.liquid_spread_interval.is_some()
	}

	pub fn liquid_spread_interval(&self) -> Option<u64> {
		self.liquid_spread_interval
	}

	pub fn is_random_tickable(&self) -> bool {
		self.random_ticks
	}

	pub fn light_emission(&self) -> u8 {
		self.light_emission
	}

	pub fn behavior(&self) -> Option<&Arc<dyn Behavior>> {
		self.behavior.as_ref()
	}
}

/// A mapping of block name to [`BlockId`] (and back), plus the [`Properties`] of each id.
///
/// The table is process-wide. Readers take a snapshot via [`Lookup::get`];
/// [`Lookup::register`] publishes a new snapshot, so a registration never blocks a tick in progress.
#[derive(Default)]
pub struct Lookup {
	ordered: Vec<Arc<Properties>>,
	id_values: HashMap<String, BlockId>,
}

impl Lookup {
	fn instance() -> &'static RwLock<Arc<Lookup>> {
		static INSTANCE: OnceLock<RwLock<Arc<Lookup>>> = OnceLock::new();
		INSTANCE.get_or_init(|| RwLock::new(Arc::new(Lookup::vanilla())))
	}

	pub fn get() -> Arc<Self> {
		recover(Self::instance().read()).clone()
	}

	/// Registers a block type, returning its id.
	/// Registering a name that already exists replaces its properties and keeps its id.
	pub fn register(properties: Properties) -> BlockId {
		let mut guard = recover(Self::instance().write());
		let mut lookup = Self {
			ordered: guard.ordered.clone(),
			id_values: guard.id_values.clone(),
		};
		let id = lookup.push(properties);
		*guard = Arc::new(lookup);
		id
	}

	pub fn lookup_value(name: &str) -> Option<BlockId> {
		Self::get().id_of(name)
	}

	pub fn lookup_id(value: BlockId) -> Option<String> {
		Self::get()
			.properties(value)
			.map(|properties| properties.name.clone())
	}

	fn vanilla() -> Self {
		let mut lookup = Self::default();
		lookup.push(Properties::new("vanilla:air"));
		lookup.push(Properties::new("vanilla:bedrock").solid());
		lookup.push(Properties::new("vanilla:stone").solid());
		lookup.push(Properties::new("vanilla:dirt").solid());
		lookup.push(Properties::new("vanilla:grass").solid().random_ticks());
		lookup.push(Properties::new("vanilla:water").liquid(5));
		lookup.push(Properties::new("vanilla:lava").liquid(30).emits_light(15));
		lookup.push(Properties::new("vanilla:oak_leaves").leaves().random_ticks());
		lookup.push(Properties::new("vanilla:glass").transparent());
		lookup.push(Properties::new("vanilla:sand").solid());
		lookup.push(Properties::new("vanilla:torch").emits_light(14));
		lookup.push(Properties::new("vanilla:oak_log").solid());
		lookup
	}

	fn push(&mut self, properties: Properties) -> BlockId {
		if let Some(&id) = self.id_values.get(&properties.name) {
			self.ordered[id as usize] = Arc::new(properties);
			return id;
		}
		let id = self.ordered.len() as BlockId;
		self.id_values.insert(properties.name.clone(), id);
		self.ordered.push(Arc::new(properties));
		id
	}

	pub fn count(&self) -> usize {
		self.ordered.len()
	}

	pub fn id_of(&self, name: &str) -> Option<BlockId> {
		self.id_values.get(name).cloned()
	}

	pub fn properties(&self, id: BlockId) -> Option<&Arc<Properties>> {
		self.ordered.get(id as usize)
	}

	/// Unknown ids are never tickable.
	pub fn is_random_tickable(&self, id: BlockId) -> bool {
		self.properties(id)
			.map(|properties| properties.random_ticks)
			.unwrap_or(false)
	}

	pub fn light_emission(&self, id: BlockId) -> u8 {
		self.properties(id)
			.map(|properties| properties.light_emission)
			.unwrap_or(0)
	}
}
