use super::{
	chunk::{ticket::{LevelMap, Tickets}, ArcLockChunk, Layout, Ticket, TicketId},
	generators, light_processors,
	lifecycle::{ChunkFuture, SaveFuture},
	notify::{Notifier, Targets},
	point::{chunk_of_position, ChunkCoord},
	ChunkLightProcessor, Error, Registered, WorldData,
};
use crate::{
	common::utility::{recover, DataFile},
	config::Config,
	entity::{ArcLockEntity, EntityId, ProcessingRegion, WorldEvent, WorldProcessor},
};
use nalgebra::Point3;
use rand::{rngs::StdRng, SeedableRng};
use std::{
	collections::{BTreeMap, HashMap, HashSet},
	path::{Path, PathBuf},
	sync::{Arc, Mutex, MutexGuard, Weak},
};

/// The log category for world bookkeeping.
pub(super) static LOG: &'static str = "world";

/// An entity attached to a world.
pub(super) struct Attached {
	pub entity: ArcLockEntity,
	pub processor: Option<Arc<dyn WorldProcessor>>,
	pub region: ProcessingRegion,
	/// The chunk the entity has been placed in. None while it waits for that chunk.
	pub chunk: Option<ChunkCoord>,
}

/// Everything about a world which changes, guarded by one lock.
pub(super) struct State {
	pub data: WorldData,
	pub chunks: HashMap<ChunkCoord, ArcLockChunk>,
	/// The load level of every chunk reached by a ticket, as of the last tick.
	pub levels: LevelMap,
	pub entities: BTreeMap<EntityId, Attached>,
	/// Attached entities waiting for their chunk to be resident before being placed in it.
	pub pending_attachments: Vec<EntityId>,
	pub next_entity_id: EntityId,
	pub tickets: Tickets,
	pub spawn_ticket: TicketId,
	pub loading: HashMap<ChunkCoord, ChunkFuture>,
	pub saving: HashMap<ChunkCoord, SaveFuture>,
	/// Chunks no ticket reaches, paired with the tick they were first seen that way.
	pub ticketless: HashMap<ChunkCoord, u64>,
	/// Chunks to evict once their in-flight save succeeds.
	/// Any request or mutation on the chunk in the meantime cancels the eviction.
	pub unload_pending: HashSet<ChunkCoord>,
	/// Entities which left a chunk while it was generating, taken out of it once generation finishes.
	pub departed: HashMap<ChunkCoord, Vec<EntityId>>,
}

impl State {
	/// The resident chunk at `coordinate`, unless a request is generating it.
	///
	/// Generation holds the chunk's lock while the generator runs, and generators may call into the world,
	/// so nothing holding the state lock may wait on a chunk which is loading.
	pub fn settled_chunk(&self, coordinate: &ChunkCoord) -> Option<&ArcLockChunk> {
		match self.loading.contains_key(coordinate) {
			true => None,
			false => self.chunks.get(coordinate),
		}
	}

	/// Takes the entity out of the resident chunk, or out of it once generation finishes if it is loading.
	pub fn remove_from_chunk(&mut self, coordinate: ChunkCoord, id: EntityId) {
		if self.loading.contains_key(&coordinate) {
			if self.chunks.contains_key(&coordinate) {
				self.departed.entry(coordinate).or_default().push(id);
			}
			return;
		}
		if let Some(arc_chunk) = self.chunks.get(&coordinate) {
			recover(arc_chunk.write()).remove_entity(id);
		}
	}

	/// The processors of every other attached entity which should hear about `event`.
	fn targets_of(&self, event: &WorldEvent) -> Targets {
		let chunks = event.chunks();
		let source = event.source();
		self.entities
			.iter()
			.filter(|(id, _)| Some(**id) != source)
			.filter(|(_, attached)| match &chunks {
				Some(chunks) => chunks.iter().any(|chunk| attached.region.contains(chunk)),
				None => true,
			})
			.filter_map(|(id, attached)| {
				attached
					.processor
					.as_ref()
					.map(|processor| (*id, processor.clone()))
			})
			.collect()
	}
}

/// One world: its chunks, the entities attached to it, and the tickets deciding what stays loaded.
///
/// Worlds are always shared (`Arc<World>`); chunk work is handed to the blocking pool of the provided
/// tokio runtime and holds its own reference to the world until it finishes.
///
/// Locks are taken in the order world state, then chunk, then entity.
/// Block behaviors, entity kinds and notification consumers are never called with a lock held.
pub struct World {
	id: String,
	root: PathBuf,
	weak_self: Weak<World>,
	runtime: tokio::runtime::Handle,
	config: Arc<Config>,
	seed: u64,
	layout: Layout,
	pub(super) generator: Arc<Registered>,
	pub(super) light: Arc<dyn ChunkLightProcessor>,
	pub(super) state: Mutex<State>,
	notifier: Notifier,
	pub(super) rng: Mutex<StdRng>,
	/// Held for the duration of [`World::tick`] so ticks never overlap.
	pub(super) tick_lock: Mutex<()>,
}

impl std::fmt::Debug for World {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("World")
			.field("id", &self.id)
			.field("root", &self.root)
			.finish()
	}
}

impl World {
	/// Opens the world `id` stored under `worlds_root`.
	///
	/// When `data` is None the world's `world.json` is read (or a new world is made from the config's defaults).
	/// The world data is written back to disk either way, so any defaulted fields are persisted.
	pub fn open(
		id: &str,
		worlds_root: &Path,
		data: Option<WorldData>,
		config: Arc<Config>,
		runtime: tokio::runtime::Handle,
	) -> anyhow::Result<Arc<Self>> {
		let mut root = worlds_root.to_owned();
		root.push(id);

		let data = match data {
			Some(data) => data,
			None => match WorldData::load(&root)? {
				Some(data) => {
					log::info!(target: LOG, "Loading world {:?}", id);
					data
				}
				None => {
					log::info!(target: LOG, "Creating world {:?}", id);
					WorldData::from_config(&config)
				}
			},
		};
		data.save(&root)?;

		let generator = generators()
			.get_it(&data.generator)
			.ok_or_else(|| Error::UnknownGenerator(data.generator.clone()))?;
		let light = light_processors()
			.get_it(&data.light_processor)
			.ok_or_else(|| Error::UnknownLightProcessor(data.light_processor.clone()))?;
		let notifier = Notifier::start()?;

		let spawn = Point3::new(data.spawn[0] as f64, data.spawn[1] as f64, data.spawn[2] as f64);
		let mut tickets = Tickets::default();
		let spawn_ticket = tickets.add(Ticket::new(
			chunk_of_position(&spawn),
			config.spawn_radius,
			config.spawn_level(),
		));

		let seed = data.seed;
		let layout = data.layout;
		let state = State {
			data,
			chunks: HashMap::new(),
			levels: LevelMap::new(),
			entities: BTreeMap::new(),
			pending_attachments: Vec::new(),
			next_entity_id: 1,
			tickets,
			spawn_ticket,
			loading: HashMap::new(),
			saving: HashMap::new(),
			ticketless: HashMap::new(),
			unload_pending: HashSet::new(),
			departed: HashMap::new(),
		};

		Ok(Arc::new_cyclic(|weak_self| Self {
			id: id.to_owned(),
			root,
			weak_self: weak_self.clone(),
			runtime,
			config,
			seed,
			layout,
			generator,
			light,
			state: Mutex::new(state),
			notifier,
			rng: Mutex::new(StdRng::seed_from_u64(seed)),
			tick_lock: Mutex::new(()),
		}))
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	/// The directory holding `world.json` and the `chunks` folder.
	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn seed(&self) -> u64 {
		self.seed
	}

	pub fn layout(&self) -> &Layout {
		&self.layout
	}

	pub fn config(&self) -> &Arc<Config> {
		&self.config
	}

	pub fn light_processor(&self) -> &Arc<dyn ChunkLightProcessor> {
		&self.light
	}

	pub(super) fn runtime(&self) -> &tokio::runtime::Handle {
		&self.runtime
	}

	/// A strong reference to this world, unless it is being dropped.
	pub(super) fn arc(&self) -> Option<Arc<World>> {
		self.weak_self.upgrade()
	}

	pub(super) fn weak(&self) -> Weak<World> {
		self.weak_self.clone()
	}

	pub(super) fn lock_state(&self) -> MutexGuard<'_, State> {
		recover(self.state.lock())
	}

	/// The number of ticks the world has run for.
	pub fn tick_count(&self) -> u64 {
		self.lock_state().data.tick
	}

	pub fn day_time(&self) -> u64 {
		self.lock_state().data.day_time
	}

	/// A copy of the world's persisted state.
	pub fn data(&self) -> WorldData {
		self.lock_state().data.clone()
	}

	/// Changes the world's persisted state. Seed, generator, light processor and layout
	/// are fixed once the world is open, so edits to them are discarded.
	pub fn edit_data<F>(&self, edit: F)
	where
		F: FnOnce(&mut WorldData),
	{
		let mut state = self.lock_state();
		let data = &mut state.data;
		let (seed, generator, light, layout) = (
			data.seed,
			data.generator.clone(),
			data.light_processor.clone(),
			data.layout,
		);
		edit(data);
		data.seed = seed;
		data.generator = generator;
		data.light_processor = light;
		data.layout = layout;
	}

	/// Writes `world.json`.
	pub fn save_data(&self) -> anyhow::Result<()> {
		let data = self.data();
		data.save(&self.root)
	}

	/// Queues `event` for every interested attached entity. Must be called with the state lock held
	/// so events reach consumers in the order the world applied them.
	pub(super) fn notify(&self, state: &State, event: WorldEvent) {
		let targets = state.targets_of(&event);
		self.notifier.send(event, targets);
	}

	/// Blocks until every notification queued so far has been delivered.
	pub fn flush_notifications(&self) {
		self.notifier.flush();
	}

	/// Adds a loading ticket. It first affects chunk load levels on the next tick.
	pub fn add_ticket(&self, ticket: Ticket) -> TicketId {
		log::debug!(target: LOG, "Adding {} to world {:?}", ticket, self.id);
		self.lock_state().tickets.add(ticket)
	}

	/// Removes a loading ticket. The spawn ticket cannot be removed.
	pub fn remove_ticket(&self, id: TicketId) -> bool {
		let mut state = self.lock_state();
		if id == state.spawn_ticket {
			return false;
		}
		state.tickets.remove(id).is_some()
	}

	pub fn ticket_count(&self) -> usize {
		self.lock_state().tickets.len()
	}

	/// The load level the chunk received on the last tick, if any ticket reaches it.
	pub fn load_level(&self, coordinate: &ChunkCoord) -> Option<u8> {
		self.lock_state().levels.get(coordinate).cloned()
	}

	pub fn chunk_count(&self) -> usize {
		self.lock_state().chunks.len()
	}

	pub fn is_resident(&self, coordinate: &ChunkCoord) -> bool {
		self.lock_state().chunks.contains_key(coordinate)
	}

	/// The resident chunk at `coordinate`, complete or not.
	pub fn get_chunk(&self, coordinate: &ChunkCoord) -> Option<ArcLockChunk> {
		self.lock_state().chunks.get(coordinate).cloned()
	}

	pub fn resident_chunks(&self) -> Vec<ChunkCoord> {
		let mut coordinates = self.lock_state().chunks.keys().cloned().collect::<Vec<_>>();
		coordinates.sort_by_key(|coordinate| (coordinate.x, coordinate.y));
		coordinates
	}

	/// Whether any chunk is being loaded, generated or saved.
	pub fn has_operations_in_flight(&self) -> bool {
		let state = self.lock_state();
		!state.loading.is_empty() || !state.saving.is_empty()
	}
}
