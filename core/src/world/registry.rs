use super::{Error, World, WorldData};
use crate::{
	common::utility::{recover, spawn_thread, DataFile, ThreadHandle},
	config::Config,
};
use std::{
	collections::BTreeMap,
	path::{Path, PathBuf},
	sync::{Arc, RwLock},
	time::{Duration, Instant},
};

static LOG: &'static str = "worlds";

/// Every world loaded by the process, keyed by id, sharing one [`Config`] and one runtime.
///
/// Worlds live in `<root>/worlds/<id>`; the config is `<root>/config.json`.
pub struct Worlds {
	root: PathBuf,
	worlds_root: PathBuf,
	config: Arc<Config>,
	runtime: tokio::runtime::Handle,
	loaded: RwLock<BTreeMap<String, Arc<World>>>,
}

impl Worlds {
	/// Reads `config.json` under `root` (writing the defaults if it is missing).
	pub fn new(root: &Path, runtime: tokio::runtime::Handle) -> anyhow::Result<Arc<Self>> {
		let config = match Config::load(root)? {
			Some(config) => config,
			None => {
				log::info!(target: LOG, "Writing default config to {}", root.display());
				let config = Config::default();
				config.save(root)?;
				config
			}
		};
		Ok(Self::with_config(root, config, runtime))
	}

	pub fn with_config(root: &Path, config: Config, runtime: tokio::runtime::Handle) -> Arc<Self> {
		let mut worlds_root = root.to_owned();
		worlds_root.push("worlds");
		Arc::new(Self {
			root: root.to_owned(),
			worlds_root,
			config: Arc::new(config),
			runtime,
			loaded: RwLock::new(BTreeMap::new()),
		})
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn config(&self) -> &Arc<Config> {
		&self.config
	}

	pub fn get(&self, id: &str) -> Option<Arc<World>> {
		recover(self.loaded.read()).get(id).cloned()
	}

	/// The loaded world `id`, opening it from disk (or creating it) if it is not loaded yet.
	pub fn get_or_create(&self, id: &str) -> anyhow::Result<Arc<World>> {
		let mut loaded = recover(self.loaded.write());
		if let Some(world) = loaded.get(id) {
			return Ok(world.clone());
		}
		let world = World::open(id, &self.worlds_root, None, self.config.clone(), self.runtime.clone())?;
		loaded.insert(id.to_owned(), world.clone());
		Ok(world)
	}

	/// Creates (or overwrites the data of) the world `id`, which must not be loaded.
	pub fn create(&self, id: &str, data: WorldData) -> anyhow::Result<Arc<World>> {
		let mut loaded = recover(self.loaded.write());
		if loaded.contains_key(id) {
			return Err(Error::AlreadyLoaded(id.to_owned()).into());
		}
		log::info!(target: LOG, "Creating world {:?}", id);
		let world = World::open(id, &self.worlds_root, Some(data), self.config.clone(), self.runtime.clone())?;
		loaded.insert(id.to_owned(), world.clone());
		Ok(world)
	}

	/// The ids of every loaded world, sorted.
	pub fn ids(&self) -> Vec<String> {
		recover(self.loaded.read()).keys().cloned().collect()
	}

	/// Stops tracking the world. Refused while the world has chunk operations in flight;
	/// save (and settle) it first. Returns None if no such world is loaded.
	pub fn evict(&self, id: &str) -> Result<Option<Arc<World>>, Error> {
		let mut loaded = recover(self.loaded.write());
		match loaded.get(id) {
			None => Ok(None),
			Some(world) if world.has_operations_in_flight() => Err(Error::WorldBusy(id.to_owned())),
			Some(_) => {
				log::info!(target: LOG, "Evicting world {:?}", id);
				Ok(loaded.remove(id))
			}
		}
	}

	fn snapshot(&self) -> Vec<Arc<World>> {
		recover(self.loaded.read()).values().cloned().collect()
	}

	/// Ticks every loaded world in parallel, blocking until all are done.
	/// Must not be called from inside an async task of the runtime.
	#[profiling::function]
	pub fn tick_all(&self) {
		let tasks = self
			.snapshot()
			.into_iter()
			.map(|world| self.runtime.spawn_blocking(move || world.tick()))
			.collect::<Vec<_>>();
		for result in futures::executor::block_on(futures::future::join_all(tasks)).into_iter() {
			if let Err(error) = result {
				log::error!(target: LOG, "World tick failed: {}", error);
			}
		}
	}

	/// Saves every loaded world, blocking until done. True if everything was written.
	pub fn save_all(&self) -> bool {
		self.snapshot()
			.iter()
			.map(|world| world.save())
			.fold(true, |all, saved| all && saved)
	}

	/// Ticks every world at the configured rate on a dedicated thread until the handle is dropped.
	pub fn start_ticking(self: &Arc<Self>) -> std::io::Result<ThreadHandle> {
		let weak_worlds = Arc::downgrade(self);
		let tick_duration = Duration::from_secs_f64(1.0 / self.config.ticks_per_second.max(1) as f64);
		let (handle, alive) = ThreadHandle::token();
		let join_handle = spawn_thread(LOG, move || -> anyhow::Result<()> {
			log::info!(target: LOG, "Ticking worlds every {:?}", tick_duration);
			while ThreadHandle::is_alive(&alive) {
				let start = Instant::now();
				match weak_worlds.upgrade() {
					Some(worlds) => worlds.tick_all(),
					None => break,
				}
				let elapsed = start.elapsed();
				if elapsed < tick_duration {
					std::thread::sleep(tick_duration - elapsed);
				} else {
					log::warn!(target: LOG, "Tick took {:?}, longer than {:?}", elapsed, tick_duration);
				}
			}
			log::info!(target: LOG, "Stopped ticking worlds");
			Ok(())
		})?;
		Ok(ThreadHandle::new(handle, join_handle))
	}
}

#[cfg(test)]
mod registry {
	use super::*;
	use crate::{
		common::utility::ScratchDir,
		world::{chunk::Compression, point::chunk, testing::runtime},
	};
	use futures::FutureExt;

	fn quiet() -> Config {
		Config {
			spawn_radius: 0,
			spawn_level: 44,
			autosave_interval: 0,
			compression: Compression::Raw,
			..Default::default()
		}
	}

	#[test]
	fn config_written_on_first_start() {
		let rt = runtime();
		let dir = ScratchDir::new("worlds-config");
		let worlds = Worlds::new(dir.path(), rt.handle().clone()).unwrap();
		assert_eq!(**worlds.config(), Config::default());
		assert!(dir.path().join("config.json").exists());
	}

	#[test]
	fn worlds_are_opened_once() {
		let rt = runtime();
		let dir = ScratchDir::new("worlds-open");
		let worlds = Worlds::with_config(dir.path(), quiet(), rt.handle().clone());
		let overworld = worlds.get_or_create("overworld").unwrap();
		assert!(Arc::ptr_eq(&overworld, &worlds.get_or_create("overworld").unwrap()));
		assert!(overworld.root().join("world.json").exists());

		let error = worlds.create("overworld", WorldData::default()).unwrap_err();
		assert_eq!(
			error.downcast_ref::<Error>(),
			Some(&Error::AlreadyLoaded("overworld".to_owned()))
		);
		worlds.create("nether", WorldData::default()).unwrap();
		assert_eq!(worlds.ids(), vec!["nether".to_owned(), "overworld".to_owned()]);
	}

	#[test]
	fn ticking_and_eviction() {
		let rt = runtime();
		let dir = ScratchDir::new("worlds-tick");
		let worlds = Worlds::with_config(dir.path(), quiet(), rt.handle().clone());
		let first = worlds.get_or_create("first").unwrap();
		let second = worlds.get_or_create("second").unwrap();
		worlds.tick_all();
		assert_eq!(first.tick_count(), 1);
		assert_eq!(second.tick_count(), 1);

		// an operation which never finishes
		let stuck = futures::future::pending::<bool>().boxed().shared();
		first.lock_state().saving.insert(chunk(5, 5), stuck);
		assert!(matches!(worlds.evict("first"), Err(Error::WorldBusy(id)) if id == "first"));
		first.lock_state().saving.remove(&chunk(5, 5));

		first.request_chunk_data_sync(chunk(0, 0)).unwrap();
		assert!(worlds.save_all());
		assert!(crate::world::tick::settle(&first, std::time::Duration::from_secs(10)));
		assert!(worlds.evict("first").unwrap().is_some());
		assert!(matches!(worlds.evict("first"), Ok(None)));
		assert_eq!(worlds.ids(), vec!["second".to_owned()]);
	}

	#[test]
	fn ticking_thread_stops_with_handle() {
		let rt = runtime();
		let dir = ScratchDir::new("worlds-thread");
		let worlds = Worlds::with_config(dir.path(), quiet(), rt.handle().clone());
		let world = worlds.get_or_create("overworld").unwrap();
		let handle = worlds.start_ticking().unwrap();
		let start = Instant::now();
		while world.tick_count() < 2 && start.elapsed() < Duration::from_secs(10) {
			std::thread::sleep(Duration::from_millis(10));
		}
		handle.stop();
		let ticks = world.tick_count();
		assert!(ticks >= 2);
		std::thread::sleep(Duration::from_millis(150));
		assert_eq!(world.tick_count(), ticks);
	}
}
