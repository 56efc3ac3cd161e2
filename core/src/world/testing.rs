use super::{chunk::Compression, World, WorldData};
use crate::{common::utility::ScratchDir, config::Config};
use std::sync::{mpsc, Arc};

pub(crate) fn runtime() -> tokio::runtime::Runtime {
	let _ = env_logger::builder().is_test(true).try_init();
	tokio::runtime::Builder::new_multi_thread()
		.worker_threads(2)
		.enable_all()
		.build()
		.unwrap()
}

/// A runtime with one blocking thread, which [`hold_blocking_pool`] can occupy.
pub(crate) fn single_blocking_runtime() -> tokio::runtime::Runtime {
	let _ = env_logger::builder().is_test(true).try_init();
	tokio::runtime::Builder::new_multi_thread()
		.worker_threads(2)
		.max_blocking_threads(1)
		.enable_all()
		.build()
		.unwrap()
}

/// Occupies the blocking pool of a [`single_blocking_runtime`] until the returned sender is used or dropped.
/// Chunk operations started in the meantime queue behind it.
pub(crate) fn hold_blocking_pool(rt: &tokio::runtime::Runtime) -> mpsc::Sender<()> {
	let (started, is_started) = mpsc::channel();
	let (release, is_released) = mpsc::channel::<()>();
	rt.spawn_blocking(move || {
		let _ = started.send(());
		let _ = is_released.recv();
	});
	is_started.recv().unwrap();
	release
}

/// Keeps the spawn ticket to a single chunk at the lowest level and turns autosave off.
pub(crate) fn quiet_config() -> Arc<Config> {
	Arc::new(Config {
		spawn_radius: 0,
		spawn_level: 44,
		autosave_interval: 0,
		unload_delay: 0,
		compression: Compression::Raw,
		..Default::default()
	})
}

pub(crate) fn open(dir: &ScratchDir, rt: &tokio::runtime::Runtime, data: WorldData) -> Arc<World> {
	World::open("test", dir.path(), Some(data), quiet_config(), rt.handle().clone()).unwrap()
}

/// A flat world lit by the sky.
pub(crate) fn flat_data() -> WorldData {
	WorldData {
		generator: "flat".to_owned(),
		light_processor: "sky".to_owned(),
		..WorldData::default()
	}
}
