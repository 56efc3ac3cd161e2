use crate::{
	common::utility::DataFile,
	world::chunk::{Compression, Layout, MAX_LEVEL},
};
use serde::{Deserialize, Serialize};

/// Server-wide settings, stored as `config.json` next to the world directories.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
	#[serde(default = "Config::default_tick_rate")]
	pub ticks_per_second: u32,
	/// Ticks between full saves of every world. `0` disables autosave.
	#[serde(default = "Config::default_autosave_interval")]
	pub autosave_interval: u64,
	/// Ticks a chunk must go without any ticket before it is saved and unloaded.
	#[serde(default = "Config::default_unload_delay")]
	pub unload_delay: u64,
	/// The most chunk load/generate requests a world starts per tick.
	#[serde(default = "Config::default_requests_per_tick")]
	pub chunk_requests_per_tick: usize,
	#[serde(default)]
	pub compression: Compression,
	#[serde(default = "Config::default_generator")]
	pub default_generator: String,
	#[serde(default = "Config::default_light_processor")]
	pub default_light_processor: String,
	#[serde(default)]
	pub layout: Layout,
	#[serde(default = "Config::default_spawn_radius")]
	pub spawn_radius: u64,
	#[serde(default = "Config::default_spawn_level")]
	pub spawn_level: u8,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			ticks_per_second: Self::default_tick_rate(),
			autosave_interval: Self::default_autosave_interval(),
			unload_delay: Self::default_unload_delay(),
			chunk_requests_per_tick: Self::default_requests_per_tick(),
			compression: Compression::default(),
			default_generator: Self::default_generator(),
			default_light_processor: Self::default_light_processor(),
			layout: Layout::default(),
			spawn_radius: Self::default_spawn_radius(),
			spawn_level: Self::default_spawn_level(),
		}
	}
}

impl Config {
	fn default_tick_rate() -> u32 {
		20
	}

	fn default_autosave_interval() -> u64 {
		6000
	}

	fn default_unload_delay() -> u64 {
		300
	}

	fn default_requests_per_tick() -> usize {
		64
	}

	fn default_generator() -> String {
		"flat".to_owned()
	}

	fn default_light_processor() -> String {
		"sky".to_owned()
	}

	fn default_spawn_radius() -> u64 {
		2
	}

	fn default_spawn_level() -> u8 {
		22
	}

	/// The spawn level, clamped to the levels which keep chunks loaded.
	pub fn spawn_level(&self) -> u8 {
		self.spawn_level.min(MAX_LEVEL)
	}
}

impl DataFile for Config {
	fn file_name() -> &'static str {
		"config.json"
	}
}

#[cfg(test)]
mod config {
	use super::*;
	use crate::common::utility::ScratchDir;

	#[test]
	fn partial_file() {
		let dir = ScratchDir::new("config-partial");
		std::fs::write(
			Config::make_path(dir.path()),
			r#"{ "unload_delay": 5, "compression": "raw" }"#,
		)
		.unwrap();
		let config = Config::load(dir.path()).unwrap().unwrap();
		assert_eq!(config.unload_delay, 5);
		assert_eq!(config.compression, Compression::Raw);
		assert_eq!(config.ticks_per_second, 20);
		assert_eq!(config.default_generator, "flat");
	}

	#[test]
	fn spawn_level_is_clamped() {
		let config = Config {
			spawn_level: 200,
			..Default::default()
		};
		assert_eq!(config.spawn_level(), MAX_LEVEL);
	}
}
