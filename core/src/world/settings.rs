use super::chunk::Layout;
use crate::{common::utility::DataFile, config::Config};
use serde::{Deserialize, Serialize};

/// The persisted state of one world, stored as `world.json` in the world's directory.
/// Fields missing from the file take their defaults, and the file is re-written once loaded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorldData {
	#[serde(default = "WorldData::default_seed")]
	pub seed: u64,
	/// The number of ticks the world has run for.
	#[serde(default)]
	pub tick: u64,
	#[serde(default)]
	pub day_time: u64,
	#[serde(default = "WorldData::default_tick_rate")]
	pub ticks_per_second: u32,
	#[serde(default = "WorldData::default_generator")]
	pub generator: String,
	#[serde(default = "WorldData::default_light_processor")]
	pub light_processor: String,
	#[serde(default)]
	pub layout: Layout,
	#[serde(default = "WorldData::default_spawn")]
	pub spawn: [i64; 3],
	#[serde(default)]
	pub border: Border,
	#[serde(default)]
	pub weather: Weather,
	#[serde(default)]
	pub game_rules: GameRules,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Border {
	pub center: [f64; 2],
	pub size: f64,
	#[serde(default)]
	pub damage_per_block: f64,
	#[serde(default)]
	pub warning_blocks: u32,
}

impl Default for Border {
	fn default() -> Self {
		Self {
			center: [0.0, 0.0],
			size: 60_000_000.0,
			damage_per_block: 0.2,
			warning_blocks: 5,
		}
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Weather {
	#[serde(default)]
	pub raining: bool,
	#[serde(default)]
	pub thundering: bool,
	/// Ticks until the weather changes on its own.
	#[serde(default)]
	pub remaining: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GameRules {
	#[serde(default = "GameRules::default_random_tick_speed")]
	pub random_tick_speed: u32,
	#[serde(default = "GameRules::default_true")]
	pub do_daylight_cycle: bool,
}

impl Default for GameRules {
	fn default() -> Self {
		Self {
			random_tick_speed: Self::default_random_tick_speed(),
			do_daylight_cycle: true,
		}
	}
}

impl GameRules {
	fn default_random_tick_speed() -> u32 {
		3
	}

	fn default_true() -> bool {
		true
	}
}

/// The length of a full day, in ticks.
pub const DAY_LENGTH: u64 = 24000;

impl Default for WorldData {
	fn default() -> Self {
		Self {
			seed: Self::default_seed(),
			tick: 0,
			day_time: 0,
			ticks_per_second: Self::default_tick_rate(),
			generator: Self::default_generator(),
			light_processor: Self::default_light_processor(),
			layout: Layout::default(),
			spawn: Self::default_spawn(),
			border: Border::default(),
			weather: Weather::default(),
			game_rules: GameRules::default(),
		}
	}
}

impl WorldData {
	/// A fresh world using the server's defaults.
	pub fn from_config(config: &Config) -> Self {
		Self {
			generator: config.default_generator.clone(),
			light_processor: config.default_light_processor.clone(),
			layout: config.layout,
			ticks_per_second: config.ticks_per_second,
			..Self::default()
		}
	}

	/// The current date and time as digits, e.g. `20240131235959`.
	fn default_seed() -> u64 {
		chrono::prelude::Utc::now()
			.format("%Y%m%d%H%M%S")
			.to_string()
			.parse()
			.unwrap_or_default()
	}

	fn default_tick_rate() -> u32 {
		20
	}

	fn default_generator() -> String {
		super::Flat::ID.to_owned()
	}

	fn default_light_processor() -> String {
		super::Sky::ID.to_owned()
	}

	fn default_spawn() -> [i64; 3] {
		[0, 64, 0]
	}
}

impl DataFile for WorldData {
	fn file_name() -> &'static str {
		"world.json"
	}
}
