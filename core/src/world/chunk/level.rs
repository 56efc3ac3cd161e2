/// Load levels at or below this value tick entities as well as blocks.
pub const ENTITY_TICKING: u8 = 31;
/// Load levels at or below this value tick blocks (scheduled, liquid and random ticks).
pub const BLOCK_TICKING: u8 = 32;
/// The chunk is fully generated and accessible to gameplay, but nothing ticks.
pub const BORDER: u8 = 33;
/// The highest load level which keeps a chunk resident.
/// Levels between [`BORDER`] and this value only drive (possibly partial) generation.
pub const MAX_LEVEL: u8 = 44;

/// The band a numeric load level falls into. Lower levels are more active.
///
/// Largely inspired by <https://minecraft.fandom.com/wiki/Chunk#Level_and_load_type>.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
	/// Full game activity, including ticking of entities.
	EntityTicking,
	/// Blocks tick but entities are frozen.
	BlockTicking,
	/// Loaded and accessible, but nothing is updated on each tick.
	Border,
	/// Only world generation occurs, and it may stop short of complete.
	Inaccessible,
	/// No ticket reaches the chunk; it is a candidate for unloading.
	Unloaded,
}

impl Level {
	pub fn from_load_level(level: u8) -> Self {
		match level {
			0..=ENTITY_TICKING => Self::EntityTicking,
			BLOCK_TICKING => Self::BlockTicking,
			BORDER => Self::Border,
			_ if level <= MAX_LEVEL => Self::Inaccessible,
			_ => Self::Unloaded,
		}
	}

	pub fn ticks_blocks(&self) -> bool {
		*self <= Self::BlockTicking
	}

	pub fn ticks_entities(&self) -> bool {
		*self == Self::EntityTicking
	}

	/// Whether chunks at this level must be fully generated.
	pub fn requires_complete(&self) -> bool {
		*self <= Self::Border
	}
}

impl std::fmt::Display for Level {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::EntityTicking => write!(f, "EntityTicking"),
			Self::BlockTicking => write!(f, "BlockTicking"),
			Self::Border => write!(f, "Border"),
			Self::Inaccessible => write!(f, "Inaccessible"),
			Self::Unloaded => write!(f, "Unloaded"),
		}
	}
}
