/// Invariant violations and lookup failures reported by the world.
/// Chunk I/O failures are not errors at this level; see [`LoadError`](super::chunk::LoadError).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
	#[error("tick priority {0} is outside of -3..=0")]
	InvalidTickPriority(i32),
	#[error("entity is already attached to world {0:?}")]
	EntityAlreadyAttached(String),
	#[error("entity is not attached to world {0:?}")]
	EntityNotAttached(String),
	#[error("no entity {1} in world {0:?}")]
	UnknownEntity(String, u64),
	#[error("no chunk generator is registered as {0:?}")]
	UnknownGenerator(String),
	#[error("no light processor is registered as {0:?}")]
	UnknownLightProcessor(String),
	#[error("world {0:?} is already loaded")]
	AlreadyLoaded(String),
	#[error("world {0:?} still has chunk operations in flight")]
	WorldBusy(String),
}
