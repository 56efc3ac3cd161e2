use super::{BlockId, AIR};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The extended data attached to a block (inventories, signs, spawners, ...).
/// The core never interprets `data`, it only stores, persists and forwards it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockEntity {
	pub kind: String,
	#[serde(default)]
	pub data: serde_json::Value,
}

impl BlockEntity {
	pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
		Self {
			kind: kind.into(),
			data,
		}
	}
}

/// A block as read from or written to a chunk:
/// either a bare id, or an id with its [`BlockEntity`] data.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
	Simple(BlockId),
	Extended(BlockId, Arc<BlockEntity>),
}

impl Default for Block {
	fn default() -> Self {
		Self::Simple(AIR)
	}
}

impl From<BlockId> for Block {
	fn from(id: BlockId) -> Self {
		Self::Simple(id)
	}
}

impl Block {
	pub fn with_entity(id: BlockId, entity: BlockEntity) -> Self {
		Self::Extended(id, Arc::new(entity))
	}

	pub fn id(&self) -> BlockId {
		match self {
			Self::Simple(id) => *id,
			Self::Extended(id, _) => *id,
		}
	}

	pub fn entity(&self) -> Option<&Arc<BlockEntity>> {
		match self {
			Self::Simple(_) => None,
			Self::Extended(_, entity) => Some(entity),
		}
	}

	pub fn is_air(&self) -> bool {
		self.id() == AIR
	}
}

impl std::fmt::Display for Block {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Simple(id) => write!(f, "Block({})", id),
			Self::Extended(id, entity) => write!(f, "Block({}, {})", id, entity.kind),
		}
	}
}
