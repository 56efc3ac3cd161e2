use super::EntityId;
use crate::{
	block::Block,
	world::{
		chunk::BiomeId,
		point::{chunk_of_position, BlockPoint, ChunkCoord},
		SetMode,
	},
};
use anyhow::Result;
use nalgebra::{Point3, Vector2};

/// Something that happened in a world which attached entities may need to hear about.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
	BlockChanged {
		point: Point3<i64>,
		previous: Block,
		block: Block,
		mode: SetMode,
	},
	BiomeChanged {
		point: Point3<i64>,
		previous: BiomeId,
		biome: BiomeId,
	},
	/// The light of a resident chunk was recalculated.
	LightChanged {
		chunk: ChunkCoord,
	},
	EntityAdded {
		entity: EntityId,
		kind: String,
		position: Point3<f64>,
	},
	EntityRemoved {
		entity: EntityId,
		position: Point3<f64>,
	},
	EntityMoved {
		entity: EntityId,
		from: Point3<f64>,
		to: Point3<f64>,
	},
	EntityTeleported {
		entity: EntityId,
		from: Point3<f64>,
		to: Point3<f64>,
	},
	EntityRotated {
		entity: EntityId,
		position: Point3<f64>,
		rotation: Vector2<f32>,
	},
	EntityAnimated {
		entity: EntityId,
		position: Point3<f64>,
		animation: u32,
	},
	EntityEffect {
		entity: EntityId,
		position: Point3<f64>,
		effect: u32,
		duration: u64,
	},
	EntityInteracted {
		entity: EntityId,
		position: Point3<f64>,
		target: EntityId,
	},
	EntityRode {
		entity: EntityId,
		position: Point3<f64>,
		vehicle: Option<EntityId>,
	},
	/// Sent to every attached entity.
	EntityDamaged {
		entity: EntityId,
		amount: f32,
	},
	/// Sent to every attached entity.
	EntityDied {
		entity: EntityId,
	},
}

impl WorldEvent {
	pub fn name(&self) -> &'static str {
		match self {
			Self::BlockChanged { .. } => "block_changed",
			Self::BiomeChanged { .. } => "biome_changed",
			Self::LightChanged { .. } => "light_changed",
			Self::EntityAdded { .. } => "entity_added",
			Self::EntityRemoved { .. } => "entity_removed",
			Self::EntityMoved { .. } => "entity_moved",
			Self::EntityTeleported { .. } => "entity_teleported",
			Self::EntityRotated { .. } => "entity_rotated",
			Self::EntityAnimated { .. } => "entity_animated",
			Self::EntityEffect { .. } => "entity_effect",
			Self::EntityInteracted { .. } => "entity_interacted",
			Self::EntityRode { .. } => "entity_rode",
			Self::EntityDamaged { .. } => "entity_damaged",
			Self::EntityDied { .. } => "entity_died",
		}
	}

	/// The chunks the event touches. None for events which go to every attached entity.
	///
	/// Movement touches both the chunk left and the chunk entered, so watchers of either hear about it.
	pub fn chunks(&self) -> Option<Vec<ChunkCoord>> {
		match self {
			Self::BlockChanged { point, .. } | Self::BiomeChanged { point, .. } => {
				Some(vec![*BlockPoint::from_global(*point).chunk()])
			}
			Self::LightChanged { chunk } => Some(vec![*chunk]),
			Self::EntityAdded { position, .. }
			| Self::EntityRemoved { position, .. }
			| Self::EntityRotated { position, .. }
			| Self::EntityAnimated { position, .. }
			| Self::EntityEffect { position, .. }
			| Self::EntityInteracted { position, .. }
			| Self::EntityRode { position, .. } => Some(vec![chunk_of_position(position)]),
			Self::EntityMoved { from, to, .. } | Self::EntityTeleported { from, to, .. } => {
				let (from, to) = (chunk_of_position(from), chunk_of_position(to));
				match from == to {
					true => Some(vec![to]),
					false => Some(vec![from, to]),
				}
			}
			Self::EntityDamaged { .. } | Self::EntityDied { .. } => None,
		}
	}

	/// The entity which caused the event, which is never notified of its own action.
	pub fn source(&self) -> Option<EntityId> {
		match self {
			Self::BlockChanged { .. } | Self::BiomeChanged { .. } | Self::LightChanged { .. } => None,
			Self::EntityAdded { entity, .. }
			| Self::EntityRemoved { entity, .. }
			| Self::EntityMoved { entity, .. }
			| Self::EntityTeleported { entity, .. }
			| Self::EntityRotated { entity, .. }
			| Self::EntityAnimated { entity, .. }
			| Self::EntityEffect { entity, .. }
			| Self::EntityInteracted { entity, .. }
			| Self::EntityRode { entity, .. } => Some(*entity),
			// world-wide events also reach the entity they are about
			Self::EntityDamaged { .. } | Self::EntityDied { .. } => None,
		}
	}
}

/// Consumes the world notifications sent to one entity (typically by turning them into packets).
///
/// Every method defaults to doing nothing. Errors (and panics) are logged by the world
/// and never stop delivery to other entities.
#[allow(unused_variables)]
pub trait WorldProcessor: Send + Sync {
	fn on_block_changed(
		&self,
		receiver: EntityId,
		point: &Point3<i64>,
		previous: &Block,
		block: &Block,
		mode: SetMode,
	) -> Result<()> {
		Ok(())
	}

	fn on_biome_changed(
		&self,
		receiver: EntityId,
		point: &Point3<i64>,
		previous: BiomeId,
		biome: BiomeId,
	) -> Result<()> {
		Ok(())
	}

	fn on_light_changed(&self, receiver: EntityId, chunk: &ChunkCoord) -> Result<()> {
		Ok(())
	}

	fn on_entity_added(
		&self,
		receiver: EntityId,
		entity: EntityId,
		kind: &str,
		position: &Point3<f64>,
	) -> Result<()> {
		Ok(())
	}

	fn on_entity_removed(&self, receiver: EntityId, entity: EntityId) -> Result<()> {
		Ok(())
	}

	fn on_entity_moved(
		&self,
		receiver: EntityId,
		entity: EntityId,
		from: &Point3<f64>,
		to: &Point3<f64>,
	) -> Result<()> {
		Ok(())
	}

	fn on_entity_teleported(
		&self,
		receiver: EntityId,
		entity: EntityId,
		to: &Point3<f64>,
	) -> Result<()> {
		Ok(())
	}

	fn on_entity_rotated(
		&self,
		receiver: EntityId,
		entity: EntityId,
		rotation: &Vector2<f32>,
	) -> Result<()> {
		Ok(())
	}

	fn on_entity_animated(&self, receiver: EntityId, entity: EntityId, animation: u32) -> Result<()> {
		Ok(())
	}

	fn on_entity_effect(
		&self,
		receiver: EntityId,
		entity: EntityId,
		effect: u32,
		duration: u64,
	) -> Result<()> {
		Ok(())
	}

	fn on_entity_interacted(
		&self,
		receiver: EntityId,
		entity: EntityId,
		target: EntityId,
	) -> Result<()> {
		Ok(())
	}

	fn on_entity_rode(
		&self,
		receiver: EntityId,
		entity: EntityId,
		vehicle: Option<EntityId>,
	) -> Result<()> {
		Ok(())
	}

	fn on_entity_damaged(&self, receiver: EntityId, entity: EntityId, amount: f32) -> Result<()> {
		Ok(())
	}

	fn on_entity_died(&self, receiver: EntityId, entity: EntityId) -> Result<()> {
		Ok(())
	}
}

/// Hands `event` to the matching method of `processor`.
pub fn dispatch(processor: &dyn WorldProcessor, receiver: EntityId, event: &WorldEvent) -> Result<()> {
	match event {
		WorldEvent::BlockChanged {
			point,
			previous,
			block,
			mode,
		} => processor.on_block_changed(receiver, point, previous, block, *mode),
		WorldEvent::BiomeChanged {
			point,
			previous,
			biome,
		} => processor.on_biome_changed(receiver, point, *previous, *biome),
		WorldEvent::LightChanged { chunk } => processor.on_light_changed(receiver, chunk),
		WorldEvent::EntityAdded {
			entity,
			kind,
			position,
		} => processor.on_entity_added(receiver, *entity, kind, position),
		WorldEvent::EntityRemoved { entity, .. } => processor.on_entity_removed(receiver, *entity),
		WorldEvent::EntityMoved { entity, from, to } => {
			processor.on_entity_moved(receiver, *entity, from, to)
		}
		WorldEvent::EntityTeleported { entity, to, .. } => {
			processor.on_entity_teleported(receiver, *entity, to)
		}
		WorldEvent::EntityRotated {
			entity, rotation, ..
		} => processor.on_entity_rotated(receiver, *entity, rotation),
		WorldEvent::EntityAnimated {
			entity, animation, ..
		} => processor.on_entity_animated(receiver, *entity, *animation),
		WorldEvent::EntityEffect {
			entity,
			effect,
			duration,
			..
		} => processor.on_entity_effect(receiver, *entity, *effect, *duration),
		WorldEvent::EntityInteracted { entity, target, .. } => {
			processor.on_entity_interacted(receiver, *entity, *target)
		}
		WorldEvent::EntityRode {
			entity, vehicle, ..
		} => processor.on_entity_rode(receiver, *entity, *vehicle),
		WorldEvent::EntityDamaged { entity, amount } => {
			processor.on_entity_damaged(receiver, *entity, *amount)
		}
		WorldEvent::EntityDied { entity } => processor.on_entity_died(receiver, *entity),
	}
}
