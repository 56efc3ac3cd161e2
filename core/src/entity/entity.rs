use super::{kinds, EntityId, Kind, WorldProcessor};
use crate::world::{
	point::{chunk_of_position, ring_distance, ChunkCoord},
	World,
};
use nalgebra::{Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// The chunks around an attached entity which it is notified about (and which its ticket keeps loaded).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessingRegion {
	pub center: ChunkCoord,
	pub radius: u64,
}

impl ProcessingRegion {
	pub fn contains(&self, coordinate: &ChunkCoord) -> bool {
		ring_distance(&self.center, coordinate) <= self.radius
	}
}

/// Present only while an entity is attached to a world.
#[derive(Clone)]
pub struct WorldSyncingData {
	pub local_id: EntityId,
	pub world_id: String,
	pub world: Weak<World>,
	pub region: ProcessingRegion,
}

/// A mobile object in a world.
/// Gameplay code creates entities; attaching them to (and detaching them from) a world is done by the [`World`].
pub struct Entity {
	uuid: uuid::Uuid,
	kind: Arc<dyn Kind>,
	pub position: Point3<f64>,
	/// Yaw and pitch, in degrees.
	pub rotation: Vector2<f32>,
	pub motion: Vector3<f64>,
	/// Kind-specific data. Persisted with the entity, never interpreted by the world.
	pub data: serde_json::Value,
	processor: Option<Arc<dyn WorldProcessor>>,
	syncing: Option<WorldSyncingData>,
}

impl std::fmt::Debug for Entity {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Entity")
			.field("uuid", &self.uuid)
			.field("kind", &self.kind.id())
			.field("position", &self.position)
			.field("local_id", &self.local_id())
			.finish()
	}
}

impl Entity {
	pub fn new(kind: Arc<dyn Kind>) -> Self {
		Self {
			uuid: uuid::Uuid::new_v4(),
			kind,
			position: Point3::origin(),
			rotation: Vector2::zeros(),
			motion: Vector3::zeros(),
			data: serde_json::Value::Null,
			processor: None,
			syncing: None,
		}
	}

	pub fn with_position(mut self, position: Point3<f64>) -> Self {
		self.position = position;
		self
	}

	/// Provides the consumer of world notifications for this entity.
	/// Entities without a processor still count as attached, they just receive nothing.
	pub fn with_processor(mut self, processor: Arc<dyn WorldProcessor>) -> Self {
		self.processor = Some(processor);
		self
	}

	pub fn uuid(&self) -> &uuid::Uuid {
		&self.uuid
	}

	pub fn kind(&self) -> &Arc<dyn Kind> {
		&self.kind
	}

	pub fn processor(&self) -> Option<&Arc<dyn WorldProcessor>> {
		self.processor.as_ref()
	}

	pub fn chunk(&self) -> ChunkCoord {
		chunk_of_position(&self.position)
	}

	pub fn syncing(&self) -> Option<&WorldSyncingData> {
		self.syncing.as_ref()
	}

	pub fn is_attached(&self) -> bool {
		self.syncing.is_some()
	}

	pub fn local_id(&self) -> Option<EntityId> {
		self.syncing.as_ref().map(|syncing| syncing.local_id)
	}

	pub fn region(&self) -> Option<ProcessingRegion> {
		self.syncing.as_ref().map(|syncing| syncing.region)
	}

	/// The world the entity is attached to, if it is attached and the world is still alive.
	pub fn world(&self) -> Option<Arc<World>> {
		self.syncing
			.as_ref()
			.and_then(|syncing| syncing.world.upgrade())
	}

	pub(crate) fn attach(&mut self, syncing: WorldSyncingData) {
		self.syncing = Some(syncing);
	}

	pub(crate) fn detach(&mut self) -> Option<WorldSyncingData> {
		self.syncing.take()
	}

	/// Re-centers the processing region on the entity's current chunk.
	/// Returns the updated region if the entity is attached.
	pub(crate) fn refresh_region(&mut self) -> Option<ProcessingRegion> {
		let center = self.chunk();
		let syncing = self.syncing.as_mut()?;
		syncing.region.center = center;
		Some(syncing.region)
	}

	pub fn to_save_data(&self) -> EntitySaveData {
		EntitySaveData {
			uuid: self.uuid,
			kind: self.kind.id().to_owned(),
			position: [self.position.x, self.position.y, self.position.z],
			rotation: [self.rotation.x, self.rotation.y],
			motion: [self.motion.x, self.motion.y, self.motion.z],
			data: self.data.clone(),
		}
	}

	/// Rebuilds a saved entity. Returns None if its kind is no longer registered.
	pub fn from_save_data(saved: EntitySaveData) -> Option<Self> {
		let kind = match kinds().get_it(&saved.kind) {
			Some(kind) => kind,
			None => {
				log::warn!(target: "world", "Skipping entity {} of unknown kind {}", saved.uuid, saved.kind);
				return None;
			}
		};
		Some(Self {
			uuid: saved.uuid,
			kind,
			position: Point3::from(saved.position),
			rotation: Vector2::from(saved.rotation),
			motion: Vector3::from(saved.motion),
			data: saved.data,
			processor: None,
			syncing: None,
		})
	}
}

/// The persisted form of an [`Entity`], stored in the `entities` section of its chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySaveData {
	pub uuid: uuid::Uuid,
	pub kind: String,
	pub position: [f64; 3],
	#[serde(default)]
	pub rotation: [f32; 2],
	#[serde(default)]
	pub motion: [f64; 3],
	#[serde(default)]
	pub data: serde_json::Value,
}
