use super::{
	blocks::Bounds,
	chunk::{ArcLockChunk, Expiration, Ticket, COMPLETE},
	point::{fmt_chunk, ring_distance, ChunkCoord},
	world::{Attached, State, LOG},
	Error, World,
};
use crate::{
	common::utility::recover,
	entity::{ArcLockEntity, Entity, EntityId, ProcessingRegion, WorldEvent, WorldSyncingData},
};
use nalgebra::{Point3, Vector2};
use std::{collections::HashMap, sync::Arc};

impl World {
	/// Attaches the entity to this world, returning its id within the world.
	///
	/// The entity is placed in its chunk on the next tick once that chunk is resident and complete
	/// (the chunk is requested right away). Kinds with a ticket level also get a ticket which follows the entity.
	pub fn register_entity(&self, entity: &ArcLockEntity) -> Result<EntityId, Error> {
		let mut state = self.lock_state();
		let id = self.attach_locked(&mut state, entity.clone(), None)?;
		let center = state
			.entities
			.get(&id)
			.map(|attached| attached.region.center);
		if let Some(center) = center {
			let _ = self.request_chunk_locked(&mut state, center, COMPLETE, false);
		}
		Ok(id)
	}

	/// Attaches an entity. When `chunk` is provided the entity is placed in it immediately.
	pub(super) fn attach_locked(
		&self,
		state: &mut State,
		entity: ArcLockEntity,
		chunk: Option<&ArcLockChunk>,
	) -> Result<EntityId, Error> {
		let (id, kind, position, processor, region) = {
			let mut guard = recover(entity.write());
			if let Some(syncing) = guard.syncing() {
				return Err(Error::EntityAlreadyAttached(syncing.world_id.clone()));
			}
			let id = state.next_entity_id;
			let region = ProcessingRegion {
				center: guard.chunk(),
				radius: guard.kind().track_distance(),
			};
			guard.attach(WorldSyncingData {
				local_id: id,
				world_id: self.id().to_owned(),
				world: self.weak(),
				region,
			});
			(
				id,
				guard.kind().clone(),
				guard.position,
				guard.processor().cloned(),
				region,
			)
		};
		state.next_entity_id += 1;

		if let Some(level) = kind.ticket_level() {
			state.tickets.add(
				Ticket::new(region.center, region.radius, level).with_expiration(Expiration::Entity(id)),
			);
		}

		let placed = match chunk {
			Some(arc_chunk) => {
				recover(arc_chunk.write()).insert_entity(id, entity.clone());
				Some(*recover(arc_chunk.read()).coordinate())
			}
			None => {
				state.pending_attachments.push(id);
				None
			}
		};
		state.entities.insert(
			id,
			Attached {
				entity,
				processor,
				region,
				chunk: placed,
			},
		);

		log::debug!(
			target: LOG,
			"Attached {} entity {} to world {:?} in chunk {}",
			kind.id(),
			id,
			self.id(),
			fmt_chunk(&region.center)
		);
		self.notify(
			state,
			WorldEvent::EntityAdded {
				entity: id,
				kind: kind.id().to_owned(),
				position,
			},
		);
		Ok(id)
	}

	/// Detaches the entity from this world.
	pub fn unregister_entity(&self, entity: &ArcLockEntity) -> Result<(), Error> {
		// the entity lock must be released before the world lock is taken
		let id = {
			let guard = recover(entity.read());
			match guard.syncing() {
				Some(syncing) if syncing.world_id == self.id() => syncing.local_id,
				_ => return Err(Error::EntityNotAttached(self.id().to_owned())),
			}
		};
		let mut state = self.lock_state();
		let is_same = state
			.entities
			.get(&id)
			.map(|attached| Arc::ptr_eq(&attached.entity, entity))
			.unwrap_or(false);
		if !is_same {
			return Err(Error::EntityNotAttached(self.id().to_owned()));
		}
		self.detach_locked(&mut state, id)?;
		Ok(())
	}

	/// Detaches the entity with the provided id from this world, returning it.
	pub fn unregister_entity_id(&self, id: EntityId) -> Result<ArcLockEntity, Error> {
		let mut state = self.lock_state();
		self.detach_locked(&mut state, id)
	}

	pub(super) fn detach_locked(&self, state: &mut State, id: EntityId) -> Result<ArcLockEntity, Error> {
		let attached = state
			.entities
			.remove(&id)
			.ok_or_else(|| Error::UnknownEntity(self.id().to_owned(), id))?;
		state.pending_attachments.retain(|pending| *pending != id);
		state.tickets.remove_for_entity(id);
		if let Some(coordinate) = attached.chunk {
			state.remove_from_chunk(coordinate, id);
		}
		let position = {
			let mut guard = recover(attached.entity.write());
			guard.detach();
			guard.position
		};
		log::debug!(target: LOG, "Detached entity {} from world {:?}", id, self.id());
		self.notify(state, WorldEvent::EntityRemoved { entity: id, position });
		Ok(attached.entity)
	}

	/// Places every waiting entity whose chunk is resident and complete. Called once per tick.
	pub(super) fn place_pending_entities(&self, state: &mut State) {
		let pending = std::mem::take(&mut state.pending_attachments);
		for id in pending.into_iter() {
			let entity = match state.entities.get(&id) {
				Some(attached) => attached.entity.clone(),
				None => continue,
			};
			let coordinate = recover(entity.read()).chunk();
			let ready = state
				.settled_chunk(&coordinate)
				.filter(|arc_chunk| recover(arc_chunk.read()).is_complete())
				.cloned();
			let arc_chunk = match ready {
				Some(arc_chunk) => arc_chunk,
				None => {
					let _ = self.request_chunk_locked(state, coordinate, COMPLETE, false);
					state.pending_attachments.push(id);
					continue;
				}
			};
			recover(arc_chunk.write()).insert_entity(id, entity);
			if let Some(attached) = state.entities.get_mut(&id) {
				attached.chunk = Some(coordinate);
			}
		}
	}

	/// Moves the entity into the chunk it now stands in, if that changed.
	fn relocate_locked(&self, state: &mut State, id: EntityId, to_chunk: ChunkCoord) {
		let (entity, from_chunk) = match state.entities.get(&id) {
			Some(attached) => (attached.entity.clone(), attached.chunk),
			None => return,
		};
		let from_chunk = match from_chunk {
			Some(from_chunk) if from_chunk != to_chunk => from_chunk,
			_ => return,
		};
		state.remove_from_chunk(from_chunk, id);
		let destination = state
			.settled_chunk(&to_chunk)
			.filter(|arc_chunk| recover(arc_chunk.read()).is_complete())
			.cloned();
		let placed = match destination {
			Some(arc_chunk) => {
				recover(arc_chunk.write()).insert_entity(id, entity);
				Some(to_chunk)
			}
			None => {
				state.pending_attachments.push(id);
				None
			}
		};
		if let Some(attached) = state.entities.get_mut(&id) {
			attached.chunk = placed;
		}
	}

	fn attached_entity(&self, state: &State, id: EntityId) -> Result<ArcLockEntity, Error> {
		state
			.entities
			.get(&id)
			.map(|attached| attached.entity.clone())
			.ok_or_else(|| Error::UnknownEntity(self.id().to_owned(), id))
	}

	/// Changes the entity's position and moves it between chunks as needed.
	fn reposition(&self, id: EntityId, to: Point3<f64>, teleport: bool) -> Result<(), Error> {
		let mut state = self.lock_state();
		let entity = self.attached_entity(&state, id)?;
		let (from, region, to_chunk) = {
			let mut guard = recover(entity.write());
			let from = guard.position;
			guard.position = to;
			(from, guard.refresh_region(), guard.chunk())
		};
		if let Some(region) = region {
			if let Some(attached) = state.entities.get_mut(&id) {
				attached.region = region;
			}
		}
		self.relocate_locked(&mut state, id, to_chunk);

		let event = match teleport {
			true => WorldEvent::EntityTeleported { entity: id, from, to },
			false => WorldEvent::EntityMoved { entity: id, from, to },
		};
		self.notify(&state, event);

		if self.light.enable_entity_light_source_updates() {
			let guard = recover(entity.read());
			self.light.process_entity_light_source(self, &guard, to);
		}
		Ok(())
	}

	pub fn move_entity(&self, id: EntityId, to: Point3<f64>) -> Result<(), Error> {
		self.reposition(id, to, false)
	}

	pub fn teleport_entity(&self, id: EntityId, to: Point3<f64>) -> Result<(), Error> {
		self.reposition(id, to, true)
	}

	/// Sets the entity's yaw and pitch (in degrees).
	pub fn rotate_entity(&self, id: EntityId, rotation: Vector2<f32>) -> Result<(), Error> {
		let state = self.lock_state();
		let entity = self.attached_entity(&state, id)?;
		let position = {
			let mut guard = recover(entity.write());
			guard.rotation = rotation;
			guard.position
		};
		self.notify(
			&state,
			WorldEvent::EntityRotated {
				entity: id,
				position,
				rotation,
			},
		);
		if self.light.enable_entity_light_source_updates()
			&& self.light.enable_entity_light_source_updates_include_rot()
		{
			let guard = recover(entity.read());
			self.light.process_entity_light_source(self, &guard, position);
		}
		Ok(())
	}

	/// Notifies everyone near the entity of an event built from the entity's current position.
	fn broadcast<F>(&self, id: EntityId, make_event: F) -> Result<(), Error>
	where
		F: FnOnce(Point3<f64>) -> WorldEvent,
	{
		let state = self.lock_state();
		let entity = self.attached_entity(&state, id)?;
		let position = recover(entity.read()).position;
		self.notify(&state, make_event(position));
		Ok(())
	}

	pub fn animate_entity(&self, id: EntityId, animation: u32) -> Result<(), Error> {
		self.broadcast(id, |position| WorldEvent::EntityAnimated {
			entity: id,
			position,
			animation,
		})
	}

	pub fn effect_entity(&self, id: EntityId, effect: u32, duration: u64) -> Result<(), Error> {
		self.broadcast(id, |position| WorldEvent::EntityEffect {
			entity: id,
			position,
			effect,
			duration,
		})
	}

	pub fn interact_entity(&self, id: EntityId, target: EntityId) -> Result<(), Error> {
		self.broadcast(id, |position| WorldEvent::EntityInteracted {
			entity: id,
			position,
			target,
		})
	}

	/// The entity mounts `vehicle`, or dismounts when None.
	pub fn ride_entity(&self, id: EntityId, vehicle: Option<EntityId>) -> Result<(), Error> {
		self.broadcast(id, |position| WorldEvent::EntityRode {
			entity: id,
			position,
			vehicle,
		})
	}

	/// Tells every attached entity that this one took damage.
	pub fn damage_entity(&self, id: EntityId, amount: f32) -> Result<(), Error> {
		self.broadcast(id, |_| WorldEvent::EntityDamaged { entity: id, amount })
	}

	/// Tells every attached entity that this one died, then detaches it.
	pub fn kill_entity(&self, id: EntityId) -> Result<ArcLockEntity, Error> {
		let mut state = self.lock_state();
		self.attached_entity(&state, id)?;
		self.notify(&state, WorldEvent::EntityDied { entity: id });
		self.detach_locked(&mut state, id)
	}

	pub fn get_entity(&self, id: EntityId) -> Option<ArcLockEntity> {
		self.lock_state()
			.entities
			.get(&id)
			.map(|attached| attached.entity.clone())
	}

	pub fn entity_count(&self) -> usize {
		self.lock_state().entities.len()
	}

	/// Snapshots the attached entities matching `filter`, so callbacks run without the world lock.
	fn collect_entities<F>(&self, filter: F) -> Vec<(EntityId, ArcLockEntity)>
	where
		F: Fn(&Attached) -> bool,
	{
		self.lock_state()
			.entities
			.iter()
			.filter(|(_, attached)| filter(attached))
			.map(|(id, attached)| (*id, attached.entity.clone()))
			.collect()
	}

	/// Calls `callback` for every attached entity, in id order.
	pub fn for_each_entity<F>(&self, mut callback: F)
	where
		F: FnMut(EntityId, &ArcLockEntity),
	{
		for (id, entity) in self.collect_entities(|_| true).iter() {
			callback(*id, entity);
		}
	}

	/// Calls `callback` for every entity placed in the chunk.
	pub fn for_each_entity_in_chunk<F>(&self, coordinate: &ChunkCoord, mut callback: F)
	where
		F: FnMut(EntityId, &ArcLockEntity),
	{
		let entities = self.collect_entities(|attached| attached.chunk.as_ref() == Some(coordinate));
		for (id, entity) in entities.iter() {
			callback(*id, entity);
		}
	}

	/// Calls `callback` for every attached entity whose position lies in `bounds`.
	pub fn for_each_entity_in<F>(&self, bounds: &Bounds, mut callback: F)
	where
		F: FnMut(EntityId, &ArcLockEntity),
	{
		for (id, entity) in self.collect_entities(|_| true).iter() {
			let inside = bounds.contains_position(&recover(entity.read()).position);
			if inside {
				callback(*id, entity);
			}
		}
	}

	/// Calls `callback` for every entity within `radius` chunk rings of `center`,
	/// closest ring first.
	pub fn for_each_entity_radius_out<F>(&self, center: &ChunkCoord, radius: u64, mut callback: F)
	where
		F: FnMut(EntityId, &ArcLockEntity),
	{
		let mut by_ring: HashMap<u64, Vec<(EntityId, ArcLockEntity)>> = HashMap::new();
		for (id, entity) in self.collect_entities(|_| true).into_iter() {
			let ring = ring_distance(center, &recover(entity.read()).chunk());
			if ring <= radius {
				by_ring.entry(ring).or_default().push((id, entity));
			}
		}
		for ring in 0..=radius {
			if let Some(entities) = by_ring.get(&ring) {
				for (id, entity) in entities.iter() {
					callback(*id, entity);
				}
			}
		}
	}

	/// The attached entities which are not placed in any chunk yet.
	pub fn pending_entity_count(&self) -> usize {
		self.lock_state().pending_attachments.len()
	}
}

/// Builds an entity ready for [`World::register_entity`].
pub fn new_entity(entity: Entity) -> ArcLockEntity {
	Arc::new(std::sync::RwLock::new(entity))
}
