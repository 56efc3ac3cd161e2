use super::ArcLockEntity;
use crate::{common::utility::Registry, world::World};
use std::sync::{Arc, OnceLock};

/// The shared behavior of one type of entity.
pub trait Kind: Send + Sync {
	/// The registry id, also written to saved entities.
	fn id(&self) -> &str;

	/// The radius (in chunks) of the processing region of attached entities of this kind.
	fn track_distance(&self) -> u64 {
		4
	}

	/// When provided, attaching an entity of this kind also adds a ticket
	/// at this level which follows the entity until it detaches.
	fn ticket_level(&self) -> Option<u8> {
		None
	}

	/// Whether entities of this kind are written to their chunk when it is saved.
	fn is_saveable(&self) -> bool {
		true
	}

	/// Called once per world tick while the entity's chunk ticks entities.
	/// No world, chunk or entity lock is held; lock `entity` only for as long as needed,
	/// and never while calling back into the [`World`].
	fn tick(&self, _entity: &ArcLockEntity, _world: &World) {}
}

/// The process-wide entity kinds, used to rebuild entities loaded from chunk files.
pub fn kinds() -> &'static Registry<dyn Kind> {
	static KINDS: OnceLock<Registry<dyn Kind>> = OnceLock::new();
	KINDS.get_or_init(|| {
		let registry = Registry::<dyn Kind>::default();
		registry.register_it(Marker.id().to_owned(), Arc::new(Marker));
		registry
	})
}

/// An entity which does nothing; useful for pinning data or a ticket to a position.
pub struct Marker;

impl Kind for Marker {
	fn id(&self) -> &str {
		"vanilla:marker"
	}

	fn track_distance(&self) -> u64 {
		2
	}
}
