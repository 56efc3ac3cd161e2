//! Mobile simulation objects and the notifications they receive from the world they are attached to.

use std::sync::{Arc, RwLock};

mod entity;
pub use entity::*;

mod event;
pub use event::*;

mod kind;
pub use kind::*;

/// The id of an entity within the world it is attached to.
pub type EntityId = u64;
/// Alias for Arc<RwLock<[`Entity`]>>.
pub type ArcLockEntity = Arc<RwLock<Entity>>;
