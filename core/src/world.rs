//! Worlds: chunks brought in and out of memory by loading tickets, generated and lit in the background,
//! ticked once per server tick, with the entities attached to them notified of everything which changes.

mod error;
pub use error::*;

pub mod point;

pub mod chunk;

mod generator;
pub use generator::*;

mod light;
pub use light::*;

mod settings;
pub use settings::*;

mod world;
pub use world::*;

mod blocks;
pub use blocks::{Bounds, SetMode};

mod entities;
pub use entities::new_entity;

mod lifecycle;
pub use lifecycle::{ChunkFuture, SaveFuture};

mod notify;

mod tick;

mod registry;
pub use registry::*;

#[cfg(test)]
pub(crate) mod testing;
