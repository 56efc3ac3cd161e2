//! The simulation core of a voxel game server.
//!
//! A process holds any number of [`World`](world::World)s (see [`Worlds`](world::Worlds)).
//! Each world keeps the chunks its loading tickets reach resident, generating them when they were never saved,
//! ticks scheduled and random block updates, and tells every attached [`Entity`](entity::Entity) about the
//! changes inside its processing region.
//!
//! Library Notes:
//! - [profiling](https://crates.io/crates/profiling) for spans around chunk generation and ticking
//! - [zstd](https://crates.io/crates/zstd) for chunk file compression
//! - [nalgebra](https://crates.io/crates/nalgebra) for chunk & block coordinates

pub mod block;
pub mod common;
pub mod config;
pub use config::Config;
pub mod entity;
pub mod world;
