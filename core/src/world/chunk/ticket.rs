use super::level::MAX_LEVEL;
use crate::{entity::EntityId, world::point::ChunkCoord};
use nalgebra::Vector2;
use std::collections::{BTreeMap, HashMap};

/// The log category for loading tickets.
static LOG: &'static str = "chunk-ticket";

pub type TicketId = u64;

/// The computed load level of every chunk reached by at least one ticket.
pub type LevelMap = HashMap<ChunkCoord, u8>;

/// How long a [`Ticket`] keeps its chunks loaded.
pub enum Expiration {
	/// Until it is explicitly removed.
	Never,
	/// For the provided number of world ticks.
	Ticks(u64),
	/// Until the callback returns false. Evaluated once per tick.
	Predicate(Box<dyn FnMut() -> bool + Send>),
	/// For as long as the entity is attached to the world.
	/// The ticket follows the entity's processing region.
	Entity(EntityId),
}

impl std::fmt::Debug for Expiration {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Never => write!(f, "Never"),
			Self::Ticks(ticks) => write!(f, "Ticks({})", ticks),
			Self::Predicate(_) => write!(f, "Predicate"),
			Self::Entity(id) => write!(f, "Entity({})", id),
		}
	}
}

/// A request for the chunks around `center` to be loaded at (or below) `level`.
///
/// Every chunk within `radius` rings of the center receives `level`.
/// Beyond that the level fades by one per ring until [`MAX_LEVEL`],
/// so a ticket of level 10 and radius 2 gives level 11 to ring 3 and stops after ring 36.
///
/// Largely inspired by <https://minecraft.fandom.com/wiki/Chunk#Java_Edition>.
#[derive(Debug)]
pub struct Ticket {
	pub center: ChunkCoord,
	pub radius: u64,
	pub level: u8,
	pub expiration: Expiration,
}

impl std::fmt::Display for Ticket {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"Ticket(<{}, {}> radius={} level={} {:?})",
			self.center.x, self.center.y, self.radius, self.level, self.expiration
		)
	}
}

impl Ticket {
	pub fn new(center: ChunkCoord, radius: u64, level: u8) -> Self {
		Self {
			center,
			radius,
			level,
			expiration: Expiration::Never,
		}
	}

	pub fn with_expiration(mut self, expiration: Expiration) -> Self {
		self.expiration = expiration;
		self
	}

	/// Every coordinate the ticket reaches, paired with the level it applies there.
	pub fn coordinate_levels(&self) -> Vec<(ChunkCoord, u8)> {
		let mut points = Vec::new();
		if self.level > MAX_LEVEL {
			return points;
		}

		points.push((self.center, self.level));
		for ring in 1..=self.radius {
			Self::visit_hollow_square(ring, |offset| {
				points.push((self.center + offset, self.level));
			});
		}

		let fade_rings = (MAX_LEVEL - self.level) as u64;
		for step in 1..=fade_rings {
			let level = self.level + step as u8;
			Self::visit_hollow_square(self.radius + step, |offset| {
				points.push((self.center + offset, level));
			});
		}

		points
	}

	/// Visits every offset whose chebyshev distance from the origin is exactly `radius`.
	/// Corners are visited first, then the edges without their corners.
	pub fn visit_hollow_square<F>(radius: u64, mut callback: F)
	where
		F: FnMut(Vector2<i64>),
	{
		if radius == 0 {
			return;
		}

		let extrema = radius as i64;
		for x in [-extrema, extrema].iter() {
			for z in [-extrema, extrema].iter() {
				callback(Vector2::new(*x, *z));
			}
		}

		let edge_radius = extrema - 1;
		for x in [-extrema, extrema].iter() {
			for z in -edge_radius..=edge_radius {
				callback(Vector2::new(*x, z));
			}
		}
		for z in [-extrema, extrema].iter() {
			for x in -edge_radius..=edge_radius {
				callback(Vector2::new(x, *z));
			}
		}
	}
}

/// The loading tickets of one world.
#[derive(Default)]
pub struct Tickets {
	next_id: TicketId,
	entries: BTreeMap<TicketId, Ticket>,
}

impl Tickets {
	pub fn add(&mut self, ticket: Ticket) -> TicketId {
		let id = self.next_id;
		self.next_id += 1;
		log::trace!(target: LOG, "Adding {} as #{}", ticket, id);
		self.entries.insert(id, ticket);
		id
	}

	pub fn remove(&mut self, id: TicketId) -> Option<Ticket> {
		self.entries.remove(&id)
	}

	pub fn get(&self, id: TicketId) -> Option<&Ticket> {
		self.entries.get(&id)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Removes every ticket bound to the entity.
	pub fn remove_for_entity(&mut self, entity: EntityId) {
		self.entries.retain(|_, ticket| match ticket.expiration {
			Expiration::Entity(id) => id != entity,
			_ => true,
		});
	}

	/// Advances every ticket by one tick and drops the ones which expired.
	///
	/// `resolve_entity` returns the current processing region (center and radius)
	/// of an attached entity, or None if it has detached.
	#[profiling::function]
	pub fn age<F>(&mut self, mut resolve_entity: F) -> Vec<TicketId>
	where
		F: FnMut(EntityId) -> Option<(ChunkCoord, u64)>,
	{
		let mut expired = Vec::new();
		for (id, ticket) in self.entries.iter_mut() {
			let alive = match &mut ticket.expiration {
				Expiration::Never => true,
				Expiration::Ticks(remaining) => {
					if *remaining == 0 {
						false
					} else {
						*remaining -= 1;
						true
					}
				}
				Expiration::Predicate(still_needed) => still_needed(),
				Expiration::Entity(entity) => match resolve_entity(*entity) {
					Some((center, radius)) => {
						ticket.center = center;
						ticket.radius = radius;
						true
					}
					None => false,
				},
			};
			if !alive {
				expired.push(*id);
			}
		}
		for id in expired.iter() {
			if let Some(ticket) = self.entries.remove(id) {
				log::trace!(target: LOG, "Ticket #{} expired: {}", id, ticket);
			}
		}
		expired
	}

	/// The level of every chunk reached by any ticket; the lowest level wins.
	#[profiling::function]
	pub fn compute_levels(&self) -> LevelMap {
		let mut levels = LevelMap::new();
		for ticket in self.entries.values() {
			for (coordinate, level) in ticket.coordinate_levels().into_iter() {
				levels
					.entry(coordinate)
					.and_modify(|current| *current = (*current).min(level))
					.or_insert(level);
			}
		}
		levels
	}
}

#[cfg(test)]
mod ticket {
	use super::*;
	use crate::world::point::chunk;
	use std::sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	};

	#[test]
	fn hollow_square_visits_each_ring_cell_once() {
		for radius in 1..5u64 {
			let mut visited = Vec::new();
			Ticket::visit_hollow_square(radius, |offset| visited.push(offset));
			let expected = (2 * radius + 1).pow(2) - (2 * radius - 1).pow(2);
			assert_eq!(visited.len() as u64, expected);
			for offset in visited.iter() {
				assert_eq!(offset.x.abs().max(offset.y.abs()) as u64, radius);
			}
			visited.sort_by_key(|offset| (offset.x, offset.y));
			visited.dedup();
			assert_eq!(visited.len() as u64, expected);
		}
	}

	#[test]
	fn minimum_level_wins() {
		let mut tickets = Tickets::default();
		tickets.add(Ticket::new(chunk(0, 0), 1, 20));
		tickets.add(Ticket::new(chunk(0, 0), 1, 5));
		let levels = tickets.compute_levels();
		assert_eq!(levels.get(&chunk(0, 0)), Some(&5));
		assert_eq!(levels.get(&chunk(1, -1)), Some(&5));
	}

	#[test]
	fn level_fades_beyond_radius() {
		let mut tickets = Tickets::default();
		tickets.add(Ticket::new(chunk(0, 0), 2, 10));
		let levels = tickets.compute_levels();
		assert_eq!(levels.get(&chunk(2, 2)), Some(&10));
		assert_eq!(levels.get(&chunk(3, 0)), Some(&11));
		assert_eq!(levels.get(&chunk(-3, 1)), Some(&11));
		assert_eq!(levels.get(&chunk(36, 0)), Some(&MAX_LEVEL));
		assert_eq!(levels.get(&chunk(37, 0)), None);
	}

	#[test]
	fn ticket_at_max_level_covers_only_its_radius() {
		let ticket = Ticket::new(chunk(4, 4), 0, MAX_LEVEL);
		assert_eq!(ticket.coordinate_levels(), vec![(chunk(4, 4), MAX_LEVEL)]);
		let ticket = Ticket::new(chunk(4, 4), 0, MAX_LEVEL + 1);
		assert!(ticket.coordinate_levels().is_empty());
	}

	#[test]
	fn countdown_expires() {
		let mut tickets = Tickets::default();
		let id = tickets.add(Ticket::new(chunk(0, 0), 0, 30).with_expiration(Expiration::Ticks(2)));
		assert!(tickets.age(|_| None).is_empty());
		assert!(tickets.age(|_| None).is_empty());
		assert_eq!(tickets.age(|_| None), vec![id]);
		assert!(tickets.is_empty());
	}

	#[test]
	fn predicate_expires() {
		let keep = Arc::new(AtomicBool::new(true));
		let flag = keep.clone();
		let mut tickets = Tickets::default();
		tickets.add(
			Ticket::new(chunk(0, 0), 0, 30)
				.with_expiration(Expiration::Predicate(Box::new(move || flag.load(Ordering::SeqCst)))),
		);
		assert!(tickets.age(|_| None).is_empty());
		keep.store(false, Ordering::SeqCst);
		assert_eq!(tickets.age(|_| None).len(), 1);
	}

	#[test]
	fn entity_ticket_follows_entity() {
		let mut tickets = Tickets::default();
		let id = tickets.add(Ticket::new(chunk(0, 0), 0, 31).with_expiration(Expiration::Entity(7)));
		assert!(tickets.age(|_| Some((chunk(5, -2), 3))).is_empty());
		let ticket = tickets.get(id).unwrap();
		assert_eq!(ticket.center, chunk(5, -2));
		assert_eq!(ticket.radius, 3);
		assert_eq!(tickets.age(|_| None), vec![id]);
	}
}
