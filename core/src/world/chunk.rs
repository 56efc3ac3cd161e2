//! Contains all world chunk structures: the data contained in a chunk, how it is stored on disk,
//! the loading tickets which decide what stays loaded, and the barrier which keeps generation in step.

mod barrier;
pub use barrier::*;

mod chunk;
pub use chunk::*;

mod file;
pub use file::*;

mod height_map;
pub use height_map::*;

mod level;
pub use level::*;

mod scheduled;
pub use scheduled::*;

pub mod sub_chunk;
pub use sub_chunk::{BiomeId, SubChunk};

pub mod ticket;
pub use ticket::{Expiration, Ticket, TicketId};
