//! The static block table and the block values stored in chunks.

mod block;
pub use block::*;

mod lookup;
pub use lookup::*;
