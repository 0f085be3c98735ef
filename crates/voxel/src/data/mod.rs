mod region;
mod specs;
mod volume;

pub use region::{Region, Regions, UNALLOCATED};
pub use specs::*;
pub use volume::{ChunkCell, ChunkCoordinate, ChunkState, Volume};
