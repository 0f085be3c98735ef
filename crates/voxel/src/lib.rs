mod codec;
mod constants;
mod heap;
mod pipeline;
mod resources;
mod task_graph;
mod voxel_world;
mod workspace;

pub mod data;
pub mod passes;

pub use codec::{bits_per_index, encoded_size, payload_words, PayloadView};
pub use constants::*;
pub use data::{ChunkCell, ChunkCoordinate, ChunkState, Region};
pub use heap::{Heap, HeapError};
pub use pipeline::*;
pub use resources::*;
pub use task_graph::*;
pub use voxel_world::*;
pub use workspace::*;
