//! The stages of a frame, each recorded as one or more tasks. Every stage is
//! also exposed as a plain function over the resources it touches.

mod brush;
mod compressor;
mod queue;
mod raytrace;
mod uniformity;

pub(crate) use brush::{record_brush, record_clear_workspace};
pub use brush::brush_chunks;
pub(crate) use compressor::record_compressor;
pub use compressor::{allocate, palettize, retry_delay, write};
pub(crate) use queue::record_queue;
pub use queue::{build_unispecs, queue_chunks};
pub(crate) use raytrace::{record_copy_indirect, record_draw, record_prepare};
pub use raytrace::{draw, prepare};
pub(crate) use uniformity::record_uniformity;
pub use uniformity::compute_uniformity_level;
