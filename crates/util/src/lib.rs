mod allocator;
mod crash_handler;
mod log;
mod timer;

pub use allocator::*;
pub use crash_handler::*;
pub use log::*;
pub use timer::*;
