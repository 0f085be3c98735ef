mod image;
mod input_manager;
mod linalg;
mod surface;
mod swapchain;
mod window;

pub use image::*;
pub use input_manager::*;
pub use linalg::*;
pub use surface::SurfaceSwapchain;
pub use swapchain::*;
pub use window::{Window, WindowError, WindowedApp};

pub mod glm
{
    pub use nalgebra_glm::*;
}
