use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::run_on_demand::EventLoopExtRunOnDemand;
use winit::window::WindowBuilder;

use crate::{InputManager, InputState, SurfaceSwapchain, Swapchain};

#[derive(Debug, thiserror::Error)]
pub enum WindowError
{
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Os(#[from] winit::error::OsError),
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible graphics adapter")]
    NoAdapter,
    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("unsupported surface: {0}")]
    UnsupportedSurface(String)
}

/// What the windowed loop drives every frame.
pub trait WindowedApp
{
    fn resize(&mut self, swapchain: &mut dyn Swapchain, width: u32, height: u32);

    fn frame(&mut self, swapchain: &mut dyn Swapchain, input: &InputState, delta_time: f32);
}

pub struct Window
{
    event_loop:    EventLoop<()>,
    window:        Arc<winit::window::Window>,
    swapchain:     SurfaceSwapchain,
    input_manager: InputManager
}

impl Window
{
    pub fn new(title: &str, width: u32, height: u32) -> Result<Window, WindowError>
    {
        let event_loop = EventLoop::new()?;
        let window = Arc::new(
            WindowBuilder::new()
                .with_inner_size(PhysicalSize {
                    width,
                    height
                })
                .with_title(title)
                .build(&event_loop)?
        );

        let swapchain = SurfaceSwapchain::new(window.clone())?;
        let input_manager = InputManager::new(window.clone());

        Ok(Window {
            event_loop,
            window,
            swapchain,
            input_manager
        })
    }

    pub fn get_swapchain(&mut self) -> &mut SurfaceSwapchain
    {
        &mut self.swapchain
    }

    /// Runs until the window is closed.
    pub fn run(self, app: &mut impl WindowedApp) -> Result<(), WindowError>
    {
        let Window {
            mut event_loop,
            window,
            mut swapchain,
            mut input_manager
        } = self;

        input_manager.attach_cursor();

        event_loop.run_on_demand(|event, control_flow| {
            control_flow.set_control_flow(ControlFlow::Poll);

            input_manager.update_with_event(&event);

            match event
            {
                Event::WindowEvent {
                    window_id,
                    event
                } if window_id == window.id() =>
                {
                    match event
                    {
                        WindowEvent::Resized(new_size) =>
                        {
                            log::info!("Window resized to {}x{}", new_size.width, new_size.height);

                            app.resize(&mut swapchain, new_size.width, new_size.height);
                        }
                        WindowEvent::CloseRequested => control_flow.exit(),
                        WindowEvent::RedrawRequested =>
                        {
                            let input = input_manager.take_frame_state();

                            app.frame(&mut swapchain, &input, input_manager.get_delta_time());
                        }
                        _ => ()
                    }
                }
                Event::AboutToWait => window.request_redraw(),
                _ => ()
            }
        })?;

        log::info!("Event loop returned");

        Ok(())
    }
}
