use std::sync::OnceLock;

use anyhow::Context;
use clap::Parser;
use gfx::{Camera, HeadlessSwapchain, InputState, Swapchain, Window, WindowedApp};
use voxel::{FrameOutcome, VoxelRenderer};

mod config;

use config::{Args, Config};

static LOGGER: OnceLock<util::AsyncLogger> = OnceLock::new();

fn main() -> anyhow::Result<()>
{
    let args = Args::parse();

    let logger = util::AsyncLogger::new("hexane_log.txt").context("failed to open log file")?;
    let logger = LOGGER.get_or_init(|| logger);

    log::set_logger(logger)?;
    log::set_max_level(log::LevelFilter::Debug);

    let outcome = match util::handle_crashes("hexane_crash", || run(args))
    {
        Ok(result) => result,
        Err(crashes) => Err(anyhow::anyhow!("{} thread(s) crashed", crashes.len()))
    };

    if let Err(e) = &outcome
    {
        log::error!("{e:#}");
    }

    logger.stop_worker();

    outcome
}

fn run(args: Args) -> anyhow::Result<()>
{
    let config = Config::load(&args)?;

    log::info!("Starting with {:?}", config.renderer);

    if config.headless
    {
        run_headless(&config)
    }
    else
    {
        run_windowed(&config)
    }
}

fn make_camera(config: &Config) -> Camera
{
    let mut camera = Camera::new(config.camera);
    let (yaw, pitch) = config.start_orientation;

    camera.set_orientation(yaw, pitch);

    camera
}

fn run_headless(config: &Config) -> anyhow::Result<()>
{
    let mut swapchain = HeadlessSwapchain::new(config.width, config.height);
    let (width, height) = swapchain.get_extent();

    let mut renderer = VoxelRenderer::new(config.renderer, width, height)?;
    let matrices = make_camera(config).get_matrices(width, height);

    let timer = util::Timer::new(format!("Rendering {} headless frames", config.frames));

    for _ in 0..config.frames
    {
        if let FrameOutcome::Skipped = renderer.render_frame(&mut swapchain, &matrices)
        {
            log::warn!("Headless frame skipped");
        }
    }

    timer.end();

    if let Some(path) = &config.screenshot
    {
        let color = swapchain
            .get_last_presented()
            .context("no frame was presented")?;

        image::save_buffer(
            path,
            color.as_bytes(),
            color.get_width(),
            color.get_height(),
            image::ColorType::Rgba8
        )
        .with_context(|| format!("failed to write {}", path.display()))?;

        log::info!("Wrote {}", path.display());
    }

    Ok(())
}

struct HexaneApp
{
    renderer: VoxelRenderer,
    camera:   Camera
}

impl WindowedApp for HexaneApp
{
    fn resize(&mut self, swapchain: &mut dyn Swapchain, width: u32, height: u32)
    {
        self.renderer.handle_resize(swapchain, width, height);
    }

    fn frame(&mut self, swapchain: &mut dyn Swapchain, input: &InputState, delta_time: f32)
    {
        self.camera.update(input, delta_time);

        let (width, height) = swapchain.get_extent();
        let matrices = self.camera.get_matrices(width, height);

        self.renderer.render_frame(swapchain, &matrices);
    }
}

fn run_windowed(config: &Config) -> anyhow::Result<()>
{
    let mut window = Window::new("Hexane", config.width, config.height)?;
    let (width, height) = window.get_swapchain().get_extent();

    let mut app = HexaneApp {
        renderer: VoxelRenderer::new(config.renderer, width, height)?,
        camera:   make_camera(config)
    };

    window.run(&mut app)?;

    log::info!(
        "Rendered {} frames, skipped {}",
        app.renderer.get_frame(),
        app.renderer.get_skipped_frames()
    );

    Ok(())
}
