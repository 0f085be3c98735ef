use std::borrow::Cow;
use std::sync::Arc;

use pollster::FutureExt;
use winit::window::Window;

use crate::{ColorImage, Swapchain, SwapchainImage, WindowError};

/// Presents CPU-rendered frames on a wgpu surface by copying the color image
/// into the acquired surface texture.
pub struct SurfaceSwapchain
{
    surface:      wgpu::Surface<'static>,
    device:       wgpu::Device,
    queue:        wgpu::Queue,
    config:       wgpu::SurfaceConfiguration,
    swizzle_bgra: bool,
    pending:      Option<wgpu::SurfaceTexture>,
    next_image:   u64,
    staging:      Vec<u8>
}

impl SurfaceSwapchain
{
    const DESIRED_FORMATS: [wgpu::TextureFormat; 4] = [
        wgpu::TextureFormat::Rgba8Unorm,
        wgpu::TextureFormat::Bgra8Unorm,
        wgpu::TextureFormat::Rgba8UnormSrgb,
        wgpu::TextureFormat::Bgra8UnormSrgb
    ];

    pub fn new(window: Arc<Window>) -> Result<SurfaceSwapchain, WindowError>
    {
        let _timer = util::Timer::new("Surface creation");

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::from_build_config().with_env(),
            ..Default::default()
        });

        let size = window.inner_size();
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference:       wgpu::PowerPreference::HighPerformance,
                compatible_surface:     Some(&surface),
                force_fallback_adapter: false
            })
            .block_on()
            .ok_or(WindowError::NoAdapter)?;

        let maybe_driver_version = adapter.get_info().driver_info;

        log::info!(
            "Selected Device {} {}using backend {:?}",
            adapter.get_info().name,
            if maybe_driver_version.is_empty()
            {
                Cow::Borrowed("")
            }
            else
            {
                format!("with version {} ", maybe_driver_version).into()
            },
            adapter.get_info().backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label:             Some("Presentation Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits:   wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits())
                },
                None
            )
            .block_on()?;

        let surface_caps = surface.get_capabilities(&adapter);

        if !surface_caps.usages.contains(wgpu::TextureUsages::COPY_DST)
        {
            return Err(WindowError::UnsupportedSurface(
                "surface textures cannot be copy destinations".into()
            ));
        }

        let format = Self::DESIRED_FORMATS
            .into_iter()
            .find(|f| surface_caps.formats.contains(f))
            .ok_or_else(|| {
                WindowError::UnsupportedSurface(format!(
                    "no 8 bit RGBA format in {:?}",
                    surface_caps.formats
                ))
            })?;

        let present_mode = [wgpu::PresentMode::Mailbox, wgpu::PresentMode::Fifo]
            .into_iter()
            .find(|m| surface_caps.present_modes.contains(m))
            .unwrap_or(wgpu::PresentMode::Fifo);

        log::info!("Selected surface format {format:?} with present mode {present_mode:?}");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::COPY_DST,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2
        };

        if config.width > 0 && config.height > 0
        {
            surface.configure(&device, &config);
        }

        Ok(SurfaceSwapchain {
            surface,
            device,
            queue,
            config,
            swizzle_bgra: matches!(
                format,
                wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
            ),
            pending: None,
            next_image: 0,
            staging: Vec::new()
        })
    }

    fn reconfigure(&mut self)
    {
        if self.config.width > 0 && self.config.height > 0
        {
            self.surface.configure(&self.device, &self.config);
        }
    }
}

impl Swapchain for SurfaceSwapchain
{
    fn get_extent(&self) -> (u32, u32)
    {
        (self.config.width, self.config.height)
    }

    fn acquire_next_image(&mut self) -> Option<SwapchainImage>
    {
        use wgpu::SurfaceError::*;

        if self.config.width == 0 || self.config.height == 0
        {
            return None;
        }

        match self.surface.get_current_texture()
        {
            Ok(texture) =>
            {
                if texture.suboptimal
                {
                    log::debug!("Suboptimal surface texture");
                }

                let index = self.next_image;

                self.next_image += 1;
                self.pending = Some(texture);

                Some(SwapchainImage {
                    index
                })
            }
            Err(Timeout) =>
            {
                log::warn!("Surface acquire timed out");

                None
            }
            Err(Outdated | Lost) =>
            {
                self.reconfigure();

                None
            }
            Err(OutOfMemory) => panic!("Surface ran out of memory")
        }
    }

    fn present(&mut self, image: SwapchainImage, color: &ColorImage)
    {
        let Some(texture) = self.pending.take()
        else
        {
            log::error!("Presenting image {} that was never acquired", image.index);

            return;
        };

        let (width, height) = color.get_extent();

        if (texture.texture.width(), texture.texture.height()) != (width, height)
        {
            log::debug!("Dropping a {width}x{height} frame for a stale surface texture");

            return;
        }

        let bytes = if self.swizzle_bgra
        {
            self.staging.clear();
            self.staging.extend(
                color
                    .texels()
                    .iter()
                    .flat_map(|[r, g, b, a]| [*b, *g, *r, *a])
            );

            &self.staging[..]
        }
        else
        {
            color.as_bytes()
        };

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture:   &texture.texture,
                mip_level: 0,
                origin:    wgpu::Origin3d::ZERO,
                aspect:    wgpu::TextureAspect::All
            },
            bytes,
            wgpu::ImageDataLayout {
                offset:         0,
                bytes_per_row:  Some(4 * width),
                rows_per_image: Some(height)
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1
            }
        );
        self.queue.submit(std::iter::empty());

        texture.present();
    }

    fn resize(&mut self, width: u32, height: u32)
    {
        self.pending = None;
        self.config.width = width;
        self.config.height = height;

        self.reconfigure();
    }
}
