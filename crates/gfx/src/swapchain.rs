use crate::ColorImage;

/// Handle to an acquired presentable image. Must be handed back to
/// `Swapchain::present` of the swapchain that produced it.
#[derive(Debug, PartialEq, Eq)]
pub struct SwapchainImage
{
    pub(crate) index: u64
}

impl SwapchainImage
{
    pub fn get_index(&self) -> u64
    {
        self.index
    }
}

/// The presentation side of a frame.
pub trait Swapchain
{
    fn get_extent(&self) -> (u32, u32);

    /// `None` means no image is ready (e.g. the surface is out of date during
    /// a resize); the caller skips the frame.
    fn acquire_next_image(&mut self) -> Option<SwapchainImage>;

    fn present(&mut self, image: SwapchainImage, color: &ColorImage);

    fn resize(&mut self, width: u32, height: u32);
}

/// Swapchain without a window. Keeps the last presented frame.
#[derive(Debug)]
pub struct HeadlessSwapchain
{
    width:              u32,
    height:             u32,
    not_ready_acquires: u32,
    next_image:         u64,
    presented_frames:   u64,
    last_presented:     Option<ColorImage>
}

impl HeadlessSwapchain
{
    pub fn new(width: u32, height: u32) -> HeadlessSwapchain
    {
        HeadlessSwapchain {
            width,
            height,
            not_ready_acquires: 0,
            next_image: 0,
            presented_frames: 0,
            last_presented: None
        }
    }

    /// The next `acquires` calls to `acquire_next_image` report not ready.
    pub fn set_not_ready_for(&mut self, acquires: u32)
    {
        self.not_ready_acquires = acquires;
    }

    pub fn get_presented_frames(&self) -> u64
    {
        self.presented_frames
    }

    pub fn get_last_presented(&self) -> Option<&ColorImage>
    {
        self.last_presented.as_ref()
    }
}

impl Swapchain for HeadlessSwapchain
{
    fn get_extent(&self) -> (u32, u32)
    {
        (self.width, self.height)
    }

    fn acquire_next_image(&mut self) -> Option<SwapchainImage>
    {
        if self.not_ready_acquires > 0
        {
            self.not_ready_acquires -= 1;

            return None;
        }

        let index = self.next_image;

        self.next_image += 1;

        Some(SwapchainImage {
            index
        })
    }

    fn present(&mut self, image: SwapchainImage, color: &ColorImage)
    {
        debug_assert!(image.index < self.next_image);

        if color.get_extent() != (self.width, self.height)
        {
            log::warn!(
                "Presenting a {:?} image to a {}x{} swapchain",
                color.get_extent(),
                self.width,
                self.height
            );
        }

        self.presented_frames += 1;
        self.last_presented = Some(color.clone());
    }

    fn resize(&mut self, width: u32, height: u32)
    {
        self.width = width;
        self.height = height;
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn not_ready_then_ready()
    {
        let mut swapchain = HeadlessSwapchain::new(2, 2);

        swapchain.set_not_ready_for(2);

        assert!(swapchain.acquire_next_image().is_none());
        assert!(swapchain.acquire_next_image().is_none());

        let image = swapchain.acquire_next_image().unwrap();

        swapchain.present(image, &ColorImage::new(2, 2, [1, 2, 3, 4]));

        assert_eq!(swapchain.get_presented_frames(), 1);
        assert_eq!(swapchain.get_last_presented().unwrap().get(1, 1), [1, 2, 3, 4]);
    }
}
