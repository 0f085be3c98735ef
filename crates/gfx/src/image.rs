use std::fmt::Debug;

/// CPU-side 2D image in row-major order.
#[derive(Clone, PartialEq)]
pub struct Image2d<T: Copy>
{
    width:  u32,
    height: u32,
    texels: Box<[T]>
}

pub type ColorImage = Image2d<[u8; 4]>;
pub type DepthImage = Image2d<f32>;

impl<T: Copy> Debug for Image2d<T>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(
            f,
            "Image2d<{}> {{ {}x{} }}",
            std::any::type_name::<T>(),
            self.width,
            self.height
        )
    }
}

impl<T: Copy> Image2d<T>
{
    pub fn new(width: u32, height: u32, fill: T) -> Self
    {
        Image2d {
            width,
            height,
            texels: vec![fill; width as usize * height as usize].into_boxed_slice()
        }
    }

    pub fn get_width(&self) -> u32
    {
        self.width
    }

    pub fn get_height(&self) -> u32
    {
        self.height
    }

    pub fn get_extent(&self) -> (u32, u32)
    {
        (self.width, self.height)
    }

    pub fn clear(&mut self, value: T)
    {
        self.texels.fill(value);
    }

    pub fn get(&self, x: u32, y: u32) -> T
    {
        self.texels[self.index_of(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: T)
    {
        let idx = self.index_of(x, y);

        self.texels[idx] = value;
    }

    pub fn texels(&self) -> &[T]
    {
        &self.texels
    }

    pub fn texels_mut(&mut self) -> &mut [T]
    {
        &mut self.texels
    }

    fn index_of(&self, x: u32, y: u32) -> usize
    {
        debug_assert!(x < self.width && y < self.height);

        y as usize * self.width as usize + x as usize
    }
}

impl ColorImage
{
    pub fn as_bytes(&self) -> &[u8]
    {
        bytemuck::cast_slice(&self.texels)
    }
}

/// The size-dependent images of a frame, recreated together on resize.
#[derive(Debug)]
pub struct FrameImages
{
    pub color: ColorImage,
    pub depth: DepthImage
}

impl FrameImages
{
    pub const CLEAR_COLOR: [u8; 4] = [0, 0, 0, 255];
    pub const CLEAR_DEPTH: f32 = 1.0;

    pub fn new(width: u32, height: u32) -> FrameImages
    {
        let width = width.max(1);
        let height = height.max(1);

        FrameImages {
            color: ColorImage::new(width, height, Self::CLEAR_COLOR),
            depth: DepthImage::new(width, height, Self::CLEAR_DEPTH)
        }
    }

    pub fn get_extent(&self) -> (u32, u32)
    {
        self.color.get_extent()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn row_major_indexing()
    {
        let mut image = DepthImage::new(4, 3, 1.0);

        image.set(3, 2, 0.25);

        assert_eq!(image.get(3, 2), 0.25);
        assert_eq!(image.texels()[2 * 4 + 3], 0.25);
    }

    #[test]
    fn frame_images_never_zero_sized()
    {
        let images = FrameImages::new(0, 0);

        assert_eq!(images.get_extent(), (1, 1));
        assert_eq!(images.color.as_bytes().len(), 4);
    }
}
