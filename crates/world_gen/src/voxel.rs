use strum::{EnumIter, FromRepr, IntoEnumIterator};

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, EnumIter, FromRepr)]
pub enum Voxel
{
    #[default]
    Air   = 0,
    Stone = 1,
    Dirt  = 2,
    Grass = 3,
    Sand  = 4,
    Water = 5,
    Snow  = 6
}

impl Voxel
{
    pub fn get_material_lookup() -> Box<[VoxelMaterial]>
    {
        Voxel::iter()
            .map(|v| v.get_material())
            .collect::<Vec<_>>()
            .into_boxed_slice()
    }

    /// Unknown raw values render as a visible magenta so corruption is
    /// obvious on screen.
    pub fn material_of_raw(raw: u32) -> VoxelMaterial
    {
        match Voxel::from_repr(raw)
        {
            Some(v) => v.get_material(),
            None =>
            {
                VoxelMaterial {
                    is_visible: true,
                    srgb_r:     255,
                    srgb_g:     0,
                    srgb_b:     255
                }
            }
        }
    }

    pub fn as_raw(self) -> u32
    {
        self as u32
    }

    pub fn get_material(&self) -> VoxelMaterial
    {
        match *self
        {
            Voxel::Air =>
            {
                VoxelMaterial {
                    is_visible: false,
                    srgb_r:     0,
                    srgb_g:     0,
                    srgb_b:     0
                }
            }
            Voxel::Stone =>
            {
                VoxelMaterial {
                    is_visible: true,
                    srgb_r:     128,
                    srgb_g:     128,
                    srgb_b:     132
                }
            }
            Voxel::Dirt =>
            {
                VoxelMaterial {
                    is_visible: true,
                    srgb_r:     110,
                    srgb_g:     74,
                    srgb_b:     44
                }
            }
            Voxel::Grass =>
            {
                VoxelMaterial {
                    is_visible: true,
                    srgb_r:     72,
                    srgb_g:     150,
                    srgb_b:     56
                }
            }
            Voxel::Sand =>
            {
                VoxelMaterial {
                    is_visible: true,
                    srgb_r:     214,
                    srgb_g:     198,
                    srgb_b:     140
                }
            }
            Voxel::Water =>
            {
                VoxelMaterial {
                    is_visible: true,
                    srgb_r:     48,
                    srgb_g:     92,
                    srgb_b:     190
                }
            }
            Voxel::Snow =>
            {
                VoxelMaterial {
                    is_visible: true,
                    srgb_r:     240,
                    srgb_g:     244,
                    srgb_b:     250
                }
            }
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VoxelMaterial
{
    pub is_visible: bool,
    pub srgb_r:     u8,
    pub srgb_g:     u8,
    pub srgb_b:     u8
}

#[cfg(test)]
mod test
{
    use super::*;

    #[test]
    pub fn raw_values_round_trip()
    {
        for v in Voxel::iter()
        {
            assert_eq!(Voxel::from_repr(v.as_raw()), Some(v));
        }

        assert_eq!(Voxel::get_material_lookup().len(), Voxel::iter().count());
    }

    #[test]
    pub fn only_air_is_invisible()
    {
        for v in Voxel::iter()
        {
            assert_eq!(v.get_material().is_visible, v != Voxel::Air);
        }

        assert!(Voxel::material_of_raw(9999).is_visible);
    }
}
