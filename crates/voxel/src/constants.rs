pub const CHUNK_AXIS: usize = 32;
pub const CHUNK_VOXELS: usize = CHUNK_AXIS * CHUNK_AXIS * CHUNK_AXIS;

/// Largest workspace edge, in chunks; 256^3 voxels.
pub const MAX_WORKSPACE_CHUNKS: u32 = 8;

pub const UNIFORMITY_LEVELS: usize = 5;
pub const CUBE_VERTEX_COUNT: u32 = 36;

/// Every heap range starts and ends on this many bytes.
pub const HEAP_ALIGNMENT: u32 = 8;

const _: () = assert!(2 << (UNIFORMITY_LEVELS - 1) == CHUNK_AXIS);

/// Edge length of a level's blocks, in voxels.
pub const fn uniformity_block_size(level: usize) -> u32
{
    2 << level
}

/// Edge length of a level's invocation groups, in lanes.
pub const fn uniformity_invoke_size(level: usize) -> u32
{
    let size = uniformity_block_size(level);

    if size < 2
    {
        2
    }
    else if size > 8
    {
        8
    }
    else
    {
        size
    }
}

/// Index of a chunk-local voxel inside a payload.
#[inline(always)]
pub fn chunk_voxel_index(x: usize, y: usize, z: usize) -> usize
{
    debug_assert!(x < CHUNK_AXIS && y < CHUNK_AXIS && z < CHUNK_AXIS);

    x + CHUNK_AXIS * y + CHUNK_AXIS * CHUNK_AXIS * z
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn level_sizes()
    {
        let sizes: Vec<_> = (0..UNIFORMITY_LEVELS)
            .map(|l| (uniformity_block_size(l), uniformity_invoke_size(l)))
            .collect();

        assert_eq!(sizes, vec![(2, 2), (4, 4), (8, 8), (16, 8), (32, 8)]);
    }

    #[test]
    fn voxel_index_is_x_fastest()
    {
        assert_eq!(chunk_voxel_index(1, 0, 0), 1);
        assert_eq!(chunk_voxel_index(0, 1, 0), 32);
        assert_eq!(chunk_voxel_index(0, 0, 1), 1024);
        assert_eq!(chunk_voxel_index(31, 31, 31), CHUNK_VOXELS - 1);
    }
}
