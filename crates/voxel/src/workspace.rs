use crate::{uniformity_block_size, CHUNK_AXIS, UNIFORMITY_LEVELS};

/// 3D scratch image holding `chunks_per_axis^3` chunk slots. Slot `s` sits at
/// chunk position `(s % W, (s / W) % W, s / W^2)`.
#[derive(Debug, Clone)]
pub struct Workspace
{
    chunks_per_axis: u32,
    voxels:          Vec<u32>
}

impl Workspace
{
    pub fn new(chunks_per_axis: u32) -> Workspace
    {
        let extent = chunks_per_axis as usize * CHUNK_AXIS;

        Workspace {
            chunks_per_axis,
            voxels: vec![0; extent * extent * extent]
        }
    }

    pub fn get_chunks_per_axis(&self) -> u32
    {
        self.chunks_per_axis
    }

    pub fn get_slot_capacity(&self) -> u32
    {
        self.chunks_per_axis.pow(3)
    }

    /// Voxels per axis.
    pub fn get_extent(&self) -> usize
    {
        self.chunks_per_axis as usize * CHUNK_AXIS
    }

    pub fn clear(&mut self)
    {
        self.voxels.fill(0);
    }

    pub fn slot_position(&self, slot: u32) -> [usize; 3]
    {
        let w = self.chunks_per_axis;

        [slot % w, (slot / w) % w, slot / (w * w)].map(|c| c as usize)
    }

    pub fn index_of(&self, [x, y, z]: [usize; 3]) -> usize
    {
        let extent = self.get_extent();

        x + extent * (y + extent * z)
    }

    pub fn get(&self, position: [usize; 3]) -> u32
    {
        self.voxels[self.index_of(position)]
    }

    /// Reads chunk-local voxel `[x, y, z]` of `slot`.
    pub fn get_in_slot(&self, slot: u32, [x, y, z]: [usize; 3]) -> u32
    {
        let [sx, sy, sz] = self.slot_position(slot);

        self.get([
            sx * CHUNK_AXIS + x,
            sy * CHUNK_AXIS + y,
            sz * CHUNK_AXIS + z
        ])
    }

    pub fn voxels_mut(&mut self) -> &mut [u32]
    {
        &mut self.voxels
    }
}

/// Per-level uniform flags of the workspace. Level `i` has one flag per
/// `2^(i+1)`-edged block.
#[derive(Debug, Clone)]
pub struct UniformityMap
{
    extent: usize,
    levels: [Vec<bool>; UNIFORMITY_LEVELS]
}

impl UniformityMap
{
    pub fn new(workspace_chunks: u32) -> UniformityMap
    {
        let extent = workspace_chunks as usize * CHUNK_AXIS;

        UniformityMap {
            extent,
            levels: std::array::from_fn(|level| {
                vec![false; (extent / uniformity_block_size(level) as usize).pow(3)]
            })
        }
    }

    pub fn blocks_per_axis(&self, level: usize) -> usize
    {
        self.extent / uniformity_block_size(level) as usize
    }

    pub fn block_index(&self, level: usize, [x, y, z]: [usize; 3]) -> usize
    {
        let n = self.blocks_per_axis(level);

        x + n * (y + n * z)
    }

    pub fn is_uniform(&self, level: usize, block: [usize; 3]) -> bool
    {
        self.levels[level][self.block_index(level, block)]
    }

    pub fn level(&self, level: usize) -> &[bool]
    {
        &self.levels[level]
    }

    pub fn level_mut(&mut self, level: usize) -> &mut Vec<bool>
    {
        &mut self.levels[level]
    }
}

/// Sorted palette of each workspace slot, written by palettize.
#[derive(Debug, Clone)]
pub struct PaletteTable
{
    entries: Vec<Vec<u32>>
}

impl PaletteTable
{
    pub fn new(slots: u32) -> PaletteTable
    {
        PaletteTable {
            entries: vec![Vec::new(); slots as usize]
        }
    }

    pub fn get(&self, slot: u32) -> &[u32]
    {
        &self.entries[slot as usize]
    }

    pub fn entries_mut(&mut self) -> &mut [Vec<u32>]
    {
        &mut self.entries
    }
}
