use bytemuck::{Pod, Zeroable};

use crate::ChunkCoordinate;

/// Sentinel heap offset of a region with no payload.
pub const UNALLOCATED: u32 = u32::MAX;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct Region
{
    pub chunk:         ChunkCoordinate,
    pub offset:        u32,
    /// Encoded payload size in bytes.
    pub size:          u32,
    pub palette_len:   u32,
    pub bits:          u32,
    pub uniform_value: u32,
    pub flags:         u32
}

impl Region
{
    pub const COMPRESSED: u32 = 1 << 0;
    pub const UNIFORM: u32 = 1 << 1;

    pub fn new(chunk: ChunkCoordinate) -> Region
    {
        Region {
            chunk,
            offset: UNALLOCATED,
            size: 0,
            palette_len: 0,
            bits: 0,
            uniform_value: 0,
            flags: 0
        }
    }

    pub fn is_allocated(&self) -> bool
    {
        self.offset != UNALLOCATED
    }

    pub fn is_compressed(&self) -> bool
    {
        self.flags & Self::COMPRESSED != 0
    }

    pub fn is_uniform(&self) -> bool
    {
        self.flags & Self::UNIFORM != 0
    }

    /// World-space voxel bounds `[min, max)` of the region's chunk.
    pub fn get_bounds(&self) -> ([f32; 3], [f32; 3])
    {
        let min = self.chunk.get_world_origin().map(|c| c as f32);

        (min, min.map(|c| c + crate::CHUNK_AXIS as f32))
    }
}

/// Fixed-capacity region directory.
#[derive(Debug)]
pub struct Regions
{
    entries:            Box<[Region]>,
    slot_allocator:     util::SlotAllocator,
    reported_exhausted: bool
}

impl Regions
{
    pub fn new(capacity: u32) -> Regions
    {
        Regions {
            entries:            vec![Region::new(ChunkCoordinate::default()); capacity as usize]
                .into_boxed_slice(),
            slot_allocator:     util::SlotAllocator::new(capacity),
            reported_exhausted: false
        }
    }

    /// Forgets every region and slot.
    pub fn reset(&mut self)
    {
        *self = Regions::new(self.get_capacity());
    }

    pub fn get_capacity(&self) -> u32
    {
        self.entries.len() as u32
    }

    pub fn get_live_regions(&self) -> u32
    {
        self.slot_allocator.peek().0
    }

    /// Claims a directory slot for `chunk`. Logs once per session when the
    /// directory is full.
    pub fn claim(&mut self, chunk: ChunkCoordinate) -> Option<u32>
    {
        match self.slot_allocator.allocate()
        {
            Ok(slot) =>
            {
                self.entries[slot as usize] = Region::new(chunk);

                Some(slot)
            }
            Err(e) =>
            {
                if !self.reported_exhausted
                {
                    log::warn!("Region directory exhausted, {chunk} stays unqueued: {e}");

                    self.reported_exhausted = true;
                }

                None
            }
        }
    }

    pub fn get(&self, slot: u32) -> &Region
    {
        &self.entries[slot as usize]
    }

    pub fn get_mut(&mut self, slot: u32) -> &mut Region
    {
        &mut self.entries[slot as usize]
    }
}
