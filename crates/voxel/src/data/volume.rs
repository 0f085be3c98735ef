use std::fmt::Display;

use bytemuck::{Pod, Zeroable};

use crate::CHUNK_AXIS;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
pub struct ChunkCoordinate
{
    pub x: i32,
    pub y: i32,
    pub z: i32
}

impl Display for ChunkCoordinate
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(f, "Chunk({}, {}, {})", self.x, self.y, self.z)
    }
}

impl ChunkCoordinate
{
    pub const fn new(x: i32, y: i32, z: i32) -> ChunkCoordinate
    {
        ChunkCoordinate {
            x,
            y,
            z
        }
    }

    pub fn get_world_origin(&self) -> [i32; 3]
    {
        let axis = CHUNK_AXIS as i32;

        [self.x * axis, self.y * axis, self.z * axis]
    }

    pub fn distance_squared(&self, other: ChunkCoordinate) -> i64
    {
        let d = |a: i32, b: i32| (a as i64 - b as i64).pow(2);

        d(self.x, other.x) + d(self.y, other.y) + d(self.z, other.z)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChunkState
{
    /// Needs (re)generation.
    #[default]
    Dirty,
    /// Picked by this frame's queue stage.
    Queued,
    Compressed,
    /// Its last allocation failed; eligible again at `retry_frame`.
    Failed
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkCell
{
    pub state:       ChunkState,
    pub region:      Option<u32>,
    pub attempts:    u32,
    pub retry_frame: u64
}

/// Session-long grid of chunk cells, `dims` chunks per axis starting at the
/// origin chunk.
#[derive(Debug, Clone)]
pub struct Volume
{
    dims:  [u32; 3],
    cells: Box<[ChunkCell]>,
    frame: u64
}

impl Volume
{
    pub fn new(dims: [u32; 3]) -> Volume
    {
        let len = dims.iter().map(|d| *d as usize).product();

        Volume {
            dims,
            cells: vec![ChunkCell::default(); len].into_boxed_slice(),
            frame: 0
        }
    }

    pub fn get_dims(&self) -> [u32; 3]
    {
        self.dims
    }

    pub fn get_frame(&self) -> u64
    {
        self.frame
    }

    pub fn advance_frame(&mut self) -> u64
    {
        self.frame += 1;

        self.frame
    }

    pub fn len(&self) -> usize
    {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.cells.is_empty()
    }

    pub fn contains(&self, chunk: ChunkCoordinate) -> bool
    {
        [chunk.x, chunk.y, chunk.z]
            .into_iter()
            .zip(self.dims)
            .all(|(c, d)| c >= 0 && (c as u32) < d)
    }

    pub fn linear_index(&self, chunk: ChunkCoordinate) -> Option<usize>
    {
        if !self.contains(chunk)
        {
            return None;
        }

        let [dx, dy, _] = self.dims.map(|d| d as usize);

        Some(chunk.x as usize + dx * (chunk.y as usize + dy * chunk.z as usize))
    }

    pub fn coordinate_of(&self, index: usize) -> ChunkCoordinate
    {
        let [dx, dy, _] = self.dims.map(|d| d as usize);

        ChunkCoordinate::new(
            (index % dx) as i32,
            ((index / dx) % dy) as i32,
            (index / (dx * dy)) as i32
        )
    }

    pub fn get(&self, chunk: ChunkCoordinate) -> Option<&ChunkCell>
    {
        self.linear_index(chunk).map(|i| &self.cells[i])
    }

    pub fn get_mut(&mut self, chunk: ChunkCoordinate) -> Option<&mut ChunkCell>
    {
        self.linear_index(chunk).map(|i| &mut self.cells[i])
    }

    pub fn get_by_index_mut(&mut self, index: usize) -> &mut ChunkCell
    {
        &mut self.cells[index]
    }

    pub fn cells(&self) -> impl Iterator<Item = (ChunkCoordinate, &ChunkCell)>
    {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, c)| (self.coordinate_of(i), c))
    }

    /// Returns false for chunks outside the volume.
    pub fn mark_dirty(&mut self, chunk: ChunkCoordinate) -> bool
    {
        match self.get_mut(chunk)
        {
            Some(cell) =>
            {
                cell.state = ChunkState::Dirty;
                cell.attempts = 0;

                true
            }
            None => false
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn index_round_trip()
    {
        let volume = Volume::new([3, 4, 5]);

        for i in 0..volume.len()
        {
            assert_eq!(volume.linear_index(volume.coordinate_of(i)), Some(i));
        }

        assert_eq!(volume.linear_index(ChunkCoordinate::new(3, 0, 0)), None);
        assert_eq!(volume.linear_index(ChunkCoordinate::new(0, -1, 0)), None);
    }

    #[test]
    fn starts_dirty()
    {
        let mut volume = Volume::new([2, 2, 2]);

        assert!(volume.cells().all(|(_, c)| c.state == ChunkState::Dirty));

        volume.get_mut(ChunkCoordinate::new(1, 1, 1)).unwrap().state = ChunkState::Compressed;
        assert!(volume.mark_dirty(ChunkCoordinate::new(1, 1, 1)));
        assert!(!volume.mark_dirty(ChunkCoordinate::new(2, 1, 1)));
        assert_eq!(volume.advance_frame(), 1);
    }
}
