use std::collections::BTreeSet;
use std::sync::Arc;

use rayon::prelude::*;

use crate::codec::{bits_per_index, encode_chunk, encoded_size, payload_words};
use crate::data::{ChunkState, Region, Regions, Specs, Volume, UNALLOCATED};
use crate::passes::uniformity::CHILD_OFFSETS;
use crate::{
    uniformity_block_size,
    Access,
    ComputeKernel,
    ComputePipeline,
    CompressorPhase,
    Heap,
    PaletteTable,
    TaskGraph,
    TaskUse,
    UniformityMap,
    Workspace,
    CHUNK_AXIS,
    UNIFORMITY_LEVELS
};

pub(crate) fn record_compressor(
    graph: &mut TaskGraph,
    pipeline: Arc<ComputePipeline>,
    max_retry_backoff: u32
)
{
    let ComputeKernel::Compressor(phase) = pipeline.get_kernel()
    else
    {
        panic!("{} is not a compressor pipeline", pipeline.get_name())
    };

    let name = pipeline.get_name().to_owned();

    match phase
    {
        CompressorPhase::Palettize =>
        {
            graph.add_task(
                name,
                [
                    TaskUse::of::<Specs>(Access::ComputeReadWrite),
                    TaskUse::of::<Workspace>(Access::ComputeRead),
                    TaskUse::of::<UniformityMap>(Access::ComputeRead),
                    TaskUse::of::<PaletteTable>(Access::ComputeWrite)
                ],
                |ti| {
                    palettize(
                        &mut ti.get_mut::<Specs>(),
                        &ti.get::<Workspace>(),
                        &ti.get::<UniformityMap>(),
                        &mut ti.get_mut::<PaletteTable>()
                    )
                }
            );
        }
        CompressorPhase::Allocate =>
        {
            graph.add_task(
                name,
                [
                    TaskUse::of::<Specs>(Access::ComputeRead),
                    TaskUse::of::<Regions>(Access::ComputeReadWrite),
                    TaskUse::of::<Volume>(Access::ComputeReadWrite),
                    TaskUse::of::<Heap>(Access::ComputeReadWrite)
                ],
                move |ti| {
                    let failed = allocate(
                        &ti.get::<Specs>(),
                        &mut ti.get_mut::<Regions>(),
                        &mut ti.get_mut::<Volume>(),
                        &mut ti.get_mut::<Heap>(),
                        max_retry_backoff
                    );

                    if failed != 0
                    {
                        log::debug!("{failed} chunks failed to allocate this frame");
                    }
                }
            );
        }
        CompressorPhase::Write =>
        {
            graph.add_task(
                name,
                [
                    TaskUse::of::<Specs>(Access::ComputeRead),
                    TaskUse::of::<PaletteTable>(Access::ComputeRead),
                    TaskUse::of::<Workspace>(Access::ComputeRead),
                    TaskUse::of::<Regions>(Access::ComputeReadWrite),
                    TaskUse::of::<Volume>(Access::ComputeReadWrite),
                    TaskUse::of::<Heap>(Access::ComputeReadWrite)
                ],
                |ti| {
                    write(
                        &ti.get::<Specs>(),
                        &ti.get::<PaletteTable>(),
                        &ti.get::<Workspace>(),
                        &mut ti.get_mut::<Regions>(),
                        &mut ti.get_mut::<Volume>(),
                        &mut ti.get_mut::<Heap>()
                    )
                }
            );
        }
    }
}

/// Frames to wait before retrying a chunk that has failed `attempts` times
/// in a row.
pub fn retry_delay(attempts: u32, max_retry_backoff: u32) -> u64
{
    let delay = 1u64
        .checked_shl(attempts.saturating_sub(1))
        .unwrap_or(u64::MAX);

    delay.min(u64::from(max_retry_backoff.max(1)))
}

/// Collects each queued chunk's sorted palette and fills in its encoded
/// layout.
pub fn palettize(
    specs: &mut Specs,
    workspace: &Workspace,
    map: &UniformityMap,
    palette_table: &mut PaletteTable
)
{
    let count = specs.chunks.len();

    specs
        .chunks
        .par_iter_mut()
        .zip(palette_table.entries_mut()[..count].par_iter_mut())
        .for_each(|(spec, palette)| {
            let mut values = BTreeSet::new();
            let top = UNIFORMITY_LEVELS - 1;

            collect_palette(
                workspace,
                map,
                top,
                workspace.slot_position(spec.workspace_slot),
                &mut values
            );

            palette.clear();
            palette.extend(values);

            let palette_len = palette.len() as u32;

            spec.palette_len = palette_len;
            spec.bits = bits_per_index(palette_len);
            spec.encoded_size = encoded_size(palette_len);
        });
}

/// Uniform blocks contribute their one value without being descended.
fn collect_palette(
    workspace: &Workspace,
    map: &UniformityMap,
    level: usize,
    block: [usize; 3],
    values: &mut BTreeSet<u32>
)
{
    let size = uniformity_block_size(level) as usize;

    if map.is_uniform(level, block)
    {
        values.insert(workspace.get(block.map(|c| c * size)));

        return;
    }

    for o in CHILD_OFFSETS
    {
        let child = [block[0] * 2 + o[0], block[1] * 2 + o[1], block[2] * 2 + o[2]];

        if level == 0
        {
            values.insert(workspace.get(child));
        }
        else
        {
            collect_palette(workspace, map, level - 1, child, values);
        }
    }
}

/// Gives every queued chunk a heap range of its encoded size, releasing its
/// previous one first. Chunks that do not fit are marked failed and scheduled
/// for a retry. Returns how many failed.
pub fn allocate(
    specs: &Specs,
    regions: &mut Regions,
    volume: &mut Volume,
    heap: &mut Heap,
    max_retry_backoff: u32
) -> usize
{
    let frame = volume.get_frame();
    let mut failed = 0;

    for spec in &specs.chunks
    {
        let region = regions.get_mut(spec.region_slot);

        if region.is_allocated()
        {
            heap.free(region.offset, region.size);

            region.offset = UNALLOCATED;
            region.size = 0;
        }

        match heap.alloc(spec.encoded_size)
        {
            Ok(offset) =>
            {
                region.offset = offset;
                region.size = spec.encoded_size;
            }
            Err(e) =>
            {
                region.flags = 0;
                failed += 1;

                let Some(cell) = volume.get_mut(spec.chunk)
                else
                {
                    continue;
                };

                cell.attempts += 1;
                cell.state = ChunkState::Failed;

                let delay = retry_delay(cell.attempts, max_retry_backoff);
                cell.retry_frame = frame + delay;

                log::warn!(
                    "{} could not allocate {} bytes ({e}), retrying in {delay} frame(s)",
                    spec.chunk,
                    spec.encoded_size
                );
            }
        }
    }

    failed
}

/// Encodes every allocated chunk into its heap range and publishes its
/// region.
pub fn write(
    specs: &Specs,
    palette_table: &PaletteTable,
    workspace: &Workspace,
    regions: &mut Regions,
    volume: &mut Volume,
    heap: &mut Heap
)
{
    let payloads: Vec<(usize, Vec<u32>)> = {
        let regions = &*regions;
        let volume = &*volume;

        specs
            .chunks
            .par_iter()
            .enumerate()
            .filter(|(_, spec)| {
                regions.get(spec.region_slot).is_allocated()
                    && volume
                        .get(spec.chunk)
                        .is_some_and(|c| c.state == ChunkState::Queued)
            })
            .map(|(i, spec)| {
                let palette = palette_table.get(spec.workspace_slot);
                let mut words = vec![0; payload_words(spec.palette_len)];

                encode_chunk(
                    palette,
                    |v| {
                        workspace.get_in_slot(spec.workspace_slot, [
                            v % CHUNK_AXIS,
                            (v / CHUNK_AXIS) % CHUNK_AXIS,
                            v / (CHUNK_AXIS * CHUNK_AXIS)
                        ])
                    },
                    &mut words
                );

                (i, words)
            })
            .collect()
    };

    for (i, words) in payloads
    {
        let spec = &specs.chunks[i];
        let palette = palette_table.get(spec.workspace_slot);
        let region = regions.get_mut(spec.region_slot);

        heap.write(region.offset, &words);

        region.palette_len = spec.palette_len;
        region.bits = spec.bits;
        region.uniform_value = if palette.len() == 1 { palette[0] } else { 0 };
        region.flags = Region::COMPRESSED;

        if palette.len() == 1
        {
            region.flags |= Region::UNIFORM;
        }

        if let Some(cell) = volume.get_mut(spec.chunk)
        {
            cell.state = ChunkState::Compressed;
            cell.attempts = 0;
        }
    }
}

#[cfg(test)]
mod tests
{
    use itertools::iproduct;

    use super::*;
    use crate::codec::PayloadView;
    use crate::data::{ChunkCoordinate, ChunkSpec};
    use crate::passes::{build_unispecs, compute_uniformity_level};

    struct Fixture
    {
        workspace:     Workspace,
        map:           UniformityMap,
        specs:         Specs,
        palette_table: PaletteTable,
        regions:       Regions,
        volume:        Volume,
        heap:          Heap
    }

    /// Two queued chunks: slot 0 is solid 3, slot 1 has a column of 5s in a
    /// field of 2s.
    fn fixture(heap_bytes: u32) -> Fixture
    {
        let mut workspace = Workspace::new(2);
        let mut volume = Volume::new([2, 1, 1]);
        let mut regions = Regions::new(4);
        let mut specs = Specs::default();

        for (slot, x) in [0, 1].into_iter().enumerate()
        {
            let chunk = ChunkCoordinate::new(x, 0, 0);
            let region_slot = regions.claim(chunk).unwrap();
            let cell = volume.get_mut(chunk).unwrap();

            cell.region = Some(region_slot);
            cell.state = ChunkState::Queued;

            specs.chunks.push(ChunkSpec {
                chunk,
                workspace_slot: slot as u32,
                region_slot,
                ..Default::default()
            });
        }

        for (z, y, x) in iproduct!(0..CHUNK_AXIS, 0..CHUNK_AXIS, 0..CHUNK_AXIS)
        {
            let a = workspace.index_of([x, y, z]);
            let b = workspace.index_of([x + CHUNK_AXIS, y, z]);
            let column = x == 4 && y == 7;

            workspace.voxels_mut()[a] = 3;
            workspace.voxels_mut()[b] = if column { 5 } else { 2 };
        }

        let unispecs = build_unispecs(2, 2);
        let mut map = UniformityMap::new(2);

        for level in 0..UNIFORMITY_LEVELS
        {
            compute_uniformity_level(level, &unispecs, &workspace, &mut map);
        }

        Fixture {
            workspace,
            map,
            specs,
            palette_table: PaletteTable::new(8),
            regions,
            volume,
            heap: Heap::new(heap_bytes)
        }
    }

    impl Fixture
    {
        fn run(&mut self, max_retry_backoff: u32) -> usize
        {
            palettize(&mut self.specs, &self.workspace, &self.map, &mut self.palette_table);

            let failed = allocate(
                &self.specs,
                &mut self.regions,
                &mut self.volume,
                &mut self.heap,
                max_retry_backoff
            );

            write(
                &self.specs,
                &self.palette_table,
                &self.workspace,
                &mut self.regions,
                &mut self.volume,
                &mut self.heap
            );

            failed
        }
    }

    #[test]
    fn palettes_are_sorted_and_minimal()
    {
        let mut f = fixture(1 << 16);

        palettize(&mut f.specs, &f.workspace, &f.map, &mut f.palette_table);

        assert_eq!(f.palette_table.get(0), &[3]);
        assert_eq!(f.palette_table.get(1), &[2, 5]);
        assert_eq!(f.specs.chunks[0].encoded_size, 12);
        assert_eq!(f.specs.chunks[1].bits, 1);
        assert_eq!(f.specs.chunks[1].encoded_size, encoded_size(2));
    }

    #[test]
    fn written_payloads_decode()
    {
        let mut f = fixture(1 << 16);

        assert_eq!(f.run(8), 0);

        let solid = *f.regions.get(f.specs.chunks[0].region_slot);
        assert!(solid.is_compressed() && solid.is_uniform());
        assert_eq!(solid.uniform_value, 3);
        assert_eq!(solid.size, 12);

        let mixed = *f.regions.get(f.specs.chunks[1].region_slot);
        assert!(mixed.is_compressed() && !mixed.is_uniform());

        let view = PayloadView::new(f.heap.read(mixed.offset, payload_words(mixed.palette_len)));
        assert_eq!(view.get(4, 7, 19), 5);
        assert_eq!(view.get(5, 7, 19), 2);

        assert!(f
            .volume
            .cells()
            .all(|(_, c)| c.state == ChunkState::Compressed));
    }

    #[test]
    fn exhausted_heap_fails_only_what_does_not_fit()
    {
        let mut f = fixture(Heap::HEADER_BYTES + 16);

        assert_eq!(f.run(8), 1);

        let solid = f.volume.get(ChunkCoordinate::new(0, 0, 0)).unwrap();
        assert_eq!(solid.state, ChunkState::Compressed);

        let mixed = *f.volume.get(ChunkCoordinate::new(1, 0, 0)).unwrap();
        assert_eq!(mixed.state, ChunkState::Failed);
        assert_eq!(mixed.attempts, 1);
        assert_eq!(mixed.retry_frame, 1);

        let region = f.regions.get(f.specs.chunks[1].region_slot);
        assert!(!region.is_allocated());
        assert!(!region.is_compressed());
    }

    #[test]
    fn reallocation_frees_previous_range()
    {
        let mut f = fixture(1 << 16);

        f.run(8);
        let used = f.heap.get_used_bytes();

        for spec in &f.specs.chunks
        {
            f.volume.get_mut(spec.chunk).unwrap().state = ChunkState::Queued;
        }

        f.run(8);

        assert_eq!(f.heap.get_used_bytes(), used);
        assert_eq!(f.heap.get_live_allocations(), 2);
    }

    #[test]
    fn backoff_doubles_up_to_cap()
    {
        let delays: Vec<u64> = (1..=6).map(|a| retry_delay(a, 8)).collect();

        assert_eq!(delays, vec![1, 2, 4, 8, 8, 8]);
        assert_eq!(retry_delay(200, 64), 64);
    }
}
