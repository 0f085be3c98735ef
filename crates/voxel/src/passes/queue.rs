use std::sync::Arc;

use itertools::Itertools;

use crate::data::{
    ChunkCoordinate,
    ChunkSpec,
    ChunkState,
    Perframe,
    Region,
    Regions,
    Specs,
    UniSpecs,
    UniformityLevelSpec,
    Volume
};
use crate::{
    uniformity_block_size,
    uniformity_invoke_size,
    Access,
    ComputeKernel,
    ComputePipeline,
    TaskGraph,
    TaskUse,
    CHUNK_AXIS
};

pub(crate) fn record_queue(graph: &mut TaskGraph, pipeline: Arc<ComputePipeline>, workspace_chunks: u32)
{
    assert_eq!(pipeline.get_kernel(), ComputeKernel::Queue);

    graph.add_task(
        pipeline.get_name().to_owned(),
        [
            TaskUse::of::<Volume>(Access::ComputeReadWrite),
            TaskUse::of::<Regions>(Access::ComputeReadWrite),
            TaskUse::of::<Perframe>(Access::ComputeRead),
            TaskUse::of::<Specs>(Access::ComputeWrite),
            TaskUse::of::<UniSpecs>(Access::ComputeWrite)
        ],
        move |ti| {
            let queued = queue_chunks(
                &mut ti.get_mut::<Volume>(),
                &mut ti.get_mut::<Regions>(),
                &ti.get::<Perframe>(),
                workspace_chunks,
                &mut ti.get_mut::<Specs>(),
                &mut ti.get_mut::<UniSpecs>()
            );

            if queued != 0
            {
                log::trace!("Queued {queued} chunks");
            }
        }
    );
}

/// Advances the frame and picks the chunks this cycle regenerates, nearest
/// to the camera first. Returns how many were queued.
pub fn queue_chunks(
    volume: &mut Volume,
    regions: &mut Regions,
    perframe: &Perframe,
    workspace_chunks: u32,
    specs: &mut Specs,
    unispecs: &mut UniSpecs
) -> usize
{
    let frame = volume.advance_frame();
    let capacity = workspace_chunks.pow(3) as usize;

    let camera = perframe.get_camera_position();
    let axis = CHUNK_AXIS as f32;
    let camera_chunk = ChunkCoordinate::new(
        (camera.x / axis).floor() as i32,
        (camera.y / axis).floor() as i32,
        (camera.z / axis).floor() as i32
    );

    let candidates: Vec<(i64, usize)> = volume
        .cells()
        .enumerate()
        .filter(|(_, (_, cell))| {
            match cell.state
            {
                ChunkState::Dirty => true,
                ChunkState::Failed => cell.retry_frame <= frame,
                ChunkState::Queued | ChunkState::Compressed => false
            }
        })
        .map(|(idx, (chunk, _))| (chunk.distance_squared(camera_chunk), idx))
        .sorted_unstable()
        .collect();

    specs.chunks.clear();

    for (_, idx) in candidates
    {
        if specs.chunks.len() == capacity
        {
            break;
        }

        let chunk = volume.coordinate_of(idx);
        let cell = volume.get_by_index_mut(idx);

        let region_slot = match cell.region
        {
            Some(slot) => slot,
            None =>
            {
                let Some(slot) = regions.claim(chunk)
                else
                {
                    continue;
                };

                cell.region = Some(slot);

                slot
            }
        };

        cell.state = ChunkState::Queued;
        regions.get_mut(region_slot).flags &= !Region::COMPRESSED;

        specs.chunks.push(ChunkSpec {
            chunk,
            workspace_slot: specs.chunks.len() as u32,
            region_slot,
            ..Default::default()
        });
    }

    *unispecs = build_unispecs(workspace_chunks, specs.chunks.len() as u32);

    specs.chunks.len()
}

pub fn build_unispecs(workspace_chunks: u32, chunk_count: u32) -> UniSpecs
{
    let extent = workspace_chunks * CHUNK_AXIS as u32;

    UniSpecs {
        chunk_count,
        levels: std::array::from_fn(|level| {
            let block_size = uniformity_block_size(level);
            let invoke_size = uniformity_invoke_size(level);
            let groups = (extent / block_size).div_ceil(invoke_size);

            UniformityLevelSpec {
                block_size,
                invoke_size,
                dispatch: [groups; 3]
            }
        })
    }
}

#[cfg(test)]
mod tests
{
    use gfx::glm;

    use super::*;

    fn perframe_at(position: [f32; 3]) -> Perframe
    {
        let mut perframe = Perframe::default();

        perframe.camera.transform =
            glm::translate(&glm::Mat4::identity(), &glm::make_vec3(&position));

        perframe
    }

    #[test]
    fn nearest_chunks_first()
    {
        let mut volume = Volume::new([4, 1, 1]);
        let mut regions = Regions::new(16);
        let mut specs = Specs::default();
        let mut unispecs = UniSpecs::default();

        let queued = queue_chunks(
            &mut volume,
            &mut regions,
            &perframe_at([100.0, 5.0, 5.0]),
            1,
            &mut specs,
            &mut unispecs
        );

        assert_eq!(queued, 1);
        assert_eq!(specs.chunks[0].chunk, ChunkCoordinate::new(3, 0, 0));
        assert_eq!(specs.chunks[0].workspace_slot, 0);
        assert_eq!(unispecs.chunk_count, 1);
        assert_eq!(volume.get_frame(), 1);
        assert_eq!(
            volume.get(ChunkCoordinate::new(3, 0, 0)).unwrap().state,
            ChunkState::Queued
        );
        assert_eq!(
            volume.get(ChunkCoordinate::new(2, 0, 0)).unwrap().state,
            ChunkState::Dirty
        );
    }

    #[test]
    fn ties_break_by_index()
    {
        let mut volume = Volume::new([2, 2, 1]);
        let mut regions = Regions::new(16);
        let mut specs = Specs::default();
        let mut unispecs = UniSpecs::default();

        queue_chunks(
            &mut volume,
            &mut regions,
            &perframe_at([32.0, 32.0, 16.0]),
            2,
            &mut specs,
            &mut unispecs
        );

        let order: Vec<_> = specs.chunks.iter().map(|s| s.chunk).collect();

        assert_eq!(order, vec![
            ChunkCoordinate::new(1, 1, 0),
            ChunkCoordinate::new(1, 0, 0),
            ChunkCoordinate::new(0, 1, 0),
            ChunkCoordinate::new(0, 0, 0)
        ]);
    }

    #[test]
    fn failed_chunks_wait_for_retry_frame()
    {
        let mut volume = Volume::new([1, 1, 1]);
        let mut regions = Regions::new(1);
        let mut specs = Specs::default();
        let mut unispecs = UniSpecs::default();
        let perframe = Perframe::default();

        {
            let cell = volume.get_mut(ChunkCoordinate::new(0, 0, 0)).unwrap();
            cell.state = ChunkState::Failed;
            cell.retry_frame = 2;
        }

        let mut run = |volume: &mut Volume| {
            queue_chunks(volume, &mut regions, &perframe, 1, &mut specs, &mut unispecs)
        };

        assert_eq!(run(&mut volume), 0);
        assert_eq!(run(&mut volume), 1);
        assert_eq!(run(&mut volume), 0);
    }

    #[test]
    fn requeue_clears_compressed_and_keeps_slot()
    {
        let mut volume = Volume::new([1, 1, 1]);
        let mut regions = Regions::new(1);
        let mut specs = Specs::default();
        let mut unispecs = UniSpecs::default();
        let chunk = ChunkCoordinate::new(0, 0, 0);

        queue_chunks(&mut volume, &mut regions, &Perframe::default(), 1, &mut specs, &mut unispecs);
        let slot = specs.chunks[0].region_slot;

        regions.get_mut(slot).flags = Region::COMPRESSED;
        volume.get_mut(chunk).unwrap().state = ChunkState::Compressed;
        volume.mark_dirty(chunk);

        queue_chunks(&mut volume, &mut regions, &Perframe::default(), 1, &mut specs, &mut unispecs);

        assert_eq!(specs.chunks[0].region_slot, slot);
        assert!(!regions.get(slot).is_compressed());
        assert_eq!(regions.get_live_regions(), 1);
    }

    #[test]
    fn full_directory_leaves_chunk_dirty()
    {
        let mut volume = Volume::new([2, 1, 1]);
        let mut regions = Regions::new(1);
        let mut specs = Specs::default();
        let mut unispecs = UniSpecs::default();

        let queued = queue_chunks(
            &mut volume,
            &mut regions,
            &Perframe::default(),
            2,
            &mut specs,
            &mut unispecs
        );

        assert_eq!(queued, 1);
        assert_eq!(
            volume.get(ChunkCoordinate::new(1, 0, 0)).unwrap().state,
            ChunkState::Dirty
        );
    }

    #[test]
    fn unispecs_cover_workspace()
    {
        let unispecs = build_unispecs(2, 3);

        assert_eq!(unispecs.levels[0].dispatch, [16; 3]);
        assert_eq!(unispecs.levels[3].dispatch, [1; 3]);
        assert_eq!(unispecs.levels[4].dispatch, [1; 3]);
        assert_eq!(unispecs.levels[4].block_size, 32);
    }
}
