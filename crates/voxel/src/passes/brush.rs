use std::sync::Arc;

use rayon::prelude::*;
use world_gen::TerrainGenerator;

use crate::data::Specs;
use crate::{Access, ComputeKernel, ComputePipeline, TaskGraph, TaskUse, Workspace, CHUNK_AXIS};

pub(crate) fn record_clear_workspace(graph: &mut TaskGraph)
{
    graph.add_task(
        "Clear Workspace",
        [TaskUse::of::<Workspace>(Access::TransferWrite)],
        |ti| ti.get_mut::<Workspace>().clear()
    );
}

pub(crate) fn record_brush(
    graph: &mut TaskGraph,
    pipeline: Arc<ComputePipeline>,
    generator: Arc<TerrainGenerator>
)
{
    assert_eq!(pipeline.get_kernel(), ComputeKernel::Brush);

    graph.add_task(
        pipeline.get_name().to_owned(),
        [
            TaskUse::of::<Specs>(Access::ComputeRead),
            TaskUse::of::<Workspace>(Access::ComputeWrite)
        ],
        move |ti| brush_chunks(&ti.get::<Specs>(), &generator, &mut ti.get_mut::<Workspace>())
    );
}

/// Fills the workspace slot of every queued chunk with its terrain. Slots
/// beyond the queued count are left untouched.
pub fn brush_chunks(specs: &Specs, generator: &TerrainGenerator, workspace: &mut Workspace)
{
    let heights: Vec<Vec<i32>> = specs
        .chunks
        .par_iter()
        .map(|spec| {
            let [ox, oy, _] = spec.chunk.get_world_origin();

            (0..CHUNK_AXIS * CHUNK_AXIS)
                .map(|i| {
                    let x = ox + (i % CHUNK_AXIS) as i32;
                    let y = oy + (i / CHUNK_AXIS) as i32;

                    generator.column_height(x, y)
                })
                .collect()
        })
        .collect();

    let w = workspace.get_chunks_per_axis() as usize;
    let extent = workspace.get_extent();

    workspace
        .voxels_mut()
        .par_chunks_mut(extent)
        .enumerate()
        .for_each(|(row, voxels)| {
            let y = row % extent;
            let z = row / extent;
            let (sy, sz) = (y / CHUNK_AXIS, z / CHUNK_AXIS);

            for (sx, span) in voxels.chunks_mut(CHUNK_AXIS).enumerate()
            {
                let slot = sx + w * (sy + w * sz);

                let Some(spec) = specs.chunks.get(slot)
                else
                {
                    continue;
                };

                debug_assert_eq!(spec.workspace_slot as usize, slot);

                let world_z = spec.chunk.get_world_origin()[2] + (z % CHUNK_AXIS) as i32;
                let column_row = &heights[slot][(y % CHUNK_AXIS) * CHUNK_AXIS..];

                for (x, voxel) in span.iter_mut().enumerate()
                {
                    *voxel = generator.voxel_in_column(world_z, column_row[x]).as_raw();
                }
            }
        });
}

#[cfg(test)]
mod tests
{
    use world_gen::{TerrainKind, Voxel};

    use super::*;
    use crate::data::ChunkSpec;
    use crate::ChunkCoordinate;

    fn spec(slot: u32, chunk: ChunkCoordinate) -> ChunkSpec
    {
        ChunkSpec {
            chunk,
            workspace_slot: slot,
            ..Default::default()
        }
    }

    #[test]
    fn matches_generator()
    {
        let generator = TerrainGenerator::new(3, TerrainKind::default());
        let mut workspace = Workspace::new(2);
        let specs = Specs {
            chunks: vec![
                spec(0, ChunkCoordinate::new(0, 0, 1)),
                spec(1, ChunkCoordinate::new(4, -2, 0))
            ]
        };

        brush_chunks(&specs, &generator, &mut workspace);

        for (slot, s) in specs.chunks.iter().enumerate()
        {
            let [ox, oy, oz] = s.chunk.get_world_origin();

            for [x, y, z] in [[0, 0, 0], [31, 5, 17], [12, 31, 31], [7, 7, 0]]
            {
                let expected = generator.sample([ox + x as i32, oy + y as i32, oz + z as i32]);

                assert_eq!(workspace.get_in_slot(slot as u32, [x, y, z]), expected.as_raw());
            }
        }
    }

    #[test]
    fn unused_slots_untouched()
    {
        let generator = TerrainGenerator::new(0, TerrainKind::Flat {
            height: 100
        });
        let mut workspace = Workspace::new(2);
        let specs = Specs {
            chunks: vec![spec(0, ChunkCoordinate::new(0, 0, 0))]
        };

        brush_chunks(&specs, &generator, &mut workspace);

        assert_eq!(workspace.get_in_slot(0, [3, 3, 3]), Voxel::Stone.as_raw());
        assert_eq!(workspace.get_in_slot(1, [3, 3, 3]), Voxel::Air.as_raw());
        assert_eq!(workspace.get_in_slot(7, [31, 31, 31]), Voxel::Air.as_raw());
    }
}
