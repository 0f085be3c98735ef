use std::sync::Arc;

use itertools::iproduct;
use rayon::prelude::*;

use crate::data::UniSpecs;
use crate::{
    Access,
    ComputeKernel,
    ComputePipeline,
    TaskGraph,
    TaskUse,
    UniformityMap,
    Workspace,
    CHUNK_AXIS
};

pub(crate) const CHILD_OFFSETS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1]
];

pub(crate) fn record_uniformity(graph: &mut TaskGraph, pipeline: Arc<ComputePipeline>)
{
    let ComputeKernel::Uniformity {
        level
    } = pipeline.get_kernel()
    else
    {
        panic!("{} is not a uniformity pipeline", pipeline.get_name())
    };

    graph.add_task(
        pipeline.get_name().to_owned(),
        [
            TaskUse::of::<UniSpecs>(Access::ComputeRead),
            TaskUse::of::<Workspace>(Access::ComputeRead),
            TaskUse::of::<UniformityMap>(Access::ComputeReadWrite)
        ],
        move |ti| {
            compute_uniformity_level(
                level,
                &ti.get::<UniSpecs>(),
                &ti.get::<Workspace>(),
                &mut ti.get_mut::<UniformityMap>()
            )
        }
    );
}

/// Levels must run in ascending order, each reads the one below it.
pub fn compute_uniformity_level(
    level: usize,
    unispecs: &UniSpecs,
    workspace: &Workspace,
    map: &mut UniformityMap
)
{
    let spec = unispecs.levels[level];
    let block = spec.block_size as usize;
    let invoke = spec.invoke_size as usize;
    let [gx, gy, gz] = spec.dispatch.map(|d| d as usize);
    let n = map.blocks_per_axis(level);
    let w = workspace.get_chunks_per_axis() as usize;

    let occupied = |[x, y, z]: [usize; 3]| {
        let per_chunk = CHUNK_AXIS / block;
        let slot = x / per_chunk + w * (y / per_chunk + w * (z / per_chunk));

        slot < unispecs.chunk_count as usize
    };
    let voxel = |[x, y, z]: [usize; 3]| workspace.get([x, y, z]);
    let finer = (level > 0).then(|| map.level(level - 1));
    let finer_n = n * 2;

    let invocation = |p: [usize; 3]| -> bool {
        if !occupied(p)
        {
            return false;
        }

        let children = CHILD_OFFSETS.map(|o| [p[0] * 2 + o[0], p[1] * 2 + o[1], p[2] * 2 + o[2]]);

        match finer
        {
            None =>
            {
                let first = voxel(children[0]);

                children.iter().all(|c| voxel(*c) == first)
            }
            Some(finer) =>
            {
                let child_block = block / 2;
                let all_uniform = children
                    .iter()
                    .all(|[x, y, z]| finer[x + finer_n * (y + finer_n * z)]);

                all_uniform && {
                    let first = voxel(children[0].map(|c| c * child_block));

                    children
                        .iter()
                        .all(|c| voxel(c.map(|c| c * child_block)) == first)
                }
            }
        }
    };

    let invocation = &invocation;

    let flags: Vec<(usize, bool)> = (0..gx * gy * gz)
        .into_par_iter()
        .flat_map_iter(move |group| {
            let origin = [group % gx, (group / gx) % gy, group / (gx * gy)].map(|g| g * invoke);

            iproduct!(0..invoke, 0..invoke, 0..invoke)
                .map(move |(lz, ly, lx)| [origin[0] + lx, origin[1] + ly, origin[2] + lz])
                .filter(move |p| p.iter().all(|c| *c < n))
                .map(move |p| (p[0] + n * (p[1] + n * p[2]), invocation(p)))
        })
        .collect();

    let level_flags = map.level_mut(level);

    for (index, flag) in flags
    {
        level_flags[index] = flag;
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::passes::build_unispecs;
    use crate::UNIFORMITY_LEVELS;

    fn run_all(workspace: &Workspace, chunk_count: u32) -> UniformityMap
    {
        let unispecs = build_unispecs(workspace.get_chunks_per_axis(), chunk_count);
        let mut map = UniformityMap::new(workspace.get_chunks_per_axis());

        for level in 0..UNIFORMITY_LEVELS
        {
            compute_uniformity_level(level, &unispecs, workspace, &mut map);
        }

        map
    }

    #[test]
    fn solid_chunk_is_uniform_at_every_level()
    {
        let mut workspace = Workspace::new(1);
        workspace.voxels_mut().fill(4);

        let map = run_all(&workspace, 1);

        for level in 0..UNIFORMITY_LEVELS
        {
            assert!(map.level(level).iter().all(|f| *f), "level {level}");
        }
    }

    #[test]
    fn single_voxel_breaks_its_ancestors()
    {
        let mut workspace = Workspace::new(1);
        let index = workspace.index_of([5, 9, 30]);
        workspace.voxels_mut()[index] = 2;

        let map = run_all(&workspace, 1);

        assert!(!map.is_uniform(0, [2, 4, 15]));
        assert!(map.is_uniform(0, [3, 4, 15]));
        assert!(!map.is_uniform(1, [1, 2, 7]));
        assert!(map.is_uniform(1, [0, 0, 0]));
        assert!(!map.is_uniform(2, [0, 1, 3]));
        assert!(!map.is_uniform(3, [0, 0, 1]));
        assert!(map.is_uniform(3, [1, 1, 1]));
        assert!(!map.is_uniform(4, [0, 0, 0]));
    }

    #[test]
    fn differing_uniform_children_are_not_uniform()
    {
        let mut workspace = Workspace::new(1);
        let extent = workspace.get_extent();

        for (z, y, x) in iproduct!(0..extent, 0..extent, 0..extent)
        {
            let index = workspace.index_of([x, y, z]);
            workspace.voxels_mut()[index] = u32::from(x >= 16);
        }

        let map = run_all(&workspace, 1);

        assert!(map.level(3).iter().all(|f| *f));
        assert!(!map.is_uniform(4, [0, 0, 0]));
    }

    #[test]
    fn only_dispatched_workgroups_write_flags()
    {
        let mut workspace = Workspace::new(1);
        workspace.voxels_mut().fill(1);

        let mut unispecs = build_unispecs(1, 1);
        unispecs.levels[0].dispatch = [1, 1, 1];

        let mut map = UniformityMap::new(1);
        compute_uniformity_level(0, &unispecs, &workspace, &mut map);

        let invoke = unispecs.levels[0].invoke_size as usize;

        assert!(map.is_uniform(0, [0, 0, 0]));
        assert!(map.is_uniform(0, [invoke - 1, invoke - 1, invoke - 1]));
        assert!(!map.is_uniform(0, [invoke, 0, 0]));
        assert!(!map.is_uniform(0, [0, 0, invoke]));
    }

    #[test]
    fn partial_workgroups_stay_in_bounds()
    {
        let mut workspace = Workspace::new(3);
        workspace.voxels_mut().fill(6);

        let map = run_all(&workspace, 27);

        for level in 0..UNIFORMITY_LEVELS
        {
            assert!(map.level(level).iter().all(|f| *f), "level {level}");
        }
    }

    #[test]
    fn unqueued_slots_are_not_uniform()
    {
        let workspace = Workspace::new(2);
        let map = run_all(&workspace, 3);

        assert!(map.is_uniform(4, [0, 1, 0]));
        assert!(!map.is_uniform(4, [1, 1, 0]));
        assert!(!map.is_uniform(0, [31, 31, 31]));
    }
}
