use std::sync::Arc;

use gfx::{CameraMatrices, ColorImage, Swapchain};
use world_gen::{TerrainGenerator, TerrainKind};

use crate::codec::{payload_words, PayloadView};
use crate::data::{ChunkCell, ChunkCoordinate, Perframe, PerframeStaging, Region, Regions, Volume};
use crate::passes::{
    record_brush,
    record_clear_workspace,
    record_compressor,
    record_copy_indirect,
    record_draw,
    record_prepare,
    record_queue,
    record_uniformity
};
use crate::{
    compressor_pipeline_info,
    raytrace_draw_pipeline_info,
    uniformity_pipeline_info,
    Access,
    BoxFace,
    CompressorPhase,
    ComputePipelineInfo,
    FrameResources,
    Heap,
    PipelineError,
    PipelineManager,
    ShaderCompileInfo,
    ShaderDefine,
    ShaderFile,
    TaskGraph,
    TaskUse,
    HEAP_ALIGNMENT,
    MAX_WORKSPACE_CHUNKS,
    UNIFORMITY_LEVELS
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererConfig
{
    /// Chunks per axis of the workspace; up to `workspace_chunks^3` chunks
    /// are regenerated per frame.
    pub workspace_chunks:  u32,
    pub volume_chunks:     [u32; 3],
    pub heap_bytes:        u32,
    pub region_capacity:   u32,
    pub seed:              u32,
    pub terrain:           TerrainKind,
    /// Upper bound, in frames, of the delay before a failed chunk is retried.
    pub max_retry_backoff: u32
}

impl Default for RendererConfig
{
    fn default() -> Self
    {
        RendererConfig {
            workspace_chunks:  2,
            volume_chunks:     [8, 8, 4],
            heap_bytes:        64 << 20,
            region_capacity:   512,
            seed:              0,
            terrain:           TerrainKind::default(),
            max_retry_backoff: 64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError
{
    #[error("workspace must hold at least one chunk")]
    EmptyWorkspace,
    #[error("workspace of {chunks} chunks per axis exceeds the maximum of {maximum}")]
    WorkspaceTooLarge
    {
        chunks: u32, maximum: u32
    },
    #[error("volume of {0:?} chunks is empty")]
    EmptyVolume([u32; 3]),
    #[error("heap of {bytes} bytes is smaller than the minimum of {minimum} bytes")]
    HeapTooSmall
    {
        bytes: u32, minimum: u32
    },
    #[error("region directory must hold at least one region")]
    NoRegions,
    #[error("max retry backoff must be at least one frame")]
    ZeroBackoff
}

impl RendererConfig
{
    pub fn validate(&self) -> Result<(), ConfigError>
    {
        let minimum = Heap::HEADER_BYTES + HEAP_ALIGNMENT;

        if self.workspace_chunks == 0
        {
            Err(ConfigError::EmptyWorkspace)
        }
        else if self.workspace_chunks > MAX_WORKSPACE_CHUNKS
        {
            Err(ConfigError::WorkspaceTooLarge {
                chunks:  self.workspace_chunks,
                maximum: MAX_WORKSPACE_CHUNKS
            })
        }
        else if self.volume_chunks.contains(&0)
        {
            Err(ConfigError::EmptyVolume(self.volume_chunks))
        }
        else if self.heap_bytes < minimum
        {
            Err(ConfigError::HeapTooSmall {
                bytes: self.heap_bytes,
                minimum
            })
        }
        else if self.region_capacity == 0
        {
            Err(ConfigError::NoRegions)
        }
        else if self.max_retry_backoff == 0
        {
            Err(ConfigError::ZeroBackoff)
        }
        else
        {
            Ok(())
        }
    }

    #[cfg(test)]
    pub(crate) fn small_for_tests() -> RendererConfig
    {
        RendererConfig {
            workspace_chunks:  1,
            volume_chunks:     [2, 2, 1],
            heap_bytes:        1 << 20,
            region_capacity:   16,
            seed:              1,
            terrain:           TerrainKind::Flat {
                height: 20
            },
            max_retry_backoff: 8
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RendererError
{
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome
{
    /// The swapchain had no image ready; nothing ran.
    Skipped,
    Rendered
    {
        frame: u64
    }
}

/// Owns every frame resource and the recorded frame graph.
pub struct VoxelRenderer
{
    config:         RendererConfig,
    pipelines:      PipelineManager,
    resources:      FrameResources,
    frame_graph:    TaskGraph,
    skipped_frames: u64
}

impl std::fmt::Debug for VoxelRenderer
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("VoxelRenderer")
            .field("config", &self.config)
            .field("frame_graph", &self.frame_graph)
            .field("resources", &self.resources)
            .finish_non_exhaustive()
    }
}

impl VoxelRenderer
{
    pub fn new(config: RendererConfig, width: u32, height: u32) -> Result<VoxelRenderer, RendererError>
    {
        config.validate()?;

        let _timer = util::Timer::new("VoxelRenderer::new");

        let mut pipelines = PipelineManager::new();
        let resources = FrameResources::new(&config, width, height);

        let mut upload = TaskGraph::new("Upload");

        upload.add_task(
            "Upload Allocator",
            [
                TaskUse::of::<Heap>(Access::TransferWrite),
                TaskUse::of::<Regions>(Access::TransferWrite)
            ],
            |ti| {
                ti.get_mut::<Heap>().reset();
                ti.get_mut::<Regions>().reset();
            }
        );
        upload.complete();
        upload.execute(&resources);

        let frame_graph = Self::record_frame_graph(&mut pipelines, &config)?;

        log::info!(
            "Voxel renderer ready: {} pipelines, {:?} chunk volume, {} byte heap",
            pipelines.get_compiled_count(),
            config.volume_chunks,
            config.heap_bytes
        );

        Ok(VoxelRenderer {
            config,
            pipelines,
            resources,
            frame_graph,
            skipped_frames: 0
        })
    }

    fn record_frame_graph(
        pipelines: &mut PipelineManager,
        config: &RendererConfig
    ) -> Result<TaskGraph, PipelineError>
    {
        let simple = |name: &'static str, file: ShaderFile, defines: Vec<ShaderDefine>| {
            ComputePipelineInfo {
                name:   name.into(),
                shader: ShaderCompileInfo::new(file, defines)
            }
        };

        let queue = pipelines.add_compute_pipeline(simple("Queue", ShaderFile::Queue, vec![]))?;
        let brush = pipelines.add_compute_pipeline(simple("Brush", ShaderFile::BaseTerrain, vec![]))?;
        let prepare = pipelines.add_compute_pipeline(simple(
            "Raytrace Prepare",
            ShaderFile::Raytrace,
            vec![ShaderDefine::flag("RAYTRACE_PREPARE")]
        ))?;

        let uniformity = (0..UNIFORMITY_LEVELS)
            .map(|level| pipelines.add_compute_pipeline(uniformity_pipeline_info(level)))
            .collect::<Result<Vec<_>, _>>()?;

        let compressor = [
            CompressorPhase::Palettize,
            CompressorPhase::Allocate,
            CompressorPhase::Write
        ]
        .into_iter()
        .map(|phase| pipelines.add_compute_pipeline(compressor_pipeline_info(phase)))
        .collect::<Result<Vec<_>, _>>()?;

        let draw_front = pipelines.add_raster_pipeline(raytrace_draw_pipeline_info(BoxFace::Entry))?;
        let draw_back = pipelines.add_raster_pipeline(raytrace_draw_pipeline_info(BoxFace::Exit))?;

        let generator = Arc::new(TerrainGenerator::new(config.seed, config.terrain));
        let mut graph = TaskGraph::new("Frame");

        graph.add_task(
            "Upload Perframe",
            [
                TaskUse::of::<PerframeStaging>(Access::TransferRead),
                TaskUse::of::<Perframe>(Access::TransferWrite)
            ],
            |ti| *ti.get_mut::<Perframe>() = ti.get::<PerframeStaging>().0
        );

        record_queue(&mut graph, queue, config.workspace_chunks);
        record_clear_workspace(&mut graph);
        record_brush(&mut graph, brush, generator);

        for pipeline in uniformity
        {
            record_uniformity(&mut graph, pipeline);
        }

        for pipeline in compressor
        {
            record_compressor(&mut graph, pipeline, config.max_retry_backoff);
        }

        record_prepare(&mut graph, prepare);
        record_copy_indirect(&mut graph);
        record_draw(&mut graph, draw_front);
        record_draw(&mut graph, draw_back);

        graph.complete();

        Ok(graph)
    }

    pub fn get_config(&self) -> &RendererConfig
    {
        &self.config
    }

    pub fn get_pipelines(&self) -> &PipelineManager
    {
        &self.pipelines
    }

    pub fn get_frame_graph(&self) -> &TaskGraph
    {
        &self.frame_graph
    }

    /// Host view of the frame resources, valid between frames.
    pub fn get_resources(&self) -> &FrameResources
    {
        &self.resources
    }

    pub fn get_frame(&self) -> u64
    {
        self.resources.host::<Volume>().get_frame()
    }

    pub fn get_skipped_frames(&self) -> u64
    {
        self.skipped_frames
    }

    /// Resizes the swapchain and recreates the frame images to match.
    pub fn handle_resize(&mut self, swapchain: &mut dyn Swapchain, width: u32, height: u32)
    {
        swapchain.resize(width, height);
        self.resources.resize_images(width, height);

        log::info!("Resized frame images to {width}x{height}");
    }

    pub fn render_frame(&mut self, swapchain: &mut dyn Swapchain, camera: &CameraMatrices) -> FrameOutcome
    {
        let Some(image) = swapchain.acquire_next_image()
        else
        {
            self.skipped_frames += 1;

            log::debug!("Swapchain has no image ready, skipping frame");

            return FrameOutcome::Skipped;
        };

        let (width, height) = swapchain.get_extent();

        if self.resources.get_image_extent() != (width.max(1), height.max(1))
        {
            self.resources.resize_images(width, height);
        }

        self.resources.host_write(PerframeStaging(Perframe {
            camera: *camera
        }));

        self.frame_graph.execute(&self.resources);

        swapchain.present(image, &self.resources.host::<ColorImage>());

        FrameOutcome::Rendered {
            frame: self.get_frame()
        }
    }

    /// Schedules a chunk for regeneration. Returns false outside the volume.
    pub fn mark_dirty(&mut self, chunk: ChunkCoordinate) -> bool
    {
        self.resources.host_mut::<Volume>().mark_dirty(chunk)
    }

    pub fn get_chunk(&self, chunk: ChunkCoordinate) -> Option<ChunkCell>
    {
        self.resources.host::<Volume>().get(chunk).copied()
    }

    pub fn get_region(&self, chunk: ChunkCoordinate) -> Option<Region>
    {
        let slot = self.get_chunk(chunk)?.region?;

        Some(*self.resources.host::<Regions>().get(slot))
    }

    /// Encoded payload of a compressed chunk, copied out of the heap.
    pub fn read_payload(&self, chunk: ChunkCoordinate) -> Option<Vec<u32>>
    {
        let region = self
            .get_region(chunk)
            .filter(|r| r.is_compressed() && r.is_allocated())?;

        let heap = self.resources.host::<Heap>();

        Some(heap.read(region.offset, payload_words(region.palette_len)).to_vec())
    }

    /// All voxels of a compressed chunk in `chunk_voxel_index` order.
    pub fn decode_chunk(&self, chunk: ChunkCoordinate) -> Option<Vec<u32>>
    {
        self.read_payload(chunk)
            .map(|words| PayloadView::new(&words).decode_all())
    }
}

#[cfg(test)]
mod tests
{
    use gfx::{Camera, CameraConfig, HeadlessSwapchain};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use world_gen::Voxel;

    use super::*;
    use crate::data::{ChunkState, Specs};
    use crate::task_graph::Hazard;
    use crate::{TaskResource, UniformityMap, Workspace, CHUNK_AXIS, CHUNK_VOXELS};

    fn matrices(position: [f32; 3], pitch: f32, extent: (u32, u32)) -> CameraMatrices
    {
        let mut camera = Camera::new(CameraConfig {
            start_position: position,
            ..Default::default()
        });
        camera.set_orientation(0.0, pitch);

        camera.get_matrices(extent.0, extent.1)
    }

    fn overhead() -> CameraMatrices
    {
        matrices([32.0, 32.0, 60.0], 0.0, (32, 32))
    }

    fn render(renderer: &mut VoxelRenderer, swapchain: &mut HeadlessSwapchain, frames: usize)
    {
        for _ in 0..frames
        {
            assert!(matches!(
                renderer.render_frame(swapchain, &overhead()),
                FrameOutcome::Rendered { .. }
            ));
        }
    }

    fn all_chunks(renderer: &VoxelRenderer) -> Vec<ChunkCoordinate>
    {
        renderer
            .get_resources()
            .host::<Volume>()
            .cells()
            .map(|(c, _)| c)
            .collect()
    }

    fn voxel_position(i: usize) -> [usize; 3]
    {
        [
            i % CHUNK_AXIS,
            (i / CHUNK_AXIS) % CHUNK_AXIS,
            i / (CHUNK_AXIS * CHUNK_AXIS)
        ]
    }

    #[test]
    fn decoded_chunks_match_generator()
    {
        let config = RendererConfig {
            workspace_chunks: 2,
            volume_chunks: [2, 2, 2],
            seed: 11,
            terrain: TerrainKind::default(),
            ..RendererConfig::small_for_tests()
        };
        let generator = TerrainGenerator::new(config.seed, config.terrain);
        let mut renderer = VoxelRenderer::new(config, 32, 32).unwrap();
        let mut swapchain = HeadlessSwapchain::new(32, 32);

        render(&mut renderer, &mut swapchain, 1);

        for chunk in all_chunks(&renderer)
        {
            assert_eq!(renderer.get_chunk(chunk).unwrap().state, ChunkState::Compressed);

            let voxels = renderer.decode_chunk(chunk).unwrap();
            let [ox, oy, oz] = chunk.get_world_origin();

            for (i, value) in voxels.iter().enumerate()
            {
                let [x, y, z] = voxel_position(i);
                let expected = generator.sample([ox + x as i32, oy + y as i32, oz + z as i32]);

                assert_eq!(*value, expected.as_raw(), "{chunk} voxel {:?}", [x, y, z]);
            }
        }
    }

    #[test]
    fn uniform_chunk_is_flagged_and_single_entry()
    {
        let config = RendererConfig {
            volume_chunks: [1, 1, 2],
            terrain: TerrainKind::Flat {
                height: 45
            },
            workspace_chunks: 2,
            ..RendererConfig::small_for_tests()
        };
        let mut renderer = VoxelRenderer::new(config, 16, 16).unwrap();
        let mut swapchain = HeadlessSwapchain::new(16, 16);
        let solid = ChunkCoordinate::new(0, 0, 0);

        render(&mut renderer, &mut swapchain, 1);

        let region = renderer.get_region(solid).unwrap();
        assert!(region.is_uniform());
        assert_eq!(region.palette_len, 1);
        assert_eq!(region.bits, 0);
        assert_eq!(region.uniform_value, Voxel::Stone.as_raw());
        assert_eq!(region.size, 12);

        let layered = renderer.get_region(ChunkCoordinate::new(0, 0, 1)).unwrap();
        assert!(!layered.is_uniform());
        assert!(layered.palette_len > 1);

        let resources = renderer.get_resources();
        let specs = resources.host::<Specs>();
        let workspace = resources.host::<Workspace>();
        let map = resources.host::<UniformityMap>();

        let spec = specs.chunks.iter().find(|s| s.chunk == solid).unwrap();
        let [sx, sy, sz] = workspace.slot_position(spec.workspace_slot);

        for level in 0..UNIFORMITY_LEVELS
        {
            let per_chunk = map.blocks_per_axis(level) / 2;

            for i in 0..per_chunk.pow(3)
            {
                let block = [
                    sx * per_chunk + i % per_chunk,
                    sy * per_chunk + (i / per_chunk) % per_chunk,
                    sz * per_chunk + i / (per_chunk * per_chunk)
                ];

                assert!(map.is_uniform(level, block), "level {level} block {block:?}");
            }
        }
    }

    #[test]
    fn requeued_chunks_encode_identically()
    {
        let config = RendererConfig {
            workspace_chunks: 2,
            terrain: TerrainKind::default(),
            ..RendererConfig::small_for_tests()
        };
        let mut renderer = VoxelRenderer::new(config, 16, 16).unwrap();
        let mut swapchain = HeadlessSwapchain::new(16, 16);

        render(&mut renderer, &mut swapchain, 1);

        let chunks = all_chunks(&renderer);
        let before: Vec<_> = chunks.iter().map(|c| renderer.read_payload(*c).unwrap()).collect();

        for chunk in &chunks
        {
            assert!(renderer.mark_dirty(*chunk));
        }

        render(&mut renderer, &mut swapchain, 1);

        for (chunk, payload) in chunks.iter().zip(before)
        {
            assert_eq!(renderer.read_payload(*chunk).unwrap(), payload, "{chunk}");
        }

        assert_eq!(
            renderer.get_resources().host::<Heap>().get_live_allocations(),
            chunks.len() as u32
        );
    }

    #[test]
    fn live_ranges_never_overlap()
    {
        let config = RendererConfig {
            workspace_chunks: 1,
            volume_chunks: [3, 3, 2],
            terrain: TerrainKind::default(),
            heap_bytes: 4 << 20,
            ..RendererConfig::small_for_tests()
        };
        let mut renderer = VoxelRenderer::new(config, 16, 16).unwrap();
        let mut swapchain = HeadlessSwapchain::new(16, 16);
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let chunks = all_chunks(&renderer);

        for _ in 0..40
        {
            render(&mut renderer, &mut swapchain, 1);

            for _ in 0..rng.gen_range(0..3)
            {
                renderer.mark_dirty(chunks[rng.gen_range(0..chunks.len())]);
            }

            let mut ranges: Vec<(u32, u32)> = chunks
                .iter()
                .filter_map(|c| renderer.get_region(*c))
                .filter(|r| r.is_allocated())
                .map(|r| (r.offset, r.offset + Heap::round_size(r.size).unwrap()))
                .collect();

            ranges.sort_unstable();

            for pair in ranges.windows(2)
            {
                assert!(pair[0].1 <= pair[1].0, "{pair:?}");
            }

            let heap = renderer.get_resources().host::<Heap>();

            assert_eq!(heap.get_live_allocations() as usize, ranges.len());

            for (start, end) in heap.free_blocks().map(|(o, s)| (o, o + s))
            {
                assert!(ranges.iter().all(|r| r.1 <= start || end <= r.0));
            }
        }
    }

    #[test]
    fn single_uniform_chunk()
    {
        let config = RendererConfig {
            volume_chunks: [1, 1, 1],
            terrain: TerrainKind::Flat {
                height: 100
            },
            ..RendererConfig::small_for_tests()
        };
        let mut renderer = VoxelRenderer::new(config, 8, 8).unwrap();
        let mut swapchain = HeadlessSwapchain::new(8, 8);
        let chunk = ChunkCoordinate::new(0, 0, 0);

        render(&mut renderer, &mut swapchain, 1);

        let region = renderer.get_region(chunk).unwrap();
        assert!(region.is_compressed() && region.is_uniform());
        assert_eq!(region.size, 12);
        assert_eq!(
            renderer.read_payload(chunk).unwrap(),
            vec![1, 0, Voxel::Stone.as_raw()]
        );
        assert_eq!(
            renderer.decode_chunk(chunk).unwrap(),
            vec![Voxel::Stone.as_raw(); CHUNK_VOXELS]
        );
        assert_eq!(renderer.get_resources().host::<Heap>().get_used_bytes(), 16);
    }

    #[test]
    fn exhausted_heap_retries_without_disturbing_others()
    {
        let config = RendererConfig {
            volume_chunks: [3, 1, 1],
            workspace_chunks: 2,
            heap_bytes: Heap::HEADER_BYTES + 32,
            terrain: TerrainKind::Flat {
                height: 100
            },
            ..RendererConfig::small_for_tests()
        };
        let mut renderer = VoxelRenderer::new(config, 8, 8).unwrap();
        let mut swapchain = HeadlessSwapchain::new(8, 8);
        let camera = matrices([0.0, 0.0, 16.0], 0.0, (8, 8));

        renderer.render_frame(&mut swapchain, &camera);

        let [a, b, c] = [0, 1, 2].map(|x| ChunkCoordinate::new(x, 0, 0));
        let kept = [a, b].map(|k| (renderer.get_region(k).unwrap(), renderer.read_payload(k).unwrap()));

        let failed = renderer.get_chunk(c).unwrap();
        assert_eq!(failed.state, ChunkState::Failed);
        assert_eq!(failed.attempts, 1);
        assert_eq!(failed.retry_frame, 2);
        assert!(!renderer.get_region(c).unwrap().is_allocated());

        // Retried on the very next frame, then backs off.
        renderer.render_frame(&mut swapchain, &camera);
        assert_eq!(renderer.get_chunk(c).unwrap().attempts, 2);
        assert_eq!(renderer.get_chunk(c).unwrap().retry_frame, 4);

        renderer.render_frame(&mut swapchain, &camera);
        assert_eq!(renderer.get_chunk(c).unwrap().attempts, 2);

        renderer.render_frame(&mut swapchain, &camera);
        assert_eq!(renderer.get_chunk(c).unwrap().attempts, 3);

        for (k, (region, payload)) in [a, b].into_iter().zip(kept)
        {
            assert_eq!(renderer.get_chunk(k).unwrap().state, ChunkState::Compressed);
            assert_eq!(renderer.get_region(k).unwrap(), region);
            assert_eq!(renderer.read_payload(k).unwrap(), payload);
        }
    }

    #[test]
    fn resize_recreates_images()
    {
        let mut renderer = VoxelRenderer::new(RendererConfig::small_for_tests(), 32, 24).unwrap();
        let mut swapchain = HeadlessSwapchain::new(32, 24);

        render(&mut renderer, &mut swapchain, 1);
        renderer.handle_resize(&mut swapchain, 48, 20);

        assert_eq!(renderer.get_resources().get_image_extent(), (48, 20));

        assert_eq!(
            renderer.render_frame(&mut swapchain, &matrices([32.0, 32.0, 60.0], 0.0, (48, 20))),
            FrameOutcome::Rendered {
                frame: 2
            }
        );
        assert_eq!(swapchain.get_last_presented().unwrap().get_extent(), (48, 20));
    }

    #[test]
    fn not_ready_swapchain_skips_frame()
    {
        let mut renderer = VoxelRenderer::new(RendererConfig::small_for_tests(), 8, 8).unwrap();
        let mut swapchain = HeadlessSwapchain::new(8, 8);

        swapchain.set_not_ready_for(1);

        assert_eq!(renderer.render_frame(&mut swapchain, &overhead()), FrameOutcome::Skipped);
        assert_eq!(renderer.get_frame(), 0);
        assert_eq!(renderer.get_skipped_frames(), 1);
        assert_eq!(renderer.get_frame_graph().get_executions(), 0);
        assert_eq!(swapchain.get_presented_frames(), 0);

        assert_eq!(renderer.render_frame(&mut swapchain, &overhead()), FrameOutcome::Rendered {
            frame: 1
        });
        assert_eq!(swapchain.get_presented_frames(), 1);
    }

    #[test]
    fn renders_terrain_surface()
    {
        let config = RendererConfig::small_for_tests();
        let generator = TerrainGenerator::new(config.seed, config.terrain);
        let mut renderer = VoxelRenderer::new(config, 32, 32).unwrap();
        let mut swapchain = HeadlessSwapchain::new(32, 32);

        render(&mut renderer, &mut swapchain, 4);

        let surface = generator.sample([20, 20, 19]).get_material();
        let texel = swapchain.get_last_presented().unwrap().get(8, 8);

        assert_eq!(texel, [surface.srgb_r, surface.srgb_g, surface.srgb_b, 255]);
    }

    #[test]
    fn frame_graph_orders_compressor_phases()
    {
        let renderer = VoxelRenderer::new(RendererConfig::small_for_tests(), 8, 8).unwrap();
        let graph = renderer.get_frame_graph();
        let names: Vec<&str> = graph.get_task_names().collect();
        let index_of = |name: &str| names.iter().position(|n| *n == name).unwrap();

        assert_eq!(names.len(), 16);
        assert_eq!(names[0], "Upload Perframe");
        assert_eq!(names[4], "Uniformity 2");
        assert_eq!(names[15], "Raytrace Draw Back");

        let allocate = graph.get_barriers_before("Compressor Allocate");
        assert!(allocate.iter().any(|b| {
            b.resource == TaskResource::Specs
                && b.hazard == Hazard::ReadAfterWrite
                && b.src_task == index_of("Compressor Palettize")
        }));

        let write = graph.get_barriers_before("Compressor Write");
        assert!(write.iter().any(|b| {
            b.resource == TaskResource::Allocator
                && b.hazard == Hazard::ReadAfterWrite
                && b.src_task == index_of("Compressor Allocate")
        }));

        let copy = graph.get_barriers_before("Copy Indirect");
        assert!(copy
            .iter()
            .any(|b| b.resource == TaskResource::WriteIndirect && b.src_task == index_of("Raytrace Prepare")));

        let front = graph.get_barriers_before("Raytrace Draw Front");
        let read_after = |resource: TaskResource, src: &str| {
            front.iter().any(|b| {
                b.resource == resource
                    && b.hazard == Hazard::ReadAfterWrite
                    && b.src_task == index_of(src)
                    && b.dst_access == Access::ShaderRead
            })
        };
        assert!(read_after(TaskResource::Regions, "Compressor Write"));
        assert!(read_after(TaskResource::Perframe, "Upload Perframe"));
        assert!(read_after(TaskResource::Allocator, "Compressor Write"));

        let back = graph.get_barriers_before("Raytrace Draw Back");
        assert!(back
            .iter()
            .any(|b| b.resource == TaskResource::Color && b.hazard == Hazard::ReadAfterWrite));
    }

    #[test]
    fn invalid_config_is_rejected()
    {
        let config = RendererConfig {
            heap_bytes: 8,
            ..RendererConfig::small_for_tests()
        };

        assert!(matches!(
            VoxelRenderer::new(config, 8, 8),
            Err(RendererError::Config(ConfigError::HeapTooSmall { .. }))
        ));
        assert_eq!(
            RendererConfig {
                volume_chunks: [1, 0, 1],
                ..RendererConfig::default()
            }
            .validate(),
            Err(ConfigError::EmptyVolume([1, 0, 1]))
        );
    }

    #[test]
    fn oversized_workspace_is_rejected()
    {
        let too_large = RendererConfig {
            workspace_chunks: u32::MAX,
            ..RendererConfig::default()
        };

        assert_eq!(too_large.validate(), Err(ConfigError::WorkspaceTooLarge {
            chunks:  u32::MAX,
            maximum: MAX_WORKSPACE_CHUNKS
        }));
        assert!(matches!(
            VoxelRenderer::new(too_large, 8, 8),
            Err(RendererError::Config(ConfigError::WorkspaceTooLarge { .. }))
        ));

        let largest = RendererConfig {
            workspace_chunks: MAX_WORKSPACE_CHUNKS,
            ..RendererConfig::default()
        };

        assert_eq!(largest.validate(), Ok(()));
    }
}
