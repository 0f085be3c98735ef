use bytemuck::{Pod, Zeroable};
use gfx::glm;

use crate::{ChunkCoordinate, CUBE_VERTEX_COUNT, UNIFORMITY_LEVELS};

/// One queued chunk of the current cycle. Filled by queue, completed by
/// palettize.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ChunkSpec
{
    pub chunk:          ChunkCoordinate,
    pub workspace_slot: u32,
    pub region_slot:    u32,
    pub palette_len:    u32,
    pub bits:           u32,
    pub encoded_size:   u32
}

#[derive(Debug, Default, Clone)]
pub struct Specs
{
    pub chunks: Vec<ChunkSpec>
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct UniformityLevelSpec
{
    pub block_size:  u32,
    pub invoke_size: u32,
    pub dispatch:    [u32; 3]
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UniSpecs
{
    pub chunk_count: u32,
    pub levels:      [UniformityLevelSpec; UNIFORMITY_LEVELS]
}

/// Region slots of the instances drawn this frame.
#[derive(Debug, Default, Clone)]
pub struct RaytraceSpecs
{
    pub slots: Vec<u32>
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndirect
{
    pub vertex_count:   u32,
    pub instance_count: u32,
    pub first_vertex:   u32,
    pub first_instance: u32
}

impl DrawIndirect
{
    pub fn cubes(instance_count: u32) -> DrawIndirect
    {
        DrawIndirect {
            vertex_count: CUBE_VERTEX_COUNT,
            instance_count,
            first_vertex: 0,
            first_instance: 0
        }
    }
}

/// Indirect args as written by raytrace prepare.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteIndirectBuffer(pub DrawIndirect);

/// Indirect args as consumed by the draw passes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndirectBuffer(pub DrawIndirect);

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Perframe
{
    pub camera: gfx::CameraMatrices
}

impl Default for Perframe
{
    fn default() -> Self
    {
        let identity = glm::Mat4::identity();

        Perframe {
            camera: gfx::CameraMatrices {
                projection:     identity,
                inv_projection: identity,
                view:           identity,
                transform:      identity
            }
        }
    }
}

impl Perframe
{
    pub fn get_camera_position(&self) -> glm::Vec3
    {
        let t = &self.camera.transform;

        glm::vec3(t[(0, 3)], t[(1, 3)], t[(2, 3)])
    }
}

/// Host-written copy of `Perframe`, uploaded by the first task of a frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PerframeStaging(pub Perframe);
