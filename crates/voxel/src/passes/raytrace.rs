use std::sync::Arc;

use gfx::{glm, ColorImage, DepthImage, FrameImages};
use rayon::prelude::*;
use world_gen::Voxel;

use crate::codec::{payload_words, PayloadView};
use crate::data::{
    DrawIndirect,
    IndirectBuffer,
    Perframe,
    RaytraceSpecs,
    Regions,
    Volume,
    WriteIndirectBuffer
};
use crate::{
    Access,
    BoxFace,
    CompareOp,
    ComputeKernel,
    ComputePipeline,
    Heap,
    LoadOp,
    RasterPipeline,
    TaskGraph,
    TaskUse,
    CHUNK_AXIS,
    CUBE_VERTEX_COUNT
};

pub(crate) fn record_prepare(graph: &mut TaskGraph, pipeline: Arc<ComputePipeline>)
{
    assert_eq!(pipeline.get_kernel(), ComputeKernel::RaytracePrepare);

    graph.add_task(
        pipeline.get_name().to_owned(),
        [
            TaskUse::of::<Volume>(Access::ComputeRead),
            TaskUse::of::<Regions>(Access::ComputeRead),
            TaskUse::of::<Perframe>(Access::ComputeRead),
            TaskUse::of::<RaytraceSpecs>(Access::ComputeWrite),
            TaskUse::of::<WriteIndirectBuffer>(Access::ComputeWrite)
        ],
        |ti| {
            prepare(
                &ti.get::<Volume>(),
                &ti.get::<Regions>(),
                &ti.get::<Perframe>(),
                &mut ti.get_mut::<RaytraceSpecs>(),
                &mut ti.get_mut::<WriteIndirectBuffer>()
            )
        }
    );
}

pub(crate) fn record_copy_indirect(graph: &mut TaskGraph)
{
    graph.add_task(
        "Copy Indirect",
        [
            TaskUse::of::<WriteIndirectBuffer>(Access::TransferRead),
            TaskUse::of::<IndirectBuffer>(Access::TransferWrite)
        ],
        |ti| ti.get_mut::<IndirectBuffer>().0 = ti.get::<WriteIndirectBuffer>().0
    );
}

pub(crate) fn record_draw(graph: &mut TaskGraph, pipeline: Arc<RasterPipeline>)
{
    graph.add_task(
        pipeline.get_name().to_owned(),
        [
            TaskUse::of::<IndirectBuffer>(Access::IndirectRead),
            TaskUse::of::<RaytraceSpecs>(Access::ShaderRead),
            TaskUse::of::<Regions>(Access::ShaderRead),
            TaskUse::of::<Heap>(Access::ShaderRead),
            TaskUse::of::<Perframe>(Access::ShaderRead),
            TaskUse::of::<ColorImage>(Access::ColorAttachment),
            TaskUse::of::<DepthImage>(Access::DepthAttachment)
        ],
        move |ti| {
            draw(
                &pipeline,
                ti.get::<IndirectBuffer>().0,
                &ti.get::<RaytraceSpecs>(),
                &ti.get::<Regions>(),
                &ti.get::<Heap>(),
                &ti.get::<Perframe>(),
                &mut ti.get_mut::<ColorImage>(),
                &mut ti.get_mut::<DepthImage>()
            )
        }
    );
}

/// Picks the regions worth drawing this frame: compressed, not uniformly
/// empty and at least partly inside the view frustum.
pub fn prepare(
    volume: &Volume,
    regions: &Regions,
    perframe: &Perframe,
    specs: &mut RaytraceSpecs,
    indirect: &mut WriteIndirectBuffer
)
{
    let view_projection = perframe.camera.projection * perframe.camera.view;

    specs.slots.clear();
    specs.slots.extend(
        volume
            .cells()
            .filter_map(|(_, cell)| cell.region)
            .filter(|slot| {
                let region = regions.get(*slot);
                let empty = region.is_uniform()
                    && !Voxel::material_of_raw(region.uniform_value).is_visible;
                let (min, max) = region.get_bounds();

                region.is_compressed() && !empty && !outside_frustum(&view_projection, min, max)
            })
    );

    indirect.0 = DrawIndirect::cubes(specs.slots.len() as u32);
}

fn box_corners(min: [f32; 3], max: [f32; 3]) -> [glm::Vec4; 8]
{
    std::array::from_fn(|i| {
        let pick = |axis: usize| if ((i >> axis) & 1) == 1 { max[axis] } else { min[axis] };

        glm::vec4(pick(0), pick(1), pick(2), 1.0)
    })
}

/// True when every corner lies beyond the same clip plane.
fn outside_frustum(view_projection: &glm::Mat4, min: [f32; 3], max: [f32; 3]) -> bool
{
    let clip = box_corners(min, max).map(|c| view_projection * c);

    let planes: [fn(&glm::Vec4) -> bool; 6] = [
        |c| c.x < -c.w,
        |c| c.x > c.w,
        |c| c.y < -c.w,
        |c| c.y > c.w,
        |c| c.z < 0.0,
        |c| c.z > c.w
    ];

    planes.iter().any(|outside| clip.iter().all(outside))
}

struct Ray
{
    direction: glm::Vec3,
    /// Distance along `direction` to the near plane.
    t_near:    f32
}

struct Hit
{
    t:     f32,
    axis:  usize,
    step:  i32,
    value: u32
}

struct Fragment
{
    color: [u8; 4],
    depth: f32
}

struct RayCamera
{
    origin:          glm::Vec3,
    inv_projection:  glm::Mat4,
    transform:       glm::Mat4,
    view_projection: glm::Mat4,
    near:            f32,
    width:           f32,
    height:          f32
}

impl RayCamera
{
    fn new(perframe: &Perframe, width: u32, height: u32) -> RayCamera
    {
        let camera = &perframe.camera;

        RayCamera {
            origin:          perframe.get_camera_position(),
            inv_projection:  camera.inv_projection,
            transform:       camera.transform,
            view_projection: camera.projection * camera.view,
            near:            camera.projection[(2, 3)] / camera.projection[(2, 2)],
            width:           width as f32,
            height:          height as f32
        }
    }

    fn ray(&self, px: u32, py: u32) -> Ray
    {
        let ndc_x = (px as f32 + 0.5) / self.width * 2.0 - 1.0;
        let ndc_y = 1.0 - (py as f32 + 0.5) / self.height * 2.0;

        let far = self.inv_projection * glm::vec4(ndc_x, ndc_y, 1.0, 1.0);
        let view_direction = glm::normalize(&(far.xyz() / far.w));
        let world = self.transform * glm::vec4(view_direction.x, view_direction.y, view_direction.z, 0.0);

        Ray {
            direction: glm::normalize(&world.xyz()),
            t_near:    self.near / (-view_direction.z).max(f32::EPSILON)
        }
    }

    fn depth_of(&self, point: glm::Vec3) -> f32
    {
        let clip = self.view_projection * glm::vec4(point.x, point.y, point.z, 1.0);

        clip.z / clip.w
    }

    /// Pixel rect `[x0, y0, x1, y1)` covered by a box, or the whole screen if
    /// a corner is behind the camera.
    fn screen_rect(&self, min: [f32; 3], max: [f32; 3]) -> Option<[u32; 4]>
    {
        let mut lo = [f32::MAX; 2];
        let mut hi = [f32::MIN; 2];

        for corner in box_corners(min, max)
        {
            let clip = self.view_projection * corner;

            if clip.w <= f32::EPSILON
            {
                return Some([0, 0, self.width as u32, self.height as u32]);
            }

            let screen = [
                (clip.x / clip.w * 0.5 + 0.5) * self.width,
                (0.5 - clip.y / clip.w * 0.5) * self.height
            ];

            for axis in 0..2
            {
                lo[axis] = lo[axis].min(screen[axis]);
                hi[axis] = hi[axis].max(screen[axis]);
            }
        }

        let x0 = lo[0].floor().clamp(0.0, self.width) as u32;
        let y0 = lo[1].floor().clamp(0.0, self.height) as u32;
        let x1 = hi[0].ceil().clamp(0.0, self.width) as u32;
        let y1 = hi[1].ceil().clamp(0.0, self.height) as u32;

        (x0 < x1 && y0 < y1).then_some([x0, y0, x1, y1])
    }
}

struct Instance<'a>
{
    min:     glm::Vec3,
    max:     glm::Vec3,
    payload: PayloadView<'a>,
    rect:    [u32; 4]
}

/// Slab test. Returns `(t_enter, entry axis, t_exit)`.
fn intersect_box(origin: &glm::Vec3, direction: &glm::Vec3, min: &glm::Vec3, max: &glm::Vec3) -> Option<(f32, usize, f32)>
{
    let mut enter = f32::NEG_INFINITY;
    let mut enter_axis = 0;
    let mut exit = f32::INFINITY;

    for axis in 0..3
    {
        let inv = 1.0 / direction[axis];
        let mut t0 = (min[axis] - origin[axis]) * inv;
        let mut t1 = (max[axis] - origin[axis]) * inv;

        if t0 > t1
        {
            std::mem::swap(&mut t0, &mut t1);
        }

        if t0 > enter
        {
            enter = t0;
            enter_axis = axis;
        }

        exit = exit.min(t1);
    }

    (enter <= exit && exit > 0.0).then_some((enter, enter_axis, exit))
}

/// Walks the chunk's voxel grid from `start` until a visible voxel or the
/// chunk boundary.
fn march(instance: &Instance, origin: &glm::Vec3, direction: &glm::Vec3, start: f32, start_axis: usize) -> Option<Hit>
{
    let axis_len = CHUNK_AXIS as i32;
    let local = origin + direction * start - instance.min;

    let mut cell = [0i32; 3];
    let mut step = [0i32; 3];
    let mut t_max = [f32::INFINITY; 3];
    let mut t_delta = [f32::INFINITY; 3];

    for a in 0..3
    {
        cell[a] = (local[a].floor() as i32).clamp(0, axis_len - 1);
        step[a] = if direction[a] < 0.0 { -1 } else { 1 };

        if direction[a] != 0.0
        {
            let boundary = (if direction[a] > 0.0 { cell[a] + 1 } else { cell[a] }) as f32;

            t_max[a] = ((boundary - local[a]) / direction[a]).max(0.0);
            t_delta[a] = (1.0 / direction[a]).abs();
        }
    }

    let mut t = 0.0;
    let mut axis = start_axis;

    for _ in 0..CHUNK_AXIS * 3 + 1
    {
        let [x, y, z] = cell.map(|c| c as usize);
        let value = instance.payload.get(x, y, z);

        if Voxel::material_of_raw(value).is_visible
        {
            return Some(Hit {
                t: start + t,
                axis,
                step: step[axis],
                value
            });
        }

        axis = if t_max[0] < t_max[1]
        {
            if t_max[0] < t_max[2] { 0 } else { 2 }
        }
        else if t_max[1] < t_max[2]
        {
            1
        }
        else
        {
            2
        };

        t = t_max[axis];
        t_max[axis] += t_delta[axis];
        cell[axis] += step[axis];

        if !(0..axis_len).contains(&cell[axis])
        {
            return None;
        }
    }

    None
}

fn shade(hit: &Hit) -> [u8; 4]
{
    let material = Voxel::material_of_raw(hit.value);

    let factor = match (hit.axis, hit.step)
    {
        (2, s) if s < 0 => 1.0,
        (2, _) => 0.5,
        (0, _) => 0.8,
        _ => 0.65
    };

    let scale = |c: u8| (c as f32 * factor).round() as u8;

    [
        scale(material.srgb_r),
        scale(material.srgb_g),
        scale(material.srgb_b),
        255
    ]
}

fn trace(face: BoxFace, camera: &RayCamera, ray: &Ray, instance: &Instance) -> Option<Fragment>
{
    let origin = camera.origin;
    let direction = ray.direction;
    let (enter, enter_axis, exit) = intersect_box(&origin, &direction, &instance.min, &instance.max)?;

    let (start, start_axis) = match face
    {
        BoxFace::Entry if enter >= ray.t_near => (enter, enter_axis),
        BoxFace::Exit if enter < ray.t_near && exit > ray.t_near =>
        {
            let dominant = (0..3)
                .max_by(|a, b| direction[*a].abs().total_cmp(&direction[*b].abs()))
                .unwrap_or(2);

            (ray.t_near, dominant)
        }
        _ => return None
    };

    let hit = march(instance, &origin, &direction, start, start_axis)?;

    Some(Fragment {
        color: shade(&hit),
        depth: camera.depth_of(origin + direction * hit.t)
    })
}

/// Rasterizes the bounding box of every prepared region and marches the
/// chunk's voxels behind each covered pixel.
#[allow(clippy::too_many_arguments)]
pub fn draw(
    pipeline: &RasterPipeline,
    indirect: DrawIndirect,
    specs: &RaytraceSpecs,
    regions: &Regions,
    heap: &Heap,
    perframe: &Perframe,
    color: &mut ColorImage,
    depth: &mut DepthImage
)
{
    if pipeline.get_load_op() == LoadOp::Clear
    {
        color.clear(FrameImages::CLEAR_COLOR);
        depth.clear(FrameImages::CLEAR_DEPTH);
    }

    if indirect.instance_count == 0
    {
        return;
    }

    assert_eq!(indirect.vertex_count, CUBE_VERTEX_COUNT);
    assert_eq!(color.get_extent(), depth.get_extent());

    let (width, height) = color.get_extent();
    let camera = RayCamera::new(perframe, width, height);
    let first = indirect.first_instance as usize;

    let instances: Vec<Instance> = specs.slots[first..first + indirect.instance_count as usize]
        .iter()
        .map(|slot| regions.get(*slot))
        .filter(|region| region.is_compressed())
        .filter_map(|region| {
            let (min, max) = region.get_bounds();

            Some(Instance {
                min:     glm::make_vec3(&min),
                max:     glm::make_vec3(&max),
                payload: PayloadView::new(heap.read(region.offset, payload_words(region.palette_len))),
                rect:    camera.screen_rect(min, max)?
            })
        })
        .collect();

    let face = pipeline.get_face();
    let depth_test = pipeline.get_depth_test();

    color
        .texels_mut()
        .par_chunks_mut(width as usize)
        .zip(depth.texels_mut().par_chunks_mut(width as usize))
        .enumerate()
        .for_each(|(py, (colors, depths))| {
            let py = py as u32;

            for instance in instances.iter().filter(|i| i.rect[1] <= py && py < i.rect[3])
            {
                for px in instance.rect[0]..instance.rect[2]
                {
                    let Some(fragment) = trace(face, &camera, &camera.ray(px, py), instance)
                    else
                    {
                        continue;
                    };

                    let px = px as usize;
                    let passed = match depth_test.compare
                    {
                        CompareOp::Less => fragment.depth < depths[px],
                        CompareOp::Always => true
                    };

                    if passed
                    {
                        colors[px] = fragment.color;

                        if depth_test.write
                        {
                            depths[px] = fragment.depth;
                        }
                    }
                }
            }
        });
}
