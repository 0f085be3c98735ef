use std::cell::{Ref, RefCell, RefMut};

use gfx::{ColorImage, DepthImage, FrameImages};

use crate::data::{
    IndirectBuffer,
    Perframe,
    PerframeStaging,
    RaytraceSpecs,
    Regions,
    Specs,
    UniSpecs,
    Volume,
    WriteIndirectBuffer
};
use crate::{Heap, PaletteTable, RendererConfig, UniformityMap, Workspace};

/// Identity of every buffer/image a task can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskResource
{
    Allocator,
    Regions,
    Volume,
    Specs,
    UniSpecs,
    RaytraceSpecs,
    PaletteTable,
    Workspace,
    Uniformity,
    PerframeStaging,
    Perframe,
    WriteIndirect,
    Indirect,
    Color,
    Depth
}

/// A type stored in `FrameResources` under a `TaskResource` identity.
pub trait FrameResource: Sized + 'static
{
    const RESOURCE: TaskResource;

    fn cell(resources: &FrameResources) -> &RefCell<Self>;
}

macro_rules! frame_resources {
    ($($field:ident: $ty:ty => $resource:ident),* $(,)?) => {
        /// Everything the frame tasks read and write. Tasks reach these only
        /// through a `TaskInterface`.
        pub struct FrameResources
        {
            $($field: RefCell<$ty>),*
        }

        $(
            impl FrameResource for $ty
            {
                const RESOURCE: TaskResource = TaskResource::$resource;

                fn cell(resources: &FrameResources) -> &RefCell<Self>
                {
                    &resources.$field
                }
            }
        )*
    };
}

frame_resources! {
    heap: Heap => Allocator,
    regions: Regions => Regions,
    volume: Volume => Volume,
    specs: Specs => Specs,
    unispecs: UniSpecs => UniSpecs,
    raytrace_specs: RaytraceSpecs => RaytraceSpecs,
    palette_table: PaletteTable => PaletteTable,
    workspace: Workspace => Workspace,
    uniformity: UniformityMap => Uniformity,
    perframe_staging: PerframeStaging => PerframeStaging,
    perframe: Perframe => Perframe,
    write_indirect: WriteIndirectBuffer => WriteIndirect,
    indirect: IndirectBuffer => Indirect,
    color: ColorImage => Color,
    depth: DepthImage => Depth
}

impl std::fmt::Debug for FrameResources
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("FrameResources")
            .field("heap", &self.heap)
            .field("regions", &self.regions.borrow().get_live_regions())
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}

impl FrameResources
{
    pub fn new(config: &RendererConfig, width: u32, height: u32) -> FrameResources
    {
        let workspace = Workspace::new(config.workspace_chunks);
        let slots = workspace.get_slot_capacity();
        let FrameImages {
            color,
            depth
        } = FrameImages::new(width, height);

        FrameResources {
            heap:             RefCell::new(Heap::new(config.heap_bytes)),
            regions:          RefCell::new(Regions::new(config.region_capacity)),
            volume:           RefCell::new(Volume::new(config.volume_chunks)),
            specs:            RefCell::new(Specs::default()),
            unispecs:         RefCell::new(UniSpecs::default()),
            raytrace_specs:   RefCell::new(RaytraceSpecs::default()),
            palette_table:    RefCell::new(PaletteTable::new(slots)),
            workspace:        RefCell::new(workspace),
            uniformity:       RefCell::new(UniformityMap::new(config.workspace_chunks)),
            perframe_staging: RefCell::new(PerframeStaging::default()),
            perframe:         RefCell::new(Perframe::default()),
            write_indirect:   RefCell::new(WriteIndirectBuffer::default()),
            indirect:         RefCell::new(IndirectBuffer::default()),
            color:            RefCell::new(color),
            depth:            RefCell::new(depth)
        }
    }

    /// Host access between task graph executions.
    pub fn host<T: FrameResource>(&self) -> Ref<'_, T>
    {
        T::cell(self).borrow()
    }

    pub fn host_mut<T: FrameResource>(&self) -> RefMut<'_, T>
    {
        T::cell(self).borrow_mut()
    }

    pub fn host_write<T: FrameResource>(&self, value: T)
    {
        *T::cell(self).borrow_mut() = value;
    }

    pub fn get_image_extent(&self) -> (u32, u32)
    {
        self.color.borrow().get_extent()
    }

    /// Recreates the color and depth images.
    pub fn resize_images(&self, width: u32, height: u32)
    {
        let FrameImages {
            color,
            depth
        } = FrameImages::new(width, height);

        self.host_write(color);
        self.host_write(depth);
    }
}
