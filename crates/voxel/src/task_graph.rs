use std::borrow::Cow;
use std::cell::{Ref, RefMut};
use std::collections::HashMap;

use crate::{FrameResource, FrameResources, TaskResource};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access
{
    TransferRead,
    TransferWrite,
    ComputeRead,
    ComputeWrite,
    ComputeReadWrite,
    ShaderRead,
    IndirectRead,
    ColorAttachment,
    DepthAttachment
}

impl Access
{
    pub fn reads(self) -> bool
    {
        !matches!(self, Access::TransferWrite | Access::ComputeWrite)
    }

    pub fn writes(self) -> bool
    {
        matches!(
            self,
            Access::TransferWrite
                | Access::ComputeWrite
                | Access::ComputeReadWrite
                | Access::ColorAttachment
                | Access::DepthAttachment
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskUse
{
    pub resource: TaskResource,
    pub access:   Access
}

impl TaskUse
{
    pub fn of<T: FrameResource>(access: Access) -> TaskUse
    {
        TaskUse {
            resource: T::RESOURCE,
            access
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hazard
{
    ReadAfterWrite,
    WriteAfterRead,
    WriteAfterWrite
}

/// Ordering requirement in front of a task: `dst_access` must wait for
/// `src_task`'s `src_access` to finish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Barrier
{
    pub resource:   TaskResource,
    pub hazard:     Hazard,
    pub src_task:   usize,
    pub src_access: Access,
    pub dst_access: Access
}

pub struct TaskInterface<'a>
{
    task_name: &'a str,
    uses:      &'a [TaskUse],
    resources: &'a FrameResources
}

impl<'a> TaskInterface<'a>
{
    pub fn get_access<T: FrameResource>(&self) -> Option<Access>
    {
        self.uses
            .iter()
            .find(|u| u.resource == T::RESOURCE)
            .map(|u| u.access)
    }

    /// # Panics
    /// If the task did not declare `T`.
    pub fn get<T: FrameResource>(&self) -> Ref<'a, T>
    {
        if self.get_access::<T>().is_none()
        {
            panic!(
                "Task `{}` accessed {:?} without declaring it",
                self.task_name,
                T::RESOURCE
            );
        }

        T::cell(self.resources).borrow()
    }

    /// # Panics
    /// If the task did not declare `T` with a writing access.
    pub fn get_mut<T: FrameResource>(&self) -> RefMut<'a, T>
    {
        match self.get_access::<T>()
        {
            Some(access) if access.writes() => T::cell(self.resources).borrow_mut(),
            Some(access) =>
            {
                panic!(
                    "Task `{}` wrote {:?} which it declared as {:?}",
                    self.task_name,
                    T::RESOURCE,
                    access
                )
            }
            None =>
            {
                panic!(
                    "Task `{}` accessed {:?} without declaring it",
                    self.task_name,
                    T::RESOURCE
                )
            }
        }
    }
}

type TaskCallback = Box<dyn FnMut(&TaskInterface)>;

struct Task
{
    name:     Cow<'static, str>,
    uses:     Vec<TaskUse>,
    callback: TaskCallback
}

#[derive(Default)]
struct ResourceState
{
    last_write:        Option<(usize, Access)>,
    reads_since_write: Vec<(usize, Access)>,
    // Accesses the last write has already been made visible to.
    visible_to:        Vec<Access>
}

pub struct TaskGraph
{
    name:       Cow<'static, str>,
    tasks:      Vec<Task>,
    barriers:   Vec<Vec<Barrier>>,
    completed:  bool,
    executions: u64
}

impl std::fmt::Debug for TaskGraph
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("TaskGraph")
            .field("name", &self.name)
            .field("tasks", &self.get_task_names().collect::<Vec<_>>())
            .field("completed", &self.completed)
            .finish()
    }
}

impl TaskGraph
{
    pub fn new(name: impl Into<Cow<'static, str>>) -> TaskGraph
    {
        TaskGraph {
            name:       name.into(),
            tasks:      Vec::new(),
            barriers:   Vec::new(),
            completed:  false,
            executions: 0
        }
    }

    /// # Panics
    /// If the graph is already complete or a resource is declared twice.
    pub fn add_task(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        uses: impl IntoIterator<Item = TaskUse>,
        callback: impl FnMut(&TaskInterface) + 'static
    )
    {
        let name = name.into();
        let uses: Vec<TaskUse> = uses.into_iter().collect();

        assert!(!self.completed, "Adding task `{name}` to completed graph `{}`", self.name);

        for (i, u) in uses.iter().enumerate()
        {
            assert!(
                uses[..i].iter().all(|o| o.resource != u.resource),
                "Task `{name}` declares {:?} twice",
                u.resource
            );
        }

        self.tasks.push(Task {
            name,
            uses,
            callback: Box::new(callback)
        });
    }

    pub fn complete(&mut self)
    {
        let mut states: HashMap<TaskResource, ResourceState> = HashMap::new();

        self.barriers = self
            .tasks
            .iter()
            .enumerate()
            .map(|(task_idx, task)| {
                task.uses
                    .iter()
                    .flat_map(|u| {
                        let state = states.entry(u.resource).or_default();
                        let hazards = Self::hazards_for(state, u.access);

                        if u.access.writes()
                        {
                            state.last_write = Some((task_idx, u.access));
                            state.reads_since_write.clear();
                            state.visible_to.clear();
                        }
                        else
                        {
                            state.reads_since_write.push((task_idx, u.access));
                        }

                        hazards
                            .into_iter()
                            .map(move |(hazard, (src_task, src_access))| Barrier {
                                resource: u.resource,
                                hazard,
                                src_task,
                                src_access,
                                dst_access: u.access
                            })
                    })
                    .collect()
            })
            .collect();

        self.completed = true;

        log::debug!(
            "Completed task graph `{}` with {} tasks and {} barriers",
            self.name,
            self.tasks.len(),
            self.barriers.iter().map(Vec::len).sum::<usize>()
        );
    }

    fn hazards_for(state: &mut ResourceState, access: Access) -> Vec<(Hazard, (usize, Access))>
    {
        let mut hazards = Vec::new();

        if access.writes()
        {
            if let Some(reader) = state.reads_since_write.last()
            {
                hazards.push((Hazard::WriteAfterRead, *reader));
            }
            else if let (Some(writer), false) = (state.last_write, access.reads())
            {
                hazards.push((Hazard::WriteAfterWrite, writer));
            }
        }

        if access.reads()
        {
            if let Some(writer) = state.last_write
            {
                if !state.visible_to.contains(&access)
                {
                    state.visible_to.push(access);
                    hazards.push((Hazard::ReadAfterWrite, writer));
                }
            }
        }

        hazards
    }

    /// # Panics
    /// If the graph has not been completed.
    pub fn execute(&mut self, resources: &FrameResources)
    {
        assert!(self.completed, "Executing incomplete task graph `{}`", self.name);

        for (task, barriers) in self.tasks.iter_mut().zip(&self.barriers)
        {
            for b in barriers
            {
                log::trace!(
                    "{:?} barrier on {:?}: {:?} -> {:?} before `{}`",
                    b.hazard,
                    b.resource,
                    b.src_access,
                    b.dst_access,
                    task.name
                );
            }

            log::trace!("Executing task `{}`", task.name);

            let interface = TaskInterface {
                task_name: &task.name,
                uses: &task.uses,
                resources
            };

            (task.callback)(&interface);
        }

        self.executions += 1;
    }

    pub fn get_executions(&self) -> u64
    {
        self.executions
    }

    pub fn get_task_names(&self) -> impl Iterator<Item = &str>
    {
        self.tasks.iter().map(|t| &*t.name)
    }

    pub fn get_barriers_before(&self, task_name: &str) -> &[Barrier]
    {
        assert!(self.completed, "Task graph `{}` is not complete", self.name);

        self.tasks
            .iter()
            .position(|t| t.name == task_name)
            .map(|i| &self.barriers[i][..])
            .unwrap_or(&[])
    }
}
