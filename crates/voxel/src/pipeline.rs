use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{uniformity_block_size, uniformity_invoke_size, UNIFORMITY_LEVELS};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderFile
{
    Queue,
    BaseTerrain,
    Uniformity,
    Compressor,
    Raytrace
}

impl ShaderFile
{
    pub fn get_file_name(&self) -> &'static str
    {
        match self
        {
            ShaderFile::Queue => "queue.glsl",
            ShaderFile::BaseTerrain => "base_terrain.glsl",
            ShaderFile::Uniformity => "uniformity.glsl",
            ShaderFile::Compressor => "compressor.glsl",
            ShaderFile::Raytrace => "raytrace.glsl"
        }
    }

    fn get_known_defines(&self) -> &'static [&'static str]
    {
        match self
        {
            ShaderFile::Queue | ShaderFile::BaseTerrain => &[],
            ShaderFile::Uniformity => &["UNIFORMITY_SIZE", "UNIFORMITY_INVOKE_SIZE"],
            ShaderFile::Compressor => &COMPRESSOR_VARIANTS,
            ShaderFile::Raytrace =>
            {
                &[
                    "RAYTRACE_PREPARE",
                    "RAYTRACE_VERT",
                    "RAYTRACE_FRONT",
                    "RAYTRACE_FRAG"
                ]
            }
        }
    }
}

const COMPRESSOR_VARIANTS: [&str; 3] = [
    "COMPRESSOR_PALETTIZE",
    "COMPRESSOR_ALLOCATE",
    "COMPRESSOR_WRITE"
];
const RAYTRACE_VARIANTS: [&str; 3] = ["RAYTRACE_PREPARE", "RAYTRACE_VERT", "RAYTRACE_FRAG"];

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderDefine
{
    pub name:  Cow<'static, str>,
    pub value: Option<u32>
}

impl ShaderDefine
{
    pub fn flag(name: impl Into<Cow<'static, str>>) -> ShaderDefine
    {
        ShaderDefine {
            name:  name.into(),
            value: None
        }
    }

    pub fn valued(name: impl Into<Cow<'static, str>>, value: u32) -> ShaderDefine
    {
        ShaderDefine {
            name:  name.into(),
            value: Some(value)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShaderCompileInfo
{
    pub file:    ShaderFile,
    pub defines: Vec<ShaderDefine>
}

impl ShaderCompileInfo
{
    pub fn new(file: ShaderFile, defines: impl IntoIterator<Item = ShaderDefine>) -> Self
    {
        let mut defines: Vec<ShaderDefine> = defines.into_iter().collect();

        defines.sort();

        ShaderCompileInfo {
            file,
            defines
        }
    }

    fn get(&self, name: &str) -> Option<&ShaderDefine>
    {
        self.defines.iter().find(|d| d.name == name)
    }

    fn validate_names(&self) -> Result<(), PipelineError>
    {
        let known = self.file.get_known_defines();

        for (i, define) in self.defines.iter().enumerate()
        {
            if !known.contains(&&*define.name)
            {
                return Err(PipelineError::UnknownDefine {
                    file:   self.file.get_file_name(),
                    define: define.name.to_string()
                });
            }

            if self.defines[..i].iter().any(|d| d.name == define.name)
            {
                return Err(PipelineError::DuplicateDefine {
                    file:   self.file.get_file_name(),
                    define: define.name.to_string()
                });
            }
        }

        Ok(())
    }

    fn require_value(&self, name: &'static str) -> Result<u32, PipelineError>
    {
        match self.get(name)
        {
            Some(ShaderDefine {
                value: Some(v), ..
            }) => Ok(*v),
            Some(ShaderDefine {
                value: None, ..
            }) => Err(self.invalid_value(name, None)),
            None =>
            {
                Err(PipelineError::MissingDefine {
                    file:   self.file.get_file_name(),
                    define: name
                })
            }
        }
    }

    /// The single variant flag out of `variants` that is set.
    fn single_variant(&self, variants: &'static [&'static str]) -> Result<&'static str, PipelineError>
    {
        let set: Vec<&'static str> = variants
            .iter()
            .copied()
            .filter(|v| self.get(v).is_some())
            .collect();

        match set[..]
        {
            [variant] =>
            {
                match self.get(variant).and_then(|d| d.value)
                {
                    None => Ok(variant),
                    value => Err(self.invalid_value(variant, value))
                }
            }
            _ =>
            {
                Err(PipelineError::AmbiguousVariant {
                    file:     self.file.get_file_name(),
                    expected: variants,
                    found:    set.len()
                })
            }
        }
    }

    fn invalid_value(&self, define: &str, value: Option<u32>) -> PipelineError
    {
        PipelineError::InvalidDefineValue {
            file: self.file.get_file_name(),
            define: define.to_string(),
            value
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError
{
    #[error("{file}: unknown define `{define}`")]
    UnknownDefine
    {
        file: &'static str, define: String
    },
    #[error("{file}: define `{define}` given more than once")]
    DuplicateDefine
    {
        file: &'static str, define: String
    },
    #[error("{file}: missing define `{define}`")]
    MissingDefine
    {
        file: &'static str, define: &'static str
    },
    #[error("{file}: define `{define}` has invalid value {value:?}")]
    InvalidDefineValue
    {
        file:   &'static str,
        define: String,
        value:  Option<u32>
    },
    #[error("{file}: expected exactly one of {expected:?}, found {found}")]
    AmbiguousVariant
    {
        file:     &'static str,
        expected: &'static [&'static str],
        found:    usize
    },
    #[error("{file} compiled with {variant} cannot be used as a {stage} shader")]
    WrongStage
    {
        file:    &'static str,
        variant: &'static str,
        stage:   &'static str
    },
    #[error("pipeline `{pipeline}`: cull mode {cull_mode:?} does not match its vertex variant")]
    CullModeMismatch
    {
        pipeline: String, cull_mode: CullMode
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CullMode
{
    None,
    Front,
    Back
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp
{
    Less,
    Always
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadOp
{
    Clear,
    Load
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthTest
{
    pub write:   bool,
    pub compare: CompareOp
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComputePipelineInfo
{
    pub name:   Cow<'static, str>,
    pub shader: ShaderCompileInfo
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RasterPipelineInfo
{
    pub name:       Cow<'static, str>,
    pub vertex:     ShaderCompileInfo,
    pub fragment:   ShaderCompileInfo,
    pub cull_mode:  CullMode,
    pub depth_test: DepthTest,
    pub load_op:    LoadOp
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompressorPhase
{
    Palettize,
    Allocate,
    Write
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComputeKernel
{
    Queue,
    Brush,
    Uniformity
    {
        level: usize
    },
    Compressor(CompressorPhase),
    RaytracePrepare
}

#[derive(Debug)]
pub struct ComputePipeline
{
    name:   String,
    kernel: ComputeKernel
}

impl ComputePipeline
{
    pub fn get_name(&self) -> &str
    {
        &self.name
    }

    pub fn get_kernel(&self) -> ComputeKernel
    {
        self.kernel
    }
}

/// Which face of a region box a raster pipeline's fragments come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoxFace
{
    /// Front faces, where the view ray enters the box.
    Entry,
    /// Back faces, where the view ray leaves the box.
    Exit
}

#[derive(Debug)]
pub struct RasterPipeline
{
    name:       String,
    face:       BoxFace,
    depth_test: DepthTest,
    load_op:    LoadOp
}

impl RasterPipeline
{
    pub fn get_name(&self) -> &str
    {
        &self.name
    }

    pub fn get_face(&self) -> BoxFace
    {
        self.face
    }

    pub fn get_depth_test(&self) -> DepthTest
    {
        self.depth_test
    }

    pub fn get_load_op(&self) -> LoadOp
    {
        self.load_op
    }
}

/// Compiles pipelines from a shader file plus defines, caching by the full
/// compile description.
#[derive(Debug, Default)]
pub struct PipelineManager
{
    compute_cache: HashMap<ComputePipelineInfo, Arc<ComputePipeline>>,
    raster_cache:  HashMap<RasterPipelineInfo, Arc<RasterPipeline>>
}

impl PipelineManager
{
    pub fn new() -> PipelineManager
    {
        PipelineManager::default()
    }

    pub fn get_compiled_count(&self) -> usize
    {
        self.compute_cache.len() + self.raster_cache.len()
    }

    pub fn add_compute_pipeline(
        &mut self,
        info: ComputePipelineInfo
    ) -> Result<Arc<ComputePipeline>, PipelineError>
    {
        if let Some(pipeline) = self.compute_cache.get(&info)
        {
            return Ok(pipeline.clone());
        }

        let _timer = util::Timer::new(format!("Compiling compute pipeline {}", info.name));

        let kernel = compile_compute(&info.shader)?;
        let pipeline = Arc::new(ComputePipeline {
            name: info.name.to_string(),
            kernel
        });

        log::debug!("Compiled {} as {:?}", info.shader.file.get_file_name(), kernel);

        self.compute_cache.insert(info, pipeline.clone());

        Ok(pipeline)
    }

    pub fn add_raster_pipeline(
        &mut self,
        info: RasterPipelineInfo
    ) -> Result<Arc<RasterPipeline>, PipelineError>
    {
        if let Some(pipeline) = self.raster_cache.get(&info)
        {
            return Ok(pipeline.clone());
        }

        let _timer = util::Timer::new(format!("Compiling raster pipeline {}", info.name));

        let face = compile_vertex(&info.vertex)?;
        compile_fragment(&info.fragment)?;

        let expected_cull = match face
        {
            BoxFace::Entry => CullMode::Back,
            BoxFace::Exit => CullMode::Front
        };

        if info.cull_mode != expected_cull
        {
            return Err(PipelineError::CullModeMismatch {
                pipeline:  info.name.to_string(),
                cull_mode: info.cull_mode
            });
        }

        let pipeline = Arc::new(RasterPipeline {
            name: info.name.to_string(),
            face,
            depth_test: info.depth_test,
            load_op: info.load_op
        });

        self.raster_cache.insert(info, pipeline.clone());

        Ok(pipeline)
    }
}

fn compile_compute(shader: &ShaderCompileInfo) -> Result<ComputeKernel, PipelineError>
{
    shader.validate_names()?;

    match shader.file
    {
        ShaderFile::Queue => Ok(ComputeKernel::Queue),
        ShaderFile::BaseTerrain => Ok(ComputeKernel::Brush),
        ShaderFile::Uniformity =>
        {
            let size = shader.require_value("UNIFORMITY_SIZE")?;
            let invoke = shader.require_value("UNIFORMITY_INVOKE_SIZE")?;

            let level = (0..UNIFORMITY_LEVELS)
                .find(|l| uniformity_block_size(*l) == size)
                .ok_or_else(|| shader.invalid_value("UNIFORMITY_SIZE", Some(size)))?;

            if invoke != uniformity_invoke_size(level)
            {
                return Err(shader.invalid_value("UNIFORMITY_INVOKE_SIZE", Some(invoke)));
            }

            Ok(ComputeKernel::Uniformity {
                level
            })
        }
        ShaderFile::Compressor =>
        {
            let phase = match shader.single_variant(&COMPRESSOR_VARIANTS)?
            {
                "COMPRESSOR_PALETTIZE" => CompressorPhase::Palettize,
                "COMPRESSOR_ALLOCATE" => CompressorPhase::Allocate,
                _ => CompressorPhase::Write
            };

            Ok(ComputeKernel::Compressor(phase))
        }
        ShaderFile::Raytrace =>
        {
            match shader.single_variant(&RAYTRACE_VARIANTS)?
            {
                "RAYTRACE_PREPARE" if shader.get("RAYTRACE_FRONT").is_none() =>
                {
                    Ok(ComputeKernel::RaytracePrepare)
                }
                "RAYTRACE_PREPARE" => Err(PipelineError::UnknownDefine {
                    file:   shader.file.get_file_name(),
                    define: "RAYTRACE_FRONT".into()
                }),
                variant =>
                {
                    Err(PipelineError::WrongStage {
                        file: shader.file.get_file_name(),
                        variant,
                        stage: "compute"
                    })
                }
            }
        }
    }
}

fn compile_vertex(shader: &ShaderCompileInfo) -> Result<BoxFace, PipelineError>
{
    shader.validate_names()?;

    let variant = match shader.file
    {
        ShaderFile::Raytrace => shader.single_variant(&RAYTRACE_VARIANTS)?,
        file =>
        {
            return Err(PipelineError::WrongStage {
                file:    file.get_file_name(),
                variant: "<none>",
                stage:   "vertex"
            })
        }
    };

    if variant != "RAYTRACE_VERT"
    {
        return Err(PipelineError::WrongStage {
            file: shader.file.get_file_name(),
            variant,
            stage: "vertex"
        });
    }

    match shader.require_value("RAYTRACE_FRONT")?
    {
        1 => Ok(BoxFace::Entry),
        0 => Ok(BoxFace::Exit),
        v => Err(shader.invalid_value("RAYTRACE_FRONT", Some(v)))
    }
}

fn compile_fragment(shader: &ShaderCompileInfo) -> Result<(), PipelineError>
{
    shader.validate_names()?;

    let variant = match shader.file
    {
        ShaderFile::Raytrace => shader.single_variant(&RAYTRACE_VARIANTS)?,
        file =>
        {
            return Err(PipelineError::WrongStage {
                file:    file.get_file_name(),
                variant: "<none>",
                stage:   "fragment"
            })
        }
    };

    if variant != "RAYTRACE_FRAG" || shader.get("RAYTRACE_FRONT").is_some()
    {
        return Err(PipelineError::WrongStage {
            file: shader.file.get_file_name(),
            variant,
            stage: "fragment"
        });
    }

    Ok(())
}

pub fn uniformity_pipeline_info(level: usize) -> ComputePipelineInfo
{
    ComputePipelineInfo {
        name:   format!("Uniformity {}", uniformity_block_size(level)).into(),
        shader: ShaderCompileInfo::new(
            ShaderFile::Uniformity,
            [
                ShaderDefine::valued("UNIFORMITY_SIZE", uniformity_block_size(level)),
                ShaderDefine::valued("UNIFORMITY_INVOKE_SIZE", uniformity_invoke_size(level))
            ]
        )
    }
}

pub fn compressor_pipeline_info(phase: CompressorPhase) -> ComputePipelineInfo
{
    let (name, define) = match phase
    {
        CompressorPhase::Palettize => ("Compressor Palettize", "COMPRESSOR_PALETTIZE"),
        CompressorPhase::Allocate => ("Compressor Allocate", "COMPRESSOR_ALLOCATE"),
        CompressorPhase::Write => ("Compressor Write", "COMPRESSOR_WRITE")
    };

    ComputePipelineInfo {
        name:   name.into(),
        shader: ShaderCompileInfo::new(ShaderFile::Compressor, [ShaderDefine::flag(define)])
    }
}

pub fn raytrace_draw_pipeline_info(face: BoxFace) -> RasterPipelineInfo
{
    let (name, front, cull_mode, depth_test, load_op) = match face
    {
        BoxFace::Entry =>
        {
            (
                "Raytrace Draw Front",
                1,
                CullMode::Back,
                DepthTest {
                    write:   true,
                    compare: CompareOp::Less
                },
                LoadOp::Clear
            )
        }
        BoxFace::Exit =>
        {
            (
                "Raytrace Draw Back",
                0,
                CullMode::Front,
                DepthTest {
                    write:   true,
                    compare: CompareOp::Always
                },
                LoadOp::Load
            )
        }
    };

    RasterPipelineInfo {
        name: name.into(),
        vertex: ShaderCompileInfo::new(
            ShaderFile::Raytrace,
            [
                ShaderDefine::flag("RAYTRACE_VERT"),
                ShaderDefine::valued("RAYTRACE_FRONT", front)
            ]
        ),
        fragment: ShaderCompileInfo::new(ShaderFile::Raytrace, [ShaderDefine::flag("RAYTRACE_FRAG")]),
        cull_mode,
        depth_test,
        load_op
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn uniformity_levels_compile()
    {
        let mut manager = PipelineManager::new();

        for level in 0..UNIFORMITY_LEVELS
        {
            let pipeline = manager
                .add_compute_pipeline(uniformity_pipeline_info(level))
                .unwrap();

            assert_eq!(pipeline.get_kernel(), ComputeKernel::Uniformity {
                level
            });
        }

        assert_eq!(manager.get_compiled_count(), UNIFORMITY_LEVELS);

        manager
            .add_compute_pipeline(uniformity_pipeline_info(2))
            .unwrap();
        assert_eq!(manager.get_compiled_count(), UNIFORMITY_LEVELS);
    }

    #[test]
    fn uniformity_rejects_bad_invoke()
    {
        let info = ComputePipelineInfo {
            name:   "bad".into(),
            shader: ShaderCompileInfo::new(
                ShaderFile::Uniformity,
                [
                    ShaderDefine::valued("UNIFORMITY_SIZE", 16),
                    ShaderDefine::valued("UNIFORMITY_INVOKE_SIZE", 16)
                ]
            )
        };

        assert!(matches!(
            PipelineManager::new().add_compute_pipeline(info),
            Err(PipelineError::InvalidDefineValue { .. })
        ));
    }

    #[test]
    fn compressor_needs_one_phase()
    {
        let mut manager = PipelineManager::new();

        let info = |defines: Vec<ShaderDefine>| ComputePipelineInfo {
            name:   "compressor".into(),
            shader: ShaderCompileInfo::new(ShaderFile::Compressor, defines)
        };

        assert!(matches!(
            manager.add_compute_pipeline(info(vec![])),
            Err(PipelineError::AmbiguousVariant { found: 0, .. })
        ));
        assert!(matches!(
            manager.add_compute_pipeline(info(vec![
                ShaderDefine::flag("COMPRESSOR_ALLOCATE"),
                ShaderDefine::flag("COMPRESSOR_WRITE")
            ])),
            Err(PipelineError::AmbiguousVariant { found: 2, .. })
        ));
        assert!(matches!(
            manager.add_compute_pipeline(info(vec![ShaderDefine::flag("COMPRESSOR_FOO")])),
            Err(PipelineError::UnknownDefine { .. })
        ));
        assert_eq!(
            manager
                .add_compute_pipeline(compressor_pipeline_info(CompressorPhase::Allocate))
                .unwrap()
                .get_kernel(),
            ComputeKernel::Compressor(CompressorPhase::Allocate)
        );
    }

    #[test]
    fn raster_cull_must_match_face()
    {
        let mut manager = PipelineManager::new();

        let front = manager
            .add_raster_pipeline(raytrace_draw_pipeline_info(BoxFace::Entry))
            .unwrap();
        assert_eq!(front.get_face(), BoxFace::Entry);
        assert_eq!(front.get_load_op(), LoadOp::Clear);

        let mut back = raytrace_draw_pipeline_info(BoxFace::Exit);
        back.cull_mode = CullMode::Back;

        assert!(matches!(
            manager.add_raster_pipeline(back),
            Err(PipelineError::CullModeMismatch { .. })
        ));
    }

    #[test]
    fn vertex_variant_in_compute_is_rejected()
    {
        let info = ComputePipelineInfo {
            name:   "raytrace".into(),
            shader: ShaderCompileInfo::new(ShaderFile::Raytrace, [ShaderDefine::flag(
                "RAYTRACE_VERT"
            )])
        };

        assert!(matches!(
            PipelineManager::new().add_compute_pipeline(info),
            Err(PipelineError::WrongStage { .. })
        ));
    }
}
