use crate::backend::{DeviceResource, GxBackend, ProgramId, StageSource, UniformLocation};
use crate::cache::{LoadTimer, Loader, Resource};
use crate::errors::{ShaderError, ShaderStage};

use super::{
    preprocess, ShaderSourceProvider, MODEL_VIEW_MATRIX, MODEL_VIEW_PROJECTION_MATRIX, PARAMS,
    PROJECTION_MATRIX,
};

/// Locations of the uniforms the engine writes itself. Missing members are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WellKnownUniforms {
    pub model_view: Option<UniformLocation>,
    pub model_view_projection: Option<UniformLocation>,
    pub projection: Option<UniformLocation>,
    pub params: Option<UniformLocation>,
}

impl WellKnownUniforms {
    fn resolve(backend: &dyn GxBackend, program: ProgramId) -> Self {
        Self {
            model_view: backend.uniform_location(program, MODEL_VIEW_MATRIX),
            model_view_projection: backend.uniform_location(program, MODEL_VIEW_PROJECTION_MATRIX),
            projection: backend.uniform_location(program, PROJECTION_MATRIX),
            params: backend.uniform_location(program, PARAMS),
        }
    }

    pub fn has_matrices(&self) -> bool {
        self.model_view.is_some() || self.model_view_projection.is_some() || self.projection.is_some()
    }
}

/// Vertex and fragment source names recorded for reloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderArgs {
    pub vs: String,
    pub ps: String,
}

impl ShaderArgs {
    /// `name.vs` and `name.ps`.
    pub fn from_name(name: &str) -> Self {
        Self {
            vs: format!("{}.vs", name),
            ps: format!("{}.ps", name),
        }
    }

    pub fn uses(&self, file: &str) -> bool {
        self.vs == file || self.ps == file
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShaderProgram {
    pub name: String,
    pub vs: String,
    pub ps: String,
    /// `None` when compiling or linking failed.
    pub program: Option<ProgramId>,
    pub uniforms: WellKnownUniforms,
    /// Incremented on every (re)load, successful or not.
    pub version: u32,
    pub error_messages: Vec<String>,
    pub included_files: Vec<String>,
}

impl ShaderProgram {
    pub fn is_valid(&self) -> bool {
        self.program.is_some()
    }
}

impl Resource for ShaderProgram {
    type Key = String;
    type Args = ShaderArgs;
}

/// Compute source name and work-group size recorded for reloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComputeArgs {
    pub cs: String,
    pub local_size: [u32; 3],
}

impl ComputeArgs {
    /// `name.cs` with the given work-group size.
    pub fn from_name(name: &str, local_size: [u32; 3]) -> Self {
        Self {
            cs: format!("{}.cs", name),
            local_size,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComputeProgram {
    pub name: String,
    pub cs: String,
    pub program: Option<ProgramId>,
    pub local_size: [u32; 3],
    pub uniforms: WellKnownUniforms,
    pub version: u32,
    pub error_messages: Vec<String>,
    pub included_files: Vec<String>,
}

impl ComputeProgram {
    pub fn is_valid(&self) -> bool {
        self.program.is_some()
    }

    /// Number of work groups needed to cover `size` invocations per axis.
    pub fn group_count(&self, size: [u32; 3]) -> [u32; 3] {
        let mut groups = [1; 3];
        for axis in 0..3 {
            groups[axis] = size[axis].div_ceil(self.local_size[axis].max(1)).max(1);
        }
        groups
    }
}

impl Resource for ComputeProgram {
    type Key = String;
    type Args = ComputeArgs;
}

/// Compiles programs for both shader caches.
pub struct ShaderLoader<'a> {
    pub backend: &'a mut dyn GxBackend,
    pub sources: &'a dyn ShaderSourceProvider,
}

impl ShaderLoader<'_> {
    fn stage_text(
        &self,
        file: &str,
        preamble: &str,
        included_files: &mut Vec<String>,
    ) -> Result<String, ShaderError> {
        let preprocessed = preprocess(file, self.sources)?;
        for include in preprocessed.included_files {
            if !included_files.contains(&include) {
                included_files.push(include);
            }
        }
        Ok(format!("{}{}", preamble, preprocessed.text))
    }

    fn build_program(
        &mut self,
        name: &str,
        args: &ShaderArgs,
        included_files: &mut Vec<String>,
    ) -> Result<ProgramId, ShaderError> {
        let preamble = self.backend.capabilities().preamble.clone();
        let vs = self.stage_text(&args.vs, &preamble, included_files)?;
        let ps = self.stage_text(&args.ps, &preamble, included_files)?;
        self.backend.create_program(
            name,
            StageSource {
                file: &args.vs,
                text: &vs,
            },
            StageSource {
                file: &args.ps,
                text: &ps,
            },
        )
    }

    fn build_compute(
        &mut self,
        name: &str,
        args: &ComputeArgs,
        included_files: &mut Vec<String>,
    ) -> Result<ProgramId, ShaderError> {
        let capabilities = self.backend.capabilities();
        if !capabilities.compute {
            return Err(ShaderError::Unsupported {
                stage: ShaderStage::Compute,
                backend: capabilities.name,
            });
        }
        let preamble = capabilities.preamble_for_compute(args.local_size);
        let cs = self.stage_text(&args.cs, &preamble, included_files)?;
        self.backend.create_compute_program(
            name,
            StageSource {
                file: &args.cs,
                text: &cs,
            },
        )
    }
}

impl Loader<ShaderProgram> for ShaderLoader<'_> {
    fn load(&mut self, name: &String, args: &ShaderArgs) -> ShaderProgram {
        let _timer = LoadTimer::new(name);
        let mut shader = ShaderProgram {
            name: name.clone(),
            vs: args.vs.clone(),
            ps: args.ps.clone(),
            version: 1,
            ..Default::default()
        };

        match self.build_program(name, args, &mut shader.included_files) {
            Ok(program) => {
                shader.uniforms = WellKnownUniforms::resolve(&*self.backend, program);
                shader.program = Some(program);
                log::info!("loaded shader {} ({}, {})", name, args.vs, args.ps);
            }
            Err(error) => {
                log::error!("failed to load shader {}: {}", name, error);
                shader.error_messages.push(error.to_string());
            }
        }
        shader
    }

    fn release(&mut self, shader: &mut ShaderProgram) {
        if let Some(program) = shader.program.take() {
            self.backend.release(DeviceResource::Program(program));
        }
    }

    fn reload(&mut self, name: &String, args: &ShaderArgs, shader: &mut ShaderProgram) {
        let version = shader.version;
        Loader::<ShaderProgram>::release(self, shader);
        *shader = Loader::<ShaderProgram>::load(self, name, args);
        shader.version = version + 1;
    }
}

impl Loader<ComputeProgram> for ShaderLoader<'_> {
    fn load(&mut self, name: &String, args: &ComputeArgs) -> ComputeProgram {
        let _timer = LoadTimer::new(name);
        let mut shader = ComputeProgram {
            name: name.clone(),
            cs: args.cs.clone(),
            local_size: args.local_size,
            version: 1,
            ..Default::default()
        };

        match self.build_compute(name, args, &mut shader.included_files) {
            Ok(program) => {
                shader.uniforms = WellKnownUniforms::resolve(&*self.backend, program);
                shader.program = Some(program);
                log::info!("loaded compute shader {} ({})", name, args.cs);
            }
            Err(error) => {
                log::error!("failed to load compute shader {}: {}", name, error);
                shader.error_messages.push(error.to_string());
            }
        }
        shader
    }

    fn release(&mut self, shader: &mut ComputeProgram) {
        if let Some(program) = shader.program.take() {
            self.backend.release(DeviceResource::Program(program));
        }
    }

    fn reload(&mut self, name: &String, args: &ComputeArgs, shader: &mut ComputeProgram) {
        let version = shader.version;
        Loader::<ComputeProgram>::release(self, shader);
        *shader = Loader::<ComputeProgram>::load(self, name, args);
        shader.version = version + 1;
    }
}
