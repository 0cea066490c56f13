//! The render context: one object owning the backend, the batch engine, the matrix stacks, every
//! resource cache and the real-time edit watcher.

use std::any::Any;
use std::path::{Path, PathBuf};

use glam::Mat4;
use walkdir::WalkDir;

use crate::anim::{AnimSheet, AnimSheetLoader};
use crate::backend::{
    DrawCall, FilterMode, GxBackend, ProgramId, SamplerState, TextureId, UniformValue,
};
use crate::cache::{Handle, HashedResourceCache, ResourceVersion};
use crate::config::GxConfig;
use crate::geometry::GxVertex;
use crate::gx::{BatchSink, FlushedBatch, Gx, GxStats, Primitive};
use crate::matrix::{MatrixMode, MatrixStacks, MatrixUniform};
use crate::shader::{
    ComputeArgs, ComputeProgram, FileShaderSource, LayeredShaderSource, ShaderArgs, ShaderLoader,
    ShaderProgram, ShaderSourceRegistry, GENERIC_SHADER,
};
use crate::texture::{Texture, TextureKey, TextureLoader};
use crate::utils::{extension_of, normalize_resource_name, replace_extension, Color};
use crate::watcher::{classify, RealTimeEditWatcher, WatchAction};

/// Work-group size used for compute programs found by [`RenderContext::fill_caches_with_path`].
pub const DEFAULT_LOCAL_SIZE: [u32; 3] = [8, 8, 1];

/// How the texture colour combines with the vertex colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorMode {
    #[default]
    Mul,
    Add,
}

/// Operation applied to the final fragment colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorPost {
    #[default]
    None,
    PremultiplyRgbWithAlpha,
}

/// Texture and colour state applied to every batch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrawState {
    pub texture: Option<TextureId>,
    pub sampler: SamplerState,
    pub color_mode: ColorMode,
    pub color_post: ColorPost,
    pub clamp_color: bool,
}

impl DrawState {
    /// Value of the `params` uniform: texture enabled, colour mode, colour post, clamp.
    pub fn params(&self) -> [f32; 4] {
        let flag = |on: bool| if on { 1.0 } else { 0.0 };
        [
            flag(self.texture.is_some()),
            flag(self.color_mode == ColorMode::Add),
            flag(self.color_post == ColorPost::PremultiplyRgbWithAlpha),
            flag(self.clamp_color),
        ]
    }
}

/// Binds the shader, validates the matrices and issues the draw for each flushed batch.
struct FlushTarget<'a> {
    backend: &'a mut dyn GxBackend,
    matrices: &'a mut MatrixStacks,
    shaders: &'a HashedResourceCache<ShaderProgram>,
    active_shader: Option<Handle<ShaderProgram>>,
    generic_shader: Handle<ShaderProgram>,
    bound_program: &'a mut Option<ProgramId>,
    state: &'a DrawState,
    debug_checks: bool,
}

impl FlushTarget<'_> {
    fn shader(&self) -> Option<&ShaderProgram> {
        let shaders = self.shaders;
        self.active_shader
            .and_then(|handle| shaders.get(handle))
            .filter(|shader| shader.is_valid())
            .or_else(|| shaders.get(self.generic_shader).filter(|shader| shader.is_valid()))
    }
}

impl BatchSink for FlushTarget<'_> {
    fn submit(&mut self, batch: &FlushedBatch<'_>) {
        let bound = self
            .shader()
            .and_then(|shader| shader.program.map(|program| (program, shader.uniforms)));

        if let Some((program, uniforms)) = bound {
            let program_changed = *self.bound_program != Some(program);
            *self.bound_program = Some(program);

            if uniforms.has_matrices() {
                let backend = &mut *self.backend;
                self.matrices
                    .validate(program_changed, &mut |which: MatrixUniform, matrix: Mat4| {
                        let location = match which {
                            MatrixUniform::ModelView => uniforms.model_view,
                            MatrixUniform::ModelViewProjection => uniforms.model_view_projection,
                            MatrixUniform::Projection => uniforms.projection,
                        };
                        if let Some(location) = location {
                            backend.set_uniform(program, location, UniformValue::Mat4(matrix));
                        }
                    });
            }
            if let Some(location) = uniforms.params {
                self.backend
                    .set_uniform(program, location, UniformValue::Vec4(self.state.params()));
            }
        } else {
            log::warn!("no valid shader bound, drawing {:?} without a program", batch.primitive);
        }

        self.backend.draw(&DrawCall {
            primitive: batch.primitive,
            program: bound.map(|(program, _)| program),
            texture: self.state.texture,
            sampler: self.state.sampler,
            vertices: batch.vertices,
            indices: batch.indices,
        });

        if self.debug_checks {
            while let Some(error) = self.backend.check_error() {
                log::error!("backend error after draw: {}", error);
            }
        }
    }
}

pub struct RenderContext {
    config: GxConfig,
    backend: Box<dyn GxBackend>,
    gx: Gx,
    matrices: MatrixStacks,
    version: ResourceVersion,
    textures: HashedResourceCache<Texture>,
    shaders: HashedResourceCache<ShaderProgram>,
    compute_shaders: HashedResourceCache<ComputeProgram>,
    anim_sheets: HashedResourceCache<AnimSheet>,
    registry: ShaderSourceRegistry,
    files: FileShaderSource,
    state: DrawState,
    active_shader: Option<Handle<ShaderProgram>>,
    generic_shader: Handle<ShaderProgram>,
    bound_program: Option<ProgramId>,
    watcher: Option<RealTimeEditWatcher>,
    changed_files: Vec<String>,
    change_callback: Option<Box<dyn FnMut(&str)>>,
}

impl RenderContext {
    pub fn new(config: GxConfig, mut backend: Box<dyn GxBackend>) -> Self {
        let gx = Gx::new(config.vertex_capacity, backend.capabilities());
        let version = ResourceVersion::new();
        let registry = ShaderSourceRegistry::with_builtins();
        let files = FileShaderSource::from_config(&config);

        let mut shaders = HashedResourceCache::new("shaders", version.clone());
        let generic_shader = {
            let sources = LayeredShaderSource {
                files: &files,
                registry: &registry,
            };
            let mut loader = ShaderLoader {
                backend: backend.as_mut(),
                sources: &sources,
            };
            shaders.find_or_create(
                GENERIC_SHADER.to_string(),
                ShaderArgs::from_name(GENERIC_SHADER),
                &mut loader,
            )
        };

        let watcher = config
            .real_time_editing
            .then(|| RealTimeEditWatcher::from_config(&config));

        log::info!(
            "render context ready on {} backend ({} vertices per batch)",
            backend.capabilities().name,
            gx.vertex_capacity()
        );

        Self {
            gx,
            matrices: MatrixStacks::new(config.matrix_stack_depth),
            textures: HashedResourceCache::new("textures", version.clone()),
            shaders,
            compute_shaders: HashedResourceCache::new("compute shaders", version.clone()),
            anim_sheets: HashedResourceCache::new("animation sheets", version.clone()),
            version,
            registry,
            files,
            state: DrawState::default(),
            active_shader: None,
            generic_shader,
            bound_program: None,
            watcher,
            changed_files: Vec::new(),
            change_callback: None,
            config,
            backend,
        }
    }

    pub fn config(&self) -> &GxConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn GxBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn GxBackend {
        self.backend.as_mut()
    }

    /// Downcasts the backend to its concrete type.
    pub fn backend_as<T: Any>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }

    pub fn backend_as_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.backend.as_any_mut().downcast_mut::<T>()
    }

    pub fn resource_version(&self) -> u64 {
        self.version.get()
    }

    fn split(&mut self) -> (&mut Gx, FlushTarget<'_>) {
        (
            &mut self.gx,
            FlushTarget {
                backend: self.backend.as_mut(),
                matrices: &mut self.matrices,
                shaders: &self.shaders,
                active_shader: self.active_shader,
                generic_shader: self.generic_shader,
                bound_program: &mut self.bound_program,
                state: &self.state,
                debug_checks: self.config.debug_checks,
            },
        )
    }

    fn check_backend(&mut self, operation: &str) {
        if !self.config.debug_checks {
            return;
        }
        while let Some(error) = self.backend.check_error() {
            log::error!("backend error after {}: {}", operation, error);
        }
    }

    /* FRAME */

    pub fn begin_frame(&mut self, clear: Option<Color>) {
        self.backend.begin_frame(clear);
        self.check_backend("begin_frame");
    }

    pub fn end_frame(&mut self) {
        debug_assert!(!self.gx.is_recording(), "end_frame() called inside begin()/end()");
        self.backend.end_frame();
        self.check_backend("end_frame");
    }

    /* BATCHING */

    pub fn begin(&mut self, primitive: Primitive) {
        self.gx.begin(primitive);
    }

    pub fn end(&mut self) {
        let (gx, mut target) = self.split();
        gx.end(&mut target);
    }

    pub fn is_recording(&self) -> bool {
        self.gx.is_recording()
    }

    pub fn gx_stats(&self) -> GxStats {
        self.gx.stats()
    }

    pub fn reset_gx_stats(&mut self) {
        self.gx.reset_stats();
    }

    pub fn color(&mut self, color: Color) {
        self.gx.color(color);
    }

    pub fn color4(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.gx.color4(r, g, b, a);
    }

    pub fn color3(&mut self, r: f32, g: f32, b: f32) {
        self.gx.color3(r, g, b);
    }

    pub fn current_color(&self) -> Color {
        self.gx.current_color()
    }

    pub fn normal3(&mut self, x: f32, y: f32, z: f32) {
        self.gx.normal3(x, y, z);
    }

    pub fn tex_coord2(&mut self, u: f32, v: f32) {
        self.gx.tex_coord2(u, v);
    }

    pub fn vertex2(&mut self, x: f32, y: f32) {
        let (gx, mut target) = self.split();
        gx.vertex2(x, y, &mut target);
    }

    pub fn vertex3(&mut self, x: f32, y: f32, z: f32) {
        let (gx, mut target) = self.split();
        gx.vertex3(x, y, z, &mut target);
    }

    pub fn emit_vertex(&mut self, vertex: GxVertex) {
        let (gx, mut target) = self.split();
        gx.emit_vertex(vertex, &mut target);
    }

    /// Draws pre-built vertices with batch-relative indices in one call.
    pub fn draw_indexed(&mut self, primitive: Primitive, vertices: &[GxVertex], indices: &[u32]) {
        let (gx, mut target) = self.split();
        gx.draw_indexed(primitive, vertices, indices, &mut target);
    }

    /* MATRICES */

    pub fn matrix_mode(&mut self, mode: MatrixMode) {
        self.matrices.set_mode(mode);
    }

    pub fn matrices(&self) -> &MatrixStacks {
        &self.matrices
    }

    pub fn push_matrix(&mut self) {
        self.matrices.current_mut().push();
    }

    pub fn pop_matrix(&mut self) {
        self.matrices.current_mut().pop();
    }

    pub fn load_identity(&mut self) {
        self.matrices.current_mut().load_identity();
    }

    pub fn load_matrix(&mut self, matrix: Mat4) {
        self.matrices.current_mut().load(matrix);
    }

    pub fn mult_matrix(&mut self, matrix: Mat4) {
        self.matrices.current_mut().mult(matrix);
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.matrices.current_mut().translate(x, y, z);
    }

    /// Rotates the current matrix by `degrees` around (x, y, z).
    pub fn rotate(&mut self, degrees: f32, x: f32, y: f32, z: f32) {
        self.matrices.current_mut().rotate(degrees, x, y, z);
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.matrices.current_mut().scale(x, y, z);
    }

    /// Pixel-space projection with the origin in the top-left corner; resets the model-view matrix.
    pub fn set_ortho(&mut self, width: f32, height: f32) {
        self.matrices
            .projection
            .load(Mat4::orthographic_rh(0.0, width, height, 0.0, -1.0, 1.0));
        self.matrices.model_view.load_identity();
    }

    /* DRAW STATE */

    pub fn draw_state(&self) -> &DrawState {
        &self.state
    }

    pub fn set_texture(&mut self, texture: Option<TextureId>) {
        self.state.texture = texture;
    }

    pub fn set_sampler(&mut self, sampler: SamplerState) {
        self.state.sampler = sampler;
    }

    pub fn set_filter(&mut self, filter: FilterMode) {
        self.state.sampler.filter = filter;
    }

    pub fn set_clamp(&mut self, clamp: bool) {
        self.state.sampler.clamp = clamp;
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        self.state.color_mode = mode;
    }

    pub fn set_color_post(&mut self, post: ColorPost) {
        self.state.color_post = post;
    }

    pub fn set_color_clamp(&mut self, clamp: bool) {
        self.state.clamp_color = clamp;
    }

    /* TEXTURES */

    pub fn load_texture(&mut self, key: TextureKey) -> Handle<Texture> {
        let mut loader = TextureLoader {
            backend: self.backend.as_mut(),
            config: &self.config,
        };
        let handle = self.textures.find_or_create(key, (), &mut loader);
        self.check_backend("load_texture");
        handle
    }

    pub fn texture(&self, handle: Handle<Texture>) -> Option<&Texture> {
        self.textures.get(handle)
    }

    pub fn textures(&self) -> &HashedResourceCache<Texture> {
        &self.textures
    }

    pub fn reload_texture(&mut self, handle: Handle<Texture>) -> bool {
        let mut loader = TextureLoader {
            backend: self.backend.as_mut(),
            config: &self.config,
        };
        self.textures.reload_entry(handle, &mut loader)
    }

    /* ANIMATION SHEETS */

    pub fn load_anim_sheet(&mut self, name: &str) -> Handle<AnimSheet> {
        let mut loader = AnimSheetLoader {
            config: &self.config,
        };
        self.anim_sheets
            .find_or_create(normalize_resource_name(name), (), &mut loader)
    }

    pub fn anim_sheet(&self, handle: Handle<AnimSheet>) -> Option<&AnimSheet> {
        self.anim_sheets.get(handle)
    }

    /* SHADERS */

    /// Loads `name.vs` and `name.ps` as program `name`.
    pub fn load_shader(&mut self, name: &str) -> Handle<ShaderProgram> {
        self.load_shader_with(name, &format!("{}.vs", name), &format!("{}.ps", name))
    }

    pub fn load_shader_with(&mut self, name: &str, vs: &str, ps: &str) -> Handle<ShaderProgram> {
        let sources = LayeredShaderSource {
            files: &self.files,
            registry: &self.registry,
        };
        let mut loader = ShaderLoader {
            backend: self.backend.as_mut(),
            sources: &sources,
        };
        let args = ShaderArgs {
            vs: normalize_resource_name(vs),
            ps: normalize_resource_name(ps),
        };
        let handle = self
            .shaders
            .find_or_create(normalize_resource_name(name), args, &mut loader);
        self.check_backend("load_shader");
        handle
    }

    pub fn shader(&self, handle: Handle<ShaderProgram>) -> Option<&ShaderProgram> {
        self.shaders.get(handle)
    }

    pub fn shaders(&self) -> &HashedResourceCache<ShaderProgram> {
        &self.shaders
    }

    pub fn generic_shader(&self) -> Handle<ShaderProgram> {
        self.generic_shader
    }

    /// Uses `shader` for the following batches. An invalid shader falls back to the generic one.
    pub fn set_shader(&mut self, shader: Handle<ShaderProgram>) {
        self.active_shader = Some(shader);
    }

    pub fn active_shader(&self) -> Option<Handle<ShaderProgram>> {
        self.active_shader
    }

    pub fn clear_shader(&mut self) {
        self.active_shader = None;
    }

    /// Writes a uniform of `shader`. Returns false when the program is invalid or has no uniform of
    /// that name.
    pub fn set_shader_uniform(
        &mut self,
        shader: Handle<ShaderProgram>,
        name: &str,
        value: UniformValue,
    ) -> bool {
        let Some(program) = self.shaders.get(shader).and_then(|shader| shader.program) else {
            return false;
        };
        let Some(location) = self.backend.uniform_location(program, name) else {
            log::debug!("program has no uniform {}", name);
            return false;
        };
        self.backend.set_uniform(program, location, value);
        self.check_backend("set_shader_uniform");
        true
    }

    /// Registers in-memory shader text under `name` and reloads every program built from it.
    pub fn register_shader_source(&mut self, name: &str, text: impl Into<String>) {
        let name = normalize_resource_name(name);
        self.registry.register(&name, text);
        let reloaded = self.reload_shaders_using(&name);
        log::debug!("registered shader source {} ({} programs reloaded)", name, reloaded);
    }

    pub fn unregister_shader_source(&mut self, name: &str) -> bool {
        self.registry.unregister(&normalize_resource_name(name))
    }

    fn reload_shaders_using(&mut self, file: &str) -> usize {
        let sources = LayeredShaderSource {
            files: &self.files,
            registry: &self.registry,
        };
        let mut loader = ShaderLoader {
            backend: self.backend.as_mut(),
            sources: &sources,
        };
        let reloaded = self
            .shaders
            .reload_where(|_, args| args.uses(file), &mut loader);
        if reloaded > 0 {
            self.bound_program = None;
        }
        reloaded
    }

    /// Rebuilds every graphics and compute program in place. Handles and the active shader stay
    /// valid.
    fn reload_all_shaders(&mut self) -> usize {
        let sources = LayeredShaderSource {
            files: &self.files,
            registry: &self.registry,
        };
        let mut loader = ShaderLoader {
            backend: self.backend.as_mut(),
            sources: &sources,
        };
        let reloaded = self.shaders.reload_where(|_, _| true, &mut loader)
            + self.compute_shaders.reload_where(|_, _| true, &mut loader);
        self.bound_program = None;
        reloaded
    }

    /* COMPUTE */

    pub fn load_compute_shader(
        &mut self,
        name: &str,
        local_size: [u32; 3],
    ) -> Handle<ComputeProgram> {
        let name = normalize_resource_name(name);
        let sources = LayeredShaderSource {
            files: &self.files,
            registry: &self.registry,
        };
        let mut loader = ShaderLoader {
            backend: self.backend.as_mut(),
            sources: &sources,
        };
        let args = ComputeArgs::from_name(&name, local_size);
        let handle = self.compute_shaders.find_or_create(name, args, &mut loader);
        self.check_backend("load_compute_shader");
        handle
    }

    pub fn compute_shader(&self, handle: Handle<ComputeProgram>) -> Option<&ComputeProgram> {
        self.compute_shaders.get(handle)
    }

    /// Runs `shader` over `size` invocations. Returns false when the program is invalid.
    pub fn dispatch_compute(
        &mut self,
        shader: Handle<ComputeProgram>,
        size: [u32; 3],
        texture: Option<TextureId>,
    ) -> bool {
        let Some((program, groups)) = self
            .compute_shaders
            .get(shader)
            .and_then(|shader| shader.program.map(|program| (program, shader.group_count(size))))
        else {
            log::warn!("dispatch skipped: compute program not loaded");
            return false;
        };
        self.backend.dispatch(program, groups, texture);
        self.check_backend("dispatch_compute");
        true
    }

    /* CACHE MANAGEMENT */

    /// Reloads every cached resource with its recorded arguments and bumps the resource version
    /// once for the whole pass.
    pub fn reload_caches(&mut self) {
        {
            let mut loader = TextureLoader {
                backend: self.backend.as_mut(),
                config: &self.config,
            };
            self.textures.reload_in_batch(&mut loader);
        }
        {
            let sources = LayeredShaderSource {
                files: &self.files,
                registry: &self.registry,
            };
            let mut loader = ShaderLoader {
                backend: self.backend.as_mut(),
                sources: &sources,
            };
            self.shaders.reload_in_batch(&mut loader);
            self.compute_shaders.reload_in_batch(&mut loader);
        }
        {
            let mut loader = AnimSheetLoader {
                config: &self.config,
            };
            self.anim_sheets.reload_in_batch(&mut loader);
        }
        self.bound_program = None;
        let version = self.version.bump();
        log::info!("reloaded all caches (resource version {})", version);
        self.check_backend("reload_caches");
    }

    /// Releases every cached resource. Handles taken before become stale; the generic shader is
    /// recreated.
    pub fn clear_caches(&mut self) {
        self.release_caches();
        self.generic_shader = self.load_shader(GENERIC_SHADER);
    }

    fn release_caches(&mut self) {
        {
            let mut loader = TextureLoader {
                backend: self.backend.as_mut(),
                config: &self.config,
            };
            self.textures.clear(&mut loader);
        }
        self.clear_shader_caches();
        let mut loader = AnimSheetLoader {
            config: &self.config,
        };
        self.anim_sheets.clear(&mut loader);
    }

    fn clear_shader_caches(&mut self) {
        let sources = LayeredShaderSource {
            files: &self.files,
            registry: &self.registry,
        };
        let mut loader = ShaderLoader {
            backend: self.backend.as_mut(),
            sources: &sources,
        };
        self.shaders.clear(&mut loader);
        self.compute_shaders.clear(&mut loader);
        self.active_shader = None;
        self.bound_program = None;
    }

    /// Preloads every resource found under the resource directory `dir`. Images are loaded with
    /// their animation sheet, `.vs`/`.ps` pairs as programs, `.cs` files as compute programs; every
    /// other file is passed to `on_unknown`.
    pub fn fill_caches_with_path(
        &mut self,
        dir: &str,
        recurse: bool,
        on_unknown: &mut dyn FnMut(&str),
    ) {
        let dir = normalize_resource_name(dir);
        let Some(root) = self.find_resource_dir(&dir) else {
            log::error!("fill_caches_with_path: no resource directory named {}", dir);
            return;
        };

        let walker = WalkDir::new(&root).max_depth(if recurse { usize::MAX } else { 1 });
        let mut names: Vec<String> = walker
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&root).ok()?;
                let relative = relative.to_string_lossy();
                Some(normalize_resource_name(&if dir.is_empty() {
                    relative.to_string()
                } else {
                    format!("{}/{}", dir, relative)
                }))
            })
            .collect();
        names.sort();

        for name in &names {
            match classify(name) {
                WatchAction::Texture => {
                    let sheet = self.load_anim_sheet(&replace_extension(name, "txt"));
                    let grid = self.anim_sheets.get(sheet).map_or((1, 1), |s| s.grid);
                    self.load_texture(TextureKey::new(name.clone()).with_grid(grid.0, grid.1));
                }
                WatchAction::ShaderSource => {
                    let program = strip_extension(name);
                    if self.shaders.find(&program.to_string()).is_none() {
                        self.load_shader(program);
                    }
                }
                WatchAction::ComputeSource => {
                    self.load_compute_shader(strip_extension(name), DEFAULT_LOCAL_SIZE);
                }
                // Sheets were loaded with their image; any other text file is the caller's.
                WatchAction::AnimSheet if self.anim_sheets.find(name).is_some() => {}
                _ => on_unknown(name),
            }
        }
    }

    fn find_resource_dir(&self, dir: &str) -> Option<PathBuf> {
        let candidate = Path::new(dir);
        if candidate.is_absolute() {
            return candidate.is_dir().then(|| candidate.to_path_buf());
        }
        self.config
            .resource_paths
            .iter()
            .map(|root| root.join(candidate))
            .find(|path| path.is_dir())
    }

    /* REAL-TIME EDITING */

    pub fn set_real_time_edit_callback(&mut self, callback: impl FnMut(&str) + 'static) {
        self.change_callback = Some(Box::new(callback));
    }

    pub fn is_real_time_editing(&self) -> bool {
        self.watcher.is_some()
    }

    /// Per-frame tick: polls the watcher and applies every change it reports.
    pub fn process(&mut self) {
        self.changed_files.clear();
        let Some(watcher) = self.watcher.as_mut() else {
            return;
        };
        let changed: Vec<String> = watcher
            .poll()
            .iter()
            .map(|file| self.config.resource_name_for_watched(file))
            .collect();
        for file in &changed {
            self.handle_file_change(file);
        }
        self.changed_files = changed;
    }

    /// True when `name` was reported as changed by the last [`process`](Self::process) call.
    pub fn file_has_changed(&self, name: &str) -> bool {
        let name = normalize_resource_name(name);
        self.changed_files.iter().any(|file| *file == name)
    }

    pub fn changed_files(&self) -> &[String] {
        &self.changed_files
    }

    /// Applies a change to resource `file`, as if the watcher had reported it.
    pub fn handle_file_change(&mut self, file: &str) {
        let file = normalize_resource_name(file);
        log::info!("real-time edit: {}", file);

        match classify(&file) {
            WatchAction::ShaderSource => {
                if self.reload_shaders_using(&file) == 0 {
                    self.notify_unhandled(&file);
                }
            }
            WatchAction::ComputeSource => {
                let sources = LayeredShaderSource {
                    files: &self.files,
                    registry: &self.registry,
                };
                let mut loader = ShaderLoader {
                    backend: self.backend.as_mut(),
                    sources: &sources,
                };
                let reloaded = self
                    .compute_shaders
                    .reload_where(|_, args| args.cs == file, &mut loader);
                if reloaded == 0 {
                    self.notify_unhandled(&file);
                }
            }
            WatchAction::ShaderInclude => {
                // Include dependencies are not tracked per program, so every program is rebuilt.
                let reloaded = self.reload_all_shaders();
                log::debug!("{} changed: {} programs rebuilt", file, reloaded);
            }
            WatchAction::Texture => {
                let mut loader = TextureLoader {
                    backend: self.backend.as_mut(),
                    config: &self.config,
                };
                let reloaded = self
                    .textures
                    .reload_where(|key, _| key.name == file, &mut loader);
                if reloaded == 0 {
                    self.notify_unhandled(&file);
                }
            }
            WatchAction::AnimSheet => match self.anim_sheets.find(&file) {
                Some(sheet) => {
                    let mut loader = AnimSheetLoader {
                        config: &self.config,
                    };
                    self.anim_sheets.reload_entry(sheet, &mut loader);
                    self.version.bump();
                }
                None => self.notify_unhandled(&file),
            },
            WatchAction::Other => self.notify_unhandled(&file),
        }
        self.check_backend("real-time edit");
    }

    fn notify_unhandled(&mut self, file: &str) {
        match self.change_callback.as_mut() {
            Some(callback) => callback(file),
            None => log::debug!("no handler for changed file {}", file),
        }
    }
}

fn strip_extension(name: &str) -> &str {
    match extension_of(name) {
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.release_caches();
    }
}
