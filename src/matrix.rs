//! Model-view and projection matrix stacks.

use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixMode {
    ModelView,
    Projection,
}

/// Matrices derived from the stacks and uploaded to the bound program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixUniform {
    ModelView,
    ModelViewProjection,
    Projection,
}

#[derive(Debug, Clone)]
pub struct MatrixStack {
    frames: Vec<Mat4>,
    max_depth: usize,
    dirty: bool,
}

impl MatrixStack {
    pub fn new(max_depth: usize) -> Self {
        let mut frames = Vec::with_capacity(max_depth.max(1));
        frames.push(Mat4::IDENTITY);
        Self {
            frames,
            max_depth: max_depth.max(1),
            dirty: true,
        }
    }

    /// Number of frames, the initial frame included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn top(&self) -> Mat4 {
        self.frames.last().copied().unwrap_or(Mat4::IDENTITY)
    }

    fn top_mut(&mut self) -> &mut Mat4 {
        self.dirty = true;
        if self.frames.is_empty() {
            self.frames.push(Mat4::IDENTITY);
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Saves the current matrix; the new top starts as a copy of it.
    pub fn push(&mut self) {
        debug_assert!(
            self.frames.len() < self.max_depth,
            "matrix stack overflow (depth {})",
            self.max_depth
        );
        if self.frames.len() >= self.max_depth {
            log::error!("matrix stack overflow, push ignored");
            return;
        }
        let top = self.top();
        self.frames.push(top);
    }

    /// Restores the previously pushed matrix. Popping the initial frame is a usage error.
    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "matrix stack underflow");
        if self.frames.len() <= 1 {
            log::error!("matrix stack underflow, pop ignored");
            return;
        }
        self.frames.pop();
        self.dirty = true;
    }

    pub fn load(&mut self, matrix: Mat4) {
        *self.top_mut() = matrix;
    }

    pub fn load_identity(&mut self) {
        self.load(Mat4::IDENTITY);
    }

    /// Post-multiplies the current matrix, so `matrix` applies to vertices first.
    pub fn mult(&mut self, matrix: Mat4) {
        let top = self.top_mut();
        *top *= matrix;
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.mult(Mat4::from_translation(Vec3::new(x, y, z)));
    }

    /// Rotates by `degrees` around the axis (x, y, z).
    pub fn rotate(&mut self, degrees: f32, x: f32, y: f32, z: f32) {
        let axis = Vec3::new(x, y, z);
        if axis.length_squared() == 0.0 {
            return;
        }
        self.mult(Mat4::from_axis_angle(axis.normalize(), degrees.to_radians()));
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.mult(Mat4::from_scale(Vec3::new(x, y, z)));
    }
}

#[derive(Debug, Clone)]
pub struct MatrixStacks {
    pub model_view: MatrixStack,
    pub projection: MatrixStack,
    mode: MatrixMode,
}

impl MatrixStacks {
    pub fn new(max_depth: usize) -> Self {
        Self {
            model_view: MatrixStack::new(max_depth),
            projection: MatrixStack::new(max_depth),
            mode: MatrixMode::ModelView,
        }
    }

    pub fn mode(&self) -> MatrixMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: MatrixMode) {
        self.mode = mode;
    }

    pub fn current(&self) -> &MatrixStack {
        match self.mode {
            MatrixMode::ModelView => &self.model_view,
            MatrixMode::Projection => &self.projection,
        }
    }

    pub fn current_mut(&mut self) -> &mut MatrixStack {
        match self.mode {
            MatrixMode::ModelView => &mut self.model_view,
            MatrixMode::Projection => &mut self.projection,
        }
    }

    pub fn model_view_projection(&self) -> Mat4 {
        self.projection.top() * self.model_view.top()
    }

    /// Uploads the matrices whose stacks changed since the last call, or all of them when the
    /// bound program changed, then clears both dirty flags.
    pub fn validate(&mut self, program_changed: bool, upload: &mut dyn FnMut(MatrixUniform, Mat4)) {
        let model_view_dirty = program_changed || self.model_view.is_dirty();
        let projection_dirty = program_changed || self.projection.is_dirty();

        if model_view_dirty {
            upload(MatrixUniform::ModelView, self.model_view.top());
        }
        if model_view_dirty || projection_dirty {
            upload(
                MatrixUniform::ModelViewProjection,
                self.model_view_projection(),
            );
        }
        if projection_dirty {
            upload(MatrixUniform::Projection, self.projection.top());
        }

        self.model_view.clear_dirty();
        self.projection.clear_dirty();
    }
}
