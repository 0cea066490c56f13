//! Animated sprites.
//!
//! A [`Sprite`] draws one cell of a gridded texture. Its animation sheet and texture live in the
//! render context caches and are resolved through handles on every update and draw, so a reloaded
//! sheet or image takes effect without recreating the sprite.

use std::fmt;

use crate::anim::{AnimClip, AnimSheet, AnimTrigger, TriggerArgs, TriggerKind};
use crate::backend::FilterMode;
use crate::cache::Handle;
use crate::context::RenderContext;
use crate::gx::Primitive;
use crate::texture::{Texture, TextureKey};
use crate::utils::{normalize_resource_name, replace_extension};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Payload handed to trigger handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimTriggerEvent {
    pub frame: u32,
    pub kind: TriggerKind,
    pub action: String,
    /// Trigger arguments; `x` and `y` are offset by the sprite position.
    pub args: TriggerArgs,
    pub x: i32,
    pub y: i32,
}

impl AnimTriggerEvent {
    fn new(frame: u32, trigger: &AnimTrigger, origin: (f32, f32)) -> Self {
        let x = trigger.args.get_int("x", 0) + origin.0 as i32;
        let y = trigger.args.get_int("y", 0) + origin.1 as i32;
        let mut args = trigger.args.clone();
        args.set("x", x);
        args.set("y", y);
        Self {
            frame,
            kind: trigger.kind,
            action: trigger.action.clone(),
            args,
            x,
            y,
        }
    }
}

/// Playback position of one sprite within a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationCursor {
    name: String,
    started: bool,
    /// Whether `name` was found in the sheet at the last resync.
    active: bool,
    state: PlayState,
    frame_f: f32,
    frame: i32,
    speed: f32,
}

impl Default for AnimationCursor {
    fn default() -> Self {
        Self {
            name: String::new(),
            started: false,
            active: false,
            state: PlayState::Stopped,
            frame_f: 0.0,
            frame: 0,
            speed: 1.0,
        }
    }
}

impl AnimationCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn frame(&self) -> i32 {
        self.frame
    }

    pub fn frame_f(&self) -> f32 {
        self.frame_f
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Playback speed multiplier. Negative speeds are treated as 0.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    /// Starts playing `name` at `frame`. The clip is resolved by the next [`resolve`](Self::resolve).
    pub fn start(&mut self, name: &str, frame: i32) {
        self.name = name.to_string();
        self.started = true;
        self.active = false;
        self.state = PlayState::Playing;
        self.frame = frame;
        self.frame_f = frame as f32;
    }

    pub fn stop(&mut self) {
        self.started = false;
        self.state = PlayState::Stopped;
    }

    pub fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == PlayState::Paused {
            self.state = PlayState::Playing;
        }
    }

    /// Looks the clip up again. Returns the clip when the cursor is started and the clip exists;
    /// a missing clip leaves the cursor inactive on frame 0.
    pub fn resolve<'s>(&mut self, sheet: &'s AnimSheet) -> Option<&'s AnimClip> {
        if !self.started || self.name.is_empty() {
            return None;
        }
        match sheet.clip(&self.name) {
            Some(clip) => {
                self.active = true;
                Some(clip)
            }
            None => {
                log::info!("animation {} not found in {}", self.name, sheet.name);
                self.active = false;
                self.frame = 0;
                self.frame_f = 0.0;
                None
            }
        }
    }

    /// Maps any frame number into the clip: clamped for one-shot clips, wrapped to the loop range
    /// for looping ones.
    pub fn looped_index(&self, clip: &AnimClip, frame: i32) -> i32 {
        let frames = clip.frames as i32;
        if !clip.looping {
            return frame.clamp(0, frames - 1);
        }
        let loop_length = (frames - clip.loop_start as i32).max(1);
        let mut frame = frame;
        while frame < 0 {
            frame += frames;
        }
        while frame >= frames {
            frame -= loop_length;
        }
        frame
    }

    /// Grid cell of the current frame, or 0 when no clip plays.
    pub fn cell_index(&self, clip: Option<&AnimClip>) -> u32 {
        match clip {
            Some(clip) if self.started && self.active => {
                clip.first_cell + self.looped_index(clip, self.frame) as u32
            }
            _ => 0,
        }
    }

    /// Advances playback by `dt` seconds, reporting every trigger of every frame boundary crossed.
    pub fn update(
        &mut self,
        clip: &AnimClip,
        dt: f32,
        emit: &mut dyn FnMut(u32, &AnimTrigger),
    ) {
        if self.state != PlayState::Playing || !self.active {
            return;
        }
        let frames = clip.frames as i32;
        let start = self.frame;
        self.frame_f += self.speed * clip.rate * dt;
        let end = if clip.looping {
            self.frame_f as i32
        } else {
            (self.frame_f as i32).min(frames - 1)
        };

        for frame in start..end {
            let old = self.looped_index(clip, frame);
            let new = self.looped_index(clip, frame + 1);
            Self::change_frame(clip, old, new, emit);
        }

        if clip.looping {
            let loop_length = (frames - clip.loop_start as i32).max(1) as f32;
            while self.frame_f >= frames as f32 {
                self.frame_f -= loop_length;
            }
            self.frame = self.frame_f as i32;
        } else {
            self.frame = end;
            if self.frame_f >= frames as f32 {
                self.state = PlayState::Stopped;
            }
        }
    }

    /// Jumps to `frame`, firing the leave and enter triggers of the change.
    pub fn set_frame(&mut self, clip: &AnimClip, frame: i32, emit: &mut dyn FnMut(u32, &AnimTrigger)) {
        if !self.active {
            return;
        }
        let old = self.looped_index(clip, self.frame);
        let new = self.looped_index(clip, frame);
        self.frame = new;
        self.frame_f = new as f32;
        Self::change_frame(clip, old, new, emit);
    }

    /// Fires the enter triggers of the current frame.
    pub fn enter_current(&self, clip: &AnimClip, emit: &mut dyn FnMut(u32, &AnimTrigger)) {
        if !self.active {
            return;
        }
        let frame = self.looped_index(clip, self.frame) as u32;
        for trigger in clip.triggers_for(frame, TriggerKind::OnEnter) {
            emit(frame, trigger);
        }
    }

    fn change_frame(
        clip: &AnimClip,
        old: i32,
        new: i32,
        emit: &mut dyn FnMut(u32, &AnimTrigger),
    ) {
        if old == new {
            return;
        }
        for trigger in clip.triggers_for(old as u32, TriggerKind::OnLeave) {
            emit(old as u32, trigger);
        }
        for trigger in clip.triggers_for(new as u32, TriggerKind::OnEnter) {
            emit(new as u32, trigger);
        }
    }
}

type TriggerHandler = Box<dyn FnMut(&AnimTriggerEvent)>;

pub struct Sprite {
    pub x: f32,
    pub y: f32,
    /// Rotation in degrees.
    pub angle: f32,
    pub scale: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Use `scale_x`/`scale_y` instead of `scale`.
    pub separate_scale: bool,
    pub flip_x: bool,
    pub flip_y: bool,
    pub pivot_x: f32,
    pub pivot_y: f32,
    /// Snap the position to whole pixels.
    pub pixel_pos: bool,
    pub filter: FilterMode,
    texture_name: String,
    sheet: Option<Handle<AnimSheet>>,
    texture: Option<Handle<Texture>>,
    cursor: AnimationCursor,
    synced_version: Option<u64>,
    trigger_handler: Option<TriggerHandler>,
}

impl fmt::Debug for Sprite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sprite")
            .field("texture", &self.texture_name)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Sprite {
    /// Creates a sprite for `filename`, using the sheet next to it (`name.txt`) when there is one.
    pub fn new(ctx: &mut RenderContext, filename: &str) -> Self {
        let filename = normalize_resource_name(filename);
        let sheet = ctx.load_anim_sheet(&replace_extension(&filename, "txt"));
        Self::with_sheet(ctx, &filename, Some(sheet))
    }

    /// A sprite that always draws the whole image.
    pub fn without_sheet(ctx: &mut RenderContext, filename: &str) -> Self {
        Self::with_sheet(ctx, &normalize_resource_name(filename), None)
    }

    pub fn with_sheet(
        ctx: &mut RenderContext,
        filename: &str,
        sheet: Option<Handle<AnimSheet>>,
    ) -> Self {
        let mut sprite = Self {
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            scale: 1.0,
            scale_x: 1.0,
            scale_y: 1.0,
            separate_scale: false,
            flip_x: false,
            flip_y: false,
            pivot_x: 0.0,
            pivot_y: 0.0,
            pixel_pos: false,
            filter: FilterMode::Linear,
            texture_name: filename.to_string(),
            sheet,
            texture: None,
            cursor: AnimationCursor::new(),
            synced_version: None,
            trigger_handler: None,
        };
        if let Some(sheet) = sheet.and_then(|handle| ctx.anim_sheet(handle)) {
            if sheet.has_sheet {
                sprite.pivot_x = sheet.pivot.0 as f32;
                sprite.pivot_y = sheet.pivot.1 as f32;
                sprite.scale = sheet.scale;
            }
        }
        sprite.resync(ctx);
        sprite
    }

    pub fn texture_name(&self) -> &str {
        &self.texture_name
    }

    pub fn texture_handle(&self) -> Option<Handle<Texture>> {
        self.texture
    }

    pub fn sheet_handle(&self) -> Option<Handle<AnimSheet>> {
        self.sheet
    }

    pub fn cursor(&self) -> &AnimationCursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut AnimationCursor {
        &mut self.cursor
    }

    /// Receives every trigger fired by this sprite. Without a handler triggers are only logged.
    pub fn set_trigger_handler(&mut self, handler: impl FnMut(&AnimTriggerEvent) + 'static) {
        self.trigger_handler = Some(Box::new(handler));
    }

    pub fn clear_trigger_handler(&mut self) {
        self.trigger_handler = None;
    }

    /// Re-resolves the clip and the texture when the resource version moved since the last sync.
    fn resync(&mut self, ctx: &mut RenderContext) {
        let version = ctx.resource_version();
        if self.synced_version == Some(version) {
            return;
        }
        self.synced_version = Some(version);

        let mut grid = (1, 1);
        if let Some(sheet) = self.sheet.and_then(|handle| ctx.anim_sheet(handle)) {
            grid = sheet.grid;
            if let Some(clip) = self.cursor.resolve(sheet) {
                self.pivot_x = clip.pivot.0 as f32;
                self.pivot_y = clip.pivot.1 as f32;
            }
        }
        self.texture =
            Some(ctx.load_texture(TextureKey::new(self.texture_name.clone()).with_grid(grid.0, grid.1)));
    }

    fn clip<'c>(&self, ctx: &'c RenderContext) -> Option<&'c AnimClip> {
        self.sheet
            .and_then(|handle| ctx.anim_sheet(handle))
            .and_then(|sheet| sheet.clip(self.cursor.name()))
    }

    /// Starts clip `name` at `frame`, firing the enter triggers of that frame.
    pub fn start_anim(&mut self, ctx: &mut RenderContext, name: &str, frame: i32) {
        self.cursor.start(name, frame);
        self.synced_version = None;
        self.resync(ctx);

        let Some(clip) = self.clip(ctx) else {
            return;
        };
        let origin = (self.x, self.y);
        let handler = &mut self.trigger_handler;
        self.cursor.enter_current(clip, &mut |frame: u32, trigger: &AnimTrigger| {
            dispatch(handler, AnimTriggerEvent::new(frame, trigger, origin));
        });
    }

    pub fn stop_anim(&mut self) {
        self.cursor.stop();
    }

    pub fn pause_anim(&mut self) {
        self.cursor.pause();
    }

    pub fn resume_anim(&mut self) {
        self.cursor.resume();
    }

    pub fn update(&mut self, ctx: &mut RenderContext, dt: f32) {
        self.resync(ctx);
        let Some(clip) = self.clip(ctx) else {
            return;
        };
        let origin = (self.x, self.y);
        let handler = &mut self.trigger_handler;
        self.cursor.update(clip, dt, &mut |frame: u32, trigger: &AnimTrigger| {
            dispatch(handler, AnimTriggerEvent::new(frame, trigger, origin));
        });
    }

    pub fn set_anim_frame(&mut self, ctx: &mut RenderContext, frame: i32) {
        self.resync(ctx);
        let Some(clip) = self.clip(ctx) else {
            return;
        };
        let origin = (self.x, self.y);
        let handler = &mut self.trigger_handler;
        self.cursor.set_frame(clip, frame, &mut |frame: u32, trigger: &AnimTrigger| {
            dispatch(handler, AnimTriggerEvent::new(frame, trigger, origin));
        });
    }

    pub fn anim_frame(&self) -> i32 {
        self.cursor.frame()
    }

    pub fn anim_name(&self) -> &str {
        self.cursor.name()
    }

    pub fn is_anim_active(&self) -> bool {
        self.cursor.is_started() && self.cursor.is_active()
    }

    pub fn play_state(&self) -> PlayState {
        self.cursor.state()
    }

    /// Names of the clips in this sprite's sheet, sorted.
    pub fn anim_list(&self, ctx: &RenderContext) -> Vec<String> {
        self.sheet
            .and_then(|handle| ctx.anim_sheet(handle))
            .map(|sheet| sheet.clip_names().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Size of one cell in pixels, before scaling.
    pub fn cell_size(&self, ctx: &RenderContext) -> (f32, f32) {
        self.texture
            .and_then(|handle| ctx.texture(handle))
            .map(|texture| {
                let (width, height) = texture.cell_size();
                (width as f32, height as f32)
            })
            .unwrap_or((0.0, 0.0))
    }

    pub fn width(&self, ctx: &RenderContext) -> f32 {
        self.cell_size(ctx).0
    }

    pub fn height(&self, ctx: &RenderContext) -> f32 {
        self.cell_size(ctx).1
    }

    /// Reloads the image from disk.
    pub fn reload(&mut self, ctx: &mut RenderContext) -> bool {
        match self.texture {
            Some(handle) => ctx.reload_texture(handle),
            None => false,
        }
    }

    pub fn draw(&mut self, ctx: &mut RenderContext) {
        self.resync(ctx);

        let cell_index = self.cursor.cell_index(self.clip(ctx)) as usize;
        let Some(texture) = self.texture.and_then(|handle| ctx.texture(handle)) else {
            return;
        };
        if !texture.is_valid() {
            return;
        }
        let (width, height) = texture.cell_size();
        let (width, height) = (width as f32, height as f32);
        let cell = texture.cell(cell_index).or_else(|| texture.id());

        ctx.push_matrix();
        let (x, y) = if self.pixel_pos {
            (self.x.floor(), self.y.floor())
        } else {
            (self.x, self.y)
        };
        ctx.translate(x, y, 0.0);
        if self.angle != 0.0 {
            ctx.rotate(self.angle, 0.0, 0.0, 1.0);
        }
        if self.separate_scale {
            ctx.scale(self.scale_x, self.scale_y, 1.0);
        } else if self.scale != 1.0 {
            ctx.scale(self.scale, self.scale, 1.0);
        }
        if self.flip_x || self.flip_y {
            let flip = |on: bool| if on { -1.0 } else { 1.0 };
            ctx.scale(flip(self.flip_x), flip(self.flip_y), 1.0);
        }
        ctx.translate(-self.pivot_x, -self.pivot_y, 0.0);

        ctx.set_texture(cell);
        ctx.set_filter(self.filter);
        ctx.begin(Primitive::Quads);
        ctx.tex_coord2(0.0, 0.0);
        ctx.vertex2(0.0, 0.0);
        ctx.tex_coord2(1.0, 0.0);
        ctx.vertex2(width, 0.0);
        ctx.tex_coord2(1.0, 1.0);
        ctx.vertex2(width, height);
        ctx.tex_coord2(0.0, 1.0);
        ctx.vertex2(0.0, height);
        ctx.end();

        ctx.pop_matrix();
        ctx.set_texture(None);
    }
}

fn dispatch(handler: &mut Option<TriggerHandler>, event: AnimTriggerEvent) {
    match handler {
        Some(handler) => handler(&event),
        None => log::debug!(
            "trigger {} on frame {} at ({}, {})",
            event.action,
            event.frame,
            event.x,
            event.y
        ),
    }
}
