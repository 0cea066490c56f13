//! Immediate-mode drawing helpers built on the batch engine.

use std::f32::consts::TAU;

use crate::context::RenderContext;
use crate::gx::Primitive;
use crate::utils::Rectangle;

/// Segments used by the circle helpers when the caller passes 0.
pub const DEFAULT_CIRCLE_SEGMENTS: u32 = 32;

impl RenderContext {
    /// Filled rectangle with texture coordinates spanning the whole bound texture.
    pub fn draw_rect(&mut self, rect: Rectangle) {
        let (x1, y1) = (rect.x, rect.y);
        let (x2, y2) = (rect.x + rect.width, rect.y + rect.height);
        self.begin(Primitive::Quads);
        self.tex_coord2(0.0, 0.0);
        self.vertex2(x1, y1);
        self.tex_coord2(1.0, 0.0);
        self.vertex2(x2, y1);
        self.tex_coord2(1.0, 1.0);
        self.vertex2(x2, y2);
        self.tex_coord2(0.0, 1.0);
        self.vertex2(x1, y2);
        self.end();
    }

    /// Rectangle outline.
    pub fn draw_rect_line(&mut self, rect: Rectangle) {
        let (x1, y1) = (rect.x, rect.y);
        let (x2, y2) = (rect.x + rect.width, rect.y + rect.height);
        self.begin(Primitive::LineLoop);
        self.vertex2(x1, y1);
        self.vertex2(x2, y1);
        self.vertex2(x2, y2);
        self.vertex2(x1, y2);
        self.end();
    }

    pub fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.begin(Primitive::Lines);
        self.vertex2(x1, y1);
        self.vertex2(x2, y2);
        self.end();
    }

    pub fn draw_point(&mut self, x: f32, y: f32) {
        self.begin(Primitive::Points);
        self.vertex2(x, y);
        self.end();
    }

    pub fn draw_circle(&mut self, x: f32, y: f32, radius: f32, segments: u32) {
        let segments = circle_segments(segments);
        self.begin(Primitive::LineLoop);
        for i in 0..segments {
            let (dx, dy) = circle_point(i, segments, radius);
            self.vertex2(x + dx, y + dy);
        }
        self.end();
    }

    /// Filled circle as a fan around the centre; the rim is closed by repeating the first point.
    pub fn fill_circle(&mut self, x: f32, y: f32, radius: f32, segments: u32) {
        let segments = circle_segments(segments);
        self.begin(Primitive::TriangleFan);
        self.vertex2(x, y);
        for i in 0..=segments {
            let (dx, dy) = circle_point(i % segments, segments, radius);
            self.vertex2(x + dx, y + dy);
        }
        self.end();
    }
}

fn circle_segments(segments: u32) -> u32 {
    match segments {
        0 => DEFAULT_CIRCLE_SEGMENTS,
        n => n.max(3),
    }
}

fn circle_point(index: u32, segments: u32, radius: f32) -> (f32, f32) {
    let angle = TAU * index as f32 / segments as f32;
    (angle.cos() * radius, angle.sin() * radius)
}
