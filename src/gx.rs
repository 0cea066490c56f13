//! Immediate-mode batch engine.
//!
//! Calling code records primitives with `begin`, a stream of vertex calls and `end`. The engine
//! accumulates vertices in a [`GeometryBuffer`] and hands finished batches to a [`BatchSink`],
//! flushing internally whenever the buffer would overflow. Internal flushes only happen on
//! primitive boundaries, and strip, fan and loop primitives are re-seeded after a flush so the
//! drawn shape continues without a gap.

use crate::backend::{Capabilities, IndexFormat};
use crate::geometry::{GeometryBuffer, GxVertex};
use crate::utils::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleFan,
    TriangleStrip,
    Quads,
}

impl Primitive {
    /// Number of vertices forming one indivisible unit. Connected primitives share vertices, so
    /// every vertex completes a unit.
    pub fn granularity(self) -> usize {
        match self {
            Primitive::Triangles => 3,
            Primitive::Quads => 4,
            Primitive::Lines => 2,
            Primitive::Points
            | Primitive::LineLoop
            | Primitive::LineStrip
            | Primitive::TriangleFan
            | Primitive::TriangleStrip => 1,
        }
    }

    /// Fewest vertices that draw anything at all.
    pub fn min_vertices(self) -> usize {
        match self {
            Primitive::Points => 1,
            Primitive::Lines | Primitive::LineLoop | Primitive::LineStrip => 2,
            Primitive::Triangles | Primitive::TriangleFan | Primitive::TriangleStrip => 3,
            Primitive::Quads => 4,
        }
    }
}

/// A batch ready to be drawn. `indices` is empty for non-indexed draws and absolute into
/// `vertices` otherwise.
#[derive(Debug, Clone, Copy)]
pub struct FlushedBatch<'a> {
    pub primitive: Primitive,
    pub vertices: &'a [GxVertex],
    pub indices: &'a [u32],
}

impl FlushedBatch<'_> {
    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }
}

/// Receives finished batches. The render context implements this by binding the active shader,
/// validating the matrix stacks and issuing the backend draw call.
pub trait BatchSink {
    fn submit(&mut self, batch: &FlushedBatch<'_>);
}

impl<F> BatchSink for F
where
    F: FnMut(&FlushedBatch<'_>),
{
    fn submit(&mut self, batch: &FlushedBatch<'_>) {
        self(batch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GxState {
    Idle,
    Recording {
        primitive: Primitive,
        flushed_mid_batch: bool,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GxStats {
    /// Batches handed to the sink, internal flushes included.
    pub batches: u64,
    /// Flushes triggered by the buffer capacity rather than by `end`.
    pub internal_flushes: u64,
    pub vertices: u64,
}

pub struct Gx {
    buffer: GeometryBuffer,
    state: GxState,
    current: GxVertex,
    loop_origin: Option<GxVertex>,
    native_line_loop: bool,
    native_triangle_fan: bool,
    index_format: IndexFormat,
    stats: GxStats,
}

impl Gx {
    pub fn new(vertex_capacity: usize, capabilities: &Capabilities) -> Self {
        let vertex_capacity = vertex_capacity.max(4);
        debug_assert!(
            capabilities.index_format != IndexFormat::U16 || vertex_capacity <= 65536,
            "vertex capacity {} exceeds what 16-bit indices can address",
            vertex_capacity
        );
        Self {
            // Quads expand to 6 indices per 4 vertices, fans to 3 per vertex.
            buffer: GeometryBuffer::new(vertex_capacity + 1, vertex_capacity * 3),
            state: GxState::Idle,
            current: GxVertex::default(),
            loop_origin: None,
            native_line_loop: capabilities.native_line_loop,
            native_triangle_fan: capabilities.native_triangle_fan,
            index_format: capabilities.index_format,
            stats: GxStats::default(),
        }
    }

    /// Vertices recorded before an internal flush is considered.
    pub fn vertex_capacity(&self) -> usize {
        self.buffer.vertex_capacity() - 1
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, GxState::Recording { .. })
    }

    pub fn primitive(&self) -> Option<Primitive> {
        match self.state {
            GxState::Recording { primitive, .. } => Some(primitive),
            GxState::Idle => None,
        }
    }

    pub fn stats(&self) -> GxStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = GxStats::default();
    }

    /// Vertices recorded and not yet flushed.
    pub fn pending_vertices(&self) -> &[GxVertex] {
        self.buffer.vertices()
    }

    pub fn begin(&mut self, primitive: Primitive) {
        if self.is_recording() {
            debug_assert!(false, "begin({:?}) called while already recording", primitive);
            log::error!("begin({:?}) called while recording, dropping pending vertices", primitive);
        }
        self.buffer.reset();
        self.loop_origin = None;
        self.state = GxState::Recording {
            primitive,
            flushed_mid_batch: false,
        };
    }

    pub fn end(&mut self, sink: &mut dyn BatchSink) {
        let GxState::Recording { primitive, .. } = self.state else {
            debug_assert!(false, "end() called without begin()");
            return;
        };
        self.flush(primitive, true, sink);
        self.buffer.reset();
        self.loop_origin = None;
        self.state = GxState::Idle;
    }

    pub fn color(&mut self, color: Color) {
        self.current.color = color.to_array();
    }

    pub fn color4(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.current.color = [r, g, b, a];
    }

    pub fn color3(&mut self, r: f32, g: f32, b: f32) {
        self.current.color = [r, g, b, 1.0];
    }

    pub fn current_color(&self) -> Color {
        let [r, g, b, a] = self.current.color;
        Color::new(r, g, b, a)
    }

    pub fn normal3(&mut self, x: f32, y: f32, z: f32) {
        self.current.normal = [x, y, z];
    }

    pub fn tex_coord2(&mut self, u: f32, v: f32) {
        self.current.texcoord = [u, v];
    }

    pub fn vertex2(&mut self, x: f32, y: f32, sink: &mut dyn BatchSink) {
        self.vertex4(x, y, 0.0, 1.0, sink);
    }

    pub fn vertex3(&mut self, x: f32, y: f32, z: f32, sink: &mut dyn BatchSink) {
        self.vertex4(x, y, z, 1.0, sink);
    }

    pub fn vertex4(&mut self, x: f32, y: f32, z: f32, w: f32, sink: &mut dyn BatchSink) {
        self.current.position = [x, y, z, w];
        let vertex = self.current;
        self.emit_vertex(vertex, sink);
    }

    /// Appends a fully specified vertex, flushing the completed primitives when the buffer is full.
    pub fn emit_vertex(&mut self, vertex: GxVertex, sink: &mut dyn BatchSink) {
        let GxState::Recording { primitive, .. } = self.state else {
            debug_assert!(false, "vertex emitted outside begin()/end()");
            return;
        };

        if primitive == Primitive::LineLoop && self.loop_origin.is_none() {
            self.loop_origin = Some(vertex);
        }
        self.buffer.write_vertex(vertex);

        let count = self.buffer.vertex_count();
        let granularity = primitive.granularity();
        if count + granularity > self.vertex_capacity() && count % granularity == 0 {
            self.flush(primitive, false, sink);
        }
    }

    /// Draws caller-supplied vertices and batch-relative indices as one indexed batch. Only list
    /// primitives are accepted; the call must happen outside `begin`/`end`.
    pub fn draw_indexed(
        &mut self,
        primitive: Primitive,
        vertices: &[GxVertex],
        indices: &[u32],
        sink: &mut dyn BatchSink,
    ) {
        if self.is_recording() {
            debug_assert!(false, "draw_indexed() called while recording");
            return;
        }
        debug_assert!(
            matches!(
                primitive,
                Primitive::Points | Primitive::Lines | Primitive::Triangles
            ),
            "draw_indexed() only supports list primitives, got {:?}",
            primitive
        );
        if vertices.len() > self.vertex_capacity() {
            log::error!(
                "draw_indexed: {} vertices exceed the batch capacity of {}",
                vertices.len(),
                self.vertex_capacity()
            );
            return;
        }
        if indices.is_empty() {
            return;
        }

        self.buffer.reset();
        for &vertex in vertices {
            self.buffer.write_vertex(vertex);
        }
        self.buffer.set_base_vertex(0);
        self.buffer.write_indices(indices);
        self.check_index_range(self.buffer.vertex_count());

        let batch = FlushedBatch {
            primitive,
            vertices: self.buffer.vertices(),
            indices: self.buffer.indices(),
        };
        sink.submit(&batch);
        self.stats.batches += 1;
        self.stats.vertices += vertices.len() as u64;
        self.buffer.reset();
    }

    fn check_index_range(&self, vertex_count: usize) {
        debug_assert!(
            self.index_format != IndexFormat::U16 || vertex_count < 65536,
            "{} vertices cannot be addressed with 16-bit indices",
            vertex_count
        );
    }

    fn flush(&mut self, primitive: Primitive, final_flush: bool, sink: &mut dyn BatchSink) {
        let flushed_mid_batch = matches!(
            self.state,
            GxState::Recording {
                flushed_mid_batch: true,
                ..
            }
        );

        // Carry-over for connected primitives, captured before any closing vertex is appended.
        let seed = if final_flush {
            Vec::new()
        } else {
            self.reseed_vertices(primitive)
        };

        let mut topology = primitive;
        match primitive {
            Primitive::LineLoop => {
                let native = self.native_line_loop && final_flush && !flushed_mid_batch;
                if !native {
                    topology = Primitive::LineStrip;
                    // After an internal flush the buffer may hold only the carried-over vertex,
                    // which still needs its closing edge.
                    let count = self.buffer.vertex_count();
                    if final_flush && (count >= 2 || (flushed_mid_batch && count == 1)) {
                        if let Some(origin) = self.loop_origin {
                            self.buffer.write_vertex(origin);
                        }
                    }
                }
            }
            Primitive::Quads => {
                topology = Primitive::Triangles;
                let quads = self.buffer.vertex_count() / 4;
                self.buffer.set_base_vertex(0);
                for quad in 0..quads as u32 {
                    let base = quad * 4;
                    self.buffer.write_index_triplet(base, base + 1, base + 2);
                    self.buffer.write_index_triplet(base, base + 2, base + 3);
                }
            }
            Primitive::TriangleFan if !self.native_triangle_fan => {
                topology = Primitive::Triangles;
                let count = self.buffer.vertex_count() as u32;
                self.buffer.set_base_vertex(0);
                for i in 1..count.saturating_sub(1) {
                    self.buffer.write_index_triplet(0, i, i + 1);
                }
            }
            _ => {}
        }

        let count = self.buffer.vertex_count();
        let used = count - count % primitive.granularity();
        if count != used {
            log::debug!(
                "dropping {} trailing vertices of an incomplete {:?}",
                count - used,
                primitive
            );
        }

        if used >= primitive.min_vertices() {
            let indices = self.buffer.indices();
            if !indices.is_empty() {
                self.check_index_range(used);
            }
            let batch = FlushedBatch {
                primitive: topology,
                vertices: &self.buffer.vertices()[..used],
                indices,
            };
            sink.submit(&batch);
            self.stats.batches += 1;
            self.stats.vertices += used as u64;
        }

        if !final_flush {
            self.stats.internal_flushes += 1;
            self.buffer.reseed(&seed);
            self.state = GxState::Recording {
                primitive,
                flushed_mid_batch: true,
            };
        }
    }

    fn reseed_vertices(&self, primitive: Primitive) -> Vec<GxVertex> {
        let vertices = self.buffer.vertices();
        let Some(&last) = vertices.last() else {
            return Vec::new();
        };
        match primitive {
            Primitive::LineLoop | Primitive::LineStrip => vec![last],
            Primitive::TriangleFan => vec![vertices[0], last],
            Primitive::TriangleStrip if vertices.len() >= 2 => {
                vertices[vertices.len() - 2..].to_vec()
            }
            Primitive::TriangleStrip => vec![last],
            _ => Vec::new(),
        }
    }
}
