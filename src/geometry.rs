//! Vertex and index storage for one draw batch.

use bytemuck::{Pod, Zeroable};

/// Interleaved vertex record handed to backends. Stride is `size_of::<GxVertex>()`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GxVertex {
    pub position: [f32; 4],
    pub normal: [f32; 3],
    pub color: [f32; 4],
    pub texcoord: [f32; 2],
}

impl Default for GxVertex {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0, 1.0],
            normal: [0.0, 0.0, 1.0],
            color: [1.0, 1.0, 1.0, 1.0],
            texcoord: [0.0, 0.0],
        }
    }
}

impl GxVertex {
    pub const STRIDE: usize = std::mem::size_of::<GxVertex>();
}

/// Fixed-capacity vertex and index storage.
///
/// The buffer never grows past the capacity it was built with and never checks bounds on write:
/// the batch engine flushes before the capacity is reached. Indices are relative to the base vertex
/// of the current batch; in debug builds an index that does not refer to an already written vertex
/// is a fatal assertion.
#[derive(Debug)]
pub struct GeometryBuffer {
    vertices: Vec<GxVertex>,
    indices: Vec<u32>,
    vertex_capacity: usize,
    index_capacity: usize,
    base_vertex: u32,
}

impl GeometryBuffer {
    pub fn new(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_capacity),
            indices: Vec::with_capacity(index_capacity),
            vertex_capacity,
            index_capacity,
            base_vertex: 0,
        }
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertex_capacity
    }

    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn vertices(&self) -> &[GxVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Vertex offset that relative indices are measured from.
    pub fn base_vertex(&self) -> u32 {
        self.base_vertex
    }

    /// Marks the current end of the vertex stream as the base for subsequent relative indices.
    pub fn set_base_vertex(&mut self, base: u32) {
        debug_assert!(base as usize <= self.vertices.len());
        self.base_vertex = base;
    }

    pub fn write_vertex(&mut self, vertex: GxVertex) {
        self.vertices.push(vertex);
    }

    pub fn write_index_triplet(&mut self, i0: u32, i1: u32, i2: u32) {
        for index in [i0, i1, i2] {
            self.push_index(index);
        }
    }

    pub fn write_indices(&mut self, indices: &[u32]) {
        for &index in indices {
            self.push_index(index);
        }
    }

    fn push_index(&mut self, relative: u32) {
        let absolute = self.base_vertex + relative;
        debug_assert!(
            (absolute as usize) < self.vertices.len(),
            "index {} references vertex {} but only {} vertices were written",
            relative,
            absolute,
            self.vertices.len()
        );
        self.indices.push(absolute);
    }

    pub fn last_vertex(&self) -> Option<GxVertex> {
        self.vertices.last().copied()
    }

    /// Empties the buffer without releasing its storage.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.base_vertex = 0;
    }

    /// Empties the buffer and refills it with `seed`, used to carry strip and fan state across a
    /// flush.
    pub fn reseed(&mut self, seed: &[GxVertex]) {
        self.reset();
        self.vertices.extend_from_slice(seed);
    }
}
