use spritegfx::backend::{Capabilities, IndexFormat};
use spritegfx::gx::{FlushedBatch, Gx, Primitive};
use spritegfx::GxVertex;

#[derive(Debug, Clone)]
struct Batch {
    primitive: Primitive,
    vertices: Vec<GxVertex>,
    indices: Vec<u32>,
}

fn caps(native_line_loop: bool, native_triangle_fan: bool) -> Capabilities {
    Capabilities {
        name: "test",
        native_line_loop,
        native_triangle_fan,
        index_format: IndexFormat::U32,
        compute: false,
        preamble: String::new(),
    }
}

fn record(batches: &mut Vec<Batch>) -> impl FnMut(&FlushedBatch<'_>) + '_ {
    move |batch: &FlushedBatch<'_>| {
        batches.push(Batch {
            primitive: batch.primitive,
            vertices: batch.vertices.to_vec(),
            indices: batch.indices.to_vec(),
        })
    }
}

fn positions(batch: &Batch) -> Vec<[f32; 2]> {
    batch
        .vertices
        .iter()
        .map(|v| [v.position[0], v.position[1]])
        .collect()
}

#[test]
fn ten_thousand_triangles_flush_internally_and_submit_every_vertex() {
    let mut gx = Gx::new(16384, &caps(false, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::Triangles);
    for i in 0..30_000 {
        gx.vertex2(i as f32, (i % 7) as f32, &mut sink);
    }
    gx.end(&mut sink);
    drop(sink);

    assert!(gx.stats().internal_flushes >= 1);
    assert!(batches.len() >= 2);
    let total: usize = batches.iter().map(|b| b.vertices.len()).sum();
    assert_eq!(total, 30_000);
    for batch in &batches {
        assert_eq!(batch.vertices.len() % 3, 0);
        assert_eq!(batch.primitive, Primitive::Triangles);
    }
    // Order is preserved across flushes.
    let xs: Vec<f32> = batches
        .iter()
        .flat_map(|b| b.vertices.iter().map(|v| v.position[0]))
        .collect();
    assert!(xs.windows(2).all(|w| w[1] == w[0] + 1.0));
}

#[test]
fn flushed_batches_are_multiples_of_granularity() {
    // Small capacities and odd counts stand in for a fuzzed sweep.
    let cases = [
        (Primitive::Points, 1),
        (Primitive::Lines, 2),
        (Primitive::Triangles, 3),
        (Primitive::Quads, 4),
    ];
    for capacity in [4usize, 5, 7, 10, 13, 32] {
        for (primitive, granularity) in cases {
            for count in [1usize, 3, 8, 17, 50, 101] {
                let mut gx = Gx::new(capacity, &caps(false, false));
                let mut batches = Vec::new();
                let mut sink = record(&mut batches);
                gx.begin(primitive);
                for i in 0..count {
                    gx.vertex2(i as f32, 0.0, &mut sink);
                }
                gx.end(&mut sink);
                drop(sink);

                let mut total = 0;
                for batch in &batches {
                    assert_eq!(
                        batch.vertices.len() % granularity,
                        0,
                        "{:?} capacity {} count {}",
                        primitive,
                        capacity,
                        count
                    );
                    assert!(batch.vertices.len() <= gx.vertex_capacity());
                    total += batch.vertices.len();
                }
                assert_eq!(total, count - count % granularity);
            }
        }
    }
}

#[test]
fn quads_expand_to_two_triangles_each() {
    let mut gx = Gx::new(64, &caps(false, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::Quads);
    for i in 0..12 {
        gx.vertex2(i as f32, 0.0, &mut sink);
    }
    gx.end(&mut sink);
    drop(sink);

    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.primitive, Primitive::Triangles);
    assert_eq!(batch.vertices.len(), 12);
    assert_eq!(batch.indices.len(), 18);
    for (quad, chunk) in batch.indices.chunks(6).enumerate() {
        let base = quad as u32 * 4;
        assert_eq!(
            chunk,
            &[base, base + 1, base + 2, base, base + 2, base + 3]
        );
    }
}

#[test]
fn quads_split_across_flushes_keep_local_indices() {
    let mut gx = Gx::new(8, &caps(false, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::Quads);
    for i in 0..20 {
        gx.vertex2(i as f32, 0.0, &mut sink);
    }
    gx.end(&mut sink);
    drop(sink);

    assert!(batches.len() > 1);
    for batch in &batches {
        let quads = batch.vertices.len() / 4;
        assert_eq!(batch.indices.len(), quads * 6);
        assert!(batch
            .indices
            .iter()
            .all(|&i| (i as usize) < batch.vertices.len()));
    }
}

#[test]
fn line_strip_continues_after_internal_flush() {
    let mut gx = Gx::new(6, &caps(false, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::LineStrip);
    for i in 0..15 {
        gx.vertex2(i as f32, i as f32 * 2.0, &mut sink);
    }
    gx.end(&mut sink);
    drop(sink);

    assert!(batches.len() > 1);
    for pair in batches.windows(2) {
        let last = *pair[0].vertices.last().unwrap();
        assert_eq!(pair[1].vertices[0], last);
    }
    // Every input vertex appears, each batch boundary sharing one vertex.
    let shared = batches.len() - 1;
    let total: usize = batches.iter().map(|b| b.vertices.len()).sum();
    assert_eq!(total, 15 + shared);
}

#[test]
fn triangle_strip_reseeds_last_two_vertices() {
    let mut gx = Gx::new(7, &caps(false, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::TriangleStrip);
    for i in 0..20 {
        gx.vertex2(i as f32, (i % 2) as f32, &mut sink);
    }
    gx.end(&mut sink);
    drop(sink);

    assert!(batches.len() > 1);
    for pair in batches.windows(2) {
        let prev = &pair[0].vertices;
        let tail = &prev[prev.len() - 2..];
        assert_eq!(&pair[1].vertices[..2], tail);
    }
}

#[test]
fn triangle_fan_keeps_center_after_flush() {
    let mut gx = Gx::new(6, &caps(false, true));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::TriangleFan);
    gx.vertex2(100.0, 100.0, &mut sink);
    for i in 0..12 {
        gx.vertex2(i as f32, 0.0, &mut sink);
    }
    gx.end(&mut sink);
    drop(sink);

    assert!(batches.len() > 1);
    for pair in batches.windows(2) {
        assert_eq!(pair[1].primitive, Primitive::TriangleFan);
        assert_eq!(positions(&pair[1])[0], [100.0, 100.0]);
        assert_eq!(pair[1].vertices[1], *pair[0].vertices.last().unwrap());
    }
}

#[test]
fn triangle_fan_without_native_support_becomes_indexed_triangles() {
    let mut gx = Gx::new(64, &caps(false, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::TriangleFan);
    for i in 0..5 {
        gx.vertex2(i as f32, 0.0, &mut sink);
    }
    gx.end(&mut sink);
    drop(sink);

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].primitive, Primitive::Triangles);
    assert_eq!(batches[0].indices, vec![0, 1, 2, 0, 2, 3, 0, 3, 4]);
}

#[test]
fn line_loop_is_closed_when_backend_lacks_loops() {
    let mut gx = Gx::new(64, &caps(false, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::LineLoop);
    gx.vertex2(0.0, 0.0, &mut sink);
    gx.vertex2(10.0, 0.0, &mut sink);
    gx.vertex2(10.0, 10.0, &mut sink);
    gx.end(&mut sink);
    drop(sink);

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].primitive, Primitive::LineStrip);
    assert_eq!(
        positions(&batches[0]),
        vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 0.0]]
    );
}

#[test]
fn native_line_loop_is_passed_through() {
    let mut gx = Gx::new(64, &caps(true, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::LineLoop);
    for i in 0..4 {
        gx.vertex2(i as f32, 0.0, &mut sink);
    }
    gx.end(&mut sink);
    drop(sink);

    assert_eq!(batches[0].primitive, Primitive::LineLoop);
    assert_eq!(batches[0].vertices.len(), 4);
}

#[test]
fn long_line_loop_closes_back_to_its_first_vertex() {
    let mut gx = Gx::new(5, &caps(true, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::LineLoop);
    for i in 0..12 {
        gx.vertex2(i as f32, 1.0, &mut sink);
    }
    gx.end(&mut sink);
    drop(sink);

    assert!(batches.len() > 1);
    assert!(batches.iter().all(|b| b.primitive == Primitive::LineStrip));
    let last = batches.last().unwrap();
    assert_eq!(*positions(last).last().unwrap(), [0.0, 1.0]);
    for pair in batches.windows(2) {
        assert_eq!(pair[1].vertices[0], *pair[0].vertices.last().unwrap());
    }
}

#[test]
fn line_loop_flushed_on_its_last_vertex_still_closes() {
    let mut gx = Gx::new(5, &caps(false, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::LineLoop);
    for i in 0..9 {
        gx.vertex2(i as f32, 1.0, &mut sink);
    }
    gx.end(&mut sink);
    drop(sink);

    let last = batches.last().unwrap();
    assert_eq!(last.primitive, Primitive::LineStrip);
    assert_eq!(positions(last), vec![[8.0, 1.0], [0.0, 1.0]]);
    let total: usize = batches.iter().map(|b| b.vertices.len()).sum();
    assert_eq!(total, 5 + 5 + 2);
}

#[test]
fn incomplete_trailing_primitive_is_dropped() {
    let mut gx = Gx::new(64, &caps(false, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::Triangles);
    for i in 0..8 {
        gx.vertex2(i as f32, 0.0, &mut sink);
    }
    gx.end(&mut sink);

    gx.begin(Primitive::Lines);
    gx.vertex2(0.0, 0.0, &mut sink);
    gx.end(&mut sink);
    drop(sink);

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].vertices.len(), 6);
}

#[test]
fn vertex_attributes_are_latched() {
    let mut gx = Gx::new(64, &caps(false, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    gx.begin(Primitive::Points);
    gx.color4(1.0, 0.0, 0.0, 0.5);
    gx.tex_coord2(0.25, 0.75);
    gx.vertex2(1.0, 2.0, &mut sink);
    gx.color3(0.0, 1.0, 0.0);
    gx.vertex3(3.0, 4.0, 5.0, &mut sink);
    gx.end(&mut sink);
    drop(sink);

    let vertices = &batches[0].vertices;
    assert_eq!(vertices[0].color, [1.0, 0.0, 0.0, 0.5]);
    assert_eq!(vertices[0].texcoord, [0.25, 0.75]);
    assert_eq!(vertices[0].position, [1.0, 2.0, 0.0, 1.0]);
    assert_eq!(vertices[1].color, [0.0, 1.0, 0.0, 1.0]);
    assert_eq!(vertices[1].texcoord, [0.25, 0.75]);
    assert_eq!(vertices[1].position, [3.0, 4.0, 5.0, 1.0]);
}

#[test]
fn draw_indexed_submits_caller_indices() {
    let mut gx = Gx::new(64, &caps(false, false));
    let mut batches = Vec::new();
    let mut sink = record(&mut batches);

    let vertices: Vec<GxVertex> = (0..4)
        .map(|i| GxVertex {
            position: [i as f32, 0.0, 0.0, 1.0],
            ..Default::default()
        })
        .collect();
    gx.draw_indexed(Primitive::Triangles, &vertices, &[0, 1, 2, 2, 3, 0], &mut sink);
    drop(sink);

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].indices, vec![0, 1, 2, 2, 3, 0]);
    assert_eq!(batches[0].vertices, vertices);
    assert!(!gx.is_recording());
}

#[test]
fn recording_state_follows_begin_and_end() {
    let mut gx = Gx::new(64, &caps(false, false));
    let mut sink = |_: &FlushedBatch<'_>| {};
    assert!(!gx.is_recording());
    gx.begin(Primitive::Lines);
    assert_eq!(gx.primitive(), Some(Primitive::Lines));
    gx.end(&mut sink);
    assert_eq!(gx.primitive(), None);
}
