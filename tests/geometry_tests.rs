use spritegfx::geometry::{GeometryBuffer, GxVertex};

fn vertex(x: f32) -> GxVertex {
    GxVertex {
        position: [x, 0.0, 0.0, 1.0],
        ..Default::default()
    }
}

#[test]
fn vertex_stride_matches_the_interleaved_layout() {
    assert_eq!(GxVertex::STRIDE, (4 + 3 + 4 + 2) * 4);
    let v = GxVertex::default();
    assert_eq!(v.color, [1.0; 4]);
    assert_eq!(v.position[3], 1.0);
}

#[test]
fn indices_are_relative_to_the_base_vertex() {
    let mut buffer = GeometryBuffer::new(16, 32);
    for i in 0..3 {
        buffer.write_vertex(vertex(i as f32));
    }
    buffer.write_index_triplet(0, 1, 2);

    buffer.set_base_vertex(3);
    for i in 3..6 {
        buffer.write_vertex(vertex(i as f32));
    }
    buffer.write_indices(&[0, 2, 1]);

    assert_eq!(buffer.indices(), &[0, 1, 2, 3, 5, 4]);
    assert_eq!(buffer.vertex_count(), 6);
    assert_eq!(buffer.index_count(), 6);
    assert_eq!(buffer.base_vertex(), 3);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "references vertex")]
fn index_past_the_written_vertices_is_fatal() {
    let mut buffer = GeometryBuffer::new(16, 32);
    buffer.write_vertex(vertex(0.0));
    buffer.write_vertex(vertex(1.0));
    buffer.write_index_triplet(0, 1, 2);
}

#[test]
fn reseed_replaces_contents_with_the_carry_over() {
    let mut buffer = GeometryBuffer::new(8, 8);
    for i in 0..5 {
        buffer.write_vertex(vertex(i as f32));
    }
    buffer.write_index_triplet(0, 1, 2);
    let tail = buffer.vertices()[3..].to_vec();

    buffer.reseed(&tail);
    assert_eq!(buffer.vertices(), tail.as_slice());
    assert_eq!(buffer.index_count(), 0);
    assert_eq!(buffer.last_vertex(), Some(vertex(4.0)));
    assert_eq!(buffer.vertex_capacity(), 8);

    buffer.reset();
    assert_eq!(buffer.vertex_count(), 0);
    assert_eq!(buffer.last_vertex(), None);
}
