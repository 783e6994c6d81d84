use crate::geom::{
    AttributeMesh, BlendShape, BlendShapeFrame, BlendShapeSource, ChannelMask, ComposeConfig,
    ComposeError, FrameError, FrameOrigin, MeshValidationError, Shape, ShapeFrame, ShapedMesh,
    apply_frame_deltas, compose_blend_shapes, compose_into_host, extract_blend_shape_frames,
    generate_frame_deltas, shapes_from_existing,
};

fn base_quad() -> AttributeMesh {
    AttributeMesh::new(
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        vec![[0.0, 0.0, 1.0]; 4],
        vec![[1.0, 0.0, 0.0, 1.0]; 4],
    )
}

fn offset(mesh: &AttributeMesh, d: [f64; 3]) -> AttributeMesh {
    let mut out = mesh.clone();
    for p in &mut out.positions {
        p[0] += d[0];
        p[1] += d[1];
        p[2] += d[2];
    }
    out
}

fn existing_frame(weight: f64, dz: f64) -> BlendShapeFrame {
    BlendShapeFrame {
        weight,
        delta_positions: vec![[0.0, 0.0, dz]; 4],
        delta_normals: vec![[0.0; 3]; 4],
        delta_tangents: vec![[0.0; 3]; 4],
    }
}

fn approx3(a: [f64; 3], b: [f64; 3]) -> bool {
    (a[0] - b[0]).abs() < 1e-12 && (a[1] - b[1]).abs() < 1e-12 && (a[2] - b[2]).abs() < 1e-12
}

#[test]
fn compose_preserves_unrelated_and_replaces_matching_shapes() {
    let base = base_quad();
    let existing = vec![
        BlendShape::new("Jaw").with_frame(existing_frame(100.0, 0.5)),
        BlendShape::new("Brow")
            .with_frame(existing_frame(50.0, 0.1))
            .with_frame(existing_frame(100.0, 0.2)),
        BlendShape::new("Cheek").with_frame(existing_frame(100.0, 0.3)),
    ];
    let shapes = vec![
        Shape::new("Brow").with_frame(ShapeFrame::new(100.0, offset(&base, [0.0, 0.25, 0.0]))),
        Shape::new("Smile")
            .with_frame(ShapeFrame::new(40.0, offset(&base, [0.1, 0.0, 0.0])))
            .with_frame(ShapeFrame::new(100.0, offset(&base, [0.3, 0.0, 0.0]))),
    ];

    let (frames, diag) =
        compose_blend_shapes(&base, &existing, &shapes, ComposeConfig::default()).unwrap();

    let names: Vec<&str> = frames.iter().map(|f| f.shape_name.as_str()).collect();
    assert_eq!(names, vec!["Jaw", "Cheek", "Brow", "Smile", "Smile"]);
    assert_eq!(frames[0].origin, FrameOrigin::Preserved);
    assert_eq!(frames[0].frame, existing[0].frames[0]);
    assert_eq!(frames[2].origin, FrameOrigin::Composed);
    assert!(approx3(frames[2].frame.delta_positions[3], [0.0, 0.25, 0.0]));
    assert_eq!(frames[3].frame.weight, 40.0);

    assert_eq!(diag.preserved_frame_count, 2);
    assert_eq!(diag.composed_frame_count, 3);
    assert_eq!(diag.dropped_frame_count, 2);
    assert_eq!(diag.replaced_shape_names, vec!["Brow".to_string()]);
    assert_eq!(diag.output_frame_count(), frames.len());
    assert!(diag.is_clean());

    for frame in &frames {
        assert_eq!(frame.frame.delta_positions.len(), 4);
        assert_eq!(frame.frame.delta_normals.len(), 4);
        assert_eq!(frame.frame.delta_tangents.len(), 4);
    }
}

#[test]
fn compose_without_preserve_drops_all_existing() {
    let base = base_quad();
    let existing = vec![BlendShape::new("Jaw").with_frame(existing_frame(100.0, 0.5))];
    let shapes = vec![Shape::new("Smile").with_frame(ShapeFrame::new(100.0, offset(&base, [0.0, 0.0, 1.0])))];

    let (frames, diag) =
        compose_blend_shapes(&base, &existing, &shapes, ComposeConfig::new(false)).unwrap();

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].shape_name, "Smile");
    assert_eq!(diag.preserved_frame_count, 0);
    assert_eq!(diag.dropped_frame_count, 1);
    assert!(diag.replaced_shape_names.is_empty());
}

#[test]
fn compose_skips_bad_frames_and_continues() {
    let base = base_quad();
    let short = AttributeMesh::from_positions(vec![[0.0; 3]; 3]);
    let shapes = vec![
        Shape::new("Blink")
            .with_frame(ShapeFrame::unresolved(50.0))
            .with_frame(ShapeFrame::new(100.0, offset(&base, [0.0, 0.0, -0.1]))),
        Shape::new("Broken").with_frame(ShapeFrame::new(100.0, short)),
    ];

    let (frames, diag) = compose_blend_shapes(&base, &[], &shapes, ComposeConfig::default()).unwrap();

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frame.weight, 100.0);
    assert_eq!(diag.skipped_frames.len(), 2);
    assert_eq!(diag.skipped_frames[0].shape_name, "Blink");
    assert_eq!(diag.skipped_frames[0].error, FrameError::MissingTarget);
    assert_eq!(
        diag.skipped_frames[1].error,
        FrameError::VertexCountMismatch {
            expected: 4,
            found: 3
        }
    );
    assert_eq!(diag.empty_shape_names, vec!["Broken".to_string()]);
    assert!(!diag.is_clean());
}

#[test]
fn authored_shape_without_valid_frames_still_replaces_existing() {
    let base = base_quad();
    let existing = vec![BlendShape::new("Brow").with_frame(existing_frame(100.0, 0.1))];
    let shapes = vec![Shape::new("Brow").with_frame(ShapeFrame::unresolved(100.0))];

    let (frames, diag) =
        compose_blend_shapes(&base, &existing, &shapes, ComposeConfig::default()).unwrap();
    assert!(frames.is_empty());
    assert_eq!(diag.dropped_frame_count, 1);
}

#[test]
fn compose_rejects_invalid_base_and_mismatched_existing() {
    let shapes: Vec<Shape> = Vec::new();
    assert_eq!(
        compose_blend_shapes(&AttributeMesh::default(), &[], &shapes, ComposeConfig::default()),
        Err(ComposeError::InvalidBaseMesh(MeshValidationError::Empty))
    );

    let mut lopsided = base_quad();
    lopsided.normals.pop();
    assert!(matches!(
        compose_blend_shapes(&lopsided, &[], &shapes, ComposeConfig::default()),
        Err(ComposeError::DimensionMismatch { expected: 4, found: 3, .. })
    ));

    let mut bad = existing_frame(100.0, 0.1);
    bad.delta_tangents.truncate(2);
    let existing = vec![BlendShape::new("Jaw").with_frame(bad)];
    assert!(matches!(
        compose_blend_shapes(&base_quad(), &existing, &shapes, ComposeConfig::default()),
        Err(ComposeError::DimensionMismatch { expected: 4, found: 2, .. })
    ));
}

#[test]
fn discarded_existing_frames_are_not_validated() {
    let mut bad = existing_frame(100.0, 0.1);
    bad.delta_tangents.truncate(2);
    let existing = vec![BlendShape::new("Jaw").with_frame(bad)];

    let (frames, diag) =
        compose_blend_shapes(&base_quad(), &existing, &[], ComposeConfig::new(false)).unwrap();
    assert!(frames.is_empty());
    assert_eq!(diag.dropped_frame_count, 1);

    // Replaced by an authored shape of the same name.
    let shapes = vec![Shape::new("Jaw")];
    let (frames, diag) =
        compose_blend_shapes(&base_quad(), &existing, &shapes, ComposeConfig::default()).unwrap();
    assert!(frames.is_empty());
    assert_eq!(diag.dropped_frame_count, 1);
    assert_eq!(diag.replaced_shape_names, vec!["Jaw".to_string()]);
}

#[test]
fn delta_round_trip_restores_enabled_channels() {
    let base = base_quad();
    let mut target = offset(&base, [0.2, -0.4, 0.6]);
    target.normals = vec![[0.0, 1.0, 0.0]; 4];
    target.tangents = vec![[0.0, 0.0, 1.0, 1.0]; 4];

    let frame = generate_frame_deltas(&base, &target, 100.0, ChannelMask::ALL).unwrap();
    let rebuilt = apply_frame_deltas(&base, &frame).unwrap();
    for i in 0..4 {
        assert!(approx3(rebuilt.positions[i], target.positions[i]));
        assert!(approx3(rebuilt.normals[i], target.normals[i]));
    }

    let masked =
        generate_frame_deltas(&base, &target, 100.0, ChannelMask::ALL.normal(false)).unwrap();
    let rebuilt = apply_frame_deltas(&base, &masked).unwrap();
    assert_eq!(rebuilt.normals, base.normals);
}

#[test]
fn converting_existing_shapes_reproduces_their_deltas() {
    let base = base_quad();
    let existing = vec![
        BlendShape::new("Jaw")
            .with_frame(existing_frame(30.0, 0.5))
            .with_frame(existing_frame(90.0, 1.0)),
    ];

    let shapes = shapes_from_existing(&base, &existing).unwrap();
    assert_eq!(shapes.len(), 1);
    let weights: Vec<f64> = shapes[0].frames.iter().map(|f| f.weight).collect();
    assert_eq!(weights, vec![50.0, 100.0]);

    let extracted = extract_blend_shape_frames(&base, &existing[0]).unwrap();
    assert_eq!(extracted.len(), 2);
    assert!(approx3(extracted[1].positions[2], [1.0, 1.0, 1.0]));

    let (frames, _) = compose_blend_shapes(&base, &existing, &shapes, ComposeConfig::default()).unwrap();
    assert_eq!(frames.len(), 2);
    for (composed, original) in frames.iter().zip(&existing[0].frames) {
        for (a, b) in composed.frame.delta_positions.iter().zip(&original.delta_positions) {
            assert!(approx3(*a, *b));
        }
    }
}

#[test]
fn compose_into_host_installs_frames_and_keeps_host_on_error() {
    let base = base_quad();
    let mut host = ShapedMesh::new(base.clone())
        .with_blend_shape(BlendShape::new("Jaw").with_frame(existing_frame(100.0, 0.5)));

    let shapes = vec![Shape::new("Smile").with_frame(ShapeFrame::new(100.0, offset(&base, [0.0, 0.1, 0.0])))];
    let diag = compose_into_host(&mut host, &shapes, ComposeConfig::default()).unwrap();
    assert_eq!(diag.output_frame_count(), 2);
    assert_eq!(host.blend_shape_count(), 2);
    assert_eq!(host.blend_shape_name(1), Some("Smile"));

    let mut broken = ShapedMesh::new(AttributeMesh::default())
        .with_blend_shape(BlendShape::new("Jaw"));
    let before = broken.clone();
    assert!(compose_into_host(&mut broken, &shapes, ComposeConfig::default()).is_err());
    assert_eq!(broken, before);
}
