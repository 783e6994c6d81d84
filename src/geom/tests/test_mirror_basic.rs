use crate::geom::{
    MirrorError, MirrorMode, MirrorOptions, Vec3, apply_mirror, apply_mirror_from_source_side,
    build_mirror_relation,
};

/// Symmetric strip across x = 0 with a column of vertices on the plane.
fn symmetric_strip() -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
    let mut points = Vec::new();
    let mut normals = Vec::new();
    for row in 0..4 {
        let y = f64::from(row) * 0.5;
        for x in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            points.push([x, y, 0.25 * x * x]);
            normals.push([-0.5 * x, 0.0, 1.0]);
        }
    }
    (points, normals)
}

#[test]
fn four_point_cross_pairs_x_and_keeps_axis_vertices() {
    let points = [[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, -1.0, 0.0]];
    let mut normals = vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, -1.0]];

    let (relation, diag) = build_mirror_relation(
        &points,
        &normals,
        Vec3::new(1.0, 0.0, 0.0),
        MirrorOptions::default().epsilon(0.01),
    )
    .unwrap();
    assert_eq!(relation.partners(), &[1, 0, 2, 3]);
    assert_eq!(diag.pair_count, 1);
    assert_eq!(diag.self_mapped_count, 2);

    apply_mirror(&relation, &mut normals).unwrap();
    assert_eq!(normals[0], [1.0, 0.0, 0.0]);
    assert_eq!(normals[1], [-1.0, 0.0, 0.0]);
    assert_eq!(normals[2], [0.0, 0.0, 1.0]);
    assert_eq!(normals[3], [0.0, 0.0, -1.0]);
}

#[test]
fn relation_is_involution_for_every_mode() {
    let (points, normals) = symmetric_strip();
    // Rotate the strip so each axis gets a symmetric set.
    for mode in MirrorMode::ALL {
        let n = mode.plane_normal();
        let rotated: Vec<[f64; 3]> = points
            .iter()
            .map(|p| match (n.x != 0.0, n.y != 0.0) {
                (true, _) => *p,
                (_, true) => [p[1], p[0], p[2]],
                _ => [p[1], p[2], p[0]],
            })
            .collect();
        let rotated_normals: Vec<[f64; 3]> = normals
            .iter()
            .map(|v| match (n.x != 0.0, n.y != 0.0) {
                (true, _) => *v,
                (_, true) => [v[1], v[0], v[2]],
                _ => [v[1], v[2], v[0]],
            })
            .collect();

        let (relation, diag) =
            build_mirror_relation(&rotated, &rotated_normals, n, MirrorOptions::default())
                .unwrap_or_else(|e| panic!("{mode}: {e}"));
        assert!(relation.is_involution(), "{mode}");
        assert_eq!(diag.self_mapped_count, 4, "{mode}");
        assert_eq!(diag.pair_count, 8, "{mode}");
        assert_eq!(diag.normal_mismatch_count, 0, "{mode}");
    }
}

#[test]
fn vertex_moved_past_tolerance_is_not_symmetric() {
    let (mut points, normals) = symmetric_strip();
    points[6][0] -= 0.002;
    let err = build_mirror_relation(&points, &normals, Vec3::X, MirrorOptions::default()).unwrap_err();
    assert!(matches!(err, MirrorError::NotSymmetric { .. }));

    // Within tolerance it still pairs.
    let (mut points, normals) = symmetric_strip();
    points[6][0] -= 0.0005;
    assert!(build_mirror_relation(&points, &normals, Vec3::X, MirrorOptions::default()).is_ok());
}

#[test]
fn apply_mirror_is_idempotent() {
    let (points, normals) = symmetric_strip();
    let (relation, _) =
        build_mirror_relation(&points, &normals, Vec3::X, MirrorOptions::default()).unwrap();

    let mut edited = normals.clone();
    edited[0] = [0.6, 0.0, 0.8];
    apply_mirror(&relation, &mut edited).unwrap();
    let once = edited.clone();
    apply_mirror(&relation, &mut edited).unwrap();
    assert_eq!(once, edited);

    let partner = relation.partner(0).unwrap();
    assert_eq!(points[partner], [1.0, 0.0, 0.25]);
    assert_eq!(edited[partner], [-0.6, 0.0, 0.8]);
}

#[test]
fn source_side_mirroring_follows_mode() {
    let (points, normals) = symmetric_strip();
    let mode = MirrorMode::RightToLeft;
    let (relation, _) = build_mirror_relation(
        &points,
        &normals,
        mode.plane_normal(),
        MirrorOptions::default(),
    )
    .unwrap();

    // Edit the right-hand vertex (x = 1) of the first row.
    let mut edited = normals.clone();
    edited[4] = [0.0, 0.6, 0.8];
    apply_mirror_from_source_side(&relation, &points, &mut edited).unwrap();
    assert_eq!(edited[0], [0.0, 0.6, 0.8]);
    assert_eq!(edited[4], [0.0, 0.6, 0.8]);

    // The opposite mode would overwrite the edit from the left side instead.
    let (relation, _) = build_mirror_relation(
        &points,
        &normals,
        MirrorMode::LeftToRight.plane_normal(),
        MirrorOptions::default(),
    )
    .unwrap();
    let mut edited = normals.clone();
    edited[4] = [0.0, 0.6, 0.8];
    apply_mirror_from_source_side(&relation, &points, &mut edited).unwrap();
    assert_eq!(edited[4], normals[4]);
}

#[test]
fn normal_check_prefers_compatible_partner() {
    // Two coincident candidates at x = -1; only the second has a matching normal.
    let points = [[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
    let normals = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let (relation, diag) =
        build_mirror_relation(&points, &normals, Vec3::X, MirrorOptions::default()).unwrap();
    assert_eq!(relation.partners(), &[2, 3, 0, 1]);
    assert_eq!(diag.normal_mismatch_count, 0);

    let (relation, _) = build_mirror_relation(
        &points,
        &normals,
        Vec3::X,
        MirrorOptions::default().normal_threshold(None),
    )
    .unwrap();
    assert_eq!(relation.partners(), &[1, 0, 3, 2]);
}

#[test]
fn near_duplicate_candidates_are_rematched() {
    // Vertex 0 grabs 3 first; 1 and 2 can only be paired by moving 0 over to 2.
    let points = [
        [1.0, 0.0, 0.0],
        [0.9993, 0.0, 0.0],
        [-1.0008, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
    ];
    let normals = [[1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]];
    let (relation, diag) =
        build_mirror_relation(&points, &normals, Vec3::X, MirrorOptions::new(1e-3)).unwrap();
    assert_eq!(relation.partners(), &[2, 3, 0, 1]);
    assert!(relation.is_involution());
    assert_eq!(diag.pair_count, 2);
    assert_eq!(diag.self_mapped_count, 0);
    assert_eq!(diag.normal_mismatch_count, 0);
}

#[test]
fn two_vertices_sharing_one_partner_are_not_symmetric() {
    let points = [[1.0, 0.0, 0.0], [1.0004, 0.0, 0.0], [-1.0, 0.0, 0.0]];
    let normals = [[0.0, 0.0, 1.0]; 3];
    let err = build_mirror_relation(&points, &normals, Vec3::X, MirrorOptions::new(1e-3))
        .unwrap_err();
    assert_eq!(err, MirrorError::NotSymmetric { vertex: 1 });
}
