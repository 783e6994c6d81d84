#[cfg(target_arch = "wasm32")]
fn main() {
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("shape_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use shape_engine::geom::{
        AttributeMesh, BlendShape, BlendShapeFrame, ChannelMask, ComposeConfig, ComposeDiagnostics,
        ComposedFrame, MirrorDiagnostics, MirrorMode, MirrorOptions, MirrorRelationCache, Shape,
        ShapeFrame, ShapedMesh, apply_mirror_from_source_side, build_mirror_relation,
        compose_blend_shapes, compose_into_host, evaluate_blend_shape,
    };
    use std::fmt::Write as _;
    use std::fs;
    use std::path::{Path, PathBuf};

    const SNAPSHOT_QUANTIZE: f64 = 1e-6;
    const SNAPSHOT_DECIMALS: usize = 6;

    const USAGE: &str = r#"shape_cli (shape-engine)

USAGE:
  shape_cli list
  shape_cli run <scenario|all> [options]

SCENARIOS:
  compose_face_preserve
  compose_replace_existing
  mirror_cross_x
  mirror_face_modes
  evaluate_inbetween

OPTIONS (run):
  --out-dir <dir>    Write <scenario>.snap to this dir (required for `all`)
  --snap <path>      Write golden-style snapshot (single scenario only)
  --overwrite        Overwrite existing output files
  -h, --help         Show this help
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                print_scenarios();
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn print_scenarios() {
        for scenario in Scenario::ALL {
            println!("{}", scenario.name());
        }
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;

        let mut out_dir: Option<PathBuf> = None;
        let mut snap_path: Option<PathBuf> = None;
        let mut overwrite = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--out-dir" => out_dir = Some(PathBuf::from(args.value("--out-dir")?)),
                "--snap" => snap_path = Some(PathBuf::from(args.value("--snap")?)),
                "--overwrite" => overwrite = true,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        if let Some(dir) = out_dir.as_ref() {
            if snap_path.is_some() {
                return Err("use either --out-dir or --snap (not both)".to_string());
            }

            fs::create_dir_all(dir).map_err(|e| format!("create out dir: {e}"))?;

            if scenario_name == "all" {
                for scenario in Scenario::ALL {
                    run_one_scenario_to_dir(*scenario, dir, overwrite)?;
                }
                return Ok(());
            }

            let scenario = Scenario::from_str(scenario_name.as_str())
                .ok_or_else(|| unknown_scenario(&scenario_name))?;
            return run_one_scenario_to_dir(scenario, dir, overwrite);
        }

        if scenario_name == "all" {
            return Err("`run all` requires --out-dir".to_string());
        }

        let scenario =
            Scenario::from_str(scenario_name.as_str()).ok_or_else(|| unknown_scenario(&scenario_name))?;
        let output = run_scenario(scenario)?;

        if let Some(path) = snap_path.as_deref() {
            write_text_file(path, &output.snapshot, overwrite)?;
            eprintln!("wrote {}", path.display());
        } else {
            print!("{}", output.snapshot);
        }

        eprintln!("{}: {}", output.name, output.summary);
        Ok(())
    }

    fn run_one_scenario_to_dir(scenario: Scenario, dir: &Path, overwrite: bool) -> Result<(), String> {
        let output = run_scenario(scenario)?;
        let path = dir.join(format!("{}.snap", output.name));
        write_text_file(&path, &output.snapshot, overwrite)?;
        eprintln!("wrote {}", path.display());
        eprintln!("{}: {}", output.name, output.summary);
        Ok(())
    }

    fn unknown_scenario(name: &str) -> String {
        let mut msg = String::new();
        msg.push_str(&format!("unknown scenario `{name}`\n\navailable scenarios:\n"));
        for scenario in Scenario::ALL {
            msg.push_str(&format!("  {}\n", scenario.name()));
        }
        msg
    }

    fn write_text_file(path: &Path, text: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        fs::write(path, normalize_snapshot_text(text)).map_err(|e| format!("write {}: {e}", path.display()))
    }

    fn normalize_snapshot_text(text: &str) -> String {
        let normalized = text.replace("\r\n", "\n");
        if normalized.ends_with('\n') {
            normalized
        } else {
            format!("{normalized}\n")
        }
    }

    fn quantize_f64(value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let value = if value == -0.0 { 0.0 } else { value };
        let q = (value / SNAPSHOT_QUANTIZE).round() * SNAPSHOT_QUANTIZE;
        if q == -0.0 { 0.0 } else { q }
    }

    fn write_f64(out: &mut String, value: f64) {
        let value = quantize_f64(value);
        let _ = write!(out, "{value:.SNAPSHOT_DECIMALS$}");
    }

    fn write_vec3_line(out: &mut String, prefix: &str, v: [f64; 3]) {
        let _ = write!(out, "{prefix} ");
        write_f64(out, v[0]);
        out.push(' ');
        write_f64(out, v[1]);
        out.push(' ');
        write_f64(out, v[2]);
        out.push('\n');
    }

    fn write_compose_diagnostics(out: &mut String, diag: &ComposeDiagnostics) {
        let _ = writeln!(out, "compose_diag.vertex_count {}", diag.vertex_count);
        let _ = writeln!(out, "compose_diag.preserved_frame_count {}", diag.preserved_frame_count);
        let _ = writeln!(out, "compose_diag.dropped_frame_count {}", diag.dropped_frame_count);
        let _ = writeln!(out, "compose_diag.composed_frame_count {}", diag.composed_frame_count);
        let _ = writeln!(out, "compose_diag.replaced_shapes {}", diag.replaced_shape_names.join(","));
        let _ = writeln!(out, "compose_diag.empty_shapes {}", diag.empty_shape_names.join(","));
        for skipped in &diag.skipped_frames {
            let _ = writeln!(
                out,
                "compose_diag.skipped {}[{}] {}",
                skipped.shape_name, skipped.frame_index, skipped.error
            );
        }
    }

    fn write_mirror_diagnostics(out: &mut String, diag: &MirrorDiagnostics) {
        let _ = writeln!(out, "mirror_diag.vertex_count {}", diag.vertex_count);
        let _ = writeln!(out, "mirror_diag.pair_count {}", diag.pair_count);
        let _ = writeln!(out, "mirror_diag.self_mapped_count {}", diag.self_mapped_count);
        let _ = writeln!(out, "mirror_diag.ambiguous_count {}", diag.ambiguous_count);
        let _ = writeln!(out, "mirror_diag.normal_mismatch_count {}", diag.normal_mismatch_count);
    }

    fn write_frames(out: &mut String, frames: &[ComposedFrame]) {
        let _ = writeln!(out, "frames.count {}", frames.len());
        for (i, composed) in frames.iter().enumerate() {
            let _ = write!(out, "frame {i} {} {:?} ", composed.shape_name, composed.origin);
            write_f64(out, composed.frame.weight);
            out.push('\n');
            for d in &composed.frame.delta_positions {
                write_vec3_line(out, "dv", *d);
            }
            for d in &composed.frame.delta_normals {
                write_vec3_line(out, "dn", *d);
            }
            for d in &composed.frame.delta_tangents {
                write_vec3_line(out, "dt", *d);
            }
        }
    }

    fn write_partners(out: &mut String, prefix: &str, partners: &[usize]) {
        let list: Vec<String> = partners.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "{prefix} {}", list.join(" "));
    }

    fn snapshot(op: &str, sections: impl FnOnce(&mut String)) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# shape-engine golden v1");
        let _ = writeln!(out, "op {op}");
        let _ = writeln!(out, "quantize {SNAPSHOT_QUANTIZE:.1e}");
        sections(&mut out);
        normalize_snapshot_text(&out)
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scenario {
        ComposeFacePreserve,
        ComposeReplaceExisting,
        MirrorCrossX,
        MirrorFaceModes,
        EvaluateInbetween,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::ComposeFacePreserve,
            Scenario::ComposeReplaceExisting,
            Scenario::MirrorCrossX,
            Scenario::MirrorFaceModes,
            Scenario::EvaluateInbetween,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::ComposeFacePreserve => "compose_face_preserve",
                Scenario::ComposeReplaceExisting => "compose_replace_existing",
                Scenario::MirrorCrossX => "mirror_cross_x",
                Scenario::MirrorFaceModes => "mirror_face_modes",
                Scenario::EvaluateInbetween => "evaluate_inbetween",
            }
        }

        fn from_str(name: &str) -> Option<Self> {
            match name {
                "compose_face_preserve" => Some(Scenario::ComposeFacePreserve),
                "compose_replace_existing" => Some(Scenario::ComposeReplaceExisting),
                "mirror_cross_x" => Some(Scenario::MirrorCrossX),
                "mirror_face_modes" => Some(Scenario::MirrorFaceModes),
                "evaluate_inbetween" => Some(Scenario::EvaluateInbetween),
                _ => None,
            }
        }
    }

    struct ScenarioOutput {
        name: &'static str,
        summary: String,
        snapshot: String,
    }

    fn run_scenario(scenario: Scenario) -> Result<ScenarioOutput, String> {
        match scenario {
            Scenario::ComposeFacePreserve => scenario_compose_face_preserve(),
            Scenario::ComposeReplaceExisting => scenario_compose_replace_existing(),
            Scenario::MirrorCrossX => scenario_mirror_cross_x(),
            Scenario::MirrorFaceModes => scenario_mirror_face_modes(),
            Scenario::EvaluateInbetween => scenario_evaluate_inbetween(),
        }
    }

    /// 3x3 grid in the XY plane, symmetric across x = 0.
    fn face_grid() -> AttributeMesh {
        let mut positions = Vec::with_capacity(9);
        for y in [0.0, 0.5, 1.0] {
            for x in [-0.5, 0.0, 0.5] {
                positions.push([x, y, 0.0]);
            }
        }
        let n = positions.len();
        AttributeMesh::new(positions, vec![[0.0, 0.0, 1.0]; n], vec![[1.0, 0.0, 0.0, 1.0]; n])
    }

    fn raise_rows(base: &AttributeMesh, min_y: f64, dy: f64) -> AttributeMesh {
        let mut out = base.clone();
        for p in &mut out.positions {
            if p[1] >= min_y {
                p[1] += dy;
            }
        }
        out
    }

    fn scenario_compose_face_preserve() -> Result<ScenarioOutput, String> {
        let base = face_grid();
        let n = base.vertex_count();
        let existing = vec![
            BlendShape::new("Blink").with_frame(BlendShapeFrame::zeroed(100.0, n)),
            BlendShape::new("BrowUp").with_frame(BlendShapeFrame::zeroed(100.0, n)),
        ];
        let shapes = vec![
            Shape::new("BrowUp")
                .with_frame(ShapeFrame::new(100.0, raise_rows(&base, 0.9, 0.1)))
                .with_frame(ShapeFrame::new(50.0, raise_rows(&base, 0.9, 0.05))),
            Shape::new("Sneer").with_frame(ShapeFrame::unresolved(100.0)),
        ];

        let (frames, diag) = compose_blend_shapes(&base, &existing, &shapes, ComposeConfig::default())
            .map_err(|e| format!("compose failed: {e}"))?;

        let snapshot = snapshot("compose_blend_shapes preserve_existing=true", |out| {
            write_compose_diagnostics(out, &diag);
            write_frames(out, &frames);
        });
        Ok(ScenarioOutput {
            name: Scenario::ComposeFacePreserve.name(),
            summary: diag.summary(),
            snapshot,
        })
    }

    fn scenario_compose_replace_existing() -> Result<ScenarioOutput, String> {
        let base = face_grid();
        let n = base.vertex_count();
        let mut host = ShapedMesh::new(base.clone())
            .with_blend_shape(BlendShape::new("Blink").with_frame(BlendShapeFrame::zeroed(100.0, n)));
        let shapes = vec![Shape::new("JawOpen").with_frame(
            ShapeFrame::new(100.0, raise_rows(&base, -1.0, -0.2))
                .with_channels(ChannelMask::ALL.normal(false).tangent(false)),
        )];

        let diag = compose_into_host(&mut host, &shapes, ComposeConfig::new(false))
            .map_err(|e| format!("compose failed: {e}"))?;

        let snapshot = snapshot("compose_into_host preserve_existing=false", |out| {
            write_compose_diagnostics(out, &diag);
            let _ = writeln!(out, "host.blend_shape_count {}", host.blend_shapes.len());
            for shape in &host.blend_shapes {
                let _ = writeln!(out, "host.blend_shape {} frames={}", shape.name, shape.frames.len());
            }
        });
        Ok(ScenarioOutput {
            name: Scenario::ComposeReplaceExisting.name(),
            summary: diag.summary(),
            snapshot,
        })
    }

    fn scenario_mirror_cross_x() -> Result<ScenarioOutput, String> {
        let points = vec![
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
        ];
        let normals = points.clone();
        let mode = MirrorMode::RightToLeft;

        let (relation, diag) =
            build_mirror_relation(&points, &normals, mode.plane_normal(), MirrorOptions::default())
                .map_err(|e| format!("mirror relation failed: {e}"))?;

        let mut edited = normals.clone();
        edited[1] = [-0.6, 0.8, 0.0];
        apply_mirror_from_source_side(&relation, &points, &mut edited)
            .map_err(|e| format!("mirror apply failed: {e}"))?;

        let snapshot = snapshot(&format!("build_mirror_relation mode={mode}"), |out| {
            write_mirror_diagnostics(out, &diag);
            write_partners(out, "partners", relation.partners());
            for n in &edited {
                write_vec3_line(out, "n", *n);
            }
        });
        Ok(ScenarioOutput {
            name: Scenario::MirrorCrossX.name(),
            summary: diag.summary(),
            snapshot,
        })
    }

    fn scenario_mirror_face_modes() -> Result<ScenarioOutput, String> {
        let base = face_grid();
        let mut cache = MirrorRelationCache::new();
        let mut sections = String::new();

        for mode in MirrorMode::ALL {
            match cache.get_or_build(&base.positions, &base.normals, mode.plane_normal(), MirrorOptions::default()) {
                Ok(relation) => {
                    let _ = writeln!(sections, "mode {mode} involution={}", relation.is_involution());
                    write_partners(&mut sections, "partners", relation.partners());
                }
                Err(err) => {
                    let _ = writeln!(sections, "mode {mode} error {err}");
                }
            }
        }

        let stats = cache.stats();
        let summary = format!("misses={} failures={}", stats.misses, stats.failures);
        let snapshot = snapshot("mirror_relation_cache all_modes", |out| {
            out.push_str(&sections);
            let _ = writeln!(out, "cache.misses {}", stats.misses);
            let _ = writeln!(out, "cache.failures {}", stats.failures);
        });
        Ok(ScenarioOutput {
            name: Scenario::MirrorFaceModes.name(),
            summary,
            snapshot,
        })
    }

    fn scenario_evaluate_inbetween() -> Result<ScenarioOutput, String> {
        let base = face_grid();
        let shapes = vec![
            Shape::new("BrowUp")
                .with_frame(ShapeFrame::new(50.0, raise_rows(&base, 0.9, 0.05)))
                .with_frame(ShapeFrame::new(100.0, raise_rows(&base, 0.9, 0.2))),
        ];
        let (frames, diag) = compose_blend_shapes(&base, &[], &shapes, ComposeConfig::default())
            .map_err(|e| format!("compose failed: {e}"))?;

        let mut brow = BlendShape::new("BrowUp");
        brow.frames = frames.into_iter().map(|composed| composed.frame).collect();

        let mut sections = String::new();
        for weight in [0.0, 25.0, 50.0, 75.0, 100.0, 150.0] {
            let mesh = evaluate_blend_shape(&base, &brow, weight)
                .map_err(|e| format!("evaluate failed: {e}"))?;
            let _ = write!(sections, "weight ");
            write_f64(&mut sections, weight);
            sections.push('\n');
            write_vec3_line(&mut sections, "v8", mesh.positions[8]);
        }

        let snapshot = snapshot("evaluate_blend_shape BrowUp", |out| out.push_str(&sections));
        Ok(ScenarioOutput {
            name: Scenario::EvaluateInbetween.name(),
            summary: diag.summary(),
            snapshot,
        })
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
