#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;
pub mod parse;

use std::collections::BTreeMap;
use std::fmt;

use geom::{
    AttributeMesh, BlendShapeSource, ComposeDiagnostics, ComposeError, ExtractError, FrameOrigin,
    MeshValidationError, MirrorError, MirrorMode, MirrorOptions, MirrorRelationCache, ShapedMesh,
    UnknownMirrorMode, apply_mirror_from_source_side, compose_blend_shapes, evaluate_blend_shape,
    install_composed_frames, unflatten_vec3, unflatten_vec4,
};
use parse::compose_xml::{self, ComposeAsset, ParseError};
use serde::Serialize;
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            // no-op fallback when panic hook is disabled
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {
    // no-op fallback when debug logs are disabled
}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| JsError::new(&format!("kon rayon threadpool niet initialiseren: {err}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

/// Fouten van de [`ShapeEngine`]-methodes.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("er is geen basismesh ingesteld")]
    NoBaseMesh,
    #[error("er is geen compose-data geladen")]
    NoComposeData,
    #[error("mirroring staat uit")]
    MirrorDisabled,
    #[error("onbekende blend shape `{0}`")]
    UnknownShape(String),
    #[error("{stream}-buffer heeft lengte {len}, geen veelvoud van {width}")]
    FlatBuffer {
        stream: &'static str,
        len: usize,
        width: usize,
    },
    #[error("ongeldige mesh: {0}")]
    Mesh(#[from] MeshValidationError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Mirror(#[from] MirrorError),
    #[error(transparent)]
    MirrorMode(#[from] UnknownMirrorMode),
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ComposedFrameSummary {
    pub shape: String,
    pub weight: f64,
    pub preserved: bool,
}

/// Resultaat van [`ShapeEngine::try_compose`], zoals het naar JS gaat.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ComposeSummary {
    pub vertex_count: usize,
    pub frames: Vec<ComposedFrameSummary>,
    pub preserved: usize,
    pub composed: usize,
    pub dropped: usize,
    pub replaced_shapes: Vec<String>,
    pub skipped: Vec<String>,
    pub empty_shapes: Vec<String>,
}

impl ComposeSummary {
    fn new(frames: Vec<ComposedFrameSummary>, diag: &ComposeDiagnostics) -> Self {
        Self {
            vertex_count: diag.vertex_count,
            frames,
            preserved: diag.preserved_frame_count,
            composed: diag.composed_frame_count,
            dropped: diag.dropped_frame_count,
            replaced_shapes: diag.replaced_shape_names.clone(),
            skipped: diag.skipped_frames.iter().map(ToString::to_string).collect(),
            empty_shapes: diag.empty_shape_names.clone(),
        }
    }
}

/// Public entry point for consumers.
#[wasm_bindgen]
#[derive(Debug)]
pub struct ShapeEngine {
    base: Option<ShapedMesh>,
    targets: BTreeMap<String, AttributeMesh>,
    compose_data: Option<ComposeAsset>,
    mirror_mode: Option<MirrorMode>,
    mirror_options: MirrorOptions,
    mirror_cache: MirrorRelationCache,
    last_diagnostics: Option<ComposeDiagnostics>,
}

impl Default for ShapeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl ShapeEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> ShapeEngine {
        ShapeEngine {
            base: None,
            targets: BTreeMap::new(),
            compose_data: None,
            mirror_mode: None,
            mirror_options: MirrorOptions::default(),
            mirror_cache: MirrorRelationCache::new(),
            last_diagnostics: None,
        }
    }

    /// Stel de basismesh in. Lege normal- of tangentbuffers krijgen standaardwaarden.
    #[wasm_bindgen]
    pub fn set_base_mesh(
        &mut self,
        positions: &[f64],
        normals: &[f64],
        tangents: &[f64],
    ) -> Result<(), JsValue> {
        self.try_set_base_mesh(positions, normals, tangents)
            .map_err(to_js_error)
    }

    /// Registreer een doelmesh waar compose-data met `name` naar kan verwijzen.
    #[wasm_bindgen]
    pub fn add_target_mesh(
        &mut self,
        name: &str,
        positions: &[f64],
        normals: &[f64],
        tangents: &[f64],
    ) -> Result<(), JsValue> {
        self.try_add_target_mesh(name, positions, normals, tangents)
            .map_err(to_js_error)
    }

    /// Laad compose-data als XML.
    #[wasm_bindgen]
    pub fn load_compose_data(&mut self, xml: &str) -> Result<(), JsValue> {
        self.try_load_compose_data(xml).map_err(to_js_error)
    }

    /// Componeer de geladen shapes op de basismesh en geef een samenvatting terug.
    #[wasm_bindgen]
    pub fn compose(&mut self) -> Result<JsValue, JsValue> {
        let summary = self.try_compose().map_err(to_js_error)?;
        serde_wasm_bindgen::to_value(&summary).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Stel de mirror-modus in (`RightToLeft`, `LeftToRight`, ... of `None`).
    #[wasm_bindgen]
    pub fn set_mirror_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        self.try_set_mirror_mode(mode).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn set_mirror_epsilon(&mut self, epsilon: f64) {
        self.mirror_options = self.mirror_options.epsilon(epsilon);
    }

    /// Spiegel een platte normalbuffer volgens de huidige mirror-modus.
    #[wasm_bindgen]
    pub fn mirror_normals(&mut self, normals: &[f64]) -> Result<Vec<f64>, JsValue> {
        self.try_mirror_normals(normals).map_err(to_js_error)
    }

    /// Evalueer een geïnstalleerde blend shape op `weight` en geef de posities terug.
    #[wasm_bindgen]
    pub fn evaluate_shape(&self, name: &str, weight: f64) -> Result<Vec<f64>, JsValue> {
        self.try_evaluate_shape(name, weight).map_err(to_js_error)
    }

    /// Namen van de geïnstalleerde blend shapes.
    #[wasm_bindgen]
    pub fn get_blend_shape_names(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.blend_shape_names())
            .map_err(|err| JsError::new(&err.to_string()).into())
    }
}

impl ShapeEngine {
    pub fn try_set_base_mesh(
        &mut self,
        positions: &[f64],
        normals: &[f64],
        tangents: &[f64],
    ) -> Result<(), EngineError> {
        let mesh = mesh_from_flat(positions, normals, tangents)?;
        debug_log!("basismesh ingesteld: {} vertices", mesh.vertex_count());
        self.base = Some(ShapedMesh::new(mesh));
        self.mirror_cache.invalidate();
        self.last_diagnostics = None;
        Ok(())
    }

    pub fn try_add_target_mesh(
        &mut self,
        name: &str,
        positions: &[f64],
        normals: &[f64],
        tangents: &[f64],
    ) -> Result<(), EngineError> {
        let mesh = mesh_from_flat(positions, normals, tangents)?;
        self.targets.insert(name.to_owned(), mesh);
        Ok(())
    }

    pub fn try_load_compose_data(&mut self, xml: &str) -> Result<(), EngineError> {
        let asset = compose_xml::parse_compose_str(xml)?;
        let missing: Vec<&str> = asset
            .referenced_meshes()
            .into_iter()
            .filter(|name| !self.targets.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            log::warn!("compose-data verwijst naar onbekende meshes: {}", missing.join(", "));
        }
        self.compose_data = Some(asset);
        Ok(())
    }

    /// Componeer en installeer. Bij een fout blijft de vorige toestand staan.
    pub fn try_compose(&mut self) -> Result<ComposeSummary, EngineError> {
        let asset = self.compose_data.as_ref().ok_or(EngineError::NoComposeData)?;
        let host = self.base.as_mut().ok_or(EngineError::NoBaseMesh)?;

        let targets = &self.targets;
        let (config, shapes) = asset.resolve(|name| targets.get(name).cloned());
        let existing = host.existing_blend_shapes();
        let (frames, diag) = compose_blend_shapes(&host.mesh, &existing, &shapes, config)?;

        let frame_summaries = frames
            .iter()
            .map(|frame| ComposedFrameSummary {
                shape: frame.shape_name.clone(),
                weight: frame.frame.weight,
                preserved: frame.origin == FrameOrigin::Preserved,
            })
            .collect();
        install_composed_frames(host, frames);

        debug_log!("compose: {}", diag.summary());
        let summary = ComposeSummary::new(frame_summaries, &diag);
        self.last_diagnostics = Some(diag);
        Ok(summary)
    }

    pub fn try_set_mirror_mode(&mut self, mode: &str) -> Result<(), EngineError> {
        let trimmed = mode.trim();
        self.mirror_mode = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(trimmed.parse::<MirrorMode>()?)
        };
        Ok(())
    }

    /// Spiegel `normals` van de bronhelft naar de andere helft van de basismesh.
    ///
    /// Als de basismesh niet symmetrisch is, wordt mirroring uitgeschakeld.
    pub fn try_mirror_normals(&mut self, normals: &[f64]) -> Result<Vec<f64>, EngineError> {
        let mode = self.mirror_mode.ok_or(EngineError::MirrorDisabled)?;
        let host = self.base.as_ref().ok_or(EngineError::NoBaseMesh)?;
        let mut normals = unflatten(normals, "normal")?;

        let relation = match self.mirror_cache.get_or_build(
            &host.mesh.positions,
            &host.mesh.normals,
            mode.plane_normal(),
            self.mirror_options,
        ) {
            Ok(relation) => relation,
            Err(err) => {
                log::warn!("mirroring uitgeschakeld: {err}");
                self.mirror_mode = None;
                return Err(err.into());
            }
        };

        apply_mirror_from_source_side(&relation, &host.mesh.positions, &mut normals)?;
        Ok(normals.into_iter().flatten().collect())
    }

    pub fn try_evaluate_shape(&self, name: &str, weight: f64) -> Result<Vec<f64>, EngineError> {
        let host = self.base.as_ref().ok_or(EngineError::NoBaseMesh)?;
        let shape = host
            .blend_shape(name)
            .ok_or_else(|| EngineError::UnknownShape(name.to_owned()))?;
        let mesh = evaluate_blend_shape(&host.mesh, shape, weight)?;
        Ok(mesh.positions_flat().to_vec())
    }

    #[must_use]
    pub fn blend_shape_names(&self) -> Vec<String> {
        self.base.as_ref().map_or_else(Vec::new, |host| {
            host.blend_shapes.iter().map(|shape| shape.name.clone()).collect()
        })
    }

    #[must_use]
    pub fn base_mesh(&self) -> Option<&ShapedMesh> {
        self.base.as_ref()
    }

    #[must_use]
    pub fn mirror_mode(&self) -> Option<MirrorMode> {
        self.mirror_mode
    }

    #[must_use]
    pub fn last_diagnostics(&self) -> Option<&ComposeDiagnostics> {
        self.last_diagnostics.as_ref()
    }
}

fn unflatten(flat: &[f64], stream: &'static str) -> Result<Vec<[f64; 3]>, EngineError> {
    unflatten_vec3(flat).ok_or(EngineError::FlatBuffer {
        stream,
        len: flat.len(),
        width: 3,
    })
}

fn mesh_from_flat(positions: &[f64], normals: &[f64], tangents: &[f64]) -> Result<AttributeMesh, EngineError> {
    let mut mesh = AttributeMesh::from_positions(unflatten(positions, "position")?);
    if !normals.is_empty() {
        mesh.normals = unflatten(normals, "normal")?;
    }
    if !tangents.is_empty() {
        mesh.tangents = unflatten_vec4(tangents).ok_or(EngineError::FlatBuffer {
            stream: "tangent",
            len: tangents.len(),
            width: 4,
        })?;
    }
    mesh.validate()?;
    Ok(mesh)
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}
