//! Lezen en schrijven van blend-shape compose-data als XML.
//!
//! ```xml
//! <blendShapeCompose baseMesh="Body" preserveExisting="true">
//!   <shape name="Brow">
//!     <frame weight="50" mesh="Brow_50" vertex="true" normal="true" tangent="false"/>
//!   </shape>
//! </blendShapeCompose>
//! ```

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geom::{AttributeMesh, ChannelMask, ComposeConfig, Shape, ShapeFrame};

/// Result type voor het lezen en schrijven van compose-data.
pub type ParseResult<T> = Result<T, ParseError>;

/// Beschrijft fouten tijdens het parsen.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Het XML-document kon niet (de)geserialiseerd worden.
    #[error("XML parsefout: {0}")]
    Xml(#[from] quick_xml::DeError),
    /// Het document is syntactisch geldig maar inhoudelijk onbruikbaar.
    #[error("ongeldige compose-data: {0}")]
    Invalid(String),
}

const fn default_true() -> bool {
    true
}

const fn default_weight() -> f64 {
    100.0
}

/// Persistente beschrijving van een compose-opdracht.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "blendShapeCompose")]
pub struct ComposeAsset {
    #[serde(rename = "@baseMesh", default, skip_serializing_if = "Option::is_none")]
    pub base_mesh: Option<String>,
    #[serde(rename = "@preserveExisting", default = "default_true")]
    pub preserve_existing: bool,
    #[serde(rename = "shape", default)]
    pub shapes: Vec<ShapeEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeEntry {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "frame", default)]
    pub frames: Vec<FrameEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEntry {
    #[serde(rename = "@weight", default = "default_weight")]
    pub weight: f64,
    /// Naam van de doelmesh; ontbreekt bij een frame zonder doel.
    #[serde(rename = "@mesh", default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<String>,
    #[serde(rename = "@vertex", default = "default_true")]
    pub vertex: bool,
    #[serde(rename = "@normal", default = "default_true")]
    pub normal: bool,
    #[serde(rename = "@tangent", default = "default_true")]
    pub tangent: bool,
}

impl Default for ComposeAsset {
    fn default() -> Self {
        Self {
            base_mesh: None,
            preserve_existing: true,
            shapes: Vec::new(),
        }
    }
}

impl ComposeAsset {
    #[must_use]
    pub fn new(base_mesh: impl Into<String>) -> Self {
        Self {
            base_mesh: Some(base_mesh.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_shape(mut self, shape: ShapeEntry) -> Self {
        self.shapes.push(shape);
        self
    }

    #[must_use]
    pub fn config(&self) -> ComposeConfig {
        ComposeConfig::new(self.preserve_existing)
    }

    /// Alle meshnamen waar frames naar verwijzen, in documentvolgorde, zonder duplicaten.
    #[must_use]
    pub fn referenced_meshes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for mesh in self
            .shapes
            .iter()
            .flat_map(|shape| &shape.frames)
            .filter_map(|frame| frame.mesh.as_deref())
        {
            if !names.contains(&mesh) {
                names.push(mesh);
            }
        }
        names
    }

    /// Zet de compose-data om naar [`Shape`]s via een opzoekfunctie voor meshnamen.
    ///
    /// Frames waarvan de mesh niet gevonden wordt, krijgen geen doel en worden bij
    /// het componeren overgeslagen.
    pub fn resolve<F>(&self, mut lookup: F) -> (ComposeConfig, Vec<Shape>)
    where
        F: FnMut(&str) -> Option<AttributeMesh>,
    {
        let shapes = self
            .shapes
            .iter()
            .map(|entry| {
                let frames = entry
                    .frames
                    .iter()
                    .map(|frame| {
                        let target = frame.mesh.as_deref().and_then(|name| {
                            let mesh = lookup(name);
                            if mesh.is_none() {
                                log::warn!("mesh `{name}` voor shape `{}` niet gevonden", entry.name);
                            }
                            mesh
                        });
                        ShapeFrame {
                            weight: frame.weight,
                            target,
                            channels: frame.channels(),
                        }
                    })
                    .collect();
                Shape {
                    name: entry.name.clone(),
                    frames,
                }
            })
            .collect();
        (self.config(), shapes)
    }
}

impl ShapeEntry {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_frame(mut self, frame: FrameEntry) -> Self {
        self.frames.push(frame);
        self
    }
}

impl FrameEntry {
    #[must_use]
    pub fn new(weight: f64, mesh: impl Into<String>) -> Self {
        Self {
            weight,
            mesh: Some(mesh.into()),
            vertex: true,
            normal: true,
            tangent: true,
        }
    }

    #[must_use]
    pub fn with_channels(mut self, channels: ChannelMask) -> Self {
        self.vertex = channels.position;
        self.normal = channels.normal;
        self.tangent = channels.tangent;
        self
    }

    #[must_use]
    pub fn channels(&self) -> ChannelMask {
        ChannelMask {
            position: self.vertex,
            normal: self.normal,
            tangent: self.tangent,
        }
    }
}

/// Leest een compose-document.
pub fn parse_compose_str(input: &str) -> ParseResult<ComposeAsset> {
    log::debug!("Start parsing compose-data");
    let asset: ComposeAsset = from_str(input)?;
    validate(&asset)?;
    log::debug!(
        "Found {} shapes, {} frames",
        asset.shapes.len(),
        asset.shapes.iter().map(|shape| shape.frames.len()).sum::<usize>()
    );
    Ok(asset)
}

/// Schrijft een compose-document.
pub fn write_compose_string(asset: &ComposeAsset) -> ParseResult<String> {
    validate(asset)?;
    Ok(to_string(asset)?)
}

fn validate(asset: &ComposeAsset) -> ParseResult<()> {
    for (index, shape) in asset.shapes.iter().enumerate() {
        if shape.name.trim().is_empty() {
            return Err(ParseError::Invalid(format!("shape {index} heeft geen naam")));
        }
        for (frame_index, frame) in shape.frames.iter().enumerate() {
            if !frame.weight.is_finite() {
                return Err(ParseError::Invalid(format!(
                    "frame {frame_index} van shape `{}` heeft geen eindig gewicht",
                    shape.name
                )));
            }
        }
    }
    Ok(())
}
