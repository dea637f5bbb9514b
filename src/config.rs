use std::path::Path;

use serde::{Deserialize, Serialize};

/// Per-export configuration. One immutable value is built up front and passed
/// by reference to every descriptor constructor, so every part of the output
/// tree sees the same settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Emit path references relative to the export root instead of absolute.
    pub relative_paths: bool,
    /// Free-form comment written into the geometry container header. Empty
    /// means no comment line.
    pub comment: String,
    pub forward_axis: Axis,
    pub up_axis: Axis,
    pub vertex_channels: VertexChannels,
    pub material_channels: MaterialChannels,
    /// Shader reference path stamped into entities and parts.
    pub shader: String,
    /// Target resolution for baked textures. Baking is not implemented, the
    /// value is carried for consumers that read the config back.
    pub texture_resolution: u32,
    pub image_format: ImageFormat,
    pub light_probe_resolution: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            relative_paths: true,
            comment: String::new(),
            forward_axis: Axis::YPlus,
            up_axis: Axis::ZPlus,
            vertex_channels: VertexChannels::default(),
            material_channels: MaterialChannels::default(),
            shader: String::from("G10/shaders/G10 PBR.json"),
            texture_resolution: 2048,
            image_format: ImageFormat::Png,
            light_probe_resolution: 512,
        }
    }
}

impl ExportConfig {
    /// Renders a root-relative reference the way descriptors should store it:
    /// as-is when relative paths are on, otherwise joined under the root.
    pub fn reference(&self, root: &Path, relative: &str) -> String {
        if self.relative_paths {
            relative.to_string()
        } else {
            root.join(relative).to_string_lossy().into_owned()
        }
    }
}

/// A signed global axis tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    #[serde(rename = "X+")]
    XPlus,
    #[serde(rename = "Y+")]
    YPlus,
    #[serde(rename = "Z+")]
    ZPlus,
    #[serde(rename = "X-")]
    XMinus,
    #[serde(rename = "Y-")]
    YMinus,
    #[serde(rename = "Z-")]
    ZMinus,
}

/// Which per-corner attribute channels the geometry container carries.
/// Disabled channels are absent from both the header and the vertex records,
/// not merely zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VertexChannels {
    pub xyz: bool,
    pub uv: bool,
    pub nxyz: bool,
    pub txyz: bool,
    pub bxyz: bool,
    pub rgba: bool,
    pub bg: bool,
    pub bw: bool,
}

impl Default for VertexChannels {
    fn default() -> Self {
        Self {
            xyz: true,
            uv: true,
            nxyz: true,
            txyz: false,
            bxyz: false,
            rgba: false,
            bg: false,
            bw: false,
        }
    }
}

impl VertexChannels {
    /// Uv data must be present on the mesh for these selections.
    pub fn requires_uv(&self) -> bool {
        self.uv || self.txyz || self.bxyz
    }
}

/// Which material channels are exported when resolvable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialChannels {
    pub albedo: bool,
    pub normal: bool,
    pub rough: bool,
    pub metal: bool,
    pub ao: bool,
    pub height: bool,
    pub emit: bool,
}

impl Default for MaterialChannels {
    fn default() -> Self {
        Self {
            albedo: true,
            normal: true,
            rough: true,
            metal: true,
            ao: true,
            height: false,
            emit: false,
        }
    }
}

impl MaterialChannels {
    pub fn enabled(&self, channel: MaterialChannel) -> bool {
        match channel {
            MaterialChannel::Albedo => self.albedo,
            MaterialChannel::Normal => self.normal,
            MaterialChannel::Rough => self.rough,
            MaterialChannel::Metal => self.metal,
            MaterialChannel::Ao => self.ao,
            MaterialChannel::Height => self.height,
            MaterialChannel::Emit => self.emit,
        }
    }
}

/// The recognized material channels, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialChannel {
    Albedo,
    Normal,
    Rough,
    Metal,
    Ao,
    Height,
    Emit,
}

impl MaterialChannel {
    pub const ALL: [Self; 7] = [
        Self::Albedo,
        Self::Normal,
        Self::Rough,
        Self::Metal,
        Self::Ao,
        Self::Height,
        Self::Emit,
    ];

    /// File stem of the channel's image under `textures/<material>/`.
    pub fn stem(self) -> &'static str {
        match self {
            Self::Albedo => "albedo",
            Self::Normal => "normal",
            Self::Rough => "rough",
            Self::Metal => "metal",
            Self::Ao => "ao",
            Self::Height => "height",
            Self::Emit => "emit",
        }
    }
}

/// Encoding used for every emitted texture image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageFormat {
    Png,
    Jpg,
    Bmp,
    Qoi,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Bmp => "bmp",
            Self::Qoi => "qoi",
        }
    }

    pub fn codec(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpg => image::ImageFormat::Jpeg,
            Self::Bmp => image::ImageFormat::Bmp,
            Self::Qoi => image::ImageFormat::Qoi,
        }
    }
}
