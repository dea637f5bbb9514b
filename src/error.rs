use thiserror::Error;

/// Failures the pipeline can surface for a single descriptor.
///
/// These are the recoverable kind: the assembler logs them and omits the
/// affected output instead of aborting. Filesystem failures travel through
/// [`anyhow::Error`] and are fatal to the whole export.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The material has no principled shader node to read channels from.
    #[error("material \"{material}\" has no principled shader node")]
    MissingPrincipled { material: String },

    /// A channel input is linked to a node network that is not a plain image
    /// texture. Baking arbitrary networks is not implemented.
    #[error(
        "channel \"{channel}\" of material \"{material}\" is linked to an unsupported node network"
    )]
    UnsupportedLink {
        material: String,
        channel: &'static str,
    },

    /// The uv deltas of a face have a zero determinant, so its tangent basis
    /// would be non-finite.
    #[error("face {face} of mesh \"{mesh}\" has a degenerate uv mapping")]
    DegenerateUv { mesh: String, face: usize },

    /// Uv coordinates, tangents, or bitangents were requested but the mesh
    /// carries no matching uv layer.
    #[error("mesh \"{mesh}\" has no uv layer")]
    MissingUvLayer { mesh: String },

    /// A polygon with fewer than three corners cannot be triangulated.
    #[error("polygon {polygon} of mesh \"{mesh}\" has fewer than three corners")]
    DegeneratePolygon { mesh: String, polygon: usize },

    /// A polygon references a vertex index past the end of the position
    /// list.
    #[error("polygon {polygon} of mesh \"{mesh}\" references a vertex out of range")]
    VertexOutOfRange { mesh: String, polygon: usize },

    /// A per-vertex or per-corner attribute layer is not parallel to the
    /// data it annotates.
    #[error("mesh \"{mesh}\" has a mismatched {layer} layer")]
    LayerMismatch {
        mesh: String,
        layer: &'static str,
    },

    /// Pose deltas are expressed in seconds, so a rig cannot be sampled at
    /// a non-positive frame rate.
    #[error("rig \"{rig}\" cannot be sampled at a non-positive frame rate")]
    InvalidFrameRate { rig: String },
}
