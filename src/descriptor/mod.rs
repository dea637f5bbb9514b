pub mod entity;
pub mod material;
pub mod part;
pub mod rig;
pub mod scene;

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;

/// `$schema` reference stamped into every descriptor of the given kind.
pub(crate) fn schema(kind: &str) -> String {
    format!(
        "https://raw.githubusercontent.com/Jacob-C-Smith/G10-Schema/main/{}-schema.json",
        kind
    )
}

/// Writes a descriptor as pretty-printed JSON.
pub(crate) fn write_json<T: Serialize>(path: &Path, descriptor: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(descriptor)?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

/// Rounds to three decimal places, the precision transforms and bounds are
/// stored at.
pub(crate) fn round3(value: f32) -> f32 {
    (value * 1000.).round() / 1000.
}
