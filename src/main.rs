use std::{env, fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use dialoguer::Input;

use gxport::{config::ExportConfig, export, scene::SceneGraph};

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let scene_path = PathBuf::from(
        args.next()
            .context("usage: gxport <scene.json> [out-dir]")?,
    );
    let root = match args.next() {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(
            Input::<String>::new()
                .with_prompt("Output directory")
                .interact_text()?,
        ),
    };

    let text = fs::read_to_string(&scene_path)
        .with_context(|| format!("failed to read {}", scene_path.display()))?;
    let graph: SceneGraph =
        serde_json::from_str(&text).context("failed to parse the scene file")?;
    let config = load_config(&scene_path)?;

    let report = export::export_scene(&graph, &config, &root)?;

    let seconds = report.elapsed.as_secs();
    println!(
        "Export finished in {}h {}m {}s",
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60
    );

    Ok(())
}

/// Loads the sidecar configuration next to the scene file
/// (`<scene>.config.json`), falling back to the defaults.
fn load_config(scene_path: &Path) -> Result<ExportConfig> {
    let path = scene_path.with_extension("config.json");
    if !path.exists() {
        return Ok(ExportConfig::default());
    }

    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}
