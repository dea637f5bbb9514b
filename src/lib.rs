pub mod config;
pub mod descriptor;
pub mod error;
pub mod export;
pub mod format;
pub mod scene;

pub use self::{
    config::ExportConfig,
    error::Error,
    export::{export_scene, Report},
    scene::SceneGraph,
};
