//! Core modules for the Galaxy Studio visualizer.
//!
//! The crate exposes the procedural generator, the orbit camera and the
//! scene lifecycle as plain building blocks.  Everything except the
//! renderer runs headless, so generation and interaction logic stays
//! testable without a GPU or a window.

pub mod app;
pub mod camera;
pub mod galaxy;
pub mod params;
pub mod render;
pub mod scene;
pub mod ui;

pub use camera::OrbitCamera;
pub use galaxy::PointCloud;
pub use params::{GalaxyParams, ParamError};
pub use render::Renderer;
pub use scene::{GalaxyScene, PointCloudBackend};
pub use ui::SettingsPanel;
