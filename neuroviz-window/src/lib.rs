//! Neuroviz Window Crate
//!
//! The winit event loop that drives a [`RenderDelegate`], the orbit camera,
//! the egui label overlay, and process-wide logging setup.

mod app;
mod camera;
mod controls;
mod overlay;

pub use app::{
    Prepared, RenderContext, RenderDelegate, WindowConfig, WindowError, init_logging,
    run_with_delegate,
};
pub use camera::{Camera, CameraPose, Projection, project_to_screen};
pub use controls::{DragButton, DragState, OrbitController, PointerEvent};
pub use overlay::{LabelOverlay, WorldLabel, place_labels};
pub use neuroviz_gpu::SceneBounds;
pub use winit;
