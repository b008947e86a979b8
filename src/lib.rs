//! Adaptive rendering quality controller for a first-person photorealistic
//! globe viewer.
//!
//! Frame telemetry flows through a sliding window and an exponential
//! smoother, gets classified into a quality tier, and the tier's preset or a
//! fine-tuned variant of it is written back to the renderer through the
//! [`renderer::TilesetHandle`] and [`renderer::ViewHandle`] traits.

pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod ipc_server;
pub mod logging;
pub mod metrics;
pub mod renderer;
pub mod smoother;
pub mod telemetry;
pub mod tier;
pub mod tuner;
pub mod window;

pub use controller::{QualityController, QualityEvent, QualityStatus};
pub use tier::QualityTier;
