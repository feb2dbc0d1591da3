//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue (headless)
//! - creating & configuring a Surface (swap chain) per stream window
//! - acquiring frames and providing encoders/views for presentation

mod error;
mod frame;
mod gpu;
mod surface;

pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
pub use gpu::{Gpu, GpuInit};
pub use surface::WindowSurface;
