//! GPU rendering subsystem.
//!
//! Renders the placeholder scene (one spinning cube) for a stream, either into
//! the stream's offscreen render target or into its window's swap chain.
//!
//! Convention:
//! - world space is right-handed, +Y up, cameras look down -Z
//! - clip space is wgpu's (depth 0..1)

mod camera;
mod ctx;
mod format;
mod mesh;
mod target;

pub use camera::{frame_transform, model_spin, projection, view};
pub use ctx::{RenderCtx, RenderTarget};
pub use format::{padded_bytes_per_row, texture_format};
pub use mesh::{MeshRenderer, TransformBinding};
pub use target::{ReadbackError, StreamTarget, TargetError};
