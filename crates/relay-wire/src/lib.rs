//! Data model and wire format for the **render-broadcast** frame exchange.
//!
//! Everything in here is plain data: status codes returned by the endpoint,
//! stream descriptions and the byte layout they travel in, per-frame payloads,
//! and the C ABI records used when talking to the broadcast SDK.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`status`] | `Status`, raw status codes |
//! | [`stream`] | `StreamHandle`, `PixelFormat`, `StreamDescription`, `StreamSet` |
//! | [`frame`] | `FrameData`, `CameraPose`, `CameraResponseData`, `SenderFrame` |
//! | [`device`] | `GpuDeviceInfo` |
//! | [`error`] | `DecodeError` |
//!
//! # Quick start
//!
//! ```rust
//! use relay_wire::{PixelFormat, StreamDescription, StreamHandle, StreamSet};
//!
//! let set = StreamSet::new(vec![StreamDescription {
//!     handle: StreamHandle(7),
//!     name: "front".into(),
//!     width: 640,
//!     height: 480,
//!     format: PixelFormat::Bgra8,
//! }]);
//!
//! let bytes = set.encode();
//! assert_eq!(StreamSet::decode(&bytes).unwrap(), set);
//! ```

pub mod device;
pub mod error;
pub mod frame;
pub mod status;
pub mod stream;

pub use device::{GpuBackendKind, GpuDeviceInfo};
pub use error::DecodeError;
pub use frame::{CameraPose, CameraResponseData, FrameData, FrameType, SenderFrame, TextureHandle};
pub use status::Status;
pub use stream::{PixelFormat, StreamDescription, StreamHandle, StreamSet};
