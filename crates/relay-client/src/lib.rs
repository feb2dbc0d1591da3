//! Frame exchange client for a render-broadcast endpoint.
//!
//! The endpoint announces virtual camera streams; for every stream the client
//! opens a preview window and a render target, and on every broadcast tick it
//! renders each stream from the endpoint's camera and hands the frame back.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`endpoint`] | `Endpoint` trait, SDK loader, simulated broadcaster |
//! | [`registry`] | `StreamRegistry`: stream set and index-aligned resources |
//! | [`backend`] | `RenderBackend` trait and the wgpu implementation |
//! | [`exchange`] | `FrameExchange`: the per-tick state machine |
//! | [`error`] | `FatalError`, `Exit` and the exit code table |
//! | [`config`] | `ClientConfig` (TOML) |
//! | [`session`] | bootstrap and `run` |
//!
//! # Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | clean stop (quit requested, windows closed) |
//! | 1 | broadcast library could not be loaded |
//! | 2 | broadcast library lacks an entry point |
//! | 3 | endpoint initialisation failed |
//! | 4 | GPU device creation or stream fetch failed |
//! | 5 | endpoint refused the GPU device |
//! | 6 | a stream could not be provisioned |
//! | 7 | a frame could not be submitted |
//! | 64 | configuration could not be loaded |
//! | 99 | endpoint shutdown failed |

pub mod backend;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod exchange;
pub mod registry;
pub mod session;

#[cfg(test)]
mod testing;

pub use config::{ClientConfig, ConfigError};
pub use error::{CleanExit, Exit, FatalError};
pub use exchange::{ExchangeSettings, FrameExchange, Lifecycle, LoopState};
pub use session::run;
