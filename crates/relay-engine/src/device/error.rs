/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; presentation may resume next frame.
    Reconfigured,
    /// Transient error; skip presenting this frame.
    SkipFrame,
    /// Fatal error (commonly OOM); the surface cannot be used any more.
    Fatal,
}
