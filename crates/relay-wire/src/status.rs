use std::fmt;

/// Raw status codes as returned across the SDK boundary.
pub mod raw {
    pub const SUCCESS: i32 = 0;
    pub const BUFFER_OVERFLOW: i32 = 1;
    pub const TIMEOUT: i32 = 2;
    pub const STREAMS_CHANGED: i32 = 3;
    pub const QUIT: i32 = 4;
    /// Generic failure. Any code not listed above is also a failure.
    pub const FAILED: i32 = 100;
}

/// Result of a call into the broadcast endpoint.
///
/// Endpoint methods return `Result<T, Status>`; `Err` never carries
/// [`Status::Success`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Status {
    Success,
    /// No frame arrived within the wait budget.
    Timeout,
    /// The stream set changed; the client must reconcile before rendering.
    StreamsChanged,
    /// The endpoint asked the client to stop.
    QuitRequested,
    /// The caller's buffer is too small; the required size was reported.
    BufferOverflow,
    /// Any other failure, carrying the raw code.
    Failure(i32),
}

impl Status {
    pub fn from_raw(code: i32) -> Self {
        match code {
            raw::SUCCESS => Status::Success,
            raw::BUFFER_OVERFLOW => Status::BufferOverflow,
            raw::TIMEOUT => Status::Timeout,
            raw::STREAMS_CHANGED => Status::StreamsChanged,
            raw::QUIT => Status::QuitRequested,
            other => Status::Failure(other),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Status::Success => raw::SUCCESS,
            Status::BufferOverflow => raw::BUFFER_OVERFLOW,
            Status::Timeout => raw::TIMEOUT,
            Status::StreamsChanged => raw::STREAMS_CHANGED,
            Status::QuitRequested => raw::QUIT,
            Status::Failure(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// Converts a raw code into `Ok(())` or `Err(status)`.
    pub fn check(code: i32) -> Result<(), Status> {
        match Status::from_raw(code) {
            Status::Success => Ok(()),
            other => Err(other),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => f.write_str("success"),
            Status::Timeout => f.write_str("timed out waiting for frame"),
            Status::StreamsChanged => f.write_str("streams changed"),
            Status::QuitRequested => f.write_str("quit requested"),
            Status::BufferOverflow => f.write_str("buffer too small"),
            Status::Failure(code) => write!(f, "endpoint failure (code {code})"),
        }
    }
}

impl std::error::Error for Status {}
