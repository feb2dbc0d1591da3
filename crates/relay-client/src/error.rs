use std::error::Error as _;

use relay_wire::{Status, StreamHandle};

use crate::backend::ProvisionError;
use crate::registry::{FetchError, ReconcileError};

/// Conditions that end the session with a non-zero exit code.
///
/// Every variant maps to exactly one code; see [`FatalError::exit_code`].
#[derive(thiserror::Error, Debug)]
pub enum FatalError {
    #[error("failed to load broadcast library `{path}`: {reason}")]
    Load { path: String, reason: String },

    #[error("broadcast library does not export `{0}`")]
    MissingEntryPoint(String),

    #[error("endpoint initialisation failed: {0}")]
    Initialize(Status),

    #[error("failed to create GPU device: {0}")]
    Device(String),

    #[error("failed to fetch the stream set")]
    StreamFetch(#[source] FetchError),

    #[error("endpoint refused the GPU device: {0}")]
    GpuBinding(Status),

    #[error("failed to provision stream {index} `{name}` ({handle})")]
    StreamProvisioning {
        index: usize,
        name: String,
        handle: StreamHandle,
        #[source]
        source: ProvisionError,
    },

    #[error("failed to submit frame for stream `{name}` ({handle}): {status}")]
    FrameSubmission {
        name: String,
        handle: StreamHandle,
        status: Status,
    },

    #[error("endpoint shutdown failed: {0}")]
    Shutdown(Status),
}

impl FatalError {
    pub fn exit_code(&self) -> u8 {
        match self {
            FatalError::Load { .. } => 1,
            FatalError::MissingEntryPoint(_) => 2,
            FatalError::Initialize(_) => 3,
            FatalError::Device(_) | FatalError::StreamFetch(_) => 4,
            FatalError::GpuBinding(_) => 5,
            FatalError::StreamProvisioning { .. } => 6,
            FatalError::FrameSubmission { .. } => 7,
            FatalError::Shutdown(_) => 99,
        }
    }

    /// Writes the error and its causes to the diagnostic sink.
    pub fn report(&self) {
        let mut message = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = err.source();
        }
        log::error!("{message} (exit code {})", self.exit_code());
    }
}

impl From<ReconcileError> for FatalError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Fetch(fetch) => FatalError::StreamFetch(fetch),
            ReconcileError::Provision {
                index,
                name,
                handle,
                source,
            } => FatalError::StreamProvisioning {
                index,
                name,
                handle,
                source,
            },
        }
    }
}

/// Why a session ended without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanExit {
    /// The endpoint asked to quit and shut down cleanly.
    QuitRequested,
    /// Every stream window was closed (or one was, when sessions end on any close).
    WindowsClosed,
    /// Waiting for a frame failed; the endpoint still shut down cleanly.
    EndpointStopped(Status),
}

/// Outcome of a session.
#[derive(Debug)]
pub enum Exit {
    Clean(CleanExit),
    Fatal(FatalError),
}

impl Exit {
    /// Process exit code for this outcome.
    pub fn code(&self) -> u8 {
        match self {
            Exit::Clean(_) => 0,
            Exit::Fatal(err) => err.exit_code(),
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Exit::Clean(_))
    }
}

impl From<FatalError> for Exit {
    fn from(err: FatalError) -> Self {
        Exit::Fatal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_table() {
        let cases: Vec<(FatalError, u8)> = vec![
            (
                FatalError::Load {
                    path: "x".into(),
                    reason: "y".into(),
                },
                1,
            ),
            (FatalError::MissingEntryPoint("rs_sendFrame".into()), 2),
            (FatalError::Initialize(Status::Failure(100)), 3),
            (FatalError::Device("no adapter".into()), 4),
            (FatalError::StreamFetch(FetchError::Unstable), 4),
            (FatalError::GpuBinding(Status::Failure(100)), 5),
            (
                FatalError::StreamProvisioning {
                    index: 1,
                    name: "b".into(),
                    handle: StreamHandle(2),
                    source: ProvisionError::Device("boom".into()),
                },
                6,
            ),
            (
                FatalError::FrameSubmission {
                    name: "a".into(),
                    handle: StreamHandle(1),
                    status: Status::Failure(100),
                },
                7,
            ),
            (FatalError::Shutdown(Status::Failure(100)), 99),
        ];

        for (err, code) in cases {
            assert_eq!(err.exit_code(), code, "{err}");
            assert_eq!(Exit::from(err).code(), code);
        }
    }

    #[test]
    fn clean_exits_are_zero() {
        for reason in [
            CleanExit::QuitRequested,
            CleanExit::WindowsClosed,
            CleanExit::EndpointStopped(Status::Failure(5)),
        ] {
            let exit = Exit::Clean(reason);
            assert!(exit.is_clean());
            assert_eq!(exit.code(), 0);
        }
    }

    #[test]
    fn provisioning_error_keeps_its_cause() {
        let err = FatalError::StreamProvisioning {
            index: 0,
            name: "front".into(),
            handle: StreamHandle(0xa),
            source: ProvisionError::Device("out of memory".into()),
        };
        assert!(err.source().is_some());
    }
}
