// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types and the recoverable/fatal taxonomy.
//!
//! Every failure reported by a collaborator is a [`DeviceError`] naming the
//! [`Operation`] that failed and the underlying [`Status`]. The session wraps
//! these in [`SessionError`], whose [`severity`](SessionError::severity)
//! tells the owning loop whether to rebuild the pipeline or restart the whole
//! session.
//!
//! The "producer is busy" outcome of the shared-surface handshake is not an
//! error and never appears here.

use core::fmt;
use core::time::Duration;

/// A collaborator call that can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Taking the consumer key of the shared frame.
    AcquireSync,
    /// Handing the shared frame back to the producer.
    ReleaseSync,
    /// Creating a texture (cursor upload, staging).
    CreateTexture,
    /// Creating a sampled view of a texture.
    CreateView,
    /// Creating a vertex buffer.
    CreateBuffer,
    /// Copying and mapping a region of a texture for CPU reads.
    ReadRegion,
    /// Issuing a draw.
    Draw,
    /// Creating a fence on the device.
    CreateFence,
    /// Opening a shared fence on the device.
    OpenFence,
    /// Exporting a fence as a shared handle.
    ShareFence,
    /// Queueing a fence signal on the device.
    Signal,
    /// Waiting on a fence from the CPU.
    WaitFence,
    /// Importing a device fence into the display pipeline.
    ImportFence,
    /// Creating a scanout for a presentable surface.
    CreateScanout,
    /// Creating the periodic vertical-blank fence.
    CreatePeriodicFence,
    /// Submitting a scanout task to the display pipeline.
    ExecuteTask,
}

impl Operation {
    /// Returns a short, stable name for log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AcquireSync => "acquire-sync",
            Self::ReleaseSync => "release-sync",
            Self::CreateTexture => "create-texture",
            Self::CreateView => "create-view",
            Self::CreateBuffer => "create-buffer",
            Self::ReadRegion => "read-region",
            Self::Draw => "draw",
            Self::CreateFence => "create-fence",
            Self::OpenFence => "open-fence",
            Self::ShareFence => "share-fence",
            Self::Signal => "signal",
            Self::WaitFence => "wait-fence",
            Self::ImportFence => "import-fence",
            Self::CreateScanout => "create-scanout",
            Self::CreatePeriodicFence => "create-periodic-fence",
            Self::ExecuteTask => "execute-task",
        }
    }

    /// Whether a failure of this operation means the device or display is
    /// gone, regardless of the reported status.
    const fn is_session_critical(self) -> bool {
        match self {
            Self::AcquireSync
            | Self::ReleaseSync
            | Self::CreateFence
            | Self::OpenFence
            | Self::ShareFence
            | Self::Signal
            | Self::WaitFence
            | Self::ImportFence
            | Self::CreateScanout
            | Self::CreatePeriodicFence
            | Self::ExecuteTask => true,
            Self::CreateTexture
            | Self::CreateView
            | Self::CreateBuffer
            | Self::ReadRegion
            | Self::Draw => false,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying status reported by a collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// Backend-specific status code (e.g. an `HRESULT`).
    Code(i32),
    /// The device was removed or reset.
    DeviceRemoved,
    /// A handle no longer refers to a live object.
    InvalidHandle,
    /// The backend could not allocate memory.
    OutOfMemory,
    /// The backend does not support the request.
    Unsupported,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "status {code:#010x}"),
            Self::DeviceRemoved => f.write_str("device removed"),
            Self::InvalidHandle => f.write_str("invalid handle"),
            Self::OutOfMemory => f.write_str("out of memory"),
            Self::Unsupported => f.write_str("unsupported"),
        }
    }
}

/// A failed collaborator call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceError {
    /// What was being attempted.
    pub op: Operation,
    /// Why it failed.
    pub status: Status,
}

impl DeviceError {
    /// Creates a new error for `op`.
    #[must_use]
    pub const fn new(op: Operation, status: Status) -> Self {
        Self { op, status }
    }

    /// Whether this failure invalidates the whole session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.status, Status::DeviceRemoved | Status::InvalidHandle)
            || self.op.is_session_critical()
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.op, self.status)
    }
}

impl core::error::Error for DeviceError {}

/// Why a cursor shape could not be resolved.
///
/// Resolution failures only cost the cursor draw of the current cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResolveError {
    /// The output buffer could not be allocated.
    OutOfMemory {
        /// Requested size in bytes.
        bytes: usize,
    },
    /// The shape buffer is shorter than its stated geometry requires.
    MalformedShape {
        /// Bytes required by width, height and pitch.
        required: usize,
        /// Bytes actually supplied.
        actual: usize,
    },
    /// The desktop region under the cursor could not be read.
    Background(DeviceError),
    /// The background region returned by the device is smaller than requested.
    BackgroundTooSmall,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { bytes } => {
                write!(f, "failed to allocate {bytes} bytes for cursor image")
            }
            Self::MalformedShape { required, actual } => write!(
                f,
                "cursor shape buffer holds {actual} bytes, geometry needs {required}"
            ),
            Self::Background(err) => write!(f, "reading cursor background: {err}"),
            Self::BackgroundTooSmall => f.write_str("cursor background region is too small"),
        }
    }
}

impl core::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Background(err) => Some(err),
            _ => None,
        }
    }
}

/// A rejected [`SessionConfig`](crate::config::SessionConfig).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigError {
    /// Fewer than two output slots were configured.
    TooFewSlots {
        /// Configured slot count.
        slots: usize,
    },
    /// The number of supplied output surfaces differs from the configuration.
    SlotMismatch {
        /// Configured slot count.
        configured: usize,
        /// Surfaces supplied at setup.
        supplied: usize,
    },
    /// A timeout was zero.
    ZeroTimeout,
    /// The vblank lead time does not fit inside the vblank wait timeout.
    LeadTimeTooLong {
        /// Configured lead time.
        lead_time: Duration,
        /// Configured vblank wait timeout.
        vblank_timeout: Duration,
    },
    /// The acquire timeout could stall the loop past a vblank wait.
    AcquireTimeoutTooLong {
        /// Configured acquire timeout.
        acquire_timeout: Duration,
        /// Configured vblank wait timeout.
        vblank_timeout: Duration,
    },
    /// The startup retry policy allows no attempts.
    NoRetryAttempts,
    /// The producer and consumer keys are equal.
    SameKeys,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewSlots { slots } => {
                write!(f, "at least two output slots are required, got {slots}")
            }
            Self::SlotMismatch {
                configured,
                supplied,
            } => write!(
                f,
                "configured for {configured} output slots but {supplied} surfaces were supplied"
            ),
            Self::ZeroTimeout => f.write_str("timeouts must be nonzero"),
            Self::LeadTimeTooLong {
                lead_time,
                vblank_timeout,
            } => write!(
                f,
                "vblank lead time {lead_time:?} must be shorter than the vblank timeout {vblank_timeout:?}"
            ),
            Self::AcquireTimeoutTooLong {
                acquire_timeout,
                vblank_timeout,
            } => write!(
                f,
                "acquire timeout {acquire_timeout:?} must be shorter than the vblank timeout {vblank_timeout:?}"
            ),
            Self::NoRetryAttempts => f.write_str("scanout retry policy needs at least one attempt"),
            Self::SameKeys => f.write_str("producer and consumer keys must differ"),
        }
    }
}

impl core::error::Error for ConfigError {}

/// How the owning loop should react to a [`SessionError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Abort this cycle; the pipeline may be rebuilt and the loop continued.
    Recoverable,
    /// The device or display is gone; tear down and restart the session.
    Fatal,
}

/// Errors surfaced by [`Session`](crate::session::Session) operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionError {
    /// A collaborator call failed.
    Device(DeviceError),
    /// No vertical blank was observed within the configured timeout.
    VblankTimeout {
        /// Fence value that was waited for.
        expected: u64,
        /// Fence value observed when the wait gave up.
        completed: u64,
        /// How long the wait lasted.
        timeout: Duration,
    },
    /// Setup supplied no outputs; the display topology is in transition.
    NoOutputs,
    /// The configuration was rejected.
    InvalidConfig(ConfigError),
}

impl SessionError {
    /// Classifies this error for the owning loop.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Device(err) if !err.is_fatal() => Severity::Recoverable,
            Self::NoOutputs => Severity::Recoverable,
            Self::Device(_) | Self::VblankTimeout { .. } | Self::InvalidConfig(_) => {
                Severity::Fatal
            }
        }
    }

    /// Shorthand for `self.severity() == Severity::Fatal`.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.severity(), Severity::Fatal)
    }
}

impl From<DeviceError> for SessionError {
    fn from(err: DeviceError) -> Self {
        Self::Device(err)
    }
}

impl From<ConfigError> for SessionError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfig(err)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(err) => err.fmt(f),
            Self::VblankTimeout {
                expected,
                completed,
                timeout,
            } => write!(
                f,
                "no vertical blank within {timeout:?} (waiting for {expected}, fence at {completed})"
            ),
            Self::NoOutputs => f.write_str("no display outputs available"),
            Self::InvalidConfig(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl core::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Device(err) => Some(err),
            Self::InvalidConfig(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_creation_failures_are_recoverable() {
        for op in [
            Operation::CreateTexture,
            Operation::CreateView,
            Operation::CreateBuffer,
            Operation::ReadRegion,
            Operation::Draw,
        ] {
            let err = SessionError::from(DeviceError::new(op, Status::Code(-2_147_024_882)));
            assert_eq!(err.severity(), Severity::Recoverable, "{op}");
        }
    }

    #[test]
    fn device_removed_is_fatal_for_any_operation() {
        let err = SessionError::from(DeviceError::new(
            Operation::CreateView,
            Status::DeviceRemoved,
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn keyed_mutex_and_pacing_failures_are_fatal() {
        let acquire = SessionError::from(DeviceError::new(
            Operation::AcquireSync,
            Status::Code(-1),
        ));
        assert!(acquire.is_fatal());

        let vblank = SessionError::VblankTimeout {
            expected: 4,
            completed: 3,
            timeout: Duration::from_millis(200),
        };
        assert!(vblank.is_fatal());
    }

    #[test]
    fn missing_outputs_is_recoverable() {
        assert_eq!(SessionError::NoOutputs.severity(), Severity::Recoverable);
    }

    #[test]
    fn display_names_operation_and_status() {
        extern crate std;
        use std::string::ToString;

        let err = DeviceError::new(Operation::CreateBuffer, Status::OutOfMemory);
        assert_eq!(err.to_string(), "create-buffer failed: out of memory");
    }
}
