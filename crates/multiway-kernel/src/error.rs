//! Kernel-specific error types.

use multiway_types::error::RelayError;
use thiserror::Error;

/// Kernel error type wrapping RelayError with boot context.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// The kernel or its bridge failed to start.
    #[error("Boot failed: {0}")]
    BootFailed(String),
}

/// Alias for kernel results.
pub type KernelResult<T> = Result<T, KernelError>;
