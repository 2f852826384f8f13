//! Errors that abort a whole scan.

use thiserror::Error;

use doku_core::ScanError;
use doku_docker::DockerError;
use doku_store::StoreError;

/// A scan could not run to completion.
///
/// Per-item problems (an unreachable path, a failed measurement) never
/// surface here; they are logged and recorded on the item instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The Docker daemon could not be queried.
    #[error(transparent)]
    Docker(#[from] DockerError),

    /// Results could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Filesystem or configuration failure outside of a single item.
    #[error(transparent)]
    Scan(#[from] ScanError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
