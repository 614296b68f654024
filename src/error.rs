// Error types module
// Typed failures produced by the session controller

use std::path::PathBuf;
use thiserror::Error;

/// Failures a session operation can report.
///
/// None of these are fatal; the session stays usable after any of them and
/// the prior state is left untouched.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The engine could not read or parse the given path
    #[error("could not open image {}: {:#}", path.display(), cause)]
    DecodeFailed { path: PathBuf, cause: anyhow::Error },

    /// The engine could not write the given path
    #[error("could not save image {}: {:#}", path.display(), cause)]
    EncodeFailed { path: PathBuf, cause: anyhow::Error },

    /// A save or info request was made with no image loaded
    #[error("no image is currently open")]
    NoActiveImage,
}
