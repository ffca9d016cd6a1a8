// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types shared by all Scan-Lite crates.

use thiserror::Error;

/// Result type for scan processing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while indexing, registering or analysing scans
///
/// Numerical edge cases inside iteration loops (collinear samples, singular
/// covariance matrices) are absorbed by the algorithms and never reach the
/// caller. Only structural misuse is surfaced here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A mandatory input was empty or malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A closest-point query was issued against an index with no triangles
    #[error("Spatial index unavailable: {0}")]
    IndexUnavailable(String),

    /// A minimal sample or correspondence set could not define a model
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Mesh buffers are inconsistent (index out of range, id count mismatch)
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// An option is out of range or a configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidInput`]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Shorthand for [`Error::DegenerateGeometry`]
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Error::DegenerateGeometry(msg.into())
    }

    /// Shorthand for [`Error::InvalidConfig`]
    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }
}
