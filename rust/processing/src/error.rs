// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for export and conversion

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while serializing or writing artifacts
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to move artifact into place at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Exported artifacts disagree: {0}")]
    Inconsistent(String),

    #[error("Scene exceeds binary format limits: {0}")]
    TooLarge(String),
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Pipeline stage a conversion failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Geometry,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Read => "read",
            Stage::Geometry => "geometry",
            Stage::Export => "export",
        })
    }
}

/// Underlying cause of a failed conversion
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Parse(#[from] citygml_lite_core::Error),

    #[error(transparent)]
    Geometry(#[from] citygml_lite_geometry::Error),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("conversion cancelled")]
    Cancelled,
}

/// Conversion failure tagged with the stage it happened in
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct ConversionError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl ConversionError {
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    pub fn cancelled(stage: Stage) -> Self {
        Self {
            stage,
            source: StageError::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.source,
            StageError::Cancelled | StageError::Geometry(citygml_lite_geometry::Error::Cancelled)
        )
    }
}

impl From<citygml_lite_core::Error> for ConversionError {
    fn from(err: citygml_lite_core::Error) -> Self {
        ConversionError::new(Stage::Read, err)
    }
}

impl From<citygml_lite_geometry::Error> for ConversionError {
    fn from(err: citygml_lite_geometry::Error) -> Self {
        match err {
            citygml_lite_geometry::Error::Cancelled => ConversionError::cancelled(Stage::Geometry),
            other => ConversionError::new(Stage::Geometry, other),
        }
    }
}

impl From<ExportError> for ConversionError {
    fn from(err: ExportError) -> Self {
        ConversionError::new(Stage::Export, err)
    }
}
