// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for CityGML reading
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort reading a CityGML document
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed XML at byte {position}: {message}")]
    Xml { position: usize, message: String },

    #[error("I/O error while reading document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document contains no root element")]
    EmptyDocument,

    #[error("Unknown root element <{0}>, expected <CityModel>")]
    UnknownRoot(String),

    #[error("Document ended inside <{element}> (truncated input?)")]
    UnexpectedEof { element: String },

    #[error("City object <{element}> at byte {position} has no gml:id")]
    MissingIdentifier { element: String, position: usize },
}

impl Error {
    pub(crate) fn xml(position: usize, err: impl std::fmt::Display) -> Self {
        Error::Xml {
            position,
            message: err.to_string(),
        }
    }
}
