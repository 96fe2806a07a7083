// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # CityGML-Lite Processing
//!
//! Conversion pipeline shared by the CLI and any embedding service:
//! reads a CityGML document, builds meshes and semantic summaries in
//! parallel, then exports OBJ/MTL, GLB and a JSON metadata index.
//!
//! ```rust,ignore
//! use citygml_lite_processing::{convert, ConvertOptions, OutputTargets, Source};
//!
//! let result = convert(
//!     Source::Path("city.gml".into()),
//!     &OutputTargets::directory("out", "city"),
//!     &ConvertOptions::default(),
//! )?;
//! println!("{} objects, {} triangles", result.total_objects, result.total_triangles);
//! ```

pub mod cancel;
pub mod convert;
pub mod error;
pub mod export;
pub mod palette;
pub mod scene;

#[cfg(test)]
mod test_fixtures;

pub use cancel::CancelToken;
pub use convert::{
    convert, Artifacts, ConversionMode, ConversionResult, ConvertOptions, OutputTargets, Source,
    Timings, Warnings,
};
pub use error::{ConversionError, ExportError, Stage, StageError};
pub use export::{export_scene, ArtifactNames, ExportSummary, ExportedArtifacts, Formats};
pub use palette::{material_for, Material, MATERIALS};
pub use scene::{SceneModel, SceneObject};
