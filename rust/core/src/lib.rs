// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # CityGML-Lite Core Reader
//!
//! Streaming CityGML 2.0 reader built with [quick-xml](https://docs.rs/quick-xml).
//! Turns a document into typed city objects with raw polygon rings in source
//! coordinates, without building a generic XML tree.
//!
//! ## Overview
//!
//! - **Streaming Reader**: Pull-based event reading, one city object at a time
//! - **Typed Records**: Buildings, boundary surfaces, polygons and attributes
//! - **Semantic Classification**: Closed [`ElementType`] set, unknown names map to `Unknown`
//! - **Fast Number Parsing**: Coordinates via [fast-float](https://docs.rs/fast-float),
//!   integers via [lexical-core](https://docs.rs/lexical-core)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use citygml_lite_core::{parse_bytes, ElementType};
//!
//! let model = parse_bytes(std::fs::read("city.gml")?.as_slice())?;
//! for object in &model.objects {
//!     println!("{} ({}) with {} polygons", object.id, object.element_type, object.polygon_count());
//! }
//! ```
//!
//! ## Streaming
//!
//! For large files, pull objects one by one:
//!
//! ```rust,ignore
//! use citygml_lite_core::CityGmlReader;
//!
//! let mut reader = CityGmlReader::from_path("city.gml")?;
//! while let Some(object) = reader.next_object()? {
//!     println!("{}", object.id);
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization support for the record types

pub mod classify;
pub mod error;
pub mod fast_parse;
pub mod model;
pub mod model_bounds;
pub mod reader;

pub use classify::{summarize, ElementType, SemanticSummary};
pub use error::{Error, Result};
pub use fast_parse::{open_ring, parse_coordinates, parse_pos_list};
pub use model::{
    BoundarySurface, BuildingAttributes, CityModel, CityObject, Envelope, Point3, Polygon,
    ReadStats, Ring,
};
pub use model_bounds::ModelBounds;
pub use reader::{parse_bytes, CityGmlReader};
