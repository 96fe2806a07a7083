// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversion pipeline: read, then geometry and classification in parallel,
//! then export.
//!
//! Every call is independent. Nothing is written to the output directory
//! unless all stages succeed.

use crate::cancel::CancelToken;
use crate::error::{ConversionError, ExportError, Stage};
use crate::export::{export_scene, ArtifactNames, ExportedArtifacts, Formats, StagedArtifacts};
use crate::scene::SceneModel;
use citygml_lite_core::{summarize, CityGmlReader, CityModel, ElementType, ReadStats, SemanticSummary};
use citygml_lite_geometry::{build_geometry, GeometryOptions, GeometryStats, GlobalOffset};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Where the CityGML document comes from
#[derive(Debug, Clone)]
pub enum Source<'a> {
    Path(PathBuf),
    Bytes(&'a [u8]),
}

/// Where the artifacts go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTargets {
    /// `<dir>/<stem>.obj`, `.mtl`, `.glb` and `<stem>_metadata.json`
    Directory {
        dir: PathBuf,
        stem: String,
        formats: Formats,
    },
    /// Keep the serialized artifacts in the result
    Memory { formats: Formats },
}

impl OutputTargets {
    pub fn directory(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        OutputTargets::Directory {
            dir: dir.into(),
            stem: stem.into(),
            formats: Formats::ALL,
        }
    }

    pub fn memory() -> Self {
        OutputTargets::Memory {
            formats: Formats::ALL,
        }
    }

    pub fn formats(&self) -> Formats {
        match self {
            OutputTargets::Directory { formats, .. } | OutputTargets::Memory { formats } => *formats,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionMode {
    #[default]
    Full,
    /// Read and classify only; no triangulation, no artifacts
    CountOnly,
}

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub mode: ConversionMode,
    pub geometry: GeometryOptions,
    pub cancel: CancelToken,
}

/// Locally recovered defects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Warnings {
    pub read: ReadStats,
    pub geometry: GeometryStats,
}

impl Warnings {
    pub fn total(&self) -> usize {
        self.read.total() + self.geometry.total()
    }
}

/// Paths or buffers produced by a conversion
#[derive(Debug, Clone, Default)]
pub enum Artifacts {
    /// Count-only run
    #[default]
    None,
    Files {
        obj: Option<PathBuf>,
        mtl: Option<PathBuf>,
        glb: Option<PathBuf>,
        metadata: PathBuf,
    },
    Memory(ExportedArtifacts),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timings {
    pub parse_ms: u64,
    pub geometry_ms: u64,
    pub export_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ConversionResult {
    /// Distinct object identifiers in the document
    pub total_objects: usize,
    pub total_polygons: usize,
    /// Zero in count-only mode
    pub total_vertices: usize,
    /// Zero in count-only mode
    pub total_triangles: usize,
    /// Offset subtracted from every exported vertex; `None` in count-only mode
    pub offset: Option<GlobalOffset>,
    pub warnings: Warnings,
    /// Boundary surfaces per element type over the whole document
    pub surface_counts: BTreeMap<ElementType, usize>,
    pub artifacts: Artifacts,
    pub timings: Timings,
}

fn read_objects<R: BufRead>(
    reader: CityGmlReader<R>,
    cancel: &CancelToken,
) -> Result<CityModel, ConversionError> {
    reader
        .into_model_until(|| cancel.is_cancelled())?
        .ok_or_else(|| ConversionError::cancelled(Stage::Read))
}

fn read_source(source: &Source<'_>, cancel: &CancelToken) -> Result<CityModel, ConversionError> {
    match source {
        Source::Path(path) => {
            tracing::info!(path = %path.display(), "Reading CityGML document");
            read_objects(CityGmlReader::from_path(path)?, cancel)
        }
        Source::Bytes(bytes) => {
            tracing::info!(content_size = bytes.len(), "Reading CityGML document");
            read_objects(CityGmlReader::from_bytes(bytes), cancel)
        }
    }
}

fn surface_counts(summaries: &[SemanticSummary]) -> BTreeMap<ElementType, usize> {
    let mut counts = BTreeMap::new();
    for summary in summaries {
        for (element_type, count) in &summary.surface_counts {
            *counts.entry(*element_type).or_insert(0) += count;
        }
    }
    counts
}

#[inline]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn write_files(
    exported: ExportedArtifacts,
    dir: &Path,
    names: &ArtifactNames,
) -> Result<Artifacts, ExportError> {
    std::fs::create_dir_all(dir).map_err(|e| ExportError::io(dir, e))?;

    let mut staged = StagedArtifacts::new(dir);
    if let Some(obj) = &exported.obj {
        staged.stage(&names.obj, obj)?;
    }
    if let Some(mtl) = &exported.mtl {
        staged.stage(&names.mtl, mtl)?;
    }
    if let Some(glb) = &exported.glb {
        staged.stage(&names.glb, glb)?;
    }
    staged.stage(&names.metadata, &exported.metadata)?;
    staged.commit()?;

    let path = |written: bool, name: &str| written.then(|| dir.join(name));
    Ok(Artifacts::Files {
        obj: path(exported.obj.is_some(), &names.obj),
        mtl: path(exported.mtl.is_some(), &names.mtl),
        glb: path(exported.glb.is_some(), &names.glb),
        metadata: dir.join(&names.metadata),
    })
}

/// Convert one CityGML document.
///
/// On error nothing has been written to the target directory.
pub fn convert(
    source: Source<'_>,
    targets: &OutputTargets,
    options: &ConvertOptions,
) -> Result<ConversionResult, ConversionError> {
    let total_start = Instant::now();
    let cancel = &options.cancel;

    let parse_start = Instant::now();
    let model = read_source(&source, cancel)?;
    let parse_ms = elapsed_ms(parse_start);

    if options.mode == ConversionMode::CountOnly {
        let summaries: Vec<SemanticSummary> = model.objects.par_iter().map(summarize).collect();
        let result = ConversionResult {
            total_objects: model.len(),
            total_polygons: model.polygon_count(),
            warnings: Warnings {
                read: model.stats,
                geometry: GeometryStats::default(),
            },
            surface_counts: surface_counts(&summaries),
            timings: Timings {
                parse_ms,
                total_ms: elapsed_ms(total_start),
                ..Default::default()
            },
            ..Default::default()
        };
        tracing::info!(
            objects = result.total_objects,
            polygons = result.total_polygons,
            "Count-only conversion complete"
        );
        return Ok(result);
    }

    // Geometry and classification read disjoint fields of the same records
    let geometry_start = Instant::now();
    let (geometry, summaries) = rayon::join(
        || build_geometry(&model.objects, &options.geometry, || cancel.is_cancelled()),
        || {
            model
                .objects
                .par_iter()
                .map(summarize)
                .collect::<Vec<SemanticSummary>>()
        },
    );
    let geometry = geometry?;
    let geometry_ms = elapsed_ms(geometry_start);

    if cancel.is_cancelled() {
        return Err(ConversionError::cancelled(Stage::Export));
    }

    let export_start = Instant::now();
    let scene = SceneModel::new(&model, &geometry, &summaries)?;
    let names = match targets {
        OutputTargets::Directory { stem, .. } => ArtifactNames::new(stem),
        OutputTargets::Memory { .. } => ArtifactNames::new("model"),
    };
    let exported = export_scene(&scene, targets.formats(), &names)?;
    let artifacts = match targets {
        OutputTargets::Directory { dir, .. } => write_files(exported, dir, &names)?,
        OutputTargets::Memory { .. } => Artifacts::Memory(exported),
    };
    let export_ms = elapsed_ms(export_start);

    let result = ConversionResult {
        total_objects: scene.len(),
        total_polygons: model.polygon_count(),
        total_vertices: scene.vertex_count(),
        total_triangles: scene.triangle_count(),
        offset: Some(geometry.offset),
        warnings: Warnings {
            read: model.stats,
            geometry: geometry.stats,
        },
        surface_counts: surface_counts(&summaries),
        artifacts,
        timings: Timings {
            parse_ms,
            geometry_ms,
            export_ms,
            total_ms: elapsed_ms(total_start),
        },
    };

    tracing::info!(
        objects = result.total_objects,
        triangles = result.total_triangles,
        warnings = result.warnings.total(),
        total_time_ms = result.timings.total_ms,
        "Conversion complete"
    );
    Ok(result)
}
