// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! citygml2mesh - convert CityGML documents to OBJ/MTL, GLB and metadata.
//!
//! ```text
//! citygml2mesh city.gml out/city            # out/city.obj, .mtl, .glb, _metadata.json
//! citygml2mesh city.gml --format glb
//! citygml2mesh city.gml --count-only
//! ```
//!
//! Environment: `WORKER_THREADS`, `CONVERT_TIMEOUT_SECS`,
//! `PLANARITY_TOLERANCE`, `OFFSET_STRATEGY`. Flags take precedence.

use anyhow::{Context, Result};
use citygml_lite_geometry::{GeometryOptions, OffsetStrategy};
use citygml_lite_processing::{
    convert, Artifacts, CancelToken, ConversionError, ConversionMode, ConversionResult,
    ConvertOptions, Formats, OutputTargets, Source, Stage,
};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

/// Which mesh artifacts to write.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Obj,
    Glb,
    Both,
}

impl From<FormatArg> for Formats {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Obj => Formats::OBJ,
            FormatArg::Glb => Formats::GLB,
            FormatArg::Both => Formats::ALL,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "citygml2mesh", version, about = "Convert CityGML to OBJ/GLB meshes with a metadata index")]
struct Args {
    /// CityGML input document
    input: PathBuf,

    /// Output prefix (`dir/stem`); defaults to the input path without extension
    output: Option<PathBuf>,

    /// Only read and classify; write nothing
    #[arg(long, default_value_t = false)]
    count_only: bool,

    /// Mesh formats to write (metadata is always written)
    #[arg(long, value_enum, default_value_t = FormatArg::Both)]
    format: FormatArg,

    /// bbox-center, centroid, min-corner or none [env: OFFSET_STRATEGY]
    #[arg(long)]
    offset_strategy: Option<OffsetStrategy>,

    /// Planarity tolerance in source units [env: PLANARITY_TOLERANCE]
    #[arg(long)]
    planarity_tolerance: Option<f64>,

    /// Fail objects whose polygons all fail to triangulate
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Abort after this many seconds, 0 disables [env: CONVERT_TIMEOUT_SECS]
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Worker threads [env: WORKER_THREADS]
    #[arg(long)]
    threads: Option<usize>,

    /// Debug logging for the converter crates
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose {
        "info,citygml_lite_core=debug,citygml_lite_geometry=debug,citygml_lite_processing=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

/// Split an output prefix into directory and file stem
fn output_prefix(input: &Path, output: Option<&Path>) -> Result<(PathBuf, String)> {
    let prefix = match output {
        Some(p) => p.to_path_buf(),
        None => input.with_extension(""),
    };
    let stem = prefix
        .file_name()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .with_context(|| format!("output prefix '{}' has no file name", prefix.display()))?
        .to_string();
    let dir = match prefix.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, stem))
}

fn exit_code(err: &ConversionError) -> u8 {
    if err.is_cancelled() {
        return 5;
    }
    match err.stage {
        Stage::Read => 2,
        Stage::Geometry => 3,
        Stage::Export => 4,
    }
}

fn report(result: &ConversionResult) {
    println!("objects:    {}", result.total_objects);
    println!("polygons:   {}", result.total_polygons);
    if let Some(offset) = result.offset {
        println!("vertices:   {}", result.total_vertices);
        println!("triangles:  {}", result.total_triangles);
        println!("offset:     {} {} {}", offset.x, offset.y, offset.z);
    }
    for (element_type, count) in &result.surface_counts {
        println!("  {element_type}: {count}");
    }
    println!("warnings:   {}", result.warnings.total());
    if let Artifacts::Files { obj, mtl, glb, metadata } = &result.artifacts {
        for path in [obj, mtl, glb].into_iter().flatten().chain(std::iter::once(metadata)) {
            println!("wrote {}", path.display());
        }
    }
}

fn run(args: Args, config: Config) -> Result<std::result::Result<ConversionResult, ConversionError>> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads.unwrap_or(config.worker_threads))
        .build_global()
        .context("failed to initialize worker pool")?;

    let planarity_tolerance = args.planarity_tolerance.unwrap_or(config.planarity_tolerance);
    if !planarity_tolerance.is_finite() || planarity_tolerance < 0.0 {
        anyhow::bail!("planarity tolerance must be a non-negative number");
    }

    let timeout = args.timeout_secs.unwrap_or(config.convert_timeout_secs);
    let cancel = if timeout > 0 {
        CancelToken::with_timeout(Duration::from_secs(timeout))
    } else {
        CancelToken::new()
    };

    let options = ConvertOptions {
        mode: if args.count_only {
            ConversionMode::CountOnly
        } else {
            ConversionMode::Full
        },
        geometry: GeometryOptions {
            offset_strategy: args.offset_strategy.unwrap_or(config.offset_strategy),
            planarity_tolerance,
            strict: args.strict,
        },
        cancel,
    };

    let (dir, stem) = output_prefix(&args.input, args.output.as_deref())?;
    let targets = OutputTargets::Directory {
        dir,
        stem,
        formats: args.format.into(),
    };

    tracing::info!(
        input = %args.input.display(),
        mode = ?options.mode,
        offset_strategy = %options.geometry.offset_strategy,
        timeout_secs = timeout,
        "Starting CityGML conversion"
    );
    Ok(convert(Source::Path(args.input), &targets, &options))
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs);
    let config = Config::from_env();

    match run(args, config) {
        Ok(Ok(result)) => {
            report(&result);
            ExitCode::SUCCESS
        }
        Ok(Err(err)) => {
            tracing::error!(stage = %err.stage, error = %err, "Conversion failed");
            eprintln!("error: {err}");
            ExitCode::from(exit_code(&err))
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
