mod bed;
mod error;
mod layout;
mod pdf;
mod plot;
mod qa;
mod raster;
mod vector;

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use clap::Parser;
use log::{debug, info, warn};

use crate::bed::{load_records, RecordMode};
use crate::layout::{aggregate_extents, find_split_sequences, AxisLayout};
use crate::plot::{render_to_file, Dotplot, OutputFormat, PlotStyle, RemoveSet};
use crate::qa::{extract_boxes, read_points};

#[derive(Parser)]
#[command(name = "qadot")]
#[command(about = "Visualize the qa_file in a dotplot.", long_about = None)]
struct Args {
    // MANDATORY OPTIONS
    /// Cluster FILE of anchor pairs (label_a pos_a label_b pos_b score), blocks separated by `#` lines.
    #[arg(value_name = "QA_FILE")]
    qa_file: PathBuf,

    /// Range file of the query genome (x axis).
    #[arg(long = "qbed", value_name = "FILE")]
    qbed: PathBuf,

    /// Range file of the subject genome (y axis).
    #[arg(long = "sbed", value_name = "FILE")]
    sbed: PathBuf,

    // Layout Options
    /// Use actual bp positions from the range files instead of ranks.
    #[arg(long = "bpscale")]
    bpscale: bool,

    /// Sort range records by sequence id before computing chromosome extents.
    #[arg(long = "sort")]
    sort: bool,

    // Output Options
    /// Format of the output plot.
    #[arg(long = "outfmt", value_enum, value_name = "FMT", default_value_t = OutputFormat::Png)]
    outfmt: OutputFormat,

    /// Remove chromosome breaks and labels from the query (q), the subject (s) or both (qs).
    #[arg(long = "remove", value_name = "q|s|qs")]
    remove: Option<RemoveSet>,

    /// Write the plot to this FILE instead of <QA_FILE stem>.<FMT>.
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    out: Option<PathBuf>,

    /// Resolution of raster output.
    #[arg(long = "dpi", value_name = "N", default_value_t = 600, value_parser = clap::value_parser!(u32).range(1..))]
    dpi: u32,

    /// Width and height of the figure in inches.
    #[arg(long = "size", value_name = "INCHES", default_value_t = 8.0)]
    size: f64,

    // Logging
    /// Verbosity level (0 = error, 1 = info, 2 = debug).
    #[arg(short = 'v', long = "verbose", value_name = "N", default_value_t = 1)]
    verbose: u8,
}

/// Axis title for a genome: file name up to the first dot, underscores as spaces.
fn genome_name(path: &Path) -> String {
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    file_name.split('.').next().unwrap_or_default().replace('_', " ")
}

fn load_axis(path: &Path, mode: RecordMode, presort: bool) -> anyhow::Result<AxisLayout> {
    let records = load_records(path, mode).with_context(|| format!("reading range file {}", path.display()))?;

    if !presort {
        let split = find_split_sequences(&records);
        if !split.is_empty() {
            warn!(
                "{}: sequences not contiguous, each run gets its own extent (use --sort to merge): {}",
                path.display(),
                split.join(", ")
            );
        }
    }

    let extents = aggregate_extents(&records, mode, presort);
    let layout = AxisLayout::from_extents(&extents)?;
    debug!("{}: {} sequences, axis length {}", path.display(), extents.len(), layout.total_length);
    Ok(layout)
}

fn run(args: &Args) -> anyhow::Result<PathBuf> {
    ensure!(args.size > 0.0, "--size must be positive, got {}", args.size);

    let mode = if args.bpscale { RecordMode::BpScale } else { RecordMode::Rank };
    let query = load_axis(&args.qbed, mode, args.sort)?;
    let subject = load_axis(&args.sbed, mode, args.sort)?;

    let boxes = extract_boxes(&args.qa_file)
        .with_context(|| format!("reading clusters from {}", args.qa_file.display()))?;
    let points = read_points(&args.qa_file)
        .with_context(|| format!("reading points from {}", args.qa_file.display()))?;

    let plot = Dotplot {
        points: &points,
        boxes: &boxes,
        query: &query,
        subject: &subject,
        remove: args.remove.unwrap_or_default(),
        query_name: genome_name(&args.qbed),
        subject_name: genome_name(&args.sbed),
    };
    let style = PlotStyle { size_inches: args.size, dpi: args.dpi };

    let image_name = args
        .out
        .clone()
        .unwrap_or_else(|| args.qa_file.with_extension(args.outfmt.extension()));
    info!("print image to `{}`", image_name.display());
    render_to_file(&plot, &style, args.outfmt, &image_name)
        .with_context(|| format!("writing {}", image_name.display()))?;
    Ok(image_name)
}

fn main() {
    let args = Args::parse();

    // Initialize logger based on verbosity
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
