use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use tempora_dataset::Dataset;
use tempora_dtw::{BandRatio, DistanceKind, Value};
use tempora_index::GroupedDataset;

#[derive(Parser)]
#[command(name = "tempora")]
#[command(about = "Indexed similarity search over time-series sub-sequences")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Warping band width as a fraction of sequence length
    #[arg(long, default_value_t = 0.1, global = true)]
    band_ratio: f64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,
}

/// How to read a dataset file.
#[derive(Args)]
struct InputArgs {
    /// Dataset file to read
    #[arg(long)]
    input: PathBuf,

    /// Read at most this many rows (0 = all)
    #[arg(long, default_value_t = 0)]
    max_rows: usize,

    /// Drop this many leading columns
    #[arg(long, default_value_t = 0)]
    start_col: usize,

    /// Characters that separate fields
    #[arg(long, default_value = " ")]
    separators: String,
}

#[derive(Subcommand)]
enum Command {
    /// Rescale a dataset to [0, 1] and write it back out
    Normalize {
        #[command(flatten)]
        input: InputArgs,

        /// Output file
        #[arg(long)]
        output: PathBuf,

        /// Field separator for the output file
        #[arg(long, default_value_t = ' ')]
        out_separator: char,
    },

    /// Down-sample a dataset by averaging fixed-size blocks
    Paa {
        #[command(flatten)]
        input: InputArgs,

        /// Output file
        #[arg(long)]
        output: PathBuf,

        /// Number of consecutive values averaged into one
        #[arg(long)]
        block: usize,

        /// Field separator for the output file
        #[arg(long, default_value_t = ' ')]
        out_separator: char,
    },

    /// Group all sub-sequences into a similarity index and save it
    Build {
        #[command(flatten)]
        input: InputArgs,

        /// Distance to group with: euclidean or euclidean_dtw
        #[arg(long, default_value = "euclidean")]
        distance: String,

        /// Maximum distance between two members of one group
        #[arg(long)]
        threshold: f64,

        /// Index file to write
        #[arg(long)]
        index: PathBuf,

        /// Save only group sizes (smaller, but not loadable)
        #[arg(long)]
        compact: bool,

        /// Min-max normalize the dataset before indexing
        #[arg(long)]
        normalize: bool,

        /// PAA block size to apply before indexing
        #[arg(long)]
        paa: Option<usize>,
    },

    /// Find the stored sub-sequence most similar to a query window
    Match {
        #[command(flatten)]
        input: InputArgs,

        /// Index file written by `build`
        #[arg(long)]
        index: PathBuf,

        /// Dataset file holding the query (defaults to --input)
        #[arg(long)]
        query_input: Option<PathBuf>,

        /// Row of the query dataset to take the query from
        #[arg(long)]
        query_row: usize,

        /// Window start within the query row (defaults to the whole row)
        #[arg(long)]
        query_start: Option<usize>,

        /// Window end, exclusive, within the query row
        #[arg(long)]
        query_end: Option<usize>,

        /// Write the match as JSON to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct MatchArtifact {
    query: QueryWindow,
    matched: MatchedWindow,
    distance: Value,
}

#[derive(Serialize)]
struct QueryWindow {
    row: usize,
    start: usize,
    end: usize,
}

#[derive(Serialize)]
struct MatchedWindow {
    row: usize,
    start: usize,
    end: usize,
}

fn load_dataset(args: &InputArgs) -> Result<Dataset> {
    Dataset::load(&args.input, args.max_rows, args.start_col, &args.separators)
        .with_context(|| format!("loading dataset {}", args.input.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let band = BandRatio::new(cli.band_ratio)?;

    match cli.command {
        Command::Normalize {
            input,
            output,
            out_separator,
        } => {
            let mut dataset = load_dataset(&input)?;
            let (min, max) = dataset.normalize();
            info!(min = min as f64, max = max as f64, "dataset normalized");
            dataset
                .save(&output, out_separator)
                .with_context(|| format!("writing {}", output.display()))?;
        }

        Command::Paa {
            input,
            output,
            block,
            out_separator,
        } => {
            let mut dataset = load_dataset(&input)?;
            dataset.paa(block)?;
            info!(
                block,
                item_length = dataset.item_length(),
                "dataset down-sampled"
            );
            dataset
                .save(&output, out_separator)
                .with_context(|| format!("writing {}", output.display()))?;
        }

        Command::Build {
            input,
            distance,
            threshold,
            index,
            compact,
            normalize,
            paa,
        } => {
            let kind = DistanceKind::from_name(&distance)?;
            let mut dataset = load_dataset(&input)?;
            if normalize {
                let (min, max) = dataset.normalize();
                info!(min = min as f64, max = max as f64, "dataset normalized");
            }
            if let Some(block) = paa {
                dataset.paa(block)?;
            }

            let mut grouped = GroupedDataset::new(dataset, band);
            let groups = grouped.build_index(kind, threshold as Value)?;
            grouped
                .save_index(&index, compact)
                .with_context(|| format!("writing {}", index.display()))?;
            println!("{groups} groups across all lengths");
        }

        Command::Match {
            input,
            index,
            query_input,
            query_row,
            query_start,
            query_end,
            output,
        } => {
            let mut grouped = GroupedDataset::new(load_dataset(&input)?, band);
            grouped
                .load_index(&index)
                .with_context(|| format!("loading index {}", index.display()))?;

            let query_dataset = match &query_input {
                Some(path) => Dataset::load(path, 0, input.start_col, &input.separators)
                    .with_context(|| format!("loading query dataset {}", path.display()))?,
                None => grouped.dataset().clone(),
            };

            let query = match (query_start, query_end) {
                (None, None) => query_dataset.time_series(query_row)?,
                (Some(start), Some(end)) => query_dataset.sub_sequence(query_row, start, end)?,
                _ => bail!("--query-start and --query-end must be given together"),
            };

            let best = grouped.best_match(&query)?;
            let artifact = MatchArtifact {
                query: QueryWindow {
                    row: query_row,
                    start: query.start(),
                    end: query.end(),
                },
                matched: MatchedWindow {
                    row: best.series.index(),
                    start: best.series.start(),
                    end: best.series.end(),
                },
                distance: best.distance,
            };

            let json = serde_json::to_string_pretty(&artifact).expect("serialization cannot fail");
            match output {
                Some(path) => std::fs::write(&path, &json)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}
