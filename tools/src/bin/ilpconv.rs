//! # `ilpconv`
//!
//! Converts linear optimization instances between file formats.
//!
//! ```text
//! ilpconv -r mps -w sugar model.mps
//! ilpconv -r pisinger -w casp -n 3 -o out/ knapsacks.csv
//! ```

use std::{num::NonZeroUsize, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use ilpconv::{
    options::Options,
    pipeline::{convert_batch, DirSink, Input, Job, PipelineSettings, Registry, Sink, StreamSink},
    transforms::normalize::{Normalizer, DEFAULT_MAX_SCALE},
};
use ilpconv_tools::logger;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The input files. `-` reads from `stdin`.
    #[arg(default_value = "-")]
    inputs: Vec<String>,
    /// The input format
    #[arg(short, long)]
    reader: String,
    /// The output format
    #[arg(short, long)]
    writer: String,
    /// Scale fractional coefficients to integers
    #[arg(short = 'f', long)]
    convert_float: bool,
    /// The largest factor used for scaling to integer coefficients
    #[arg(long, default_value_t = DEFAULT_MAX_SCALE, value_parser = clap::value_parser!(i64).range(1..))]
    max_scale: i64,
    /// The output directory, one file per instance. `-` writes all instances
    /// to `stdout`.
    #[arg(short, long, default_value = "-")]
    out_dir: String,
    /// Compress files in the output directory, e.g., `gz`
    #[arg(long)]
    compress: Option<String>,
    /// The maximum number of instances to convert per input
    #[arg(short, long)]
    num_instances: Option<NonZeroUsize>,
    /// Force the optimization direction (`minimize` or `maximize`)
    #[arg(short = 's', long)]
    opt_strategy: Option<String>,
    /// The optimization direction for inputs that do not state one
    #[arg(short, long)]
    default_opt_strategy: Option<String>,
    /// Do not split constraints with more than three terms
    #[arg(short = 'p', long)]
    no_split: bool,
    /// Reader options as `key=value;key=value`
    #[arg(short = 'e', long, default_value = "")]
    reader_opts: String,
    /// Writer options as `key=value;key=value`
    #[arg(short = 'i', long, default_value = "")]
    writer_opts: String,
    /// Increase the log verbosity, can be repeated
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let mut reader_opts =
        Options::parse(&args.reader_opts).context("failed to parse reader options")?;
    if let Some(dir) = args.opt_strategy {
        reader_opts.insert("opt_strategy", dir);
    }
    if let Some(dir) = args.default_opt_strategy {
        reader_opts.insert("default_opt_strategy", dir);
    }
    let job = Job {
        reader: args.reader,
        reader_opts,
        writer: args.writer,
        writer_opts: Options::parse(&args.writer_opts)
            .context("failed to parse writer options")?,
        settings: PipelineSettings {
            no_split: args.no_split,
            normalizer: args.convert_float.then(|| Normalizer::new(args.max_scale)),
            count: args.num_instances,
            ..PipelineSettings::default()
        },
    };

    let registry = Registry::default();
    // fail on configuration errors before touching any input
    registry
        .converter(&job)
        .context("invalid conversion configuration")?;

    let mut sink: Box<dyn Sink> = if args.out_dir == "-" {
        Box::new(StreamSink::stdout())
    } else {
        let dir = PathBuf::from(&args.out_dir);
        let sink = DirSink::new(&dir)
            .with_context(|| format!("cannot write to {}", dir.display()))?;
        match args.compress {
            Some(ext) => Box::new(sink.with_compression(ext)),
            None => Box::new(sink),
        }
    };

    let inputs: Vec<Input> = args.inputs.iter().map(Input::from_arg).collect();
    let n_inputs = inputs.len();
    let batch = convert_batch(&registry, &job, inputs, sink.as_mut());
    tracing::info!(
        inputs = n_inputs,
        written = batch.n_written(),
        failed = batch.n_failed(),
        "conversion finished"
    );
    if batch.n_failed() > 0 {
        anyhow::bail!("{} of {n_inputs} inputs failed", batch.n_failed());
    }
    Ok(())
}
