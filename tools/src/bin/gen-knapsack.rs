//! # `gen-knapsack`
//!
//! Generates a stream of random binary knapsack instances in the Pisinger
//! format.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use ilpconv_tools::knapsack::{Capacity, Generator};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The output path. Writes to `stdout` if not given.
    out_path: Option<PathBuf>,
    /// The number of instances in the stream
    #[arg(long, default_value_t = 5)]
    n_instances: usize,
    /// The number of items to select from
    #[arg(long, default_value_t = 20)]
    n_items: usize,
    /// The minimum item weight
    #[arg(long, default_value_t = 1)]
    min_weight: i64,
    /// The maximum item weight
    #[arg(long, default_value_t = 40)]
    max_weight: i64,
    /// The minimum item profit
    #[arg(long, default_value_t = 1)]
    min_profit: i64,
    /// The maximum item profit
    #[arg(long, default_value_t = 40)]
    max_profit: i64,
    /// The fraction of the total weight to set the capacity to
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(i64).range(1..))]
    cap_fraction: i64,
    /// The prefix of the instance names
    #[arg(long, default_value = "knap")]
    prefix: String,
    /// The random seed to use
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    anyhow::ensure!(
        args.min_weight <= args.max_weight && args.min_profit <= args.max_profit,
        "empty weight or profit range"
    );
    let gen = Generator {
        n_items: args.n_items,
        profit_range: args.min_profit..=args.max_profit,
        weight_range: args.min_weight..=args.max_weight,
        capacity: Capacity::FractionTotalWeight(args.cap_fraction),
        prefix: args.prefix,
    };

    let mut writer: Box<dyn Write> = match &args.out_path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    for knap in gen.generate(args.n_instances, args.seed) {
        knap.write(&mut writer)?;
    }
    writer.flush()?;
    Ok(())
}
