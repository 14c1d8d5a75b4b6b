//! # VOLSIM
//!
//! Command-line front end: run a volume calculation from a TOML model,
//! inspect stored results, and normalize tallies against them.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use volsim_rs::config::RunConfig;
use volsim_rs::normalize::GroupTable;
use volsim_rs::stochastic::RandomGenerator;
use volsim_rs::tally::ReactionTally;
use volsim_rs::volume::{store::read_results, CancelToken, VolumeStore};
use volsim_rs::{info as lib_info, TallyNormalizer};

#[derive(Parser, Debug)]
#[command(name = "volsim")]
#[command(about = "Stochastic volume estimation and tally normalization")]
#[command(version)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate domain volumes for a TOML model
    Run {
        /// Run configuration file
        config: PathBuf,

        /// Where volume_<run_id>.json is written
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Worker threads (default: all cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Ignore the configured seed and draw one from the OS
        #[arg(long)]
        random_seed: bool,
    },

    /// Divide tallies by stored atom counts
    Normalize {
        /// Volume results document
        volumes: PathBuf,

        /// JSON array of tallies
        tallies: PathBuf,

        /// Emit results as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print a stored volume results document
    Show {
        /// Volume results document
        volumes: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "volsim_rs=debug,volsim=debug"
    } else {
        "volsim_rs=info,volsim=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Run { config, output_dir, threads, random_seed } => {
            run(config, output_dir, threads, random_seed)
        }
        Command::Normalize { volumes, tallies, json } => normalize(volumes, tallies, json),
        Command::Show { volumes } => {
            let results = read_results(&volumes)
                .with_context(|| format!("reading {}", volumes.display()))?;
            println!("{}", results.summary());
            Ok(())
        }
    }
}

fn run(
    config: PathBuf,
    output_dir: PathBuf,
    threads: Option<usize>,
    random_seed: bool,
) -> anyhow::Result<()> {
    println!("{}", lib_info());
    println!();

    if let Some(n) = threads {
        if n == 0 {
            bail!("--threads must be at least 1");
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("configuring thread pool")?;
    }

    let cfg = RunConfig::from_file(&config)
        .with_context(|| format!("loading {}", config.display()))?;
    let (geometry, mut calc) = cfg.build()?;

    if random_seed {
        let (_, seed) = RandomGenerator::from_entropy();
        info!(seed, "using OS-drawn seed");
        calc = calc.with_seed(seed);
    }

    let start = std::time::Instant::now();
    let results = calc.execute_with(&geometry, Some(&geometry), &CancelToken::new())?;
    let elapsed = start.elapsed();

    println!("{}", results.summary());
    println!("Wall-clock time: {:.3} s", elapsed.as_secs_f64());
    println!(
        "Throughput: {:.2e} points/s",
        results.samples as f64 / elapsed.as_secs_f64()
    );

    let path = VolumeStore::new(output_dir).save(&results)?;
    println!("Results written to {}", path.display());
    Ok(())
}

fn normalize(volumes: PathBuf, tally_path: PathBuf, json: bool) -> anyhow::Result<()> {
    let results = read_results(&volumes)
        .with_context(|| format!("reading {}", volumes.display()))?;
    let text = fs::read_to_string(&tally_path)
        .with_context(|| format!("reading {}", tally_path.display()))?;
    let tallies: Vec<ReactionTally> = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", tally_path.display()))?;

    let normalizer = TallyNormalizer::new(&results);
    let outcomes = normalizer.normalize_all(&tallies);
    let failed = outcomes.iter().filter(|r| r.is_err()).count();
    let quantities: Vec<_> = outcomes.into_iter().filter_map(Result::ok).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&quantities)?);
    } else {
        for q in &quantities {
            let nuclide = q.nuclide.map(|n| n.to_string()).unwrap_or_else(|| "total".into());
            let group = q.group.map(|g| format!(" g{}", g)).unwrap_or_default();
            println!(
                "{:<14} {:<10} {:<12}{:<4} {:>14.6e} ± {:.4e} ({:.2}%)",
                q.domain.to_string(),
                nuclide,
                q.score.to_string(),
                group,
                q.mean,
                q.std_dev,
                100.0 * q.relative_std_dev()
            );
        }

        let keys: BTreeSet<_> = quantities
            .iter()
            .filter(|q| q.group.is_some())
            .map(|q| (q.domain, q.nuclide, q.score))
            .collect();
        for (domain, nuclide, score) in keys {
            let table = GroupTable::collect(&quantities, domain, nuclide, score);
            if table.values.len() > 1 {
                println!();
                print!("{}", table.render(None));
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} tallies could not be normalized", failed, tallies.len());
    }
    Ok(())
}
