// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use fast_marching::io;
use fast_marching::marching::{FastMarchingSolver, ProgressInfo};
use fast_marching::upwind::{TargetReachedMode, UpwindGradientSolver};
use fast_marching::Node;

#[derive(Parser)]
#[command(
    name = "fast-marching",
    about = "Fast marching eikonal solver with upwind gradients and target stopping"
)]
struct Cli {
    /// Dimensionality (1, 2, or 3)
    #[arg(short = 'd', long)]
    dim: usize,

    /// Grid size, comma-separated (e.g., 256,256 or 64,64,64)
    #[arg(short = 's', long)]
    size: String,

    /// Alive seed "i,j[=value]" (repeatable; value defaults to 0)
    #[arg(long, num_args = 1)]
    alive: Vec<String>,

    /// Trial seed "i,j[=value]" (repeatable; value defaults to 0)
    #[arg(long, num_args = 1)]
    trial: Vec<String>,

    /// Target cell "i,j" (repeatable)
    #[arg(long, num_args = 1)]
    target: Vec<String>,

    /// Target policy: "none", "one", "all", or "some:<n>"
    #[arg(long, default_value = "none")]
    target_mode: String,

    /// Arrival time to keep propagating after the target policy triggers
    #[arg(long, default_value = "1.0")]
    target_offset: f64,

    /// Speed field: "uniform:<val>", "speed-file:<path>", or
    /// "slowness-file:<path>"
    #[arg(long, default_value = "uniform:1.0")]
    speed: String,

    /// Grid spacing, one value for all axes or one per axis
    #[arg(long, default_value = "1.0")]
    spacing: String,

    /// Factor every speed is divided by
    #[arg(long, default_value = "1.0")]
    normalization: f64,

    /// Stop once the front exceeds this arrival time
    #[arg(long)]
    stopping_value: Option<f64>,

    /// Arrival time output path (.npy or .mat)
    #[arg(short = 'o', long, default_value = "arrival.npy")]
    output: PathBuf,

    /// Label output path (.npy or .mat)
    #[arg(long)]
    labels_output: Option<PathBuf>,

    /// Gradient output path (.npy or .mat); enables gradient generation
    #[arg(long)]
    gradient_output: Option<PathBuf>,

    /// Print progress to stderr
    #[arg(long)]
    progress: bool,
}

fn parse_list<T: FromStr>(s: &str, flag: &str) -> Result<Vec<T>> {
    s.split(',')
        .map(|p| p.trim().parse::<T>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| anyhow::anyhow!("invalid {} '{}': expected comma-separated numbers", flag, s))
}

fn to_array<T: Copy, const N: usize>(values: &[T], flag: &str) -> Result<[T; N]> {
    match <[T; N]>::try_from(values) {
        Ok(array) => Ok(array),
        Err(_) => bail!(
            "{} has {} components but --dim is {}",
            flag,
            values.len(),
            N
        ),
    }
}

fn parse_spacing<const N: usize>(s: &str) -> Result<[f64; N]> {
    let values: Vec<f64> = parse_list(s, "--spacing")?;
    if values.len() == 1 {
        return Ok([values[0]; N]);
    }
    to_array(&values, "--spacing")
}

/// Parse "i,j[=value]".
fn parse_node<const N: usize>(s: &str, flag: &str) -> Result<Node<N>> {
    let (coords, value) = match s.split_once('=') {
        Some((coords, value)) => {
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("invalid {} value in '{}'", flag, s))?;
            (coords, value)
        }
        None => (s, 0.0),
    };
    let index: Vec<i64> = parse_list(coords, flag)?;
    Ok(Node::new(to_array(&index, flag)?, value))
}

fn parse_nodes<const N: usize>(items: &[String], flag: &str) -> Result<Vec<Node<N>>> {
    items.iter().map(|s| parse_node(s, flag)).collect()
}

fn configure_speed<const N: usize>(
    solver: FastMarchingSolver<N>,
    mode: &str,
    shape: [usize; N],
) -> Result<FastMarchingSolver<N>> {
    if let Some(val_str) = mode.strip_prefix("uniform:") {
        let speed: f64 = val_str.parse().context("invalid uniform speed value")?;
        if !speed.is_finite() || speed <= 0.0 {
            bail!("uniform speed must be positive and finite, got {}", speed);
        }
        return Ok(solver.with_output_size(shape)?.with_speed_constant(speed));
    }

    if let Some(path_str) = mode.strip_prefix("speed-file:") {
        let speed = io::load_speed(Path::new(path_str), shape)
            .with_context(|| format!("loading speed from {}", path_str))?;
        return Ok(solver.with_speed(speed));
    }

    if let Some(path_str) = mode.strip_prefix("slowness-file:") {
        let speed = io::load_slowness_as_speed(Path::new(path_str), shape)
            .with_context(|| format!("loading slowness from {}", path_str))?;
        return Ok(solver.with_speed(speed));
    }

    bail!(
        "unknown --speed mode: '{}'. Expected 'uniform:<val>', 'speed-file:<path>', \
         or 'slowness-file:<path>'",
        mode
    );
}

fn run<const N: usize>(cli: &Cli) -> Result<()> {
    let size: Vec<usize> = parse_list(&cli.size, "--size")?;
    let shape: [usize; N] = to_array(&size, "--size")?;

    let mut marcher = FastMarchingSolver::<N>::new()
        .with_spacing(parse_spacing(&cli.spacing)?)?
        .with_normalization_factor(cli.normalization)?;
    marcher = configure_speed(marcher, &cli.speed, shape)?;
    if let Some(stop) = cli.stopping_value {
        marcher = marcher.with_stopping_value(stop)?;
    }

    let alive = parse_nodes::<N>(&cli.alive, "--alive")?;
    let trial = parse_nodes::<N>(&cli.trial, "--trial")?;
    if alive.is_empty() && trial.is_empty() {
        warn!("no --alive or --trial seeds given; every cell will stay unreached");
    }
    marcher = marcher.with_alive_points(&alive).with_trial_points(&trial);

    if cli.progress {
        marcher = marcher
            .with_progress(Box::new(|info: ProgressInfo| {
                eprintln!(
                    "[{:.1}s] {:5.1}% alive={} trial={} front={:.4}",
                    info.elapsed.as_secs_f64(),
                    100.0 * info.fraction,
                    info.alive,
                    info.trial,
                    info.front_value,
                );
            }))
            .with_progress_granularity(0.05);
    }

    let targets = parse_nodes::<N>(&cli.target, "--target")?;
    let mode: TargetReachedMode = cli.target_mode.parse()?;
    let solver = UpwindGradientSolver::new(marcher)
        .with_target_points(&targets)
        .with_target_offset(cli.target_offset)?
        .with_target_reached_mode(mode)
        .with_generate_gradient(cli.gradient_output.is_some());

    let out = solver.solve().context("fast marching failed")?;
    info!(
        "{:?}: {} alive cells, {} of {} targets reached, target value {:.6}",
        out.marching.state,
        out.marching.alive_count,
        out.reached_targets.len(),
        targets.len(),
        out.target_value
    );

    io::save_arrival_times(&out.marching.arrival, &cli.output)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    info!("arrival times written to {}", cli.output.display());

    if let Some(path) = &cli.labels_output {
        io::save_labels(&out.marching.labels, path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("labels written to {}", path.display());
    }
    if let (Some(path), Some(gradient)) = (&cli.gradient_output, &out.gradient) {
        io::save_gradient(gradient, path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("gradient written to {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.dim {
        1 => run::<1>(&cli),
        2 => run::<2>(&cli),
        3 => run::<3>(&cli),
        other => bail!("--dim must be 1, 2, or 3, got {}", other),
    }
}
