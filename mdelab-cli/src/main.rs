//! MDE Lab CLI: sample-size search, distribution inspection and bootstrap.
//!
//! Commands:
//! - `run`: estimate the per-group sample size needed to detect an MDE
//! - `distribution`: print the empirical distribution built from a column
//! - `bootstrap`: sampling distributions of the statistic at a fixed size

mod input;
mod output;
mod profiling;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mdelab_core::bootstrap::{bootstrap_statistic, BootstrapConfig};
use mdelab_core::{run_experiment, EmpiricalDistribution, ExperimentParams, ProgressEvent};

use input::{load_column, ColumnSelector};
use output::{write_bootstrap, write_distribution, write_power_result, OutputFormat};
use profiling::ProfileScope;

#[derive(Parser)]
#[command(
    name = "mdelab",
    about = "MDE Lab: Monte Carlo sample-size estimation for A/B tests"
)]
struct Cli {
    /// Worker threads for emulations. Defaults to one per core.
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search sample sizes until the estimated power reaches the target.
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Path to a TOML experiment config. Flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: ExperimentOverrides,

        /// Suppress per-step progress on stderr.
        #[arg(long, default_value_t = false)]
        quiet: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Print the empirical distribution built from the column.
    Distribution {
        #[command(flatten)]
        data: DataArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Bootstrap the statistic for control and treatment at one sample size.
    Bootstrap {
        #[command(flatten)]
        data: DataArgs,

        /// Statistic to resample.
        #[arg(long, default_value = "mean")]
        statistic: String,

        /// Per-group sample size of each resample.
        #[arg(long, default_value_t = 1000)]
        sample_size: usize,

        /// Relative effect applied to treatment, in percent.
        #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
        mde: f64,

        /// Number of resamples per group.
        #[arg(long, default_value_t = 1000)]
        resamples: usize,

        /// Master seed. Random when omitted.
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

/// Where the metric comes from and how to discretize it.
#[derive(Args, Debug)]
struct DataArgs {
    /// CSV file holding the metric.
    #[arg(long)]
    data: PathBuf,

    /// Column name, or zero-based index.
    #[arg(long, default_value = "0")]
    column: String,

    /// The file has no header row.
    #[arg(long, default_value_t = false)]
    no_headers: bool,

    /// Fixed rounding precision. Overrides adaptive rounding.
    #[arg(long)]
    round_digits: Option<u32>,

    /// Use the default precision instead of deriving it from the spread.
    #[arg(long, default_value_t = false)]
    no_adaptive: bool,
}

/// Per-field overrides on top of the TOML config (or the defaults).
#[derive(Args, Debug, Default)]
struct ExperimentOverrides {
    /// Significance level: 0.01, 0.05 or 0.1.
    #[arg(long)]
    alpha: Option<f64>,

    /// Target power, strictly between 0 and 1.
    #[arg(long)]
    power: Option<f64>,

    /// Minimum detectable effect, in percent of the statistic.
    #[arg(long, allow_negative_numbers = true)]
    mde: Option<f64>,

    #[arg(long)]
    statistic: Option<String>,

    /// Test method: t_test or z_proportion_test.
    #[arg(long = "test")]
    test_method: Option<String>,

    /// Emulations per sample size.
    #[arg(long)]
    emulations: Option<usize>,

    /// First sample size tested, per group.
    #[arg(long)]
    sample_size: Option<usize>,

    #[arg(long)]
    step: Option<usize>,

    /// Largest sample size tested before giving up.
    #[arg(long)]
    max_sample_size: Option<usize>,

    /// Master seed. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

impl ExperimentOverrides {
    fn apply(&self, params: &mut ExperimentParams) {
        if let Some(alpha) = self.alpha {
            params.alpha = alpha;
        }
        if let Some(power) = self.power {
            params.target_power = power;
        }
        if let Some(mde) = self.mde {
            params.mde_percent = mde;
        }
        if let Some(statistic) = &self.statistic {
            params.statistic = statistic.clone();
        }
        if let Some(test_method) = &self.test_method {
            params.test_method = test_method.clone();
        }
        if let Some(emulations) = self.emulations {
            params.num_emulations = emulations;
        }
        if let Some(sample_size) = self.sample_size {
            params.sample_size = sample_size;
        }
        if let Some(step) = self.step {
            params.sample_step = step;
        }
        if self.max_sample_size.is_some() {
            params.max_sample_size = self.max_sample_size;
        }
        if self.seed.is_some() {
            params.seed = self.seed;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    profiling::init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure the worker pool")?;
    }

    match cli.command {
        Commands::Run {
            data,
            config,
            overrides,
            quiet,
            format,
        } => run_search_cmd(&data, config, &overrides, quiet, format),
        Commands::Distribution { data, format } => run_distribution_cmd(&data, format),
        Commands::Bootstrap {
            data,
            statistic,
            sample_size,
            mde,
            resamples,
            seed,
            format,
        } => {
            let config = BootstrapConfig {
                statistic,
                sample_size,
                mde_percent: mde,
                n_resamples: resamples,
                seed,
            };
            run_bootstrap_cmd(&data, &config, format)
        }
    }
}

fn run_search_cmd(
    data: &DataArgs,
    config_path: Option<PathBuf>,
    overrides: &ExperimentOverrides,
    quiet: bool,
    format: OutputFormat,
) -> Result<()> {
    let params = build_params(config_path, overrides)?;
    // Validate before touching the data file.
    let config = params.validate().context("invalid experiment config")?;
    let dist = load_distribution(data)?;

    let progress = |event: &ProgressEvent| {
        eprintln!(
            "[{}/{}] n={} power={:.3}",
            event.iteration_index + 1,
            event.estimated_total_iterations,
            event.current_size,
            event.power
        );
    };
    let progress_cb: Option<&dyn Fn(&ProgressEvent)> = if quiet { None } else { Some(&progress) };

    let result = {
        let _scope = ProfileScope::new("power_search");
        run_experiment(&dist, &config, progress_cb, None).context("power search failed")?
    };

    let mut stdout = std::io::stdout().lock();
    write_power_result(&mut stdout, &result, format)?;
    stdout.flush()?;
    Ok(())
}

fn run_distribution_cmd(data: &DataArgs, format: OutputFormat) -> Result<()> {
    let dist = load_distribution(data)?;
    let mut stdout = std::io::stdout().lock();
    write_distribution(&mut stdout, &dist, format)?;
    stdout.flush()?;
    Ok(())
}

fn run_bootstrap_cmd(data: &DataArgs, config: &BootstrapConfig, format: OutputFormat) -> Result<()> {
    let dist = load_distribution(data)?;
    let result = {
        let _scope = ProfileScope::new("bootstrap");
        bootstrap_statistic(&dist, config).context("bootstrap failed")?
    };
    let mut stdout = std::io::stdout().lock();
    write_bootstrap(&mut stdout, &result, format)?;
    stdout.flush()?;
    Ok(())
}

/// Config file (or defaults) with flag overrides applied.
fn build_params(
    config_path: Option<PathBuf>,
    overrides: &ExperimentOverrides,
) -> Result<ExperimentParams> {
    let mut params = match config_path {
        Some(path) => ExperimentParams::from_file(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ExperimentParams::default(),
    };
    overrides.apply(&mut params);
    Ok(params)
}

fn load_distribution(data: &DataArgs) -> Result<EmpiricalDistribution> {
    let values = {
        let _scope = ProfileScope::new("load_column");
        load_column(
            &data.data,
            &ColumnSelector::parse(&data.column),
            !data.no_headers,
        )?
    };
    let _scope = ProfileScope::new("build_distribution");
    EmpiricalDistribution::build(&values, data.round_digits, !data.no_adaptive)
        .with_context(|| format!("failed to build distribution from column '{}'", data.column))
}
