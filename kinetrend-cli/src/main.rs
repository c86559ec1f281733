//! KineTrend CLI — kinetic component analysis from the command line.
//!
//! Commands:
//! - `fit` — fit the kinematic model to one series and print the latest state and alpha signals
//! - `select` — greedy Fourier denoising of one series
//! - `run` — run a TOML-configured universe and save artifacts
//! - `demo` — noisy sine: KCA vs spectral selection vs the noiseless source
//! - `walk-forward` — score one-step forecasts over the tail of a series

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kinetrend_core::alpha::{trades, AlphaStrategy, KcaMeanReversion, KcaMomentum};
use kinetrend_core::kca::{ConvergencePolicy, EmSettings, KineticConfig, KineticEstimator};
use kinetrend_core::signals::{SignalPositionEngine, TrendClassifier};
use kinetrend_core::spectral::{SpectralConfig, SpectralSelector};
use kinetrend_core::stats::correlation;
use kinetrend_core::synthetic::periodic;
use kinetrend_core::Series;
use kinetrend_runner::export::{export_walk_forward_csv, generate_report};
use kinetrend_runner::{
    load_instrument, run_universe, save_artifacts, walk_forward, InstrumentResult, InstrumentSpec,
    RunConfig, RunReport, SourceSpec, WalkForwardConfig,
};

#[derive(Parser)]
#[command(
    name = "kinetrend",
    about = "KineTrend CLI — kinetic component analysis and trend signals"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the input series comes from.
#[derive(Args)]
struct SourceArgs {
    /// Dated CSV file (first column YYYY-MM-DD).
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Value column name. Defaults to the second column.
    #[arg(long)]
    column: Option<String>,

    /// Use a noisy sine instead of a CSV file.
    #[arg(long, default_value_t = false)]
    periodic: bool,

    /// Periods of the synthetic sine.
    #[arg(long, default_value_t = 10)]
    periods: usize,

    /// Observations of the synthetic sine.
    #[arg(long, default_value_t = 300)]
    nobs: usize,

    /// Noise scale of the synthetic sine.
    #[arg(long, default_value_t = 0.5)]
    scale: f64,

    /// RNG seed of the synthetic sine.
    #[arg(long, default_value_t = 0)]
    sample_seed: u64,
}

impl SourceArgs {
    fn load(&self) -> Result<Series> {
        let source = match (&self.csv, self.periodic) {
            (Some(_), true) => bail!("--csv and --periodic are mutually exclusive"),
            (None, false) => bail!("one of --csv or --periodic is required"),
            (Some(path), false) => SourceSpec::Csv {
                path: path.clone(),
                column: self.column.clone(),
            },
            (None, true) => SourceSpec::Periodic {
                periods: self.periods,
                nobs: self.nobs,
                scale: self.scale,
                seed: self.sample_seed,
            },
        };
        let spec = InstrumentSpec {
            symbol: "input".into(),
            source,
        };
        Ok(load_instrument(&spec)?.series)
    }
}

#[derive(Args)]
struct EstimatorArgs {
    /// Process-noise seed multiplying the identity.
    #[arg(long, default_value_t = 0.001)]
    noise_seed: f64,

    /// EM iteration ceiling.
    #[arg(long, default_value_t = 100)]
    max_iterations: usize,

    /// Relative log-likelihood change treated as converged.
    #[arg(long, default_value_t = 1e-4)]
    tolerance: f64,

    /// Fail instead of warning when EM does not converge.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

impl EstimatorArgs {
    fn config(&self) -> KineticConfig {
        KineticConfig::new(self.noise_seed).with_em(EmSettings {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            on_non_convergence: if self.strict {
                ConvergencePolicy::Fail
            } else {
                ConvergencePolicy::Warn
            },
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the kinematic model and print the latest state.
    Fit {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        estimator: EstimatorArgs,

        /// Predict-only steps after the last observation.
        #[arg(long, default_value_t = 0)]
        forecast: usize,

        /// Write the full fit as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Greedy Fourier denoising.
    Select {
        #[command(flatten)]
        source: SourceArgs,

        /// Significance level in (0, 1). Omit to admit every frequency.
        #[arg(long)]
        alpha: Option<f64>,

        /// Admit at most this many components.
        #[arg(long)]
        max_components: Option<usize>,

        /// Write the reconstruction as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run a configured universe from a TOML file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Noisy sine demo: KCA, spectral selection and signals.
    Demo {
        #[arg(long, default_value_t = 10)]
        periods: usize,

        #[arg(long, default_value_t = 300)]
        nobs: usize,

        #[arg(long, default_value_t = 0.5)]
        scale: f64,

        #[arg(long, default_value_t = 0)]
        sample_seed: u64,

        /// Confirmation window in steps.
        #[arg(long, default_value_t = 5)]
        lookback: usize,
    },
    /// Score one-step forecasts over the tail of a series.
    WalkForward {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        estimator: EstimatorArgs,

        /// Trailing observations per refit.
        #[arg(long, default_value_t = 360)]
        train_window: usize,

        /// Number of scored steps.
        #[arg(long, default_value_t = 30)]
        days: usize,

        /// Write the scored steps as CSV.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fit {
            source,
            estimator,
            forecast,
            output,
        } => run_fit_cmd(&source, &estimator, forecast, output),
        Commands::Select {
            source,
            alpha,
            max_components,
            output,
        } => run_select_cmd(&source, alpha, max_components, output),
        Commands::Run { config, output_dir } => run_universe_cmd(config, output_dir),
        Commands::Demo {
            periods,
            nobs,
            scale,
            sample_seed,
            lookback,
        } => run_demo_cmd(periods, nobs, scale, sample_seed, lookback),
        Commands::WalkForward {
            source,
            estimator,
            train_window,
            days,
            output,
        } => run_walk_forward_cmd(&source, &estimator, train_window, days, output),
    }
}

fn run_fit_cmd(
    source: &SourceArgs,
    estimator: &EstimatorArgs,
    forecast: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let series = source.load()?;
    let config = estimator.config().with_forecast(forecast);
    let fit = KineticEstimator::new(config).fit(&series)?;
    let d = &fit.diagnostics;

    println!();
    println!("=== Kinetic Fit ===");
    println!("Observations:   {}", d.observed);
    println!("Step h:         {:.6}", d.step);
    println!(
        "EM iterations:  {}{}",
        d.iterations,
        if d.converged { "" } else { " (not converged)" }
    );
    println!("Log-likelihood: {:.4}", d.log_likelihood);
    println!("Obs. variance:  {:.6}", d.model.observation_variance);

    let observed = fit.observed();
    if let (Some(last), Some(sd)) = (observed.last(), fit.stdevs.get(d.observed - 1)) {
        let trend = TrendClassifier::default()
            .classify(last.velocity, last.acceleration)
            .map_or_else(|| "undefined".to_string(), |t| t.to_string());
        println!();
        println!("--- Latest state ---");
        println!("Position:       {:.6} ± {:.6}", last.position, sd.position);
        println!("Velocity:       {:.6} ± {:.6}", last.velocity, sd.velocity);
        println!("Acceleration:   {:.6} ± {:.6}", last.acceleration, sd.acceleration);
        println!("Trend:          {trend}");
    }
    for (k, state) in fit.forecast().iter().enumerate() {
        println!("Forecast +{}:    {:.6}", k + 1, state.position);
    }

    let strategies: [Box<dyn AlphaStrategy>; 2] = [
        Box::new(KcaMomentum::default()),
        Box::new(KcaMeanReversion::default()),
    ];
    println!();
    println!("--- Alpha strategies ---");
    for strategy in &strategies {
        let signal = strategy.signal(series.values(), observed);
        let trades: u32 = trades(&signal).iter().map(|&t| u32::from(t)).sum();
        let latest = signal.last().copied().unwrap_or(0);
        println!("{:<20} latest {latest:+}  turnover {trades}", strategy.name());
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&fit).context("failed to serialize fit")?;
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Fit written to: {}", path.display());
    }
    Ok(())
}

fn run_select_cmd(
    source: &SourceArgs,
    alpha: Option<f64>,
    max_components: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    let series = source.load()?;
    let selector = SpectralSelector::new(SpectralConfig {
        min_alpha: alpha,
        max_components,
    });
    let out = selector.select(series.values())?;

    println!();
    println!("=== Spectral Selection ===");
    println!("Observations:   {}", series.len());
    println!("Admitted:       {}", out.admitted.len());
    println!("Termination:    {:?}", out.termination);
    if let Some(w) = out.whiteness {
        println!(
            "Ljung-Box:      Q = {:.4}, p = {:.4} ({} lags)",
            w.statistic, w.p_value, w.lags
        );
    }
    let order: Vec<String> = out.admitted.iter().map(|c| c.index.to_string()).collect();
    println!("Order:          {}", order.join(" "));
    println!(
        "Corr(input):    {:.4}",
        correlation(&out.series, series.values())
    );

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&out).context("failed to serialize reconstruction")?;
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Reconstruction written to: {}", path.display());
    }
    Ok(())
}

fn run_universe_cmd(config_path: PathBuf, output_dir: PathBuf) -> Result<()> {
    tracing::info!(config = %config_path.display(), "loading run config");
    let config = RunConfig::from_file(&config_path)?;
    let report = run_universe(&config)?;

    for result in &report.instruments {
        print_summary(result);
    }
    let run_dir = save_artifacts(&report, &output_dir)?;
    std::fs::write(run_dir.join("report.md"), generate_report(&report))?;
    print_run_footer(&report);
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_demo_cmd(
    periods: usize,
    nobs: usize,
    scale: f64,
    sample_seed: u64,
    lookback: usize,
) -> Result<()> {
    let sample = periodic(periods, nobs, scale, sample_seed);
    let series = Series::new(sample.t.clone(), sample.observed.clone())?;

    let fit = KineticEstimator::new(KineticConfig::new(0.001)).fit(&series)?;
    let positions: Vec<f64> = fit.observed().iter().map(|s| s.position).collect();
    let spectral = SpectralSelector::new(SpectralConfig::with_min_alpha(0.05)).select(&sample.observed)?;

    let engine = SignalPositionEngine::new(lookback)?;
    let track = engine.run(&fit.trends(&TrendClassifier::default()))?;

    println!();
    println!("=== Demo: sin(t) + {scale} N(0,1), {periods} periods, {nobs} points ===");
    println!("Corr(raw, truth):      {:.4}", correlation(&sample.observed, &sample.signal));
    println!("Corr(KCA, truth):      {:.4}", correlation(&positions, &sample.signal));
    println!(
        "Corr(spectral, truth): {:.4} ({} components)",
        correlation(&spectral.series, &sample.signal),
        spectral.admitted.len()
    );
    println!("Corr(spectral, KCA):   {:.4}", correlation(&spectral.series, &positions));
    println!(
        "EM iterations:         {}{}",
        fit.diagnostics.iterations,
        if fit.diagnostics.converged { "" } else { " (not converged)" }
    );
    println!();
    println!("--- Signals (lookback {lookback}) ---");
    for d in track.issued() {
        let trend = d.confirmed.map_or_else(String::new, |t| t.to_string());
        println!(
            "t = {:>4}  {:<5} {:<12} -> {:?}",
            d.index,
            format!("{:?}", d.signal),
            trend,
            d.position
        );
    }
    println!("Trades:                {}", track.trade_count());
    Ok(())
}

fn run_walk_forward_cmd(
    source: &SourceArgs,
    estimator: &EstimatorArgs,
    train_window: usize,
    days: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let series = source.load()?;
    let config = WalkForwardConfig {
        train_window,
        days,
        estimator: estimator.config(),
    };
    let report = walk_forward(&series, &config)?;

    println!();
    println!("=== Walk-Forward ===");
    println!("Train window:   {}", report.train_window);
    println!("Steps:          {}", report.steps.len());
    println!(
        "Hit ratio:      {:.1}% ({} / {})",
        report.hit_ratio * 100.0,
        report.hits,
        report.steps.len()
    );
    println!("RMSE:           {:.6}", report.rmse);

    if let Some(path) = output {
        std::fs::write(&path, export_walk_forward_csv(&report)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Steps written to: {}", path.display());
    }
    Ok(())
}

fn print_summary(result: &InstrumentResult) {
    let m = &result.metrics;
    println!();
    println!("=== {} ===", result.symbol);
    if let (Some(start), Some(end)) = (&result.start_date, &result.end_date) {
        println!("Period:         {start} to {end}");
    }
    println!("Observations:   {}", result.observations);
    println!(
        "EM iterations:  {}{}",
        result.fit.iterations,
        if result.fit.converged { "" } else { " (not converged)" }
    );
    println!("Trades:         {}", m.trade_count);
    println!();
    println!("--- Performance ---");
    println!("Total P&L:      {:.2}%", m.total_pnl * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Rolling Sharpe: {:.3}", m.final_rolling_sharpe);
    println!("Volatility:     {:.2}%", m.volatility * 100.0);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("In Market:      {:.1}%", m.time_in_market * 100.0);
    println!("Hit Rate:       {:.1}%", m.hit_rate * 100.0);
    if let Some(s) = &result.spectral {
        println!();
        println!("--- Spectral ---");
        println!("Components:     {} ({:?})", s.components, s.termination);
        println!("Corr(KCA):      {:.4}", s.correlation_with_kca);
    }
    if let Some(c) = result.truth_correlation {
        println!("Corr(truth):    {c:.4}");
    }
    if result.synthetic {
        println!();
        println!("NOTE: synthetic data");
    }
}

fn print_run_footer(report: &RunReport) {
    println!();
    println!("Run:            {}", report.config.name);
    println!("Run ID:         {}", report.run_id);
}
