//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! - **JSON**: full round-trip serialization of a [`RunReport`] with schema versioning
//! - **CSV**: per-instrument step tape, a per-run summary, and walk-forward steps
//! - **Markdown**: human-readable run summary
//!
//! Unknown (newer) schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::runner::{InstrumentResult, RunReport, SCHEMA_VERSION};
use crate::walk_forward::WalkForwardReport;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

/// Deserialize a `RunReport` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize RunReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn trend_cell(trend: Option<kinetrend_core::TrendLabel>) -> String {
    trend.map(|t| t.to_string()).unwrap_or_default()
}

/// One row per observation.
///
/// Columns: index, date, price, position, velocity, acceleration, position_std,
/// trend, signal, state, exposure, pnl, cumulative_pnl
pub fn export_signals_csv(result: &InstrumentResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "index",
        "date",
        "price",
        "position",
        "velocity",
        "acceleration",
        "position_std",
        "trend",
        "signal",
        "state",
        "exposure",
        "pnl",
        "cumulative_pnl",
    ])?;

    for (i, state) in result.kinematics.iter().enumerate() {
        let date = result
            .dates
            .as_ref()
            .and_then(|d| d.get(i))
            .map(|d| d.to_string())
            .unwrap_or_default();
        wtr.write_record([
            &i.to_string(),
            &date,
            &format!("{:.6}", result.prices.get(i).copied().unwrap_or(f64::NAN)),
            &format!("{:.6}", state.position),
            &format!("{:.6}", state.velocity),
            &format!("{:.6}", state.acceleration),
            &format!("{:.6}", result.stdevs.get(i).map_or(f64::NAN, |s| s.position)),
            &trend_cell(result.trends.get(i).copied().flatten()),
            &result.signals.get(i).map(|s| format!("{s:?}")).unwrap_or_default(),
            &result.positions.get(i).map(|p| format!("{p:?}")).unwrap_or_default(),
            &format!("{}", result.exposure.get(i).copied().unwrap_or(0.0)),
            &format!("{:.8}", result.performance.pnl.get(i).copied().unwrap_or(0.0)),
            &format!("{:.8}", result.performance.cumulative.get(i).copied().unwrap_or(0.0)),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per instrument with the summary metrics.
pub fn export_summary_csv(report: &RunReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "observations",
        "synthetic",
        "em_iterations",
        "converged",
        "trades",
        "total_pnl",
        "sharpe",
        "final_rolling_sharpe",
        "max_drawdown",
        "time_in_market",
        "hit_rate",
        "spectral_components",
        "spectral_correlation",
    ])?;
    for r in &report.instruments {
        let m = &r.metrics;
        wtr.write_record([
            &r.symbol,
            &r.observations.to_string(),
            &r.synthetic.to_string(),
            &r.fit.iterations.to_string(),
            &r.fit.converged.to_string(),
            &m.trade_count.to_string(),
            &format!("{:.6}", m.total_pnl),
            &format!("{:.4}", m.sharpe),
            &format!("{:.4}", m.final_rolling_sharpe),
            &format!("{:.6}", m.max_drawdown),
            &format!("{:.4}", m.time_in_market),
            &format!("{:.4}", m.hit_rate),
            &r.spectral
                .as_ref()
                .map(|s| s.components.to_string())
                .unwrap_or_default(),
            &r.spectral
                .as_ref()
                .map(|s| format!("{:.4}", s.correlation_with_kca))
                .unwrap_or_default(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per walk-forward step.
pub fn export_walk_forward_csv(report: &WalkForwardReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["index", "last_observed", "predicted", "realized", "decision", "hit"])?;
    for s in &report.steps {
        wtr.write_record([
            &s.index.to_string(),
            &format!("{:.6}", s.last_observed),
            &format!("{:.6}", s.predicted),
            &format!("{:.6}", s.realized),
            &format!("{:?}", s.decision),
            &u8::from(s.hit).to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a run.
///
/// Creates `{name}_{run_id prefix}/` under `output_dir` containing:
/// - `manifest.json` — the full `RunReport`
/// - `summary.csv` — one row per instrument
/// - `{symbol}_signals.csv` — per-step tape for each instrument
///
/// Returns the path to the created directory.
pub fn save_artifacts(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let prefix = report.run_id.get(..12).unwrap_or(&report.run_id);
    let run_dir = output_dir.join(format!("{}_{}", report.config.name, prefix));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("summary.csv"), export_summary_csv(report)?)?;
    for r in &report.instruments {
        let path = run_dir.join(format!("{}_signals.csv", r.symbol));
        std::fs::write(&path, export_signals_csv(r)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    tracing::info!(dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

/// Load a `RunReport` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<RunReport> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

pub fn generate_report(report: &RunReport) -> String {
    let mut md = String::with_capacity(1024);
    md.push_str(&format!("# Run Report: {}\n\n", report.config.name));
    md.push_str(&format!("- **Run ID:** `{}`\n", report.run_id));
    md.push_str(&format!("- **Instruments:** {}\n\n", report.instruments.len()));

    md.push_str("| Symbol | Obs | Trades | Total P&L | Sharpe | Max DD | Spectral corr |\n");
    md.push_str("|--------|-----|--------|-----------|--------|--------|---------------|\n");
    for r in &report.instruments {
        let m = &r.metrics;
        let corr = r
            .spectral
            .as_ref()
            .map(|s| format!("{:.3}", s.correlation_with_kca))
            .unwrap_or_else(|| "-".into());
        md.push_str(&format!(
            "| {} | {} | {} | {:.2}% | {:.3} | {:.2}% | {} |\n",
            r.symbol,
            r.observations,
            m.trade_count,
            m.total_pnl * 100.0,
            m.sharpe,
            m.max_drawdown * 100.0,
            corr
        ));
    }

    let unconverged: Vec<&str> = report
        .instruments
        .iter()
        .filter(|r| !r.fit.converged)
        .map(|r| r.symbol.as_str())
        .collect();
    if !unconverged.is_empty() {
        md.push_str(&format!(
            "\n> EM hit its iteration ceiling for: {}\n",
            unconverged.join(", ")
        ));
    }
    md
}
