//! Result rendering: human table, CSV or JSON, always to a writer.

use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use mdelab_core::bootstrap::{BootstrapResult, SamplingSummary};
use mdelab_core::distribution::EmpiricalDistribution;
use mdelab_core::{PowerResult, StopReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

// ─── Power search ────────────────────────────────────────────────────

pub fn write_power_result<W: Write>(
    out: &mut W,
    result: &PowerResult,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => write_power_table(out, result),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            writer.write_record(["sample_size", "power"])?;
            for point in &result.points {
                writer.write_record([point.sample_size.to_string(), point.power.to_string()])?;
            }
            writer.flush()?;
            Ok(())
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, result)?;
            writeln!(out)?;
            Ok(())
        }
    }
}

fn write_power_table<W: Write>(out: &mut W, result: &PowerResult) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "=== Power Search ===")?;
    writeln!(out, "{:>12} {:>8}", "Sample Size", "Power")?;
    writeln!(out, "{}", "-".repeat(21))?;
    for point in &result.points {
        writeln!(out, "{:>12} {:>8.3}", point.sample_size, point.power)?;
    }
    writeln!(out)?;
    writeln!(out, "Target Power:   {:.2}", result.target_power)?;
    writeln!(out, "Seed:           {}", result.seed)?;
    match (result.stop_reason, result.last()) {
        (StopReason::TargetReached, Some(last)) => {
            writeln!(out, "Required Size:  {} per group", last.sample_size)?;
        }
        (StopReason::CeilingReached, Some(last)) => {
            writeln!(
                out,
                "Target not reached: power {:.3} at the ceiling ({} per group)",
                last.power, last.sample_size
            )?;
        }
        (StopReason::Cancelled, Some(last)) => {
            writeln!(
                out,
                "Cancelled: power {:.3} at {} per group",
                last.power, last.sample_size
            )?;
        }
        (_, None) => writeln!(out, "No sample sizes tested")?,
    }
    writeln!(out)?;
    Ok(())
}

// ─── Distribution ────────────────────────────────────────────────────

pub fn write_distribution<W: Write>(
    out: &mut W,
    dist: &EmpiricalDistribution,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            writeln!(out)?;
            writeln!(out, "=== Empirical Distribution ===")?;
            writeln!(out, "Observations:   {}", dist.observations())?;
            writeln!(out, "Distinct:       {}", dist.len())?;
            writeln!(out, "Round Digits:   {}", dist.round_digits())?;
            writeln!(out, "Mean:           {:.6}", dist.mean())?;
            writeln!(out, "Std Dev:        {:.6}", dist.std_dev())?;
            writeln!(out)?;
            writeln!(out, "{:>16} {:>12} {:>12}", "Value", "Probability", "Cumulative")?;
            writeln!(out, "{}", "-".repeat(42))?;
            for row in dist.table() {
                writeln!(
                    out,
                    "{:>16} {:>12.6} {:>12.6}",
                    row.value, row.probability, row.cumulative_probability
                )?;
            }
            writeln!(out)?;
            Ok(())
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for row in dist.table() {
                writer.serialize(row)?;
            }
            writer.flush()?;
            Ok(())
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &dist.table())?;
            writeln!(out)?;
            Ok(())
        }
    }
}

// ─── Bootstrap ───────────────────────────────────────────────────────

pub fn write_bootstrap<W: Write>(
    out: &mut W,
    result: &BootstrapResult,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            writeln!(out)?;
            writeln!(out, "=== Bootstrap: {} ===", result.statistic)?;
            writeln!(out, "Sample Size:    {} per group", result.sample_size)?;
            writeln!(out, "Resamples:      {}", result.n_resamples)?;
            writeln!(out, "MDE:            {:.2}%", result.mde_percent)?;
            writeln!(out, "Seed:           {}", result.seed)?;
            writeln!(out)?;
            writeln!(
                out,
                "{:<10} {:>12} {:>12} {:>12} {:>12} {:>12}",
                "Group", "Mean", "Std Dev", "P2.5", "Median", "P97.5"
            )?;
            writeln!(out, "{}", "-".repeat(75))?;
            write_summary_row(out, "control", &result.control)?;
            write_summary_row(out, "treatment", &result.treatment)?;
            writeln!(out)?;
            writeln!(out, "Observed Shift: {:.3}%", result.observed_shift_percent)?;
            writeln!(out)?;
            Ok(())
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            writer.write_record(["resample", "control", "treatment"])?;
            let pairs = result.control.values.iter().zip(&result.treatment.values);
            for (i, (c, t)) in pairs.enumerate() {
                writer.write_record([i.to_string(), c.to_string(), t.to_string()])?;
            }
            writer.flush()?;
            Ok(())
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, result)?;
            writeln!(out)?;
            Ok(())
        }
    }
}

fn write_summary_row<W: Write>(out: &mut W, label: &str, s: &SamplingSummary) -> Result<()> {
    writeln!(
        out,
        "{:<10} {:>12.6} {:>12.6} {:>12.6} {:>12.6} {:>12.6}",
        label, s.mean, s.std_dev, s.p2_5, s.median, s.p97_5
    )?;
    Ok(())
}
