//! Recommendation export — CSV rendering of a published beam.
//!
//! One row per beam entry, scores at fixed precision so diffs between
//! exports of the same beam are stable.

use std::io::Write;

use anyhow::{Context, Result};

use crate::beam::BeamEntry;

/// Write ranked recommendations as CSV.
///
/// Columns: rank, fingerprint, depth, steps, composite, raw_return,
/// diversification_penalty, cost_penalty, risk_penalty. Steps are joined
/// with "; " so each entry stays one row.
pub fn export_csv<W: Write>(beam: &[BeamEntry], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record([
        "rank",
        "fingerprint",
        "depth",
        "steps",
        "composite",
        "raw_return",
        "diversification_penalty",
        "cost_penalty",
        "risk_penalty",
    ])?;

    for entry in beam {
        wtr.write_record([
            &entry.rank.to_string(),
            entry.fingerprint.as_str(),
            &entry.depth.to_string(),
            &entry.steps.join("; "),
            &format!("{:.6}", entry.composite),
            &format!("{:.6}", entry.components.raw_return),
            &format!("{:.6}", entry.components.diversification_penalty),
            &format!("{:.6}", entry.components.cost_penalty),
            &format!("{:.6}", entry.components.risk_penalty),
        ])?;
    }

    wtr.flush().context("failed to flush CSV writer")?;
    Ok(())
}

/// CSV in a `String`, for callers that do not hold a writer.
pub fn export_csv_string(beam: &[BeamEntry]) -> Result<String> {
    let mut buf = Vec::new();
    export_csv(beam, &mut buf)?;
    String::from_utf8(buf).context("CSV output is not valid UTF-8")
}

// ─── Tests ───────────────────────────────────────────────────────────
