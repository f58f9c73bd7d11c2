//! JSON summary written by `--export`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use twinwatch_host::DispatchSummary;
use twinwatch_types::GridNodeState;

use crate::pipeline::RunResult;
use crate::source::LineStats;

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub domain: &'static str,
    pub entities: usize,
    pub alerts_delivered: u64,
    pub failed_batches: u64,
    pub skipped_messages: u64,
    pub malformed_lines: u64,
    /// Grid only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes_experiencing_incident: Option<usize>,
}

/// Everything a finished run exports.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport<'a, S> {
    pub summary: Summary,
    pub dispatch: DispatchSummary,
    pub input: LineStats,
    pub entities: &'a BTreeMap<String, S>,
}

impl<'a, S: Serialize> ExportReport<'a, S> {
    pub fn new(domain: &'static str, result: &'a RunResult<S>) -> Self {
        Self {
            summary: Summary {
                domain,
                entities: result.states.len(),
                alerts_delivered: result.summary.alerts_delivered,
                failed_batches: result.summary.failed_batches,
                skipped_messages: result.summary.skipped_messages,
                malformed_lines: result.lines.malformed,
                nodes_experiencing_incident: None,
            },
            dispatch: result.summary,
            input: result.lines,
            entities: &result.states,
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

impl<'a> ExportReport<'a, GridNodeState> {
    /// Grid report, counting nodes with an open incident.
    pub fn grid(result: &'a RunResult<GridNodeState>) -> Self {
        let mut report = Self::new("grid", result);
        report.summary.nodes_experiencing_incident = Some(
            result
                .states
                .values()
                .filter(|node| node.experiencing_incident)
                .count(),
        );
        report
    }
}
