//! What a run did.

use std::{collections::BTreeMap, fmt, time::Duration};

use log::{info, warn};
use playlake_core::format_duration;
use playlake_storage::{schemas::TableName, writer::WriteSummary};
use strum::IntoEnumIterator;
use ulid::Ulid;

/// Statistics of a single read of a raw source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub files: usize,
    /// Lines that were valid records.
    pub records: usize,
    /// Lines that weren't.
    pub skipped: usize,
}

/// What happened to a table during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableOutcome {
    Written(WriteSummary),
    /// The write failed, with the error's message.
    Failed(String),
    /// The run stopped before getting to this table.
    NotAttempted,
}

impl fmt::Display for TableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written(summary) => write!(
                f,
                "written ({} rows, {} partitions, {} files)",
                summary.rows, summary.partitions, summary.files
            ),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
            Self::NotAttempted => write!(f, "not attempted"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Ulid,
    /// The read of the song source for the song and artist tables.
    pub songs: Option<SourceStats>,
    pub logs: Option<SourceStats>,
    /// The second read of the song source, for the songplays join.
    /// `None` when the catalog was reused or the run didn't get that far.
    pub catalog: Option<SourceStats>,
    /// Song plays in the log source, and how many of them matched a song in the catalog.
    pub plays: usize,
    pub matched_plays: usize,
    pub tables: BTreeMap<TableName, TableOutcome>,
    pub elapsed: Duration,
}

impl RunReport {
    #[must_use]
    pub fn new(run_id: Ulid) -> Self {
        Self {
            run_id,
            songs: None,
            logs: None,
            catalog: None,
            plays: 0,
            matched_plays: 0,
            tables: TableName::iter()
                .map(|table| (table, TableOutcome::NotAttempted))
                .collect(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn record(&mut self, table: TableName, outcome: TableOutcome) {
        self.tables.insert(table, outcome);
    }

    #[must_use]
    pub fn outcome(&self, table: TableName) -> &TableOutcome {
        self.tables.get(&table).unwrap_or(&TableOutcome::NotAttempted)
    }

    /// Tables with the given kind of outcome, in [`TableName`] order.
    fn tables_where(&self, f: impl Fn(&TableOutcome) -> bool) -> Vec<TableName> {
        self.tables
            .iter()
            .filter(|(_, outcome)| f(outcome))
            .map(|(table, _)| *table)
            .collect()
    }

    #[must_use]
    pub fn written(&self) -> Vec<TableName> {
        self.tables_where(|o| matches!(o, TableOutcome::Written(_)))
    }

    #[must_use]
    pub fn failed(&self) -> Vec<TableName> {
        self.tables_where(|o| matches!(o, TableOutcome::Failed(_)))
    }

    #[must_use]
    pub fn not_attempted(&self) -> Vec<TableName> {
        self.tables_where(|o| matches!(o, TableOutcome::NotAttempted))
    }

    /// Whether every table was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.written().len() == self.tables.len()
    }

    /// Total number of malformed lines skipped across every source read.
    #[must_use]
    pub fn skipped(&self) -> usize {
        [self.songs, self.logs, self.catalog]
            .iter()
            .flatten()
            .map(|stats| stats.skipped)
            .sum()
    }

    pub fn log_summary(&self) {
        info!(
            "run {} finished in {}s",
            self.run_id,
            format_duration(&self.elapsed)
        );
        for (name, stats) in [
            ("songs", self.songs),
            ("logs", self.logs),
            ("catalog", self.catalog),
        ] {
            if let Some(stats) = stats {
                info!(
                    "  source {name}: {} records from {} files, {} skipped",
                    stats.records, stats.files, stats.skipped
                );
            }
        }
        if self.plays > 0 {
            info!(
                "  {} of {} song plays matched the song catalog",
                self.matched_plays, self.plays
            );
        }
        for (table, outcome) in &self.tables {
            match outcome {
                TableOutcome::Written(_) => info!("  table {table}: {outcome}"),
                _ => warn!("  table {table}: {outcome}"),
            }
        }
    }
}
